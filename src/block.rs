use std::{
    mem::MaybeUninit,
    process::abort,
    ptr::{self, NonNull},
    sync::atomic::{AtomicUsize, Ordering::*, fence},
};

use scopeguard::ScopeGuard;

// === Header === //

/// Reference counts beyond this threshold indicate that a counter was leaked in a loop; we abort
/// rather than risk an overflow-induced use-after-free.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// The bookkeeping prefix shared by every control block.
///
/// A control block is one of [`BoxedBlock`] or [`InlineBlock`], both of which are `#[repr(C)]`
/// structures beginning with a `Header`. The `dispose` and `free` function pointers recover the
/// concrete block type, giving us polymorphism over the allocation strategy without fattening the
/// handle with a trait-object pointer.
///
/// `dispose` tears the pointee down and runs exactly once, on whichever thread's strong decrement
/// observes the 1-to-0 transition. `free` returns the block's own storage to the allocator and
/// likewise runs exactly once, when the weak counter hits zero.
pub(crate) struct Header {
    strong: AtomicUsize,

    /// Counts live `Weak` handles plus one while `strong > 0`: the strong handles collectively
    /// hold a single weak increment which is surrendered after the pointee is disposed. This makes
    /// the "both counters reached zero" decision a single atomic transition. Deciding it by
    /// reading the two counters separately can double-free (or leak) the block when the last
    /// strong and last weak handle are dropped concurrently.
    weak: AtomicUsize,

    dispose: unsafe fn(NonNull<Header>),
    free: unsafe fn(NonNull<Header>),
}

impl Header {
    fn new(dispose: unsafe fn(NonNull<Header>), free: unsafe fn(NonNull<Header>)) -> Self {
        Self {
            strong: AtomicUsize::new(1),
            weak: AtomicUsize::new(1),
            dispose,
            free,
        }
    }

    pub(crate) fn strong_count(&self) -> usize {
        self.strong.load(Acquire)
    }

    pub(crate) fn retain_strong(&self) {
        if self.strong.fetch_add(1, Relaxed) > MAX_REFCOUNT {
            abort();
        }
    }

    pub(crate) fn retain_weak(&self) {
        if self.weak.fetch_add(1, Relaxed) > MAX_REFCOUNT {
            abort();
        }
    }

    /// Increments the strong count unless it has already reached zero.
    ///
    /// This is the locking primitive behind `Weak::lock`: the CAS loop never increments from zero,
    /// so no thread can obtain a strong handle after another thread has begun tearing the pointee
    /// down.
    pub(crate) fn try_retain_strong(&self) -> bool {
        let mut count = self.strong.load(Relaxed);

        loop {
            if count == 0 {
                return false;
            }

            if count > MAX_REFCOUNT {
                abort();
            }

            match self
                .strong
                .compare_exchange_weak(count, count + 1, Acquire, Relaxed)
            {
                Ok(_) => return true,
                Err(actual) => count = actual,
            }
        }
    }
}

/// Drops one strong reference.
///
/// ## Safety
///
/// `block` must point to a live control block and the caller must own one strong reference, which
/// it relinquishes.
pub(crate) unsafe fn release_strong(block: NonNull<Header>) {
    if unsafe { block.as_ref() }.strong.fetch_sub(1, Release) != 1 {
        return;
    }

    // This decrement observed the transition to zero, so this thread alone tears the pointee
    // down. The fence orders all prior uses of the pointee before the teardown.
    fence(Acquire);

    let dispose = unsafe { block.as_ref() }.dispose;
    unsafe { dispose(block) };

    // Surrender the weak increment held collectively by the strong handles.
    unsafe { release_weak(block) };
}

/// Drops one weak reference, freeing the block's storage on the transition to zero.
///
/// ## Safety
///
/// `block` must point to a live control block and the caller must own one weak reference, which it
/// relinquishes.
pub(crate) unsafe fn release_weak(block: NonNull<Header>) {
    if unsafe { block.as_ref() }.weak.fetch_sub(1, Release) != 1 {
        return;
    }

    fence(Acquire);

    let free = unsafe { block.as_ref() }.free;
    unsafe { free(block) };
}

// === Block variants === //

/// Control block for a pointee adopted from its own heap allocation.
#[repr(C)]
struct BoxedBlock<T> {
    header: Header,
    value: *mut T,
}

/// Control block embedding the pointee's storage directly. The pointee is constructed in place
/// and, once disposed, the storage stays allocated until the last weak observer is gone.
#[repr(C)]
struct InlineBlock<T> {
    header: Header,
    disposed: bool,
    value: MaybeUninit<T>,
}

/// Allocates a [`BoxedBlock`] adopting `value`, returning the block and the pointee address. The
/// returned block starts with one strong reference.
pub(crate) fn allocate_boxed<T>(value: Box<T>) -> (NonNull<Header>, NonNull<T>) {
    let value = NonNull::from(Box::leak(value));

    let block = Box::into_raw(Box::new(BoxedBlock {
        header: Header::new(dispose_boxed::<T>, free_block::<BoxedBlock<T>>),
        value: value.as_ptr(),
    }));

    (unsafe { NonNull::new_unchecked(block.cast::<Header>()) }, value)
}

/// Allocates an [`InlineBlock`] and constructs the pointee in place from `init`, returning the
/// block and the pointee address. The returned block starts with one strong reference.
///
/// If `init` panics, the block's storage is returned to the allocator and the value slot is never
/// read, so construction is all-or-nothing from the caller's point of view.
pub(crate) fn allocate_inline<T>(init: impl FnOnce() -> T) -> (NonNull<Header>, NonNull<T>) {
    let block = Box::into_raw(Box::new(InlineBlock::<T> {
        header: Header::new(dispose_inline::<T>, free_block::<InlineBlock<T>>),
        disposed: false,
        value: MaybeUninit::uninit(),
    }));

    let guard = scopeguard::guard(block, |block| {
        drop(unsafe { Box::from_raw(block) });
    });

    let value = NonNull::from(unsafe { (*block).value.write(init()) });

    let block = ScopeGuard::into_inner(guard);

    (unsafe { NonNull::new_unchecked(block.cast::<Header>()) }, value)
}

unsafe fn dispose_boxed<T>(block: NonNull<Header>) {
    let block = block.cast::<BoxedBlock<T>>().as_ptr();

    let value = unsafe { (*block).value };
    unsafe { (*block).value = ptr::null_mut() };

    drop(unsafe { Box::from_raw(value) });
}

unsafe fn dispose_inline<T>(block: NonNull<Header>) {
    let block = block.cast::<InlineBlock<T>>().as_ptr();

    debug_assert!(unsafe { !(*block).disposed });

    unsafe { (*block).disposed = true };
    unsafe { (*block).value.assume_init_drop() };
}

unsafe fn free_block<B>(block: NonNull<Header>) {
    drop(unsafe { Box::from_raw(block.cast::<B>().as_ptr()) });
}
