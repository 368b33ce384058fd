use std::{fmt, marker::PhantomData, mem, ops::Deref, ptr, ptr::NonNull};

use derive_where::derive_where;

use crate::{
    Weak,
    block::{self, Header},
};

// === Shared === //

/// A reference-counted owning handle to a heap-allocated value of type `T`.
///
/// Cloning a `Shared` produces a new handle aliasing the same value; the value is torn down when
/// the last handle is dropped. Unlike [`std::sync::Arc`], a `Shared` may also be *empty*: an empty
/// handle owns nothing, reports a [`use_count`](Shared::use_count) of zero, and compares equal to
/// every other empty handle.
///
/// The value's storage comes from one of two places:
///
/// - [`Shared::new`] and [`Shared::new_with`] allocate the control block and the value together
///   in a single allocation (the factory path). The combined storage stays allocated until every
///   [`Weak`] observer is gone too.
/// - [`Shared::adopt`] wraps a value that already owns its own heap allocation, which is released
///   as soon as the last `Shared` is dropped.
///
/// Handles to the same value may be cloned, dropped, and [`lock`](Weak::lock)ed concurrently from
/// different threads. A single handle *instance* is not internally synchronized; share it across
/// threads by cloning it.
///
/// Reference counting cannot collect cycles: two values that hold `Shared` handles to each other
/// keep each other alive forever. Break cycles with [`Weak`].
#[derive_where(Default)]
pub struct Shared<T> {
    // Both `Some` or both `None`. The pointee address is cached here so that dereferences don't
    // have to go through the control block.
    value: Option<NonNull<T>>,
    block: Option<NonNull<Header>>,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send + Sync> Send for Shared<T> {}

unsafe impl<T: Send + Sync> Sync for Shared<T> {}

impl<T> Shared<T> {
    /// Creates an empty handle. Same as `Shared::default()`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Allocates the value and its control block together and moves `value` in.
    pub fn new(value: T) -> Self {
        Self::new_with(move || value)
    }

    /// Allocates the value and its control block together and constructs the value in place from
    /// `init`.
    ///
    /// If `init` panics, the allocation is released and the panic propagates; no partially
    /// constructed value is ever observable.
    pub fn new_with(init: impl FnOnce() -> T) -> Self {
        let (block, value) = block::allocate_inline(init);

        Self {
            value: Some(value),
            block: Some(block),
            _marker: PhantomData,
        }
    }

    /// Takes ownership of an already-boxed value, allocating a control block alongside it. The
    /// box's allocation is released when the last `Shared` handle is dropped, even if `Weak`
    /// observers remain.
    pub fn adopt(value: Box<T>) -> Self {
        let (block, value) = block::allocate_boxed(value);

        Self {
            value: Some(value),
            block: Some(block),
            _marker: PhantomData,
        }
    }

    pub(crate) fn from_parts(value: NonNull<T>, block: NonNull<Header>) -> Self {
        Self {
            value: Some(value),
            block: Some(block),
            _marker: PhantomData,
        }
    }

    pub(crate) fn parts(&self) -> Option<(NonNull<T>, NonNull<Header>)> {
        self.value.zip(self.block)
    }

    /// Whether this handle is empty.
    pub fn is_null(&self) -> bool {
        self.block.is_none()
    }

    /// The address of the pointee, or the null pointer if the handle is empty.
    pub fn as_ptr(&self) -> *const T {
        self.value.map_or(ptr::null(), |v| v.as_ptr().cast_const())
    }

    /// Borrows the pointee, returning `None` if the handle is empty.
    pub fn try_get(&self) -> Option<&T> {
        // SAFETY: while this strong handle exists the strong count is nonzero, so the pointee has
        // not been disposed.
        self.value.map(|value| unsafe { value.as_ref() })
    }

    /// Borrows the pointee, panicking if the handle is empty.
    #[track_caller]
    pub fn get(&self) -> &T {
        match self.try_get() {
            Some(value) => value,
            None => panic!("attempted to dereference an empty shared handle"),
        }
    }

    /// The number of `Shared` handles currently aliasing the pointee, or zero for an empty
    /// handle.
    pub fn use_count(&self) -> usize {
        self.block
            .map_or(0, |block| unsafe { block.as_ref() }.strong_count())
    }

    /// Whether this handle is the only strong reference to its pointee.
    pub fn is_unique(&self) -> bool {
        self.use_count() == 1
    }

    /// Replaces this handle with an empty one, dropping its reference to the pointee.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Moves this handle out, leaving an empty one behind.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Creates a [`Weak`] observer of the pointee. Downgrading an empty handle yields an empty
    /// `Weak`.
    pub fn downgrade(&self) -> Weak<T> {
        Weak::from(self)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.block {
            unsafe { block.as_ref() }.retain_strong();
        }

        Self {
            value: self.value,
            block: self.block,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let Some(block) = self.block.take() else {
            return;
        };

        self.value = None;

        // SAFETY: this handle owned one strong reference.
        unsafe { block::release_strong(block) };
    }
}

impl<T> Deref for Shared<T> {
    type Target = T;

    #[track_caller]
    fn deref(&self) -> &Self::Target {
        self.get()
    }
}

impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(value) => write!(f, "Shared({value:p})"),
            None => f.write_str("Shared(<empty>)"),
        }
    }
}

impl<T> Eq for Shared<T> {}

impl<T> PartialEq for Shared<T> {
    /// Handles compare by pointee identity, never by value: two handles are equal iff they alias
    /// the same allocation. Empty handles compare equal to each other.
    fn eq(&self, other: &Self) -> bool {
        self.as_ptr() == other.as_ptr()
    }
}

impl<T> From<Box<T>> for Shared<T> {
    fn from(value: Box<T>) -> Self {
        Self::adopt(value)
    }
}

impl<T> From<&Weak<T>> for Shared<T> {
    /// Same as [`Weak::lock`]: the result is empty if `weak` is empty or expired.
    fn from(weak: &Weak<T>) -> Self {
        weak.lock()
    }
}
