use std::{
    fmt,
    marker::PhantomData,
    mem,
    ops::{Deref, DerefMut},
    ptr::{self, NonNull},
    slice,
};

use derive_where::derive_where;

// === Unique === //

/// A move-only handle owning exactly one heap-allocated value, or nothing.
///
/// `Unique` is deliberately independent of the reference-counting machinery behind [`Shared`]:
/// there is no control block and no counter, just a pointer that exactly one handle owns at a
/// time. It cannot be cloned; ownership moves. Rust's move semantics make the moved-from binding
/// unusable outright, and [`take`](Unique::take) provides the observable form of a move, leaving
/// an empty handle behind.
///
/// [`Shared`]: crate::Shared
#[derive_where(Default)]
pub struct Unique<T> {
    value: Option<NonNull<T>>,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send> Send for Unique<T> {}

unsafe impl<T: Sync> Sync for Unique<T> {}

impl<T> Unique<T> {
    /// Creates an empty handle. Same as `Unique::default()`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Allocates `value` on the heap and takes sole ownership of it.
    pub fn new(value: T) -> Self {
        Self::from(Box::new(value))
    }

    /// Whether this handle is empty.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// The address of the owned value, or the null pointer if the handle is empty.
    pub fn as_ptr(&self) -> *const T {
        self.value.map_or(ptr::null(), |v| v.as_ptr().cast_const())
    }

    /// Borrows the owned value, returning `None` if the handle is empty.
    pub fn try_get(&self) -> Option<&T> {
        // SAFETY: the pointee is owned by this handle and lives until `reset`/`release`/drop.
        self.value.map(|value| unsafe { value.as_ref() })
    }

    /// Mutably borrows the owned value, returning `None` if the handle is empty.
    pub fn try_get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: sole ownership makes the mutable borrow exclusive.
        self.value.map(|mut value| unsafe { value.as_mut() })
    }

    /// Borrows the owned value, panicking if the handle is empty.
    #[track_caller]
    pub fn get(&self) -> &T {
        match self.try_get() {
            Some(value) => value,
            None => panic!("attempted to dereference an empty unique handle"),
        }
    }

    /// Mutably borrows the owned value, panicking if the handle is empty.
    #[track_caller]
    pub fn get_mut(&mut self) -> &mut T {
        match self.try_get_mut() {
            Some(value) => value,
            None => panic!("attempted to dereference an empty unique handle"),
        }
    }

    /// Drops the owned value, leaving the handle empty.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Moves this handle out, leaving an empty one behind.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Transfers ownership of the value to the caller without dropping it, leaving the handle
    /// empty. Returns `None` if the handle was already empty.
    pub fn release(&mut self) -> Option<Box<T>> {
        // SAFETY: the pointer originates from `Box::leak` and is owned by this handle.
        self.value
            .take()
            .map(|value| unsafe { Box::from_raw(value.as_ptr()) })
    }
}

impl<T> From<Box<T>> for Unique<T> {
    fn from(value: Box<T>) -> Self {
        Self {
            value: Some(NonNull::from(Box::leak(value))),
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for Unique<T> {
    fn drop(&mut self) {
        drop(self.release());
    }
}

impl<T> Deref for Unique<T> {
    type Target = T;

    #[track_caller]
    fn deref(&self) -> &Self::Target {
        self.get()
    }
}

impl<T> DerefMut for Unique<T> {
    #[track_caller]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.get_mut()
    }
}

impl<T> fmt::Debug for Unique<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(value) => write!(f, "Unique({value:p})"),
            None => f.write_str("Unique(<empty>)"),
        }
    }
}

// === UniqueSlice === //

/// A move-only handle owning a heap-allocated array of `T`, or nothing.
///
/// The array variant of [`Unique`]: same single-owner contract, plus indexed element access
/// through its `Deref` to `[T]`. The destructor and [`release`](UniqueSlice::release) use
/// slice-appropriate deallocation.
#[derive_where(Default)]
pub struct UniqueSlice<T> {
    ptr: Option<NonNull<T>>,
    len: usize,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send> Send for UniqueSlice<T> {}

unsafe impl<T: Sync> Sync for UniqueSlice<T> {}

impl<T> UniqueSlice<T> {
    /// Creates an empty handle. Same as `UniqueSlice::default()`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Allocates a `len`-element array whose `i`-th element is `f(i)`.
    pub fn from_fn(len: usize, f: impl FnMut(usize) -> T) -> Self {
        Self::from((0..len).map(f).collect::<Box<[T]>>())
    }

    /// Allocates a `len`-element array filled with clones of `value`.
    pub fn filled(len: usize, value: T) -> Self
    where
        T: Clone,
    {
        Self::from(vec![value; len].into_boxed_slice())
    }

    /// Whether this handle is empty. A zero-length array is still a non-null handle; see
    /// [`is_empty`](UniqueSlice::is_empty) for the length check.
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// The number of elements in the owned array (zero if the handle is empty).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the owned array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The address of the first element, or the null pointer if the handle is empty.
    pub fn as_ptr(&self) -> *const T {
        self.ptr.map_or(ptr::null(), |v| v.as_ptr().cast_const())
    }

    /// Borrows the owned elements. An empty handle borrows as the empty slice.
    pub fn as_slice(&self) -> &[T] {
        match self.ptr {
            // SAFETY: the pointee array is owned by this handle and `len` matches its allocation.
            Some(ptr) => unsafe { slice::from_raw_parts(ptr.as_ptr(), self.len) },
            None => &[],
        }
    }

    /// Mutably borrows the owned elements. An empty handle borrows as the empty slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self.ptr {
            // SAFETY: sole ownership makes the mutable borrow exclusive.
            Some(ptr) => unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), self.len) },
            None => &mut [],
        }
    }

    /// Drops the owned array, leaving the handle empty.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Moves this handle out, leaving an empty one behind.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Transfers ownership of the array to the caller without dropping it, leaving the handle
    /// empty. Returns `None` if the handle was already empty.
    pub fn release(&mut self) -> Option<Box<[T]>> {
        let ptr = self.ptr.take()?;
        let len = mem::take(&mut self.len);

        // SAFETY: the pointer and length originate from a leaked `Box<[T]>`.
        Some(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(ptr.as_ptr(), len)) })
    }
}

impl<T> From<Box<[T]>> for UniqueSlice<T> {
    fn from(values: Box<[T]>) -> Self {
        let len = values.len();
        let ptr = NonNull::from(Box::leak(values)).cast::<T>();

        Self {
            ptr: Some(ptr),
            len,
            _marker: PhantomData,
        }
    }
}

impl<T> From<Vec<T>> for UniqueSlice<T> {
    fn from(values: Vec<T>) -> Self {
        Self::from(values.into_boxed_slice())
    }
}

impl<T> Drop for UniqueSlice<T> {
    fn drop(&mut self) {
        drop(self.release());
    }
}

impl<T> Deref for UniqueSlice<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T> DerefMut for UniqueSlice<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T> fmt::Debug for UniqueSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ptr {
            Some(ptr) => write!(f, "UniqueSlice({:p}; {})", ptr, self.len),
            None => f.write_str("UniqueSlice(<empty>)"),
        }
    }
}
