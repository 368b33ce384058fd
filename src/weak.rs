use std::{fmt, marker::PhantomData, mem, ptr::NonNull};

use derive_where::derive_where;
use thiserror::Error;

use crate::{
    Shared,
    block::{self, Header},
};

// === ExpiredError === //

/// Error returned by [`Weak::try_lock`] when the observed value has already been torn down (or
/// the handle was empty to begin with).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Error)]
#[error("shared value has already been dropped")]
pub struct ExpiredError;

// === Weak === //

/// A non-owning observer of a value managed by [`Shared`] handles.
///
/// A `Weak` never keeps the pointee alive: once the last `Shared` is dropped the value is torn
/// down regardless of how many observers remain. What a `Weak` *does* keep alive is the control
/// block, so that [`expired`](Weak::expired) and [`lock`](Weak::lock) stay safe to call after the
/// pointee is gone.
///
/// Like [`Shared`], a `Weak` may be empty.
#[derive_where(Default)]
pub struct Weak<T> {
    // Both `Some` or both `None`. The cached pointee address is only dereferenced after a
    // successful `lock`, which guarantees the pointee has not been disposed.
    value: Option<NonNull<T>>,
    block: Option<NonNull<Header>>,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send + Sync> Send for Weak<T> {}

unsafe impl<T: Send + Sync> Sync for Weak<T> {}

impl<T> Weak<T> {
    /// Creates an empty observer. Same as `Weak::default()`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this handle is empty. Note that a non-empty handle whose pointee is gone is *not*
    /// null; it is [`expired`](Weak::expired).
    pub fn is_null(&self) -> bool {
        self.block.is_none()
    }

    /// Whether the observed value has been torn down. Empty handles are always expired.
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// The number of `Shared` handles currently keeping the pointee alive, or zero if this handle
    /// is empty or expired.
    pub fn use_count(&self) -> usize {
        self.block
            .map_or(0, |block| unsafe { block.as_ref() }.strong_count())
    }

    /// Attempts to promote this observer to an owning [`Shared`] handle, returning an empty
    /// handle if the pointee has already been torn down.
    ///
    /// The check and the strong-count increment are a single atomic operation: `lock` can never
    /// obtain a handle to a value another thread has started disposing.
    pub fn lock(&self) -> Shared<T> {
        let (Some(value), Some(block)) = (self.value, self.block) else {
            return Shared::default();
        };

        if unsafe { block.as_ref() }.try_retain_strong() {
            Shared::from_parts(value, block)
        } else {
            Shared::default()
        }
    }

    /// Checked variant of [`Weak::lock`].
    pub fn try_lock(&self) -> Result<Shared<T>, ExpiredError> {
        let locked = self.lock();

        if locked.is_null() {
            Err(ExpiredError)
        } else {
            Ok(locked)
        }
    }

    /// Moves this handle out, leaving an empty one behind.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }
}

impl<T> From<&Shared<T>> for Weak<T> {
    fn from(shared: &Shared<T>) -> Self {
        let Some((value, block)) = shared.parts() else {
            return Self::default();
        };

        unsafe { block.as_ref() }.retain_weak();

        Self {
            value: Some(value),
            block: Some(block),
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Weak<T> {
    fn clone(&self) -> Self {
        // Every observer counts towards the weak count, copies included; the block must outlive
        // the copy.
        if let Some(block) = self.block {
            unsafe { block.as_ref() }.retain_weak();
        }

        Self {
            value: self.value,
            block: self.block,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for Weak<T> {
    fn drop(&mut self) {
        let Some(block) = self.block.take() else {
            return;
        };

        // SAFETY: this handle owned one weak reference.
        unsafe { block::release_weak(block) };
    }
}

impl<T> fmt::Debug for Weak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(value) => write!(f, "Weak({value:p})"),
            None => f.write_str("Weak(<empty>)"),
        }
    }
}
