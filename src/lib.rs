//! Reference-counted and exclusive ownership handles with deterministic destruction.
//!
//! This crate provides three pointer abstractions over heap-allocated values for code that wants
//! shared ownership with reference-counting semantics but explicit control over *when* things
//! happen:
//!
//! - [`Shared<T>`]: a reference-counted owning handle. Cloning it aliases the value; dropping the
//!   last clone tears the value down immediately.
//! - [`Weak<T>`]: a non-owning observer of a `Shared` value. It never extends the value's
//!   lifetime but can tell whether the value is still alive and, if so, promote itself to a
//!   `Shared`.
//! - [`Unique<T>`] and [`UniqueSlice<T>`]: move-only sole-ownership handles for a single value
//!   and for an array, independent of the reference-counting machinery.
//!
//! ```
//! use retain::{Shared, Unique};
//!
//! let first = Shared::new(vec![1, 2, 3]);
//! let second = first.clone();
//! assert_eq!(first.use_count(), 2);
//! assert_eq!(first, second);
//!
//! let weak = first.downgrade();
//! assert_eq!(first.use_count(), 2);
//!
//! drop((first, second));
//! assert!(weak.expired());
//! assert!(weak.lock().is_null());
//!
//! let mut sole = Unique::new(5);
//! *sole += 1;
//! assert_eq!(*sole, 6);
//! ```
//!
//! # Lifecycle
//!
//! Every `Shared` value is backed by a control block holding two atomic counters: the *strong*
//! count (live `Shared` handles) and the *weak* count (live `Weak` observers). The two counts
//! gate two distinct events:
//!
//! 1. When the strong count reaches zero the value is **disposed**: its destructor runs, exactly
//!    once, on the thread that dropped the last `Shared`.
//! 2. When the weak count also reaches zero the control block's storage is **freed**. Whichever
//!    side reaches zero last performs the release.
//!
//! The gap between the two events is what makes `Weak` useful: observers can outlive the value
//! and still safely ask [`Weak::expired`] or attempt [`Weak::lock`].
//!
//! Where the value's own storage lives depends on how the `Shared` was made. [`Shared::new`] and
//! [`Shared::new_with`] place the value inside the control block itself — one allocation, but the
//! full footprint stays resident until the last observer is gone. [`Shared::adopt`] wraps a value
//! that already owns its allocation, which is returned to the allocator at dispose time.
//!
//! # Empty handles
//!
//! All four handle types have an *empty* state (`Default`), mirroring a null pointer. Checked
//! accessors ([`Shared::try_get`], [`Weak::try_lock`], ...) surface emptiness as `Option`/
//! `Result`; the unchecked accessors and the `Deref` impls panic on an empty handle rather than
//! touch invalid memory.
//!
//! # Threading
//!
//! The counters are atomic: distinct handles aliasing the same value may be cloned, dropped,
//! downgraded, and locked concurrently from different threads (`Shared<T>`/`Weak<T>` are
//! `Send + Sync` for `T: Send + Sync`). A single handle *instance* is not a synchronization
//! primitive; two threads mutating the same handle variable need external synchronization, as
//! with any other `&mut` access.
//!
//! # Cycles
//!
//! There is no cycle collector. Values that hold `Shared` handles forming a cycle keep each other
//! alive forever; this is the standard reference-counting contract, not a bug. Point one
//! direction of such a relationship through a [`Weak`] instead.

mod block;

mod shared;
pub use self::shared::*;

mod unique;
pub use self::unique::*;

mod weak;
pub use self::weak::*;

#[cfg(test)]
mod tests;
