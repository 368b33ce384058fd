use std::{
    cell::Cell,
    panic::catch_unwind,
    rc::Rc,
    sync::atomic::{AtomicUsize, Ordering::Relaxed},
    thread,
};

use crate::{ExpiredError, Shared, Unique, UniqueSlice, Weak};

struct DropCounter(Rc<Cell<u32>>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn clone_tracks_use_count() {
    let first = Shared::adopt(Box::new(5));
    assert_eq!(first.use_count(), 1);
    assert!(first.is_unique());

    let second = first.clone();
    assert_eq!(first.use_count(), 2);
    assert_eq!(second.use_count(), 2);
    assert_eq!(*second, 5);
    assert!(!first.is_unique());

    drop(second);
    assert_eq!(first.use_count(), 1);
    assert!(first.is_unique());
}

#[test]
fn weak_observes_without_owning() {
    let strong = Shared::new(42);
    let weak = strong.downgrade();

    assert_eq!(strong.use_count(), 1);
    assert_eq!(weak.use_count(), 1);
    assert!(!weak.expired());
    assert_eq!(*weak.lock(), 42);

    drop(strong);

    assert!(weak.expired());
    assert_eq!(weak.use_count(), 0);
    assert!(weak.lock().is_null());
    assert_eq!(weak.try_lock(), Err(ExpiredError));
}

#[test]
fn factory_constructs_in_place() {
    #[derive(Debug)]
    struct Pair {
        a: i32,
        b: i32,
    }

    let pair = Shared::new_with(|| Pair { a: 1, b: 2 });

    assert!(!pair.as_ptr().is_null());
    assert_eq!(pair.a, 1);
    assert_eq!(pair.b, 2);
}

#[test]
fn factory_panic_propagates_cleanly() {
    let result = catch_unwind(|| Shared::new_with(|| -> u32 { panic!("init failed") }));

    assert!(result.is_err());
}

#[test]
fn equality_is_identity() {
    let first = Shared::adopt(Box::new(3));
    let second = Shared::adopt(Box::new(3));
    let alias = first.clone();

    // Value-equal pointees, distinct allocations.
    assert_ne!(first, second);
    assert_eq!(first, alias);
    assert_eq!(alias, first.clone());

    assert_eq!(Shared::<i32>::default(), Shared::empty());
    assert!(Shared::<i32>::default().is_null());
    assert_ne!(first, Shared::default());
}

#[test]
fn teardown_runs_once_with_weak_observers() {
    for adopt in [false, true] {
        let drops = Rc::new(Cell::new(0));

        let strong = if adopt {
            Shared::adopt(Box::new(DropCounter(drops.clone())))
        } else {
            Shared::new(DropCounter(drops.clone()))
        };

        let weak = strong.downgrade();
        let weak_clone = weak.clone();
        let other = strong.clone();

        drop(strong);
        assert_eq!(drops.get(), 0);

        drop(other);
        assert_eq!(drops.get(), 1);

        assert!(weak.expired());
        assert!(weak_clone.lock().is_null());

        drop(weak);
        drop(weak_clone);
        assert_eq!(drops.get(), 1);
    }
}

#[test]
fn reset_drops_one_reference() {
    let drops = Rc::new(Cell::new(0));
    let mut strong = Shared::new(DropCounter(drops.clone()));
    let alias = strong.clone();

    strong.reset();
    assert!(strong.is_null());
    assert_eq!(strong.use_count(), 0);
    assert_eq!(drops.get(), 0);
    assert_eq!(alias.use_count(), 1);

    drop(alias);
    assert_eq!(drops.get(), 1);
}

#[test]
fn shared_take_empties_source() {
    let mut source = Shared::new(8);
    let moved = source.take();

    assert!(source.is_null());
    assert_eq!(source.use_count(), 0);
    assert_eq!(moved.use_count(), 1);
    assert_eq!(*moved, 8);

    // Dropping the emptied source must not affect the count.
    drop(source);
    assert_eq!(moved.use_count(), 1);
}

#[test]
fn cloned_weak_outlives_original() {
    let strong = Shared::new(9);
    let weak = strong.downgrade();
    let clone = weak.clone();

    drop(weak);

    assert!(!clone.expired());
    assert_eq!(*clone.lock(), 9);

    drop(strong);
    assert!(clone.expired());
}

#[test]
fn weak_take_empties_source() {
    let strong = Shared::new(1);
    let mut weak = strong.downgrade();

    let moved = weak.take();
    assert!(weak.is_null());
    assert!(weak.expired());
    assert!(!moved.is_null());
    assert!(!moved.expired());
}

#[test]
fn downgrading_an_empty_shared_is_inert() {
    let empty = Shared::<u32>::default();
    let weak = empty.downgrade();

    assert!(weak.is_null());
    assert!(weak.expired());
    assert!(weak.lock().is_null());
    assert!(Shared::from(&weak).is_null());

    assert!(Weak::<u32>::empty().is_null());
    assert!(Weak::<u32>::empty().lock().is_null());
}

#[test]
#[should_panic = "empty shared handle"]
fn empty_shared_deref_panics() {
    let empty = Shared::<u32>::default();
    let _ = *empty;
}

#[test]
fn unique_take_empties_source() {
    let mut source = Unique::new(7);
    let addr = source.as_ptr();

    let moved = source.take();

    assert!(source.is_null());
    assert!(source.try_get().is_none());
    assert_eq!(moved.as_ptr(), addr);
    assert_eq!(*moved, 7);
}

#[test]
fn unique_release_transfers_ownership() {
    let drops = Rc::new(Cell::new(0));
    let mut handle = Unique::new(DropCounter(drops.clone()));

    let released = handle.release().unwrap();
    assert!(handle.is_null());
    assert!(handle.release().is_none());
    assert_eq!(drops.get(), 0);

    drop(released);
    assert_eq!(drops.get(), 1);

    // Dropping the emptied handle must be a no-op.
    drop(handle);
    assert_eq!(drops.get(), 1);
}

#[test]
fn unique_reset_drops_in_place() {
    let drops = Rc::new(Cell::new(0));
    let mut handle = Unique::new(DropCounter(drops.clone()));

    handle.reset();
    assert!(handle.is_null());
    assert_eq!(drops.get(), 1);
}

#[test]
fn unique_deref_mut() {
    let mut value = Unique::new(1);
    *value += 5;
    assert_eq!(*value, 6);
}

#[test]
#[should_panic = "empty unique handle"]
fn empty_unique_deref_panics() {
    let empty = Unique::<u32>::default();
    let _ = *empty;
}

#[test]
fn slice_round_trip() {
    let mut values = UniqueSlice::filled(100, 0usize);
    assert_eq!(values.len(), 100);

    for i in 0..100 {
        values[i] = i;
    }

    for i in 0..100 {
        assert_eq!(values[i], i);
    }
}

#[test]
fn slice_from_fn() {
    let values = UniqueSlice::from_fn(10, |i| i * i);

    assert_eq!(values.len(), 10);
    assert_eq!(values[3], 9);
    assert_eq!(&values[..3], &[0, 1, 4]);
}

#[test]
fn slice_release_and_take() {
    let mut values = UniqueSlice::from(vec![1, 2, 3]);

    let mut moved = values.take();
    assert!(values.is_null());
    assert_eq!(values.len(), 0);
    assert_eq!(moved.len(), 3);

    let released = moved.release().unwrap();
    assert!(moved.is_null());
    assert_eq!(released.as_ref(), &[1, 2, 3]);
}

#[test]
fn slice_drops_every_element() {
    let drops = Rc::new(Cell::new(0));
    let values = UniqueSlice::from_fn(4, |_| DropCounter(drops.clone()));

    drop(values);
    assert_eq!(drops.get(), 4);
}

#[test]
fn concurrent_clone_drop_lock() {
    let total = Shared::new(AtomicUsize::new(0));
    let weak = total.downgrade();

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let total = total.clone();
            let weak = weak.clone();

            thread::spawn(move || {
                for _ in 0..1_000 {
                    let alias = total.clone();
                    alias.get().fetch_add(1, Relaxed);

                    let locked = weak.lock();
                    assert!(!locked.is_null());
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(total.get().load(Relaxed), 8_000);
    assert_eq!(total.use_count(), 1);

    drop(total);
    assert!(weak.expired());
}

#[test]
fn lock_never_resurrects() {
    for _ in 0..100 {
        let strong = Shared::new(0u32);
        let weak = strong.downgrade();

        let dropper = thread::spawn(move || drop(strong));
        let locker = thread::spawn(move || {
            loop {
                let locked = weak.lock();

                if locked.is_null() {
                    assert!(weak.expired());
                    break;
                }

                assert_eq!(*locked, 0);
            }
        });

        dropper.join().unwrap();
        locker.join().unwrap();
    }
}
