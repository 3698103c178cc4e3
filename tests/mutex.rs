use quiesce::mutex::{TicketMutex, TidexMutex};
use std::cell::UnsafeCell;
use std::thread;

// A counter the mutex under test is expected to make safe to update
// non-atomically: any mutual exclusion failure shows up as lost updates.
struct Shared(UnsafeCell<u64>);
unsafe impl Sync for Shared {}

const THREADS: u64 = 8;
const CYCLES: u64 = 10_000;

#[test]
fn ticket_counter_is_exact() {
    let mutex = TicketMutex::new();
    let counter = Shared(UnsafeCell::new(0));
    thread::scope(|s| {
        for i in 0..THREADS {
            let mutex = &mutex;
            let counter = &counter;
            thread::Builder::new()
                .name(format!("ticket-{}", i))
                .spawn_scoped(s, move || {
                    for _ in 0..CYCLES {
                        let guard = mutex.lock();
                        unsafe { *counter.0.get() += 1 };
                        drop(guard);
                    }
                })
                .unwrap();
        }
    });
    assert_eq!(unsafe { *counter.0.get() }, THREADS * CYCLES);
}

#[test]
fn tidex_counter_is_exact() {
    let mutex = TidexMutex::new();
    let counter = Shared(UnsafeCell::new(0));
    thread::scope(|s| {
        for i in 0..THREADS {
            let mutex = &mutex;
            let counter = &counter;
            thread::Builder::new()
                .name(format!("tidex-{}", i))
                .spawn_scoped(s, move || {
                    for _ in 0..CYCLES {
                        let guard = mutex.lock();
                        unsafe { *counter.0.get() += 1 };
                        drop(guard);
                    }
                })
                .unwrap();
        }
    });
    assert_eq!(unsafe { *counter.0.get() }, THREADS * CYCLES);
}

// the array-consistency check: both slots are bumped inside the critical
// section, so any observer inside it must always see them equal
#[test]
fn tidex_critical_section_is_consistent() {
    let mutex = TidexMutex::new();
    let slots = Shared(UnsafeCell::new(0));
    let slots2 = Shared(UnsafeCell::new(0));
    thread::scope(|s| {
        for _ in 0..4 {
            let mutex = &mutex;
            let slots = &slots;
            let slots2 = &slots2;
            s.spawn(move || {
                for _ in 0..1000 {
                    let _guard = mutex.lock();
                    unsafe {
                        *slots.0.get() += 1;
                        assert_eq!(*slots.0.get(), *slots2.0.get() + 1);
                        *slots2.0.get() += 1;
                    }
                }
            });
        }
    });
    assert_eq!(unsafe { *slots.0.get() }, 4000);
}

#[test]
fn ticket_try_lock_reports_busy() {
    let mutex = TicketMutex::new();
    let guard = mutex.lock();
    thread::scope(|s| {
        s.spawn(|| {
            assert!(mutex.try_lock().is_none());
        });
    });
    drop(guard);
    assert!(mutex.try_lock().is_some());
}

#[test]
fn tidex_try_lock_reports_busy() {
    let mutex = TidexMutex::new();
    let guard = mutex.lock();
    thread::scope(|s| {
        s.spawn(|| {
            assert!(mutex.try_lock().is_none());
        });
    });
    drop(guard);
    assert!(mutex.try_lock().is_some());
}

// a thread that starts waiting first acquires first: the holder drains
// the queue in ticket order
#[test]
fn ticket_handoff_is_fifo() {
    let mutex = TicketMutex::new();
    let order = Shared(UnsafeCell::new(0u64));
    let guard = mutex.lock();
    thread::scope(|s| {
        for i in 1..=4u64 {
            let mutex = &mutex;
            let order = &order;
            thread::Builder::new()
                .name(format!("waiter-{}", i))
                .spawn_scoped(s, move || {
                    let _guard = mutex.lock();
                    // tickets were drawn in spawn order, so each waiter
                    // must see exactly the waiters before it done
                    unsafe {
                        assert_eq!(*order.0.get(), i - 1);
                        *order.0.get() = i;
                    }
                })
                .unwrap();
            // let the waiter draw its ticket before spawning the next
            thread::sleep(std::time::Duration::from_millis(20));
        }
        drop(guard);
    });
    assert_eq!(unsafe { *order.0.get() }, 4);
}

// same handoff-order check for the tidex lock: the swap chain hands the
// lock over in the order the waiters swapped themselves in
#[test]
fn tidex_handoff_is_fifo() {
    let mutex = TidexMutex::new();
    let order = Shared(UnsafeCell::new(0u64));
    let guard = mutex.lock();
    thread::scope(|s| {
        for i in 1..=4u64 {
            let mutex = &mutex;
            let order = &order;
            thread::Builder::new()
                .name(format!("tidex-waiter-{}", i))
                .spawn_scoped(s, move || {
                    let _guard = mutex.lock();
                    unsafe {
                        assert_eq!(*order.0.get(), i - 1);
                        *order.0.get() = i;
                    }
                })
                .unwrap();
            // let the waiter swap its id in before spawning the next
            thread::sleep(std::time::Duration::from_millis(20));
        }
        drop(guard);
    });
    assert_eq!(unsafe { *order.0.get() }, 4);
}

// back-to-back acquisitions from one thread exercise the id negation path
#[test]
fn tidex_relock_same_thread() {
    let mutex = TidexMutex::new();
    for _ in 0..5 {
        let guard = mutex.lock();
        drop(guard);
    }
    let guard = mutex.try_lock();
    assert!(guard.is_some());
    drop(guard);
    assert!(mutex.try_lock().is_some());
}
