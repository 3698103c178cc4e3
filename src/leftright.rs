//! Left-right dual-instance guard: two live copies of a value, two
//! reader/writer locks and one writer mutex, arranged so a reader can
//! always get lock-free access to some consistent copy while a writer
//! updates the other.
use crate::utils::{Futex, FutexGuard, Lock, RwFutex};
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};

/// Guard holding two equivalent instances of `T`.
///
/// Reads are never blocked by a writer, at the cost of doubled storage and
/// a writer paying for two lock transitions. The writer protocol is
/// encoded in the guard types: [`write_begin`](LeftRight::write_begin)
/// yields the first copy, [`toggle`](WriteFirst::toggle) the second, and
/// dropping the second guard ends the write. The caller must apply the
/// identical mutation to both copies; the mutation must have no effects
/// outside the instance. That precondition cannot be checked here.
///
/// For the common case, [`apply`](LeftRight::apply) runs the whole
/// protocol with one closure.
#[derive(Debug)]
pub struct LeftRight<T> {
    instances: [UnsafeCell<T>; 2],
    rwlocks: [RwFutex; 2],
    writers: Futex,
}

unsafe impl<T: Send> Send for LeftRight<T> {}
unsafe impl<T: Send + Sync> Sync for LeftRight<T> {}

impl<T: Clone> LeftRight<T> {
    /// Build from one value, cloning it for the second instance.
    pub fn from_value(value: T) -> Self {
        let copy = value.clone();
        Self::new(value, copy)
    }
}

impl<T> LeftRight<T> {
    /// The two instances must start out equivalent.
    pub fn new(left: T, right: T) -> Self {
        LeftRight {
            instances: [UnsafeCell::new(left), UnsafeCell::new(right)],
            rwlocks: [RwFutex::new(), RwFutex::new()],
            writers: Futex::new(),
        }
    }

    /// Get read access to whichever copy is not write-locked.
    ///
    /// Lock-free: at least one rwlock always admits readers, so the probe
    /// loop finishes in a bounded number of retries even while a writer is
    /// mid-protocol.
    pub fn read_access(&self) -> ReadGuard<'_, T> {
        loop {
            if self.rwlocks[0].try_read() {
                return ReadGuard { lr: self, which: 0 };
            }
            if self.rwlocks[1].try_read() {
                return ReadGuard { lr: self, which: 1 };
            }
        }
    }

    /// Run `f` against a consistent copy. Lock-free.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.read_access();
        f(&guard)
    }

    /// Start a write: serialize against other writers, then take the
    /// second copy exclusively once its readers have drained. Blocking.
    pub fn write_begin(&self) -> WriteFirst<'_, T> {
        let mutex = self.writers.lock();
        self.rwlocks[1].write_lock();
        WriteFirst {
            lr: self,
            mutex: Some(mutex),
            toggled: false,
        }
    }

    /// Apply the same mutation to both copies in sequence, readers always
    /// finding an unlocked copy. `f` must be deterministic and free of
    /// effects outside the instance; if it panics between the two
    /// applications the copies diverge.
    pub fn apply(&self, f: impl Fn(&mut T)) {
        let mut first = self.write_begin();
        f(&mut first);
        let mut second = first.toggle();
        f(&mut second);
    }
}

/// Read access to one copy; dropping it releases the lock that was taken.
pub struct ReadGuard<'a, T> {
    lr: &'a LeftRight<T>,
    which: usize,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // the rwlock at `which` is held shared, so no writer can hold
        // this instance exclusively
        unsafe { &*self.lr.instances[self.which].get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    /// Wait-free.
    fn drop(&mut self) {
        self.lr.rwlocks[self.which].read_unlock();
    }
}

/// First half of a write: exclusive access to the second copy while
/// readers use the first.
pub struct WriteFirst<'a, T> {
    lr: &'a LeftRight<T>,
    mutex: Option<FutexGuard<'a>>,
    toggled: bool,
}

impl<'a, T> WriteFirst<'a, T> {
    /// Hand the first copy back to the readers and take the second copy
    /// exclusively. The caller must now repeat on it exactly the mutation
    /// it applied before toggling. Blocking.
    pub fn toggle(mut self) -> WriteSecond<'a, T> {
        self.toggled = true;
        self.lr.rwlocks[1].write_unlock();
        self.lr.rwlocks[0].write_lock();
        WriteSecond {
            lr: self.lr,
            _mutex: self.mutex.take(),
        }
    }
}

impl<T> Deref for WriteFirst<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lr.instances[1].get() }
    }
}

impl<T> DerefMut for WriteFirst<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // rwlock 1 is held exclusively
        unsafe { &mut *self.lr.instances[1].get() }
    }
}

impl<T> Drop for WriteFirst<'_, T> {
    fn drop(&mut self) {
        if !self.toggled {
            // abandoned before toggle, release what write_begin took;
            // the writer mutex follows when the Option drops
            self.lr.rwlocks[1].write_unlock();
        }
    }
}

/// Second half of a write: exclusive access to the first copy.
pub struct WriteSecond<'a, T> {
    lr: &'a LeftRight<T>,
    _mutex: Option<FutexGuard<'a>>,
}

impl<T> Deref for WriteSecond<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lr.instances[0].get() }
    }
}

impl<T> DerefMut for WriteSecond<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // rwlock 0 is held exclusively
        unsafe { &mut *self.lr.instances[0].get() }
    }
}

impl<T> Drop for WriteSecond<'_, T> {
    /// Ends the write: releases the first copy and the writer mutex.
    fn drop(&mut self) {
        self.lr.rwlocks[0].write_unlock();
    }
}
