use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

/// A mutual exclusion lock with a guard-scoped critical section.
pub trait Lock<'a> {
    type Guard;
    fn lock(&'a self) -> Self::Guard;
    fn new() -> Self;
}

/// Mutex that parks waiters on a single futex word.
#[derive(Debug)]
pub struct Futex {
    state: AtomicU32,
}

pub struct FutexGuard<'a> {
    futex: &'a Futex,
}

impl Drop for FutexGuard<'_> {
    fn drop(&mut self) {
        self.futex.state.store(0, Ordering::Release);
        atomic_wait::wake_one(&self.futex.state);
    }
}

impl<'a> Lock<'a> for Futex {
    type Guard = FutexGuard<'a>;
    fn new() -> Self {
        Futex {
            state: AtomicU32::new(0),
        }
    }

    fn lock(&'a self) -> Self::Guard {
        while self
            .state
            .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            atomic_wait::wait(&self.state, 1);
        }
        Self::Guard { futex: self }
    }
}

/// Write-locked sentinel for [`RwFutex`]. Any other state value is the
/// number of active readers.
const WRITER: u32 = u32::MAX;

/// Reader/writer lock on a single futex word.
///
/// The read side never blocks: `try_read` either enters or reports that a
/// writer is holding the lock. Only writers park. This is the building
/// block for [`crate::rcu::PoorMansRcu`] and
/// [`crate::leftright::LeftRight`], which probe two of these in turn so a
/// reader always finds one of them unlocked.
#[derive(Debug)]
pub struct RwFutex {
    state: AtomicU32,
}

impl Default for RwFutex {
    fn default() -> Self {
        Self::new()
    }
}

impl RwFutex {
    pub const fn new() -> Self {
        RwFutex {
            state: AtomicU32::new(0),
        }
    }

    /// Try to enter a read-side critical section.
    ///
    /// Returns false if a writer currently holds the lock. Lock-free: the
    /// CAS only retries when another reader got in first.
    pub fn try_read(&self) -> bool {
        let mut s = self.state.load(Ordering::Relaxed);
        loop {
            if s == WRITER {
                return false;
            }
            match self
                .state
                .compare_exchange_weak(s, s + 1, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => return true,
                Err(v) => s = v,
            }
        }
    }

    /// Leave a read-side critical section. Wait-free.
    pub fn read_unlock(&self) {
        if self.state.fetch_sub(1, Ordering::Release) == 1 {
            // last reader out, a writer may be parked
            atomic_wait::wake_one(&self.state);
        }
    }

    /// Take the lock exclusively, blocking until all readers have departed.
    pub fn write_lock(&self) {
        loop {
            let s = self.state.load(Ordering::Relaxed);
            if s == 0 {
                if self
                    .state
                    .compare_exchange(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return;
                }
            } else {
                atomic_wait::wait(&self.state, s);
            }
        }
    }

    /// Release the exclusive lock. Wait-free.
    pub fn write_unlock(&self) {
        self.state.store(0, Ordering::Release);
        atomic_wait::wake_all(&self.state);
    }
}

static NEXT_THREAD_ID: AtomicI64 = AtomicI64::new(1);

thread_local! {
    static THREAD_ID: i64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Dense nonzero identity for the calling thread.
///
/// Ids start at 1 so their negation is always distinguishable, which the
/// tidex lock relies on. Ids are never reused within a process.
pub fn thread_id() -> i64 {
    THREAD_ID.with(|id| *id)
}
