//! RCU synchronization engines. Readers are "arrivers": they bracket
//! every access to protected state with `read_lock`/`read_unlock`.
//! Writers are "togglers": they publish a new state, call `synchronize`,
//! and only then reclaim the old one, certain that no reader still holds
//! a reference into it.
use crate::utils::{Futex, Lock, RwFutex};
use crate::{Error, Rcu, ReadIndicator};
use crossbeam_utils::CachePadded;
use std::hint;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// RCU built from nothing but one mutex and two reader/writer locks.
///
/// read_lock is lock-free, read_unlock wait-free, synchronize blocking.
///
/// synchronize write-locks rwlock2 first and then rwlock1, the opposite of
/// the reader probe order, for a slight probabilistic reduction in
/// contention; either order is correct.
#[derive(Debug)]
pub struct PoorMansRcu {
    toggler: Futex,
    rwlock1: RwFutex,
    rwlock2: RwFutex,
}

impl Default for PoorMansRcu {
    fn default() -> Self {
        Self::new()
    }
}

impl PoorMansRcu {
    pub fn new() -> Self {
        PoorMansRcu {
            toggler: Futex::new(),
            rwlock1: RwFutex::new(),
            rwlock2: RwFutex::new(),
        }
    }
}

impl Rcu for PoorMansRcu {
    /// Which of the two rwlocks was entered.
    type Token = usize;

    /// Lock-free: each probe either enters or fails because a writer holds
    /// that rwlock, and the writer never holds both at once.
    fn read_lock(&self, _tid: usize) -> usize {
        loop {
            if self.rwlock1.try_read() {
                return 1;
            }
            if self.rwlock2.try_read() {
                return 2;
            }
        }
    }

    /// Wait-free.
    fn read_unlock(&self, token: usize, _tid: usize) {
        if token == 1 {
            self.rwlock1.read_unlock();
        } else {
            self.rwlock2.read_unlock();
        }
    }

    /// Blocking. Acquiring and releasing each rwlock exclusively forces
    /// the completion of every read-side critical section in flight when
    /// this was called.
    fn synchronize(&self) {
        let _toggler = self.toggler.lock();
        self.rwlock2.write_lock();
        self.rwlock2.write_unlock();
        self.rwlock1.write_lock();
        self.rwlock1.write_unlock();
    }
}

/// RCU over a pair of pluggable read indicators and an updater version.
///
/// Readers arrive on the indicator selected by the low bit of the version;
/// synchronize drains the other one, bumps the version, and drains the one
/// readers were on. Concurrent synchronize calls share the grace period:
/// whoever observes the version already advanced past its target returns
/// immediately.
#[derive(Debug)]
pub struct TwoPhaseRcu<RI> {
    version: CachePadded<AtomicI64>,
    indicators: [RI; 2],
}

impl<RI: ReadIndicator + Default> Default for TwoPhaseRcu<RI> {
    fn default() -> Self {
        Self::new()
    }
}

impl<RI: ReadIndicator + Default> TwoPhaseRcu<RI> {
    pub fn new() -> Self {
        TwoPhaseRcu {
            version: CachePadded::new(AtomicI64::new(0)),
            indicators: [RI::default(), RI::default()],
        }
    }
}

impl<RI: ReadIndicator> TwoPhaseRcu<RI> {
    pub fn with_indicators(first: RI, second: RI) -> Self {
        TwoPhaseRcu {
            version: CachePadded::new(AtomicI64::new(0)),
            indicators: [first, second],
        }
    }
}

impl<RI: ReadIndicator> Rcu for TwoPhaseRcu<RI> {
    /// Index of the indicator arrived on.
    type Token = usize;

    /// Lock-free on the read side; wait-free where the indicator's arrive
    /// is wait-free.
    fn read_lock(&self, tid: usize) -> usize {
        let index = (self.version.load(Ordering::SeqCst) & 1) as usize;
        self.indicators[index].arrive(tid);
        index
    }

    /// Wait-free.
    fn read_unlock(&self, token: usize, tid: usize) {
        self.indicators[token].depart(tid);
    }

    /// Blocking, with grace-period sharing between concurrent callers.
    fn synchronize(&self) {
        let curr_version = self.version.load(Ordering::SeqCst);
        let next_version = curr_version + 1;
        // drain the indicator readers will arrive on after the bump
        while !self.indicators[(next_version & 1) as usize].is_empty() {
            let v = self.version.load(Ordering::SeqCst);
            if v > next_version {
                // someone else already completed our grace period
                return;
            }
            if v == next_version {
                break;
            }
            hint::spin_loop();
        }
        if self.version.load(Ordering::SeqCst) == curr_version {
            let _ = self.version.compare_exchange(
                curr_version,
                next_version,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
        // drain the indicator readers were on before the bump
        while !self.indicators[(curr_version & 1) as usize].is_empty() {
            if self.version.load(Ordering::SeqCst) > next_version {
                return;
            }
            hint::spin_loop();
        }
    }
}

const NOT_READING: u64 = u64::MAX - 1;
const UNASSIGNED: u64 = u64::MAX - 2;

/// RCU where each registered reader stamps itself with the version it
/// observed, letting concurrent synchronize calls share grace periods.
///
/// Fixed capacity: `register_thread` hands out at most `max_threads`
/// slots and reports exhaustion to the caller rather than growing.
/// read_lock/read_unlock are wait-free population-oblivious, synchronize
/// is blocking and scans every slot.
#[derive(Debug)]
pub struct ReadersVersionRcu {
    reclaimer_version: CachePadded<AtomicU64>,
    readers_version: Box<[CachePadded<AtomicU64>]>,
}

impl Default for ReadersVersionRcu {
    fn default() -> Self {
        Self::with_max_threads(32)
    }
}

impl ReadersVersionRcu {
    pub fn new() -> Self {
        Self::default()
    }

    /// `max_threads` bounds the number of concurrently registered readers.
    pub fn with_max_threads(max_threads: usize) -> Self {
        let readers_version = (0..max_threads)
            .map(|_| CachePadded::new(AtomicU64::new(UNASSIGNED)))
            .collect();
        ReadersVersionRcu {
            reclaimer_version: CachePadded::new(AtomicU64::new(0)),
            readers_version,
        }
    }

    pub fn max_threads(&self) -> usize {
        self.readers_version.len()
    }

    /// Claim a reader slot; the returned index is the `tid` for the other
    /// operations. Fails when all slots are taken, leaving registered
    /// readers untouched.
    pub fn register_thread(&self) -> Result<usize, Error> {
        for (i, slot) in self.readers_version.iter().enumerate() {
            if slot.load(Ordering::SeqCst) != UNASSIGNED {
                continue;
            }
            if slot
                .compare_exchange(
                    UNASSIGNED,
                    NOT_READING,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return Ok(i);
            }
        }
        let max = self.max_threads();
        log::error!("too many threads already registered (max {max})");
        Err(Error::CapacityExceeded { max })
    }

    /// Release a slot obtained from `register_thread`. Unregistering a
    /// slot that was never registered is reported and leaves every other
    /// slot untouched.
    pub fn unregister_thread(&self, tid: usize) -> Result<(), Error> {
        match self.readers_version.get(tid) {
            Some(slot) if slot.load(Ordering::SeqCst) != UNASSIGNED => {
                slot.store(UNASSIGNED, Ordering::SeqCst);
                Ok(())
            }
            _ => {
                log::error!("unregister_thread() with tid {tid} that was never registered");
                Err(Error::NotRegistered { tid })
            }
        }
    }
}

impl Rcu for ReadersVersionRcu {
    /// The slot index doubles as the token, threaded through `tid`.
    type Token = ();

    /// Wait-free: stamp the current reclaimer version, then re-check once
    /// to catch a bump that raced with the stamp. A tid that was never
    /// registered is reported and ignored.
    fn read_lock(&self, tid: usize) {
        let slot = match self.readers_version.get(tid) {
            Some(slot) => slot,
            None => {
                log::error!("read_lock() with tid {tid} that was never registered, ignored");
                return;
            }
        };
        let rv = self.reclaimer_version.load(Ordering::SeqCst);
        slot.store(rv, Ordering::SeqCst);
        let nrv = self.reclaimer_version.load(Ordering::SeqCst);
        if rv != nrv {
            slot.store(nrv, Ordering::Relaxed);
        }
    }

    /// Wait-free.
    fn read_unlock(&self, _token: (), tid: usize) {
        match self.readers_version.get(tid) {
            Some(slot) => slot.store(NOT_READING, Ordering::Release),
            None => {
                log::error!("read_unlock() with tid {tid} that was never registered, ignored")
            }
        }
    }

    /// Blocking. All concurrent callers wait for the same target version,
    /// sharing the grace period.
    fn synchronize(&self) {
        let wait_for = self.reclaimer_version.load(Ordering::SeqCst) + 1;
        let _ = self.reclaimer_version.compare_exchange(
            wait_for - 1,
            wait_for,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        for slot in self.readers_version.iter() {
            // UNASSIGNED and NOT_READING sit far above any version
            // this counter can reach, so idle slots pass immediately
            while slot.load(Ordering::SeqCst) < wait_for {
                hint::spin_loop();
            }
        }
    }
}
