//! Read-indicator variants. All satisfy the [`ReadIndicator`] contract but
//! trade memory and scan cost for contention behavior differently; which
//! one to plug into an engine is a deployment decision (thread count,
//! read/write ratio, cache topology).
use crate::ReadIndicator;
use crossbeam_utils::CachePadded;
use std::ptr::null_mut;
use std::sync::atomic::{fence, AtomicI64, AtomicPtr, AtomicU64, Ordering};

/// Ingress/egress counter pair.
///
/// `arrive` bumps ingress, `depart` bumps egress, empty means they match.
/// Wait-free population-oblivious, but both counters are hot cache lines
/// that every reader serializes on.
#[derive(Debug, Default)]
pub struct IngressEgress {
    ingress: CachePadded<AtomicU64>,
    egress: CachePadded<AtomicU64>,
}

impl IngressEgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadIndicator for IngressEgress {
    fn arrive(&self, _tid: usize) {
        self.ingress.fetch_add(1, Ordering::SeqCst);
    }

    fn depart(&self, _tid: usize) {
        self.egress.fetch_add(1, Ordering::SeqCst);
    }

    fn is_empty(&self) -> bool {
        // egress must be read first: reading ingress first could miss a
        // reader that arrived and departed in between, reporting a negative
        let egress = self.egress.load(Ordering::SeqCst);
        egress == self.ingress.load(Ordering::SeqCst)
    }
}

/// Single up/down counter.
///
/// Note the polarity: `is_empty` returns true while the counter is
/// positive, i.e. while readers are present. This reads as inverted
/// relative to the method name but is kept as-is because existing callers
/// depend on it; treat the return value as "not empty". Do not plug this
/// variant into [`crate::rcu::TwoPhaseRcu`], which expects the
/// conventional polarity.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    counter: AtomicI64,
}

impl AtomicCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadIndicator for AtomicCounter {
    fn arrive(&self, _tid: usize) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn depart(&self, _tid: usize) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }

    fn is_empty(&self) -> bool {
        self.counter.load(Ordering::SeqCst) > 0
    }
}

/// Distributed cache-line-padded counters, one slot per hashed thread id.
///
/// Spreads arrivals over `num_counters` cache lines so readers don't fight
/// over one hot line. Two threads may hash to the same slot; that aliases
/// their counts but not the sum, which is all `is_empty` looks at.
/// arrive/depart are wait-free population-oblivious, `is_empty` is
/// wait-free bounded by the array size.
#[derive(Debug)]
pub struct DistributedCounter {
    counters: Box<[CachePadded<AtomicI64>]>,
    mask: u64,
}

impl Default for DistributedCounter {
    fn default() -> Self {
        Self::new(64)
    }
}

impl DistributedCounter {
    /// `num_counters` is rounded down to a power of two, minimum 1.
    pub fn new(num_counters: usize) -> Self {
        let n = if num_counters <= 1 {
            1
        } else {
            1usize << (usize::BITS - 1 - num_counters.leading_zeros())
        };
        let counters = (0..n)
            .map(|_| CachePadded::new(AtomicI64::new(0)))
            .collect();
        Self {
            counters,
            mask: (n - 1) as u64,
        }
    }

    pub fn num_counters(&self) -> usize {
        self.counters.len()
    }

    // xorshift by George Marsaglia, imprecise but fast
    fn slot(&self, tid: usize) -> usize {
        let mut x = tid as u64;
        x ^= x << 21;
        x ^= x >> 35;
        x ^= x << 4;
        (x & self.mask) as usize
    }
}

impl ReadIndicator for DistributedCounter {
    fn arrive(&self, tid: usize) {
        self.counters[self.slot(tid)].fetch_add(1, Ordering::SeqCst);
    }

    fn depart(&self, tid: usize) {
        self.counters[self.slot(tid)].fetch_sub(1, Ordering::SeqCst);
    }

    fn is_empty(&self) -> bool {
        // fences bound reordering of the relaxed loads in the scan
        fence(Ordering::SeqCst);
        let mut sum = 0;
        for counter in self.counters.iter() {
            sum += counter.load(Ordering::Relaxed);
        }
        fence(Ordering::Acquire);
        sum == 0
    }
}

const NOT_READING: u64 = 0;
const READING: u64 = 1;

/// One 0/1 slot per thread, indexed directly by `tid`.
///
/// Assumes thread identities are small dense integers below the
/// `max_threads` this was built with. An out-of-range tid is reported and
/// ignored. arrive/depart are wait-free population-oblivious, `is_empty`
/// scans linearly.
#[derive(Debug)]
pub struct StaticPerThread {
    states: Box<[CachePadded<AtomicU64>]>,
}

impl Default for StaticPerThread {
    fn default() -> Self {
        Self::new(32)
    }
}

impl StaticPerThread {
    pub fn new(max_threads: usize) -> Self {
        let states = (0..max_threads)
            .map(|_| CachePadded::new(AtomicU64::new(NOT_READING)))
            .collect();
        Self { states }
    }

    pub fn max_threads(&self) -> usize {
        self.states.len()
    }
}

impl ReadIndicator for StaticPerThread {
    fn arrive(&self, tid: usize) {
        match self.states.get(tid) {
            Some(state) => state.store(READING, Ordering::SeqCst),
            None => log::error!("arrive() with out-of-range tid {tid}, ignored"),
        }
    }

    fn depart(&self, tid: usize) {
        match self.states.get(tid) {
            Some(state) => state.store(NOT_READING, Ordering::Release),
            None => log::error!("depart() with out-of-range tid {tid}, ignored"),
        }
    }

    fn is_empty(&self) -> bool {
        self.states
            .iter()
            .all(|state| state.load(Ordering::Acquire) != READING)
    }
}

const VACANT: i64 = 0;

#[derive(Debug)]
struct QueueNode {
    // occupying tid + 1, or VACANT
    occupant: AtomicI64,
    next: AtomicPtr<QueueNode>,
}

/// Lock-free bag of the thread ids currently reading.
///
/// `arrive` reoccupies a vacant node or pushes a fresh one, `depart`
/// vacates the caller's node, `is_empty` scans for occupants. Memory is
/// bounded by the high-water mark of concurrent readers, not by a
/// configured maximum: when no thread is active every node is vacant and
/// nothing more is ever allocated. arrive is O(1) amortized and lock-free,
/// depart is O(threads arrived).
#[derive(Debug, Default)]
pub struct ThreadQueue {
    head: AtomicPtr<QueueNode>,
}

unsafe impl Send for ThreadQueue {}
unsafe impl Sync for ThreadQueue {}

impl ThreadQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Drop for ThreadQueue {
    fn drop(&mut self) {
        let mut node = self.head.load(Ordering::Relaxed);
        while !node.is_null() {
            let next = unsafe { (*node).next.load(Ordering::Relaxed) };
            let _ = unsafe { Box::from_raw(node) };
            node = next;
        }
    }
}

impl ReadIndicator for ThreadQueue {
    fn arrive(&self, tid: usize) {
        let id = tid as i64 + 1;
        // try to reoccupy a vacant node before allocating
        let mut node = self.head.load(Ordering::Acquire);
        while !node.is_null() {
            let n = unsafe { &*node };
            if n.occupant
                .compare_exchange(VACANT, id, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            node = n.next.load(Ordering::Acquire);
        }
        let new_node = Box::into_raw(Box::new(QueueNode {
            occupant: AtomicI64::new(id),
            next: AtomicPtr::new(null_mut()),
        }));
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            unsafe { (*new_node).next.store(head, Ordering::Relaxed) };
            match self
                .head
                .compare_exchange_weak(head, new_node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(h) => head = h,
            }
        }
    }

    fn depart(&self, tid: usize) {
        let id = tid as i64 + 1;
        let mut node = self.head.load(Ordering::Acquire);
        while !node.is_null() {
            let n = unsafe { &*node };
            if n.occupant
                .compare_exchange(id, VACANT, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            node = n.next.load(Ordering::Acquire);
        }
        log::error!("depart() for tid {tid} which never arrived, ignored");
    }

    fn is_empty(&self) -> bool {
        let mut node = self.head.load(Ordering::Acquire);
        while !node.is_null() {
            let n = unsafe { &*node };
            if n.occupant.load(Ordering::Acquire) != VACANT {
                return false;
            }
            node = n.next.load(Ordering::Acquire);
        }
        true
    }
}
