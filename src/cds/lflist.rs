//! Michael-Scott style singly linked list with its traversal protected by
//! an RCU read-side critical section instead of hazard pointers.
use crate::indicator::DistributedCounter;
use crate::rcu::TwoPhaseRcu;
use crate::{Error, Rcu};
use std::ptr::null_mut;
use std::sync::atomic::{AtomicPtr, Ordering};

#[derive(Debug)]
struct Node<T> {
    // None only for the head sentinel
    key: Option<T>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn new(key: Option<T>) -> *mut Self {
        Box::into_raw(Box::new(Node {
            key,
            next: AtomicPtr::new(null_mut()),
        }))
    }
}

/// Lock-free append-only list guarded by an RCU engine.
///
/// `add` follows the Michael-Scott insertion algorithm; `contains` walks
/// the list inside the embedded engine's read-side critical section, so a
/// reclaiming writer (once removal exists) could never free a node mid
/// traversal. Removal is deliberately unimplemented: the list only grows,
/// and nodes are freed only when the list itself is dropped.
#[derive(Debug)]
pub struct LfList<T: PartialEq> {
    head: AtomicPtr<Node<T>>,
    tail: AtomicPtr<Node<T>>,
    rcu: TwoPhaseRcu<DistributedCounter>,
}

unsafe impl<T: PartialEq + Send> Send for LfList<T> {}
unsafe impl<T: PartialEq + Send + Sync> Sync for LfList<T> {}

impl<T: PartialEq> Default for LfList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> Drop for LfList<T> {
    fn drop(&mut self) {
        let mut node = self.head.load(Ordering::Relaxed);
        while !node.is_null() {
            let next = unsafe { (*node).next.load(Ordering::Relaxed) };
            let _ = unsafe { Box::from_raw(node) };
            node = next;
        }
    }
}

impl<T: PartialEq> LfList<T> {
    pub fn new() -> Self {
        let sentinel = Node::new(None);
        LfList {
            head: AtomicPtr::new(sentinel),
            tail: AtomicPtr::new(sentinel),
            rcu: TwoPhaseRcu::new(),
        }
    }

    /// Append `key`. Lock-free: a failed CAS on the tail's successor means
    /// another thread linked its node, and the loop helps advance the tail
    /// before retrying.
    pub fn add(&self, key: T) {
        let new_node = Node::new(Some(key));
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let next = unsafe { (*tail).next.load(Ordering::Acquire) };
            if next.is_null() {
                if unsafe { &*tail }
                    .next
                    .compare_exchange(null_mut(), new_node, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    // best effort, another thread may advance it for us
                    let _ = self.tail.compare_exchange(
                        tail,
                        new_node,
                        Ordering::Release,
                        Ordering::Relaxed,
                    );
                    return;
                }
            } else {
                // stale tail, help it along; failure is fine
                let _ =
                    self.tail
                        .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed);
            }
        }
    }

    /// Whether some node's key equals `key`. The read-side critical
    /// section is exactly the traversal. Lock-free.
    pub fn contains(&self, key: &T, tid: usize) -> bool {
        let token = self.rcu.read_lock(tid);
        let mut node = self.head.load(Ordering::Acquire);
        let mut found = false;
        while !node.is_null() {
            let n = unsafe { &*node };
            if n.key.as_ref() == Some(key) {
                found = true;
                break;
            }
            node = n.next.load(Ordering::Acquire);
        }
        self.rcu.read_unlock(token, tid);
        found
    }

    /// Number of keys currently linked, counted under the read lock.
    pub fn len(&self, tid: usize) -> usize {
        let token = self.rcu.read_lock(tid);
        let mut count = 0;
        // skip the sentinel
        let mut node = unsafe { &*self.head.load(Ordering::Acquire) }
            .next
            .load(Ordering::Acquire);
        while !node.is_null() {
            count += 1;
            node = unsafe { &*node }.next.load(Ordering::Acquire);
        }
        self.rcu.read_unlock(token, tid);
        count
    }

    pub fn is_empty(&self, tid: usize) -> bool {
        self.len(tid) == 0
    }

    /// Unlinking needs a reclamation step that has not been designed yet,
    /// so this reports the gap instead of pretending the key was absent.
    pub fn remove(&self, _key: &T) -> Result<bool, Error> {
        Err(Error::Unimplemented("LfList::remove"))
    }
}
