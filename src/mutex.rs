//! Ticket-family fair mutexes. Both hand out the lock in strict FIFO
//! order of acquisition attempts, which makes them starvation-free.
//! Neither detects a holder that dies: a crashed holder permanently
//! stalls all other threads.
use crate::utils;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::thread;

/// Classic Mellor-Crummey/Scott ticket lock.
///
/// `lock` draws a ticket with a fetch-add and spins (yielding between
/// polls) until the grant counter reaches it. `unlock` is wait-free
/// population-oblivious: the holder is the only writer of grant, so a
/// relaxed load plus release store replaces an atomic increment.
#[derive(Debug, Default)]
pub struct TicketMutex {
    ticket: AtomicU64,
    grant: AtomicU64,
}

pub struct TicketGuard<'a> {
    mutex: &'a TicketMutex,
}

impl TicketMutex {
    pub const fn new() -> Self {
        TicketMutex {
            ticket: AtomicU64::new(0),
            grant: AtomicU64::new(0),
        }
    }

    /// Acquire the lock. Blocking.
    pub fn lock(&self) -> TicketGuard<'_> {
        let lticket = self.ticket.fetch_add(1, Ordering::Acquire);
        while lticket != self.grant.load(Ordering::Acquire) {
            thread::yield_now();
        }
        TicketGuard { mutex: self }
    }

    /// Acquire the lock only if nobody holds or awaits it. Never blocks.
    pub fn try_lock(&self) -> Option<TicketGuard<'_>> {
        let lgrant = self.grant.load(Ordering::Acquire);
        if self.ticket.load(Ordering::Relaxed) != lgrant {
            return None;
        }
        self.ticket
            .compare_exchange(
                lgrant,
                lgrant.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .ok()?;
        Some(TicketGuard { mutex: self })
    }
}

impl Drop for TicketGuard<'_> {
    fn drop(&mut self) {
        // sole writer of grant while holding the lock, so no rmw needed
        let lgrant = self.mutex.grant.load(Ordering::Relaxed);
        self.mutex.grant.store(lgrant.wrapping_add(1), Ordering::Release);
    }
}

const INVALID_TID: i64 = 0;

/// Thread-ID exchange lock.
///
/// Like the ticket lock but the ingress word is exchanged (atomic swap,
/// not fetch-add) with the caller's thread identity, and the swapped-out
/// value is the identity to wait on. A thread negates its identity when
/// the grant word already carries it, so two consecutive tickets from the
/// same thread stay distinguishable through the single egress slot. On
/// machines where the swap is one instruction the spin-or-enter decision
/// is reached without contention-induced retries, so the lock is
/// starvation-free there.
#[derive(Debug)]
pub struct TidexMutex {
    ticket: AtomicI64,
    grant: AtomicI64,
}

pub struct TidexGuard<'a> {
    mutex: &'a TidexMutex,
    // published into grant on unlock
    next_grant: i64,
}

impl Default for TidexMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl TidexMutex {
    pub const fn new() -> Self {
        TidexMutex {
            ticket: AtomicI64::new(INVALID_TID),
            grant: AtomicI64::new(INVALID_TID),
        }
    }

    /// Acquire the lock. Blocking.
    ///
    /// The first load of grant can be relaxed: if it equals this thread's
    /// id it is guaranteed up to date, and if it doesn't we use the plain
    /// id, which is correct either way.
    pub fn lock(&self) -> TidexGuard<'_> {
        let mut mytid = utils::thread_id();
        if self.grant.load(Ordering::Relaxed) == mytid {
            mytid = -mytid;
        }
        let prevtid = self.ticket.swap(mytid, Ordering::AcqRel);
        while self.grant.load(Ordering::Acquire) != prevtid {
            thread::yield_now();
        }
        TidexGuard {
            mutex: self,
            next_grant: mytid,
        }
    }

    /// Acquire the lock only if it is free. Never blocks: wait-free
    /// population-oblivious, since a lost CAS means someone else holds it
    /// and we give up.
    pub fn try_lock(&self) -> Option<TidexGuard<'_>> {
        let local_grant = self.grant.load(Ordering::Acquire);
        let local_ticket = self.ticket.load(Ordering::Relaxed);
        if local_grant != local_ticket {
            return None;
        }
        let mut mytid = utils::thread_id();
        if local_grant == mytid {
            mytid = -mytid;
        }
        self.ticket
            .compare_exchange(local_ticket, mytid, Ordering::AcqRel, Ordering::Relaxed)
            .ok()?;
        Some(TidexGuard {
            mutex: self,
            next_grant: mytid,
        })
    }
}

impl Drop for TidexGuard<'_> {
    /// Wait-free population-oblivious.
    fn drop(&mut self) {
        self.mutex.grant.store(self.next_grant, Ordering::Release);
    }
}
