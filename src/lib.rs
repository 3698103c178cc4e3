//! Low-level concurrency-control primitives: fair mutexes, read indicators,
//! RCU engines, the left-right dual-instance guard, and an RCU-protected
//! lock-free list. Every operation documents its progress condition
//! (wait-free, lock-free, or blocking); callers may rely on it.
#![deny(unsafe_op_in_unsafe_fn)]
pub mod cds;
pub mod error;
pub mod indicator;
pub mod leftright;
pub mod mutex;
pub mod rcu;
pub mod utils;

pub use error::Error;

/// A quiescence tracker: detects whether any reader is currently inside a
/// read-side critical section.
///
/// `arrive` and `depart` are called by the owning thread for itself and are
/// not reentrant. `is_empty` may be called by any writer. The `tid`
/// parameter is an explicit small thread identity; variants that do not
/// key on it ignore it.
pub trait ReadIndicator {
    fn arrive(&self, tid: usize);
    fn depart(&self, tid: usize);
    fn is_empty(&self) -> bool;
}

/// An RCU synchronization engine.
///
/// `read_lock` returns a token that must be threaded back into the
/// matching `read_unlock` by the caller; there is no hidden thread-local
/// state. `synchronize` blocks until every reader that entered before the
/// call has departed, establishing the grace period a writer needs before
/// reclaiming pre-update state.
pub trait Rcu {
    type Token: Copy;
    /// Enter a read-side critical section. Lock-free or better.
    #[must_use = "the token must be passed back to read_unlock"]
    fn read_lock(&self, tid: usize) -> Self::Token;
    /// Leave the read-side critical section entered with `token`. Wait-free.
    fn read_unlock(&self, token: Self::Token, tid: usize);
    /// Wait for a grace period: every reader in flight when this was called
    /// has departed once it returns. Blocking.
    fn synchronize(&self);
}
