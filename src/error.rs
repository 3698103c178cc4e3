use thiserror::Error;

/// Errors surfaced by the fallible operations of this crate.
///
/// Contention is never reported as an error, it is resolved by
/// spinning/retrying inside the operation itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// more reader threads than the configured maximum tried to register
    #[error("too many threads already registered (max {max})")]
    CapacityExceeded { max: usize },
    /// a reader slot was used without ever being registered
    #[error("thread slot {tid} was never registered")]
    NotRegistered { tid: usize },
    /// the operation exists in the API surface but has no implementation
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),
}
