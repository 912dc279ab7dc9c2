//! Error types for stack operations and event sinks.

use thiserror::Error;

/// Failure of [`Stack::push`](crate::Stack::push).
///
/// Both variants hand the rejected value back; nothing was linked.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PushError<T> {
    /// Memory for a new node could not be obtained.
    #[error("failed to allocate a stack node")]
    AllocationFailure(T),
    /// The stack was draining when the push was attempted.
    #[error("stack is draining; push rejected")]
    Draining(T),
}

impl<T> PushError<T> {
    /// Recover the value that was not pushed.
    pub fn into_inner(self) -> T {
        match self {
            PushError::AllocationFailure(value) | PushError::Draining(value) => value,
        }
    }
}

/// [`Stack::pop`](crate::Stack::pop) found no element.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("pop on an empty stack")]
pub struct EmptyStack;

/// An event could not be recorded.
///
/// Sink failures are reported and counted; they never undo the stack
/// mutation that produced the event.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("event sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("event sink rejected event: {0}")]
    Rejected(String),
}
