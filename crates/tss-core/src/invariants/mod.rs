//! Invariant traits for the thread-safe stack.
//!
//! - `stack`: NoLostElements, NoDuplicates, LIFO_Order, Linearizability,
//!   ChainIntegrity

pub mod stack;

pub use stack::{StackHistory, StackOperation, StackProperties, StackPropertyChecker};
