//! # tss-core
//!
//! Core types and invariants for the thread-safe stack.
//!
//! This crate provides:
//! - `PropertyResult` and `PropertyChecker` for verifying invariants
//! - `Counterexample` for rendering failure paths
//! - `StackProperties`, the view a stack exposes for property checking
//!
//! Nothing here depends on how a stack is synchronized. The same checker
//! runs against the locked stack, the DST runner and the stateright model.

pub mod counterexample;
pub mod invariants;
pub mod property;

pub use counterexample::{ChainIssue, Counterexample, StateSnapshot, ThreadAction};
pub use invariants::stack::{
    StackHistory, StackOpType, StackOperation, StackProperties, StackPropertyChecker,
};
pub use property::{PropertyChecker, PropertyResult};
