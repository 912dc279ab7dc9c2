//! # tss-stack
//!
//! A thread-safe LIFO stack built on exclusive node ownership and a
//! single mutex per stack.
//!
//! - `stack`: the stack, its guard and the drain lifecycle
//! - `sink`: event sinks that record pushes and pops in guard order
//! - `tracked`: a `u64` stack that records its history for invariant checks
//! - `error`: push/pop/sink errors
//! - `kani_proofs`: bounded proofs (under `#[cfg(kani)]`)
//! - `alloc_fault`: forced node allocation failures (feature `alloc-fault`)
//!
//! Loom tests live next to the stack under `#[cfg(loom)]`:
//!
//! ```bash
//! RUSTFLAGS="--cfg loom" cargo test -p tss-stack --release
//! ```
//!
//! ```rust
//! use tss_stack::{EmptyStack, MemorySink, Stack};
//!
//! let stack = Stack::with_event_sink(MemorySink::new());
//! stack.push(1).unwrap();
//! stack.push(2).unwrap();
//! assert_eq!(stack.pop(), Ok(2));
//! assert_eq!(stack.pop(), Ok(1));
//! assert_eq!(stack.pop(), Err(EmptyStack));
//! ```

pub mod error;
pub mod kani_proofs;
mod node;
pub mod sink;
pub mod stack;
mod sync;
pub mod tracked;

#[cfg(any(test, feature = "alloc-fault"))]
pub use node::alloc_fault;

pub use error::{EmptyStack, PushError, SinkError};
pub use sink::{EventSink, FileSink, MemorySink, NullSink, StackEvent};
pub use stack::{Stack, StackStats};
pub use tracked::{HistorySink, TrackedStack};
