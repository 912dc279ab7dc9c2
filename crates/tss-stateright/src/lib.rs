//! # tss-stateright
//!
//! Stateright model of the mutex-guarded stack.
//!
//! Every operation is split into the steps a thread takes around the
//! guard, so the checker explores every interleaving of acquire, apply and
//! release across threads.
//!
//! ## Usage
//!
//! 1. Model checking:
//!    ```ignore
//!    cargo test -p tss-stateright
//!    ```
//!
//! 2. Replaying a discovered interleaving on the real stack:
//!    ```ignore
//!    use stateright::{Checker, Model};
//!    use tss_stateright::{replay_on_stack, LockedStackModel};
//!
//!    let model = LockedStackModel::worker_scripts(2, 1);
//!    let checker = model.clone().checker().spawn_bfs().join();
//!    let path = checker.discovery("pop returns another thread's value").unwrap();
//!    replay_on_stack(&model, &path.into_actions()).unwrap();
//!    ```
//!
//! ## Modules
//!
//! - `locked_stack`: the model, its state and its properties
//! - `replay`: drives `tss_stack::Stack` through a model path

pub mod locked_stack;
pub mod replay;

pub use locked_stack::{
    EventPlacement, LockedStackModel, Outcome, Phase, ScriptOp, StackAction, StackState,
    ThreadState, Value,
};
pub use replay::{replay_on_stack, to_counterexample, ReplayReport};
