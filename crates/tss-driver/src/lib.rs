//! # tss-driver
//!
//! Runs a fixed number of worker threads against one shared stack. Every
//! worker executes the same script; the stack writes its audit log to a
//! file. After all workers are joined the stack is drained.
//!
//! - `config`: command line and environment configuration
//! - `workload`: the worker script, spawning, joining and the run summary

pub mod config;
pub mod workload;

pub use config::{Cli, DriverConfig};
pub use workload::{
    run, run_workers, worker_script, DriverError, RunSummary, WorkerReport, WorkersOutcome,
};
