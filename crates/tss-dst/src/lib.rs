//! # tss-dst
//!
//! Deterministic simulation testing for the thread-safe stack.
//!
//! Time, randomness and faults are all derived from one seed, so a failing
//! run can be replayed exactly.
//!
//! ## Harnesses
//!
//! - `runner`: sequential operations with faults injected at operation
//!   boundaries, checked against a model after every step
//! - `harness`: seeded per-thread scripts on one shared stack, checked
//!   against the recorded history afterwards
//!
//! ## Usage
//!
//! ```rust
//! use tss_dst::DstEnv;
//!
//! let seed = 12345;
//! let mut env = DstEnv::new(seed);
//!
//! // Deterministic time
//! let now = env.clock().now_ns();
//! env.clock().advance_ns(1_000_000);
//! assert_eq!(env.clock().now_ns(), now + 1_000_000);
//!
//! // Deterministic randomness
//! let value: u64 = env.rng().gen();
//! let choice = env.rng().gen_range(0..10);
//! # let _ = (value, choice);
//!
//! // Deterministic fault injection
//! if env.fault().should_fail() {
//!     // Simulate failure
//! }
//! ```
//!
//! ## Reproducibility
//!
//! ```bash
//! DST_SEED=12345 cargo test -p tss-dst
//! ```

pub mod clock;
pub mod env;
pub mod fault;
pub mod harness;
pub mod random;
pub mod runner;

pub use clock::SimClock;
pub use env::DstEnv;
pub use fault::{FaultConfig, FaultInjector, FaultStats};
pub use harness::{DstHarness, HarnessConfig, HarnessResult};
pub use random::DeterministicRng;
pub use runner::{
    run_dst_scenario, DstOp, DstResult, DstRunner, DstStats, DstTestableStack, FaultPoint,
    FaultType, OpOutcome,
};

/// Get DST seed from environment or generate random one.
///
/// Prints the seed for reproduction. Use `DST_SEED=<seed>` to reproduce.
/// An unparsable `DST_SEED` is reported and replaced by a random seed.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    match std::env::var("DST_SEED").map(|s| s.trim().parse::<u64>()) {
        Ok(Ok(seed)) => {
            println!("DST_SEED={} (from environment)", seed);
            seed
        }
        Ok(Err(err)) => {
            let seed = rand::random::<u64>();
            tracing::warn!(%err, "ignoring invalid DST_SEED");
            println!("DST_SEED={} (randomly generated, DST_SEED invalid)", seed);
            seed
        }
        Err(_) => {
            let seed = rand::random::<u64>();
            println!("DST_SEED={} (randomly generated)", seed);
            seed
        }
    }
}

/// Number of DST iterations, from `DST_ITERATIONS` or `default`.
#[must_use]
pub fn iterations_from_env(default: u64) -> u64 {
    std::env::var("DST_ITERATIONS")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
