//! Threaded harness: seeded per-thread scripts against one shared stack.
//!
//! Each OS thread gets its own generator forked from the run seed, so the
//! script every thread executes is reproducible. The interleaving is up to
//! the OS scheduler; the harness checks afterwards that the recorded
//! history is one sequential history that explains every result.

use std::thread;

use tss_core::invariants::stack::{StackOpType, StackProperties, StackPropertyChecker};
use tss_core::PropertyChecker;
use tss_stack::TrackedStack;

use crate::random::DeterministicRng;

/// Configuration for a threaded run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Number of worker threads
    pub threads_count: usize,
    /// Number of operations per thread
    pub operations_per_thread: u64,
    /// Probability that an operation is a push (otherwise a pop)
    pub push_probability: f64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            threads_count: 4,
            operations_per_thread: 1_000,
            push_probability: 0.5,
        }
    }
}

impl HarnessConfig {
    /// Configuration for stress testing.
    pub fn stress() -> Self {
        Self {
            threads_count: 16,
            operations_per_thread: 5_000,
            push_probability: 0.6,
        }
    }

    /// Configuration for quick testing.
    pub fn quick() -> Self {
        Self {
            threads_count: 2,
            operations_per_thread: 200,
            push_probability: 0.5,
        }
    }
}

/// Per-thread tallies of what callers observed.
#[derive(Debug, Clone, Copy, Default)]
struct ThreadTally {
    pushes: u64,
    pops: u64,
    empty_pops: u64,
}

/// Result of running the harness.
#[derive(Debug, Clone)]
pub struct HarnessResult {
    /// Seed used for reproduction
    pub seed: u64,
    /// Successful pushes seen by callers
    pub pushes: u64,
    /// Successful pops seen by callers
    pub pops: u64,
    /// Pops that found the stack empty
    pub empty_pops: u64,
    /// Elements left on the stack
    pub final_len: u64,
    /// Whether all invariants held
    pub all_invariants_held: bool,
    /// First violation (if any)
    pub first_violation: Option<String>,
}

impl HarnessResult {
    /// Format for display.
    pub fn format(&self) -> String {
        let status = if self.all_invariants_held {
            "PASS"
        } else {
            "FAIL"
        };

        let mut result = format!(
            "[{}] DST_SEED={} pushes={} pops={} empty_pops={} final_len={}",
            status, self.seed, self.pushes, self.pops, self.empty_pops, self.final_len
        );
        if let Some(ref violation) = self.first_violation {
            result.push_str(&format!("\n  Violation: {}", violation));
        }
        result
    }
}

/// Threaded harness over a [`TrackedStack`].
pub struct DstHarness {
    seed: u64,
    config: HarnessConfig,
}

impl DstHarness {
    pub fn new(seed: u64, config: HarnessConfig) -> Self {
        debug_assert!(config.threads_count > 0, "Must have at least one thread");
        Self { seed, config }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Run the scripts on a fresh stack and check the outcome.
    pub fn run(&self) -> HarnessResult {
        let stack = TrackedStack::new();
        let tally = self.run_on(&stack);
        self.verify(&stack, tally)
    }

    fn run_on(&self, stack: &TrackedStack) -> ThreadTally {
        let mut root = DeterministicRng::new(self.seed);
        let rngs: Vec<DeterministicRng> =
            (0..self.config.threads_count).map(|_| root.fork()).collect();

        thread::scope(|scope| {
            let handles: Vec<_> = rngs
                .into_iter()
                .enumerate()
                .map(|(thread_idx, mut rng)| {
                    let config = &self.config;
                    scope.spawn(move || {
                        let mut tally = ThreadTally::default();
                        for step in 0..config.operations_per_thread {
                            if rng.gen_bool(config.push_probability) {
                                // Unique across threads: the checker identifies
                                // elements by value.
                                let value = ((thread_idx as u64) << 32) | (step + 1);
                                if stack.push(value).is_ok() {
                                    tally.pushes += 1;
                                }
                            } else if stack.pop().is_ok() {
                                tally.pops += 1;
                            } else {
                                tally.empty_pops += 1;
                            }
                        }
                        tally
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(tally) => tally,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .fold(ThreadTally::default(), |acc, t| ThreadTally {
                    pushes: acc.pushes + t.pushes,
                    pops: acc.pops + t.pops,
                    empty_pops: acc.empty_pops + t.empty_pops,
                })
        })
    }

    fn verify(&self, stack: &TrackedStack, tally: ThreadTally) -> HarnessResult {
        let final_len = stack.len() as u64;
        let history = stack.history();
        let stats = stack.stats();

        let violation = if tally.pops + final_len != tally.pushes {
            Some(format!(
                "pops ({}) + final_len ({}) != pushes ({})",
                tally.pops, final_len, tally.pushes
            ))
        } else if history.count(StackOpType::Push) as u64 != tally.pushes
            || history.count(StackOpType::Pop) as u64 != tally.pops
        {
            Some(format!(
                "history has {} pushes / {} pops, callers saw {} / {}",
                history.count(StackOpType::Push),
                history.count(StackOpType::Pop),
                tally.pushes,
                tally.pops
            ))
        } else if stats.empty_pops != tally.empty_pops {
            Some(format!(
                "stack counted {} empty pops, callers saw {}",
                stats.empty_pops, tally.empty_pops
            ))
        } else {
            StackPropertyChecker::new(stack)
                .with_seed(self.seed)
                .first_violation()
                .map(|v| v.to_string())
        };

        HarnessResult {
            seed: self.seed,
            pushes: tally.pushes,
            pops: tally.pops,
            empty_pops: tally.empty_pops,
            final_len,
            all_invariants_held: violation.is_none(),
            first_violation: violation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_quick() {
        let result = DstHarness::new(12345, HarnessConfig::quick()).run();
        assert!(result.all_invariants_held, "{}", result.format());
        assert_eq!(result.pops + result.final_len, result.pushes);
        assert_eq!(
            result.pushes + result.pops + result.empty_pops,
            2 * 200,
            "every operation is accounted for"
        );
    }

    #[test]
    fn test_harness_push_only() {
        let config = HarnessConfig {
            threads_count: 3,
            operations_per_thread: 100,
            push_probability: 1.0,
        };
        let result = DstHarness::new(7, config).run();
        assert!(result.all_invariants_held, "{}", result.format());
        assert_eq!(result.final_len, 300);
        assert_eq!(result.pops, 0);
    }
}
