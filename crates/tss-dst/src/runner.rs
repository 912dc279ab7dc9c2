//! Fault injection at operation boundaries.
//!
//! DST injects faults around stack operations, never inside the guard.
//! The runner decides before an operation whether it fails and after it
//! whether the caller "crashed". An allocation failure is armed through
//! `tss_stack::alloc_fault` and the push then runs for real.
//!
//! # What DST Tests (vs Loom)
//!
//! | Concern | Tool | Level |
//! |---------|------|-------|
//! | Guard interleavings | Loom | Instruction |
//! | Node allocation failure | DST | Operation boundary |
//! | Caller crash after an operation | DST | Operation boundary |
//! | Drain in the middle of a workload | DST | Between operations |
//!
//! Every result the stack returns is compared with a sequential model, so
//! a pop that returns the wrong value, or an empty pop on a non-empty
//! stack, is reported immediately with the seed.

use tss_core::invariants::stack::{StackProperties, StackPropertyChecker};
use tracing::debug;
use tss_core::PropertyChecker;
use tss_stack::{alloc_fault, EmptyStack, PushError, StackStats, TrackedStack};

use crate::env::DstEnv;
use crate::fault::FaultConfig;

/// Fault injection points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Before starting an operation
    BeforeOperation,
    /// After operation completes (before returning to caller)
    AfterOperation,
}

/// Types of faults that can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    /// Node allocation fails; the push must leave the stack unchanged
    AllocationFailure,
    /// Caller "crashes" and never sees the result
    ThreadCrash,
    /// Caller is slow (advances simulated time)
    Delay,
}

/// Stacks the runner can drive.
pub trait DstTestableStack: StackProperties + Send + Sync {
    fn new() -> Self;
    fn push(&self, value: u64) -> Result<(), PushError<u64>>;
    fn pop(&self) -> Result<u64, EmptyStack>;
    fn drain(&self) -> usize;
    fn is_empty(&self) -> bool;
    fn len(&self) -> usize;
}

impl DstTestableStack for TrackedStack {
    fn new() -> Self {
        TrackedStack::new()
    }

    fn push(&self, value: u64) -> Result<(), PushError<u64>> {
        TrackedStack::push(self, value)
    }

    fn pop(&self) -> Result<u64, EmptyStack> {
        TrackedStack::pop(self)
    }

    fn drain(&self) -> usize {
        TrackedStack::drain(self)
    }

    fn is_empty(&self) -> bool {
        TrackedStack::is_empty(self)
    }

    fn len(&self) -> usize {
        TrackedStack::len(self)
    }
}

/// Operation in a DST scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstOp {
    Push(u64),
    Pop,
    Drain,
}

/// Outcome of one runner operation, as the caller saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    Pushed,
    Popped(u64),
    Empty,
    Drained(usize),
    Faulted(FaultType),
}

/// Statistics from a DST run.
#[derive(Debug, Clone, Default)]
pub struct DstStats {
    pub seed: u64,
    pub operations_count: u64,
    pub faults_injected: u64,
    pub allocation_failures: u64,
    pub abandoned_operations: u64,
    pub empty_pops: u64,
    pub drains: u64,
}

impl DstStats {
    pub fn format(&self) -> String {
        format!(
            "DST_SEED={} ops={} faults={} alloc_failures={} abandoned={} empty_pops={} drains={}",
            self.seed,
            self.operations_count,
            self.faults_injected,
            self.allocation_failures,
            self.abandoned_operations,
            self.empty_pops,
            self.drains
        )
    }
}

/// DST runner: a stack, a sequential model and a fault injector.
pub struct DstRunner<S> {
    stack: S,
    env: DstEnv,
    model: Vec<u64>,
    stats: DstStats,
}

impl<S: DstTestableStack> DstRunner<S> {
    /// Runner with the default fault configuration.
    pub fn new(seed: u64) -> Self {
        Self::with_fault_config(seed, FaultConfig::default())
    }

    pub fn with_fault_config(seed: u64, config: FaultConfig) -> Self {
        Self {
            stack: S::new(),
            env: DstEnv::with_fault_config(seed, config),
            model: Vec::new(),
            stats: DstStats {
                seed,
                ..DstStats::default()
            },
        }
    }

    pub fn seed(&self) -> u64 {
        self.env.seed()
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn env(&mut self) -> &mut DstEnv {
        &mut self.env
    }

    /// Push with fault injection at boundaries.
    pub fn push(&mut self, value: u64) -> Result<OpOutcome, String> {
        if let Some(fault) = self.maybe_inject_fault(FaultPoint::BeforeOperation) {
            match fault {
                FaultType::AllocationFailure => {
                    self.stats.allocation_failures += 1;
                    self.push_with_failed_allocation(value)?;
                    return Ok(OpOutcome::Faulted(fault));
                }
                FaultType::ThreadCrash => {
                    self.stats.abandoned_operations += 1;
                    return Ok(OpOutcome::Faulted(fault));
                }
                FaultType::Delay => {}
            }
        }

        self.stats.operations_count += 1;
        match self.stack.push(value) {
            Ok(()) => self.model.push(value),
            Err(err) => {
                return Err(format!(
                    "push({}) failed without an injected fault: {} ({})",
                    value,
                    err,
                    self.env.format_seed()
                ))
            }
        }

        if let Some(FaultType::ThreadCrash) = self.maybe_inject_fault(FaultPoint::AfterOperation) {
            // The push completed; only the caller is gone.
            self.stats.abandoned_operations += 1;
            return Ok(OpOutcome::Faulted(FaultType::ThreadCrash));
        }

        Ok(OpOutcome::Pushed)
    }

    /// Pop with fault injection at boundaries.
    pub fn pop(&mut self) -> Result<OpOutcome, String> {
        if let Some(FaultType::ThreadCrash) = self.maybe_inject_fault(FaultPoint::BeforeOperation) {
            self.stats.abandoned_operations += 1;
            return Ok(OpOutcome::Faulted(FaultType::ThreadCrash));
        }

        self.stats.operations_count += 1;
        let outcome = match (self.stack.pop(), self.model.pop()) {
            (Ok(actual), Some(expected)) if actual == expected => OpOutcome::Popped(actual),
            (Err(EmptyStack), None) => {
                self.stats.empty_pops += 1;
                OpOutcome::Empty
            }
            (actual, expected) => {
                return Err(format!(
                    "pop returned {:?} but model expected {:?} ({})",
                    actual,
                    expected,
                    self.env.format_seed()
                ))
            }
        };

        if let Some(FaultType::ThreadCrash) = self.maybe_inject_fault(FaultPoint::AfterOperation) {
            // The value left the stack; the caller dropped it.
            self.stats.abandoned_operations += 1;
            return Ok(OpOutcome::Faulted(FaultType::ThreadCrash));
        }

        Ok(outcome)
    }

    /// Drain the stack. Producers in a sequential run are quiescent by
    /// construction.
    pub fn drain(&mut self) -> Result<OpOutcome, String> {
        self.stats.operations_count += 1;
        self.stats.drains += 1;

        let drained = self.stack.drain();
        let expected = self.model.len();
        self.model.clear();

        if drained != expected || !self.stack.is_empty() {
            return Err(format!(
                "drain released {} nodes but model held {} ({})",
                drained,
                expected,
                self.env.format_seed()
            ));
        }
        Ok(OpOutcome::Drained(drained))
    }

    pub fn apply(&mut self, op: DstOp) -> Result<OpOutcome, String> {
        match op {
            DstOp::Push(value) => self.push(value),
            DstOp::Pop => self.pop(),
            DstOp::Drain => self.drain(),
        }
    }

    /// Run every invariant; the first violation is returned with the
    /// rendered counterexample.
    pub fn check_invariants(&self) -> Result<(), String> {
        let checker = StackPropertyChecker::new(&self.stack).with_seed(self.seed());
        match checker.first_violation() {
            None => Ok(()),
            Some(violation) => Err(violation.to_string()),
        }
    }

    pub fn stats(&self) -> DstStats {
        self.stats.clone()
    }

    /// Push with the node allocation forced to fail. The value must come
    /// back and neither the chain nor the history may change.
    fn push_with_failed_allocation(&mut self, value: u64) -> Result<(), String> {
        let history_before = self.stack.history().operations.len();
        alloc_fault::fail_next_allocation();
        let result = self.stack.push(value);
        let still_armed = alloc_fault::is_armed();
        // A push rejected before allocating leaves the failure armed.
        alloc_fault::disarm();

        match result {
            Err(PushError::AllocationFailure(returned)) if returned == value && !still_armed => {}
            other => {
                return Err(format!(
                    "push({}) with failed allocation returned {:?} ({})",
                    value,
                    other,
                    self.env.format_seed()
                ))
            }
        }
        if self.stack.history().operations.len() != history_before {
            return Err(format!(
                "push({}) with failed allocation recorded an event ({})",
                value,
                self.env.format_seed()
            ));
        }
        self.expect_len("allocation failure")
    }

    fn expect_len(&self, context: &str) -> Result<(), String> {
        if self.stack.len() == self.model.len() {
            return Ok(());
        }
        Err(format!(
            "stack length {} differs from model length {} after {} ({})",
            self.stack.len(),
            self.model.len(),
            context,
            self.env.format_seed()
        ))
    }

    fn maybe_inject_fault(&mut self, point: FaultPoint) -> Option<FaultType> {
        self.env.maybe_delay();
        if !self.env.fault().should_fail() {
            return None;
        }
        self.stats.faults_injected += 1;
        let choices: &[FaultType] = match point {
            FaultPoint::BeforeOperation => &[
                FaultType::AllocationFailure,
                FaultType::ThreadCrash,
                FaultType::Delay,
            ],
            FaultPoint::AfterOperation => &[FaultType::ThreadCrash, FaultType::Delay],
        };
        let fault = self.env.fault().choose(choices);
        debug!(seed = self.env.seed(), ?point, ?fault, "injecting fault");
        fault
    }
}

/// DST result.
#[derive(Debug)]
pub struct DstResult {
    pub passed: bool,
    pub violation: Option<String>,
    pub stats: DstStats,
    pub stack_stats: StackStats,
}

impl DstResult {
    pub fn format(&self) -> String {
        let status = if self.passed { "PASS" } else { "FAIL" };
        let mut result = format!("[{}] {}", status, self.stats.format());
        if let Some(ref violation) = self.violation {
            result.push_str(&format!("\n  VIOLATION: {}", violation));
        }
        result
    }
}

/// Run a scripted scenario and check invariants at the end.
pub fn run_dst_scenario(seed: u64, operations: &[DstOp]) -> DstResult {
    let mut runner: DstRunner<TrackedStack> = DstRunner::new(seed);
    let mut violation = None;

    for &op in operations {
        if let Err(e) = runner.apply(op) {
            violation = Some(e);
            break;
        }
    }

    if violation.is_none() {
        violation = runner.check_invariants().err();
    }

    DstResult {
        passed: violation.is_none(),
        violation,
        stats: runner.stats(),
        stack_stats: runner.stack().stats(),
    }
}
