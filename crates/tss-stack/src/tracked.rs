//! Stack wrapper that records its own history for property checking.
//!
//! The history is kept by an event sink, so it is appended inside the
//! stack's guard and its order is the stack's serialization order.

use std::collections::HashSet;

use tss_core::invariants::stack::{StackHistory, StackProperties};

use crate::error::{EmptyStack, PushError, SinkError};
use crate::sink::{EventSink, StackEvent};
use crate::stack::{Stack, StackStats};

/// Event sink that keeps the pushed/popped sets and the full history.
#[derive(Debug, Clone, Default)]
pub struct HistorySink {
    pushed: HashSet<u64>,
    popped: HashSet<u64>,
    history: StackHistory,
}

impl HistorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &StackHistory {
        &self.history
    }
}

impl EventSink<u64> for HistorySink {
    fn record(&mut self, event: StackEvent<&u64>) -> Result<(), SinkError> {
        let step = self.history.next_step();
        match event {
            StackEvent::Pushed(&value) => {
                self.pushed.insert(value);
                self.history.record_push(value, step);
            }
            StackEvent::Popped(&value) => {
                self.popped.insert(value);
                self.history.record_pop(Some(value), step);
            }
        }
        Ok(())
    }
}

/// A `Stack<u64>` whose history can be checked with
/// [`StackPropertyChecker`](tss_core::StackPropertyChecker).
///
/// Pushed values must be unique for the checker to identify elements.
pub struct TrackedStack {
    inner: Stack<u64, HistorySink>,
}

impl TrackedStack {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Stack::with_event_sink(HistorySink::new()),
        }
    }

    pub fn push(&self, value: u64) -> Result<(), PushError<u64>> {
        self.inner.push(value)
    }

    pub fn pop(&self) -> Result<u64, EmptyStack> {
        self.inner.pop()
    }

    /// See [`Stack::drain`]. Drained elements enter the history as pops.
    pub fn drain(&self) -> usize {
        self.inner.drain()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn stats(&self) -> StackStats {
        self.inner.stats()
    }

    /// The underlying stack.
    pub fn stack(&self) -> &Stack<u64, HistorySink> {
        &self.inner
    }
}

impl Default for TrackedStack {
    fn default() -> Self {
        Self::new()
    }
}

impl StackProperties for TrackedStack {
    fn pushed_elements(&self) -> HashSet<u64> {
        self.inner.with_sink(|sink| sink.pushed.clone())
    }

    fn popped_elements(&self) -> HashSet<u64> {
        self.inner.with_sink(|sink| sink.popped.clone())
    }

    fn current_contents(&self) -> Vec<u64> {
        self.inner.snapshot()
    }

    fn reported_len(&self) -> u64 {
        self.inner.len() as u64
    }

    fn history(&self) -> StackHistory {
        self.inner.with_sink(|sink| sink.history.clone())
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use tss_core::invariants::stack::{StackOpType, StackPropertyChecker};
    use tss_core::PropertyChecker;

    #[test]
    fn test_invariants_basic() {
        let stack = TrackedStack::new();
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        stack.push(3).unwrap();
        stack.pop().unwrap();

        let checker = StackPropertyChecker::new(&stack);
        assert!(checker.all_hold(), "{:?}", checker.first_violation());
    }

    #[test]
    fn test_history_records_serialization_order() {
        let stack = TrackedStack::new();
        stack.push(4).unwrap();
        stack.push(5).unwrap();
        assert_eq!(stack.pop(), Ok(5));
        assert_eq!(stack.pop(), Ok(4));
        assert_eq!(stack.pop(), Err(EmptyStack));

        let history = stack.history();
        let steps: Vec<u64> = history.operations.iter().map(|op| op.step).collect();
        assert_eq!(steps, vec![1, 2, 3, 4]);
        assert_eq!(history.count(StackOpType::Push), 2);
        assert_eq!(history.count(StackOpType::Pop), 2);
    }

    #[test]
    fn test_drain_keeps_invariants() {
        let stack = TrackedStack::new();
        for i in 1..=50 {
            stack.push(i).unwrap();
        }
        assert_eq!(stack.drain(), 50);
        assert_eq!(stack.drain(), 0);
        assert!(stack.is_empty());
        assert_eq!(stack.popped_elements().len(), 50);
        assert_eq!(stack.stats().drained, 50);
        assert_eq!(stack.stats().pops, 0);
        assert_eq!(stack.history().count(StackOpType::Pop), 50);

        let checker = StackPropertyChecker::new(&stack);
        assert!(checker.all_hold(), "{:?}", checker.first_violation());
    }
}
