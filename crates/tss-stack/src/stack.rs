//! Mutex-guarded LIFO stack.
//!
//! # Invariants
//!
//! | Property | Enforced By |
//! |----------|-------------|
//! | Each node reached exactly once from head | `Box` ownership chain |
//! | No node shared by two predecessors | `Box` ownership chain |
//! | Operations observe only completed states | single guard per stack |
//! | Events ordered like operations | sink recorded inside the guard |
//!
//! # Lifecycle
//!
//! `drain` is the shutdown path. It raises an advisory flag that `push`
//! reads before taking the guard, then pops every node under one guard
//! acquisition, reporting each as a `Popped` event. The flag read is not
//! atomic with the push that follows it: callers must join every producer
//! before draining. The flag is a single bit, not a count: if two drains
//! overlap, the first to finish clears it while the second still runs.

use tracing::{debug, error, warn};

use crate::error::{EmptyStack, PushError, SinkError};
use crate::node::{Chain, Node};
use crate::sink::{EventSink, NullSink, StackEvent};
use crate::sync::{AtomicBool, Mutex, MutexGuard, Ordering};

/// Counters maintained inside the guard together with the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackStats {
    /// Successful pushes
    pub pushes: u64,
    /// Successful pops
    pub pops: u64,
    /// Pops that found the stack empty
    pub empty_pops: u64,
    /// Nodes released by `drain`
    pub drained: u64,
    /// Events the sink failed to record
    pub sink_failures: u64,
}

/// State protected by the guard.
struct Inner<T, S> {
    chain: Chain<T>,
    stats: StackStats,
    sink: S,
}

/// A thread-safe LIFO stack.
///
/// Every operation runs under one mutex that owns the node chain, the
/// counters and the event sink, so the chain, [`StackStats`] and the
/// event log always describe the same sequential history.
pub struct Stack<T, S = NullSink> {
    guard: Mutex<Inner<T, S>>,
    draining: AtomicBool,
}

impl<T> Stack<T, NullSink> {
    /// Create a new empty stack that records no events.
    #[must_use]
    pub fn new() -> Self {
        Self::with_event_sink(NullSink)
    }
}

impl<T> Default for Stack<T, NullSink> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S: EventSink<T>> Stack<T, S> {
    /// Create a new empty stack that reports every push and pop to `sink`.
    pub fn with_event_sink(sink: S) -> Self {
        Self {
            guard: Mutex::new(Inner {
                chain: Chain::new(),
                stats: StackStats::default(),
                sink,
            }),
            draining: AtomicBool::new(false),
        }
    }

    /// Push a value onto the stack.
    ///
    /// The node is allocated before the guard is taken. If allocation
    /// fails, or the stack is draining, the value is handed back in the
    /// error and the chain is untouched.
    pub fn push(&self, value: T) -> Result<(), PushError<T>> {
        if self.draining.load(Ordering::Acquire) {
            return Err(PushError::Draining(value));
        }

        let node = Node::try_new(value).map_err(PushError::AllocationFailure)?;

        let mut guard = self.lock();
        let inner = &mut *guard;
        let top = inner.chain.push(node);
        inner.stats.pushes += 1;
        emit(&mut inner.sink, &mut inner.stats, StackEvent::Pushed(top));
        Ok(())
    }

    /// Pop the most recently pushed value.
    ///
    /// Returns [`EmptyStack`] if there is nothing to pop; the stack is
    /// left unchanged and no event is recorded.
    pub fn pop(&self) -> Result<T, EmptyStack> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let Some(value) = inner.chain.pop() else {
            inner.stats.empty_pops += 1;
            return Err(EmptyStack);
        };
        inner.stats.pops += 1;
        emit(&mut inner.sink, &mut inner.stats, StackEvent::Popped(&value));
        Ok(value)
    }

    /// Pop every remaining node.
    ///
    /// Requires that all producers have stopped; see the module docs.
    /// Each released node is reported as a `Popped` event, top first, and
    /// the sink is flushed afterwards. Returns the number of nodes
    /// released.
    pub fn drain(&self) -> usize {
        self.draining.store(true, Ordering::Release);

        let drained = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let mut drained = 0;
            while let Some(value) = inner.chain.pop() {
                drained += 1;
                emit(&mut inner.sink, &mut inner.stats, StackEvent::Popped(&value));
            }
            inner.stats.drained += drained as u64;
            if let Err(err) = inner.sink.flush() {
                inner.stats.sink_failures += 1;
                warn!(error = %err, "failed to flush event sink after drain");
            }
            drained
        };

        self.draining.store(false, Ordering::Release);
        debug!(drained, "stack drained");
        drained
    }

    /// Flush the sink's buffered events.
    pub fn flush_sink(&self) -> Result<(), SinkError> {
        self.lock().sink.flush()
    }

    /// Run `f` on the sink while holding the guard.
    pub fn with_sink<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.lock().sink)
    }

    /// Consume the stack and return its sink. Remaining nodes are freed.
    pub fn into_sink(self) -> S {
        let inner = match self.guard.into_inner() {
            Ok(inner) => inner,
            Err(_) => poisoned(),
        };
        inner.sink
    }
}

impl<T, S> Stack<T, S> {
    /// True if the stack holds no elements.
    pub fn is_empty(&self) -> bool {
        self.lock().chain.is_empty()
    }

    /// Number of elements on the stack.
    pub fn len(&self) -> usize {
        self.lock().chain.len()
    }

    /// Run `f` on the top value, if any, while holding the guard.
    pub fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.lock().chain.peek().map(f)
    }

    /// Operation counters.
    pub fn stats(&self) -> StackStats {
        self.lock().stats
    }

    /// True while `drain` is running.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Copy of the stack contents, top to bottom.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.lock().chain.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T, S>> {
        match self.guard.lock() {
            Ok(guard) => guard,
            Err(_) => poisoned(),
        }
    }
}

/// Report an event. A failing sink is logged and counted; the mutation
/// that produced the event stands.
fn emit<T, S: EventSink<T>>(sink: &mut S, stats: &mut StackStats, event: StackEvent<&T>) {
    if let Err(err) = sink.record(event) {
        stats.sink_failures += 1;
        warn!(error = %err, push = event.is_push(), "failed to record stack event");
    }
}

/// A thread panicked while holding the guard. The chain may be half
/// updated, so no caller can be given access to it again.
#[cold]
fn poisoned() -> ! {
    error!("stack guard poisoned; aborting");
    std::process::abort()
}


/// Loom tests - these exhaustively check all interleavings
#[cfg(all(test, loom))]
mod loom_tests {
    use loom::sync::Arc;
    use loom::thread;

    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn test_push_push() {
        loom::model(|| {
            let stack = Arc::new(Stack::new());

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);
            let h1 = thread::spawn(move || s1.push(1).unwrap());
            let h2 = thread::spawn(move || s2.push(2).unwrap());
            h1.join().unwrap();
            h2.join().unwrap();

            let mut values = stack.snapshot();
            values.sort_unstable();
            assert_eq!(values, vec![1, 2]);
        });
    }

    #[test]
    fn test_concurrent_pop() {
        loom::model(|| {
            let stack = Arc::new(Stack::new());
            stack.push(1).unwrap();

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);
            let h1 = thread::spawn(move || s1.pop());
            let h2 = thread::spawn(move || s2.pop());
            let r1 = h1.join().unwrap();
            let r2 = h2.join().unwrap();

            // Exactly one should get the value
            match (r1, r2) {
                (Ok(1), Err(EmptyStack)) | (Err(EmptyStack), Ok(1)) => {}
                other => panic!("Unexpected result: {:?}", other),
            }
        });
    }

    #[test]
    fn test_events_match_chain() {
        loom::model(|| {
            let stack = Arc::new(Stack::with_event_sink(MemorySink::new()));
            stack.push(1).unwrap();

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);
            let h1 = thread::spawn(move || s1.push(2).unwrap());
            let h2 = thread::spawn(move || s2.pop().ok());
            h1.join().unwrap();
            let popped = h2.join().unwrap();

            let events = stack.with_sink(|sink| sink.events().to_vec());
            let remaining = stack.snapshot();

            // Replaying the log must reproduce the pop result and the chain.
            let mut model = Vec::new();
            for event in &events {
                match event {
                    StackEvent::Pushed(v) => model.push(*v),
                    StackEvent::Popped(v) => assert_eq!(model.pop(), Some(*v)),
                }
            }
            model.reverse();
            assert_eq!(model, remaining);
            assert!(popped.is_some());
            assert_eq!(remaining.len(), 1);
        });
    }
}
