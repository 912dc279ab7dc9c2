//! State machine for the mutex-guarded stack.
//!
//! A thread runs a fixed script of pushes and pops. Each script step takes
//! three model actions:
//!
//! 1. `Acquire`: take the guard (enabled only while nobody holds it)
//! 2. `Apply`: mutate the chain and record the event
//! 3. `Release`: give the guard back and move to the next step
//!
//! With [`EventPlacement::AfterRelease`] the event is recorded by a fourth
//! action after the guard is released. That placement is wrong and the
//! checker finds the interleaving that makes the log disagree with the
//! chain.
//!
//! # Invariants
//!
//! | Property | Kind |
//! |----------|------|
//! | at most one thread inside the guard | always |
//! | log replays to the chain, drain included | always |
//! | every pushed value is on the chain, popped or drained, once | always |
//! | a pop can return another thread's value | sometimes |
//! | the stack is eventually drained | eventually |

use std::collections::BTreeSet;

use stateright::{Model, Property};
use tss_stack::StackEvent;

/// Values are small so the state space stays small.
pub type Value = u8;

/// One step of a thread's script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptOp {
    Push(Value),
    Pop,
}

/// What the caller of one script step observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Pushed,
    Popped(Value),
    Empty,
}

/// Where a thread is relative to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Not holding the guard
    Idle,
    /// Holding the guard, step not applied yet
    Holding,
    /// Holding the guard, step applied
    Applied,
    /// Guard released with an event still to record
    Released,
}

/// When the event of an operation reaches the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventPlacement {
    /// Together with the mutation, while the guard is held
    #[default]
    InsideGuard,
    /// After the guard has been released
    AfterRelease,
}

/// Per-thread state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadState {
    /// Index of the next script step
    pub pc: usize,
    pub phase: Phase,
    /// Event waiting to be recorded (`AfterRelease` only)
    pub pending: Option<StackEvent<Value>>,
    /// One outcome per applied script step
    pub outcomes: Vec<Outcome>,
}

impl ThreadState {
    fn new() -> Self {
        Self {
            pc: 0,
            phase: Phase::Idle,
            pending: None,
            outcomes: Vec::new(),
        }
    }

    fn inside_guard(&self) -> bool {
        matches!(self.phase, Phase::Holding | Phase::Applied)
    }
}

/// Model state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackState {
    /// Thread holding the guard
    pub holder: Option<usize>,
    /// Chain contents, bottom first
    pub chain: Vec<Value>,
    /// Event log in the order events were recorded
    pub log: Vec<StackEvent<Value>>,
    pub threads: Vec<ThreadState>,
    /// Values released by drain, once it has run
    pub drained: Option<Vec<Value>>,
}

impl StackState {
    /// Replay the log on an empty stack.
    ///
    /// Returns `None` if a `Popped` event does not match the top of the
    /// replayed stack.
    pub fn replay_log(&self) -> Option<Vec<Value>> {
        let mut replayed = Vec::new();
        for event in &self.log {
            match *event {
                StackEvent::Pushed(value) => replayed.push(value),
                StackEvent::Popped(value) => {
                    if replayed.pop() != Some(value) {
                        return None;
                    }
                }
            }
        }
        Some(replayed)
    }

    pub fn has_pending_events(&self) -> bool {
        self.threads.iter().any(|t| t.pending.is_some())
    }

    /// Values returned by successful pops, in no particular order.
    pub fn popped_values(&self) -> Vec<Value> {
        self.threads
            .iter()
            .flat_map(|t| t.outcomes.iter())
            .filter_map(|outcome| match outcome {
                Outcome::Popped(value) => Some(*value),
                _ => None,
            })
            .collect()
    }
}

/// Actions of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackAction {
    Acquire(usize),
    Apply(usize),
    Release(usize),
    Record(usize),
    Drain,
}

/// Threads running fixed scripts against one guarded stack, followed by a
/// drain once every thread has finished.
#[derive(Debug, Clone)]
pub struct LockedStackModel {
    pub scripts: Vec<Vec<ScriptOp>>,
    pub placement: EventPlacement,
}

impl LockedStackModel {
    pub fn new(scripts: Vec<Vec<ScriptOp>>) -> Self {
        debug_assert!(
            Self::push_values_unique(&scripts),
            "pushed values must be unique"
        );
        Self {
            scripts,
            placement: EventPlacement::InsideGuard,
        }
    }

    #[must_use]
    pub fn with_placement(mut self, placement: EventPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// The driver's worker script: per iteration push, push, pop, push, pop.
    ///
    /// Thread `t` pushes `3k+1`, `3k+2`, `3k+3` with `k = t * iterations + i`.
    pub fn worker_scripts(threads_count: usize, iterations: usize) -> Self {
        debug_assert!(
            threads_count * iterations * 3 <= Value::MAX as usize,
            "values must fit in Value"
        );
        let scripts = (0..threads_count)
            .map(|t| {
                (0..iterations)
                    .flat_map(|i| {
                        let base = ((t * iterations + i) * 3) as Value;
                        [
                            ScriptOp::Push(base + 1),
                            ScriptOp::Push(base + 2),
                            ScriptOp::Pop,
                            ScriptOp::Push(base + 3),
                            ScriptOp::Pop,
                        ]
                    })
                    .collect()
            })
            .collect();
        Self::new(scripts)
    }

    /// Thread that pushes `value`, if any.
    pub fn owner_of(&self, value: Value) -> Option<usize> {
        self.scripts
            .iter()
            .position(|script| script.contains(&ScriptOp::Push(value)))
    }

    /// Values whose push has been applied.
    pub fn pushed_values(&self, state: &StackState) -> Vec<Value> {
        state
            .threads
            .iter()
            .zip(&self.scripts)
            .flat_map(|(thread, script)| {
                thread
                    .outcomes
                    .iter()
                    .zip(script)
                    .filter_map(|(outcome, op)| match (outcome, op) {
                        (Outcome::Pushed, ScriptOp::Push(value)) => Some(*value),
                        _ => None,
                    })
            })
            .collect()
    }

    fn all_finished(&self, state: &StackState) -> bool {
        state
            .threads
            .iter()
            .zip(&self.scripts)
            .all(|(thread, script)| thread.pc == script.len() && thread.phase == Phase::Idle)
    }

    fn push_values_unique(scripts: &[Vec<ScriptOp>]) -> bool {
        let mut seen = BTreeSet::new();
        scripts.iter().flatten().all(|op| match op {
            ScriptOp::Push(value) => seen.insert(*value),
            ScriptOp::Pop => true,
        })
    }
}

impl Model for LockedStackModel {
    type State = StackState;
    type Action = StackAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![StackState {
            holder: None,
            chain: Vec::new(),
            log: Vec::new(),
            threads: self.scripts.iter().map(|_| ThreadState::new()).collect(),
            drained: None,
        }]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for (t, thread) in state.threads.iter().enumerate() {
            match thread.phase {
                Phase::Idle if state.holder.is_none() && thread.pc < self.scripts[t].len() => {
                    actions.push(StackAction::Acquire(t));
                }
                Phase::Idle => {}
                Phase::Holding => actions.push(StackAction::Apply(t)),
                Phase::Applied => actions.push(StackAction::Release(t)),
                Phase::Released => actions.push(StackAction::Record(t)),
            }
        }

        if state.drained.is_none() && state.holder.is_none() && self.all_finished(state) {
            actions.push(StackAction::Drain);
        }
    }

    fn next_state(&self, last_state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = last_state.clone();
        match action {
            StackAction::Acquire(t) => {
                next.holder = Some(t);
                next.threads[t].phase = Phase::Holding;
            }
            StackAction::Apply(t) => {
                let op = self.scripts[t][next.threads[t].pc];
                let (outcome, event) = match op {
                    ScriptOp::Push(value) => {
                        next.chain.push(value);
                        (Outcome::Pushed, Some(StackEvent::Pushed(value)))
                    }
                    ScriptOp::Pop => match next.chain.pop() {
                        Some(value) => (Outcome::Popped(value), Some(StackEvent::Popped(value))),
                        None => (Outcome::Empty, None),
                    },
                };

                let thread = &mut next.threads[t];
                thread.outcomes.push(outcome);
                thread.phase = Phase::Applied;
                match self.placement {
                    EventPlacement::InsideGuard => next.log.extend(event),
                    EventPlacement::AfterRelease => thread.pending = event,
                }
            }
            StackAction::Release(t) => {
                next.holder = None;
                let thread = &mut next.threads[t];
                thread.pc += 1;
                thread.phase = if thread.pending.is_some() {
                    Phase::Released
                } else {
                    Phase::Idle
                };
            }
            StackAction::Record(t) => {
                let thread = &mut next.threads[t];
                if let Some(event) = thread.pending.take() {
                    next.log.push(event);
                }
                thread.phase = Phase::Idle;
            }
            StackAction::Drain => {
                let released = std::mem::take(&mut next.chain);
                next.log
                    .extend(released.iter().rev().map(|&value| StackEvent::Popped(value)));
                next.drained = Some(released);
            }
        }
        Some(next)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::always(
                "mutual exclusion",
                |_: &LockedStackModel, state: &StackState| {
                    let mut inside = state
                        .threads
                        .iter()
                        .enumerate()
                        .filter(|(_, t)| t.inside_guard())
                        .map(|(i, _)| i);
                    match (inside.next(), inside.next()) {
                        (None, _) => true,
                        (Some(t), None) => state.holder == Some(t),
                        (Some(_), Some(_)) => false,
                    }
                },
            ),
            Property::always(
                "log replays to chain",
                |_: &LockedStackModel, state: &StackState| {
                    if state.has_pending_events() {
                        return true;
                    }
                    state.replay_log().as_ref() == Some(&state.chain)
                },
            ),
            Property::always(
                "no lost or duplicated elements",
                |model: &LockedStackModel, state: &StackState| {
                    let mut pushed = model.pushed_values(state);
                    let mut accounted = state.chain.clone();
                    accounted.extend(state.popped_values());
                    accounted.extend(state.drained.iter().flatten());
                    pushed.sort_unstable();
                    accounted.sort_unstable();
                    pushed == accounted
                },
            ),
            Property::sometimes(
                "pop returns another thread's value",
                |model: &LockedStackModel, state: &StackState| {
                    state.threads.iter().enumerate().any(|(t, thread)| {
                        thread.outcomes.iter().any(|outcome| match outcome {
                            Outcome::Popped(value) => model.owner_of(*value) != Some(t),
                            _ => false,
                        })
                    })
                },
            ),
            Property::eventually("drained", |_: &LockedStackModel, state: &StackState| {
                state.drained.is_some()
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateright::Checker;

    #[test]
    fn test_worker_scripts_layout() {
        let model = LockedStackModel::worker_scripts(2, 2);
        assert_eq!(model.scripts.len(), 2);
        assert_eq!(model.scripts[0].len(), 10);
        assert_eq!(model.scripts[0][0], ScriptOp::Push(1));
        assert_eq!(model.scripts[0][3], ScriptOp::Push(3));
        assert_eq!(model.scripts[0][5], ScriptOp::Push(4));
        assert_eq!(model.scripts[1][0], ScriptOp::Push(7));
        assert_eq!(model.owner_of(7), Some(1));
        assert_eq!(model.owner_of(200), None);
    }

    #[test]
    fn test_single_thread_is_sequential() {
        let model = LockedStackModel::new(vec![vec![
            ScriptOp::Pop,
            ScriptOp::Push(1),
            ScriptOp::Push(2),
            ScriptOp::Pop,
        ]]);
        let checker = model.checker().spawn_bfs().join();

        // The other-thread pop is unreachable with one thread.
        assert!(checker
            .discovery("pop returns another thread's value")
            .is_none());
        assert!(checker.discovery("mutual exclusion").is_none());
        assert!(checker.discovery("log replays to chain").is_none());
        assert!(checker.discovery("no lost or duplicated elements").is_none());
    }

    #[test]
    fn test_stateright_two_workers() {
        LockedStackModel::worker_scripts(2, 1)
            .checker()
            .spawn_bfs()
            .join()
            .assert_properties();
    }

    #[test]
    fn test_stateright_events_after_release_diverge() {
        let model = LockedStackModel::worker_scripts(2, 1).with_placement(EventPlacement::AfterRelease);
        let checker = model.checker().spawn_bfs().join();

        assert!(
            checker.discovery("log replays to chain").is_some(),
            "recording events outside the guard must reorder the log"
        );
        // The chain itself stays correct; only the log is wrong.
        assert!(checker.discovery("mutual exclusion").is_none());
        assert!(checker.discovery("no lost or duplicated elements").is_none());
    }

    #[test]
    fn test_drain_logs_released_values_top_first() {
        let model = LockedStackModel::new(vec![vec![ScriptOp::Push(1), ScriptOp::Push(2)]]);
        let mut state = model.init_states().pop().unwrap();
        for _ in 0..2 {
            for action in [StackAction::Acquire(0), StackAction::Apply(0), StackAction::Release(0)] {
                state = model.next_state(&state, action).unwrap();
            }
        }
        state = model.next_state(&state, StackAction::Drain).unwrap();

        assert!(state.chain.is_empty());
        assert_eq!(state.drained, Some(vec![1, 2]));
        assert_eq!(
            state.log,
            vec![
                StackEvent::Pushed(1),
                StackEvent::Pushed(2),
                StackEvent::Popped(2),
                StackEvent::Popped(1),
            ]
        );
        assert_eq!(state.replay_log(), Some(vec![]));
    }

    #[test]
    fn test_replay_log_detects_bad_pop() {
        let state = StackState {
            holder: None,
            chain: vec![],
            log: vec![StackEvent::Pushed(1), StackEvent::Pushed(2), StackEvent::Popped(1)],
            threads: vec![],
            drained: None,
        };
        assert_eq!(state.replay_log(), None);
    }
}
