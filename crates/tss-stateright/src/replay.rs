//! Replays model paths on the real stack.
//!
//! The guard serializes every operation, so a model path fixes the order in
//! which operations take effect. Running the `Apply` and `Drain` steps of a
//! path, in path order, on a `tss_stack::Stack` must produce the outcomes
//! the model predicts.

use stateright::Model;
use tss_core::counterexample::{Counterexample, StateSnapshot, ThreadAction};
use tss_stack::{EmptyStack, MemorySink, Stack, StackEvent};

use crate::locked_stack::{
    EventPlacement, LockedStackModel, Outcome, ScriptOp, StackAction, StackState, Value,
};

/// What a replay did to the real stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    /// Model actions replayed
    pub steps: usize,
    /// Events the real stack recorded
    pub events: Vec<StackEvent<Value>>,
    /// Elements left on the real stack
    pub final_len: usize,
    /// Nodes released by the real drain, if the path drained
    pub drained: Option<usize>,
}

/// Run `actions` on a fresh [`Stack`] and compare every outcome with the
/// model.
///
/// Fails on the first action that is not enabled in the model or whose
/// real outcome differs from the model's.
pub fn replay_on_stack(
    model: &LockedStackModel,
    actions: &[StackAction],
) -> Result<ReplayReport, String> {
    let stack = Stack::with_event_sink(MemorySink::new());
    let mut state = initial_state(model)?;
    let mut drained = None;
    let mut enabled = Vec::new();

    for (step, &action) in actions.iter().enumerate() {
        enabled.clear();
        model.actions(&state, &mut enabled);
        if !enabled.contains(&action) {
            return Err(format!("step {}: {:?} is not enabled", step, action));
        }
        let next = model
            .next_state(&state, action)
            .ok_or_else(|| format!("step {}: {:?} has no successor", step, action))?;

        match action {
            StackAction::Apply(t) => {
                let actual = match model.scripts[t][state.threads[t].pc] {
                    ScriptOp::Push(value) => match stack.push(value) {
                        Ok(()) => Outcome::Pushed,
                        Err(err) => return Err(format!("step {}: push({}): {}", step, value, err)),
                    },
                    ScriptOp::Pop => match stack.pop() {
                        Ok(value) => Outcome::Popped(value),
                        Err(EmptyStack) => Outcome::Empty,
                    },
                };
                let expected = next.threads[t].outcomes.last().copied();
                if expected != Some(actual) {
                    return Err(format!(
                        "step {}: thread {} saw {:?}, model expected {:?}",
                        step, t, actual, expected
                    ));
                }
            }
            StackAction::Drain => {
                let released = stack.drain();
                let expected = next.drained.as_ref().map_or(0, Vec::len);
                if released != expected {
                    return Err(format!(
                        "step {}: drain released {}, model expected {}",
                        step, released, expected
                    ));
                }
                drained = Some(released);
            }
            StackAction::Acquire(_) | StackAction::Release(_) | StackAction::Record(_) => {}
        }
        state = next;
    }

    // Snapshot is top first; the model chain is bottom first.
    let mut expected_contents = state.chain.clone();
    expected_contents.reverse();
    if stack.snapshot() != expected_contents {
        return Err(format!(
            "final contents {:?} differ from model {:?}",
            stack.snapshot(),
            expected_contents
        ));
    }

    let final_len = stack.len();
    let events = stack.into_sink().into_events();
    if model.placement == EventPlacement::InsideGuard && events != state.log {
        return Err(format!(
            "event log {:?} differs from model log {:?}",
            events, state.log
        ));
    }

    Ok(ReplayReport {
        steps: actions.len(),
        events,
        final_len,
        drained,
    })
}

/// Render a model path as a [`Counterexample`] thread diagram.
pub fn to_counterexample(
    model: &LockedStackModel,
    actions: &[StackAction],
    description: &str,
) -> Counterexample {
    let mut counterexample = Counterexample::new().with_description(description);
    let Ok(mut state) = initial_state(model) else {
        return counterexample;
    };

    for (i, &action) in actions.iter().enumerate() {
        let step = i as u64 + 1;
        let Some(next) = model.next_state(&state, action) else {
            break;
        };

        let (thread_id, label) = match action {
            StackAction::Acquire(t) => (t, "acquire".to_string()),
            StackAction::Apply(t) => (t, describe_apply(model, &state, t)),
            StackAction::Release(t) => (t, "release".to_string()),
            StackAction::Record(t) => (t, "record event".to_string()),
            // Drain runs on the thread that joined the workers.
            StackAction::Drain => (model.scripts.len(), "drain".to_string()),
        };
        counterexample.add_action(ThreadAction {
            thread_id: thread_id as u64,
            step,
            action: label,
        });
        counterexample.add_state(StateSnapshot {
            step,
            description: format!("after {:?}", action),
            variables: vec![
                ("chain".to_string(), format!("{:?}", next.chain)),
                ("log".to_string(), format_log(&next.log)),
            ],
        });
        state = next;
    }
    counterexample
}

fn initial_state(model: &LockedStackModel) -> Result<StackState, String> {
    model
        .init_states()
        .pop()
        .ok_or_else(|| "model has no initial state".to_string())
}

fn describe_apply(model: &LockedStackModel, state: &StackState, t: usize) -> String {
    match model.scripts[t].get(state.threads[t].pc) {
        Some(ScriptOp::Push(value)) => format!("push({})", value),
        Some(ScriptOp::Pop) => "pop()".to_string(),
        None => "apply".to_string(),
    }
}

fn format_log(log: &[StackEvent<Value>]) -> String {
    let lines: Vec<String> = log.iter().map(ToString::to_string).collect();
    format!("[{}]", lines.join(", "))
}
