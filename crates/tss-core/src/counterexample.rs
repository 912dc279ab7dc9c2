//! Counterexample representation and rendering.
//!
//! When a property violation is detected, a counterexample shows
//! the sequence of operations that led to the failure.

use std::fmt;

/// A counterexample showing the failure path.
///
/// Holds the steps and state snapshots that led to an invariant
/// violation, plus any structural chain problems found.
#[derive(Debug, Clone, Default)]
pub struct Counterexample {
    pub states: Vec<StateSnapshot>,
    /// Thread actions in the order they took effect
    pub interleaving: Vec<ThreadAction>,
    /// Structural problems found in the node chain
    pub chain_issues: Vec<ChainIssue>,
    /// DST seed for reproduction (if applicable)
    pub dst_seed: Option<u64>,
    pub description: Option<String>,
}

/// Snapshot of system state at a point in time.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub step: u64,
    pub description: String,
    /// Named values at this step
    pub variables: Vec<(String, String)>,
}

/// One step of one thread.
#[derive(Debug, Clone)]
pub struct ThreadAction {
    pub thread_id: u64,
    /// Step at which the action took effect
    pub step: u64,
    pub action: String,
}

/// Structural problem in the chain reachable from head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainIssue {
    /// Traversal did not terminate within the reported length
    Unterminated { reported_len: u64, visited: u64 },
    /// Traversal ended before the reported length was reached
    ShortChain { reported_len: u64, visited: u64 },
    /// The same element was reached from two predecessors
    SharedNode { element: u64, first_depth: u64, second_depth: u64 },
    /// An element was released twice
    DoubleRelease { element: u64, step: u64 },
}

impl Counterexample {
    /// Create a new empty counterexample.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counterexample with DST seed for reproduction.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            dst_seed: Some(seed),
            ..Self::default()
        }
    }

    /// Set the description for this counterexample.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a state snapshot.
    pub fn add_state(&mut self, state: StateSnapshot) {
        debug_assert!(
            self.states.last().map_or(true, |last| state.step > last.step),
            "States must be added in order"
        );
        self.states.push(state);
    }

    /// Add a thread action.
    pub fn add_action(&mut self, action: ThreadAction) {
        self.interleaving.push(action);
    }

    /// Add a chain issue.
    pub fn add_chain_issue(&mut self, issue: ChainIssue) {
        self.chain_issues.push(issue);
    }

    /// Render the failure as one row per step.
    ///
    /// ```text
    /// DST_SEED=12345
    /// Failure: element 7 lost
    ///
    /// step  thread  action
    ///    1  T0      push(7)             len=1
    ///    2  T1      pop()               len=0
    /// ```
    #[must_use]
    pub fn render_diagram(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(seed) = self.dst_seed {
            writeln!(f, "DST_SEED={}", seed)?;
        }
        if let Some(description) = &self.description {
            writeln!(f, "Failure: {}", description)?;
        }

        if !self.interleaving.is_empty() {
            writeln!(f, "\nstep  thread  action")?;
        }
        for action in &self.interleaving {
            let state = self.states.iter().find(|s| s.step == action.step);
            write!(
                f,
                "{:>4}  T{:<6} {:<18}",
                action.step, action.thread_id, action.action
            )?;
            match state {
                Some(state) => writeln!(f, "  {}", state.description)?,
                None => writeln!(f)?,
            }
        }

        // Snapshots not tied to an action carry their variables.
        for state in &self.states {
            if self.interleaving.iter().any(|a| a.step == state.step) {
                continue;
            }
            writeln!(f, "\nstep {}: {}", state.step, state.description)?;
            for (name, value) in &state.variables {
                writeln!(f, "  {} = {}", name, value)?;
            }
        }

        if !self.chain_issues.is_empty() {
            writeln!(f, "\nchain issues:")?;
            for issue in &self.chain_issues {
                writeln!(f, "  - {}", issue)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ChainIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainIssue::Unterminated {
                reported_len,
                visited,
            } => write!(
                f,
                "Unterminated chain: visited {} nodes but length is {}",
                visited, reported_len
            ),
            ChainIssue::ShortChain {
                reported_len,
                visited,
            } => write!(
                f,
                "Short chain: reached end after {} nodes but length is {}",
                visited, reported_len
            ),
            ChainIssue::SharedNode {
                element,
                first_depth,
                second_depth,
            } => write!(
                f,
                "Shared node: element {} reachable at depth {} and {}",
                element, first_depth, second_depth
            ),
            ChainIssue::DoubleRelease { element, step } => {
                write!(f, "Double release: element {} released again at step {}", element, step)
            }
        }
    }
}
