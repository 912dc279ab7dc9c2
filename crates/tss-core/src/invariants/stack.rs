//! Stack invariants.
//!
//! | Property | Description |
//! |----------|-------------|
//! | NoLostElements | Every pushed element is in the stack or was popped |
//! | NoDuplicates | No element is in the stack twice or popped twice |
//! | LIFO_Order | Replaying the history on a model stack reproduces every pop |
//! | Linearizability | History steps form one total order and the replay ends in the observed chain |
//! | ChainIntegrity | Traversal from head visits exactly `len` nodes |
//!
//! The checker assumes pushed elements are unique, so that an element's
//! identity is its value. Observations are taken through separate calls;
//! run the checker only when the stack is quiescent.

use std::collections::HashSet;

use crate::counterexample::{ChainIssue, Counterexample, StateSnapshot};
use crate::property::{PropertyChecker, PropertyResult};

/// Properties that any stack implementation must expose.
///
/// Implementations provide access to their internal state for
/// property checking. The checker verifies invariants against
/// this state.
pub trait StackProperties {
    /// Set of all elements that have been pushed.
    fn pushed_elements(&self) -> HashSet<u64>;

    /// Set of all elements that have been popped.
    fn popped_elements(&self) -> HashSet<u64>;

    /// Current contents of the stack (top to bottom).
    fn current_contents(&self) -> Vec<u64>;

    /// Length the stack reports for itself.
    fn reported_len(&self) -> u64;

    /// Operation history in serialization order.
    fn history(&self) -> StackHistory;
}

/// History of completed stack operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackHistory {
    /// Sequence of operations in serialization order
    pub operations: Vec<StackOperation>,
}

/// A single stack operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOperation {
    /// Type of operation
    pub op_type: StackOpType,
    /// Element involved (pushed value or popped value)
    pub element: Option<u64>,
    /// Step number for ordering
    pub step: u64,
}

/// Type of stack operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOpType {
    Push,
    Pop,
    PopEmpty,
}

impl StackHistory {
    /// Create a new empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Step number the next recorded operation should use.
    #[must_use]
    pub fn next_step(&self) -> u64 {
        self.operations.last().map_or(1, |op| op.step + 1)
    }

    /// Record a push operation.
    pub fn record_push(&mut self, element: u64, step: u64) {
        debug_assert!(step > 0, "Step must be positive");
        self.operations.push(StackOperation {
            op_type: StackOpType::Push,
            element: Some(element),
            step,
        });
    }

    /// Record a pop operation. `None` records a pop on an empty stack.
    pub fn record_pop(&mut self, element: Option<u64>, step: u64) {
        debug_assert!(step > 0, "Step must be positive");
        self.operations.push(StackOperation {
            op_type: if element.is_some() {
                StackOpType::Pop
            } else {
                StackOpType::PopEmpty
            },
            element,
            step,
        });
    }

    /// Number of recorded operations of the given type.
    #[must_use]
    pub fn count(&self, op_type: StackOpType) -> usize {
        self.operations.iter().filter(|op| op.op_type == op_type).count()
    }
}

/// Property checker for stack implementations.
pub struct StackPropertyChecker<'a, T: StackProperties> {
    stack: &'a T,
    dst_seed: Option<u64>,
}

impl<'a, T: StackProperties> StackPropertyChecker<'a, T> {
    /// Create a new checker for the given stack.
    #[must_use]
    pub fn new(stack: &'a T) -> Self {
        Self {
            stack,
            dst_seed: None,
        }
    }

    /// Set DST seed for counterexample reproduction.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.dst_seed = Some(seed);
        self
    }

    fn counterexample(&self) -> Counterexample {
        match self.dst_seed {
            Some(seed) => Counterexample::with_seed(seed),
            None => Counterexample::new(),
        }
    }

    /// Every element that was pushed must either be in the stack
    /// or have been popped.
    fn check_no_lost_elements(&self) -> PropertyResult {
        let pushed = self.stack.pushed_elements();
        let popped = self.stack.popped_elements();
        let contents: HashSet<u64> = self.stack.current_contents().into_iter().collect();

        let mut lost: Vec<u64> = pushed
            .iter()
            .filter(|e| !contents.contains(e) && !popped.contains(e))
            .copied()
            .collect();

        if lost.is_empty() {
            return PropertyResult::pass("NoLostElements");
        }
        lost.sort_unstable();

        let mut ce = self.counterexample();
        ce.add_state(StateSnapshot {
            step: 1,
            description: format!("Element {} lost", lost[0]),
            variables: vec![
                ("pushed".to_string(), format!("{:?}", pushed)),
                ("popped".to_string(), format!("{:?}", popped)),
                ("contents".to_string(), format!("{:?}", contents)),
            ],
        });

        PropertyResult::fail(
            "NoLostElements",
            format!(
                "Element {} was pushed but is neither in stack nor popped ({} lost)",
                lost[0],
                lost.len()
            ),
            Some(ce),
        )
    }

    /// No element appears twice in the stack and no element is popped twice.
    fn check_no_duplicates(&self) -> PropertyResult {
        let contents = self.stack.current_contents();

        let mut seen = HashSet::new();
        for (depth, element) in contents.iter().enumerate() {
            if !seen.insert(*element) {
                let first_depth = contents.iter().position(|e| e == element).unwrap_or(0);
                let mut ce = self.counterexample();
                ce.add_chain_issue(ChainIssue::SharedNode {
                    element: *element,
                    first_depth: first_depth as u64,
                    second_depth: depth as u64,
                });
                return PropertyResult::fail(
                    "NoDuplicates",
                    format!("Element {} appears multiple times in stack", element),
                    Some(ce),
                );
            }
        }

        let history = self.stack.history();
        let mut released = HashSet::new();
        for op in &history.operations {
            if let (StackOpType::Pop, Some(element)) = (op.op_type, op.element) {
                if !released.insert(element) {
                    let mut ce = self.counterexample();
                    ce.add_chain_issue(ChainIssue::DoubleRelease {
                        element,
                        step: op.step,
                    });
                    return PropertyResult::fail(
                        "NoDuplicates",
                        format!("Element {} popped twice (step {})", element, op.step),
                        Some(ce),
                    );
                }
            }
        }

        PropertyResult::pass("NoDuplicates")
    }

    /// Replaying the history against a model stack must reproduce
    /// every pop result, including pops on an empty stack.
    fn check_lifo_order(&self) -> PropertyResult {
        let history = self.stack.history();
        let mut model_stack: Vec<u64> = Vec::new();

        for op in &history.operations {
            match op.op_type {
                StackOpType::Push => {
                    if let Some(e) = op.element {
                        model_stack.push(e);
                    }
                }
                StackOpType::Pop => {
                    let Some(expected) = op.element else {
                        continue;
                    };
                    match model_stack.pop() {
                        Some(actual) if actual != expected => {
                            return PropertyResult::fail(
                                "LIFO_Order",
                                format!(
                                    "LIFO violated: pop returned {} but model expected {} (step {})",
                                    expected, actual, op.step
                                ),
                                None,
                            );
                        }
                        None => {
                            return PropertyResult::fail(
                                "LIFO_Order",
                                format!(
                                    "LIFO violated: pop returned {} but model stack was empty (step {})",
                                    expected, op.step
                                ),
                                None,
                            );
                        }
                        _ => {}
                    }
                }
                StackOpType::PopEmpty => {
                    if !model_stack.is_empty() {
                        return PropertyResult::fail(
                            "LIFO_Order",
                            format!(
                                "Pop reported empty but model has {} elements (step {})",
                                model_stack.len(),
                                op.step
                            ),
                            None,
                        );
                    }
                }
            }
        }

        PropertyResult::pass("LIFO_Order")
    }

    /// History steps must be strictly increasing (one total order), and
    /// replaying that order must end in exactly the observed chain.
    fn check_linearizability(&self) -> PropertyResult {
        let history = self.stack.history();

        for pair in history.operations.windows(2) {
            if pair[1].step <= pair[0].step {
                return PropertyResult::fail(
                    "Linearizability",
                    format!(
                        "History not totally ordered: step {} follows step {}",
                        pair[1].step, pair[0].step
                    ),
                    None,
                );
            }
        }

        let mut model_stack: Vec<u64> = Vec::new();
        for op in &history.operations {
            match (op.op_type, op.element) {
                (StackOpType::Push, Some(e)) => model_stack.push(e),
                (StackOpType::Pop, Some(_)) => {
                    model_stack.pop();
                }
                _ => {}
            }
        }
        model_stack.reverse();

        let contents = self.stack.current_contents();
        if model_stack != contents {
            let mut ce = self.counterexample();
            ce.add_state(StateSnapshot {
                step: 1,
                description: "Observed chain differs from replayed history".to_string(),
                variables: vec![
                    ("replayed".to_string(), format!("{:?}", model_stack)),
                    ("observed".to_string(), format!("{:?}", contents)),
                ],
            });
            return PropertyResult::fail(
                "Linearizability",
                format!(
                    "Observed chain of {} elements is not the replay of the history ({} elements)",
                    contents.len(),
                    model_stack.len()
                ),
                Some(ce),
            );
        }

        PropertyResult::pass("Linearizability")
    }

    /// Traversal from head must visit exactly the reported number of nodes.
    fn check_chain_integrity(&self) -> PropertyResult {
        let reported_len = self.stack.reported_len();
        let visited = self.stack.current_contents().len() as u64;

        if visited == reported_len {
            return PropertyResult::pass("ChainIntegrity");
        }

        let issue = if visited > reported_len {
            ChainIssue::Unterminated {
                reported_len,
                visited,
            }
        } else {
            ChainIssue::ShortChain {
                reported_len,
                visited,
            }
        };
        let violation = issue.to_string();
        let mut ce = self.counterexample();
        ce.add_chain_issue(issue);

        PropertyResult::fail("ChainIntegrity", violation, Some(ce))
    }
}

impl<T: StackProperties> PropertyChecker for StackPropertyChecker<'_, T> {
    fn check_all(&self) -> Vec<PropertyResult> {
        vec![
            self.check_no_lost_elements(),
            self.check_no_duplicates(),
            self.check_lifo_order(),
            self.check_linearizability(),
            self.check_chain_integrity(),
        ]
    }
}
