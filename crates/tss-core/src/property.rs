//! Property results and the checker trait.
//!
//! A checker evaluates every invariant of a structure and returns one
//! `PropertyResult` per invariant. Failures carry an optional
//! `Counterexample` that can be rendered for humans.

use std::fmt;

use serde::Serialize;

use crate::counterexample::Counterexample;

/// Outcome of checking a single named invariant.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyResult {
    /// Invariant name (e.g. `NoLostElements`)
    pub name: &'static str,
    /// Whether the invariant held
    pub holds: bool,
    /// Description of the violation, if any
    pub violation: Option<String>,
    /// Failure path, if one was captured
    #[serde(skip)]
    pub counterexample: Option<Counterexample>,
}

impl PropertyResult {
    /// A passing result.
    #[must_use]
    pub fn pass(name: &'static str) -> Self {
        Self {
            name,
            holds: true,
            violation: None,
            counterexample: None,
        }
    }

    /// A failing result.
    #[must_use]
    pub fn fail(
        name: &'static str,
        violation: impl Into<String>,
        counterexample: Option<Counterexample>,
    ) -> Self {
        Self {
            name,
            holds: false,
            violation: Some(violation.into()),
            counterexample,
        }
    }
}

impl fmt::Display for PropertyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.violation {
            None => write!(f, "[PASS] {}", self.name),
            Some(violation) => {
                write!(f, "[FAIL] {}: {}", self.name, violation)?;
                if let Some(ce) = &self.counterexample {
                    write!(f, "\n{}", ce.render_diagram())?;
                }
                Ok(())
            }
        }
    }
}

/// Evaluates every invariant of a structure.
pub trait PropertyChecker {
    /// Check all invariants, one result per invariant.
    fn check_all(&self) -> Vec<PropertyResult>;

    /// True if every invariant holds.
    fn all_hold(&self) -> bool {
        self.check_all().iter().all(|r| r.holds)
    }

    /// The first failing invariant, if any.
    fn first_violation(&self) -> Option<PropertyResult> {
        self.check_all().into_iter().find(|r| !r.holds)
    }
}
