//! Evaluation phases.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::once::Once;

/// The kind of operation an evaluation is serving.
///
/// Derived values may differ between phases (for example, values that are
/// known when applying are still unknown when planning), so every memoized
/// derivation keeps a separate cell per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalPhase {
    Validate,
    Plan,
    Apply,
    Inspect,
}

impl EvalPhase {
    pub const ALL: [EvalPhase; 4] = [
        EvalPhase::Validate,
        EvalPhase::Plan,
        EvalPhase::Apply,
        EvalPhase::Inspect,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EvalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvalPhase::Validate => "validate",
            EvalPhase::Plan => "plan",
            EvalPhase::Apply => "apply",
            EvalPhase::Inspect => "inspect",
        };
        f.write_str(name)
    }
}

/// One [`Once`] cell per phase.
#[derive(Debug)]
pub struct PerPhase<T> {
    cells: [Once<T>; 4],
}

impl<T: Clone> PerPhase<T> {
    pub fn new(name: &str) -> Self {
        Self {
            cells: EvalPhase::ALL.map(|phase| Once::new(format!("{name} during {phase}"))),
        }
    }

    pub fn get(&self, phase: EvalPhase) -> &Once<T> {
        &self.cells[phase.index()]
    }
}
