use serde::{Deserialize, Serialize};
use sketcher_types::{ConstraintId, SketchId, SolverState};

use crate::error::SketchError;

// ── Solve Scope ─────────────────────────────────────────────────────────────

/// What a solve run moves: the entities of one sketch, or the 3D entities
/// outside any sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolveScope {
    Sketch(SketchId),
    Free,
}

impl SolveScope {
    pub fn sketch(self) -> Option<SketchId> {
        match self {
            SolveScope::Sketch(id) => Some(id),
            SolveScope::Free => None,
        }
    }
}

// ── Solve Output ────────────────────────────────────────────────────────────

/// Outcome of one solve run.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub scope: SolveScope,
    pub state: SolverState,
    /// Remaining degrees of freedom, when the solve succeeded.
    pub dof: Option<u32>,
    /// Constraints the backend blamed for a failure.
    pub failed: Vec<ConstraintId>,
    /// Constraints skipped because they could not be emitted.
    pub invalid: Vec<(ConstraintId, SketchError)>,
}

impl SolveReport {
    pub fn is_okay(&self) -> bool {
        self.state.is_okay()
    }

    /// Solved with no remaining freedom.
    pub fn is_fully_constrained(&self) -> bool {
        self.is_okay() && self.dof == Some(0)
    }
}
