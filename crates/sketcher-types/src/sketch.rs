use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// A 2D sketch on a workplane. Owns the 2D entities and constraints that
/// reference it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sketch {
    pub name: String,
    /// The workplane entity the sketch lies on.
    pub workplane: EntityId,
    pub visible: bool,
    /// Outcome of the last solve.
    pub solver_state: SolverState,
    /// Remaining degrees of freedom after the last successful solve.
    pub dof: Option<u32>,
}

impl Sketch {
    pub fn new(name: impl Into<String>, workplane: EntityId) -> Self {
        Self {
            name: name.into(),
            workplane,
            visible: true,
            solver_state: SolverState::Okay,
            dof: None,
        }
    }
}

/// Result of running the solver on a sketch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverState {
    #[default]
    Okay,
    /// The constraints contradict each other.
    Inconsistent,
    DidntConverge,
    TooManyUnknowns,
    UnknownFailure,
}

impl SolverState {
    pub fn is_okay(self) -> bool {
        self == SolverState::Okay
    }

    pub fn name(self) -> &'static str {
        match self {
            SolverState::Okay => "Okay",
            SolverState::Inconsistent => "Inconsistent",
            SolverState::DidntConverge => "Didnt Converge",
            SolverState::TooManyUnknowns => "Too Many Unknowns",
            SolverState::UnknownFailure => "Unknown Failure",
        }
    }

    /// Icon identifier shown next to the state in sketch lists.
    pub fn icon(self) -> &'static str {
        match self {
            SolverState::Okay => "CHECKMARK",
            _ => "ERROR",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SolverState::Okay => "Successfully solved",
            SolverState::Inconsistent => {
                "Cannot solve the sketch because of inconsistent constraints, \
                 check through the failed constraints and remove the ones that \
                 contradict each other."
            }
            SolverState::DidntConverge => "Cannot solve the sketch, the solver didn't converge",
            SolverState::TooManyUnknowns => {
                "Cannot solve the sketch because of too many unknowns"
            }
            SolverState::UnknownFailure => "Cannot solve the sketch because of an unknown failure",
        }
    }
}
