use serde::{Deserialize, Serialize};

use sketch_solver::{Constraint, SolveReport, SolveScope, SolverConfig};
use sketcher_types::{Alignment, ConstraintId, Entity, EntityId, SketchId, SolverState};

use crate::panel::{ConstraintProperties, SketcherPanel};

/// Requests from the host application to the sketcher.
/// Serialized as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostToSketcher {
    // -- Entities and sketches --
    AddEntity {
        entity: Entity,
    },
    /// Create a sketch on a workplane entity and make it active.
    AddSketch {
        name: String,
        workplane: EntityId,
    },
    DeleteEntity {
        entity: EntityId,
    },
    DeleteSketch {
        sketch: SketchId,
    },

    // -- Constraints --
    /// Add a constraint. With `init`, its parameters are derived from the
    /// current geometry first.
    AddConstraint {
        constraint: Constraint,
        #[serde(default)]
        init: bool,
    },
    DeleteConstraint {
        constraint: ConstraintId,
    },
    /// Set the value of a distance, angle, diameter or ratio.
    SetValue {
        constraint: ConstraintId,
        value: f64,
    },
    SetFlip {
        constraint: ConstraintId,
        flip: bool,
    },
    SetAlign {
        constraint: ConstraintId,
        align: Alignment,
    },
    /// Supplementary angle, or radius mode of a diameter.
    SetSetting {
        constraint: ConstraintId,
        setting: bool,
    },
    /// Move a distance label, in the label frame.
    MoveLabel {
        constraint: ConstraintId,
        position: [f64; 2],
    },
    /// Properties of one constraint, as shown in the side panel.
    InspectConstraint {
        constraint: ConstraintId,
    },

    // -- Sketch session --
    SetActiveSketch {
        sketch: Option<SketchId>,
    },
    SetSketchVisible {
        sketch: SketchId,
        visible: bool,
    },
    RenameSketch {
        sketch: SketchId,
        name: String,
    },
    /// Solve one sketch, or everything when `all` is set. Without a sketch,
    /// the active sketch is solved (the free 3D scope when none is active).
    Solve {
        #[serde(default)]
        sketch: Option<SketchId>,
        #[serde(default)]
        all: bool,
    },
    ShowSolverState {
        sketch: SketchId,
    },
    SetSolverConfig {
        config: SolverConfig,
    },
    RequestPanel,
}

/// Responses from the sketcher to the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SketcherToHost {
    EntityAdded {
        id: EntityId,
    },
    SketchAdded {
        id: SketchId,
    },
    ConstraintAdded {
        id: ConstraintId,
        constraint: Constraint,
    },
    /// A constraint changed; `solve` carries the re-solve of its scope.
    ConstraintUpdated {
        id: ConstraintId,
        constraint: Constraint,
        solve: Option<SolveSummary>,
    },
    ConstraintProperties {
        id: ConstraintId,
        properties: ConstraintProperties,
    },
    /// Everything a delete removed, dependents included.
    Removed {
        entities: Vec<EntityId>,
        constraints: Vec<ConstraintId>,
        sketches: Vec<SketchId>,
    },
    Solved {
        reports: Vec<SolveSummary>,
    },
    SolverState {
        sketch: SketchId,
        state: SolverState,
        name: String,
        description: String,
        dof: Option<u32>,
    },
    Panel {
        panel: SketcherPanel,
    },
    Ack,
    Error {
        message: String,
    },
}

/// Serializable digest of a [`SolveReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveSummary {
    pub scope: SolveScope,
    pub state: SolverState,
    pub dof: Option<u32>,
    pub failed: Vec<ConstraintId>,
    /// Constraints skipped during emission, with the reason.
    pub invalid: Vec<(ConstraintId, String)>,
}

impl From<SolveReport> for SolveSummary {
    fn from(report: SolveReport) -> Self {
        Self {
            scope: report.scope,
            state: report.state,
            dof: report.dof,
            failed: report.failed,
            invalid: report
                .invalid
                .into_iter()
                .map(|(id, err)| (id, err.to_string()))
                .collect(),
        }
    }
}
