use sketcher_types::{ConstraintId, EntityId, EntityKind, SketchId};

use crate::solver::SolverError;

/// Errors raised by the sketch store and the constraint translators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SketchError {
    #[error("cannot create a constraint between an entity and itself")]
    SameEntity,

    #[error("{constraint} does not accept {found} in slot {slot}")]
    IllegalEntityType {
        constraint: &'static str,
        slot: usize,
        found: EntityKind,
    },

    #[error("{constraint} requires an entity in slot {slot}")]
    MissingSlot { constraint: &'static str, slot: usize },

    #[error("{constraint} must leave slot {slot} empty")]
    SlotMustBeEmpty { constraint: &'static str, slot: usize },

    #[error("{constraint} requires a sketch workplane")]
    WorkplaneRequired { constraint: &'static str },

    #[error("{constraint} between these entities is only valid outside a sketch")]
    WorkplaneForbidden { constraint: &'static str },

    #[error("constraint value must be finite, got {value}")]
    NonFiniteValue { value: f64 },

    #[error("entity not found: {0:?}")]
    MissingEntity(EntityId),

    #[error("sketch not found: {0:?}")]
    MissingSketch(SketchId),

    #[error("constraint not found: {0:?}")]
    MissingConstraint(ConstraintId),

    #[error("entity {id:?}: expected {expected}, found {found}")]
    WrongEntityKind {
        id: EntityId,
        expected: &'static str,
        found: EntityKind,
    },

    #[error("invalid reference: {reason}")]
    InvalidReference { reason: String },

    #[error("entity {0:?} has no solver counterpart")]
    UnmappedEntity(EntityId),

    #[error("solver error: {0}")]
    Solver(#[from] SolverError),
}

impl SketchError {
    /// Validation errors block an action before any state is committed.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SketchError::SameEntity
                | SketchError::IllegalEntityType { .. }
                | SketchError::MissingSlot { .. }
                | SketchError::SlotMustBeEmpty { .. }
                | SketchError::WorkplaneRequired { .. }
                | SketchError::WorkplaneForbidden { .. }
                | SketchError::NonFiniteValue { .. }
                | SketchError::InvalidReference { .. }
        )
    }
}
