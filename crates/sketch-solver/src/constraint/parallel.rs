use serde::{Deserialize, Serialize};
use sketcher_types::EntityKind;

use super::{Emitter, Slots, Translator};
use crate::error::SketchError;
use crate::solver::{ConstraintHandle, SolverConstraint};

/// Two lines of matching dimensionality.
pub(super) fn line_pair(slot: usize, entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
    Some(super::by_dimension(
        super::other_slot(slot, entities),
        EntityKind::LINE,
        EntityKind::LINE_2D,
        &[EntityKind::Line3D],
    ))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parallel {}

impl Translator for Parallel {
    fn legal_types(slot: usize, entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
        line_pair(slot, entities)
    }

    fn emit(
        &self,
        slots: &Slots<'_>,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ConstraintHandle>, SketchError> {
        let handle = emitter.constrain(SolverConstraint::Parallel {
            l1: emitter.handle(slots.entity1.id)?,
            l2: emitter.handle(slots.entity2()?.id)?,
            workplane: emitter.workplane(slots)?,
        })?;
        Ok(vec![handle])
    }
}
