use serde::{Deserialize, Serialize};
use sketcher_types::EntityKind;

use super::parallel::line_pair;
use super::{Emitter, Slots, Translator};
use crate::error::SketchError;
use crate::solver::{ConstraintHandle, SolverConstraint};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Perpendicular {}

impl Translator for Perpendicular {
    fn legal_types(slot: usize, entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
        line_pair(slot, entities)
    }

    fn emit(
        &self,
        slots: &Slots<'_>,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ConstraintHandle>, SketchError> {
        let handle = emitter.constrain(SolverConstraint::Perpendicular {
            l1: emitter.handle(slots.entity1.id)?,
            l2: emitter.handle(slots.entity2()?.id)?,
            workplane: emitter.workplane(slots)?,
        })?;
        Ok(vec![handle])
    }
}
