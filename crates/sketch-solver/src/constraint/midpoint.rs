use serde::{Deserialize, Serialize};
use sketcher_types::EntityKind;

use super::{Emitter, Slots, Translator};
use crate::error::SketchError;
use crate::solver::{ConstraintHandle, SolverConstraint};

/// A point halfway along a line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Midpoint {}

impl Translator for Midpoint {
    fn legal_types(slot: usize, entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
        let other = super::other_slot(slot, entities);
        Some(if slot == 0 {
            super::by_dimension(other, EntityKind::POINT, EntityKind::POINT_2D, &[EntityKind::Point3D])
        } else {
            super::by_dimension(other, EntityKind::LINE, EntityKind::LINE_2D, &[EntityKind::Line3D])
        })
    }

    fn emit(
        &self,
        slots: &Slots<'_>,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ConstraintHandle>, SketchError> {
        let handle = emitter.constrain(SolverConstraint::Midpoint {
            point: emitter.handle(slots.entity1.id)?,
            line: emitter.handle(slots.entity2()?.id)?,
            workplane: emitter.workplane(slots)?,
        })?;
        Ok(vec![handle])
    }
}
