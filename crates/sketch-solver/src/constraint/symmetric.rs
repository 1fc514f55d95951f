use serde::{Deserialize, Serialize};
use sketcher_types::{EntityId, EntityKind, WorkplaneRequirement};

use super::{Emitter, Slots, Translator};
use crate::error::SketchError;
use crate::solver::{ConstraintHandle, SolverConstraint};

/// Two points mirrored about an axis: a sketch line for 2D points, a
/// workplane for 3D points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symmetric {
    pub axis: EntityId,
}

impl Symmetric {
    pub fn new(axis: EntityId) -> Self {
        Self { axis }
    }
}

impl Translator for Symmetric {
    fn legal_types(slot: usize, entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
        Some(super::by_dimension(
            super::other_slot(slot, entities),
            EntityKind::POINT,
            EntityKind::POINT_2D,
            &[EntityKind::Point3D],
        ))
    }

    fn workplane_requirement(&self, slots: &Slots<'_>) -> WorkplaneRequirement {
        match slots.store.entity(self.axis) {
            Ok(axis) if axis.is_workplane() => WorkplaneRequirement::Free,
            _ => WorkplaneRequirement::NotFree,
        }
    }

    fn check(&self, slots: &Slots<'_>) -> Result<(), SketchError> {
        let axis = slots.store.entity(self.axis)?;
        if axis.id == slots.entity1.id || slots.entity2.is_some_and(|e| e.id == axis.id) {
            return Err(SketchError::SameEntity);
        }
        let valid = if slots.entity1.is_2d() {
            axis.kind() == EntityKind::Line2D && axis.sketch() == slots.sketch
        } else {
            axis.is_workplane()
        };
        if !valid {
            return Err(SketchError::InvalidReference {
                reason: format!(
                    "{} axis cannot mirror {} points",
                    axis.kind(),
                    if slots.entity1.is_2d() { "sketch" } else { "3D" }
                ),
            });
        }
        Ok(())
    }

    fn emit(
        &self,
        slots: &Slots<'_>,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ConstraintHandle>, SketchError> {
        let p1 = emitter.handle(slots.entity1.id)?;
        let p2 = emitter.handle(slots.entity2()?.id)?;
        let axis = slots.store.entity(self.axis)?;
        let constraint = if axis.is_workplane() {
            SolverConstraint::SymmetricPlane {
                p1,
                p2,
                plane: emitter.handle(axis.id)?,
            }
        } else {
            SolverConstraint::SymmetricLine {
                p1,
                p2,
                line: emitter.handle(axis.id)?,
                workplane: emitter.require_workplane(slots)?,
            }
        };
        Ok(vec![emitter.constrain(constraint)?])
    }

    fn references(&self) -> Vec<EntityId> {
        vec![self.axis]
    }
}
