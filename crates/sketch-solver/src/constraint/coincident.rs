use serde::{Deserialize, Serialize};
use sketcher_types::{EntityKind, WorkplaneRequirement};

use super::{Emitter, Slots, Translator};
use crate::error::SketchError;
use crate::solver::{ConstraintHandle, SolverConstraint};

const TARGETS: &[EntityKind] = &[
    EntityKind::Point3D,
    EntityKind::Point2D,
    EntityKind::Line3D,
    EntityKind::Line2D,
    EntityKind::Circle,
    EntityKind::Arc,
    EntityKind::Workplane,
];
const TARGETS_3D: &[EntityKind] = &[EntityKind::Point3D, EntityKind::Line3D, EntityKind::Workplane];
const TARGETS_2D: &[EntityKind] = &[
    EntityKind::Point2D,
    EntityKind::Line2D,
    EntityKind::Circle,
    EntityKind::Arc,
];

/// A point lying on another point, a line, a curve or a workplane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coincident {}

impl Translator for Coincident {
    fn legal_types(slot: usize, entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
        let other = super::other_slot(slot, entities);
        Some(if slot == 0 {
            super::by_dimension(other, EntityKind::POINT, EntityKind::POINT_2D, &[EntityKind::Point3D])
        } else {
            super::by_dimension(other, TARGETS, TARGETS_2D, TARGETS_3D)
        })
    }

    fn workplane_requirement(&self, slots: &Slots<'_>) -> WorkplaneRequirement {
        if slots.entity2.is_some_and(|e| e.is_workplane()) {
            WorkplaneRequirement::Free
        } else {
            WorkplaneRequirement::Optional
        }
    }

    fn emit(
        &self,
        slots: &Slots<'_>,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ConstraintHandle>, SketchError> {
        let target = slots.entity2()?;
        let point = emitter.handle(slots.entity1.id)?;
        let other = emitter.handle(target.id)?;
        let workplane = emitter.workplane(slots)?;

        let constraint = if target.is_point() {
            SolverConstraint::PointsCoincident {
                p1: point,
                p2: other,
                workplane,
            }
        } else if target.is_line() {
            SolverConstraint::PointOnLine {
                point,
                line: other,
                workplane,
            }
        } else if target.is_curve() {
            SolverConstraint::PointOnCircle {
                point,
                circle: other,
            }
        } else {
            SolverConstraint::PointInPlane { point, plane: other }
        };
        Ok(vec![emitter.constrain(constraint)?])
    }
}
