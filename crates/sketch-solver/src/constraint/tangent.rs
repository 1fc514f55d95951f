use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use sketcher_types::{EntityKind, WorkplaneRequirement};

use super::{Emitter, Slots, Translator};
use crate::config::default_tolerance;
use crate::error::SketchError;
use crate::geometry::intersect_point_line;
use crate::solver::{ConstraintHandle, SolverConstraint};

const PARTNERS: &[EntityKind] = &[EntityKind::Line2D, EntityKind::Circle, EntityKind::Arc];

/// A curve touching a line or another curve.
///
/// Tangency goes through an auxiliary contact point that lies on both
/// entities. Against a line, the radius through the contact point is held
/// perpendicular to the line. Against a curve, the contact point also lies
/// on the line through both centers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tangent {}

impl Translator for Tangent {
    fn legal_types(slot: usize, _entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
        Some(if slot == 0 { EntityKind::CURVE } else { PARTNERS })
    }

    fn workplane_requirement(&self, _slots: &Slots<'_>) -> WorkplaneRequirement {
        WorkplaneRequirement::NotFree
    }

    fn emit(
        &self,
        slots: &Slots<'_>,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ConstraintHandle>, SketchError> {
        let workplane = emitter.require_workplane(slots)?;
        let curve = slots.entity1;
        let other = slots.entity2()?;
        let center = curve.ct()?;
        let center_co = center.co()?;
        let curve_handle = emitter.handle(curve.id)?;
        let center_handle = emitter.handle(center.id)?;
        let other_handle = emitter.handle(other.id)?;

        if other.is_line() {
            let (a, b) = (other.p1()?.co()?, other.p2()?.co()?);
            let (foot, _) = intersect_point_line(&center_co, &a, &b);
            // A center on the line has no foot distinct from itself; start
            // one radius off along the line normal instead.
            let along = b - a;
            let start = if default_tolerance().is_zero_length((foot - center_co).norm())
                && !default_tolerance().is_zero_length(along.norm())
            {
                let normal = Vector2::new(-along.y, along.x).normalize();
                center_co + normal * curve.radius()?
            } else {
                foot
            };
            let contact = emitter.aux_point(workplane, start)?;
            let radius_line = emitter.aux_line(center_handle, contact, workplane)?;
            return Ok(vec![
                emitter.constrain(SolverConstraint::PointOnLine {
                    point: contact,
                    line: other_handle,
                    workplane: Some(workplane),
                })?,
                emitter.constrain(SolverConstraint::PointOnCircle {
                    point: contact,
                    circle: curve_handle,
                })?,
                emitter.constrain(SolverConstraint::Perpendicular {
                    l1: radius_line,
                    l2: other_handle,
                    workplane: Some(workplane),
                })?,
            ]);
        }

        let other_center = other.ct()?;
        let dir = other_center.co()? - center_co;
        let len = dir.norm();
        let start = if len > 0.0 {
            center_co + dir / len * curve.radius()?
        } else {
            center_co
        };
        let other_center_handle = emitter.handle(other_center.id)?;
        let contact = emitter.aux_point(workplane, start)?;
        let center_line = emitter.aux_line(center_handle, other_center_handle, workplane)?;
        Ok(vec![
            emitter.constrain(SolverConstraint::PointOnCircle {
                point: contact,
                circle: curve_handle,
            })?,
            emitter.constrain(SolverConstraint::PointOnCircle {
                point: contact,
                circle: other_handle,
            })?,
            emitter.constrain(SolverConstraint::PointOnLine {
                point: contact,
                line: center_line,
                workplane: Some(workplane),
            })?,
        ])
    }
}
