use serde::{Deserialize, Serialize};
use sketcher_types::{EntityKind, WorkplaneRequirement};

use super::{Emitter, Slots, Translator};
use crate::error::SketchError;
use crate::solver::{ConstraintHandle, SolverConstraint};

pub(super) const LEAD: &[EntityKind] = &[EntityKind::Line2D, EntityKind::Point2D];

/// Shared slot signature of horizontal and vertical: a line alone, or two
/// points.
pub(super) fn axis_legal_types(slot: usize, entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
    match (slot, super::other_slot(slot, entities)) {
        (1, Some(EntityKind::Line2D)) => None,
        (0, Some(_)) | (1, _) => Some(EntityKind::POINT_2D),
        _ => Some(LEAD),
    }
}

/// A sketch line parallel to the workplane's u axis, or two points at the
/// same v.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Horizontal {}

impl Translator for Horizontal {
    fn legal_types(slot: usize, entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
        axis_legal_types(slot, entities)
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
        let h1 = emitter.handle(slots.entity1.id)?;
        let handle = if slots.entity1.is_line() {
            emitter.constrain(SolverConstraint::LineHorizontal { line: h1, workplane })?
        } else {
            let h2 = emitter.handle(slots.entity2()?.id)?;
            emitter.points_horizontal(h1, h2, workplane)?
        };
        Ok(vec![handle])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::test_support::Fixture;
    use crate::constraint::Constraint;
    use crate::solver::Group;

    #[test]
    fn line_or_point_pair() {
        let t = Horizontal::legal_types;
        assert_eq!(t(0, [None, None]), Some(LEAD));
        assert_eq!(t(1, [Some(EntityKind::Line2D), None]), None);
        assert_eq!(t(1, [Some(EntityKind::Point2D), None]), Some(EntityKind::POINT_2D));
    }

    #[test]
    fn line_needs_no_partner() {
        let mut f = Fixture::new();
        let line = f.line((0.0, 0.0), (1.0, 0.3));
        let c = Constraint::new(Horizontal::default(), line, None, Some(f.sketch));
        c.validate(&f.store).unwrap();

        let (mut solver, handles) = f.mapped();
        {
            let mut emitter = Emitter::new(&mut solver, &handles, Group::ACTIVE);
            c.emit(&f.store, &mut emitter).unwrap();
        }
        assert!(matches!(
            solver.constraints()[0].1,
            SolverConstraint::LineHorizontal { .. }
        ));
    }

    #[test]
    fn single_point_is_incomplete() {
        let mut f = Fixture::new();
        let p = f.point(0.0, 0.0);
        let c = Constraint::new(Horizontal::default(), p, None, Some(f.sketch));
        assert!(matches!(
            c.validate(&f.store),
            Err(SketchError::MissingSlot { slot: 1, .. })
        ));
    }

    #[test]
    fn point_pair_emits_points_horizontal() {
        let mut f = Fixture::new();
        let a = f.point(0.0, 0.0);
        let b = f.point(2.0, 1.0);
        let c = Constraint::new(Horizontal::default(), a, Some(b), Some(f.sketch));
        let (mut solver, handles) = f.mapped();
        {
            let mut emitter = Emitter::new(&mut solver, &handles, Group::ACTIVE);
            c.emit(&f.store, &mut emitter).unwrap();
        }
        match solver.constraints()[0].1 {
            SolverConstraint::PointsHorizontal { p1, p2, .. } => {
                assert_eq!(p1, handles.get(a).unwrap());
                assert_eq!(p2, handles.get(b).unwrap());
            }
            ref other => panic!("unexpected {other:?}"),
        }
    }
}
