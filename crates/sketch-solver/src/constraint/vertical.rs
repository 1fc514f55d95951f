use serde::{Deserialize, Serialize};
use sketcher_types::{EntityKind, WorkplaneRequirement};

use super::horizontal::axis_legal_types;
use super::{Emitter, Slots, Translator};
use crate::error::SketchError;
use crate::solver::{ConstraintHandle, SolverConstraint};

/// A sketch line parallel to the workplane's v axis, or two points at the
/// same u.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertical {}

impl Translator for Vertical {
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
            emitter.constrain(SolverConstraint::LineVertical { line: h1, workplane })?
        } else {
            let h2 = emitter.handle(slots.entity2()?.id)?;
            emitter.points_vertical(h1, h2, workplane)?
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
    use nalgebra::Vector3;

    #[test]
    fn emits_line_vertical() {
        let mut f = Fixture::new();
        let line = f.line((0.0, 0.0), (0.2, 1.0));
        let c = Constraint::new(Vertical::default(), line, None, Some(f.sketch));
        let (mut solver, handles) = f.mapped();
        {
            let mut emitter = Emitter::new(&mut solver, &handles, Group::ACTIVE);
            c.emit(&f.store, &mut emitter).unwrap();
        }
        assert_eq!(
            solver.constraints()[0].1,
            SolverConstraint::LineVertical {
                line: handles.get(line).unwrap(),
                workplane: handles.get(f.store.sketch(f.sketch).unwrap().workplane).unwrap(),
            }
        );
    }

    #[test]
    fn three_d_points_are_illegal() {
        let mut f = Fixture::new();
        let a = f.store.add_point_3d(Vector3::zeros()).unwrap();
        let b = f.store.add_point_3d(Vector3::x()).unwrap();
        let c = Constraint::new(Vertical::default(), a, Some(b), None);
        assert!(matches!(
            c.validate(&f.store),
            Err(SketchError::IllegalEntityType { slot: 0, .. })
        ));
    }

    #[test]
    fn line_with_partner_is_rejected() {
        let mut f = Fixture::new();
        let line = f.line((0.0, 0.0), (0.0, 1.0));
        let p = f.point(3.0, 3.0);
        let c = Constraint::new(Vertical::default(), line, Some(p), Some(f.sketch));
        assert!(matches!(
            c.validate(&f.store),
            Err(SketchError::SlotMustBeEmpty { slot: 1, .. })
        ));
    }
}
