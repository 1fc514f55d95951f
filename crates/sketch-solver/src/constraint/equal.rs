use serde::{Deserialize, Serialize};
use sketcher_types::EntityKind;

use super::{Emitter, Slots, Translator};
use crate::error::SketchError;
use crate::solver::{ConstraintHandle, SolverConstraint};

const SIZED: &[EntityKind] = &[
    EntityKind::Line3D,
    EntityKind::Line2D,
    EntityKind::Circle,
    EntityKind::Arc,
];
const AFTER_LINE_2D: &[EntityKind] = &[EntityKind::Line2D, EntityKind::Arc];
const AFTER_LINE_3D: &[EntityKind] = &[EntityKind::Line3D];
const AFTER_ARC: &[EntityKind] = &[EntityKind::Line2D, EntityKind::Circle, EntityKind::Arc];

/// Equal length of two lines, equal radius of two curves, or a line as long
/// as an arc.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equal {}

impl Translator for Equal {
    fn legal_types(slot: usize, entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
        Some(match super::other_slot(slot, entities) {
            Some(EntityKind::Line2D) => AFTER_LINE_2D,
            Some(EntityKind::Line3D) => AFTER_LINE_3D,
            Some(EntityKind::Circle) => EntityKind::CURVE,
            Some(EntityKind::Arc) => AFTER_ARC,
            Some(_) => &[],
            None => SIZED,
        })
    }

    fn emit(
        &self,
        slots: &Slots<'_>,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ConstraintHandle>, SketchError> {
        let e1 = slots.entity1;
        let e2 = slots.entity2()?;
        let workplane = emitter.workplane(slots)?;
        let (h1, h2) = (emitter.handle(e1.id)?, emitter.handle(e2.id)?);

        let constraint = match (e1.is_line(), e2.is_line()) {
            (true, true) => SolverConstraint::EqualLength {
                l1: h1,
                l2: h2,
                workplane,
            },
            (false, false) => SolverConstraint::EqualRadius { c1: h1, c2: h2 },
            (true, false) => SolverConstraint::EqualLineArcLength {
                line: h1,
                arc: h2,
                workplane,
            },
            (false, true) => SolverConstraint::EqualLineArcLength {
                line: h2,
                arc: h1,
                workplane,
            },
        };
        Ok(vec![emitter.constrain(constraint)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::test_support::Fixture;
    use crate::constraint::Constraint;
    use crate::solver::Group;

    #[test]
    fn second_slot_depends_on_first() {
        let t = Equal::legal_types;
        assert_eq!(t(1, [Some(EntityKind::Line2D), None]), Some(AFTER_LINE_2D));
        assert_eq!(t(1, [Some(EntityKind::Circle), None]), Some(EntityKind::CURVE));
        assert_eq!(t(1, [Some(EntityKind::Arc), None]), Some(AFTER_ARC));
        assert_eq!(t(1, [Some(EntityKind::Line3D), None]), Some(AFTER_LINE_3D));
    }

    #[test]
    fn circle_then_line_is_rejected() {
        let mut f = Fixture::new();
        let circle = f.circle((0.0, 0.0), 1.0);
        let line = f.line((0.0, 0.0), (1.0, 0.0));
        let c = Constraint::new(Equal::default(), circle, Some(line), Some(f.sketch));
        assert!(matches!(
            c.validate(&f.store),
            Err(SketchError::IllegalEntityType { slot: 1, found: EntityKind::Line2D, .. })
        ));
    }

    #[test]
    fn arc_then_line_equates_arc_length() {
        let mut f = Fixture::new();
        let ct = f.point(0.0, 0.0);
        let a = f.point(1.0, 0.0);
        let b = f.point(0.0, 1.0);
        let arc = f.store.add_arc(f.sketch, ct, a, b, false).unwrap();
        let line = f.line((2.0, 0.0), (3.0, 0.0));
        let c = Constraint::new(Equal::default(), arc, Some(line), Some(f.sketch));

        let (mut solver, handles) = f.mapped();
        {
            let mut emitter = Emitter::new(&mut solver, &handles, Group::ACTIVE);
            c.emit(&f.store, &mut emitter).unwrap();
        }
        assert_eq!(
            solver.constraints()[0].1,
            SolverConstraint::EqualLineArcLength {
                line: handles.get(line).unwrap(),
                arc: handles.get(arc).unwrap(),
                workplane: Some(handles.get(f.store.sketch(f.sketch).unwrap().workplane).unwrap()),
            }
        );
    }

    #[test]
    fn lines_and_circles() {
        let mut f = Fixture::new();
        let l1 = f.line((0.0, 0.0), (1.0, 0.0));
        let l2 = f.line((0.0, 1.0), (2.0, 1.0));
        let c1 = f.circle((5.0, 5.0), 1.0);
        let c2 = f.circle((8.0, 5.0), 2.0);
        let (mut solver, handles) = f.mapped();
        {
            let mut emitter = Emitter::new(&mut solver, &handles, Group::ACTIVE);
            Constraint::new(Equal::default(), l1, Some(l2), Some(f.sketch))
                .emit(&f.store, &mut emitter)
                .unwrap();
            Constraint::new(Equal::default(), c1, Some(c2), Some(f.sketch))
                .emit(&f.store, &mut emitter)
                .unwrap();
        }
        let constraints = solver.constraints();
        assert!(matches!(constraints[0].1, SolverConstraint::EqualLength { .. }));
        assert!(matches!(constraints[1].1, SolverConstraint::EqualRadius { .. }));
    }
}
