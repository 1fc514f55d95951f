use std::f64::consts::TAU;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use sketcher_types::{EntityKind, WorkplaneRequirement};

use super::{magnitude, non_negative, Emitter, InitialValue, Slots, Translator};
use crate::entity::EntityRef;
use crate::error::SketchError;
use crate::geometry::{angle_signed, line_intersection, Placement2d};
use crate::solver::{ConstraintHandle, SolverConstraint};

/// Angle in degrees between two sketch lines. With `setting`, the
/// supplementary angle is measured instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Angle {
    #[serde(deserialize_with = "non_negative")]
    value: f64,
    #[serde(default)]
    pub setting: bool,
    #[serde(default = "default_draw_offset")]
    pub draw_offset: f64,
}

fn default_draw_offset() -> f64 {
    0.3
}

impl Default for Angle {
    fn default() -> Self {
        Self {
            value: 0.0,
            setting: false,
            draw_offset: default_draw_offset(),
        }
    }
}

impl Angle {
    /// Non-finite input leaves the angle at zero.
    pub fn new(degrees: f64) -> Self {
        Self {
            value: magnitude(degrees).unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, degrees: f64) -> Result<(), SketchError> {
        self.value = magnitude(degrees)?;
        Ok(())
    }
}

/// Unsigned angle between two directions in degrees; zero when either has
/// no length.
fn angle_between(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    let len = a.norm() * b.norm();
    if len == 0.0 {
        return 0.0;
    }
    (a.dot(b) / len).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Unit vector from `origin` to the line endpoint farther away from it.
fn far_ray(line: EntityRef<'_>, origin: &Vector2<f64>) -> Result<Vector2<f64>, SketchError> {
    let a = line.p1()?.co()? - origin;
    let b = line.p2()?.co()? - origin;
    let ray = if b.norm_squared() >= a.norm_squared() { b } else { a };
    let len = ray.norm();
    Ok(if len == 0.0 { ray } else { ray / len })
}

impl Translator for Angle {
    fn legal_types(_slot: usize, _entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
        Some(EntityKind::LINE_2D)
    }

    fn workplane_requirement(&self, _slots: &Slots<'_>) -> WorkplaneRequirement {
        WorkplaneRequirement::NotFree
    }

    fn init_props(&mut self, slots: &Slots<'_>) -> Result<InitialValue, SketchError> {
        let theta = angle_between(&slots.entity1.direction()?, &slots.entity2()?.direction()?);
        if theta > 90.0 {
            self.setting = true;
            self.set_value(180.0 - theta)?;
        } else {
            self.setting = false;
            self.set_value(theta)?;
        }
        Ok(InitialValue::with_auxiliary(self.value, self.setting))
    }

    fn emit(
        &self,
        slots: &Slots<'_>,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ConstraintHandle>, SketchError> {
        let workplane = emitter.require_workplane(slots)?;
        let handle = emitter.constrain(SolverConstraint::Angle {
            degrees: self.value,
            supplementary: self.setting,
            l1: emitter.handle(slots.entity1.id)?,
            l2: emitter.handle(slots.entity2()?.id)?,
            workplane: Some(workplane),
        })?;
        Ok(vec![handle])
    }

    fn placement(&self, slots: &Slots<'_>) -> Result<Option<Placement2d>, SketchError> {
        let l1 = slots.entity1;
        let l2 = slots.entity2()?;
        let (a1, a2) = (l1.p1()?.co()?, l1.p2()?.co()?);
        let (b1, b2) = (l2.p1()?.co()?, l2.p2()?.co()?);
        let origin = line_intersection(&a1, &a2, &b1, &b2)
            .unwrap_or_else(|| ((a1 + a2) / 2.0 + (b1 + b2) / 2.0) / 2.0);

        let r1 = far_ray(l1, &origin)?;
        let mut r2 = far_ray(l2, &origin)?;
        if self.setting {
            r2 = -r2;
        }
        let bisector = r1 + r2;
        let rotation = if bisector.norm_squared() > 0.0 {
            angle_signed(&bisector)
        } else {
            angle_signed(&r1) + TAU / 4.0
        };
        Ok(Some(Placement2d::new(origin, rotation)))
    }

    fn label_offset(&self, ui_scale: f64) -> Option<Vector2<f64>> {
        Some(Vector2::new(self.draw_offset * ui_scale, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::test_support::Fixture;
    use crate::constraint::Constraint;
    use crate::solver::Group;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn obtuse_angles_store_the_supplement() {
        let mut f = Fixture::new();
        let l1 = f.line((0.0, 0.0), (1.0, 0.0));
        let l2 = f.line((0.0, 0.0), (-1.0, 1.0));
        let mut c = Constraint::new(Angle::default(), l1, Some(l2), Some(f.sketch));
        let init = c.init_props(&f.store).unwrap();
        assert_relative_eq!(init.value.unwrap(), 45.0, epsilon = 1e-9);
        assert_eq!(init.auxiliary, Some(true));
    }

    #[test]
    fn angle_needs_a_sketch() {
        let mut f = Fixture::new();
        let l1 = f.line((0.0, 0.0), (1.0, 0.0));
        let l2 = f.line((0.0, 0.0), (1.0, 1.0));
        let c = Constraint::new(Angle::new(45.0), l1, Some(l2), None);
        assert!(matches!(
            c.validate(&f.store),
            Err(SketchError::InvalidReference { .. })
        ));
    }

    #[test]
    fn emits_angle_with_workplane() {
        let mut f = Fixture::new();
        let l1 = f.line((0.0, 0.0), (1.0, 0.0));
        let l2 = f.line((0.0, 0.0), (1.0, 1.0));
        let c = Constraint::new(Angle::new(30.0), l1, Some(l2), Some(f.sketch));
        let (mut solver, handles) = f.mapped();
        {
            let mut emitter = Emitter::new(&mut solver, &handles, Group::ACTIVE);
            c.emit(&f.store, &mut emitter).unwrap();
        }
        match &solver.constraints()[0].1 {
            SolverConstraint::Angle { degrees, supplementary, workplane, .. } => {
                assert_eq!(*degrees, 30.0);
                assert!(!supplementary);
                assert!(workplane.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn placement_on_bisector_at_intersection() {
        let mut f = Fixture::new();
        let l1 = f.line((0.0, 0.0), (2.0, 0.0));
        let l2 = f.line((0.0, 0.0), (0.0, 2.0));
        let c = Constraint::new(Angle::new(90.0), l1, Some(l2), Some(f.sketch));
        let placement = c.placement(&f.store).unwrap().unwrap();
        assert_relative_eq!(placement.translation, Vector2::zeros(), epsilon = 1e-12);
        assert_relative_eq!(placement.rotation, FRAC_PI_4, epsilon = 1e-12);
    }

    #[test]
    fn parallel_lines_place_between_midpoints() {
        let mut f = Fixture::new();
        let l1 = f.line((0.0, 0.0), (2.0, 0.0));
        let l2 = f.line((0.0, 2.0), (2.0, 2.0));
        let c = Constraint::new(Angle::new(0.0), l1, Some(l2), Some(f.sketch));
        let placement = c.placement(&f.store).unwrap().unwrap();
        assert_relative_eq!(placement.translation, Vector2::new(1.0, 1.0));
        assert!(placement.rotation.is_finite());
    }
}
