use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use sketcher_types::EntityKind;

use super::{magnitude, non_negative, Emitter, InitialValue, Slots, Translator};
use crate::error::SketchError;
use crate::geometry::Placement2d;
use crate::solver::{ConstraintHandle, SolverConstraint};

/// Diameter of a circle or arc, or its radius when `setting` is on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diameter {
    #[serde(deserialize_with = "non_negative")]
    value: f64,
    #[serde(default)]
    pub setting: bool,
    /// Direction of the leader line, radians from the sketch x axis.
    #[serde(default)]
    pub leader_angle: f64,
    #[serde(default)]
    pub draw_offset: f64,
}

impl Default for Diameter {
    fn default() -> Self {
        Self {
            value: 0.0,
            setting: false,
            leader_angle: 0.0,
            draw_offset: 0.0,
        }
    }
}

impl Diameter {
    pub fn new(value: f64) -> Self {
        Self {
            value: magnitude(value).unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) -> Result<(), SketchError> {
        self.value = magnitude(value)?;
        Ok(())
    }

    /// Switches between radius and diameter mode, keeping the dimension.
    pub fn set_radius_mode(&mut self, radius: bool) {
        if radius != self.setting {
            self.value = if radius { self.value / 2.0 } else { self.value * 2.0 };
            self.setting = radius;
        }
    }

    pub fn diameter(&self) -> f64 {
        if self.setting {
            self.value * 2.0
        } else {
            self.value
        }
    }
}

impl Translator for Diameter {
    fn legal_types(slot: usize, _entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
        (slot == 0).then_some(EntityKind::CURVE)
    }

    fn init_props(&mut self, slots: &Slots<'_>) -> Result<InitialValue, SketchError> {
        let radius = slots.entity1.radius()?;
        self.set_value(if self.setting { radius } else { radius * 2.0 })?;
        Ok(InitialValue::with_auxiliary(self.value, self.setting))
    }

    fn emit(
        &self,
        slots: &Slots<'_>,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ConstraintHandle>, SketchError> {
        let handle = emitter.constrain(SolverConstraint::Diameter {
            value: self.diameter(),
            circle: emitter.handle(slots.entity1.id)?,
        })?;
        Ok(vec![handle])
    }

    fn placement(&self, slots: &Slots<'_>) -> Result<Option<Placement2d>, SketchError> {
        let center = slots.entity1.ct()?.co()?;
        Ok(Some(Placement2d::new(center, self.leader_angle)))
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

    #[test]
    fn radius_mode_halves_the_value() {
        let mut f = Fixture::new();
        let circle = f.circle((0.0, 0.0), 2.0);
        let mut c = Constraint::new(Diameter::default(), circle, None, Some(f.sketch));
        assert_eq!(c.init_props(&f.store).unwrap().value, Some(4.0));

        let mut d = Diameter::new(4.0);
        d.set_radius_mode(true);
        assert_eq!(d.value(), 2.0);
        assert_eq!(d.diameter(), 4.0);
    }

    #[test]
    fn emits_full_diameter_in_radius_mode() {
        let mut f = Fixture::new();
        let circle = f.circle((0.0, 0.0), 2.0);
        let mut d = Diameter::new(3.0);
        d.setting = true;
        let c = Constraint::new(d, circle, None, Some(f.sketch));
        let (mut solver, handles) = f.mapped();
        {
            let mut emitter = Emitter::new(&mut solver, &handles, Group::ACTIVE);
            c.emit(&f.store, &mut emitter).unwrap();
        }
        assert_eq!(
            solver.constraints()[0].1,
            SolverConstraint::Diameter {
                value: 6.0,
                circle: handles.get(circle).unwrap()
            }
        );
    }

    #[test]
    fn second_slot_must_stay_empty() {
        let mut f = Fixture::new();
        let circle = f.circle((0.0, 0.0), 2.0);
        let p = f.point(1.0, 1.0);
        let c = Constraint::new(Diameter::default(), circle, Some(p), Some(f.sketch));
        assert!(matches!(
            c.validate(&f.store),
            Err(SketchError::SlotMustBeEmpty { slot: 1, .. })
        ));
    }

    #[test]
    fn placement_follows_leader() {
        let mut f = Fixture::new();
        let circle = f.circle((1.0, 2.0), 2.0);
        let mut d = Diameter::new(4.0);
        d.leader_angle = 0.5;
        let c = Constraint::new(d, circle, None, Some(f.sketch));
        let placement = c.placement(&f.store).unwrap().unwrap();
        assert_relative_eq!(placement.translation, Vector2::new(1.0, 2.0));
        assert_relative_eq!(placement.rotation, 0.5);
    }
}
