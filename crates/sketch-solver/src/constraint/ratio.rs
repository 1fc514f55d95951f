use serde::{Deserialize, Serialize};
use sketcher_types::EntityKind;

use super::parallel::line_pair;
use super::{magnitude, non_negative, Emitter, InitialValue, Slots, Translator};
use crate::config::default_tolerance;
use crate::error::SketchError;
use crate::solver::{ConstraintHandle, SolverConstraint};

/// Length of the first line divided by the length of the second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratio {
    #[serde(deserialize_with = "non_negative")]
    value: f64,
}

impl Ratio {
    pub fn new(value: f64) -> Self {
        Self {
            value: magnitude(value).unwrap_or_default(),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) -> Result<(), SketchError> {
        self.value = magnitude(value)?;
        Ok(())
    }
}

impl Translator for Ratio {
    fn legal_types(slot: usize, entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
        line_pair(slot, entities)
    }

    fn init_props(&mut self, slots: &Slots<'_>) -> Result<InitialValue, SketchError> {
        let len1 = slots.entity1.length()?;
        let len2 = slots.entity2()?.length()?;
        self.set_value(if default_tolerance().is_zero_length(len2) {
            1.0
        } else {
            len1 / len2
        })?;
        Ok(InitialValue::value(self.value))
    }

    fn emit(
        &self,
        slots: &Slots<'_>,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ConstraintHandle>, SketchError> {
        let handle = emitter.constrain(SolverConstraint::LengthRatio {
            value: self.value,
            l1: emitter.handle(slots.entity1.id)?,
            l2: emitter.handle(slots.entity2()?.id)?,
            workplane: emitter.workplane(slots)?,
        })?;
        Ok(vec![handle])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::test_support::Fixture;
    use crate::constraint::Constraint;
    use approx::assert_relative_eq;

    #[test]
    fn initial_ratio_from_lengths() {
        let mut f = Fixture::new();
        let l1 = f.line((0.0, 0.0), (3.0, 0.0));
        let l2 = f.line((0.0, 1.0), (2.0, 1.0));
        let mut c = Constraint::new(Ratio::default(), l1, Some(l2), Some(f.sketch));
        assert_relative_eq!(c.init_props(&f.store).unwrap().value.unwrap(), 1.5);
    }

    #[test]
    fn zero_length_divisor_defaults_to_one() {
        let mut f = Fixture::new();
        let l1 = f.line((0.0, 0.0), (3.0, 0.0));
        let l2 = f.line((1.0, 1.0), (1.0, 1.0));
        let mut c = Constraint::new(Ratio::default(), l1, Some(l2), Some(f.sketch));
        assert_eq!(c.init_props(&f.store).unwrap().value, Some(1.0));
    }

    #[test]
    fn value_is_stored_non_negative() {
        let mut r = Ratio::new(-2.0);
        assert_eq!(r.value(), 2.0);
        r.set_value(-0.5).unwrap();
        assert_eq!(r.value(), 0.5);
    }

    #[test]
    fn non_finite_value_is_rejected() {
        let mut r = Ratio::new(f64::NAN);
        assert_eq!(r.value(), 0.0);
        r.set_value(2.0).unwrap();
        assert!(matches!(r.set_value(f64::INFINITY), Err(SketchError::NonFiniteValue { .. })));
        assert_eq!(r.value(), 2.0);
        assert!(serde_json::from_str::<Ratio>(r#"{"value": 1e400}"#).is_err());
    }
}
