use std::collections::HashMap;

use sketcher_types::ConstraintId;
use tracing::{debug, warn};

use crate::constraint::Emitter;
use crate::entity_mapping::SketchToSolver;
use crate::error::SketchError;
use crate::solver::{ConstraintHandle, Group};
use crate::store::SketchStore;
use crate::types::SolveScope;

/// Solver constraint handles traced back to the store constraint that
/// emitted them.
#[derive(Debug, Clone, Default)]
pub struct ConstraintHandles {
    owners: HashMap<ConstraintHandle, ConstraintId>,
    /// Constraints that could not be emitted, with the reason.
    pub invalid: Vec<(ConstraintId, SketchError)>,
}

impl ConstraintHandles {
    pub fn owner(&self, handle: ConstraintHandle) -> Option<ConstraintId> {
        self.owners.get(&handle).copied()
    }

    /// Owners of `handles`, each reported once, in first-seen order.
    pub fn owners_of(&self, handles: &[ConstraintHandle]) -> Vec<ConstraintId> {
        let mut owners = Vec::new();
        for id in handles.iter().filter_map(|h| self.owner(*h)) {
            if !owners.contains(&id) {
                owners.push(id);
            }
        }
        owners
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

impl SketchToSolver<'_> {
    /// Emits every constraint of `scope` into the active group.
    ///
    /// A constraint that fails to emit is skipped; the rest of the scope is
    /// still solved.
    pub fn add_constraints(&mut self, store: &SketchStore, scope: SolveScope) -> ConstraintHandles {
        let mut mapped = ConstraintHandles::default();
        let (solver, handles) = self.parts();
        let mut emitter = Emitter::new(solver, handles, Group::ACTIVE);

        for (id, constraint) in store.constraints_in(scope.sketch()) {
            match constraint.emit(store, &mut emitter) {
                Ok(emitted) => {
                    for handle in emitted {
                        mapped.owners.insert(handle, id);
                    }
                }
                Err(err) => {
                    warn!(?id, kind = constraint.kind.label(), %err, "skipping constraint");
                    mapped.invalid.push((id, err));
                }
            }
        }
        debug!(
            equations = mapped.len(),
            invalid = mapped.invalid.len(),
            "constraints emitted"
        );
        mapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, Distance, Horizontal};
    use crate::solver::MockSolver;
    use nalgebra::{UnitQuaternion, Vector2, Vector3};

    #[test]
    fn traces_handles_and_skips_invalid() {
        let mut store = SketchStore::new();
        let origin = store.add_point_3d(Vector3::zeros()).unwrap();
        let wp = store.add_workplane(origin, UnitQuaternion::identity()).unwrap();
        let sketch = store.add_sketch("Sketch", wp).unwrap();
        let a = store.add_point_2d(sketch, Vector2::new(0.0, 0.0)).unwrap();
        let b = store.add_point_2d(sketch, Vector2::new(1.0, 1.0)).unwrap();
        let line = store.add_line_2d(sketch, a, b).unwrap();

        let length = store
            .add_constraint(Constraint::new(Distance::new(2.0), line, None, Some(sketch)), false)
            .unwrap();
        let level = store
            .add_constraint(Constraint::new(Horizontal::default(), line, None, Some(sketch)), false)
            .unwrap();
        // Corrupt one constraint after insertion so emission rejects it.
        store.constraint_mut(level).unwrap().entity2 = Some(a);

        let mut solver = MockSolver::new();
        let mut mapping = SketchToSolver::new(&mut solver);
        mapping.add_entities(&store, SolveScope::Sketch(sketch)).unwrap();
        let mapped = mapping.add_constraints(&store, SolveScope::Sketch(sketch));

        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped.owner(ConstraintHandle(1)), Some(length));
        assert_eq!(mapped.invalid.len(), 1);
        assert_eq!(mapped.invalid[0].0, level);
        assert_eq!(
            mapped.owners_of(&[ConstraintHandle(1), ConstraintHandle(1)]),
            vec![length]
        );
    }
}
