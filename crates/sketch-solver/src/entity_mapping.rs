use std::collections::{HashMap, HashSet};

use nalgebra::{Quaternion, UnitQuaternion, Vector2, Vector3};
use sketcher_types::{EntityData, EntityId};
use tracing::debug;

use crate::error::SketchError;
use crate::solver::{EntityHandle, Group, ParamHandle, SolverBackend};
use crate::store::SketchStore;
use crate::types::SolveScope;

/// Solver parameters owned by one store entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityParams {
    Point2d([ParamHandle; 2]),
    Point3d([ParamHandle; 3]),
    /// Orientation quaternion `(w, i, j, k)`.
    Orientation([ParamHandle; 4]),
    Radius(ParamHandle),
}

/// Handles every mapped store entity received from the backend.
#[derive(Debug, Clone, Default)]
pub struct EntityHandles {
    handles: HashMap<EntityId, EntityHandle>,
    params: HashMap<EntityId, (EntityParams, Group)>,
}

impl EntityHandles {
    pub fn get(&self, id: EntityId) -> Option<EntityHandle> {
        self.handles.get(&id).copied()
    }

    pub fn params(&self, id: EntityId) -> Option<EntityParams> {
        self.params.get(&id).map(|(params, _)| *params)
    }

    pub fn group(&self, id: EntityId) -> Option<Group> {
        self.params.get(&id).map(|(_, group)| *group)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Copies solved values of the active group back into the store.
    ///
    /// Returns the number of entities updated.
    pub fn write_back(&self, solver: &dyn SolverBackend, store: &mut SketchStore) -> Result<usize, SketchError> {
        let mut updated = 0;
        for (&id, &(params, group)) in &self.params {
            if group != Group::ACTIVE {
                continue;
            }
            match params {
                EntityParams::Point2d([u, v]) => {
                    let co = Vector2::new(solver.param_value(u)?, solver.param_value(v)?);
                    store.set_point_2d(id, co)?;
                }
                EntityParams::Point3d([x, y, z]) => {
                    let location = Vector3::new(
                        solver.param_value(x)?,
                        solver.param_value(y)?,
                        solver.param_value(z)?,
                    );
                    store.set_point_3d(id, location)?;
                }
                EntityParams::Orientation([w, i, j, k]) => {
                    let q = Quaternion::new(
                        solver.param_value(w)?,
                        solver.param_value(i)?,
                        solver.param_value(j)?,
                        solver.param_value(k)?,
                    );
                    // A collapsed quaternion keeps the previous orientation.
                    let Some(orientation) = UnitQuaternion::try_new(q, f64::EPSILON) else {
                        continue;
                    };
                    store.set_orientation(id, orientation)?;
                }
                EntityParams::Radius(r) => store.set_radius(id, solver.param_value(r)?)?,
            }
            updated += 1;
        }
        Ok(updated)
    }
}

/// Registers store entities with a solver backend.
///
/// Entities are registered kind by kind so that every reference is mapped
/// before it is used: 3D points, workplanes, 3D lines, then sketch points,
/// lines, circles and arcs.
pub struct SketchToSolver<'s> {
    solver: &'s mut dyn SolverBackend,
    handles: EntityHandles,
    /// Workplane normals used by circles, one per sketch workplane.
    normals_2d: HashMap<EntityId, EntityHandle>,
}

impl<'s> SketchToSolver<'s> {
    pub fn new(solver: &'s mut dyn SolverBackend) -> Self {
        Self {
            solver,
            handles: EntityHandles::default(),
            normals_2d: HashMap::new(),
        }
    }

    pub fn handles(&self) -> &EntityHandles {
        &self.handles
    }

    pub fn into_handles(self) -> EntityHandles {
        self.handles
    }

    pub(crate) fn parts(&mut self) -> (&mut dyn SolverBackend, &EntityHandles) {
        (&mut *self.solver, &self.handles)
    }

    /// Maps every entity `scope` needs: all 3D entities, plus the entities of
    /// the solved sketch. Entities outside the scope, fixed entities and the
    /// entities a fixed entity is built from go to [`Group::FIXED`].
    pub fn add_entities(&mut self, store: &SketchStore, scope: SolveScope) -> Result<(), SketchError> {
        let pinned = pinned_entities(store);
        let sketch = scope.sketch();
        let group_of = |id: EntityId, in_scope: bool| {
            if in_scope && !pinned.contains(&id) {
                Group::ACTIVE
            } else {
                Group::FIXED
            }
        };
        let free = sketch.is_none();

        for (id, entity) in store.entities() {
            if let EntityData::Point3D { location } = &entity.data {
                let group = group_of(id, free);
                let [x, y, z] = [location.x, location.y, location.z].map(|v| self.solver.add_param(v, group));
                let handle = self.solver.add_point_3d(x, y, z, group)?;
                self.insert(id, handle, Some((EntityParams::Point3d([x, y, z]), group)));
            }
        }
        for (id, entity) in store.entities() {
            if let EntityData::Workplane { p1, orientation } = &entity.data {
                let group = group_of(id, free);
                let q = orientation.quaternion();
                let params = [q.w, q.i, q.j, q.k].map(|v| self.solver.add_param(v, group));
                let normal = self.solver.add_normal_3d(params, group)?;
                let origin = self.mapped(*p1)?;
                let handle = self.solver.add_workplane(origin, normal, group)?;
                self.insert(id, handle, Some((EntityParams::Orientation(params), group)));
            }
        }
        for (id, entity) in store.entities() {
            if let EntityData::Line3D { p1, p2 } = &entity.data {
                let group = group_of(id, free);
                let handle = self.solver.add_line(self.mapped(*p1)?, self.mapped(*p2)?, None, group)?;
                self.insert(id, handle, None);
            }
        }

        let Some(sketch) = sketch else {
            debug!(entities = self.handles.len(), "mapped 3D entities");
            return Ok(());
        };
        let workplane_id = store.sketch(sketch)?.workplane;
        let workplane = self.mapped(workplane_id)?;
        let entities: Vec<_> = store
            .entities()
            .filter(|(_, e)| e.sketch() == Some(sketch))
            .collect();

        for (id, entity) in &entities {
            if let EntityData::Point2D { co, .. } = &entity.data {
                let group = group_of(*id, true);
                let u = self.solver.add_param(co.x, group);
                let v = self.solver.add_param(co.y, group);
                let handle = self.solver.add_point_2d(workplane, u, v, group)?;
                self.insert(*id, handle, Some((EntityParams::Point2d([u, v]), group)));
            }
        }
        for (id, entity) in &entities {
            if let EntityData::Line2D { p1, p2, .. } = &entity.data {
                let group = group_of(*id, true);
                let handle = self
                    .solver
                    .add_line(self.mapped(*p1)?, self.mapped(*p2)?, Some(workplane), group)?;
                self.insert(*id, handle, None);
            }
        }
        for (id, entity) in &entities {
            if let EntityData::Circle { ct, radius, .. } = &entity.data {
                let group = group_of(*id, true);
                let r = self.solver.add_param(*radius, group);
                let distance = self.solver.add_distance(r, group)?;
                let normal = self.normal_2d(workplane_id, workplane)?;
                let handle = self.solver.add_circle(normal, self.mapped(*ct)?, distance, group)?;
                self.insert(*id, handle, Some((EntityParams::Radius(r), group)));
            }
        }
        for (id, entity) in &entities {
            if let EntityData::Arc { ct, p1, p2, invert, .. } = &entity.data {
                let group = group_of(*id, true);
                // The backend only knows counter-clockwise arcs.
                let (start, end) = if *invert { (p2, p1) } else { (p1, p2) };
                let handle = self.solver.add_arc(
                    workplane,
                    self.mapped(*ct)?,
                    self.mapped(*start)?,
                    self.mapped(*end)?,
                    group,
                )?;
                self.insert(*id, handle, None);
            }
        }

        debug!(?sketch, entities = self.handles.len(), "mapped sketch entities");
        Ok(())
    }

    fn mapped(&self, id: EntityId) -> Result<EntityHandle, SketchError> {
        self.handles.get(id).ok_or(SketchError::UnmappedEntity(id))
    }

    fn insert(&mut self, id: EntityId, handle: EntityHandle, params: Option<(EntityParams, Group)>) {
        self.handles.handles.insert(id, handle);
        if let Some(params) = params {
            self.handles.params.insert(id, params);
        }
    }

    fn normal_2d(&mut self, workplane_id: EntityId, workplane: EntityHandle) -> Result<EntityHandle, SketchError> {
        if let Some(normal) = self.normals_2d.get(&workplane_id) {
            return Ok(*normal);
        }
        let normal = self.solver.add_normal_2d(workplane, Group::FIXED)?;
        self.normals_2d.insert(workplane_id, normal);
        Ok(normal)
    }
}

/// Fixed entities together with the entities they are built from.
fn pinned_entities(store: &SketchStore) -> HashSet<EntityId> {
    let mut pinned = HashSet::new();
    for (id, entity) in store.entities().filter(|(_, e)| e.fixed) {
        pinned.insert(id);
        pinned.extend(entity.references());
    }
    pinned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{MockSolver, RecordedCall};
    use sketcher_types::SketchId;

    fn sketch_store() -> (SketchStore, SketchId) {
        let mut store = SketchStore::new();
        let origin = store.add_point_3d(Vector3::zeros()).unwrap();
        let wp = store.add_workplane(origin, UnitQuaternion::identity()).unwrap();
        let sketch = store.add_sketch("Sketch", wp).unwrap();
        (store, sketch)
    }

    #[test]
    fn sketch_scope_splits_groups() {
        let (mut store, sketch) = sketch_store();
        let a = store.add_point_2d(sketch, Vector2::new(0.0, 0.0)).unwrap();
        let b = store.add_point_2d(sketch, Vector2::new(1.0, 0.0)).unwrap();
        store.set_fixed(a, true).unwrap();
        let line = store.add_line_2d(sketch, a, b).unwrap();

        let mut solver = MockSolver::new();
        let handles = {
            let mut mapping = SketchToSolver::new(&mut solver);
            mapping.add_entities(&store, SolveScope::Sketch(sketch)).unwrap();
            mapping.into_handles()
        };
        assert_eq!(handles.group(a), Some(Group::FIXED));
        assert_eq!(handles.group(b), Some(Group::ACTIVE));
        assert!(handles.get(line).is_some());
        let wp = store.sketch(sketch).unwrap().workplane;
        assert_eq!(handles.group(wp), Some(Group::FIXED));
    }

    #[test]
    fn fixed_line_pins_its_endpoints() {
        let (mut store, sketch) = sketch_store();
        let a = store.add_point_2d(sketch, Vector2::new(0.0, 0.0)).unwrap();
        let b = store.add_point_2d(sketch, Vector2::new(1.0, 0.0)).unwrap();
        let line = store.add_line_2d(sketch, a, b).unwrap();
        store.set_fixed(line, true).unwrap();

        let mut solver = MockSolver::new();
        let mut mapping = SketchToSolver::new(&mut solver);
        mapping.add_entities(&store, SolveScope::Sketch(sketch)).unwrap();
        assert_eq!(mapping.handles().group(a), Some(Group::FIXED));
        assert_eq!(mapping.handles().group(b), Some(Group::FIXED));
    }

    #[test]
    fn other_sketches_are_left_out() {
        let (mut store, sketch) = sketch_store();
        let wp = store.sketch(sketch).unwrap().workplane;
        let other = store.add_sketch("Other", wp).unwrap();
        let mine = store.add_point_2d(sketch, Vector2::new(0.0, 0.0)).unwrap();
        let theirs = store.add_point_2d(other, Vector2::new(0.0, 0.0)).unwrap();

        let mut solver = MockSolver::new();
        let mut mapping = SketchToSolver::new(&mut solver);
        mapping.add_entities(&store, SolveScope::Sketch(sketch)).unwrap();
        assert!(mapping.handles().get(mine).is_some());
        assert!(mapping.handles().get(theirs).is_none());
    }

    #[test]
    fn circles_share_one_workplane_normal() {
        let (mut store, sketch) = sketch_store();
        for x in [0.0, 5.0] {
            let ct = store.add_point_2d(sketch, Vector2::new(x, 0.0)).unwrap();
            store.add_circle(sketch, ct, 1.0).unwrap();
        }
        let mut solver = MockSolver::new();
        SketchToSolver::new(&mut solver)
            .add_entities(&store, SolveScope::Sketch(sketch))
            .unwrap();
        let normals = solver
            .calls
            .iter()
            .filter(|c| matches!(c, RecordedCall::Entity { kind: "normal 2d", .. }))
            .count();
        assert_eq!(normals, 1);
    }

    #[test]
    fn free_scope_activates_3d_entities() {
        let (mut store, _) = sketch_store();
        let p = store.add_point_3d(Vector3::new(1.0, 2.0, 3.0)).unwrap();
        let mut solver = MockSolver::new();
        let handles = {
            let mut mapping = SketchToSolver::new(&mut solver);
            mapping.add_entities(&store, SolveScope::Free).unwrap();
            mapping.into_handles()
        };
        assert_eq!(handles.group(p), Some(Group::ACTIVE));
    }

    #[test]
    fn write_back_moves_active_points_only() {
        let (mut store, sketch) = sketch_store();
        let a = store.add_point_2d(sketch, Vector2::new(0.0, 0.0)).unwrap();
        let b = store.add_point_2d(sketch, Vector2::new(1.0, 0.0)).unwrap();
        store.set_fixed(a, true).unwrap();

        let mut solver = MockSolver::new();
        let handles = {
            let mut mapping = SketchToSolver::new(&mut solver);
            mapping.add_entities(&store, SolveScope::Sketch(sketch)).unwrap();
            mapping.into_handles()
        };
        let Some(EntityParams::Point2d([_, v])) = handles.params(b) else {
            panic!("point params missing");
        };
        solver.set_param(v, 4.0).unwrap();
        let Some(EntityParams::Point2d([u, _])) = handles.params(a) else {
            panic!("point params missing");
        };
        solver.set_param(u, 9.0).unwrap();

        handles.write_back(&solver, &mut store).unwrap();
        assert_eq!(store.entity(b).unwrap().co().unwrap(), Vector2::new(1.0, 4.0));
        assert_eq!(store.entity(a).unwrap().co().unwrap(), Vector2::new(0.0, 0.0));
    }
}
