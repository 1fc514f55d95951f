use std::collections::HashSet;

use nalgebra::{Isometry3, UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use sketcher_types::{ConstraintId, Entity, EntityData, EntityId, EntityKind, Sketch, SketchId};
use tracing::{debug, info, instrument};

use crate::constraint::Constraint;
use crate::entity::EntityRef;
use crate::error::SketchError;

// ─── Store ───────────────────────────────────────────────────────────────────

/// Arena-based storage for entities, sketches and constraints.
///
/// Constraints and entities refer to each other by key only. Removing an
/// entity cascades to everything built on top of it, so no live key ever
/// points at a removed slot; keys held outside the store may go stale and
/// then resolve to a `Missing*` error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SketchStore {
    entities: SlotMap<EntityId, Entity>,
    constraints: SlotMap<ConstraintId, Constraint>,
    sketches: SlotMap<SketchId, Sketch>,
}

/// Everything removed by a cascading delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Removal {
    pub entities: Vec<EntityId>,
    pub constraints: Vec<ConstraintId>,
    pub sketches: Vec<SketchId>,
}

impl SketchStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Entities ────────────────────────────────────────────────────────────

    pub fn entity(&self, id: EntityId) -> Result<EntityRef<'_>, SketchError> {
        self.entities
            .get(id)
            .map(|entity| EntityRef::new(id, entity, self))
            .ok_or(SketchError::MissingEntity(id))
    }

    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Inserts an entity after checking that every key it references exists
    /// and has the expected kind.
    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId, SketchError> {
        self.check_entity(&entity)?;
        let kind = entity.kind();
        let id = self.entities.insert(entity);
        debug!(?id, %kind, "entity added");
        Ok(id)
    }

    fn check_entity(&self, entity: &Entity) -> Result<(), SketchError> {
        if let Some(sketch) = entity.sketch() {
            self.sketch(sketch)?;
        }
        let expect = |id: EntityId, expected: &'static str, ok: fn(EntityKind) -> bool| {
            let found = self.entity(id)?;
            if !ok(found.kind()) {
                return Err(SketchError::WrongEntityKind {
                    id,
                    expected,
                    found: found.kind(),
                });
            }
            if found.sketch().is_some() && found.sketch() != entity.sketch() {
                return Err(SketchError::InvalidReference {
                    reason: format!("entity {id:?} belongs to another sketch"),
                });
            }
            Ok(())
        };
        match &entity.data {
            EntityData::Point3D { .. } | EntityData::Point2D { .. } => Ok(()),
            EntityData::Line3D { p1, p2 } => {
                expect(*p1, "3D point", |k| k == EntityKind::Point3D)?;
                expect(*p2, "3D point", |k| k == EntityKind::Point3D)
            }
            EntityData::Line2D { p1, p2, .. } => {
                expect(*p1, "2D point", |k| k == EntityKind::Point2D)?;
                expect(*p2, "2D point", |k| k == EntityKind::Point2D)
            }
            EntityData::Circle { ct, radius, .. } => {
                if !radius.is_finite() || *radius < 0.0 {
                    return Err(SketchError::InvalidReference {
                        reason: format!("circle radius must be non-negative, got {radius}"),
                    });
                }
                expect(*ct, "2D point", |k| k == EntityKind::Point2D)
            }
            EntityData::Arc { ct, p1, p2, .. } => {
                for id in [ct, p1, p2] {
                    expect(*id, "2D point", |k| k == EntityKind::Point2D)?;
                }
                Ok(())
            }
            EntityData::Workplane { p1, .. } => expect(*p1, "3D point", |k| k == EntityKind::Point3D),
        }
    }

    pub fn add_point_3d(&mut self, location: Vector3<f64>) -> Result<EntityId, SketchError> {
        self.add_entity(Entity::new(EntityData::Point3D { location }))
    }

    pub fn add_point_2d(&mut self, sketch: SketchId, co: Vector2<f64>) -> Result<EntityId, SketchError> {
        self.add_entity(Entity::new(EntityData::Point2D { sketch, co }))
    }

    pub fn add_line_3d(&mut self, p1: EntityId, p2: EntityId) -> Result<EntityId, SketchError> {
        self.add_entity(Entity::new(EntityData::Line3D { p1, p2 }))
    }

    pub fn add_line_2d(&mut self, sketch: SketchId, p1: EntityId, p2: EntityId) -> Result<EntityId, SketchError> {
        self.add_entity(Entity::new(EntityData::Line2D { sketch, p1, p2 }))
    }

    pub fn add_circle(&mut self, sketch: SketchId, ct: EntityId, radius: f64) -> Result<EntityId, SketchError> {
        self.add_entity(Entity::new(EntityData::Circle { sketch, ct, radius }))
    }

    pub fn add_arc(
        &mut self,
        sketch: SketchId,
        ct: EntityId,
        p1: EntityId,
        p2: EntityId,
        invert: bool,
    ) -> Result<EntityId, SketchError> {
        self.add_entity(Entity::new(EntityData::Arc {
            sketch,
            ct,
            p1,
            p2,
            invert,
        }))
    }

    /// A workplane through the 3D point `origin`.
    pub fn add_workplane(
        &mut self,
        origin: EntityId,
        orientation: UnitQuaternion<f64>,
    ) -> Result<EntityId, SketchError> {
        self.add_entity(Entity::new(EntityData::Workplane {
            p1: origin,
            orientation,
        }))
    }

    /// Moves a 2D point to new sketch coordinates.
    pub fn set_point_2d(&mut self, id: EntityId, new_co: Vector2<f64>) -> Result<(), SketchError> {
        match self.entities.get_mut(id).map(|e| &mut e.data) {
            Some(EntityData::Point2D { co, .. }) => {
                *co = new_co;
                Ok(())
            }
            Some(other) => Err(SketchError::WrongEntityKind {
                id,
                expected: "2D point",
                found: other.kind(),
            }),
            None => Err(SketchError::MissingEntity(id)),
        }
    }

    pub fn set_point_3d(&mut self, id: EntityId, new_location: Vector3<f64>) -> Result<(), SketchError> {
        match self.entities.get_mut(id).map(|e| &mut e.data) {
            Some(EntityData::Point3D { location }) => {
                *location = new_location;
                Ok(())
            }
            Some(other) => Err(SketchError::WrongEntityKind {
                id,
                expected: "3D point",
                found: other.kind(),
            }),
            None => Err(SketchError::MissingEntity(id)),
        }
    }

    pub fn set_radius(&mut self, id: EntityId, new_radius: f64) -> Result<(), SketchError> {
        match self.entities.get_mut(id).map(|e| &mut e.data) {
            Some(EntityData::Circle { radius, .. }) => {
                *radius = new_radius.abs();
                Ok(())
            }
            Some(other) => Err(SketchError::WrongEntityKind {
                id,
                expected: "circle",
                found: other.kind(),
            }),
            None => Err(SketchError::MissingEntity(id)),
        }
    }

    pub fn set_orientation(&mut self, id: EntityId, new_orientation: UnitQuaternion<f64>) -> Result<(), SketchError> {
        match self.entities.get_mut(id).map(|e| &mut e.data) {
            Some(EntityData::Workplane { orientation, .. }) => {
                *orientation = new_orientation;
                Ok(())
            }
            Some(other) => Err(SketchError::WrongEntityKind {
                id,
                expected: "workplane",
                found: other.kind(),
            }),
            None => Err(SketchError::MissingEntity(id)),
        }
    }

    pub fn set_fixed(&mut self, id: EntityId, fixed: bool) -> Result<(), SketchError> {
        let entity = self.entities.get_mut(id).ok_or(SketchError::MissingEntity(id))?;
        entity.fixed = fixed;
        Ok(())
    }

    pub fn set_construction(&mut self, id: EntityId, construction: bool) -> Result<(), SketchError> {
        let entity = self.entities.get_mut(id).ok_or(SketchError::MissingEntity(id))?;
        entity.construction = construction;
        Ok(())
    }

    /// Removes an entity and, transitively, every entity, sketch and
    /// constraint that depends on it.
    #[instrument(skip(self))]
    pub fn remove_entity(&mut self, id: EntityId) -> Result<Removal, SketchError> {
        if !self.entities.contains_key(id) {
            return Err(SketchError::MissingEntity(id));
        }
        let removal = self.cascade(HashSet::from([id]), HashSet::new());
        info!(
            entities = removal.entities.len(),
            sketches = removal.sketches.len(),
            constraints = removal.constraints.len(),
            "entity removed"
        );
        Ok(removal)
    }

    // ─── Sketches ────────────────────────────────────────────────────────────

    pub fn add_sketch(&mut self, name: impl Into<String>, workplane: EntityId) -> Result<SketchId, SketchError> {
        let wp = self.entity(workplane)?;
        if !wp.is_workplane() {
            return Err(SketchError::WrongEntityKind {
                id: workplane,
                expected: "workplane",
                found: wp.kind(),
            });
        }
        let sketch = Sketch::new(name, workplane);
        info!(name = %sketch.name, "sketch added");
        Ok(self.sketches.insert(sketch))
    }

    pub fn sketch(&self, id: SketchId) -> Result<&Sketch, SketchError> {
        self.sketches.get(id).ok_or(SketchError::MissingSketch(id))
    }

    pub fn sketch_mut(&mut self, id: SketchId) -> Result<&mut Sketch, SketchError> {
        self.sketches.get_mut(id).ok_or(SketchError::MissingSketch(id))
    }

    pub fn sketches(&self) -> impl Iterator<Item = (SketchId, &Sketch)> {
        self.sketches.iter()
    }

    /// Transform from sketch-local to world coordinates.
    pub fn sketch_basis(&self, id: SketchId) -> Result<Isometry3<f64>, SketchError> {
        let sketch = self.sketch(id)?;
        self.entity(sketch.workplane)?.matrix_basis()
    }

    /// Removes a sketch with its 2D entities and its constraints. The
    /// workplane stays.
    #[instrument(skip(self))]
    pub fn remove_sketch(&mut self, id: SketchId) -> Result<Removal, SketchError> {
        if !self.sketches.contains_key(id) {
            return Err(SketchError::MissingSketch(id));
        }
        let removal = self.cascade(HashSet::new(), HashSet::from([id]));
        info!(
            entities = removal.entities.len(),
            constraints = removal.constraints.len(),
            "sketch removed"
        );
        Ok(removal)
    }

    // ─── Constraints ─────────────────────────────────────────────────────────

    /// Validates and inserts a constraint. With `init`, the constraint's
    /// parameters are first initialized from the current geometry.
    ///
    /// Nothing is inserted when validation fails.
    pub fn add_constraint(&mut self, mut constraint: Constraint, init: bool) -> Result<ConstraintId, SketchError> {
        constraint.validate(self)?;
        if init {
            constraint.init_props(self)?;
        }
        let label = constraint.kind.label();
        let id = self.constraints.insert(constraint);
        debug!(?id, label, "constraint added");
        Ok(id)
    }

    pub fn constraint(&self, id: ConstraintId) -> Result<&Constraint, SketchError> {
        self.constraints.get(id).ok_or(SketchError::MissingConstraint(id))
    }

    pub fn constraint_mut(&mut self, id: ConstraintId) -> Result<&mut Constraint, SketchError> {
        self.constraints
            .get_mut(id)
            .ok_or(SketchError::MissingConstraint(id))
    }

    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints.iter()
    }

    /// Constraints scoped to `sketch`, or the 3D constraints for `None`.
    pub fn constraints_in(&self, sketch: Option<SketchId>) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints.iter().filter(move |(_, c)| c.sketch == sketch)
    }

    /// Re-runs `init_props` on a stored constraint against the current
    /// geometry.
    pub fn reinit_constraint(&mut self, id: ConstraintId) -> Result<(), SketchError> {
        let mut constraint = self.constraint(id)?.clone();
        constraint.init_props(self)?;
        *self.constraint_mut(id)? = constraint;
        Ok(())
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<Constraint, SketchError> {
        self.constraints
            .remove(id)
            .ok_or(SketchError::MissingConstraint(id))
    }

    // ─── Cascade ─────────────────────────────────────────────────────────────

    fn cascade(&mut self, mut entities: HashSet<EntityId>, mut sketches: HashSet<SketchId>) -> Removal {
        loop {
            let before = (entities.len(), sketches.len());
            for (sid, sketch) in &self.sketches {
                if entities.contains(&sketch.workplane) {
                    sketches.insert(sid);
                }
            }
            for (eid, entity) in &self.entities {
                let orphaned = entity.sketch().is_some_and(|s| sketches.contains(&s))
                    || entity.references().iter().any(|r| entities.contains(r));
                if orphaned {
                    entities.insert(eid);
                }
            }
            if (entities.len(), sketches.len()) == before {
                break;
            }
        }

        let constraints: Vec<ConstraintId> = self
            .constraints
            .iter()
            .filter(|(_, c)| {
                c.sketch.is_some_and(|s| sketches.contains(&s))
                    || c.entities().iter().any(|e| entities.contains(e))
            })
            .map(|(id, _)| id)
            .collect();

        for id in &constraints {
            self.constraints.remove(*id);
        }
        for id in &entities {
            self.entities.remove(*id);
        }
        for id in &sketches {
            self.sketches.remove(*id);
        }

        Removal {
            entities: entities.into_iter().collect(),
            constraints,
            sketches: sketches.into_iter().collect(),
        }
    }
}
