//! SketchBuilder: fluent API for scripting sketching sessions in tests.
//!
//! Wraps `sketcher_bridge::dispatch()` to test the real dispatch path, not a
//! simulation. All methods accept string names instead of keys for
//! readability.

use std::collections::HashMap;

use nalgebra::{UnitQuaternion, Vector2, Vector3};
use sketch_solver::{Constraint, ConstraintKind, SketchStore};
use sketcher_bridge::messages::SolveSummary;
use sketcher_bridge::{HostToSketcher, SketcherState, SketcherToHost};
use sketcher_types::{ConstraintId, Entity, EntityData, EntityId, SketchId};
use tracing::debug;

use crate::helpers::*;
use crate::oracle;

/// Residual tolerance used by auto-check after each solve.
const AUTO_CHECK_TOL: f64 = 1e-6;

/// A fluent builder for constructing and verifying sketches in tests.
///
/// Wraps `SketcherState` and provides named access to entities and
/// constraints, sketch lifecycle management, and inline verification.
pub struct SketchBuilder {
    pub state: SketcherState,
    entities: HashMap<String, EntityId>,
    constraints: HashMap<String, ConstraintId>,
    sketch: Option<SketchId>,
    history: Vec<(String, String)>,
    auto_check: bool,
}

impl SketchBuilder {
    pub fn new() -> Self {
        Self {
            state: SketcherState::new(),
            entities: HashMap::new(),
            constraints: HashMap::new(),
            sketch: None,
            history: Vec::new(),
            auto_check: false,
        }
    }

    /// Enable auto-checking: after every solve, every constraint of the solved
    /// scope must hold in the written-back geometry.
    pub fn with_auto_check(mut self) -> Self {
        self.auto_check = true;
        self
    }

    // ── Sketch Lifecycle ────────────────────────────────────────────────

    /// Create a workplane at `origin` and a sketch on it, and start editing it.
    pub fn begin_sketch(
        &mut self,
        name: &str,
        origin: [f64; 3],
        orientation: UnitQuaternion<f64>,
    ) -> Result<SketchId, HarnessError> {
        let origin = self.add_entity(
            &format!("{name}.origin"),
            Entity::new(EntityData::Point3D {
                location: Vector3::from(origin),
            }),
        )?;
        let workplane = self.add_entity(
            &format!("{name}.workplane"),
            Entity::new(EntityData::Workplane {
                p1: origin,
                orientation,
            }),
        )?;
        let response = self.send(
            "AddSketch",
            HostToSketcher::AddSketch {
                name: name.to_string(),
                workplane,
            },
        )?;
        let id = match response {
            SketcherToHost::SketchAdded { id } => id,
            other => return Err(unexpected("AddSketch", &other)),
        };
        self.sketch = Some(id);
        Ok(id)
    }

    /// Sketch on the XY plane through the origin.
    pub fn xy_sketch(&mut self, name: &str) -> Result<SketchId, HarnessError> {
        self.begin_sketch(name, [0.0; 3], UnitQuaternion::identity())
    }

    /// Stop editing; later constraints go to the free 3D scope.
    pub fn leave_sketch(&mut self) -> Result<&mut Self, HarnessError> {
        self.send("SetActiveSketch", HostToSketcher::SetActiveSketch { sketch: None })?;
        self.sketch = None;
        Ok(self)
    }

    pub fn sketch_id(&self) -> Result<SketchId, HarnessError> {
        self.sketch.ok_or(HarnessError::NoActiveSketch)
    }

    // ── Entities ────────────────────────────────────────────────────────

    pub fn point(&mut self, name: &str, x: f64, y: f64) -> Result<EntityId, HarnessError> {
        let sketch = self.sketch_id()?;
        self.add_entity(
            name,
            Entity::new(EntityData::Point2D {
                sketch,
                co: Vector2::new(x, y),
            }),
        )
    }

    /// A point the solver may not move.
    pub fn fixed_point(&mut self, name: &str, x: f64, y: f64) -> Result<EntityId, HarnessError> {
        let sketch = self.sketch_id()?;
        self.add_entity(
            name,
            Entity::new(EntityData::Point2D {
                sketch,
                co: Vector2::new(x, y),
            })
            .fixed(),
        )
    }

    pub fn point_3d(&mut self, name: &str, location: [f64; 3]) -> Result<EntityId, HarnessError> {
        self.add_entity(
            name,
            Entity::new(EntityData::Point3D {
                location: Vector3::from(location),
            }),
        )
    }

    pub fn line(&mut self, name: &str, start: &str, end: &str) -> Result<EntityId, HarnessError> {
        let sketch = self.sketch_id()?;
        let (p1, p2) = (self.entity_id(start)?, self.entity_id(end)?);
        self.add_entity(name, Entity::new(EntityData::Line2D { sketch, p1, p2 }))
    }

    pub fn line_3d(&mut self, name: &str, start: &str, end: &str) -> Result<EntityId, HarnessError> {
        let (p1, p2) = (self.entity_id(start)?, self.entity_id(end)?);
        self.add_entity(name, Entity::new(EntityData::Line3D { p1, p2 }))
    }

    pub fn circle(&mut self, name: &str, center: &str, radius: f64) -> Result<EntityId, HarnessError> {
        let sketch = self.sketch_id()?;
        let ct = self.entity_id(center)?;
        self.add_entity(name, Entity::new(EntityData::Circle { sketch, ct, radius }))
    }

    pub fn arc(&mut self, name: &str, center: &str, start: &str, end: &str) -> Result<EntityId, HarnessError> {
        let sketch = self.sketch_id()?;
        let (ct, p1, p2) = (self.entity_id(center)?, self.entity_id(start)?, self.entity_id(end)?);
        self.add_entity(
            name,
            Entity::new(EntityData::Arc {
                sketch,
                ct,
                p1,
                p2,
                invert: false,
            }),
        )
    }

    /// Closed polyline through `corners`. Points are named `{prefix}.p{i}`,
    /// lines `{prefix}.l{i}`, line `i` running from point `i` to `i + 1`.
    pub fn polygon(&mut self, prefix: &str, corners: &[(f64, f64)]) -> Result<Vec<EntityId>, HarnessError> {
        for (i, &(x, y)) in corners.iter().enumerate() {
            self.point(&format!("{prefix}.p{i}"), x, y)?;
        }
        (0..corners.len())
            .map(|i| {
                let next = (i + 1) % corners.len();
                self.line(
                    &format!("{prefix}.l{i}"),
                    &format!("{prefix}.p{i}"),
                    &format!("{prefix}.p{next}"),
                )
            })
            .collect()
    }

    /// Delete an entity and everything depending on it. Returns how many
    /// entities went away.
    pub fn delete(&mut self, name: &str) -> Result<usize, HarnessError> {
        let entity = self.entity_id(name)?;
        let response = self.send("DeleteEntity", HostToSketcher::DeleteEntity { entity })?;
        let (entities, constraints) = match response {
            SketcherToHost::Removed {
                entities,
                constraints,
                ..
            } => (entities, constraints),
            other => return Err(unexpected("DeleteEntity", &other)),
        };
        self.entities.retain(|_, id| !entities.contains(id));
        self.constraints.retain(|_, id| !constraints.contains(id));
        Ok(entities.len())
    }

    // ── Constraints ─────────────────────────────────────────────────────

    /// Add a constraint with its parameters as given.
    pub fn constrain(
        &mut self,
        name: &str,
        kind: impl Into<ConstraintKind>,
        first: &str,
        second: Option<&str>,
    ) -> Result<ConstraintId, HarnessError> {
        self.add_constraint(name, kind.into(), first, second, false)
    }

    /// Add a dimensional constraint whose value is taken from the current
    /// geometry.
    pub fn dimension(
        &mut self,
        name: &str,
        kind: impl Into<ConstraintKind>,
        first: &str,
        second: Option<&str>,
    ) -> Result<ConstraintId, HarnessError> {
        self.add_constraint(name, kind.into(), first, second, true)
    }

    /// Set a dimensional value. The owning scope is re-solved.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<SolveSummary, HarnessError> {
        let constraint = self.constraint_id(name)?;
        let response = self.send("SetValue", HostToSketcher::SetValue { constraint, value })?;
        match response {
            SketcherToHost::ConstraintUpdated { solve: Some(solve), .. } => {
                self.check_solve(&solve)?;
                Ok(solve)
            }
            other => Err(unexpected("SetValue", &other)),
        }
    }

    pub fn remove_constraint(&mut self, name: &str) -> Result<(), HarnessError> {
        let constraint = self.constraint_id(name)?;
        self.send("DeleteConstraint", HostToSketcher::DeleteConstraint { constraint })?;
        self.constraints.remove(name);
        Ok(())
    }

    // ── Solving ─────────────────────────────────────────────────────────

    /// Solve the sketch being edited, or the free scope outside a sketch.
    pub fn solve(&mut self) -> Result<SolveSummary, HarnessError> {
        let response = self.send(
            "Solve",
            HostToSketcher::Solve {
                sketch: self.sketch,
                all: false,
            },
        )?;
        let mut reports = match response {
            SketcherToHost::Solved { reports } => reports,
            other => return Err(unexpected("Solve", &other)),
        };
        let summary = reports.pop().ok_or_else(|| HarnessError::UnexpectedResponse {
            request: "Solve".into(),
            response: "no reports".into(),
        })?;
        self.check_solve(&summary)?;
        Ok(summary)
    }

    pub fn solve_all(&mut self) -> Result<Vec<SolveSummary>, HarnessError> {
        let response = self.send("Solve", HostToSketcher::Solve { sketch: None, all: true })?;
        let reports = match response {
            SketcherToHost::Solved { reports } => reports,
            other => return Err(unexpected("Solve", &other)),
        };
        for summary in &reports {
            self.check_solve(summary)?;
        }
        Ok(reports)
    }

    // ── Named Lookup ────────────────────────────────────────────────────

    pub fn entity_id(&self, name: &str) -> Result<EntityId, HarnessError> {
        self.entities
            .get(name)
            .copied()
            .ok_or_else(|| HarnessError::EntityNotFound { name: name.to_string() })
    }

    pub fn constraint_id(&self, name: &str) -> Result<ConstraintId, HarnessError> {
        self.constraints
            .get(name)
            .copied()
            .ok_or_else(|| HarnessError::ConstraintNotFound { name: name.to_string() })
    }

    /// Name given to a constraint key, if any.
    pub fn constraint_name(&self, id: ConstraintId) -> Option<&str> {
        self.constraints
            .iter()
            .find(|(_, c)| **c == id)
            .map(|(name, _)| name.as_str())
    }

    /// Sketch-local coordinates of a 2D point.
    pub fn co(&self, name: &str) -> Result<Vector2<f64>, HarnessError> {
        Ok(self.store().entity(self.entity_id(name)?)?.co()?)
    }

    pub fn location(&self, name: &str) -> Result<Vector3<f64>, HarnessError> {
        Ok(self.store().entity(self.entity_id(name)?)?.location()?)
    }

    pub fn length(&self, name: &str) -> Result<f64, HarnessError> {
        Ok(self.store().entity(self.entity_id(name)?)?.length()?)
    }

    pub fn radius(&self, name: &str) -> Result<f64, HarnessError> {
        Ok(self.store().entity(self.entity_id(name)?)?.radius()?)
    }

    pub fn store(&self) -> &SketchStore {
        &self.state.store
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Requests sent so far, with a short outcome each.
    pub fn history(&self) -> &[(String, String)] {
        &self.history
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn check_name_available(&self, name: &str) -> Result<(), HarnessError> {
        if self.entities.contains_key(name) || self.constraints.contains_key(name) {
            return Err(HarnessError::DuplicateName { name: name.to_string() });
        }
        Ok(())
    }

    fn add_entity(&mut self, name: &str, entity: Entity) -> Result<EntityId, HarnessError> {
        self.check_name_available(name)?;
        let response = self.send("AddEntity", HostToSketcher::AddEntity { entity })?;
        let id = match response {
            SketcherToHost::EntityAdded { id } => id,
            other => return Err(unexpected("AddEntity", &other)),
        };
        self.entities.insert(name.to_string(), id);
        Ok(id)
    }

    fn add_constraint(
        &mut self,
        name: &str,
        kind: ConstraintKind,
        first: &str,
        second: Option<&str>,
        init: bool,
    ) -> Result<ConstraintId, HarnessError> {
        self.check_name_available(name)?;
        let entity1 = self.entity_id(first)?;
        let entity2 = second.map(|n| self.entity_id(n)).transpose()?;
        let constraint = Constraint::new(kind, entity1, entity2, self.sketch);
        let response = self.send("AddConstraint", HostToSketcher::AddConstraint { constraint, init })?;
        let id = match response {
            SketcherToHost::ConstraintAdded { id, .. } => id,
            other => return Err(unexpected("AddConstraint", &other)),
        };
        self.constraints.insert(name.to_string(), id);
        Ok(id)
    }

    /// Dispatch one request, turning error responses into `DispatchError`.
    fn send(&mut self, request: &str, msg: HostToSketcher) -> Result<SketcherToHost, HarnessError> {
        let response = sketcher_bridge::dispatch(&mut self.state, msg);
        if let SketcherToHost::Error { message } = &response {
            self.history.push((request.to_string(), format!("error: {message}")));
            return Err(HarnessError::DispatchError {
                message: message.clone(),
            });
        }
        debug!(request, "dispatched");
        self.history.push((request.to_string(), "ok".to_string()));
        Ok(response)
    }

    fn check_solve(&self, summary: &SolveSummary) -> Result<(), HarnessError> {
        if !self.auto_check || !summary.state.is_okay() {
            return Ok(());
        }
        let failures: Vec<_> = oracle::check_sketch(self.store(), summary.scope.sketch(), AUTO_CHECK_TOL)
            .into_iter()
            .filter(|v| !v.passed)
            .collect();
        match failures.first() {
            None => Ok(()),
            Some(first) => Err(HarnessError::OracleFailure {
                oracle: first.oracle_name.clone(),
                detail: format!("{} ({} failing)", first.detail, failures.len()),
            }),
        }
    }
}

impl Default for SketchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn unexpected(request: &str, response: &SketcherToHost) -> HarnessError {
    HarnessError::UnexpectedResponse {
        request: request.to_string(),
        response: format!("{response:?}"),
    }
}
