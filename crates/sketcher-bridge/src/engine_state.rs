use nalgebra::Vector2;
use tracing::{debug, info};

use sketch_solver::constraint::ConstraintKind;
use sketch_solver::{
    solve_all, solve_numeric, Constraint, Removal, SketchError, SketchStore, SolveReport, SolveScope,
    SolverConfig,
};
use sketcher_types::{Alignment, ConstraintId, Entity, EntityId, SketchId};

/// Sketcher session state behind the bridge.
///
/// Holds the entity store, the sketch being edited and the solver settings.
pub struct SketcherState {
    pub store: SketchStore,
    /// The sketch being edited, if any.
    pub active_sketch: Option<SketchId>,
    pub config: SolverConfig,
    /// Scale of constraint labels relative to sketch units.
    pub ui_scale: f64,
}

impl SketcherState {
    pub fn new() -> Self {
        Self {
            store: SketchStore::new(),
            active_sketch: None,
            config: SolverConfig::default(),
            ui_scale: 1.0,
        }
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    // -- Entities and sketches --

    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId, BridgeError> {
        Ok(self.store.add_entity(entity)?)
    }

    /// Create a sketch and make it the active one.
    pub fn add_sketch(&mut self, name: String, workplane: EntityId) -> Result<SketchId, BridgeError> {
        let id = self.store.add_sketch(name, workplane)?;
        self.active_sketch = Some(id);
        Ok(id)
    }

    pub fn delete_entity(&mut self, id: EntityId) -> Result<Removal, BridgeError> {
        let removal = self.store.remove_entity(id)?;
        self.forget_removed(&removal);
        Ok(removal)
    }

    pub fn delete_sketch(&mut self, id: SketchId) -> Result<Removal, BridgeError> {
        let removal = self.store.remove_sketch(id)?;
        self.forget_removed(&removal);
        Ok(removal)
    }

    fn forget_removed(&mut self, removal: &Removal) {
        if self
            .active_sketch
            .is_some_and(|active| removal.sketches.contains(&active))
        {
            self.active_sketch = None;
        }
    }

    pub fn set_active_sketch(&mut self, sketch: Option<SketchId>) -> Result<(), BridgeError> {
        if let Some(id) = sketch {
            self.store.sketch(id)?;
        }
        self.active_sketch = sketch;
        Ok(())
    }

    pub fn set_sketch_visible(&mut self, sketch: SketchId, visible: bool) -> Result<(), BridgeError> {
        self.store.sketch_mut(sketch)?.visible = visible;
        Ok(())
    }

    pub fn rename_sketch(&mut self, sketch: SketchId, name: String) -> Result<(), BridgeError> {
        self.store.sketch_mut(sketch)?.name = name;
        Ok(())
    }

    // -- Constraints --

    pub fn add_constraint(&mut self, constraint: Constraint, init: bool) -> Result<ConstraintId, BridgeError> {
        Ok(self.store.add_constraint(constraint, init)?)
    }

    pub fn delete_constraint(&mut self, id: ConstraintId) -> Result<Constraint, BridgeError> {
        Ok(self.store.remove_constraint(id)?)
    }

    /// Sets a dimensional value through its normalizing setter and re-solves
    /// the owning scope.
    pub fn set_value(&mut self, id: ConstraintId, value: f64) -> Result<SolveReport, BridgeError> {
        let constraint = self.store.constraint_mut(id)?;
        if !constraint.kind.set_value(value)? {
            return Err(BridgeError::NotDimensional {
                kind: constraint.kind.label(),
            });
        }
        debug!(?id, value, "value set");
        self.resolve_owner(id)
    }

    pub fn set_flip(&mut self, id: ConstraintId, flip: bool) -> Result<SolveReport, BridgeError> {
        let slots = self.store.constraint(id)?.slots(&self.store)?;
        let flippable = sketch_solver::constraint::Distance::use_flipping(&slots);
        match &mut self.store.constraint_mut(id)?.kind {
            ConstraintKind::Distance(d) if flippable => d.flip = flip,
            _ => return Err(BridgeError::Unsupported { property: "flip" }),
        }
        self.resolve_owner(id)
    }

    pub fn set_align(&mut self, id: ConstraintId, align: Alignment) -> Result<SolveReport, BridgeError> {
        let slots = self.store.constraint(id)?.slots(&self.store)?;
        let alignable = sketch_solver::constraint::Distance::use_align(&slots);
        match &mut self.store.constraint_mut(id)?.kind {
            ConstraintKind::Distance(d) if alignable => d.align = align,
            _ => return Err(BridgeError::Unsupported { property: "align" }),
        }
        self.resolve_owner(id)
    }

    pub fn set_setting(&mut self, id: ConstraintId, setting: bool) -> Result<SolveReport, BridgeError> {
        match &mut self.store.constraint_mut(id)?.kind {
            ConstraintKind::Angle(a) => a.setting = setting,
            ConstraintKind::Diameter(d) => d.set_radius_mode(setting),
            _ => return Err(BridgeError::Unsupported { property: "setting" }),
        }
        self.resolve_owner(id)
    }

    /// Stores a new distance label position. Does not re-solve.
    pub fn move_label(&mut self, id: ConstraintId, position: [f64; 2]) -> Result<(), BridgeError> {
        let ui_scale = self.ui_scale;
        match &mut self.store.constraint_mut(id)?.kind {
            ConstraintKind::Distance(d) => {
                d.update_draw_offset(Vector2::new(position[0], position[1]), ui_scale);
                Ok(())
            }
            _ => Err(BridgeError::Unsupported { property: "label" }),
        }
    }

    // -- Solving --

    /// Solves `sketch`, or the active sketch, or the free 3D scope.
    pub fn solve(&mut self, sketch: Option<SketchId>) -> Result<SolveReport, BridgeError> {
        let scope = match sketch.or(self.active_sketch) {
            Some(id) => SolveScope::Sketch(id),
            None => SolveScope::Free,
        };
        Ok(solve_numeric(&mut self.store, scope, &self.config)?)
    }

    pub fn solve_all(&mut self) -> Result<Vec<SolveReport>, BridgeError> {
        let reports = solve_all(&mut self.store, &self.config)?;
        info!(scopes = reports.len(), "solved all");
        Ok(reports)
    }

    fn resolve_owner(&mut self, id: ConstraintId) -> Result<SolveReport, BridgeError> {
        let scope = match self.store.constraint(id)?.sketch {
            Some(sketch) => SolveScope::Sketch(sketch),
            None => SolveScope::Free,
        };
        Ok(solve_numeric(&mut self.store, scope, &self.config)?)
    }
}

impl Default for SketcherState {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors from the bridge layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("sketch error: {0}")]
    Sketch(#[from] SketchError),

    #[error("{kind} has no value")]
    NotDimensional { kind: &'static str },

    #[error("constraint does not support {property}")]
    Unsupported { property: &'static str },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}
