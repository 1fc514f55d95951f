//! Constraints and their translation into solver equations.
//!
//! Every constraint kind implements [`Translator`]: which entity kinds it
//! accepts per slot, whether it needs a sketch workplane, how it derives its
//! initial value from current geometry, which solver equations it emits, and
//! where its label sits.

use nalgebra::{Isometry3, Point3, Vector2, Vector3};
use serde::{Deserialize, Deserializer, Serialize};
use sketcher_types::{EntityId, EntityKind, SketchId, WorkplaneRequirement};

use crate::entity::EntityRef;
use crate::entity_mapping::EntityHandles;
use crate::error::SketchError;
use crate::geometry::Placement2d;
use crate::solver::{ConstraintHandle, EntityHandle, Group, SolverBackend, SolverConstraint};
use crate::store::SketchStore;

mod angle;
mod coincident;
mod diameter;
mod distance;
mod equal;
mod horizontal;
mod midpoint;
mod parallel;
mod perpendicular;
mod ratio;
mod symmetric;
mod tangent;
mod vertical;

pub use angle::Angle;
pub use coincident::Coincident;
pub use diameter::Diameter;
pub use distance::Distance;
pub use equal::Equal;
pub use horizontal::Horizontal;
pub use midpoint::Midpoint;
pub use parallel::Parallel;
pub use perpendicular::Perpendicular;
pub use ratio::Ratio;
pub use symmetric::Symmetric;
pub use tangent::Tangent;
pub use vertical::Vertical;

// ─── Constraint ──────────────────────────────────────────────────────────────

/// A relation between one or two entities, optionally scoped to a sketch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub entity1: EntityId,
    pub entity2: Option<EntityId>,
    pub sketch: Option<SketchId>,
    pub kind: ConstraintKind,
}

/// Per-kind parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum ConstraintKind {
    Distance(Distance),
    Angle(Angle),
    Diameter(Diameter),
    Coincident(Coincident),
    Equal(Equal),
    Horizontal(Horizontal),
    Vertical(Vertical),
    Parallel(Parallel),
    Perpendicular(Perpendicular),
    Tangent(Tangent),
    Midpoint(Midpoint),
    Ratio(Ratio),
    Symmetric(Symmetric),
}

/// Runs `$body` with `$t` bound to the kind-specific translator.
macro_rules! dispatch {
    ($kind:expr, $t:ident => $body:expr) => {
        match $kind {
            ConstraintKind::Distance($t) => $body,
            ConstraintKind::Angle($t) => $body,
            ConstraintKind::Diameter($t) => $body,
            ConstraintKind::Coincident($t) => $body,
            ConstraintKind::Equal($t) => $body,
            ConstraintKind::Horizontal($t) => $body,
            ConstraintKind::Vertical($t) => $body,
            ConstraintKind::Parallel($t) => $body,
            ConstraintKind::Perpendicular($t) => $body,
            ConstraintKind::Tangent($t) => $body,
            ConstraintKind::Midpoint($t) => $body,
            ConstraintKind::Ratio($t) => $body,
            ConstraintKind::Symmetric($t) => $body,
        }
    };
}

macro_rules! kind_from {
    ($($name:ident),* $(,)?) => {
        $(
            impl From<$name> for ConstraintKind {
                fn from(kind: $name) -> Self {
                    ConstraintKind::$name(kind)
                }
            }
        )*
    };
}

kind_from!(
    Distance,
    Angle,
    Diameter,
    Coincident,
    Equal,
    Horizontal,
    Vertical,
    Parallel,
    Perpendicular,
    Tangent,
    Midpoint,
    Ratio,
    Symmetric,
);

impl ConstraintKind {
    pub fn constraint_type(&self) -> ConstraintType {
        match self {
            ConstraintKind::Distance(_) => ConstraintType::Distance,
            ConstraintKind::Angle(_) => ConstraintType::Angle,
            ConstraintKind::Diameter(_) => ConstraintType::Diameter,
            ConstraintKind::Coincident(_) => ConstraintType::Coincident,
            ConstraintKind::Equal(_) => ConstraintType::Equal,
            ConstraintKind::Horizontal(_) => ConstraintType::Horizontal,
            ConstraintKind::Vertical(_) => ConstraintType::Vertical,
            ConstraintKind::Parallel(_) => ConstraintType::Parallel,
            ConstraintKind::Perpendicular(_) => ConstraintType::Perpendicular,
            ConstraintKind::Tangent(_) => ConstraintType::Tangent,
            ConstraintKind::Midpoint(_) => ConstraintType::Midpoint,
            ConstraintKind::Ratio(_) => ConstraintType::Ratio,
            ConstraintKind::Symmetric(_) => ConstraintType::Symmetric,
        }
    }

    pub fn label(&self) -> &'static str {
        self.constraint_type().label()
    }

    /// Stored (non-negative) value of a dimensional constraint.
    pub fn value(&self) -> Option<f64> {
        match self {
            ConstraintKind::Distance(d) => Some(d.value()),
            ConstraintKind::Angle(a) => Some(a.value()),
            ConstraintKind::Diameter(d) => Some(d.value()),
            ConstraintKind::Ratio(r) => Some(r.value()),
            _ => None,
        }
    }

    /// Sets the value of a dimensional constraint through its normalizing
    /// setter. Returns `Ok(false)` for kinds without a value; non-finite
    /// input is rejected and leaves the stored value untouched.
    pub fn set_value(&mut self, value: f64) -> Result<bool, SketchError> {
        match self {
            ConstraintKind::Distance(d) => d.set_value(value)?,
            ConstraintKind::Angle(a) => a.set_value(value)?,
            ConstraintKind::Diameter(d) => d.set_value(value)?,
            ConstraintKind::Ratio(r) => r.set_value(value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Constraint kind tag, without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintType {
    Distance,
    Angle,
    Diameter,
    Coincident,
    Equal,
    Horizontal,
    Vertical,
    Parallel,
    Perpendicular,
    Tangent,
    Midpoint,
    Ratio,
    Symmetric,
}

impl ConstraintType {
    pub const ALL: [ConstraintType; 13] = [
        ConstraintType::Coincident,
        ConstraintType::Equal,
        ConstraintType::Distance,
        ConstraintType::Angle,
        ConstraintType::Diameter,
        ConstraintType::Parallel,
        ConstraintType::Horizontal,
        ConstraintType::Vertical,
        ConstraintType::Tangent,
        ConstraintType::Midpoint,
        ConstraintType::Perpendicular,
        ConstraintType::Ratio,
        ConstraintType::Symmetric,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ConstraintType::Distance => "Distance",
            ConstraintType::Angle => "Angle",
            ConstraintType::Diameter => "Diameter",
            ConstraintType::Coincident => "Coincident",
            ConstraintType::Equal => "Equal",
            ConstraintType::Horizontal => "Horizontal",
            ConstraintType::Vertical => "Vertical",
            ConstraintType::Parallel => "Parallel",
            ConstraintType::Perpendicular => "Perpendicular",
            ConstraintType::Tangent => "Tangent",
            ConstraintType::Midpoint => "Midpoint",
            ConstraintType::Ratio => "Ratio",
            ConstraintType::Symmetric => "Symmetric",
        }
    }

    /// Kinds carrying a user-editable value.
    pub fn is_dimensional(self) -> bool {
        matches!(
            self,
            ConstraintType::Distance
                | ConstraintType::Angle
                | ConstraintType::Diameter
                | ConstraintType::Ratio
        )
    }

    /// Entity kinds accepted in `slot`, given what the slots hold so far.
    /// `None` means the slot must stay empty.
    pub fn legal_types(
        self,
        slot: usize,
        entities: [Option<EntityKind>; 2],
    ) -> Option<&'static [EntityKind]> {
        match self {
            ConstraintType::Distance => Distance::legal_types(slot, entities),
            ConstraintType::Angle => Angle::legal_types(slot, entities),
            ConstraintType::Diameter => Diameter::legal_types(slot, entities),
            ConstraintType::Coincident => Coincident::legal_types(slot, entities),
            ConstraintType::Equal => Equal::legal_types(slot, entities),
            ConstraintType::Horizontal => Horizontal::legal_types(slot, entities),
            ConstraintType::Vertical => Vertical::legal_types(slot, entities),
            ConstraintType::Parallel => Parallel::legal_types(slot, entities),
            ConstraintType::Perpendicular => Perpendicular::legal_types(slot, entities),
            ConstraintType::Tangent => Tangent::legal_types(slot, entities),
            ConstraintType::Midpoint => Midpoint::legal_types(slot, entities),
            ConstraintType::Ratio => Ratio::legal_types(slot, entities),
            ConstraintType::Symmetric => Symmetric::legal_types(slot, entities),
        }
    }
}

impl std::fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Constraint {
    pub fn new(
        kind: impl Into<ConstraintKind>,
        entity1: EntityId,
        entity2: Option<EntityId>,
        sketch: Option<SketchId>,
    ) -> Self {
        Self {
            entity1,
            entity2,
            sketch,
            kind: kind.into(),
        }
    }

    pub fn constraint_type(&self) -> ConstraintType {
        self.kind.constraint_type()
    }

    /// Every entity key the constraint depends on.
    pub fn entities(&self) -> Vec<EntityId> {
        let mut ids = vec![self.entity1];
        ids.extend(self.entity2);
        ids.extend(dispatch!(&self.kind, t => t.references()));
        ids
    }

    pub fn slots<'a>(&self, store: &'a SketchStore) -> Result<Slots<'a>, SketchError> {
        Ok(Slots {
            store,
            entity1: store.entity(self.entity1)?,
            entity2: self.entity2.map(|id| store.entity(id)).transpose()?,
            sketch: self.sketch,
            label: self.kind.label(),
        })
    }

    /// Checks the constraint against the store without changing anything.
    ///
    /// Slot kinds are checked in selection order: slot 0 against the full
    /// signature, slot 1 given slot 0.
    pub fn validate(&self, store: &SketchStore) -> Result<(), SketchError> {
        if self.entity2 == Some(self.entity1) {
            return Err(SketchError::SameEntity);
        }
        let ty = self.constraint_type();
        let label = ty.label();
        let slots = self.slots(store)?;

        let kind1 = slots.entity1.kind();
        let legal = ty.legal_types(0, [None, None]).unwrap_or(&[]);
        if !legal.contains(&kind1) {
            return Err(SketchError::IllegalEntityType {
                constraint: label,
                slot: 0,
                found: kind1,
            });
        }
        match (ty.legal_types(1, [Some(kind1), None]), slots.entity2.map(|e| e.kind())) {
            (None, None) => {}
            (None, Some(_)) => {
                return Err(SketchError::SlotMustBeEmpty {
                    constraint: label,
                    slot: 1,
                })
            }
            (Some(_), None) => {
                return Err(SketchError::MissingSlot {
                    constraint: label,
                    slot: 1,
                })
            }
            (Some(legal), Some(found)) => {
                if !legal.contains(&found) {
                    return Err(SketchError::IllegalEntityType {
                        constraint: label,
                        slot: 1,
                        found,
                    });
                }
            }
        }

        if let Some(sketch) = self.sketch {
            store.sketch(sketch)?;
        }
        for entity in std::iter::once(slots.entity1).chain(slots.entity2) {
            if let Some(owner) = entity.sketch() {
                if self.sketch != Some(owner) {
                    return Err(SketchError::InvalidReference {
                        reason: format!("entity {:?} is not part of the constraint's sketch", entity.id),
                    });
                }
            }
        }

        dispatch!(&self.kind, t => t.check(&slots))?;

        let requirement = dispatch!(&self.kind, t => t.workplane_requirement(&slots));
        match requirement {
            WorkplaneRequirement::NotFree if self.sketch.is_none() => {
                Err(SketchError::WorkplaneRequired { constraint: label })
            }
            WorkplaneRequirement::Free if self.sketch.is_some() => {
                Err(SketchError::WorkplaneForbidden { constraint: label })
            }
            _ => Ok(()),
        }
    }

    pub fn workplane_requirement(&self, store: &SketchStore) -> Result<WorkplaneRequirement, SketchError> {
        let slots = self.slots(store)?;
        Ok(dispatch!(&self.kind, t => t.workplane_requirement(&slots)))
    }

    /// Derives the constraint's parameters from current geometry.
    pub fn init_props(&mut self, store: &SketchStore) -> Result<InitialValue, SketchError> {
        let slots = self.slots(store)?;
        dispatch!(&mut self.kind, t => t.init_props(&slots))
    }

    /// Emits the solver equations for this constraint.
    pub fn emit(
        &self,
        store: &SketchStore,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ConstraintHandle>, SketchError> {
        self.validate(store)?;
        let slots = self.slots(store)?;
        dispatch!(&self.kind, t => t.emit(&slots, emitter))
    }

    /// Label transform in sketch-local coordinates, for dimensional kinds.
    pub fn placement(&self, store: &SketchStore) -> Result<Option<Placement2d>, SketchError> {
        if self.sketch.is_none() {
            return Ok(None);
        }
        let slots = self.slots(store)?;
        if !slots.entity1.is_2d() {
            return Ok(None);
        }
        dispatch!(&self.kind, t => t.placement(&slots))
    }

    /// Label transform in world coordinates. 3D constraints have no
    /// on-screen placement yet and yield the identity.
    pub fn matrix_basis(&self, store: &SketchStore) -> Result<Isometry3<f64>, SketchError> {
        let (Some(sketch), Some(local)) = (self.sketch, self.placement(store)?) else {
            return Ok(Isometry3::identity());
        };
        Ok(store.sketch_basis(sketch)? * local.to_isometry())
    }

    /// World position of the value label.
    pub fn value_placement(
        &self,
        store: &SketchStore,
        ui_scale: f64,
    ) -> Result<Option<Vector3<f64>>, SketchError> {
        let Some(offset) = dispatch!(&self.kind, t => t.label_offset(ui_scale)) else {
            return Ok(None);
        };
        let basis = self.matrix_basis(store)?;
        Ok(Some((basis * Point3::new(offset.x, offset.y, 0.0)).coords))
    }
}

// ─── Translator contract ─────────────────────────────────────────────────────

/// Value computed by `init_props`: the scalar and, for kinds that have
/// one, the auxiliary flag (flip, supplementary angle, radius mode).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InitialValue {
    pub value: Option<f64>,
    pub auxiliary: Option<bool>,
}

impl InitialValue {
    pub fn value(value: f64) -> Self {
        Self {
            value: Some(value),
            auxiliary: None,
        }
    }

    pub fn with_auxiliary(value: f64, auxiliary: bool) -> Self {
        Self {
            value: Some(value),
            auxiliary: Some(auxiliary),
        }
    }
}

pub trait Translator {
    fn legal_types(slot: usize, entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]>;

    fn workplane_requirement(&self, _slots: &Slots<'_>) -> WorkplaneRequirement {
        WorkplaneRequirement::Optional
    }

    /// Kind-specific validation beyond the slot signature.
    fn check(&self, _slots: &Slots<'_>) -> Result<(), SketchError> {
        Ok(())
    }

    fn init_props(&mut self, _slots: &Slots<'_>) -> Result<InitialValue, SketchError> {
        Ok(InitialValue::default())
    }

    fn emit(
        &self,
        slots: &Slots<'_>,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ConstraintHandle>, SketchError>;

    fn placement(&self, _slots: &Slots<'_>) -> Result<Option<Placement2d>, SketchError> {
        Ok(None)
    }

    /// Label position in the placement frame, already scaled.
    fn label_offset(&self, _ui_scale: f64) -> Option<Vector2<f64>> {
        None
    }

    /// Entities referenced outside the two slots.
    fn references(&self) -> Vec<EntityId> {
        Vec::new()
    }
}

/// Resolved slots of a constraint.
#[derive(Debug, Clone, Copy)]
pub struct Slots<'a> {
    pub store: &'a SketchStore,
    pub entity1: EntityRef<'a>,
    pub entity2: Option<EntityRef<'a>>,
    pub sketch: Option<SketchId>,
    label: &'static str,
}

impl<'a> Slots<'a> {
    pub fn entity2(&self) -> Result<EntityRef<'a>, SketchError> {
        self.entity2.ok_or(SketchError::MissingSlot {
            constraint: self.label,
            slot: 1,
        })
    }

    /// Workplane of the constraint's sketch, if any.
    pub fn workplane(&self) -> Result<Option<EntityId>, SketchError> {
        self.sketch
            .map(|id| self.store.sketch(id).map(|s| s.workplane))
            .transpose()
    }

    pub fn require_workplane(&self) -> Result<EntityId, SketchError> {
        self.workplane()?.ok_or(SketchError::WorkplaneRequired {
            constraint: self.label,
        })
    }
}

/// Emission context: the backend, the entity handle map, and the group every
/// emitted element is tagged with.
pub struct Emitter<'a> {
    solver: &'a mut dyn SolverBackend,
    handles: &'a EntityHandles,
    group: Group,
}

impl<'a> Emitter<'a> {
    pub fn new(solver: &'a mut dyn SolverBackend, handles: &'a EntityHandles, group: Group) -> Self {
        Self {
            solver,
            handles,
            group,
        }
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn handle(&self, id: EntityId) -> Result<EntityHandle, SketchError> {
        self.handles.get(id).ok_or(SketchError::UnmappedEntity(id))
    }

    /// Solver handle of the constraint's sketch workplane.
    pub fn workplane(&self, slots: &Slots<'_>) -> Result<Option<EntityHandle>, SketchError> {
        slots.workplane()?.map(|id| self.handle(id)).transpose()
    }

    pub fn require_workplane(&self, slots: &Slots<'_>) -> Result<EntityHandle, SketchError> {
        self.handle(slots.require_workplane()?)
    }

    pub fn constrain(&mut self, constraint: SolverConstraint) -> Result<ConstraintHandle, SketchError> {
        Ok(self.solver.add_constraint(constraint, self.group)?)
    }

    /// An auxiliary workplane point that only exists on the solver side.
    pub fn aux_point(&mut self, workplane: EntityHandle, co: Vector2<f64>) -> Result<EntityHandle, SketchError> {
        let u = self.solver.add_param(co.x, self.group);
        let v = self.solver.add_param(co.y, self.group);
        Ok(self.solver.add_point_2d(workplane, u, v, self.group)?)
    }

    pub fn aux_line(
        &mut self,
        p1: EntityHandle,
        p2: EntityHandle,
        workplane: EntityHandle,
    ) -> Result<EntityHandle, SketchError> {
        Ok(self.solver.add_line(p1, p2, Some(workplane), self.group)?)
    }

    pub fn points_distance(
        &mut self,
        value: f64,
        p1: EntityHandle,
        p2: EntityHandle,
        workplane: Option<EntityHandle>,
    ) -> Result<ConstraintHandle, SketchError> {
        Ok(self.solver.add_points_distance(value, p1, p2, workplane, self.group)?)
    }

    pub fn point_line_distance(
        &mut self,
        value: f64,
        point: EntityHandle,
        line: EntityHandle,
        workplane: Option<EntityHandle>,
    ) -> Result<ConstraintHandle, SketchError> {
        Ok(self
            .solver
            .add_point_line_distance(value, point, line, workplane, self.group)?)
    }

    pub fn point_plane_distance(
        &mut self,
        value: f64,
        point: EntityHandle,
        plane: EntityHandle,
    ) -> Result<ConstraintHandle, SketchError> {
        Ok(self
            .solver
            .add_point_plane_distance(value, point, plane, self.group)?)
    }

    pub fn points_horizontal(
        &mut self,
        p1: EntityHandle,
        p2: EntityHandle,
        workplane: EntityHandle,
    ) -> Result<ConstraintHandle, SketchError> {
        Ok(self.solver.add_points_horizontal(p1, p2, workplane, self.group)?)
    }

    pub fn points_vertical(
        &mut self,
        p1: EntityHandle,
        p2: EntityHandle,
        workplane: EntityHandle,
    ) -> Result<ConstraintHandle, SketchError> {
        Ok(self.solver.add_points_vertical(p1, p2, workplane, self.group)?)
    }
}

/// Magnitude of a dimensional value. Non-finite input has no magnitude.
pub(crate) fn magnitude(value: f64) -> Result<f64, SketchError> {
    if value.is_finite() {
        Ok(value.abs())
    } else {
        Err(SketchError::NonFiniteValue { value })
    }
}

/// Deserializes a value through [`magnitude`], so stored values stay
/// non-negative whatever the input says.
pub(crate) fn non_negative<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    magnitude(f64::deserialize(deserializer)?).map_err(serde::de::Error::custom)
}

/// Legal kinds for a slot whose partner must have matching dimensionality:
/// 2D partners restrict to `two_d`, 3D partners to `three_d`.
pub(crate) fn by_dimension(
    other: Option<EntityKind>,
    any: &'static [EntityKind],
    two_d: &'static [EntityKind],
    three_d: &'static [EntityKind],
) -> &'static [EntityKind] {
    match other {
        Some(kind) if kind.is_2d() => two_d,
        Some(_) => three_d,
        None => any,
    }
}

/// The partner slot of `slot`.
pub(crate) fn other_slot(slot: usize, entities: [Option<EntityKind>; 2]) -> Option<EntityKind> {
    if slot == 0 {
        entities[1]
    } else {
        entities[0]
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use nalgebra::{UnitQuaternion, Vector2, Vector3};
    use sketcher_types::{EntityId, SketchId};

    use crate::entity_mapping::SketchToSolver;
    use crate::solver::MockSolver;
    use crate::store::SketchStore;
    use crate::types::SolveScope;

    pub struct Fixture {
        pub store: SketchStore,
        pub sketch: SketchId,
    }

    impl Fixture {
        pub fn new() -> Self {
            let mut store = SketchStore::new();
            let origin = store.add_point_3d(Vector3::zeros()).unwrap();
            let wp = store.add_workplane(origin, UnitQuaternion::identity()).unwrap();
            let sketch = store.add_sketch("Sketch", wp).unwrap();
            Self { store, sketch }
        }

        pub fn point(&mut self, x: f64, y: f64) -> EntityId {
            self.store.add_point_2d(self.sketch, Vector2::new(x, y)).unwrap()
        }

        pub fn line(&mut self, a: (f64, f64), b: (f64, f64)) -> EntityId {
            let p1 = self.point(a.0, a.1);
            let p2 = self.point(b.0, b.1);
            self.store.add_line_2d(self.sketch, p1, p2).unwrap()
        }

        pub fn circle(&mut self, center: (f64, f64), radius: f64) -> EntityId {
            let ct = self.point(center.0, center.1);
            self.store.add_circle(self.sketch, ct, radius).unwrap()
        }

        /// Registers all entities with a mock backend, ready for emission.
        pub fn mapped(&self) -> (MockSolver, crate::entity_mapping::EntityHandles) {
            let mut solver = MockSolver::new();
            let handles = {
                let mut mapping = SketchToSolver::new(&mut solver);
                mapping
                    .add_entities(&self.store, SolveScope::Sketch(self.sketch))
                    .unwrap();
                mapping.into_handles()
            };
            (solver, handles)
        }
    }
}
