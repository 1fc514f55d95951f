//! Solver adapter contract.
//!
//! The sketch core never talks to a particular solver library directly. It
//! registers parameters, entities and constraints through [`SolverBackend`]
//! and reads solved parameter values back after [`SolverBackend::solve`].

use serde::{Deserialize, Serialize};

mod mock;
mod numeric;
#[cfg(feature = "native-solver")]
mod slvs;

pub use mock::{MockSolver, RecordedCall};
pub use numeric::NumericSolver;
#[cfg(feature = "native-solver")]
pub use self::slvs::SlvsSolver;

/// Handle of a scalar parameter owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamHandle(pub u32);

/// Handle of a solver-side entity (point, normal, distance, line, curve, plane).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityHandle(pub u32);

/// Handle of a solver-side constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstraintHandle(pub u32);

/// Batching tag deciding which parameters move and which equations apply
/// during a solve pass. Parameters of any other group are held constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Group(pub u32);

impl Group {
    /// Geometry that must not move: fixed entities, other sketches, workplanes.
    pub const FIXED: Group = Group(1);
    /// Geometry and equations of the sketch being solved.
    pub const ACTIVE: Group = Group(2);
}

/// Solver-level equations the constraint translators emit.
///
/// A `workplane` of `None` means the equation is evaluated in 3D.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SolverConstraint {
    PointsDistance {
        value: f64,
        p1: EntityHandle,
        p2: EntityHandle,
        workplane: Option<EntityHandle>,
    },
    /// Signed inside a workplane, unsigned in 3D.
    PointLineDistance {
        value: f64,
        point: EntityHandle,
        line: EntityHandle,
        workplane: Option<EntityHandle>,
    },
    PointPlaneDistance {
        value: f64,
        point: EntityHandle,
        plane: EntityHandle,
    },
    PointsCoincident {
        p1: EntityHandle,
        p2: EntityHandle,
        workplane: Option<EntityHandle>,
    },
    PointInPlane {
        point: EntityHandle,
        plane: EntityHandle,
    },
    PointOnLine {
        point: EntityHandle,
        line: EntityHandle,
        workplane: Option<EntityHandle>,
    },
    PointOnCircle {
        point: EntityHandle,
        circle: EntityHandle,
    },
    /// Both points share the same workplane v coordinate.
    PointsHorizontal {
        p1: EntityHandle,
        p2: EntityHandle,
        workplane: EntityHandle,
    },
    /// Both points share the same workplane u coordinate.
    PointsVertical {
        p1: EntityHandle,
        p2: EntityHandle,
        workplane: EntityHandle,
    },
    LineHorizontal {
        line: EntityHandle,
        workplane: EntityHandle,
    },
    LineVertical {
        line: EntityHandle,
        workplane: EntityHandle,
    },
    EqualLength {
        l1: EntityHandle,
        l2: EntityHandle,
        workplane: Option<EntityHandle>,
    },
    EqualRadius {
        c1: EntityHandle,
        c2: EntityHandle,
    },
    EqualLineArcLength {
        line: EntityHandle,
        arc: EntityHandle,
        workplane: Option<EntityHandle>,
    },
    Parallel {
        l1: EntityHandle,
        l2: EntityHandle,
        workplane: Option<EntityHandle>,
    },
    Perpendicular {
        l1: EntityHandle,
        l2: EntityHandle,
        workplane: Option<EntityHandle>,
    },
    /// Angle between two line directions; `supplementary` measures
    /// `180 - degrees` instead.
    Angle {
        degrees: f64,
        supplementary: bool,
        l1: EntityHandle,
        l2: EntityHandle,
        workplane: Option<EntityHandle>,
    },
    Diameter {
        value: f64,
        circle: EntityHandle,
    },
    Midpoint {
        point: EntityHandle,
        line: EntityHandle,
        workplane: Option<EntityHandle>,
    },
    /// `length(l1) = value * length(l2)`.
    LengthRatio {
        value: f64,
        l1: EntityHandle,
        l2: EntityHandle,
        workplane: Option<EntityHandle>,
    },
    SymmetricLine {
        p1: EntityHandle,
        p2: EntityHandle,
        line: EntityHandle,
        workplane: EntityHandle,
    },
    SymmetricPlane {
        p1: EntityHandle,
        p2: EntityHandle,
        plane: EntityHandle,
    },
}

impl SolverConstraint {
    pub fn name(&self) -> &'static str {
        match self {
            SolverConstraint::PointsDistance { .. } => "points distance",
            SolverConstraint::PointLineDistance { .. } => "point-line distance",
            SolverConstraint::PointPlaneDistance { .. } => "point-plane distance",
            SolverConstraint::PointsCoincident { .. } => "points coincident",
            SolverConstraint::PointInPlane { .. } => "point in plane",
            SolverConstraint::PointOnLine { .. } => "point on line",
            SolverConstraint::PointOnCircle { .. } => "point on circle",
            SolverConstraint::PointsHorizontal { .. } => "points horizontal",
            SolverConstraint::PointsVertical { .. } => "points vertical",
            SolverConstraint::LineHorizontal { .. } => "line horizontal",
            SolverConstraint::LineVertical { .. } => "line vertical",
            SolverConstraint::EqualLength { .. } => "equal length",
            SolverConstraint::EqualRadius { .. } => "equal radius",
            SolverConstraint::EqualLineArcLength { .. } => "equal line-arc length",
            SolverConstraint::Parallel { .. } => "parallel",
            SolverConstraint::Perpendicular { .. } => "perpendicular",
            SolverConstraint::Angle { .. } => "angle",
            SolverConstraint::Diameter { .. } => "diameter",
            SolverConstraint::Midpoint { .. } => "midpoint",
            SolverConstraint::LengthRatio { .. } => "length ratio",
            SolverConstraint::SymmetricLine { .. } => "symmetric line",
            SolverConstraint::SymmetricPlane { .. } => "symmetric plane",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailReason {
    Inconsistent,
    DidntConverge,
    TooManyUnknowns,
}

/// Result of a solve pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SolveOutcome {
    /// All equations satisfied; parameters hold the solution.
    Okay { dof: u32 },
    /// Parameters keep their pre-solve values.
    Failed {
        reason: FailReason,
        failed: Vec<ConstraintHandle>,
    },
}

impl SolveOutcome {
    pub fn is_okay(&self) -> bool {
        matches!(self, SolveOutcome::Okay { .. })
    }
}

/// Errors raised while registering elements with a backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    #[error("unknown parameter handle {0:?}")]
    UnknownParam(ParamHandle),

    #[error("unknown entity handle {0:?}")]
    UnknownEntity(EntityHandle),

    #[error("entity handle {handle:?} is not a {expected}")]
    WrongEntity {
        handle: EntityHandle,
        expected: &'static str,
    },

    #[error("solver backend error: {reason}")]
    Backend { reason: String },
}

/// Operations a numeric solver must offer to the sketch core.
///
/// Every registration carries an explicit [`Group`]; there is no ambient
/// default group.
pub trait SolverBackend {
    fn add_param(&mut self, value: f64, group: Group) -> ParamHandle;

    /// A point in workplane coordinates.
    fn add_point_2d(
        &mut self,
        workplane: EntityHandle,
        u: ParamHandle,
        v: ParamHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError>;

    fn add_point_3d(
        &mut self,
        x: ParamHandle,
        y: ParamHandle,
        z: ParamHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError>;

    /// A 3D orientation given as quaternion parameters `(w, x, y, z)`.
    fn add_normal_3d(&mut self, quaternion: [ParamHandle; 4], group: Group)
        -> Result<EntityHandle, SolverError>;

    /// The normal of an existing workplane, used by circles and arcs drawn on it.
    fn add_normal_2d(&mut self, workplane: EntityHandle, group: Group)
        -> Result<EntityHandle, SolverError>;

    fn add_distance(&mut self, value: ParamHandle, group: Group)
        -> Result<EntityHandle, SolverError>;

    fn add_line(
        &mut self,
        p1: EntityHandle,
        p2: EntityHandle,
        workplane: Option<EntityHandle>,
        group: Group,
    ) -> Result<EntityHandle, SolverError>;

    /// A circle around a workplane point; `radius` is a distance entity.
    fn add_circle(
        &mut self,
        normal: EntityHandle,
        center: EntityHandle,
        radius: EntityHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError>;

    /// Counter-clockwise arc from `start` to `end` around `center`.
    fn add_arc(
        &mut self,
        workplane: EntityHandle,
        center: EntityHandle,
        start: EntityHandle,
        end: EntityHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError>;

    fn add_workplane(
        &mut self,
        origin: EntityHandle,
        normal: EntityHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError>;

    fn add_constraint(
        &mut self,
        constraint: SolverConstraint,
        group: Group,
    ) -> Result<ConstraintHandle, SolverError>;

    /// Solves every equation of `group`, moving only parameters of `group`.
    fn solve(&mut self, group: Group) -> SolveOutcome;

    fn param_value(&self, param: ParamHandle) -> Result<f64, SolverError>;

    fn add_points_distance(
        &mut self,
        value: f64,
        p1: EntityHandle,
        p2: EntityHandle,
        workplane: Option<EntityHandle>,
        group: Group,
    ) -> Result<ConstraintHandle, SolverError> {
        self.add_constraint(
            SolverConstraint::PointsDistance {
                value,
                p1,
                p2,
                workplane,
            },
            group,
        )
    }

    fn add_point_line_distance(
        &mut self,
        value: f64,
        point: EntityHandle,
        line: EntityHandle,
        workplane: Option<EntityHandle>,
        group: Group,
    ) -> Result<ConstraintHandle, SolverError> {
        self.add_constraint(
            SolverConstraint::PointLineDistance {
                value,
                point,
                line,
                workplane,
            },
            group,
        )
    }

    fn add_point_plane_distance(
        &mut self,
        value: f64,
        point: EntityHandle,
        plane: EntityHandle,
        group: Group,
    ) -> Result<ConstraintHandle, SolverError> {
        self.add_constraint(
            SolverConstraint::PointPlaneDistance {
                value,
                point,
                plane,
            },
            group,
        )
    }

    fn add_points_horizontal(
        &mut self,
        p1: EntityHandle,
        p2: EntityHandle,
        workplane: EntityHandle,
        group: Group,
    ) -> Result<ConstraintHandle, SolverError> {
        self.add_constraint(SolverConstraint::PointsHorizontal { p1, p2, workplane }, group)
    }

    fn add_points_vertical(
        &mut self,
        p1: EntityHandle,
        p2: EntityHandle,
        workplane: EntityHandle,
        group: Group,
    ) -> Result<ConstraintHandle, SolverError> {
        self.add_constraint(SolverConstraint::PointsVertical { p1, p2, workplane }, group)
    }
}
