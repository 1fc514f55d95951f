use std::f64::consts::TAU;

use nalgebra::{DMatrix, DVector, Quaternion, UnitQuaternion, Vector2, Vector3};
use tracing::{debug, instrument, warn};

use super::{
    ConstraintHandle, EntityHandle, FailReason, Group, ParamHandle, SolveOutcome, SolverBackend,
    SolverConstraint, SolverError,
};
use crate::config::SolverConfig;
use crate::geometry::range_2pi;

const FD_STEP: f64 = 1e-7;
const MIN_LAMBDA: f64 = 1e-12;
const MAX_DAMPING_STEPS: usize = 12;

#[derive(Debug, Clone, Copy)]
enum Element {
    Point2d {
        workplane: EntityHandle,
        u: ParamHandle,
        v: ParamHandle,
    },
    Point3d {
        x: ParamHandle,
        y: ParamHandle,
        z: ParamHandle,
    },
    Normal3d {
        q: [ParamHandle; 4],
    },
    Normal2d {
        workplane: EntityHandle,
    },
    Distance {
        d: ParamHandle,
    },
    Line {
        p1: EntityHandle,
        p2: EntityHandle,
    },
    Circle {
        center: EntityHandle,
        radius: EntityHandle,
    },
    Arc {
        workplane: EntityHandle,
        center: EntityHandle,
        start: EntityHandle,
        end: EntityHandle,
    },
    Workplane {
        origin: EntityHandle,
        normal: EntityHandle,
    },
}

#[derive(Debug, Clone, Copy)]
struct Param {
    value: f64,
    group: Group,
}

/// Orthonormal frame of a workplane.
struct Frame {
    origin: Vector3<f64>,
    u: Vector3<f64>,
    v: Vector3<f64>,
    n: Vector3<f64>,
}

impl Frame {
    fn project(&self, p: &Vector3<f64>) -> Vector2<f64> {
        let d = p - self.origin;
        Vector2::new(d.dot(&self.u), d.dot(&self.v))
    }

    fn lift(&self, u: f64, v: f64) -> Vector3<f64> {
        self.origin + self.u * u + self.v * v
    }
}

/// Pure-Rust solver: damped Gauss-Newton (Levenberg-Marquardt) over
/// finite-difference Jacobians.
///
/// Workplane-scoped equations are evaluated on coordinates projected into
/// the workplane (embedded with z = 0), 3D equations on world coordinates.
#[derive(Debug, Clone, Default)]
pub struct NumericSolver {
    config: SolverConfig,
    params: Vec<Param>,
    elements: Vec<Element>,
    constraints: Vec<(SolverConstraint, Group)>,
}

impl NumericSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn push_element(&mut self, element: Element) -> EntityHandle {
        self.elements.push(element);
        EntityHandle(self.elements.len() as u32 - 1)
    }

    fn element(&self, handle: EntityHandle) -> Result<Element, SolverError> {
        self.elements
            .get(handle.0 as usize)
            .copied()
            .ok_or(SolverError::UnknownEntity(handle))
    }

    fn check_param(&self, param: ParamHandle) -> Result<(), SolverError> {
        self.param_value(param).map(|_| ())
    }

    fn expect_point(&self, handle: EntityHandle) -> Result<(), SolverError> {
        match self.element(handle)? {
            Element::Point2d { .. } | Element::Point3d { .. } => Ok(()),
            _ => Err(SolverError::WrongEntity {
                handle,
                expected: "point",
            }),
        }
    }

    fn expect_workplane(&self, handle: EntityHandle) -> Result<(), SolverError> {
        match self.element(handle)? {
            Element::Workplane { .. } => Ok(()),
            _ => Err(SolverError::WrongEntity {
                handle,
                expected: "workplane",
            }),
        }
    }

    fn expect_normal(&self, handle: EntityHandle) -> Result<(), SolverError> {
        match self.element(handle)? {
            Element::Normal3d { .. } | Element::Normal2d { .. } => Ok(()),
            _ => Err(SolverError::WrongEntity {
                handle,
                expected: "normal",
            }),
        }
    }

    /// Residuals of every equation in `group` at parameter values `x`, with
    /// the index of the constraint each row belongs to (`None` for implicit
    /// normalization rows).
    fn residuals(
        &self,
        x: &[f64],
        group: Group,
    ) -> Result<(Vec<f64>, Vec<Option<usize>>), SolverError> {
        let eval = Eval { solver: self, x };
        let mut rows = Vec::new();
        let mut owners = Vec::new();
        for (index, (constraint, constraint_group)) in self.constraints.iter().enumerate() {
            if *constraint_group != group {
                continue;
            }
            let before = rows.len();
            eval.constraint(constraint, &mut rows)?;
            owners.resize(owners.len() + rows.len() - before, Some(index));
        }
        for element in &self.elements {
            if let Element::Normal3d { q } = element {
                if q.iter().all(|p| self.params[p.0 as usize].group == group) {
                    let norm_sq: f64 = q.iter().map(|p| x[p.0 as usize].powi(2)).sum();
                    rows.push(norm_sq - 1.0);
                    owners.push(None);
                }
            }
        }
        Ok((rows, owners))
    }

    fn jacobian(&self, x: &[f64], rows: usize, unknowns: &[usize], group: Group) -> Option<DMatrix<f64>> {
        let mut jac = DMatrix::zeros(rows, unknowns.len());
        let mut probe = x.to_vec();
        for (col, &i) in unknowns.iter().enumerate() {
            let h = FD_STEP * (1.0 + x[i].abs());
            probe[i] = x[i] + h;
            let plus = self.residuals(&probe, group).ok()?.0;
            probe[i] = x[i] - h;
            let minus = self.residuals(&probe, group).ok()?.0;
            probe[i] = x[i];
            for row in 0..rows {
                jac[(row, col)] = (plus[row] - minus[row]) / (2.0 * h);
            }
        }
        Some(jac)
    }

    /// One damped step. Returns false once no damping level reduces the cost.
    fn step(
        &self,
        x: &mut Vec<f64>,
        r: &mut Vec<f64>,
        unknowns: &[usize],
        group: Group,
        lambda: &mut f64,
    ) -> bool {
        let Some(jac) = self.jacobian(x, r.len(), unknowns, group) else {
            return false;
        };
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let gradient = &jt * DVector::from_column_slice(r);
        let cost = sum_sq(r);

        for _ in 0..MAX_DAMPING_STEPS {
            let mut lhs = jtj.clone();
            for i in 0..lhs.nrows() {
                lhs[(i, i)] += *lambda * (1.0 + jtj[(i, i)]);
            }
            if let Some(delta) = lhs.lu().solve(&(-&gradient)) {
                let mut trial = x.clone();
                for (k, &i) in unknowns.iter().enumerate() {
                    trial[i] += delta[k];
                }
                if let Ok((trial_r, _)) = self.residuals(&trial, group) {
                    if sum_sq(&trial_r) < cost {
                        *x = trial;
                        *r = trial_r;
                        *lambda = (*lambda / self.config.lambda_factor).max(MIN_LAMBDA);
                        return true;
                    }
                }
            }
            *lambda *= self.config.lambda_factor;
        }
        false
    }

    fn rank(&self, x: &[f64], rows: usize, unknowns: &[usize], group: Group) -> usize {
        if rows == 0 || unknowns.is_empty() {
            return 0;
        }
        let Some(jac) = self.jacobian(x, rows, unknowns, group) else {
            return 0;
        };
        let svd = jac.svd(false, false);
        let largest = svd.singular_values.max().max(1.0);
        svd.rank(self.config.rank_tolerance * largest)
    }
}

impl SolverBackend for NumericSolver {
    fn add_param(&mut self, value: f64, group: Group) -> ParamHandle {
        self.params.push(Param { value, group });
        ParamHandle(self.params.len() as u32 - 1)
    }

    fn add_point_2d(
        &mut self,
        workplane: EntityHandle,
        u: ParamHandle,
        v: ParamHandle,
        _group: Group,
    ) -> Result<EntityHandle, SolverError> {
        self.expect_workplane(workplane)?;
        self.check_param(u)?;
        self.check_param(v)?;
        Ok(self.push_element(Element::Point2d { workplane, u, v }))
    }

    fn add_point_3d(
        &mut self,
        x: ParamHandle,
        y: ParamHandle,
        z: ParamHandle,
        _group: Group,
    ) -> Result<EntityHandle, SolverError> {
        for p in [x, y, z] {
            self.check_param(p)?;
        }
        Ok(self.push_element(Element::Point3d { x, y, z }))
    }

    fn add_normal_3d(
        &mut self,
        quaternion: [ParamHandle; 4],
        _group: Group,
    ) -> Result<EntityHandle, SolverError> {
        for p in quaternion {
            self.check_param(p)?;
        }
        Ok(self.push_element(Element::Normal3d { q: quaternion }))
    }

    fn add_normal_2d(
        &mut self,
        workplane: EntityHandle,
        _group: Group,
    ) -> Result<EntityHandle, SolverError> {
        self.expect_workplane(workplane)?;
        Ok(self.push_element(Element::Normal2d { workplane }))
    }

    fn add_distance(&mut self, value: ParamHandle, _group: Group) -> Result<EntityHandle, SolverError> {
        self.check_param(value)?;
        Ok(self.push_element(Element::Distance { d: value }))
    }

    fn add_line(
        &mut self,
        p1: EntityHandle,
        p2: EntityHandle,
        workplane: Option<EntityHandle>,
        _group: Group,
    ) -> Result<EntityHandle, SolverError> {
        self.expect_point(p1)?;
        self.expect_point(p2)?;
        if let Some(wp) = workplane {
            self.expect_workplane(wp)?;
        }
        Ok(self.push_element(Element::Line { p1, p2 }))
    }

    fn add_circle(
        &mut self,
        normal: EntityHandle,
        center: EntityHandle,
        radius: EntityHandle,
        _group: Group,
    ) -> Result<EntityHandle, SolverError> {
        self.expect_normal(normal)?;
        self.expect_point(center)?;
        match self.element(radius)? {
            Element::Distance { .. } => {}
            _ => {
                return Err(SolverError::WrongEntity {
                    handle: radius,
                    expected: "distance",
                })
            }
        }
        Ok(self.push_element(Element::Circle { center, radius }))
    }

    fn add_arc(
        &mut self,
        workplane: EntityHandle,
        center: EntityHandle,
        start: EntityHandle,
        end: EntityHandle,
        _group: Group,
    ) -> Result<EntityHandle, SolverError> {
        self.expect_workplane(workplane)?;
        for p in [center, start, end] {
            self.expect_point(p)?;
        }
        Ok(self.push_element(Element::Arc {
            workplane,
            center,
            start,
            end,
        }))
    }

    fn add_workplane(
        &mut self,
        origin: EntityHandle,
        normal: EntityHandle,
        _group: Group,
    ) -> Result<EntityHandle, SolverError> {
        self.expect_point(origin)?;
        self.expect_normal(normal)?;
        Ok(self.push_element(Element::Workplane { origin, normal }))
    }

    fn add_constraint(
        &mut self,
        constraint: SolverConstraint,
        group: Group,
    ) -> Result<ConstraintHandle, SolverError> {
        // Evaluating once resolves every handle the equation refers to.
        let x: Vec<f64> = self.params.iter().map(|p| p.value).collect();
        Eval { solver: self, x: &x }.constraint(&constraint, &mut Vec::new())?;
        self.constraints.push((constraint, group));
        Ok(ConstraintHandle(self.constraints.len() as u32 - 1))
    }

    #[instrument(skip(self), fields(params = self.params.len(), constraints = self.constraints.len()))]
    fn solve(&mut self, group: Group) -> SolveOutcome {
        let unknowns: Vec<usize> = self
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.group == group)
            .map(|(i, _)| i)
            .collect();
        if unknowns.len() > self.config.max_unknowns {
            warn!(unknowns = unknowns.len(), "too many unknowns");
            return SolveOutcome::Failed {
                reason: FailReason::TooManyUnknowns,
                failed: Vec::new(),
            };
        }

        let mut x: Vec<f64> = self.params.iter().map(|p| p.value).collect();
        let (mut r, owners) = match self.residuals(&x, group) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(%err, "cannot evaluate system");
                return SolveOutcome::Failed {
                    reason: FailReason::DidntConverge,
                    failed: Vec::new(),
                };
            }
        };

        let tolerance = self.config.tolerance;
        if max_abs(&r).is_infinite() {
            let failed = failing(&r, &owners, tolerance);
            warn!(failed = failed.len(), "non-finite residual");
            return SolveOutcome::Failed {
                reason: FailReason::DidntConverge,
                failed,
            };
        }

        let mut lambda = self.config.lambda_initial;
        let mut iterations = 0;
        while max_abs(&r) > tolerance && iterations < self.config.max_iterations {
            iterations += 1;
            if unknowns.is_empty() || !self.step(&mut x, &mut r, &unknowns, group, &mut lambda) {
                break;
            }
        }

        let rank = self.rank(&x, r.len(), &unknowns, group);
        let residual = max_abs(&r);
        if residual <= tolerance {
            for &i in &unknowns {
                self.params[i].value = x[i];
            }
            let dof = (unknowns.len() - rank.min(unknowns.len())) as u32;
            debug!(iterations, dof, "solved");
            return SolveOutcome::Okay { dof };
        }

        let failed = failing(&r, &owners, tolerance);
        let reason = if rank < r.len() {
            FailReason::Inconsistent
        } else {
            FailReason::DidntConverge
        };
        warn!(iterations, residual, ?reason, failed = failed.len(), "solve failed");
        SolveOutcome::Failed { reason, failed }
    }

    fn param_value(&self, param: ParamHandle) -> Result<f64, SolverError> {
        self.params
            .get(param.0 as usize)
            .map(|p| p.value)
            .ok_or(SolverError::UnknownParam(param))
    }
}

/// Owners of residual rows outside the tolerance, non-finite rows included.
fn failing(r: &[f64], owners: &[Option<usize>], tolerance: f64) -> Vec<ConstraintHandle> {
    let mut failed: Vec<ConstraintHandle> = r
        .iter()
        .zip(owners)
        .filter(|(value, _)| !value.is_finite() || value.abs() > tolerance)
        .filter_map(|(_, owner)| owner.map(|i| ConstraintHandle(i as u32)))
        .collect();
    failed.dedup();
    failed
}

fn sum_sq(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}

/// Largest residual magnitude; infinite as soon as any residual is not finite.
fn max_abs(values: &[f64]) -> f64 {
    values
        .iter()
        .try_fold(0.0_f64, |acc, v| v.is_finite().then(|| acc.max(v.abs())))
        .unwrap_or(f64::INFINITY)
}

/// z component of the cross product, for vectors embedded in a workplane.
fn cross_z(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

fn normalized(v: Vector3<f64>) -> Vector3<f64> {
    let len = v.norm();
    if len == 0.0 {
        v
    } else {
        v / len
    }
}

/// Evaluates geometry at a given parameter vector.
struct Eval<'a> {
    solver: &'a NumericSolver,
    x: &'a [f64],
}

impl Eval<'_> {
    fn param(&self, param: ParamHandle) -> Result<f64, SolverError> {
        self.x
            .get(param.0 as usize)
            .copied()
            .ok_or(SolverError::UnknownParam(param))
    }

    fn orientation(&self, normal: EntityHandle) -> Result<UnitQuaternion<f64>, SolverError> {
        match self.solver.element(normal)? {
            Element::Normal3d { q } => {
                let quat = Quaternion::new(
                    self.param(q[0])?,
                    self.param(q[1])?,
                    self.param(q[2])?,
                    self.param(q[3])?,
                );
                if quat.norm() == 0.0 {
                    Ok(UnitQuaternion::identity())
                } else {
                    Ok(UnitQuaternion::from_quaternion(quat))
                }
            }
            Element::Normal2d { workplane } => match self.solver.element(workplane)? {
                Element::Workplane { normal, .. } => self.orientation(normal),
                _ => Err(SolverError::WrongEntity {
                    handle: workplane,
                    expected: "workplane",
                }),
            },
            _ => Err(SolverError::WrongEntity {
                handle: normal,
                expected: "normal",
            }),
        }
    }

    fn frame(&self, workplane: EntityHandle) -> Result<Frame, SolverError> {
        match self.solver.element(workplane)? {
            Element::Workplane { origin, normal } => {
                let rot = self.orientation(normal)?;
                Ok(Frame {
                    origin: self.point3(origin)?,
                    u: rot * Vector3::x(),
                    v: rot * Vector3::y(),
                    n: rot * Vector3::z(),
                })
            }
            _ => Err(SolverError::WrongEntity {
                handle: workplane,
                expected: "workplane",
            }),
        }
    }

    fn point3(&self, point: EntityHandle) -> Result<Vector3<f64>, SolverError> {
        match self.solver.element(point)? {
            Element::Point3d { x, y, z } => {
                Ok(Vector3::new(self.param(x)?, self.param(y)?, self.param(z)?))
            }
            Element::Point2d { workplane, u, v } => {
                Ok(self.frame(workplane)?.lift(self.param(u)?, self.param(v)?))
            }
            _ => Err(SolverError::WrongEntity {
                handle: point,
                expected: "point",
            }),
        }
    }

    /// Point position in workplane coordinates (z = 0), or in world
    /// coordinates when no workplane is given.
    fn pos(&self, point: EntityHandle, workplane: Option<EntityHandle>) -> Result<Vector3<f64>, SolverError> {
        let Some(wp) = workplane else {
            return self.point3(point);
        };
        if let Element::Point2d { workplane: own, u, v } = self.solver.element(point)? {
            if own == wp {
                return Ok(Vector3::new(self.param(u)?, self.param(v)?, 0.0));
            }
        }
        let co = self.frame(wp)?.project(&self.point3(point)?);
        Ok(Vector3::new(co.x, co.y, 0.0))
    }

    fn line(
        &self,
        line: EntityHandle,
        workplane: Option<EntityHandle>,
    ) -> Result<(Vector3<f64>, Vector3<f64>), SolverError> {
        match self.solver.element(line)? {
            Element::Line { p1, p2 } => Ok((self.pos(p1, workplane)?, self.pos(p2, workplane)?)),
            _ => Err(SolverError::WrongEntity {
                handle: line,
                expected: "line",
            }),
        }
    }

    fn direction(&self, line: EntityHandle, workplane: Option<EntityHandle>) -> Result<Vector3<f64>, SolverError> {
        let (a, b) = self.line(line, workplane)?;
        Ok(normalized(b - a))
    }

    fn length(&self, line: EntityHandle, workplane: Option<EntityHandle>) -> Result<f64, SolverError> {
        let (a, b) = self.line(line, workplane)?;
        Ok((b - a).norm())
    }

    /// Center handle and radius of a circle or arc.
    fn curve(&self, curve: EntityHandle) -> Result<(EntityHandle, f64), SolverError> {
        match self.solver.element(curve)? {
            Element::Circle { center, radius } => match self.solver.element(radius)? {
                Element::Distance { d } => Ok((center, self.param(d)?)),
                _ => Err(SolverError::WrongEntity {
                    handle: radius,
                    expected: "distance",
                }),
            },
            Element::Arc {
                workplane,
                center,
                start,
                ..
            } => {
                let c = self.pos(center, Some(workplane))?;
                let s = self.pos(start, Some(workplane))?;
                Ok((center, (s - c).norm()))
            }
            _ => Err(SolverError::WrongEntity {
                handle: curve,
                expected: "circle or arc",
            }),
        }
    }

    fn arc_length(&self, arc: EntityHandle) -> Result<f64, SolverError> {
        match self.solver.element(arc)? {
            Element::Arc {
                workplane,
                center,
                start,
                end,
            } => {
                let c = self.pos(center, Some(workplane))?;
                let s = self.pos(start, Some(workplane))? - c;
                let e = self.pos(end, Some(workplane))? - c;
                let mut sweep = range_2pi(e.y.atan2(e.x) - s.y.atan2(s.x));
                if sweep == 0.0 {
                    sweep = TAU;
                }
                Ok(s.norm() * sweep)
            }
            _ => Err(SolverError::WrongEntity {
                handle: arc,
                expected: "arc",
            }),
        }
    }

    /// Workplane a point-on-curve equation is evaluated in: the plane of a
    /// sketch-bound center, 3D otherwise.
    fn curve_plane(&self, center: EntityHandle) -> Result<Option<EntityHandle>, SolverError> {
        Ok(match self.solver.element(center)? {
            Element::Point2d { workplane, .. } => Some(workplane),
            _ => None,
        })
    }

    fn push_vector(rows: &mut Vec<f64>, v: Vector3<f64>, planar: bool) {
        rows.push(v.x);
        rows.push(v.y);
        if !planar {
            rows.push(v.z);
        }
    }

    fn constraint(&self, constraint: &SolverConstraint, rows: &mut Vec<f64>) -> Result<(), SolverError> {
        match *constraint {
            SolverConstraint::PointsDistance {
                value,
                p1,
                p2,
                workplane,
            } => {
                rows.push((self.pos(p1, workplane)? - self.pos(p2, workplane)?).norm() - value);
            }
            SolverConstraint::PointLineDistance {
                value,
                point,
                line,
                workplane,
            } => {
                let (a, b) = self.line(line, workplane)?;
                let p = self.pos(point, workplane)?;
                let d = b - a;
                let len = d.norm();
                let dist = if len == 0.0 {
                    (p - a).norm()
                } else if workplane.is_some() {
                    -cross_z(&d, &(p - a)) / len
                } else {
                    d.cross(&(p - a)).norm() / len
                };
                rows.push(dist - value);
            }
            SolverConstraint::PointPlaneDistance { value, point, plane } => {
                let frame = self.frame(plane)?;
                rows.push((self.point3(point)? - frame.origin).dot(&frame.n) - value);
            }
            SolverConstraint::PointsCoincident { p1, p2, workplane } => {
                let diff = self.pos(p1, workplane)? - self.pos(p2, workplane)?;
                Self::push_vector(rows, diff, workplane.is_some());
            }
            SolverConstraint::PointInPlane { point, plane } => {
                let frame = self.frame(plane)?;
                rows.push((self.point3(point)? - frame.origin).dot(&frame.n));
            }
            SolverConstraint::PointOnLine {
                point,
                line,
                workplane,
            } => {
                let (a, b) = self.line(line, workplane)?;
                let p = self.pos(point, workplane)?;
                let d = normalized(b - a);
                if workplane.is_some() {
                    rows.push(cross_z(&d, &(p - a)));
                } else {
                    Self::push_vector(rows, d.cross(&(p - a)), false);
                }
            }
            SolverConstraint::PointOnCircle { point, circle } => {
                let (center, radius) = self.curve(circle)?;
                let plane = self.curve_plane(center)?;
                rows.push((self.pos(point, plane)? - self.pos(center, plane)?).norm() - radius);
            }
            SolverConstraint::PointsHorizontal { p1, p2, workplane } => {
                rows.push(self.pos(p1, Some(workplane))?.y - self.pos(p2, Some(workplane))?.y);
            }
            SolverConstraint::PointsVertical { p1, p2, workplane } => {
                rows.push(self.pos(p1, Some(workplane))?.x - self.pos(p2, Some(workplane))?.x);
            }
            SolverConstraint::LineHorizontal { line, workplane } => {
                let (a, b) = self.line(line, Some(workplane))?;
                rows.push(a.y - b.y);
            }
            SolverConstraint::LineVertical { line, workplane } => {
                let (a, b) = self.line(line, Some(workplane))?;
                rows.push(a.x - b.x);
            }
            SolverConstraint::EqualLength { l1, l2, workplane } => {
                rows.push(self.length(l1, workplane)? - self.length(l2, workplane)?);
            }
            SolverConstraint::EqualRadius { c1, c2 } => {
                rows.push(self.curve(c1)?.1 - self.curve(c2)?.1);
            }
            SolverConstraint::EqualLineArcLength {
                line,
                arc,
                workplane,
            } => {
                rows.push(self.length(line, workplane)? - self.arc_length(arc)?);
            }
            SolverConstraint::Parallel { l1, l2, workplane } => {
                let d1 = self.direction(l1, workplane)?;
                let d2 = self.direction(l2, workplane)?;
                if workplane.is_some() {
                    rows.push(cross_z(&d1, &d2));
                } else {
                    Self::push_vector(rows, d1.cross(&d2), false);
                }
            }
            SolverConstraint::Perpendicular { l1, l2, workplane } => {
                let d1 = self.direction(l1, workplane)?;
                let d2 = self.direction(l2, workplane)?;
                rows.push(d1.dot(&d2));
            }
            SolverConstraint::Angle {
                degrees,
                supplementary,
                l1,
                l2,
                workplane,
            } => {
                let d1 = self.direction(l1, workplane)?;
                let d2 = self.direction(l2, workplane)?;
                let sign = if supplementary { -1.0 } else { 1.0 };
                rows.push(sign * d1.dot(&d2) - degrees.to_radians().cos());
            }
            SolverConstraint::Diameter { value, circle } => {
                rows.push(2.0 * self.curve(circle)?.1 - value);
            }
            SolverConstraint::Midpoint {
                point,
                line,
                workplane,
            } => {
                let (a, b) = self.line(line, workplane)?;
                let p = self.pos(point, workplane)?;
                Self::push_vector(rows, p - (a + b) / 2.0, workplane.is_some());
            }
            SolverConstraint::LengthRatio {
                value,
                l1,
                l2,
                workplane,
            } => {
                rows.push(self.length(l1, workplane)? - value * self.length(l2, workplane)?);
            }
            SolverConstraint::SymmetricLine {
                p1,
                p2,
                line,
                workplane,
            } => {
                let (a, b) = self.line(line, Some(workplane))?;
                let d = normalized(b - a);
                let q1 = self.pos(p1, Some(workplane))?;
                let q2 = self.pos(p2, Some(workplane))?;
                rows.push(cross_z(&d, &((q1 + q2) / 2.0 - a)));
                rows.push((q2 - q1).dot(&d));
            }
            SolverConstraint::SymmetricPlane { p1, p2, plane } => {
                let frame = self.frame(plane)?;
                let q1 = self.point3(p1)?;
                let q2 = self.point3(p2)?;
                rows.push(((q1 + q2) / 2.0 - frame.origin).dot(&frame.n));
                let span = q2 - q1;
                Self::push_vector(rows, span - frame.n * span.dot(&frame.n), false);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn xy_plane(solver: &mut NumericSolver) -> EntityHandle {
        let g = Group::FIXED;
        let o = [0.0, 0.0, 0.0].map(|v| solver.add_param(v, g));
        let origin = solver.add_point_3d(o[0], o[1], o[2], g).unwrap();
        let q = [1.0, 0.0, 0.0, 0.0].map(|v| solver.add_param(v, g));
        let normal = solver.add_normal_3d(q, g).unwrap();
        solver.add_workplane(origin, normal, g).unwrap()
    }

    fn point(solver: &mut NumericSolver, wp: EntityHandle, u: f64, v: f64, g: Group) -> (EntityHandle, ParamHandle, ParamHandle) {
        let pu = solver.add_param(u, g);
        let pv = solver.add_param(v, g);
        (solver.add_point_2d(wp, pu, pv, g).unwrap(), pu, pv)
    }

    #[test]
    fn solves_distance_from_fixed_point() {
        let mut solver = NumericSolver::default();
        let wp = xy_plane(&mut solver);
        let (a, ..) = point(&mut solver, wp, 0.0, 0.0, Group::FIXED);
        let (b, bu, bv) = point(&mut solver, wp, 3.0, 4.0, Group::ACTIVE);
        solver
            .add_points_distance(10.0, a, b, Some(wp), Group::ACTIVE)
            .unwrap();
        solver
            .add_points_horizontal(a, b, wp, Group::ACTIVE)
            .unwrap();

        let outcome = solver.solve(Group::ACTIVE);
        assert_eq!(outcome, SolveOutcome::Okay { dof: 0 });
        assert_relative_eq!(solver.param_value(bu).unwrap(), 10.0, epsilon = 1e-6);
        assert_relative_eq!(solver.param_value(bv).unwrap(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn non_finite_residual_does_not_converge() {
        let mut solver = NumericSolver::default();
        let wp = xy_plane(&mut solver);
        let (a, ..) = point(&mut solver, wp, 0.0, 0.0, Group::FIXED);
        let (b, bu, _) = point(&mut solver, wp, 3.0, 4.0, Group::ACTIVE);
        let c = solver
            .add_points_distance(f64::NAN, a, b, Some(wp), Group::ACTIVE)
            .unwrap();

        match solver.solve(Group::ACTIVE) {
            SolveOutcome::Failed { reason, failed } => {
                assert_eq!(reason, FailReason::DidntConverge);
                assert_eq!(failed, vec![c]);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(solver.param_value(bu).unwrap(), 3.0);
    }

    #[test]
    fn max_abs_is_infinite_for_nan() {
        assert_eq!(max_abs(&[0.5, -2.0]), 2.0);
        assert_eq!(max_abs(&[0.0, f64::NAN]), f64::INFINITY);
        assert_eq!(max_abs(&[]), 0.0);
    }

    #[test]
    fn reports_remaining_freedom() {
        let mut solver = NumericSolver::default();
        let wp = xy_plane(&mut solver);
        let (a, ..) = point(&mut solver, wp, 0.0, 0.0, Group::FIXED);
        let (b, ..) = point(&mut solver, wp, 3.0, 4.0, Group::ACTIVE);
        solver
            .add_points_distance(5.0, a, b, Some(wp), Group::ACTIVE)
            .unwrap();
        assert_eq!(solver.solve(Group::ACTIVE), SolveOutcome::Okay { dof: 1 });
    }

    #[test]
    fn contradicting_distances_are_inconsistent() {
        let mut solver = NumericSolver::default();
        let wp = xy_plane(&mut solver);
        let (a, ..) = point(&mut solver, wp, 0.0, 0.0, Group::FIXED);
        let (b, bu, _) = point(&mut solver, wp, 3.0, 4.0, Group::ACTIVE);
        let c1 = solver
            .add_points_distance(5.0, a, b, Some(wp), Group::ACTIVE)
            .unwrap();
        let c2 = solver
            .add_points_distance(8.0, a, b, Some(wp), Group::ACTIVE)
            .unwrap();

        match solver.solve(Group::ACTIVE) {
            SolveOutcome::Failed { reason, failed } => {
                assert_eq!(reason, FailReason::Inconsistent);
                assert!(failed.contains(&c1) || failed.contains(&c2));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        // Parameters keep their pre-solve values.
        assert_eq!(solver.param_value(bu).unwrap(), 3.0);
    }

    #[test]
    fn signed_point_line_distance_picks_a_side() {
        let mut solver = NumericSolver::default();
        let wp = xy_plane(&mut solver);
        let (a, ..) = point(&mut solver, wp, 0.0, 0.0, Group::FIXED);
        let (b, ..) = point(&mut solver, wp, 10.0, 0.0, Group::FIXED);
        let line = solver.add_line(a, b, Some(wp), Group::FIXED).unwrap();
        let (p, pu, pv) = point(&mut solver, wp, 2.0, -1.0, Group::ACTIVE);
        solver
            .add_point_line_distance(3.0, p, line, Some(wp), Group::ACTIVE)
            .unwrap();
        solver
            .add_points_vertical(p, a, wp, Group::ACTIVE)
            .unwrap();

        assert!(solver.solve(Group::ACTIVE).is_okay());
        assert_relative_eq!(solver.param_value(pu).unwrap(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(solver.param_value(pv).unwrap(), -3.0, epsilon = 1e-6);
    }

    #[test]
    fn point_plane_distance_uses_plane_normal() {
        let mut solver = NumericSolver::default();
        let wp = xy_plane(&mut solver);
        let g = Group::ACTIVE;
        let [x, y, z] = [1.0, 1.0, 1.0].map(|v| solver.add_param(v, g));
        let p = solver.add_point_3d(x, y, z, g).unwrap();
        solver.add_point_plane_distance(-2.0, p, wp, g).unwrap();

        assert_eq!(solver.solve(g), SolveOutcome::Okay { dof: 2 });
        assert_relative_eq!(solver.param_value(z).unwrap(), -2.0, epsilon = 1e-6);
    }

    #[test]
    fn rejects_unknown_handles() {
        let mut solver = NumericSolver::default();
        let err = solver
            .add_points_distance(1.0, EntityHandle(7), EntityHandle(8), None, Group::ACTIVE)
            .unwrap_err();
        assert_eq!(err, SolverError::UnknownEntity(EntityHandle(7)));
    }

    #[test]
    fn too_many_unknowns() {
        let mut solver = NumericSolver::new(SolverConfig {
            max_unknowns: 1,
            ..SolverConfig::default()
        });
        solver.add_param(0.0, Group::ACTIVE);
        solver.add_param(0.0, Group::ACTIVE);
        assert_eq!(
            solver.solve(Group::ACTIVE),
            SolveOutcome::Failed {
                reason: FailReason::TooManyUnknowns,
                failed: Vec::new()
            }
        );
    }
}
