//! Verification oracles: pure functions returning pass/fail verdicts.
//!
//! Each oracle measures the stored geometry directly, independent of the
//! solver, and returns an `OracleVerdict` with diagnostic detail instead of
//! panicking. This lets a test collect all failures in one pass.

use std::f64::consts::TAU;

use nalgebra::Vector2;
use sketch_solver::constraint::{ConstraintKind, Distance};
use sketch_solver::geometry::{angle_signed, distance_point_to_plane, range_2pi, side_of_line};
use sketch_solver::{Constraint, EntityRef, SketchError, SketchStore};
use sketcher_types::{Alignment, ConstraintId, EntityData, SketchId};

/// The result of a single oracle check.
#[derive(Debug, Clone)]
pub struct OracleVerdict {
    pub oracle_name: String,
    pub passed: bool,
    pub detail: String,
    pub value: Option<f64>,
}

impl OracleVerdict {
    fn pass(name: &str, detail: String) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: true,
            detail,
            value: None,
        }
    }

    fn pass_val(name: &str, detail: String, value: f64) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: true,
            detail,
            value: Some(value),
        }
    }

    fn fail(name: &str, detail: String) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: false,
            detail,
            value: None,
        }
    }

    fn fail_val(name: &str, detail: String, value: f64) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: false,
            detail,
            value: Some(value),
        }
    }
}

// ── Constraint Oracles ──────────────────────────────────────────────────────

/// Check that the stored geometry satisfies one constraint within `tol`.
///
/// The verdict's value is the measured residual. Pairings the oracle has no
/// measurement for pass with a "not measured" detail.
pub fn check_constraint(store: &SketchStore, id: ConstraintId, tol: f64) -> OracleVerdict {
    let constraint = match store.constraint(id) {
        Ok(c) => c,
        Err(e) => return OracleVerdict::fail("constraint", format!("{id:?}: {e}")),
    };
    let name = constraint.kind.label();
    match residual(store, constraint) {
        Ok(Some(r)) if r <= tol => {
            OracleVerdict::pass_val(name, format!("{id:?} residual {r:.2e} <= {tol:.0e}"), r)
        }
        Ok(Some(r)) => OracleVerdict::fail_val(name, format!("{id:?} residual {r:.2e} > {tol:.0e}"), r),
        Ok(None) => OracleVerdict::pass(name, format!("{id:?} not measured")),
        Err(e) => OracleVerdict::fail(name, format!("{id:?}: {e}")),
    }
}

/// Run [`check_constraint`] over every constraint of a sketch, or of the
/// free 3D scope when `sketch` is `None`.
pub fn check_sketch(store: &SketchStore, sketch: Option<SketchId>, tol: f64) -> Vec<OracleVerdict> {
    store
        .constraints_in(sketch)
        .map(|(id, _)| check_constraint(store, id, tol))
        .collect()
}

/// Check that the sketch reports the expected degrees of freedom.
pub fn check_dof(store: &SketchStore, sketch: SketchId, expected: u32) -> OracleVerdict {
    match store.sketch(sketch).map(|s| s.dof) {
        Ok(Some(dof)) if dof == expected => {
            OracleVerdict::pass_val("dof", format!("{dof} degrees of freedom"), dof as f64)
        }
        Ok(Some(dof)) => OracleVerdict::fail_val(
            "dof",
            format!("expected {expected} degrees of freedom, got {dof}"),
            dof as f64,
        ),
        Ok(None) => OracleVerdict::fail("dof", "sketch has not been solved".to_string()),
        Err(e) => OracleVerdict::fail("dof", e.to_string()),
    }
}

// ── Measurements ────────────────────────────────────────────────────────────

fn residual(store: &SketchStore, constraint: &Constraint) -> Result<Option<f64>, SketchError> {
    let slots = constraint.slots(store)?;
    let e1 = slots.entity1;
    let e2 = slots.entity2;

    let r = match (&constraint.kind, e2) {
        (ConstraintKind::Distance(d), _) if e1.is_line() => {
            Some((e1.length()? - d.value()).abs())
        }
        (ConstraintKind::Distance(d), Some(e2)) => {
            let measured = if e1.is_curve() {
                point_distance(&e1.ct()?, &e2)? - e1.radius()?
            } else if Distance::use_align(&slots) && e1.is_2d() && e2.is_2d() {
                let delta = e2.co()? - e1.co()?;
                match d.align {
                    Alignment::Horizontal => delta.x.abs(),
                    Alignment::Vertical => delta.y.abs(),
                    Alignment::None => delta.norm(),
                }
            } else {
                point_distance(&e1, &e2)?
            };
            Some((measured - d.value()).abs())
        }
        (ConstraintKind::Angle(a), Some(e2)) => {
            let (d1, d2) = (e1.direction()?, e2.direction()?);
            let cos = (d1.dot(&d2) / (d1.norm() * d2.norm())).abs().clamp(0.0, 1.0);
            let acute = cos.acos().to_degrees();
            Some((acute - a.value().min(180.0 - a.value())).abs())
        }
        (ConstraintKind::Diameter(d), _) => Some((2.0 * e1.radius()? - d.diameter()).abs()),
        (ConstraintKind::Coincident(_), Some(e2)) => Some(point_distance(&e1, &e2)?.abs()),
        (ConstraintKind::Equal(_), Some(e2)) => Some((size(&e1)? - size(&e2)?).abs()),
        (ConstraintKind::Horizontal(_), _) => Some(axis_offset(&e1, e2.as_ref())?.y.abs()),
        (ConstraintKind::Vertical(_), _) => Some(axis_offset(&e1, e2.as_ref())?.x.abs()),
        (ConstraintKind::Parallel(_), Some(e2)) if e1.is_2d() => {
            let (d1, d2) = (e1.direction()?.normalize(), e2.direction()?.normalize());
            Some((d1.x * d2.y - d1.y * d2.x).abs())
        }
        (ConstraintKind::Perpendicular(_), Some(e2)) if e1.is_2d() => {
            let (d1, d2) = (e1.direction()?.normalize(), e2.direction()?.normalize());
            Some(d1.dot(&d2).abs())
        }
        (ConstraintKind::Midpoint(_), Some(e2)) if e1.is_2d() => {
            let mid = (e2.p1()?.co()? + e2.p2()?.co()?) / 2.0;
            Some((e1.co()? - mid).norm())
        }
        (ConstraintKind::Ratio(r), Some(e2)) => {
            Some((e1.length()? - r.value() * e2.length()?).abs())
        }
        (ConstraintKind::Symmetric(s), Some(e2)) if e1.is_2d() => {
            let axis = store.entity(s.axis)?;
            let (a, b) = (e1.co()?, e2.co()?);
            let (start, end) = (axis.p1()?.co()?, axis.p2()?.co()?);
            let dir = (end - start).normalize();
            let mid = (a + b) / 2.0;
            let off_axis = side_of_line(&start, &end, &mid).abs() / (end - start).norm();
            Some(off_axis.max((b - a).dot(&dir).abs()))
        }
        (ConstraintKind::Tangent(_), Some(e2)) => {
            let (c1, r1) = (e1.ct()?.co()?, e1.radius()?);
            if e2.is_line() {
                Some((point_distance(&e1.ct()?, &e2)? - r1).abs())
            } else {
                let (c2, r2) = (e2.ct()?.co()?, e2.radius()?);
                let d = (c2 - c1).norm();
                Some((d - (r1 + r2)).abs().min((d - (r1 - r2).abs()).abs()))
            }
        }
        _ => None,
    };
    Ok(r)
}

/// Unsigned distance from a point to a point, line, curve or workplane.
fn point_distance(point: &EntityRef<'_>, other: &EntityRef<'_>) -> Result<f64, SketchError> {
    if other.is_point() {
        return Ok((other.location()? - point.location()?).norm());
    }
    if other.is_workplane() {
        let origin = other.p1()?.location()?;
        return Ok(distance_point_to_plane(&point.location()?, &origin, &other.normal()?).abs());
    }
    if other.is_curve() {
        let center = other.ct()?.co()?;
        return Ok(((point.co()? - center).norm() - other.radius()?).abs());
    }
    if other.is_2d() {
        let (start, end) = (other.p1()?.co()?, other.p2()?.co()?);
        return Ok(side_of_line(&start, &end, &point.co()?).abs() / (end - start).norm());
    }
    let (start, end) = (other.p1()?.location()?, other.p2()?.location()?);
    let dir = (end - start).normalize();
    let rel = point.location()? - start;
    Ok((rel - dir * rel.dot(&dir)).norm())
}

/// Length of a line, radius of a circle, arc length of an arc.
fn size(entity: &EntityRef<'_>) -> Result<f64, SketchError> {
    match &entity.entity.data {
        EntityData::Line2D { .. } | EntityData::Line3D { .. } => entity.length(),
        EntityData::Circle { radius, .. } => Ok(*radius),
        EntityData::Arc { invert, .. } => {
            let center = entity.ct()?.co()?;
            let (start, end) = (entity.p1()?.co()? - center, entity.p2()?.co()? - center);
            let mut sweep = range_2pi(angle_signed(&end) - angle_signed(&start));
            if *invert {
                sweep = TAU - sweep;
            }
            Ok(entity.radius()? * sweep)
        }
        _ => Err(SketchError::InvalidReference {
            reason: format!("{} has no size", entity.kind()),
        }),
    }
}

/// Offset between the two points a horizontal or vertical constraint aligns.
fn axis_offset(e1: &EntityRef<'_>, e2: Option<&EntityRef<'_>>) -> Result<Vector2<f64>, SketchError> {
    match e2 {
        Some(e2) => Ok(e2.co()? - e1.co()?),
        None => e1.direction(),
    }
}
