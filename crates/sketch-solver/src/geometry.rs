//! Plane geometry used for initial values and label placement.
//!
//! Everything here is a pure function of its inputs. Degenerate inputs
//! (zero-length directions, coincident points) fall back to a defined result
//! instead of producing NaN.

use std::f64::consts::TAU;

use nalgebra::{Isometry3, SVector, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Signed side of `point` relative to the directed line `start -> end`.
///
/// Negated 2D cross product of `end - start` and `point - start`: positive on
/// the right-hand side of the line, negative on the left, zero on the line.
pub fn side_of_line(start: &Vector2<f64>, end: &Vector2<f64>, point: &Vector2<f64>) -> f64 {
    let dir = end - start;
    let rel = point - start;
    -(dir.x * rel.y - dir.y * rel.x)
}

/// Closest point to `point` on the infinite line through `a` and `b`, with its
/// line parameter (0 at `a`, 1 at `b`). A zero-length line yields `a`.
pub fn intersect_point_line<const D: usize>(
    point: &SVector<f64, D>,
    a: &SVector<f64, D>,
    b: &SVector<f64, D>,
) -> (SVector<f64, D>, f64) {
    let dir = b - a;
    let len_sq = dir.norm_squared();
    if len_sq == 0.0 {
        return (*a, 0.0);
    }
    let t = (point - a).dot(&dir) / len_sq;
    (a + dir * t, t)
}

/// Vector projection of `v` onto `onto`; zero when `onto` has no length.
pub fn project<const D: usize>(v: &SVector<f64, D>, onto: &SVector<f64, D>) -> SVector<f64, D> {
    let len_sq = onto.norm_squared();
    if len_sq == 0.0 {
        return SVector::zeros();
    }
    onto * (v.dot(onto) / len_sq)
}

/// Signed angle of `v` relative to the x axis, in `(-pi, pi]`.
pub fn angle_signed(v: &Vector2<f64>) -> f64 {
    v.y.atan2(v.x)
}

/// Wraps an angle into `[0, 2pi)`.
pub fn range_2pi(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Signed distance of `point` from the plane through `origin` with `normal`.
pub fn distance_point_to_plane(
    point: &Vector3<f64>,
    origin: &Vector3<f64>,
    normal: &Vector3<f64>,
) -> f64 {
    let len = normal.norm();
    if len == 0.0 {
        return 0.0;
    }
    (point - origin).dot(normal) / len
}

/// Intersection of the infinite lines `a1 a2` and `b1 b2`, or `None` when they
/// are parallel or degenerate.
pub fn line_intersection(
    a1: &Vector2<f64>,
    a2: &Vector2<f64>,
    b1: &Vector2<f64>,
    b2: &Vector2<f64>,
) -> Option<Vector2<f64>> {
    let da = a2 - a1;
    let db = b2 - b1;
    let denom = da.x * db.y - da.y * db.x;
    if denom.abs() <= f64::EPSILON * da.norm() * db.norm() {
        return None;
    }
    let rel = b1 - a1;
    let t = (rel.x * db.y - rel.y * db.x) / denom;
    Some(a1 + da * t)
}

/// A 2D transform in sketch-local coordinates: where a constraint label sits
/// and which way its dimension line runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement2d {
    pub translation: Vector2<f64>,
    /// Radians, counter-clockwise from the local x axis.
    pub rotation: f64,
}

impl Placement2d {
    pub fn new(translation: Vector2<f64>, rotation: f64) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Label frame for a dimension between two points: rotated along `axis`
    /// (or `p2 - p1` when no axis is forced) and centered between the points.
    pub fn between(p1: &Vector2<f64>, p2: &Vector2<f64>, axis: Option<Vector2<f64>>) -> Self {
        let dir = axis.unwrap_or(p2 - p1);
        let rotation = if dir.norm_squared() == 0.0 {
            0.0
        } else {
            angle_signed(&dir)
        };
        Self::new((p1 + p2) / 2.0, rotation)
    }

    /// Embeds the placement in the sketch plane (z = 0).
    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::new(
            Vector3::new(self.translation.x, self.translation.y, 0.0),
            Vector3::z() * self.rotation,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn side_of_line_sign() {
        let a = Vector2::new(0.0, 0.0);
        let b = Vector2::new(1.0, 0.0);
        assert!(side_of_line(&a, &b, &Vector2::new(0.5, -1.0)) > 0.0);
        assert!(side_of_line(&a, &b, &Vector2::new(0.5, 1.0)) < 0.0);
        assert_eq!(side_of_line(&a, &b, &Vector2::new(4.0, 0.0)), 0.0);
    }

    #[test]
    fn closest_point_on_line() {
        let (p, t) = intersect_point_line(
            &Vector2::new(1.0, 5.0),
            &Vector2::new(0.0, 0.0),
            &Vector2::new(4.0, 0.0),
        );
        assert_relative_eq!(p, Vector2::new(1.0, 0.0));
        assert_relative_eq!(t, 0.25);
    }

    #[test]
    fn closest_point_on_degenerate_line_is_its_start() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let (p, t) = intersect_point_line(&Vector3::new(5.0, 5.0, 5.0), &a, &a);
        assert_eq!(p, a);
        assert_eq!(t, 0.0);
    }

    #[test]
    fn projection_onto_zero_vector_is_zero() {
        let v = Vector2::new(3.0, 4.0);
        assert_eq!(project(&v, &Vector2::zeros()), Vector2::zeros());
        assert_relative_eq!(project(&v, &Vector2::new(2.0, 0.0)), Vector2::new(3.0, 0.0));
    }

    #[test]
    fn angles_wrap() {
        assert_relative_eq!(angle_signed(&Vector2::new(0.0, 1.0)), FRAC_PI_2);
        assert_relative_eq!(range_2pi(-FRAC_PI_2), 3.0 * FRAC_PI_2);
        assert_relative_eq!(range_2pi(TAU + 1.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn plane_distance_is_signed() {
        let o = Vector3::zeros();
        let n = Vector3::new(0.0, 0.0, 2.0);
        assert_relative_eq!(distance_point_to_plane(&Vector3::new(1.0, 1.0, 3.0), &o, &n), 3.0);
        assert_relative_eq!(distance_point_to_plane(&Vector3::new(1.0, 1.0, -1.0), &o, &n), -1.0);
    }

    #[test]
    fn parallel_lines_do_not_intersect() {
        let hit = line_intersection(
            &Vector2::new(0.0, 0.0),
            &Vector2::new(1.0, 0.0),
            &Vector2::new(0.0, 1.0),
            &Vector2::new(2.0, 1.0),
        );
        assert!(hit.is_none());
        let hit = line_intersection(
            &Vector2::new(0.0, 0.0),
            &Vector2::new(2.0, 2.0),
            &Vector2::new(0.0, 2.0),
            &Vector2::new(2.0, 0.0),
        );
        assert_relative_eq!(hit.expect("diagonals cross"), Vector2::new(1.0, 1.0));
    }

    #[test]
    fn placement_between_points() {
        let p = Placement2d::between(&Vector2::new(0.0, 0.0), &Vector2::new(0.0, 2.0), None);
        assert_relative_eq!(p.rotation, FRAC_PI_2);
        assert_relative_eq!(p.translation, Vector2::new(0.0, 1.0));

        let p = Placement2d::between(&Vector2::new(1.0, 1.0), &Vector2::new(1.0, 1.0), None);
        assert_eq!(p.rotation, 0.0);
    }
}
