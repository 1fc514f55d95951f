use approx::assert_relative_eq;
use nalgebra::{UnitQuaternion, Vector2, Vector3};
use sketch_solver::constraint::{
    Angle, Coincident, Diameter, Distance, Equal, Horizontal, Midpoint, Parallel, Perpendicular,
    Ratio, Symmetric, Tangent, Vertical,
};
use sketch_solver::*;
use sketcher_types::{Alignment, EntityId, SketchId, SolverState};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn new_sketch() -> (SketchStore, SketchId) {
    let mut store = SketchStore::new();
    let origin = store.add_point_3d(Vector3::zeros()).unwrap();
    let wp = store
        .add_workplane(origin, UnitQuaternion::identity())
        .unwrap();
    let sketch = store.add_sketch("Sketch", wp).unwrap();
    (store, sketch)
}

fn point(store: &mut SketchStore, sketch: SketchId, x: f64, y: f64) -> EntityId {
    store.add_point_2d(sketch, Vector2::new(x, y)).unwrap()
}

fn co(store: &SketchStore, id: EntityId) -> Vector2<f64> {
    store.entity(id).unwrap().co().unwrap()
}

fn constrain(
    store: &mut SketchStore,
    kind: impl Into<ConstraintKind>,
    e1: EntityId,
    e2: Option<EntityId>,
    sketch: SketchId,
) -> sketcher_types::ConstraintId {
    store
        .add_constraint(Constraint::new(kind, e1, e2, Some(sketch)), false)
        .unwrap()
}

fn solve(store: &mut SketchStore, sketch: SketchId) -> SolveReport {
    solve_numeric(store, SolveScope::Sketch(sketch), &SolverConfig::default()).unwrap()
}

// ── Solve + write-back ──────────────────────────────────────────────────────

#[test]
fn rectangle_100x50_fully_constrained() {
    let (mut store, sketch) = new_sketch();
    let p1 = point(&mut store, sketch, 0.0, 0.0);
    let p2 = point(&mut store, sketch, 90.0, 2.0);
    let p3 = point(&mut store, sketch, 95.0, 45.0);
    let p4 = point(&mut store, sketch, -3.0, 40.0);
    store.set_fixed(p1, true).unwrap();
    let bottom = store.add_line_2d(sketch, p1, p2).unwrap();
    let right = store.add_line_2d(sketch, p2, p3).unwrap();
    let top = store.add_line_2d(sketch, p3, p4).unwrap();
    let left = store.add_line_2d(sketch, p4, p1).unwrap();

    constrain(&mut store, Horizontal::default(), bottom, None, sketch);
    constrain(&mut store, Horizontal::default(), top, None, sketch);
    constrain(&mut store, Vertical::default(), right, None, sketch);
    constrain(&mut store, Vertical::default(), left, None, sketch);
    constrain(&mut store, Distance::new(100.0), bottom, None, sketch);
    constrain(&mut store, Distance::new(50.0), right, None, sketch);

    let report = solve(&mut store, sketch);
    assert_eq!(report.state, SolverState::Okay);
    assert!(report.is_fully_constrained(), "dof = {:?}", report.dof);
    assert!(report.invalid.is_empty());

    assert_relative_eq!(co(&store, p2), Vector2::new(100.0, 0.0), epsilon = 1e-6);
    assert_relative_eq!(co(&store, p3), Vector2::new(100.0, 50.0), epsilon = 1e-6);
    assert_relative_eq!(co(&store, p4), Vector2::new(0.0, 50.0), epsilon = 1e-6);
    assert_eq!(store.sketch(sketch).unwrap().dof, Some(0));
}

#[test]
fn under_constrained_reports_remaining_freedom() {
    let (mut store, sketch) = new_sketch();
    let a = point(&mut store, sketch, 0.0, 0.0);
    let b = point(&mut store, sketch, 2.0, 1.0);
    let line = store.add_line_2d(sketch, a, b).unwrap();
    constrain(&mut store, Horizontal::default(), line, None, sketch);

    let report = solve(&mut store, sketch);
    assert!(report.is_okay());
    assert_eq!(report.dof, Some(3));
    assert_relative_eq!(co(&store, a).y, co(&store, b).y, epsilon = 1e-9);
}

#[test]
fn failed_solve_leaves_geometry_untouched() {
    let (mut store, sketch) = new_sketch();
    let a = point(&mut store, sketch, 0.0, 0.0);
    let b = point(&mut store, sketch, 1.0, 0.0);
    store.set_fixed(a, true).unwrap();
    let line = store.add_line_2d(sketch, a, b).unwrap();
    let three = constrain(&mut store, Distance::new(3.0), line, None, sketch);
    let four = constrain(&mut store, Distance::new(4.0), line, None, sketch);

    let report = solve(&mut store, sketch);
    assert_eq!(report.state, SolverState::Inconsistent);
    assert!(report.failed.contains(&three) || report.failed.contains(&four));
    assert_eq!(co(&store, b), Vector2::new(1.0, 0.0));

    let stored = store.sketch(sketch).unwrap();
    assert_eq!(stored.solver_state, SolverState::Inconsistent);
    assert!(!stored.solver_state.is_okay());
}

#[test]
fn vertical_alignment_measures_along_v() {
    let (mut store, sketch) = new_sketch();
    let a = point(&mut store, sketch, 0.0, 0.0);
    let b = point(&mut store, sketch, 3.0, 4.0);
    store.set_fixed(a, true).unwrap();
    let mut distance = Distance::new(6.0);
    distance.align = Alignment::Vertical;
    constrain(&mut store, distance, a, Some(b), sketch);

    let report = solve(&mut store, sketch);
    assert!(report.is_okay());
    assert_relative_eq!(co(&store, b).y.abs(), 6.0, epsilon = 1e-6);
}

#[test]
fn tangent_circle_touches_line() {
    let (mut store, sketch) = new_sketch();
    let a = point(&mut store, sketch, -5.0, 0.0);
    let b = point(&mut store, sketch, 5.0, 0.0);
    let line = store.add_line_2d(sketch, a, b).unwrap();
    store.set_fixed(line, true).unwrap();
    let ct = point(&mut store, sketch, 1.0, 2.5);
    let circle = store.add_circle(sketch, ct, 1.0).unwrap();
    constrain(&mut store, Diameter::new(4.0), circle, None, sketch);
    constrain(&mut store, Tangent::default(), circle, Some(line), sketch);

    let report = solve(&mut store, sketch);
    assert!(report.is_okay(), "{report:?}");
    let center = co(&store, ct);
    let radius = store.entity(circle).unwrap().radius().unwrap();
    assert_relative_eq!(radius, 2.0, epsilon = 1e-6);
    assert_relative_eq!(center.y.abs(), radius, epsilon = 1e-6);
}

#[test]
fn free_scope_solves_3d_points() {
    let (mut store, _) = new_sketch();
    let a = store.add_point_3d(Vector3::new(0.0, 0.0, 0.0)).unwrap();
    let b = store.add_point_3d(Vector3::new(1.0, 1.0, 1.0)).unwrap();
    store.set_fixed(a, true).unwrap();
    store
        .add_constraint(Constraint::new(Distance::new(2.0), a, Some(b), None), false)
        .unwrap();

    let report = solve_numeric(&mut store, SolveScope::Free, &SolverConfig::default()).unwrap();
    assert!(report.is_okay());
    let location = store.entity(b).unwrap().location().unwrap();
    assert_relative_eq!(location.norm(), 2.0, epsilon = 1e-6);
}

// ── Validation ──────────────────────────────────────────────────────────────

#[test]
fn same_entity_is_rejected_for_every_kind() {
    let (mut store, sketch) = new_sketch();
    let a = point(&mut store, sketch, 0.0, 0.0);
    let b = point(&mut store, sketch, 1.0, 0.0);
    let line = store.add_line_2d(sketch, a, b).unwrap();
    let c = point(&mut store, sketch, 0.0, 1.0);
    let axis = store.add_line_2d(sketch, a, c).unwrap();

    let kinds: Vec<ConstraintKind> = vec![
        Coincident::default().into(),
        Equal::default().into(),
        Distance::new(1.0).into(),
        Angle::new(10.0).into(),
        Diameter::new(1.0).into(),
        Parallel::default().into(),
        Horizontal::default().into(),
        Vertical::default().into(),
        Tangent::default().into(),
        Midpoint::default().into(),
        Perpendicular::default().into(),
        Ratio::new(1.0).into(),
        Symmetric::new(axis).into(),
    ];
    assert_eq!(kinds.len(), ConstraintType::ALL.len());

    let before = store.constraints().count();
    for kind in kinds {
        let ty = kind.constraint_type();
        let result = store.add_constraint(Constraint::new(kind, line, Some(line), Some(sketch)), true);
        assert_eq!(result, Err(SketchError::SameEntity), "{ty}");
    }
    assert_eq!(store.constraints().count(), before);
}

#[test]
fn illegal_pairs_create_nothing() {
    let (mut store, sketch) = new_sketch();
    let a = point(&mut store, sketch, 0.0, 0.0);
    let ct = point(&mut store, sketch, 3.0, 0.0);
    let circle = store.add_circle(sketch, ct, 1.0).unwrap();
    let err = store
        .add_constraint(Constraint::new(Parallel::default(), a, Some(circle), Some(sketch)), true)
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(store.constraints().count(), 0);
}

// ── Initial values ──────────────────────────────────────────────────────────

fn stored_value(store: &SketchStore, id: sketcher_types::ConstraintId) -> f64 {
    store.constraint(id).unwrap().kind.value().unwrap()
}

#[test]
fn line_length_initial_value() {
    let (mut store, sketch) = new_sketch();
    let a = point(&mut store, sketch, 0.0, 0.0);
    let b = point(&mut store, sketch, 3.0, 0.0);
    let line = store.add_line_2d(sketch, a, b).unwrap();
    let id = store
        .add_constraint(Constraint::new(Distance::default(), line, None, Some(sketch)), true)
        .unwrap();
    assert_relative_eq!(stored_value(&store, id), 3.0);
    match &store.constraint(id).unwrap().kind {
        ConstraintKind::Distance(d) => assert!(!d.flip),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn point_pair_initial_value() {
    let (mut store, sketch) = new_sketch();
    let a = point(&mut store, sketch, 0.0, 0.0);
    let b = point(&mut store, sketch, 3.0, 4.0);
    let id = store
        .add_constraint(Constraint::new(Distance::default(), a, Some(b), Some(sketch)), true)
        .unwrap();
    assert_relative_eq!(stored_value(&store, id), 5.0);
}

#[test]
fn point_plane_sign_follows_side() {
    let (mut store, _) = new_sketch();
    let origin = store.add_point_3d(Vector3::zeros()).unwrap();
    let plane = store
        .add_workplane(origin, UnitQuaternion::identity())
        .unwrap();

    for (z, flipped) in [(2.0, false), (-2.0, true)] {
        let p = store.add_point_3d(Vector3::new(1.0, 1.0, z)).unwrap();
        let id = store
            .add_constraint(Constraint::new(Distance::default(), p, Some(plane), None), true)
            .unwrap();
        let constraint = store.constraint(id).unwrap();
        let ConstraintKind::Distance(d) = &constraint.kind else {
            panic!("expected a distance");
        };
        assert_relative_eq!(d.value(), 2.0);
        assert_eq!(d.flip, flipped);
        let slots = constraint.slots(&store).unwrap();
        assert_relative_eq!(d.effective_value(&slots), z);
    }
}

#[test]
fn reinit_tracks_moved_geometry() {
    let (mut store, sketch) = new_sketch();
    let a = point(&mut store, sketch, 0.0, 0.0);
    let b = point(&mut store, sketch, 3.0, 0.0);
    let line = store.add_line_2d(sketch, a, b).unwrap();
    let id = store
        .add_constraint(Constraint::new(Distance::default(), line, None, Some(sketch)), true)
        .unwrap();
    store.set_point_2d(b, Vector2::new(0.0, 7.0)).unwrap();
    store.reinit_constraint(id).unwrap();
    assert_relative_eq!(stored_value(&store, id), 7.0);
}

// ── Removal ─────────────────────────────────────────────────────────────────

#[test]
fn removing_a_point_cascades() {
    let (mut store, sketch) = new_sketch();
    let a = point(&mut store, sketch, 0.0, 0.0);
    let b = point(&mut store, sketch, 3.0, 0.0);
    let line = store.add_line_2d(sketch, a, b).unwrap();
    let id = constrain(&mut store, Horizontal::default(), line, None, sketch);

    let removal = store.remove_entity(a).unwrap();
    assert!(removal.entities.contains(&line));
    assert_eq!(removal.constraints, vec![id]);
    assert!(store.entity(b).is_ok());
    assert!(store.constraint(id).is_err());
}
