//! Tests for text sketch reports.

use sketch_solver::constraint::{Distance, Horizontal};
use test_harness::SketchBuilder;

fn solved_line() -> SketchBuilder {
    let mut b = SketchBuilder::new();
    b.xy_sketch("Base").unwrap();
    b.fixed_point("a", 0.0, 0.0).unwrap();
    b.point("b", 9.0, 1.0).unwrap();
    b.line("l", "a", "b").unwrap();
    b.constrain("flat", Horizontal::default(), "l", None).unwrap();
    b.constrain("len", Distance::new(12.0), "l", None).unwrap();
    b.solve().unwrap();
    b
}

#[test]
fn report_lists_scopes_and_constraints() {
    let b = solved_line();
    let report = b.report();
    assert_eq!(report.scopes.len(), 2);
    assert_eq!(report.scopes[0].name, "Free");
    assert_eq!(report.scopes[1].constraints.len(), 2);

    let text = report.to_text();
    assert!(text.contains("=== Sketch Report ==="));
    assert!(text.contains("Base [Okay, dof 0]"));
    assert!(text.contains("\"len\" = 12.0000"));
    assert!(text.contains("0 failing"));
}

#[test]
fn report_counts_entities_per_kind() {
    let b = solved_line();
    let report = b.report();
    let counts = &report.scopes[1].entity_counts;
    let points = counts
        .iter()
        .find(|(kind, _)| *kind == sketcher_types::EntityKind::Point2D)
        .map(|(_, n)| *n);
    assert_eq!(points, Some(2));
}

#[test]
fn report_flags_unsatisfied_constraints() {
    let mut b = solved_line();
    b.state.store.set_point_2d(b.entity_id("b").unwrap(), nalgebra::Vector2::new(5.0, 5.0)).unwrap();
    let report = b.report();
    assert_eq!(report.failures(), 2);
    assert!(report.to_string().contains("[FAIL]"));
}
