use approx::assert_relative_eq;
use nalgebra::{UnitQuaternion, Vector2, Vector3};
use sketch_solver::constraint::{Angle, Distance, Horizontal};
use sketch_solver::{Constraint, ConstraintType, SolveScope};
use sketcher_bridge::messages::SolveSummary;
use sketcher_bridge::panel::PropertyValue;
use sketcher_bridge::*;
use sketcher_types::*;

// ── Helper functions ─────────────────────────────────────────────────────

fn send(state: &mut SketcherState, msg: HostToSketcher) -> SketcherToHost {
    dispatch(state, msg)
}

fn add_entity(state: &mut SketcherState, entity: Entity) -> EntityId {
    match send(state, HostToSketcher::AddEntity { entity }) {
        SketcherToHost::EntityAdded { id } => id,
        other => panic!("expected EntityAdded, got {other:?}"),
    }
}

/// Workplane at the origin plus a sketch on it.
fn sketch_session() -> (SketcherState, SketchId) {
    let mut state = SketcherState::new();
    let origin = add_entity(
        &mut state,
        Entity::new(EntityData::Point3D {
            location: Vector3::zeros(),
        }),
    );
    let workplane = add_entity(
        &mut state,
        Entity::new(EntityData::Workplane {
            p1: origin,
            orientation: UnitQuaternion::identity(),
        }),
    );
    let sketch = match send(
        &mut state,
        HostToSketcher::AddSketch {
            name: "Sketch".to_string(),
            workplane,
        },
    ) {
        SketcherToHost::SketchAdded { id } => id,
        other => panic!("expected SketchAdded, got {other:?}"),
    };
    (state, sketch)
}

fn point(state: &mut SketcherState, sketch: SketchId, x: f64, y: f64) -> EntityId {
    add_entity(
        state,
        Entity::new(EntityData::Point2D {
            sketch,
            co: Vector2::new(x, y),
        }),
    )
}

fn line(state: &mut SketcherState, sketch: SketchId, p1: EntityId, p2: EntityId) -> EntityId {
    add_entity(state, Entity::new(EntityData::Line2D { sketch, p1, p2 }))
}

fn add_constraint(state: &mut SketcherState, constraint: Constraint, init: bool) -> ConstraintId {
    match send(state, HostToSketcher::AddConstraint { constraint, init }) {
        SketcherToHost::ConstraintAdded { id, .. } => id,
        other => panic!("expected ConstraintAdded, got {other:?}"),
    }
}

fn co(state: &SketcherState, id: EntityId) -> Vector2<f64> {
    state.store.entity(id).unwrap().co().unwrap()
}

// ── Serde Round-Trip Tests ───────────────────────────────────────────────

#[test]
fn request_tags_round_trip() {
    let msg = HostToSketcher::Solve {
        sketch: None,
        all: true,
    };
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"type\":\"Solve\""));
    let back: HostToSketcher = serde_json::from_str(&json).unwrap();
    assert!(matches!(back, HostToSketcher::Solve { all: true, .. }));
}

#[test]
fn solve_request_fields_default() {
    let msg: HostToSketcher = serde_json::from_str(r#"{"type":"Solve"}"#).unwrap();
    assert!(matches!(
        msg,
        HostToSketcher::Solve {
            sketch: None,
            all: false
        }
    ));
}

#[test]
fn constraint_json_carries_kind_params() {
    let (mut state, sketch) = sketch_session();
    let a = point(&mut state, sketch, 0.0, 0.0);
    let b = point(&mut state, sketch, 3.0, 4.0);
    let msg = HostToSketcher::AddConstraint {
        constraint: Constraint::new(Distance::new(0.0), a, Some(b), Some(sketch)),
        init: true,
    };
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"type\":\"Distance\""));

    let reply = dispatch_json(&mut state, &json);
    let reply: SketcherToHost = serde_json::from_str(&reply).unwrap();
    match reply {
        SketcherToHost::ConstraintAdded { constraint, .. } => {
            assert_relative_eq!(constraint.kind.value().unwrap(), 5.0, epsilon = 1e-9);
        }
        other => panic!("expected ConstraintAdded, got {other:?}"),
    }
}

#[test]
fn malformed_json_reports_serialization_error() {
    let mut state = SketcherState::new();
    let reply = dispatch_json(&mut state, "{\"type\":\"NoSuchRequest\"}");
    let reply: SketcherToHost = serde_json::from_str(&reply).unwrap();
    match reply {
        SketcherToHost::Error { message } => assert!(message.starts_with("serialization error")),
        other => panic!("expected Error, got {other:?}"),
    }
}

// ── Dispatch Tests ───────────────────────────────────────────────────────

#[test]
fn add_sketch_becomes_active() {
    let (state, sketch) = sketch_session();
    assert_eq!(state.active_sketch, Some(sketch));
}

#[test]
fn same_entity_constraint_is_rejected() {
    let (mut state, sketch) = sketch_session();
    let a = point(&mut state, sketch, 0.0, 0.0);
    let reply = send(
        &mut state,
        HostToSketcher::AddConstraint {
            constraint: Constraint::new(Horizontal::default(), a, Some(a), Some(sketch)),
            init: false,
        },
    );
    match reply {
        SketcherToHost::Error { message } => assert!(message.contains("itself")),
        other => panic!("expected Error, got {other:?}"),
    }
    assert_eq!(state.store.constraints().count(), 0);
}

#[test]
fn set_value_normalizes_and_resolves() {
    let (mut state, sketch) = sketch_session();
    let a = point(&mut state, sketch, 0.0, 0.0);
    let b = point(&mut state, sketch, 3.0, 4.0);
    state.store.set_fixed(a, true).unwrap();
    let id = add_constraint(
        &mut state,
        Constraint::new(Distance::new(0.0), a, Some(b), Some(sketch)),
        true,
    );

    let reply = send(
        &mut state,
        HostToSketcher::SetValue {
            constraint: id,
            value: -10.0,
        },
    );
    match reply {
        SketcherToHost::ConstraintUpdated {
            constraint, solve, ..
        } => {
            assert_relative_eq!(constraint.kind.value().unwrap(), 10.0);
            let solve = solve.unwrap();
            assert_eq!(solve.scope, SolveScope::Sketch(sketch));
            assert_eq!(solve.state, SolverState::Okay);
        }
        other => panic!("expected ConstraintUpdated, got {other:?}"),
    }
    assert_relative_eq!((co(&state, b) - co(&state, a)).norm(), 10.0, epsilon = 1e-6);
}

#[test]
fn set_value_rejects_non_finite_input() {
    let (mut state, sketch) = sketch_session();
    let a = point(&mut state, sketch, 0.0, 0.0);
    let b = point(&mut state, sketch, 3.0, 4.0);
    let id = add_constraint(
        &mut state,
        Constraint::new(Distance::new(0.0), a, Some(b), Some(sketch)),
        true,
    );

    let reply = send(
        &mut state,
        HostToSketcher::SetValue {
            constraint: id,
            value: f64::NAN,
        },
    );
    assert!(matches!(reply, SketcherToHost::Error { message } if message.contains("must be finite")));
    let stored = state.store.constraint(id).unwrap();
    assert_relative_eq!(stored.kind.value().unwrap(), 5.0);
}

#[test]
fn set_value_on_non_dimensional_errors() {
    let (mut state, sketch) = sketch_session();
    let a = point(&mut state, sketch, 0.0, 0.0);
    let b = point(&mut state, sketch, 3.0, 4.0);
    let id = add_constraint(
        &mut state,
        Constraint::new(Horizontal::default(), a, Some(b), Some(sketch)),
        false,
    );
    let reply = send(
        &mut state,
        HostToSketcher::SetValue {
            constraint: id,
            value: 1.0,
        },
    );
    assert!(matches!(reply, SketcherToHost::Error { message } if message.contains("has no value")));
}

#[test]
fn flip_only_applies_to_point_line_distance() {
    let (mut state, sketch) = sketch_session();
    let a = point(&mut state, sketch, 0.0, 0.0);
    let b = point(&mut state, sketch, 3.0, 4.0);
    let c = point(&mut state, sketch, 0.0, 2.0);
    let l = line(&mut state, sketch, a, b);
    let pair = add_constraint(
        &mut state,
        Constraint::new(Distance::new(5.0), a, Some(b), Some(sketch)),
        false,
    );
    let reply = send(
        &mut state,
        HostToSketcher::SetFlip {
            constraint: pair,
            flip: true,
        },
    );
    assert!(matches!(reply, SketcherToHost::Error { message } if message.contains("flip")));

    let side = add_constraint(
        &mut state,
        Constraint::new(Distance::new(1.0), c, Some(l), Some(sketch)),
        false,
    );
    let reply = send(
        &mut state,
        HostToSketcher::SetFlip {
            constraint: side,
            flip: true,
        },
    );
    assert!(matches!(reply, SketcherToHost::ConstraintUpdated { .. }));
}

#[test]
fn delete_point_cascades() {
    let (mut state, sketch) = sketch_session();
    let a = point(&mut state, sketch, 0.0, 0.0);
    let b = point(&mut state, sketch, 3.0, 4.0);
    let l = line(&mut state, sketch, a, b);
    let id = add_constraint(
        &mut state,
        Constraint::new(Horizontal::default(), l, None, Some(sketch)),
        false,
    );

    let reply = send(&mut state, HostToSketcher::DeleteEntity { entity: a });
    match reply {
        SketcherToHost::Removed {
            entities,
            constraints,
            ..
        } => {
            assert!(entities.contains(&a));
            assert!(entities.contains(&l));
            assert_eq!(constraints, vec![id]);
        }
        other => panic!("expected Removed, got {other:?}"),
    }
    assert!(state.store.contains_entity(b));
}

#[test]
fn delete_sketch_leaves_it_inactive() {
    let (mut state, sketch) = sketch_session();
    point(&mut state, sketch, 1.0, 1.0);
    let reply = send(&mut state, HostToSketcher::DeleteSketch { sketch });
    assert!(matches!(reply, SketcherToHost::Removed { sketches, .. } if sketches == vec![sketch]));
    assert_eq!(state.active_sketch, None);
}

#[test]
fn solve_all_reports_every_scope() {
    let (mut state, _sketch) = sketch_session();
    let reply = send(
        &mut state,
        HostToSketcher::Solve {
            sketch: None,
            all: true,
        },
    );
    match reply {
        SketcherToHost::Solved { reports } => {
            let scopes: Vec<_> = reports.iter().map(|r: &SolveSummary| r.scope).collect();
            assert_eq!(scopes[0], SolveScope::Free);
            assert_eq!(reports.len(), 2);
        }
        other => panic!("expected Solved, got {other:?}"),
    }
}

#[test]
fn solver_state_carries_description() {
    let (mut state, sketch) = sketch_session();
    let reply = send(&mut state, HostToSketcher::ShowSolverState { sketch });
    match reply {
        SketcherToHost::SolverState {
            state, name, description, ..
        } => {
            assert_eq!(state, SolverState::Okay);
            assert_eq!(name, "Okay");
            assert_eq!(description, "Successfully solved");
        }
        other => panic!("expected SolverState, got {other:?}"),
    }
}

// ── Panel Tests ──────────────────────────────────────────────────────────

#[test]
fn panel_lists_sketches_when_none_active() {
    let (mut state, sketch) = sketch_session();
    send(
        &mut state,
        HostToSketcher::SetSketchVisible {
            sketch,
            visible: false,
        },
    );
    let reply = send(&mut state, HostToSketcher::SetActiveSketch { sketch: None });
    let SketcherToHost::Panel { panel } = reply else {
        panic!("expected Panel");
    };
    assert!(panel.active.is_none());
    assert_eq!(panel.sketches.len(), 1);
    assert_eq!(panel.sketches[0].visibility_icon, "HIDE_ON");
    assert_eq!(panel.sketches[0].state_icon, None);
    assert_eq!(panel.constraint_operators, ConstraintType::ALL.to_vec());
}

#[test]
fn panel_header_names_active_sketch() {
    let (mut state, _sketch) = sketch_session();
    let reply = send(&mut state, HostToSketcher::RequestPanel);
    let SketcherToHost::Panel { panel } = reply else {
        panic!("expected Panel");
    };
    let header = panel.active.unwrap();
    assert_eq!(header.leave_label, "Leave: Sketch");
    assert!(header.state.is_none());
    assert!(panel.sketches.is_empty());
}

#[test]
fn distance_properties_grey_out_flip_for_point_pair() {
    let (mut state, sketch) = sketch_session();
    let a = point(&mut state, sketch, 0.0, 0.0);
    let b = point(&mut state, sketch, 3.0, 4.0);
    let id = add_constraint(
        &mut state,
        Constraint::new(Distance::new(5.0), a, Some(b), Some(sketch)),
        false,
    );
    let reply = send(&mut state, HostToSketcher::InspectConstraint { constraint: id });
    let SketcherToHost::ConstraintProperties { properties, .. } = reply else {
        panic!("expected ConstraintProperties");
    };
    assert_eq!(properties.kind, ConstraintType::Distance);
    let flip = properties.rows.iter().find(|r| r.name == "Flip").unwrap();
    let align = properties.rows.iter().find(|r| r.name == "Align").unwrap();
    assert!(!flip.active);
    assert!(align.active);
    assert_eq!(properties.rows[0].value, PropertyValue::Number(5.0));
    assert!(properties.label_position.is_some());
}

#[test]
fn angle_setting_toggles_supplementary() {
    let (mut state, sketch) = sketch_session();
    let a = point(&mut state, sketch, 0.0, 0.0);
    let b = point(&mut state, sketch, 10.0, 0.0);
    let c = point(&mut state, sketch, 0.0, 1.0);
    let d = point(&mut state, sketch, 10.0, 11.0);
    let l1 = line(&mut state, sketch, a, b);
    let l2 = line(&mut state, sketch, c, d);
    let id = add_constraint(
        &mut state,
        Constraint::new(Angle::new(45.0), l1, Some(l2), Some(sketch)),
        false,
    );
    send(
        &mut state,
        HostToSketcher::SetSetting {
            constraint: id,
            setting: true,
        },
    );
    let reply = send(&mut state, HostToSketcher::InspectConstraint { constraint: id });
    let SketcherToHost::ConstraintProperties { properties, .. } = reply else {
        panic!("expected ConstraintProperties");
    };
    assert_eq!(properties.rows[1].value, PropertyValue::Flag(true));
}

#[test]
fn move_label_requires_distance() {
    let (mut state, sketch) = sketch_session();
    let a = point(&mut state, sketch, 0.0, 0.0);
    let b = point(&mut state, sketch, 3.0, 4.0);
    let id = add_constraint(
        &mut state,
        Constraint::new(Horizontal::default(), a, Some(b), Some(sketch)),
        false,
    );
    let reply = send(
        &mut state,
        HostToSketcher::MoveLabel {
            constraint: id,
            position: [1.0, 2.0],
        },
    );
    assert!(matches!(reply, SketcherToHost::Error { .. }));
}
