//! Panel models the host lays out: the sketch list, the active sketch
//! header, the constraint operator list and per-constraint property rows.

use serde::{Deserialize, Serialize};

use sketch_solver::constraint::{ConstraintKind, ConstraintType, Distance};
use sketcher_types::{Alignment, ConstraintId, SketchId};

use crate::engine_state::{BridgeError, SketcherState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketchRow {
    pub id: SketchId,
    pub name: String,
    pub visibility_icon: String,
    /// Shown only when the last solve did not succeed.
    pub state_icon: Option<String>,
    pub active: bool,
}

/// Solver state badge of the active sketch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateBadge {
    pub name: String,
    pub icon: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSketchHeader {
    pub id: SketchId,
    pub name: String,
    pub leave_label: String,
    pub state: Option<StateBadge>,
    pub dof: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketcherPanel {
    pub active: Option<ActiveSketchHeader>,
    /// Listed only while no sketch is active.
    pub sketches: Vec<SketchRow>,
    pub constraint_operators: Vec<ConstraintType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum PropertyValue {
    Number(f64),
    Flag(bool),
    Align(Alignment),
}

/// One editable property. Inactive rows are shown greyed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRow {
    pub name: String,
    pub value: PropertyValue,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintProperties {
    pub kind: ConstraintType,
    pub rows: Vec<PropertyRow>,
    /// World position of the value label.
    pub label_position: Option<[f64; 3]>,
}

fn row(name: &str, value: PropertyValue, active: bool) -> PropertyRow {
    PropertyRow {
        name: name.to_string(),
        value,
        active,
    }
}

pub fn sketch_rows(state: &SketcherState) -> Vec<SketchRow> {
    state
        .store
        .sketches()
        .map(|(id, sketch)| SketchRow {
            id,
            name: sketch.name.clone(),
            visibility_icon: if sketch.visible { "HIDE_OFF" } else { "HIDE_ON" }.to_string(),
            state_icon: (!sketch.solver_state.is_okay()).then(|| sketch.solver_state.icon().to_string()),
            active: state.active_sketch == Some(id),
        })
        .collect()
}

pub fn sketcher_panel(state: &SketcherState) -> Result<SketcherPanel, BridgeError> {
    let active = match state.active_sketch {
        Some(id) => {
            let sketch = state.store.sketch(id)?;
            let solver_state = sketch.solver_state;
            Some(ActiveSketchHeader {
                id,
                name: sketch.name.clone(),
                leave_label: format!("Leave: {}", sketch.name),
                state: (!solver_state.is_okay()).then(|| StateBadge {
                    name: solver_state.name().to_string(),
                    icon: solver_state.icon().to_string(),
                    description: solver_state.description().to_string(),
                }),
                dof: sketch.dof,
            })
        }
        None => None,
    };
    let sketches = if active.is_some() {
        Vec::new()
    } else {
        sketch_rows(state)
    };
    Ok(SketcherPanel {
        active,
        sketches,
        constraint_operators: ConstraintType::ALL.to_vec(),
    })
}

pub fn constraint_properties(state: &SketcherState, id: ConstraintId) -> Result<ConstraintProperties, BridgeError> {
    let constraint = state.store.constraint(id)?;
    let slots = constraint.slots(&state.store)?;
    let rows = match &constraint.kind {
        ConstraintKind::Distance(d) => vec![
            row("Distance", PropertyValue::Number(d.value()), true),
            row("Flip", PropertyValue::Flag(d.flip), Distance::use_flipping(&slots)),
            row("Align", PropertyValue::Align(d.align), Distance::use_align(&slots)),
        ],
        ConstraintKind::Angle(a) => vec![
            row("Angle", PropertyValue::Number(a.value()), true),
            row("Supplementary", PropertyValue::Flag(a.setting), true),
        ],
        ConstraintKind::Diameter(d) => vec![
            row(if d.setting { "Radius" } else { "Diameter" }, PropertyValue::Number(d.value()), true),
            row("Use Radius", PropertyValue::Flag(d.setting), true),
        ],
        ConstraintKind::Ratio(r) => vec![row("Ratio", PropertyValue::Number(r.value()), true)],
        _ => Vec::new(),
    };
    let label_position = constraint
        .value_placement(&state.store, state.ui_scale)?
        .map(|p| [p.x, p.y, p.z]);
    Ok(ConstraintProperties {
        kind: constraint.constraint_type(),
        rows,
        label_position,
    })
}
