use tracing::{debug, warn};

use sketch_solver::Removal;
use sketcher_types::ConstraintId;

use crate::engine_state::{BridgeError, SketcherState};
use crate::messages::{HostToSketcher, SketcherToHost, SolveSummary};
use crate::panel::{constraint_properties, sketcher_panel};

/// Dispatch a host request to the sketcher and return a response.
///
/// Errors never escape: they become [`SketcherToHost::Error`].
pub fn dispatch(state: &mut SketcherState, msg: HostToSketcher) -> SketcherToHost {
    match handle_message(state, msg) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "request failed");
            SketcherToHost::Error {
                message: e.to_string(),
            }
        }
    }
}

/// JSON in, JSON out.
pub fn dispatch_json(state: &mut SketcherState, json: &str) -> String {
    let response = match serde_json::from_str::<HostToSketcher>(json) {
        Ok(msg) => dispatch(state, msg),
        Err(e) => SketcherToHost::Error {
            message: BridgeError::Serialization {
                reason: e.to_string(),
            }
            .to_string(),
        },
    };
    serde_json::to_string(&response).unwrap_or_else(|e| {
        format!(r#"{{"type":"Error","message":"failed to serialize response: {e}"}}"#)
    })
}

fn handle_message(state: &mut SketcherState, msg: HostToSketcher) -> Result<SketcherToHost, BridgeError> {
    debug!(?msg, "dispatch");
    match msg {
        // -- Entities and sketches --
        HostToSketcher::AddEntity { entity } => Ok(SketcherToHost::EntityAdded {
            id: state.add_entity(entity)?,
        }),

        HostToSketcher::AddSketch { name, workplane } => Ok(SketcherToHost::SketchAdded {
            id: state.add_sketch(name, workplane)?,
        }),

        HostToSketcher::DeleteEntity { entity } => Ok(removed_response(state.delete_entity(entity)?)),

        HostToSketcher::DeleteSketch { sketch } => Ok(removed_response(state.delete_sketch(sketch)?)),

        // -- Constraints --
        HostToSketcher::AddConstraint { constraint, init } => {
            let id = state.add_constraint(constraint, init)?;
            Ok(SketcherToHost::ConstraintAdded {
                id,
                constraint: state.store.constraint(id)?.clone(),
            })
        }

        HostToSketcher::DeleteConstraint { constraint } => {
            state.delete_constraint(constraint)?;
            Ok(SketcherToHost::Removed {
                entities: Vec::new(),
                constraints: vec![constraint],
                sketches: Vec::new(),
            })
        }

        HostToSketcher::SetValue { constraint, value } => {
            let report = state.set_value(constraint, value)?;
            updated_response(state, constraint, Some(report.into()))
        }

        HostToSketcher::SetFlip { constraint, flip } => {
            let report = state.set_flip(constraint, flip)?;
            updated_response(state, constraint, Some(report.into()))
        }

        HostToSketcher::SetAlign { constraint, align } => {
            let report = state.set_align(constraint, align)?;
            updated_response(state, constraint, Some(report.into()))
        }

        HostToSketcher::SetSetting { constraint, setting } => {
            let report = state.set_setting(constraint, setting)?;
            updated_response(state, constraint, Some(report.into()))
        }

        HostToSketcher::MoveLabel { constraint, position } => {
            state.move_label(constraint, position)?;
            updated_response(state, constraint, None)
        }

        HostToSketcher::InspectConstraint { constraint } => Ok(SketcherToHost::ConstraintProperties {
            id: constraint,
            properties: constraint_properties(state, constraint)?,
        }),

        // -- Sketch session --
        HostToSketcher::SetActiveSketch { sketch } => {
            state.set_active_sketch(sketch)?;
            panel_response(state)
        }

        HostToSketcher::SetSketchVisible { sketch, visible } => {
            state.set_sketch_visible(sketch, visible)?;
            panel_response(state)
        }

        HostToSketcher::RenameSketch { sketch, name } => {
            state.rename_sketch(sketch, name)?;
            panel_response(state)
        }

        HostToSketcher::Solve { sketch, all } => {
            let reports = if all {
                state.solve_all()?
            } else {
                vec![state.solve(sketch)?]
            };
            Ok(SketcherToHost::Solved {
                reports: reports.into_iter().map(SolveSummary::from).collect(),
            })
        }

        HostToSketcher::ShowSolverState { sketch } => {
            let stored = state.store.sketch(sketch)?;
            let solver_state = stored.solver_state;
            Ok(SketcherToHost::SolverState {
                sketch,
                state: solver_state,
                name: solver_state.name().to_string(),
                description: solver_state.description().to_string(),
                dof: stored.dof,
            })
        }

        HostToSketcher::SetSolverConfig { config } => {
            state.config = config;
            Ok(SketcherToHost::Ack)
        }

        HostToSketcher::RequestPanel => panel_response(state),
    }
}

fn removed_response(removal: Removal) -> SketcherToHost {
    SketcherToHost::Removed {
        entities: removal.entities,
        constraints: removal.constraints,
        sketches: removal.sketches,
    }
}

fn updated_response(
    state: &SketcherState,
    id: ConstraintId,
    solve: Option<SolveSummary>,
) -> Result<SketcherToHost, BridgeError> {
    Ok(SketcherToHost::ConstraintUpdated {
        id,
        constraint: state.store.constraint(id)?.clone(),
        solve,
    })
}

fn panel_response(state: &SketcherState) -> Result<SketcherToHost, BridgeError> {
    Ok(SketcherToHost::Panel {
        panel: sketcher_panel(state)?,
    })
}
