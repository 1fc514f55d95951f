use sketcher_types::SolverState;
use tracing::{info, instrument, warn};

use crate::config::SolverConfig;
use crate::entity_mapping::SketchToSolver;
use crate::error::SketchError;
use crate::solver::{Group, NumericSolver, SolveOutcome, SolverBackend};
use crate::status::classify_status;
use crate::store::SketchStore;
use crate::types::{SolveReport, SolveScope};

/// Solve one scope: map its entities and constraints onto `backend`, run the
/// active group, and on success write the solved parameters back.
///
/// On failure geometry is left untouched. For a sketch scope the sketch's
/// `solver_state` and `dof` are updated either way.
#[instrument(skip(store, backend))]
pub fn solve_sketch(
    store: &mut SketchStore,
    scope: SolveScope,
    backend: &mut dyn SolverBackend,
) -> Result<SolveReport, SketchError> {
    if let Some(sketch) = scope.sketch() {
        store.sketch(sketch)?;
    }

    let mut mapping = SketchToSolver::new(&mut *backend);
    if let Err(err) = mapping.add_entities(store, scope) {
        warn!(%err, "could not map entities");
        let report = SolveReport {
            scope,
            state: SolverState::UnknownFailure,
            dof: None,
            failed: Vec::new(),
            invalid: Vec::new(),
        };
        record_state(store, &report)?;
        return Ok(report);
    }
    let constraints = mapping.add_constraints(store, scope);
    let handles = mapping.into_handles();

    let outcome = backend.solve(Group::ACTIVE);
    let (state, dof) = classify_status(&outcome);
    let failed = match &outcome {
        SolveOutcome::Failed { failed, .. } => constraints.owners_of(failed),
        SolveOutcome::Okay { .. } => Vec::new(),
    };

    if outcome.is_okay() {
        let updated = handles.write_back(&*backend, store)?;
        info!(?dof, updated, "solve succeeded");
    } else {
        warn!(state = state.name(), failed = failed.len(), "solve failed");
    }

    let report = SolveReport {
        scope,
        state,
        dof,
        failed,
        invalid: constraints.invalid,
    };
    record_state(store, &report)?;
    Ok(report)
}

/// Solves `scope` with the pure-Rust backend.
pub fn solve_numeric(
    store: &mut SketchStore,
    scope: SolveScope,
    config: &SolverConfig,
) -> Result<SolveReport, SketchError> {
    let mut backend = NumericSolver::new(config.clone());
    solve_sketch(store, scope, &mut backend)
}

/// Solves the free 3D scope, then every sketch, each with a fresh backend.
pub fn solve_all(store: &mut SketchStore, config: &SolverConfig) -> Result<Vec<SolveReport>, SketchError> {
    let mut reports = vec![solve_numeric(store, SolveScope::Free, config)?];
    let sketches: Vec<_> = store.sketches().map(|(id, _)| id).collect();
    for sketch in sketches {
        reports.push(solve_numeric(store, SolveScope::Sketch(sketch), config)?);
    }
    Ok(reports)
}

fn record_state(store: &mut SketchStore, report: &SolveReport) -> Result<(), SketchError> {
    if let Some(sketch) = report.scope.sketch() {
        let sketch = store.sketch_mut(sketch)?;
        sketch.solver_state = report.state;
        sketch.dof = report.dof;
    }
    Ok(())
}
