//! Structured text sketch reports.
//!
//! Reports are plain text, meant to be printed next to a failing assertion.

use std::fmt;

use sketch_solver::SketchStore;
use sketcher_types::{EntityKind, SketchId, SolverState};

use crate::oracle::{self, OracleVerdict};
use crate::workflow::SketchBuilder;

const REPORT_TOL: f64 = 1e-6;

/// A complete report with one entry per scope.
pub struct SketchReport {
    pub scopes: Vec<ScopeEntry>,
    pub oracle_results: Vec<OracleVerdict>,
}

/// One sketch, or the free 3D scope.
pub struct ScopeEntry {
    pub name: String,
    pub state: Option<SolverState>,
    pub dof: Option<u32>,
    pub entity_counts: Vec<(EntityKind, usize)>,
    pub constraints: Vec<ConstraintEntry>,
}

pub struct ConstraintEntry {
    pub name: String,
    pub kind: String,
    pub value: Option<f64>,
}

impl SketchReport {
    /// Format the report as text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Sketch Report ===\n");

        for scope in &self.scopes {
            let state = match scope.state {
                Some(s) => s.name(),
                None => "-",
            };
            let dof = scope.dof.map_or("?".to_string(), |d| d.to_string());
            out.push_str(&format!("\n{} [{}, dof {}]\n", scope.name, state, dof));
            if !scope.entity_counts.is_empty() {
                let counts: Vec<String> = scope
                    .entity_counts
                    .iter()
                    .map(|(kind, n)| format!("{} {}", n, kind))
                    .collect();
                out.push_str(&format!("  Entities: {}\n", counts.join(", ")));
            }
            for c in &scope.constraints {
                match c.value {
                    Some(v) => out.push_str(&format!("  {} \"{}\" = {:.4}\n", c.kind, c.name, v)),
                    None => out.push_str(&format!("  {} \"{}\"\n", c.kind, c.name)),
                }
            }
        }

        let failed = self.oracle_results.iter().filter(|v| !v.passed).count();
        out.push_str(&format!(
            "\nOracle Results ({} checks, {} failing):\n",
            self.oracle_results.len(),
            failed
        ));
        for v in self.oracle_results.iter().filter(|v| !v.passed) {
            out.push_str(&format!("  [FAIL] {}: {}\n", v.oracle_name, v.detail));
        }
        out
    }

    pub fn failures(&self) -> usize {
        self.oracle_results.iter().filter(|v| !v.passed).count()
    }
}

impl fmt::Display for SketchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

fn entity_counts(store: &SketchStore, in_scope: impl Fn(Option<SketchId>) -> bool) -> Vec<(EntityKind, usize)> {
    let mut counts: Vec<(EntityKind, usize)> = Vec::new();
    for (_, entity) in store.entities().filter(|(_, e)| in_scope(e.sketch())) {
        match counts.iter_mut().find(|(kind, _)| *kind == entity.kind()) {
            Some((_, n)) => *n += 1,
            None => counts.push((entity.kind(), 1)),
        }
    }
    counts
}

impl SketchBuilder {
    /// Generate a report over the free scope and every sketch.
    pub fn report(&self) -> SketchReport {
        let store = self.store();
        let constraint_entries = |sketch: Option<SketchId>| {
            store
                .constraints_in(sketch)
                .map(|(id, c)| ConstraintEntry {
                    name: self.constraint_name(id).unwrap_or("<unnamed>").to_string(),
                    kind: c.kind.label().to_string(),
                    value: c.kind.value(),
                })
                .collect::<Vec<_>>()
        };

        let mut scopes = vec![ScopeEntry {
            name: "Free".to_string(),
            state: None,
            dof: None,
            entity_counts: entity_counts(store, |s| s.is_none()),
            constraints: constraint_entries(None),
        }];
        let mut oracle_results = oracle::check_sketch(store, None, REPORT_TOL);

        for (id, sketch) in store.sketches() {
            scopes.push(ScopeEntry {
                name: sketch.name.clone(),
                state: Some(sketch.solver_state),
                dof: sketch.dof,
                entity_counts: entity_counts(store, |s| s == Some(id)),
                constraints: constraint_entries(Some(id)),
            });
            oracle_results.extend(oracle::check_sketch(store, Some(id), REPORT_TOL));
        }

        SketchReport {
            scopes,
            oracle_results,
        }
    }
}
