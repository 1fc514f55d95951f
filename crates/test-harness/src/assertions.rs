//! Assertion helpers with diagnostic output.
//!
//! Every failure names the context, the expected and the actual value, so a
//! scenario can `?` through a whole session and still point at the step
//! that went wrong.

use sketcher_bridge::messages::SolveSummary;
use sketcher_types::SolverState;

use crate::helpers::HarnessError;
use crate::oracle::OracleVerdict;
use crate::workflow::SketchBuilder;

/// Assert a named 2D point sits at `expected` within `tol`.
pub fn assert_point_near(
    b: &SketchBuilder,
    name: &str,
    expected: (f64, f64),
    tol: f64,
    ctx: &str,
) -> Result<(), HarnessError> {
    let co = b.co(name)?;
    let (dx, dy) = (co.x - expected.0, co.y - expected.1);
    if dx.abs() <= tol && dy.abs() <= tol {
        return Ok(());
    }
    Err(HarnessError::AssertionFailed {
        detail: format!(
            "[{}] point {}: expected ({:.4}, {:.4}), got ({:.4}, {:.4}) (tol={})",
            ctx, name, expected.0, expected.1, co.x, co.y, tol,
        ),
    })
}

/// Assert a named line has the given length.
pub fn assert_length(b: &SketchBuilder, name: &str, expected: f64, tol: f64, ctx: &str) -> Result<(), HarnessError> {
    let length = b.length(name)?;
    if (length - expected).abs() <= tol {
        Ok(())
    } else {
        Err(HarnessError::AssertionFailed {
            detail: format!("[{ctx}] length of {name}: expected {expected:.4}, got {length:.4} (tol={tol})"),
        })
    }
}

pub fn assert_radius(b: &SketchBuilder, name: &str, expected: f64, tol: f64, ctx: &str) -> Result<(), HarnessError> {
    let radius = b.radius(name)?;
    if (radius - expected).abs() <= tol {
        Ok(())
    } else {
        Err(HarnessError::AssertionFailed {
            detail: format!("[{ctx}] radius of {name}: expected {expected:.4}, got {radius:.4} (tol={tol})"),
        })
    }
}

/// Assert a solve succeeded. Failed constraints are listed by name.
pub fn assert_solved(b: &SketchBuilder, summary: &SolveSummary, ctx: &str) -> Result<(), HarnessError> {
    if summary.state.is_okay() {
        return Ok(());
    }
    let failed: Vec<&str> = summary
        .failed
        .iter()
        .map(|id| b.constraint_name(*id).unwrap_or("<unnamed>"))
        .collect();
    Err(HarnessError::AssertionFailed {
        detail: format!("[{}] solve ended {}: failed {:?}", ctx, summary.state.name(), failed),
    })
}

/// Assert a solve ended in a specific state.
pub fn assert_state(summary: &SolveSummary, expected: SolverState, ctx: &str) -> Result<(), HarnessError> {
    if summary.state == expected {
        Ok(())
    } else {
        Err(HarnessError::AssertionFailed {
            detail: format!("[{}] expected {}, got {}", ctx, expected.name(), summary.state.name()),
        })
    }
}

pub fn assert_dof(summary: &SolveSummary, expected: u32, ctx: &str) -> Result<(), HarnessError> {
    match summary.dof {
        Some(dof) if dof == expected => Ok(()),
        other => Err(HarnessError::AssertionFailed {
            detail: format!("[{ctx}] expected {expected} degrees of freedom, got {other:?}"),
        }),
    }
}

/// Fail on the first failing verdict, reporting how many failed overall.
pub fn assert_oracles_pass(verdicts: &[OracleVerdict], ctx: &str) -> Result<(), HarnessError> {
    let failed: Vec<&OracleVerdict> = verdicts.iter().filter(|v| !v.passed).collect();
    match failed.first() {
        None => Ok(()),
        Some(first) => Err(HarnessError::OracleFailure {
            oracle: first.oracle_name.clone(),
            detail: format!("[{}] {} ({} of {} failing)", ctx, first.detail, failed.len(), verdicts.len()),
        }),
    }
}
