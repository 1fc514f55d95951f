//! Helper functions: error type, tracing setup, point layouts.

use std::f64::consts::TAU;

use tracing_subscriber::EnvFilter;

// ── Error Type ──────────────────────────────────────────────────────────────

/// Unified error type for the test harness.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("entity not found: {name}")]
    EntityNotFound { name: String },

    #[error("constraint not found: {name}")]
    ConstraintNotFound { name: String },

    #[error("no sketch is being edited")]
    NoActiveSketch,

    #[error("dispatch error: {message}")]
    DispatchError { message: String },

    #[error("unexpected response to {request}: {response}")]
    UnexpectedResponse { request: String, response: String },

    #[error("assertion failed: {detail}")]
    AssertionFailed { detail: String },

    #[error("oracle failure ({oracle}): {detail}")]
    OracleFailure { oracle: String, detail: String },

    #[error("sketch error: {0}")]
    Sketch(#[from] sketch_solver::SketchError),

    #[error("duplicate name: {name}")]
    DuplicateName { name: String },
}

// ── Tracing ─────────────────────────────────────────────────────────────────

/// Install a test subscriber honoring `RUST_LOG`. Safe to call from every
/// test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

// ── Point Layouts ───────────────────────────────────────────────────────────

/// Corners of an axis-aligned rectangle, counter-clockwise from `(x, y)`.
pub fn rect_corners(x: f64, y: f64, w: f64, h: f64) -> [(f64, f64); 4] {
    [(x, y), (x + w, y), (x + w, y + h), (x, y + h)]
}

/// Vertices of a regular polygon around `(cx, cy)`, the first on the +x axis.
pub fn regular_polygon(cx: f64, cy: f64, r: f64, sides: u32) -> Vec<(f64, f64)> {
    (0..sides)
        .map(|i| {
            let angle = TAU * (i as f64) / (sides as f64);
            (cx + r * angle.cos(), cy + r * angle.sin())
        })
        .collect()
}

/// Perturb a layout by a deterministic offset so the solver has work to do.
pub fn jitter(points: &[(f64, f64)], amount: f64) -> Vec<(f64, f64)> {
    points
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| {
            let phase = i as f64 * 1.7;
            (x + amount * phase.sin(), y + amount * phase.cos())
        })
        .collect()
}
