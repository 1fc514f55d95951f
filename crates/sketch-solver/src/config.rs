use serde::{Deserialize, Serialize};

/// Configuration for the numeric solver backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub max_iterations: usize,
    /// A system counts as solved once every residual is below this value.
    pub tolerance: f64,
    pub lambda_initial: f64,
    pub lambda_factor: f64,
    /// Singular values below this are treated as zero when ranking the Jacobian.
    pub rank_tolerance: f64,
    /// Systems with more free parameters than this are rejected.
    pub max_unknowns: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-9,
            lambda_initial: 1e-3,
            lambda_factor: 10.0,
            rank_tolerance: 1e-8,
            max_unknowns: 2048,
        }
    }
}

/// Tolerances for degenerate-geometry checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Vectors shorter than this are treated as zero-length.
    pub length: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self { length: 1e-12 }
    }
}

impl Tolerance {
    pub fn is_zero_length(&self, length: f64) -> bool {
        length.abs() <= self.length
    }
}

pub fn default_tolerance() -> Tolerance {
    Tolerance::default()
}
