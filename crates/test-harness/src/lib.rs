//! Test harness for scripted sketching sessions.
//!
//! Provides programmatic tools for driving the sketcher through its real
//! message dispatch, verifying solved geometry at every step, and generating
//! diagnostic output.
//!
//! # Key Components
//!
//! - [`SketchBuilder`]: fluent API addressing entities and constraints by name
//! - [`oracle`]: geometric verification functions returning pass/fail verdicts
//! - [`report`]: structured text sketch descriptions
//! - [`helpers`]: error type, tracing setup, point layouts
//! - [`assertions`]: assertion helpers with diagnostics

pub mod assertions;
pub mod helpers;
pub mod oracle;
pub mod report;
pub mod workflow;

pub use helpers::HarnessError;
pub use oracle::OracleVerdict;
pub use report::SketchReport;
pub use workflow::SketchBuilder;
