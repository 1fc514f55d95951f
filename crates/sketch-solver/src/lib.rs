//! Constraint sketching core: an entity store, geometric constraints with
//! their translation into solver equations, and solve orchestration over a
//! pluggable solver backend.

pub mod config;
pub mod constraint;
pub mod constraint_mapping;
pub mod entity;
pub mod entity_mapping;
pub mod error;
pub mod geometry;
pub mod solve;
pub mod solver;
pub mod status;
pub mod store;
pub mod types;

pub use config::{SolverConfig, Tolerance};
pub use constraint::{Constraint, ConstraintKind, ConstraintType, InitialValue};
pub use entity::EntityRef;
pub use error::SketchError;
pub use solve::{solve_all, solve_numeric, solve_sketch};
pub use store::{Removal, SketchStore};
pub use types::*;
