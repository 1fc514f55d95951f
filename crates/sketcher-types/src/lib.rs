pub mod entity;
pub mod ids;
pub mod options;
pub mod sketch;

pub use entity::*;
pub use ids::*;
pub use options::*;
pub use sketch::*;
