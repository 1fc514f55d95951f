//! Message-based host surface for the sketcher: the host sends
//! [`HostToSketcher`] requests as JSON and renders the [`SketcherToHost`]
//! responses, including the panel models it lays out.

pub mod dispatch;
pub mod engine_state;
pub mod messages;
pub mod panel;

pub use dispatch::{dispatch, dispatch_json};
pub use engine_state::{BridgeError, SketcherState};
pub use messages::{HostToSketcher, SketcherToHost};
