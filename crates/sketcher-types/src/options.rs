use serde::{Deserialize, Serialize};

/// Measurement axis of a point-to-point dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alignment {
    /// Direct point-to-point distance.
    #[default]
    None,
    Horizontal,
    Vertical,
}

impl Alignment {
    pub fn label(self) -> &'static str {
        match self {
            Alignment::None => "None",
            Alignment::Horizontal => "Horizontal",
            Alignment::Vertical => "Vertical",
        }
    }
}

/// Where a constraint may live with respect to workplanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkplaneRequirement {
    /// Valid inside a sketch as well as in 3D.
    Optional,
    /// Only valid outside of a workplane; no workplane is handed to the solver.
    Free,
    /// Needs the workplane of the sketch it belongs to.
    NotFree,
}
