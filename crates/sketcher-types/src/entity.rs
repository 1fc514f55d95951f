use nalgebra::{UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, SketchId};

/// A geometric entity participating in a sketch or in 3D space.
///
/// Entities reference each other by key (a line references its endpoints, a
/// circle its center point, a workplane its origin point). The keys point into
/// the arena that owns the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub data: EntityData,
    /// Parameters of a fixed entity are held constant while solving.
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub construction: bool,
}

impl Entity {
    pub fn new(data: EntityData) -> Self {
        Self {
            data,
            fixed: false,
            construction: false,
        }
    }

    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn construction(mut self) -> Self {
        self.construction = true;
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }

    /// The sketch owning a 2D entity. 3D entities and workplanes have none.
    pub fn sketch(&self) -> Option<SketchId> {
        match &self.data {
            EntityData::Point2D { sketch, .. }
            | EntityData::Line2D { sketch, .. }
            | EntityData::Circle { sketch, .. }
            | EntityData::Arc { sketch, .. } => Some(*sketch),
            EntityData::Point3D { .. }
            | EntityData::Line3D { .. }
            | EntityData::Workplane { .. } => None,
        }
    }

    /// Keys of the entities this entity is built from.
    pub fn references(&self) -> Vec<EntityId> {
        match &self.data {
            EntityData::Point3D { .. } | EntityData::Point2D { .. } => Vec::new(),
            EntityData::Line3D { p1, p2 } | EntityData::Line2D { p1, p2, .. } => vec![*p1, *p2],
            EntityData::Circle { ct, .. } => vec![*ct],
            EntityData::Arc { ct, p1, p2, .. } => vec![*ct, *p1, *p2],
            EntityData::Workplane { p1, .. } => vec![*p1],
        }
    }
}

/// Geometric state of an entity, per variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntityData {
    Point3D {
        location: Vector3<f64>,
    },
    /// A point in sketch-local coordinates of its sketch's workplane.
    Point2D {
        sketch: SketchId,
        co: Vector2<f64>,
    },
    Line3D {
        p1: EntityId,
        p2: EntityId,
    },
    Line2D {
        sketch: SketchId,
        p1: EntityId,
        p2: EntityId,
    },
    Circle {
        sketch: SketchId,
        ct: EntityId,
        radius: f64,
    },
    /// Counter-clockwise arc from `p1` to `p2` around `ct`, or clockwise when
    /// `invert` is set.
    Arc {
        sketch: SketchId,
        ct: EntityId,
        p1: EntityId,
        p2: EntityId,
        #[serde(default)]
        invert: bool,
    },
    Workplane {
        p1: EntityId,
        orientation: UnitQuaternion<f64>,
    },
}

impl EntityData {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityData::Point3D { .. } => EntityKind::Point3D,
            EntityData::Point2D { .. } => EntityKind::Point2D,
            EntityData::Line3D { .. } => EntityKind::Line3D,
            EntityData::Line2D { .. } => EntityKind::Line2D,
            EntityData::Circle { .. } => EntityKind::Circle,
            EntityData::Arc { .. } => EntityKind::Arc,
            EntityData::Workplane { .. } => EntityKind::Workplane,
        }
    }
}

/// Variant tag of an entity, used for constraint type signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Point3D,
    Point2D,
    Line3D,
    Line2D,
    Circle,
    Arc,
    Workplane,
}

impl EntityKind {
    pub const POINT: &'static [EntityKind] = &[EntityKind::Point3D, EntityKind::Point2D];
    pub const LINE: &'static [EntityKind] = &[EntityKind::Line3D, EntityKind::Line2D];
    pub const CURVE: &'static [EntityKind] = &[EntityKind::Circle, EntityKind::Arc];
    pub const POINT_2D: &'static [EntityKind] = &[EntityKind::Point2D];
    pub const LINE_2D: &'static [EntityKind] = &[EntityKind::Line2D];

    pub fn is_point(self) -> bool {
        matches!(self, EntityKind::Point3D | EntityKind::Point2D)
    }

    pub fn is_line(self) -> bool {
        matches!(self, EntityKind::Line3D | EntityKind::Line2D)
    }

    /// Arcs and circles.
    pub fn is_curve(self) -> bool {
        matches!(self, EntityKind::Circle | EntityKind::Arc)
    }

    pub fn is_workplane(self) -> bool {
        self == EntityKind::Workplane
    }

    /// Entities living inside a sketch's workplane.
    pub fn is_2d(self) -> bool {
        matches!(
            self,
            EntityKind::Point2D | EntityKind::Line2D | EntityKind::Circle | EntityKind::Arc
        )
    }

    pub fn is_3d(self) -> bool {
        !self.is_2d()
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Point3D => "Point (3D)",
            EntityKind::Point2D => "Point (2D)",
            EntityKind::Line3D => "Line (3D)",
            EntityKind::Line2D => "Line (2D)",
            EntityKind::Circle => "Circle",
            EntityKind::Arc => "Arc",
            EntityKind::Workplane => "Workplane",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
