use nalgebra::{Isometry3, Point3, Translation3, Vector2, Vector3};
use sketcher_types::{Entity, EntityData, EntityId, EntityKind, SketchId};

use crate::error::SketchError;
use crate::store::SketchStore;

/// A resolved entity together with the store it lives in, so derived
/// geometry (endpoints, radius, world location) can follow references.
#[derive(Debug, Clone, Copy)]
pub struct EntityRef<'a> {
    pub id: EntityId,
    pub entity: &'a Entity,
    store: &'a SketchStore,
}

impl<'a> EntityRef<'a> {
    pub(crate) fn new(id: EntityId, entity: &'a Entity, store: &'a SketchStore) -> Self {
        Self { id, entity, store }
    }

    pub fn kind(&self) -> EntityKind {
        self.entity.kind()
    }

    pub fn is_point(&self) -> bool {
        self.kind().is_point()
    }

    pub fn is_line(&self) -> bool {
        self.kind().is_line()
    }

    pub fn is_curve(&self) -> bool {
        self.kind().is_curve()
    }

    pub fn is_workplane(&self) -> bool {
        self.kind().is_workplane()
    }

    pub fn is_2d(&self) -> bool {
        self.kind().is_2d()
    }

    pub fn is_3d(&self) -> bool {
        self.kind().is_3d()
    }

    pub fn sketch(&self) -> Option<SketchId> {
        self.entity.sketch()
    }

    fn wrong_kind(&self, expected: &'static str) -> SketchError {
        SketchError::WrongEntityKind {
            id: self.id,
            expected,
            found: self.kind(),
        }
    }

    /// First endpoint of a line or arc, origin point of a workplane.
    pub fn p1(&self) -> Result<EntityRef<'a>, SketchError> {
        match &self.entity.data {
            EntityData::Line3D { p1, .. }
            | EntityData::Line2D { p1, .. }
            | EntityData::Arc { p1, .. }
            | EntityData::Workplane { p1, .. } => self.store.entity(*p1),
            _ => Err(self.wrong_kind("line, arc or workplane")),
        }
    }

    pub fn p2(&self) -> Result<EntityRef<'a>, SketchError> {
        match &self.entity.data {
            EntityData::Line3D { p2, .. }
            | EntityData::Line2D { p2, .. }
            | EntityData::Arc { p2, .. } => self.store.entity(*p2),
            _ => Err(self.wrong_kind("line or arc")),
        }
    }

    /// Center point of a circle or arc.
    pub fn ct(&self) -> Result<EntityRef<'a>, SketchError> {
        match &self.entity.data {
            EntityData::Circle { ct, .. } | EntityData::Arc { ct, .. } => self.store.entity(*ct),
            _ => Err(self.wrong_kind("circle or arc")),
        }
    }

    /// Sketch-local coordinates of a 2D point.
    pub fn co(&self) -> Result<Vector2<f64>, SketchError> {
        match &self.entity.data {
            EntityData::Point2D { co, .. } => Ok(*co),
            _ => Err(self.wrong_kind("2D point")),
        }
    }

    /// World location of a point; 2D points are lifted through their
    /// sketch's workplane.
    pub fn location(&self) -> Result<Vector3<f64>, SketchError> {
        match &self.entity.data {
            EntityData::Point3D { location } => Ok(*location),
            EntityData::Point2D { sketch, co } => {
                let basis = self.store.sketch_basis(*sketch)?;
                Ok((basis * Point3::new(co.x, co.y, 0.0)).coords)
            }
            _ => Err(self.wrong_kind("point")),
        }
    }

    pub fn radius(&self) -> Result<f64, SketchError> {
        match &self.entity.data {
            EntityData::Circle { radius, .. } => Ok(*radius),
            EntityData::Arc { .. } => Ok((self.p1()?.co()? - self.ct()?.co()?).norm()),
            _ => Err(self.wrong_kind("circle or arc")),
        }
    }

    pub fn length(&self) -> Result<f64, SketchError> {
        match &self.entity.data {
            EntityData::Line2D { .. } => Ok(self.direction()?.norm()),
            EntityData::Line3D { .. } => Ok((self.p2()?.location()? - self.p1()?.location()?).norm()),
            _ => Err(self.wrong_kind("line")),
        }
    }

    /// `p2 - p1` of a 2D line, in sketch coordinates.
    pub fn direction(&self) -> Result<Vector2<f64>, SketchError> {
        match &self.entity.data {
            EntityData::Line2D { .. } => Ok(self.p2()?.co()? - self.p1()?.co()?),
            _ => Err(self.wrong_kind("2D line")),
        }
    }

    /// Unit normal of a workplane.
    pub fn normal(&self) -> Result<Vector3<f64>, SketchError> {
        match &self.entity.data {
            EntityData::Workplane { orientation, .. } => Ok(orientation * Vector3::z()),
            _ => Err(self.wrong_kind("workplane")),
        }
    }

    /// Origin and orientation of a workplane as a rigid transform.
    pub fn matrix_basis(&self) -> Result<Isometry3<f64>, SketchError> {
        match &self.entity.data {
            EntityData::Workplane { orientation, .. } => {
                let origin = self.p1()?.location()?;
                Ok(Isometry3::from_parts(Translation3::from(origin), *orientation))
            }
            _ => Err(self.wrong_kind("workplane")),
        }
    }
}
