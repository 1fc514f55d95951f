use std::f64::consts::TAU;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use sketcher_types::{Alignment, EntityKind, WorkplaneRequirement};

use super::{magnitude, non_negative, Emitter, InitialValue, Slots, Translator};
use crate::entity::EntityRef;
use crate::error::SketchError;
use crate::geometry::{
    angle_signed, distance_point_to_plane, intersect_point_line, project, range_2pi, side_of_line,
    Placement2d,
};
use crate::solver::ConstraintHandle;

const SLOT1: &[EntityKind] = &[
    EntityKind::Point3D,
    EntityKind::Point2D,
    EntityKind::Line3D,
    EntityKind::Line2D,
    EntityKind::Circle,
    EntityKind::Arc,
];
const SLOT2: &[EntityKind] = &[
    EntityKind::Point3D,
    EntityKind::Point2D,
    EntityKind::Line3D,
    EntityKind::Line2D,
    EntityKind::Workplane,
];
const SLOT1_3D: &[EntityKind] = &[EntityKind::Point3D];
const SLOT2_3D: &[EntityKind] = &[EntityKind::Point3D, EntityKind::Line3D, EntityKind::Workplane];
const SLOT2_2D: &[EntityKind] = &[EntityKind::Point2D, EntityKind::Line2D];

/// Distance between two points, a point and a line, a point and a plane, a
/// curve and a point or line, or the length of a single line.
///
/// `value` is always stored non-negative. For flippable pairings the side of
/// the line or plane the point sits on is carried by `flip`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distance {
    #[serde(deserialize_with = "non_negative")]
    value: f64,
    #[serde(default)]
    pub flip: bool,
    #[serde(default)]
    pub align: Alignment,
    #[serde(default = "default_draw_offset")]
    pub draw_offset: f64,
    #[serde(default)]
    pub draw_outset: f64,
}

fn default_draw_offset() -> f64 {
    0.3
}

impl Default for Distance {
    fn default() -> Self {
        Self {
            value: 0.0,
            flip: false,
            align: Alignment::None,
            draw_offset: default_draw_offset(),
            draw_outset: 0.0,
        }
    }
}

/// Splits a signed value into its stored magnitude and sign flag.
pub fn normalize_signed(raw: f64) -> Result<(f64, bool), SketchError> {
    Ok((magnitude(raw)?, raw.is_sign_negative() && raw != 0.0))
}

impl Distance {
    /// Non-finite input leaves the value at zero.
    pub fn new(value: f64) -> Self {
        Self {
            value: magnitude(value).unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) -> Result<(), SketchError> {
        self.value = magnitude(value)?;
        Ok(())
    }

    /// Stores a signed value: the magnitude as `value`, the sign in `flip`.
    pub fn set_signed_value(&mut self, raw: f64) -> Result<(), SketchError> {
        let (value, flip) = normalize_signed(raw)?;
        self.value = value;
        self.flip = flip;
        Ok(())
    }

    /// Only distances from a point to a line or plane have a side.
    pub fn use_flipping(slots: &Slots<'_>) -> bool {
        if slots.entity1.is_curve() {
            return false;
        }
        slots
            .entity2
            .is_some_and(|e| e.is_line() || e.is_workplane())
    }

    /// Whether `align` applies to this pairing.
    pub fn use_align(slots: &Slots<'_>) -> bool {
        if slots.entity1.is_curve() {
            return false;
        }
        !slots
            .entity2
            .is_some_and(|e| e.is_line() || e.is_workplane())
    }

    /// Signed value handed to the solver.
    pub fn effective_value(&self, slots: &Slots<'_>) -> f64 {
        if self.flip && Self::use_flipping(slots) {
            -self.value
        } else {
            self.value
        }
    }

    fn aligned(&self, slots: &Slots<'_>) -> bool {
        self.align != Alignment::None && Self::use_align(slots)
    }

    /// Whether the value text fits between the extension lines.
    pub fn text_inside(&self, ui_scale: f64) -> bool {
        ui_scale * self.draw_outset.abs() < self.value / 2.0
    }

    /// Stores a label position given in the placement frame.
    pub fn update_draw_offset(&mut self, pos: Vector2<f64>, ui_scale: f64) {
        self.draw_offset = pos.y / ui_scale;
        self.draw_outset = pos.x / ui_scale;
    }

    fn point_line_value(point: EntityRef<'_>, line: EntityRef<'_>) -> Result<f64, SketchError> {
        if point.is_2d() && line.is_2d() {
            let start = line.p1()?.co()?;
            let end = line.p2()?.co()?;
            let co = point.co()?;
            let rel = co - start;
            let dist = (rel - project(&rel, &(end - start))).norm();
            return Ok(dist.copysign(side_of_line(&start, &end, &co)));
        }
        let a = line.p1()?.location()?;
        let b = line.p2()?.location()?;
        let p = point.location()?;
        let (foot, _) = intersect_point_line(&p, &a, &b);
        Ok((p - foot).norm())
    }

    /// Point on the curve facing `target`, falling back to a defined point
    /// when `target` coincides with the center.
    fn curve_point(
        center: Vector2<f64>,
        radius: f64,
        target: Vector2<f64>,
        partner: EntityRef<'_>,
    ) -> Result<Vector2<f64>, SketchError> {
        let dir = target - center;
        let len = dir.norm();
        if len > 0.0 {
            return Ok(center + dir / len * radius);
        }
        if partner.is_line() {
            return partner.p1()?.co();
        }
        Ok(center + Vector2::new(radius, 0.0))
    }

    fn alignment_axis(&self) -> Option<Vector2<f64>> {
        match self.align {
            Alignment::Horizontal => Some(Vector2::x()),
            Alignment::Vertical => Some(Vector2::y()),
            Alignment::None => None,
        }
    }
}

impl Translator for Distance {
    fn legal_types(slot: usize, entities: [Option<EntityKind>; 2]) -> Option<&'static [EntityKind]> {
        let other = super::other_slot(slot, entities);
        match other {
            Some(kind) if slot == 1 && kind.is_line() => None,
            Some(kind) if kind.is_3d() => Some(if slot == 0 { SLOT1_3D } else { SLOT2_3D }),
            Some(_) => Some(if slot == 0 { EntityKind::POINT_2D } else { SLOT2_2D }),
            None => Some(if slot == 0 { SLOT1 } else { SLOT2 }),
        }
    }

    fn workplane_requirement(&self, slots: &Slots<'_>) -> WorkplaneRequirement {
        if slots.entity2.is_some_and(|e| e.is_workplane()) {
            WorkplaneRequirement::Free
        } else {
            WorkplaneRequirement::Optional
        }
    }

    fn init_props(&mut self, slots: &Slots<'_>) -> Result<InitialValue, SketchError> {
        let e1 = slots.entity1;
        let raw = if e1.is_line() {
            e1.length()?
        } else if e1.is_curve() {
            let center = e1.ct()?.co()?;
            let e2 = slots.entity2()?;
            let endpoint = if e2.is_line() {
                intersect_point_line(&center, &e2.p1()?.co()?, &e2.p2()?.co()?).0
            } else {
                e2.co()?
            };
            (center - endpoint).norm() - e1.radius()?
        } else {
            let e2 = slots.entity2()?;
            if e2.is_workplane() {
                distance_point_to_plane(&e1.location()?, &e2.p1()?.location()?, &e2.normal()?)
            } else if e2.is_line() {
                Self::point_line_value(e1, e2)?
            } else {
                (e1.location()? - e2.location()?).norm()
            }
        };

        self.set_value(raw)?;
        if raw < 0.0 && Self::use_flipping(slots) {
            self.flip = !self.flip;
        }
        Ok(InitialValue::with_auxiliary(self.value, self.flip))
    }

    fn emit(
        &self,
        slots: &Slots<'_>,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ConstraintHandle>, SketchError> {
        let (e1, e2) = if slots.entity1.is_line() {
            (slots.entity1.p1()?, slots.entity1.p2()?)
        } else {
            (slots.entity1, slots.entity2()?)
        };
        let workplane = emitter.workplane(slots)?;
        let value = self.effective_value(slots);

        if e1.is_curve() {
            let center = emitter.handle(e1.ct()?.id)?;
            let target = value + e1.radius()?;
            let partner = emitter.handle(e2.id)?;
            let handle = if e2.is_line() {
                emitter.point_line_distance(target, center, partner, workplane)?
            } else {
                emitter.points_distance(target, center, partner, workplane)?
            };
            return Ok(vec![handle]);
        }

        let h1 = emitter.handle(e1.id)?;
        let h2 = emitter.handle(e2.id)?;
        if e2.is_line() {
            return Ok(vec![emitter.point_line_distance(value, h1, h2, workplane)?]);
        }
        if e2.is_workplane() {
            return Ok(vec![emitter.point_plane_distance(value, h1, h2)?]);
        }
        if self.aligned(slots) && e1.is_2d() && e2.is_2d() {
            let wp = emitter.require_workplane(slots)?;
            let start = Vector2::new(e2.co()?.x, e1.co()?.y);
            let aux = emitter.aux_point(wp, start)?;
            let horizontal = emitter.points_horizontal(aux, h2, wp)?;
            let vertical = emitter.points_vertical(aux, h1, wp)?;
            let anchor = if self.align == Alignment::Vertical { h1 } else { h2 };
            let distance = emitter.points_distance(value, aux, anchor, Some(wp))?;
            return Ok(vec![horizontal, vertical, distance]);
        }
        Ok(vec![emitter.points_distance(value, h1, h2, workplane)?])
    }

    fn placement(&self, slots: &Slots<'_>) -> Result<Option<Placement2d>, SketchError> {
        let axis = if self.aligned(slots) {
            self.alignment_axis()
        } else {
            None
        };
        let e1 = slots.entity1;

        if e1.is_line() {
            let p1 = e1.p1()?.co()?;
            let p2 = e1.p2()?.co()?;
            return Ok(Some(Placement2d::between(&p1, &p2, axis)));
        }

        let e2 = slots.entity2()?;
        if e1.is_curve() {
            let center = e1.ct()?.co()?;
            let p2 = if e2.is_line() {
                intersect_point_line(&center, &e2.p1()?.co()?, &e2.p2()?.co()?).0
            } else {
                e2.co()?
            };
            let p1 = Self::curve_point(center, e1.radius()?, p2, e2)?;
            return Ok(Some(Placement2d::between(&p1, &p2, axis)));
        }

        let p1 = e1.co()?;
        if e2.is_point() {
            return Ok(Some(Placement2d::between(&p1, &e2.co()?, axis)));
        }
        if e2.kind() == EntityKind::Line2D {
            let origin = e2.p1()?.co()?;
            let dir = e2.p2()?.co()? - origin;
            let rotation = TAU / 4.0 + range_2pi(angle_signed(&dir));
            let rel = p1 - origin;
            let translation = origin + (rel + project(&rel, &dir)) / 2.0;
            return Ok(Some(Placement2d::new(translation, rotation)));
        }
        Ok(None)
    }

    fn label_offset(&self, ui_scale: f64) -> Option<Vector2<f64>> {
        Some(Vector2::new(self.draw_outset, self.draw_offset) * ui_scale)
    }
}
