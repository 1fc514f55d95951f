//! SolveSpace backend through the `slvs` bindings.
//!
//! slvs builds entities from initial values rather than from parameter
//! handles, so parameters are buffered here and copied into each entity when
//! it is created. After a successful solve the point and distance data are
//! read back into the buffered parameters.

use std::collections::HashMap;

use slvs::constraint::{
    Angle, AtMidpoint, Diameter, EqualLengthLines, EqualLineArcLen, EqualRadius, Horizontal,
    LengthRatio, Parallel, Perpendicular, PointsCoincident, PtInPlane, PtLineDistance, PtOnCircle,
    PtOnLine, PtPlaneDistance, PtPtDistance, Symmetric, SymmetricLine, Vertical,
};
use slvs::entity::{
    ArcOfCircle, Circle, Distance, EntityHandle as SlvsHandle, LineSegment, Normal, Point,
    Workplane,
};
use slvs::system::{FailReason as SlvsFailReason, SolveResult};
use slvs::System;
use tracing::warn;

use super::{
    ConstraintHandle, EntityHandle, FailReason, Group, ParamHandle, SolveOutcome, SolverBackend,
    SolverConstraint, SolverError,
};

#[derive(Clone, Copy)]
enum Element {
    Point {
        handle: SlvsHandle<Point>,
        params: [Option<ParamHandle>; 3],
    },
    Normal(SlvsHandle<Normal>),
    Distance {
        handle: SlvsHandle<Distance>,
        param: ParamHandle,
    },
    Line(SlvsHandle<LineSegment>),
    Circle(SlvsHandle<Circle>),
    Arc(SlvsHandle<ArcOfCircle>),
    Workplane(SlvsHandle<Workplane>),
}

/// Maps the adapter contract onto a SolveSpace system.
pub struct SlvsSolver {
    system: System,
    groups: HashMap<Group, slvs::group::Group>,
    params: Vec<f64>,
    elements: Vec<Element>,
    constraints: u32,
}

impl Default for SlvsSolver {
    fn default() -> Self {
        Self::new()
    }
}

fn backend_error(err: impl std::fmt::Debug) -> SolverError {
    SolverError::Backend {
        reason: format!("{err:?}"),
    }
}

impl SlvsSolver {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            groups: HashMap::new(),
            params: Vec::new(),
            elements: Vec::new(),
            constraints: 0,
        }
    }

    /// slvs groups are created in ascending order; every group up to the
    /// requested one is allocated on first use.
    fn group(&mut self, group: Group) -> slvs::group::Group {
        while !self.groups.contains_key(&group) {
            let next = Group(self.groups.len() as u32 + 1);
            let created = self.system.add_group();
            self.groups.insert(next, created);
        }
        self.groups[&group]
    }

    fn value(&self, param: ParamHandle) -> Result<f64, SolverError> {
        self.param_value(param)
    }

    fn push(&mut self, element: Element) -> EntityHandle {
        self.elements.push(element);
        EntityHandle(self.elements.len() as u32 - 1)
    }

    fn element(&self, handle: EntityHandle) -> Result<Element, SolverError> {
        self.elements
            .get(handle.0 as usize)
            .copied()
            .ok_or(SolverError::UnknownEntity(handle))
    }

    fn point(&self, handle: EntityHandle) -> Result<SlvsHandle<Point>, SolverError> {
        match self.element(handle)? {
            Element::Point { handle, .. } => Ok(handle),
            _ => Err(SolverError::WrongEntity {
                handle,
                expected: "point",
            }),
        }
    }

    fn normal(&self, handle: EntityHandle) -> Result<SlvsHandle<Normal>, SolverError> {
        match self.element(handle)? {
            Element::Normal(normal) => Ok(normal),
            _ => Err(SolverError::WrongEntity {
                handle,
                expected: "normal",
            }),
        }
    }

    fn line(&self, handle: EntityHandle) -> Result<SlvsHandle<LineSegment>, SolverError> {
        match self.element(handle)? {
            Element::Line(line) => Ok(line),
            _ => Err(SolverError::WrongEntity {
                handle,
                expected: "line",
            }),
        }
    }

    fn workplane(&self, handle: EntityHandle) -> Result<SlvsHandle<Workplane>, SolverError> {
        match self.element(handle)? {
            Element::Workplane(wp) => Ok(wp),
            _ => Err(SolverError::WrongEntity {
                handle,
                expected: "workplane",
            }),
        }
    }

    fn workplane_opt(
        &self,
        handle: Option<EntityHandle>,
    ) -> Result<Option<SlvsHandle<Workplane>>, SolverError> {
        handle.map(|h| self.workplane(h)).transpose()
    }

    fn arc(&self, handle: EntityHandle) -> Result<SlvsHandle<ArcOfCircle>, SolverError> {
        match self.element(handle)? {
            Element::Arc(arc) => Ok(arc),
            _ => Err(SolverError::WrongEntity {
                handle,
                expected: "arc",
            }),
        }
    }

    fn constrain(&mut self, constraint: SolverConstraint, g: slvs::group::Group) -> Result<(), SolverError> {
        use SolverConstraint as C;

        match constraint {
            C::PointsDistance {
                value,
                p1,
                p2,
                workplane,
            } => {
                let c = PtPtDistance::new(g, self.point(p1)?, self.point(p2)?, value, self.workplane_opt(workplane)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::PointLineDistance {
                value,
                point,
                line,
                workplane,
            } => {
                let c = PtLineDistance::new(g, self.point(point)?, self.line(line)?, value, self.workplane_opt(workplane)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::PointPlaneDistance { value, point, plane } => {
                let c = PtPlaneDistance::new(g, self.point(point)?, self.workplane(plane)?, value);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::PointsCoincident { p1, p2, workplane } => {
                let c = PointsCoincident::new(g, self.point(p1)?, self.point(p2)?, self.workplane_opt(workplane)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::PointInPlane { point, plane } => {
                let c = PtInPlane::new(g, self.point(point)?, self.workplane(plane)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::PointOnLine {
                point,
                line,
                workplane,
            } => {
                let c = PtOnLine::new(g, self.point(point)?, self.line(line)?, self.workplane_opt(workplane)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::PointOnCircle { point, circle } => {
                let pt = self.point(point)?;
                match self.element(circle)? {
                    Element::Circle(c) => self.system.constrain(PtOnCircle::new(g, pt, c)).map(drop),
                    Element::Arc(a) => self.system.constrain(PtOnCircle::new(g, pt, a)).map(drop),
                    _ => return Err(SolverError::WrongEntity { handle: circle, expected: "circle or arc" }),
                }
                .map_err(backend_error)?;
            }
            C::PointsHorizontal { p1, p2, workplane } => {
                let c = Horizontal::from_points(g, self.workplane(workplane)?, self.point(p1)?, self.point(p2)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::PointsVertical { p1, p2, workplane } => {
                let c = Vertical::from_points(g, self.workplane(workplane)?, self.point(p1)?, self.point(p2)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::LineHorizontal { line, workplane } => {
                let c = Horizontal::from_line(g, self.workplane(workplane)?, self.line(line)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::LineVertical { line, workplane } => {
                let c = Vertical::from_line(g, self.workplane(workplane)?, self.line(line)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::EqualLength { l1, l2, workplane } => {
                let c = EqualLengthLines::new(g, self.line(l1)?, self.line(l2)?, self.workplane_opt(workplane)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::EqualRadius { c1, c2 } => {
                match (self.element(c1)?, self.element(c2)?) {
                    (Element::Circle(a), Element::Circle(b)) => self.system.constrain(EqualRadius::new(g, a, b)).map(drop),
                    (Element::Circle(a), Element::Arc(b)) => self.system.constrain(EqualRadius::new(g, a, b)).map(drop),
                    (Element::Arc(a), Element::Circle(b)) => self.system.constrain(EqualRadius::new(g, a, b)).map(drop),
                    (Element::Arc(a), Element::Arc(b)) => self.system.constrain(EqualRadius::new(g, a, b)).map(drop),
                    _ => return Err(SolverError::WrongEntity { handle: c1, expected: "circle or arc" }),
                }
                .map_err(backend_error)?;
            }
            C::EqualLineArcLength {
                line,
                arc,
                workplane,
            } => {
                let c = EqualLineArcLen::new(g, self.line(line)?, self.arc(arc)?, self.workplane_opt(workplane)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::Parallel { l1, l2, workplane } => {
                let c = Parallel::new(g, self.line(l1)?, self.line(l2)?, self.workplane_opt(workplane)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::Perpendicular { l1, l2, workplane } => {
                let c = Perpendicular::new(g, self.line(l1)?, self.line(l2)?, self.workplane_opt(workplane)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::Angle {
                degrees,
                supplementary,
                l1,
                l2,
                workplane,
            } => {
                let c = Angle::new(g, self.line(l1)?, self.line(l2)?, degrees, self.workplane_opt(workplane)?, supplementary);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::Diameter { value, circle } => {
                match self.element(circle)? {
                    Element::Circle(c) => self.system.constrain(Diameter::new(g, c, value)).map(drop),
                    Element::Arc(a) => self.system.constrain(Diameter::new(g, a, value)).map(drop),
                    _ => return Err(SolverError::WrongEntity { handle: circle, expected: "circle or arc" }),
                }
                .map_err(backend_error)?;
            }
            C::Midpoint {
                point,
                line,
                workplane,
            } => {
                let c = AtMidpoint::new(g, self.point(point)?, self.line(line)?, self.workplane_opt(workplane)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::LengthRatio {
                value,
                l1,
                l2,
                workplane,
            } => {
                let c = LengthRatio::new(g, self.line(l1)?, self.line(l2)?, value, self.workplane_opt(workplane)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::SymmetricLine {
                p1,
                p2,
                line,
                workplane,
            } => {
                let c = SymmetricLine::new(g, self.workplane(workplane)?, self.point(p1)?, self.point(p2)?, self.line(line)?);
                self.system.constrain(c).map_err(backend_error)?;
            }
            C::SymmetricPlane { p1, p2, plane } => {
                let c = Symmetric::new(g, self.point(p1)?, self.point(p2)?, self.workplane(plane)?, None);
                self.system.constrain(c).map_err(backend_error)?;
            }
        }
        Ok(())
    }

    /// Copies solved entity data back into the buffered parameters.
    fn read_back(&mut self) {
        for element in self.elements.clone() {
            match element {
                Element::Point { handle, params } => {
                    let coords: Vec<f64> = match self.system.entity_data(&handle) {
                        Ok(Point::OnWorkplane { coords, .. }) => coords.to_vec(),
                        Ok(Point::In3d { coords, .. }) => coords.to_vec(),
                        Err(err) => {
                            warn!(?err, "cannot read solved point");
                            continue;
                        }
                    };
                    for (param, value) in params.iter().zip(coords) {
                        if let Some(param) = param {
                            self.params[param.0 as usize] = value;
                        }
                    }
                }
                Element::Distance { handle, param } => match self.system.entity_data(&handle) {
                    Ok(distance) => self.params[param.0 as usize] = distance.val,
                    Err(err) => warn!(?err, "cannot read solved distance"),
                },
                _ => {}
            }
        }
    }
}

impl SolverBackend for SlvsSolver {
    fn add_param(&mut self, value: f64, _group: Group) -> ParamHandle {
        self.params.push(value);
        ParamHandle(self.params.len() as u32 - 1)
    }

    fn add_point_2d(
        &mut self,
        workplane: EntityHandle,
        u: ParamHandle,
        v: ParamHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError> {
        let g = self.group(group);
        let wp = self.workplane(workplane)?;
        let coords = [self.value(u)?, self.value(v)?];
        let handle = self
            .system
            .sketch(Point::new_on_workplane(g, wp, coords))
            .map_err(backend_error)?;
        Ok(self.push(Element::Point {
            handle,
            params: [Some(u), Some(v), None],
        }))
    }

    fn add_point_3d(
        &mut self,
        x: ParamHandle,
        y: ParamHandle,
        z: ParamHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError> {
        let g = self.group(group);
        let coords = [self.value(x)?, self.value(y)?, self.value(z)?];
        let handle = self
            .system
            .sketch(Point::new_in_3d(g, coords))
            .map_err(backend_error)?;
        Ok(self.push(Element::Point {
            handle,
            params: [Some(x), Some(y), Some(z)],
        }))
    }

    fn add_normal_3d(&mut self, quaternion: [ParamHandle; 4], group: Group) -> Result<EntityHandle, SolverError> {
        let g = self.group(group);
        let mut q = [0.0; 4];
        for (slot, param) in q.iter_mut().zip(quaternion) {
            *slot = self.value(param)?;
        }
        let handle = self
            .system
            .sketch(Normal::new_in_3d(g, q))
            .map_err(backend_error)?;
        Ok(self.push(Element::Normal(handle)))
    }

    fn add_normal_2d(&mut self, workplane: EntityHandle, group: Group) -> Result<EntityHandle, SolverError> {
        let g = self.group(group);
        let wp = self.workplane(workplane)?;
        let handle = self
            .system
            .sketch(Normal::new_on_workplane(g, wp))
            .map_err(backend_error)?;
        Ok(self.push(Element::Normal(handle)))
    }

    fn add_distance(&mut self, value: ParamHandle, group: Group) -> Result<EntityHandle, SolverError> {
        let g = self.group(group);
        let handle = self
            .system
            .sketch(Distance::new(g, self.value(value)?))
            .map_err(backend_error)?;
        Ok(self.push(Element::Distance {
            handle,
            param: value,
        }))
    }

    fn add_line(
        &mut self,
        p1: EntityHandle,
        p2: EntityHandle,
        _workplane: Option<EntityHandle>,
        group: Group,
    ) -> Result<EntityHandle, SolverError> {
        let g = self.group(group);
        let handle = self
            .system
            .sketch(LineSegment::new(g, self.point(p1)?, self.point(p2)?))
            .map_err(backend_error)?;
        Ok(self.push(Element::Line(handle)))
    }

    fn add_circle(
        &mut self,
        normal: EntityHandle,
        center: EntityHandle,
        radius: EntityHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError> {
        let g = self.group(group);
        let radius = match self.element(radius)? {
            Element::Distance { handle, .. } => handle,
            _ => {
                return Err(SolverError::WrongEntity {
                    handle: radius,
                    expected: "distance",
                })
            }
        };
        let handle = self
            .system
            .sketch(Circle::new(g, self.normal(normal)?, self.point(center)?, radius))
            .map_err(backend_error)?;
        Ok(self.push(Element::Circle(handle)))
    }

    fn add_arc(
        &mut self,
        workplane: EntityHandle,
        center: EntityHandle,
        start: EntityHandle,
        end: EntityHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError> {
        let g = self.group(group);
        let handle = self
            .system
            .sketch(ArcOfCircle::new(
                g,
                self.workplane(workplane)?,
                self.point(center)?,
                self.point(start)?,
                self.point(end)?,
            ))
            .map_err(backend_error)?;
        Ok(self.push(Element::Arc(handle)))
    }

    fn add_workplane(
        &mut self,
        origin: EntityHandle,
        normal: EntityHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError> {
        let g = self.group(group);
        let handle = self
            .system
            .sketch(Workplane::new(g, self.point(origin)?, self.normal(normal)?))
            .map_err(backend_error)?;
        Ok(self.push(Element::Workplane(handle)))
    }

    fn add_constraint(
        &mut self,
        constraint: SolverConstraint,
        group: Group,
    ) -> Result<ConstraintHandle, SolverError> {
        let g = self.group(group);
        self.constrain(constraint, g)?;
        self.constraints += 1;
        Ok(ConstraintHandle(self.constraints))
    }

    fn solve(&mut self, group: Group) -> SolveOutcome {
        let g = self.group(group);
        match self.system.solve(&g) {
            SolveResult::Ok { dof } => {
                self.read_back();
                SolveOutcome::Okay { dof: dof as u32 }
            }
            SolveResult::Fail { reason, .. } => {
                let reason = match reason {
                    SlvsFailReason::Inconsistent => FailReason::Inconsistent,
                    SlvsFailReason::TooManyUnknowns => FailReason::TooManyUnknowns,
                    _ => FailReason::DidntConverge,
                };
                SolveOutcome::Failed {
                    reason,
                    failed: Vec::new(),
                }
            }
        }
    }

    fn param_value(&self, param: ParamHandle) -> Result<f64, SolverError> {
        self.params
            .get(param.0 as usize)
            .copied()
            .ok_or(SolverError::UnknownParam(param))
    }
}
