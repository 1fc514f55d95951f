use super::{
    ConstraintHandle, EntityHandle, Group, ParamHandle, SolveOutcome, SolverBackend,
    SolverConstraint, SolverError,
};

/// A call made against [`MockSolver`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Param {
        handle: ParamHandle,
        value: f64,
        group: Group,
    },
    Point2d {
        handle: EntityHandle,
        workplane: EntityHandle,
        params: [ParamHandle; 2],
        group: Group,
    },
    Point3d {
        handle: EntityHandle,
        params: [ParamHandle; 3],
        group: Group,
    },
    Entity {
        handle: EntityHandle,
        kind: &'static str,
        group: Group,
    },
    Constraint {
        handle: ConstraintHandle,
        constraint: SolverConstraint,
        group: Group,
    },
    Solve {
        group: Group,
    },
}

/// Backend that records every call and answers `solve` with a preset
/// outcome without moving any parameter.
#[derive(Debug, Clone)]
pub struct MockSolver {
    pub calls: Vec<RecordedCall>,
    params: Vec<f64>,
    next_entity: u32,
    next_constraint: u32,
    outcome: SolveOutcome,
}

impl Default for MockSolver {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            params: Vec::new(),
            next_entity: 0,
            next_constraint: 0,
            outcome: SolveOutcome::Okay { dof: 0 },
        }
    }
}

impl MockSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `solve` return `outcome`.
    pub fn with_outcome(mut self, outcome: SolveOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Overrides a parameter, as a real solver would after a successful pass.
    pub fn set_param(&mut self, param: ParamHandle, value: f64) -> Result<(), SolverError> {
        let slot = self
            .params
            .get_mut(param.0 as usize)
            .ok_or(SolverError::UnknownParam(param))?;
        *slot = value;
        Ok(())
    }

    /// Emitted constraints, in order.
    pub fn constraints(&self) -> Vec<(ConstraintHandle, SolverConstraint, Group)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Constraint {
                    handle,
                    constraint,
                    group,
                } => Some((*handle, constraint.clone(), *group)),
                _ => None,
            })
            .collect()
    }

    /// Parameter handles of a workplane point.
    pub fn point_2d_params(&self, point: EntityHandle) -> Option<[ParamHandle; 2]> {
        self.calls.iter().find_map(|call| match call {
            RecordedCall::Point2d { handle, params, .. } if *handle == point => Some(*params),
            _ => None,
        })
    }

    fn entity(&mut self, kind: &'static str, group: Group) -> EntityHandle {
        let handle = self.next_handle();
        self.calls.push(RecordedCall::Entity {
            handle,
            kind,
            group,
        });
        handle
    }

    fn next_handle(&mut self) -> EntityHandle {
        self.next_entity += 1;
        EntityHandle(self.next_entity)
    }
}

impl SolverBackend for MockSolver {
    fn add_param(&mut self, value: f64, group: Group) -> ParamHandle {
        let handle = ParamHandle(self.params.len() as u32);
        self.params.push(value);
        self.calls.push(RecordedCall::Param {
            handle,
            value,
            group,
        });
        handle
    }

    fn add_point_2d(
        &mut self,
        workplane: EntityHandle,
        u: ParamHandle,
        v: ParamHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError> {
        let handle = self.next_handle();
        self.calls.push(RecordedCall::Point2d {
            handle,
            workplane,
            params: [u, v],
            group,
        });
        Ok(handle)
    }

    fn add_point_3d(
        &mut self,
        x: ParamHandle,
        y: ParamHandle,
        z: ParamHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError> {
        let handle = self.next_handle();
        self.calls.push(RecordedCall::Point3d {
            handle,
            params: [x, y, z],
            group,
        });
        Ok(handle)
    }

    fn add_normal_3d(&mut self, _quaternion: [ParamHandle; 4], group: Group) -> Result<EntityHandle, SolverError> {
        Ok(self.entity("normal 3d", group))
    }

    fn add_normal_2d(&mut self, _workplane: EntityHandle, group: Group) -> Result<EntityHandle, SolverError> {
        Ok(self.entity("normal 2d", group))
    }

    fn add_distance(&mut self, _value: ParamHandle, group: Group) -> Result<EntityHandle, SolverError> {
        Ok(self.entity("distance", group))
    }

    fn add_line(
        &mut self,
        _p1: EntityHandle,
        _p2: EntityHandle,
        _workplane: Option<EntityHandle>,
        group: Group,
    ) -> Result<EntityHandle, SolverError> {
        Ok(self.entity("line", group))
    }

    fn add_circle(
        &mut self,
        _normal: EntityHandle,
        _center: EntityHandle,
        _radius: EntityHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError> {
        Ok(self.entity("circle", group))
    }

    fn add_arc(
        &mut self,
        _workplane: EntityHandle,
        _center: EntityHandle,
        _start: EntityHandle,
        _end: EntityHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError> {
        Ok(self.entity("arc", group))
    }

    fn add_workplane(
        &mut self,
        _origin: EntityHandle,
        _normal: EntityHandle,
        group: Group,
    ) -> Result<EntityHandle, SolverError> {
        Ok(self.entity("workplane", group))
    }

    fn add_constraint(
        &mut self,
        constraint: SolverConstraint,
        group: Group,
    ) -> Result<ConstraintHandle, SolverError> {
        self.next_constraint += 1;
        let handle = ConstraintHandle(self.next_constraint);
        self.calls.push(RecordedCall::Constraint {
            handle,
            constraint,
            group,
        });
        Ok(handle)
    }

    fn solve(&mut self, group: Group) -> SolveOutcome {
        self.calls.push(RecordedCall::Solve { group });
        self.outcome.clone()
    }

    fn param_value(&self, param: ParamHandle) -> Result<f64, SolverError> {
        self.params
            .get(param.0 as usize)
            .copied()
            .ok_or(SolverError::UnknownParam(param))
    }
}
