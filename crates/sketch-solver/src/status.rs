use sketcher_types::SolverState;

use crate::solver::{FailReason, SolveOutcome};

/// Classify a backend outcome into the state stored on the sketch, plus the
/// remaining degrees of freedom on success.
pub fn classify_status(outcome: &SolveOutcome) -> (SolverState, Option<u32>) {
    match outcome {
        SolveOutcome::Okay { dof } => (SolverState::Okay, Some(*dof)),
        SolveOutcome::Failed { reason, .. } => (
            match reason {
                FailReason::Inconsistent => SolverState::Inconsistent,
                FailReason::DidntConverge => SolverState::DidntConverge,
                FailReason::TooManyUnknowns => SolverState::TooManyUnknowns,
            },
            None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_fail_reasons() {
        assert_eq!(
            classify_status(&SolveOutcome::Okay { dof: 3 }),
            (SolverState::Okay, Some(3))
        );
        let failed = |reason| SolveOutcome::Failed {
            reason,
            failed: Vec::new(),
        };
        assert_eq!(
            classify_status(&failed(FailReason::Inconsistent)).0,
            SolverState::Inconsistent
        );
        assert_eq!(
            classify_status(&failed(FailReason::DidntConverge)).0,
            SolverState::DidntConverge
        );
        assert_eq!(
            classify_status(&failed(FailReason::TooManyUnknowns)),
            (SolverState::TooManyUnknowns, None)
        );
    }
}
