//! Step status derivation for a workflow session.
//!
//! The backend owns execution and dependency enforcement. This module only
//! derives what each step should look like from a read-only snapshot of the
//! workflow definition and the session, and turns execution responses into
//! the next snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::workflows::errors::WorkflowError;
use crate::workflows::state_machine::TransitionResult;
use crate::workflows::types::{ExecutionResponse, SessionStatus, Workflow, WorkflowSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Current,
    Blocked,
    #[default]
    Pending,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Completed => "completed",
            StepStatus::Current => "current",
            StepStatus::Blocked => "blocked",
            StepStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view over one (workflow, session) snapshot.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowProgressModel<'a> {
    workflow: &'a Workflow,
    session: &'a WorkflowSession,
}

impl<'a> WorkflowProgressModel<'a> {
    pub fn new(workflow: &'a Workflow, session: &'a WorkflowSession) -> Self {
        Self { workflow, session }
    }

    pub fn workflow(&self) -> &'a Workflow {
        self.workflow
    }

    pub fn session(&self) -> &'a WorkflowSession {
        self.session
    }

    /// Derive the display status of one step.
    ///
    /// A recorded result always wins, so a step never regresses from
    /// `Completed` even if `current_step` moves backwards. A dependency that
    /// points outside the workflow (or forward) is reported as a validation
    /// error rather than being treated as satisfied or unsatisfied.
    pub fn status_of(&self, step_index: usize) -> Result<StepStatus, WorkflowError> {
        let step = self.workflow.validate_step(step_index)?;
        let current_step = self.session.current_step;

        if step_index + 1 < current_step || self.session.has_result(step_index) {
            return Ok(StepStatus::Completed);
        }

        if self.current_step_index() == Some(step_index) {
            return Ok(StepStatus::Current);
        }

        let blocked = step
            .depends_on
            .iter()
            .any(|dependency| !self.session.has_result(*dependency));

        Ok(if blocked {
            StepStatus::Blocked
        } else {
            StepStatus::Pending
        })
    }

    /// Status of every step, in workflow order
    pub fn statuses(&self) -> Result<Vec<StepStatus>, WorkflowError> {
        (0..self.workflow.steps.len())
            .map(|index| self.status_of(index))
            .collect()
    }

    /// Index of the step shown as current, if any.
    ///
    /// That is the most recently attempted step (`current_step - 1`) until its
    /// result is recorded, after which focus moves to `current_step`. Nothing
    /// is current before the first execution or once the session is terminal.
    pub fn current_step_index(&self) -> Option<usize> {
        let current_step = self.session.current_step;
        if current_step == 0 || self.session.status.is_terminal() {
            return None;
        }

        let attempted = current_step - 1;
        let index = if self.session.has_result(attempted) {
            current_step
        } else {
            attempted
        };

        (index < self.workflow.steps.len()).then_some(index)
    }

    /// The step a user would act on next: the current step, else the first
    /// step whose dependencies are all satisfied.
    pub fn next_actionable_step(&self) -> Result<Option<usize>, WorkflowError> {
        if self.session.status.is_terminal() {
            return Ok(None);
        }

        let statuses = self.statuses()?;
        Ok(statuses
            .iter()
            .position(|status| *status == StepStatus::Current)
            .or_else(|| statuses.iter().position(|status| *status == StepStatus::Pending)))
    }

    /// Whether "execute next step" should be offered.
    ///
    /// Only the session status matters: `Blocked` is advisory and the backend
    /// decides whether a step may really run.
    pub fn is_executable(&self) -> bool {
        self.session.status == SessionStatus::InProgress
    }

    /// Apply an execution response and return the next session snapshot.
    ///
    /// The result is stored at `response.current_step - 1`. The current
    /// snapshot is left untouched whether or not this succeeds.
    pub fn advance(&self, response: ExecutionResponse) -> Result<WorkflowSession, WorkflowError> {
        let session = self.session;

        if session.status.is_terminal() {
            return Err(WorkflowError::InvalidState {
                session_id: session.id,
                status: session.status,
                reason: "a finished session cannot be advanced".to_string(),
            });
        }

        if response.current_step < 1 {
            return Err(WorkflowError::protocol(format!(
                "execution response for session {} reports current_step {}, so no executed step can be identified",
                session.id, response.current_step
            )));
        }

        let executed = usize::try_from(response.current_step - 1).map_err(|_| {
            WorkflowError::protocol(format!(
                "current_step {} does not fit a step index",
                response.current_step
            ))
        })?;

        if executed >= self.workflow.steps.len() {
            return Err(WorkflowError::protocol(format!(
                "execution response for session {} reports step {} but workflow {} has {} steps",
                session.id,
                executed,
                self.workflow.id,
                self.workflow.steps.len()
            )));
        }

        if let TransitionResult::Rejected { reason, .. } = session.status.transition_to(response.status) {
            return Err(WorkflowError::protocol(format!(
                "session {} cannot move from {} to {}: {}",
                session.id, session.status, response.status, reason
            )));
        }

        if session.has_result(executed) {
            return Err(WorkflowError::protocol(format!(
                "session {} already has a result for step {}",
                session.id, executed
            )));
        }

        let result = response.recorded_result();
        let mut next = session.clone();
        next.status = response.status;
        next.current_step = executed + 1;
        next.results.insert(executed, result);

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::types::{StepResult, WorkflowStep};
    use crate::workflows::ErrorKind;

    fn workflow(steps: Vec<WorkflowStep>) -> Workflow {
        Workflow {
            id: 1,
            name: "Research".to_string(),
            description: String::new(),
            steps,
            is_public: true,
            owner_id: Some(1),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(StepStatus::default(), StepStatus::Pending);
    }

    #[test]
    fn test_out_of_range_dependency_is_validation_error() {
        let workflow = workflow(vec![WorkflowStep::new("a"), WorkflowStep::new("b").depending_on([9])]);
        let session = WorkflowSession::pending(1, 1, 1);
        let model = WorkflowProgressModel::new(&workflow, &session);

        let err = model.status_of(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(model.status_of(0).unwrap(), StepStatus::Pending);
    }

    #[test]
    fn test_step_index_out_of_range() {
        let workflow = workflow(vec![WorkflowStep::new("a")]);
        let session = WorkflowSession::pending(1, 1, 1);
        let model = WorkflowProgressModel::new(&workflow, &session);

        assert!(matches!(
            model.status_of(3),
            Err(WorkflowError::StepOutOfRange { step: 3, len: 1 })
        ));
    }

    #[test]
    fn test_attempted_step_without_result_is_current() {
        let workflow = workflow(vec![
            WorkflowStep::new("a"),
            WorkflowStep::new("b"),
            WorkflowStep::new("c"),
        ]);
        let mut session = WorkflowSession::pending(1, 1, 1);
        session.status = SessionStatus::InProgress;
        session.current_step = 2;
        session.results.insert(0, StepResult::text("done"));
        let model = WorkflowProgressModel::new(&workflow, &session);

        assert_eq!(model.status_of(0).unwrap(), StepStatus::Completed);
        assert_eq!(model.status_of(1).unwrap(), StepStatus::Current);
        assert_eq!(model.status_of(2).unwrap(), StepStatus::Pending);
    }

    #[test]
    fn test_terminal_session_has_no_current_step() {
        let workflow = workflow(vec![WorkflowStep::new("a"), WorkflowStep::new("b")]);
        let mut session = WorkflowSession::pending(1, 1, 1);
        session.status = SessionStatus::Failed;
        session.current_step = 1;
        let model = WorkflowProgressModel::new(&workflow, &session);

        assert_eq!(model.current_step_index(), None);
        assert_eq!(model.status_of(0).unwrap(), StepStatus::Pending);
        assert_eq!(model.next_actionable_step().unwrap(), None);
    }

    #[test]
    fn test_next_actionable_step_follows_current() {
        let workflow = workflow(vec![
            WorkflowStep::new("a"),
            WorkflowStep::new("b"),
            WorkflowStep::new("c").depending_on([0, 1]),
        ]);
        let mut session = WorkflowSession::pending(1, 1, 1);
        assert_eq!(
            WorkflowProgressModel::new(&workflow, &session).next_actionable_step().unwrap(),
            Some(0)
        );

        session.status = SessionStatus::InProgress;
        session.current_step = 1;
        session.results.insert(0, StepResult::text("done"));
        let model = WorkflowProgressModel::new(&workflow, &session);
        assert_eq!(model.current_step_index(), Some(1));
        assert_eq!(model.next_actionable_step().unwrap(), Some(1));
    }

    #[test]
    fn test_next_actionable_step_without_current_takes_first_pending() {
        let workflow = workflow(vec![
            WorkflowStep::new("a"),
            WorkflowStep::new("b"),
            WorkflowStep::new("c").depending_on([1]),
            WorkflowStep::new("d"),
        ]);
        // current_step regressed to 0 after step 0 was recorded
        let mut session = WorkflowSession::pending(1, 1, 1);
        session.status = SessionStatus::InProgress;
        session.results.insert(0, StepResult::text("done"));
        let model = WorkflowProgressModel::new(&workflow, &session);

        assert_eq!(model.current_step_index(), None);
        assert_eq!(
            model.statuses().unwrap(),
            vec![
                StepStatus::Completed,
                StepStatus::Pending,
                StepStatus::Blocked,
                StepStatus::Pending
            ]
        );
        assert_eq!(model.next_actionable_step().unwrap(), Some(1));
    }

    #[test]
    fn test_next_actionable_step_reports_invalid_dependency() {
        let workflow = workflow(vec![WorkflowStep::new("a"), WorkflowStep::new("b").depending_on([5])]);
        let session = WorkflowSession::pending(1, 1, 1);
        let err = WorkflowProgressModel::new(&workflow, &session)
            .next_actionable_step()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_is_executable_tracks_status_only() {
        let workflow = workflow(vec![WorkflowStep::new("a"), WorkflowStep::new("b").depending_on([0])]);
        let mut session = WorkflowSession::pending(1, 1, 1);
        assert!(!WorkflowProgressModel::new(&workflow, &session).is_executable());

        session.status = SessionStatus::InProgress;
        session.current_step = 0;
        let model = WorkflowProgressModel::new(&workflow, &session);
        assert_eq!(model.status_of(1).unwrap(), StepStatus::Blocked);
        assert!(model.is_executable());
    }

    #[test]
    fn test_advance_records_result_and_replaces_progress() {
        let workflow = workflow(vec![WorkflowStep::new("a"), WorkflowStep::new("b")]);
        let session = WorkflowSession::pending(4, 1, 1);
        let model = WorkflowProgressModel::new(&workflow, &session);

        let next = model
            .advance(ExecutionResponse::new(
                SessionStatus::InProgress,
                1,
                StepResult::text("outline"),
            ))
            .unwrap();

        assert_eq!(next.status, SessionStatus::InProgress);
        assert_eq!(next.current_step, 1);
        assert_eq!(next.results.get(&0), Some(&StepResult::text("outline")));
        assert!(session.results.is_empty());
        assert_eq!(session.status, SessionStatus::Pending);
    }

    #[test]
    fn test_advance_rejects_step_beyond_workflow() {
        let workflow = workflow(vec![WorkflowStep::new("a")]);
        let session = WorkflowSession::pending(4, 1, 1);
        let model = WorkflowProgressModel::new(&workflow, &session);

        let err = model
            .advance(ExecutionResponse::new(SessionStatus::InProgress, 2, StepResult::text("x")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_advance_rejects_overwriting_a_result() {
        let workflow = workflow(vec![WorkflowStep::new("a"), WorkflowStep::new("b")]);
        let mut session = WorkflowSession::pending(4, 1, 1);
        session.status = SessionStatus::InProgress;
        session.current_step = 1;
        session.results.insert(0, StepResult::text("first"));
        let model = WorkflowProgressModel::new(&workflow, &session);

        let err = model
            .advance(ExecutionResponse::new(SessionStatus::InProgress, 1, StepResult::text("again")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(session.results.get(&0), Some(&StepResult::text("first")));
    }

    #[test]
    fn test_advance_rejection_names_transition_reason() {
        let workflow = workflow(vec![WorkflowStep::new("a"), WorkflowStep::new("b")]);
        let mut session = WorkflowSession::pending(4, 1, 1);
        session.status = SessionStatus::InProgress;
        session.current_step = 1;
        session.results.insert(0, StepResult::text("first"));
        let model = WorkflowProgressModel::new(&workflow, &session);

        let err = model
            .advance(ExecutionResponse::new(SessionStatus::Pending, 2, StepResult::text("second")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err
            .to_string()
            .contains("an executed step cannot leave the session pending"));
    }

    #[test]
    fn test_advance_rejects_completed_session() {
        let workflow = workflow(vec![WorkflowStep::new("a")]);
        let mut session = WorkflowSession::pending(4, 1, 1);
        session.status = SessionStatus::Completed;
        session.current_step = 1;
        let model = WorkflowProgressModel::new(&workflow, &session);

        let err = model
            .advance(ExecutionResponse::new(SessionStatus::Completed, 1, StepResult::text("x")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
