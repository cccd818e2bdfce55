use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

use crate::backend::WorkflowBackend;
use crate::telemetry::{create_session_span, generate_correlation_id};
use crate::workflows::errors::WorkflowError;
use crate::workflows::progress::WorkflowProgressModel;
use crate::workflows::summary::SessionSummary;
use crate::workflows::types::{Workflow, WorkflowSession};

/// What observers of a running session see
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerState {
    pub session: WorkflowSession,
    /// A step execution request is outstanding
    pub executing: bool,
}

/// Drives one workflow session against the backend.
///
/// The runner holds the latest session snapshot and replaces it whole after
/// each execution, publishing it to subscribers. At most one execution is
/// outstanding at a time; the `executing` flag doubles as that guard.
pub struct SessionRunner {
    backend: Arc<dyn WorkflowBackend>,
    workflow: Workflow,
    state: watch::Sender<RunnerState>,
}

impl SessionRunner {
    /// Create a runner, validating the workflow definition up front
    pub fn new(
        backend: Arc<dyn WorkflowBackend>,
        workflow: Workflow,
        session: WorkflowSession,
    ) -> Result<Self, WorkflowError> {
        workflow.validate()?;
        if session.workflow_id != workflow.id {
            return Err(WorkflowError::protocol(format!(
                "session {} belongs to workflow {}, not {}",
                session.id, session.workflow_id, workflow.id
            )));
        }

        Ok(Self {
            backend,
            workflow,
            state: watch::Sender::new(RunnerState {
                session,
                executing: false,
            }),
        })
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Current session snapshot
    pub fn session(&self) -> WorkflowSession {
        self.state.borrow().session.clone()
    }

    pub fn is_executing(&self) -> bool {
        self.state.borrow().executing
    }

    pub fn subscribe(&self) -> watch::Receiver<RunnerState> {
        self.state.subscribe()
    }

    /// Run `f` against a progress model of the current snapshot
    pub fn with_progress<R>(&self, f: impl FnOnce(&WorkflowProgressModel<'_>) -> R) -> R {
        let state = self.state.borrow();
        let model = WorkflowProgressModel::new(&self.workflow, &state.session);
        f(&model)
    }

    pub fn summary(&self) -> Result<SessionSummary, WorkflowError> {
        self.with_progress(SessionSummary::build)
    }

    /// Accept a refreshed snapshot of the same session, e.g. from a listing
    pub fn replace_session(&self, session: WorkflowSession) -> Result<(), WorkflowError> {
        let current_id = self.state.borrow().session.id;
        if session.id != current_id {
            return Err(WorkflowError::protocol(format!(
                "refreshed snapshot is for session {}, runner drives session {}",
                session.id, current_id
            )));
        }
        self.state.send_modify(|state| state.session = session);
        Ok(())
    }

    /// Execute the next step and return the resulting snapshot.
    ///
    /// Terminal sessions and calls made while another execution is
    /// outstanding are rejected without contacting the backend.
    pub async fn execute_next_step(&self) -> Result<WorkflowSession, WorkflowError> {
        let (session_id, status) = {
            let state = self.state.borrow();
            (state.session.id, state.session.status)
        };

        if status.is_terminal() {
            return Err(WorkflowError::InvalidState {
                session_id,
                status,
                reason: "no steps left to execute".to_string(),
            });
        }

        let guard = InFlightGuard::acquire(&self.state)
            .ok_or(WorkflowError::ExecutionOutstanding { session_id })?;

        let correlation_id = generate_correlation_id();
        let span = create_session_span(
            "execute_next_step",
            session_id,
            Some(self.workflow.id),
            Some(&correlation_id),
        );

        async move {
            debug!("Requesting next step execution");
            let response = self
                .backend
                .execute_next_step(session_id)
                .await
                .inspect_err(|err| warn!(error = %err, "Step execution request failed"))?;

            let next = {
                let state = self.state.borrow();
                WorkflowProgressModel::new(&self.workflow, &state.session).advance(response)?
            };

            info!(
                status = %next.status,
                current_step = next.current_step,
                total_steps = self.workflow.steps.len(),
                "Step executed"
            );
            guard.finish(next.clone());
            Ok::<_, WorkflowError>(next)
        }
        .instrument(span)
        .await
    }
}

/// Clears the `executing` flag when dropped, including on error or abort
struct InFlightGuard<'a> {
    state: &'a watch::Sender<RunnerState>,
    released: bool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(state: &'a watch::Sender<RunnerState>) -> Option<Self> {
        let acquired = state.send_if_modified(|current| {
            if current.executing {
                false
            } else {
                current.executing = true;
                true
            }
        });
        acquired.then_some(Self {
            state,
            released: false,
        })
    }

    /// Publish the new snapshot and clear the flag in one update
    fn finish(mut self, session: WorkflowSession) {
        self.state.send_modify(|current| {
            current.session = session;
            current.executing = false;
        });
        self.released = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.state.send_modify(|current| current.executing = false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MockWorkflowBackend};
    use crate::workflows::types::{ExecutionResponse, SessionStatus, StepResult, WorkflowStep};
    use crate::workflows::{ErrorKind, StepStatus};
    use mockall::predicate::eq;
    use reqwest::StatusCode;

    fn workflow() -> Workflow {
        Workflow {
            id: 3,
            name: "Research".to_string(),
            description: String::new(),
            steps: vec![
                WorkflowStep::new("Gather"),
                WorkflowStep::new("Draft"),
                WorkflowStep::new("Review").depending_on([0, 1]),
            ],
            is_public: false,
            owner_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn in_progress_session() -> WorkflowSession {
        let mut session = WorkflowSession::pending(8, 3, 21);
        session.status = SessionStatus::InProgress;
        session.current_step = 1;
        session.results.insert(0, StepResult::text("sources"));
        session
    }

    fn runner(mock: MockWorkflowBackend, session: WorkflowSession) -> SessionRunner {
        SessionRunner::new(Arc::new(mock), workflow(), session).unwrap()
    }

    #[tokio::test]
    async fn test_execute_applies_response() {
        let mut mock = MockWorkflowBackend::new();
        mock.expect_execute_next_step()
            .with(eq(8))
            .times(1)
            .returning(|_| {
                Ok(ExecutionResponse::new(
                    SessionStatus::InProgress,
                    2,
                    StepResult::text("draft"),
                ))
            });

        let runner = runner(mock, in_progress_session());
        let mut rx = runner.subscribe();

        let next = runner.execute_next_step().await.unwrap();
        assert_eq!(next.current_step, 2);
        assert!(next.has_result(1));
        assert!(!runner.is_executing());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().session, next);

        let statuses = runner.with_progress(|model| model.statuses()).unwrap();
        assert_eq!(
            statuses,
            vec![StepStatus::Completed, StepStatus::Completed, StepStatus::Current]
        );
    }

    #[tokio::test]
    async fn test_terminal_session_never_reaches_backend() {
        let mut mock = MockWorkflowBackend::new();
        mock.expect_execute_next_step().never();

        let mut session = in_progress_session();
        session.status = SessionStatus::Failed;
        let runner = runner(mock, session.clone());

        let err = runner.execute_next_step().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(runner.session(), session);
    }

    #[tokio::test]
    async fn test_transport_error_clears_flag_and_keeps_snapshot() {
        let mut mock = MockWorkflowBackend::new();
        mock.expect_execute_next_step().times(1).returning(|_| {
            Err(BackendError::Api {
                status: StatusCode::BAD_GATEWAY,
                detail: "agent unavailable".to_string(),
            })
        });

        let session = in_progress_session();
        let runner = runner(mock, session.clone());

        let err = runner.execute_next_step().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(!runner.is_executing());
        assert_eq!(runner.session(), session);
    }

    #[tokio::test]
    async fn test_protocol_violation_leaves_snapshot_unchanged() {
        let mut mock = MockWorkflowBackend::new();
        mock.expect_execute_next_step().times(1).returning(|_| {
            Ok(ExecutionResponse::new(
                SessionStatus::InProgress,
                0,
                StepResult::text("?"),
            ))
        });

        let session = in_progress_session();
        let runner = runner(mock, session.clone());

        let err = runner.execute_next_step().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(!runner.is_executing());
        assert_eq!(runner.session(), session);
    }

    #[test]
    fn test_guard_rejects_second_acquire() {
        let state = watch::Sender::new(RunnerState {
            session: in_progress_session(),
            executing: false,
        });

        let guard = InFlightGuard::acquire(&state).unwrap();
        assert!(state.borrow().executing);
        assert!(InFlightGuard::acquire(&state).is_none());

        drop(guard);
        assert!(!state.borrow().executing);
        assert!(InFlightGuard::acquire(&state).is_some());
    }

    #[test]
    fn test_replace_session_requires_same_id() {
        let runner = runner(MockWorkflowBackend::new(), in_progress_session());

        let mut refreshed = in_progress_session();
        refreshed.current_step = 2;
        refreshed.results.insert(1, StepResult::text("draft"));
        runner.replace_session(refreshed.clone()).unwrap();
        assert_eq!(runner.session(), refreshed);

        let other = WorkflowSession::pending(99, 3, 21);
        assert_eq!(
            runner.replace_session(other).unwrap_err().kind(),
            ErrorKind::Protocol
        );
    }

    #[test]
    fn test_new_rejects_mismatched_workflow() {
        let session = WorkflowSession::pending(8, 4, 21);
        let err = SessionRunner::new(Arc::new(MockWorkflowBackend::new()), workflow(), session)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
