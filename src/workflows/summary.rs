use crate::workflows::errors::WorkflowError;
use crate::workflows::progress::{StepStatus, WorkflowProgressModel};
use crate::workflows::types::{format_timestamp, SessionStatus, Workflow, WorkflowSession};

/// Display-ready snapshot of a session's progress
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: i64,
    pub workflow_name: String,
    pub status: SessionStatus,
    pub current_step: usize,
    pub total_steps: usize,
    pub executable: bool,
    /// Index of the step to act on next
    pub next_step: Option<usize>,
    pub steps: Vec<StepView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepView {
    pub index: usize,
    pub name: String,
    pub description: String,
    pub status: StepStatus,
    pub agent_required: bool,
    pub agent_role: Option<String>,
    /// 1-based step numbers this step waits on
    pub depends_on: Vec<usize>,
    pub result: Option<ResultView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub agent_name: String,
    pub timestamp: String,
    pub content: String,
}

impl SessionSummary {
    pub fn build(model: &WorkflowProgressModel<'_>) -> Result<Self, WorkflowError> {
        let workflow = model.workflow();
        let session = model.session();
        let statuses = model.statuses()?;

        let steps = workflow
            .steps
            .iter()
            .zip(statuses)
            .enumerate()
            .map(|(index, (step, status))| StepView {
                index,
                name: step.name.clone(),
                description: step.description.clone(),
                status,
                agent_required: step.agent_id.is_some(),
                agent_role: step.agent_role.clone(),
                depends_on: step.dependency_labels(),
                result: session.results.get(&index).map(|result| ResultView {
                    agent_name: result.agent_name().unwrap_or("Agent").to_string(),
                    timestamp: format_timestamp(result.timestamp()),
                    content: result.display_content(),
                }),
            })
            .collect();

        Ok(Self {
            session_id: session.id,
            workflow_name: workflow.name.clone(),
            status: session.status,
            current_step: session.current_step,
            total_steps: workflow.steps.len(),
            executable: model.is_executable(),
            next_step: model.next_actionable_step()?,
            steps,
        })
    }

    pub fn progress_line(&self) -> String {
        format!("Step {} of {}", self.current_step, self.total_steps)
    }
}

/// Pick the session to resume from a listing: the one still in progress.
pub fn select_active_session(sessions: &[WorkflowSession]) -> Option<&WorkflowSession> {
    sessions
        .iter()
        .find(|session| session.status == SessionStatus::InProgress)
}

/// One-line listing entry, e.g. `#12 Research [in_progress] 2 / 5`
pub fn session_listing_line(session: &WorkflowSession, workflow: Option<&Workflow>) -> String {
    let name = workflow.map(|w| w.name.as_str()).unwrap_or("Unknown Workflow");
    let total = workflow
        .map(|w| w.steps.len().to_string())
        .unwrap_or_else(|| "?".to_string());
    format!(
        "#{} {} [{}] {} / {} (created {})",
        session.id,
        name,
        session.status,
        session.current_step,
        total,
        format_timestamp(session.created_at.as_deref())
    )
}
