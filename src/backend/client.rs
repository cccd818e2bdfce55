// Backend operations behind traits so runners and commands can be tested
// without a live collaboration backend

use async_trait::async_trait;
use tracing::{debug, info};

use super::errors::BackendError;
use crate::config::BackendConfig;
use crate::conflicts::{
    ConflictResolution, NewConflict, ProposalRequest, SessionAgent, SessionMessage, VoteRequest,
};
use crate::http::RateLimitedHttpClient;
use crate::observability::backend_metrics;
use crate::workflows::{ExecutionResponse, NewWorkflowSession, Workflow, WorkflowSession};

#[cfg(test)]
use mockall::automock;

/// Workflow operations exposed by the collaboration backend
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    /// List workflow templates visible to the caller
    async fn list_workflows(&self) -> Result<Vec<Workflow>, BackendError>;

    /// List workflow sessions attached to an outer collaboration session
    async fn list_sessions(&self, outer_session_id: i64) -> Result<Vec<WorkflowSession>, BackendError>;

    /// Start a new run of `workflow_id` inside `outer_session_id`
    async fn start_session(&self, workflow_id: i64, outer_session_id: i64) -> Result<WorkflowSession, BackendError>;

    /// Ask the backend to execute the next step of a workflow session
    async fn execute_next_step(&self, workflow_session_id: i64) -> Result<ExecutionResponse, BackendError>;
}

/// Conflict resolution operations exposed by the collaboration backend
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConflictBackend: Send + Sync {
    async fn list_conflicts(&self, session_id: i64) -> Result<Vec<ConflictResolution>, BackendError>;

    async fn create_conflict(&self, conflict: NewConflict) -> Result<ConflictResolution, BackendError>;

    async fn submit_vote(&self, conflict_id: i64, vote: VoteRequest) -> Result<ConflictResolution, BackendError>;

    async fn submit_proposal(
        &self,
        conflict_id: i64,
        proposal: ProposalRequest,
    ) -> Result<ConflictResolution, BackendError>;

    async fn list_agents(&self, session_id: i64) -> Result<Vec<SessionAgent>, BackendError>;

    /// Most recent message of a session, used as the conflicting message
    async fn latest_message(&self, session_id: i64) -> Result<Option<SessionMessage>, BackendError>;

    /// Replies sharing `parent_id`, which become the competing options
    async fn related_messages(&self, parent_id: i64) -> Result<Vec<SessionMessage>, BackendError>;
}

/// HTTP implementation of the backend traits
#[derive(Debug)]
pub struct HttpBackend {
    http: RateLimitedHttpClient,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = RateLimitedHttpClient::new(config)?;
        info!(base_url = %http.base_url(), "Backend client initialized");
        Ok(Self { http })
    }

    pub fn from_client(http: RateLimitedHttpClient) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &RateLimitedHttpClient {
        &self.http
    }
}

#[async_trait]
impl WorkflowBackend for HttpBackend {
    async fn list_workflows(&self) -> Result<Vec<Workflow>, BackendError> {
        self.http.get_json("/api/workflows/").await
    }

    async fn list_sessions(&self, outer_session_id: i64) -> Result<Vec<WorkflowSession>, BackendError> {
        self.http
            .get_json(&format!("/api/workflows/sessions/{outer_session_id}"))
            .await
    }

    async fn start_session(&self, workflow_id: i64, outer_session_id: i64) -> Result<WorkflowSession, BackendError> {
        let body = NewWorkflowSession::new(workflow_id, outer_session_id);
        let session: WorkflowSession = self
            .http
            .post_json("/api/workflows/sessions/", Some(&body))
            .await?;

        self.http.invalidate_cache_pattern("/api/workflows/sessions/").await;
        info!(
            workflow_id,
            workflow_session_id = session.id,
            "Started workflow session"
        );
        Ok(session)
    }

    async fn execute_next_step(&self, workflow_session_id: i64) -> Result<ExecutionResponse, BackendError> {
        let response: ExecutionResponse = self
            .http
            .post_json(&format!("/api/workflows/execute/{workflow_session_id}"), None::<&()>)
            .await?;

        backend_metrics().record_step_execution();
        self.http.invalidate_cache_pattern("/api/workflows/sessions/").await;
        debug!(
            workflow_session_id,
            status = %response.status,
            current_step = response.current_step,
            "Step execution response received"
        );
        Ok(response)
    }
}

#[async_trait]
impl ConflictBackend for HttpBackend {
    async fn list_conflicts(&self, session_id: i64) -> Result<Vec<ConflictResolution>, BackendError> {
        self.http
            .get_json_fresh(&format!("/api/conflict-resolution/session/{session_id}"))
            .await
    }

    async fn create_conflict(&self, conflict: NewConflict) -> Result<ConflictResolution, BackendError> {
        let created: ConflictResolution = self
            .http
            .post_json("/api/conflict-resolution/", Some(&conflict))
            .await?;
        self.http.invalidate_cache_pattern("/api/conflict-resolution/").await;
        Ok(created)
    }

    async fn submit_vote(&self, conflict_id: i64, vote: VoteRequest) -> Result<ConflictResolution, BackendError> {
        let updated: ConflictResolution = self
            .http
            .post_json(&format!("/api/conflict-resolution/{conflict_id}/vote"), Some(&vote))
            .await?;
        self.http.invalidate_cache_pattern("/api/conflict-resolution/").await;
        Ok(updated)
    }

    async fn submit_proposal(
        &self,
        conflict_id: i64,
        proposal: ProposalRequest,
    ) -> Result<ConflictResolution, BackendError> {
        let updated: ConflictResolution = self
            .http
            .post_json(&format!("/api/conflict-resolution/{conflict_id}/consensus"), Some(&proposal))
            .await?;
        self.http.invalidate_cache_pattern("/api/conflict-resolution/").await;
        Ok(updated)
    }

    async fn list_agents(&self, session_id: i64) -> Result<Vec<SessionAgent>, BackendError> {
        self.http.get_json(&format!("/api/sessions/{session_id}/agents")).await
    }

    async fn latest_message(&self, session_id: i64) -> Result<Option<SessionMessage>, BackendError> {
        let messages: Vec<SessionMessage> = self
            .http
            .get_json_fresh(&format!("/api/messages/session/{session_id}?limit=1"))
            .await?;
        Ok(messages.into_iter().next())
    }

    async fn related_messages(&self, parent_id: i64) -> Result<Vec<SessionMessage>, BackendError> {
        self.http
            .get_json_fresh(&format!("/api/messages/parent/{parent_id}"))
            .await
    }
}
