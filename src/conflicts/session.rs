use tracing::{info, warn};

use super::errors::ConflictError;
use super::types::{
    ConflictResolution, NewConflict, ProposalRequest, ResolutionMethod, SessionAgent, VoteRequest,
};
use crate::backend::ConflictBackend;

/// Conflict resolution operations scoped to one collaboration session.
///
/// Input is validated locally before it is posted; tallies and the final
/// decision stay with the backend.
pub struct ConflictSession<'a> {
    backend: &'a dyn ConflictBackend,
    session_id: i64,
}

impl<'a> ConflictSession<'a> {
    pub fn new(backend: &'a dyn ConflictBackend, session_id: i64) -> Self {
        Self { backend, session_id }
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    pub async fn conflicts(&self) -> Result<Vec<ConflictResolution>, ConflictError> {
        Ok(self.backend.list_conflicts(self.session_id).await?)
    }

    pub async fn agents(&self) -> Result<Vec<SessionAgent>, ConflictError> {
        Ok(self.backend.list_agents(self.session_id).await?)
    }

    async fn require_agent(&self, agent_id: i64) -> Result<SessionAgent, ConflictError> {
        self.agents()
            .await?
            .into_iter()
            .find(|agent| agent.id == agent_id)
            .ok_or(ConflictError::UnknownAgent {
                agent_id,
                session_id: self.session_id,
            })
    }

    async fn require_conflict(&self, conflict_id: i64) -> Result<ConflictResolution, ConflictError> {
        self.conflicts()
            .await?
            .into_iter()
            .find(|conflict| conflict.id == conflict_id)
            .ok_or(ConflictError::NotFound {
                conflict_id,
                session_id: self.session_id,
            })
    }

    /// Open a resolution on `message_id`, or on the latest session message.
    ///
    /// Replies sharing the message's parent become the options offered.
    pub async fn open(
        &self,
        agent_id: i64,
        method: ResolutionMethod,
        message_id: Option<i64>,
    ) -> Result<ConflictResolution, ConflictError> {
        self.require_agent(agent_id).await?;

        let latest = self.backend.latest_message(self.session_id).await?;
        let (conflict_message_id, parent_id) = match (message_id, latest) {
            (Some(id), Some(latest)) if latest.id == id => (id, latest.parent_id),
            (Some(id), _) => (id, None),
            (None, Some(latest)) => (latest.id, latest.parent_id),
            (None, None) => {
                return Err(ConflictError::NoMessage {
                    session_id: self.session_id,
                })
            }
        };

        let related = match parent_id {
            Some(parent_id) => self.backend.related_messages(parent_id).await?,
            None => Vec::new(),
        };
        if related.is_empty() && method != ResolutionMethod::Consensus {
            warn!(
                session_id = self.session_id,
                conflict_message_id, "No competing replies found; resolution starts without options"
            );
        }

        let request = NewConflict::for_method(self.session_id, conflict_message_id, &method, &related, agent_id);
        let created = self.backend.create_conflict(request).await?;
        info!(
            conflict_id = created.id,
            method = %method,
            options = related.len(),
            "Conflict resolution opened"
        );
        Ok(created)
    }

    pub async fn vote(&self, conflict_id: i64, agent_id: i64, option: &str) -> Result<ConflictResolution, ConflictError> {
        self.require_agent(agent_id).await?;
        self.require_conflict(conflict_id).await?.validate_vote(option)?;

        let updated = self
            .backend
            .submit_vote(
                conflict_id,
                VoteRequest {
                    agent_id,
                    vote: option.to_string(),
                },
            )
            .await?;
        info!(conflict_id, agent_id, resolved = updated.is_resolved(), "Vote recorded");
        Ok(updated)
    }

    pub async fn propose(
        &self,
        conflict_id: i64,
        agent_id: i64,
        proposal: &str,
    ) -> Result<ConflictResolution, ConflictError> {
        self.require_agent(agent_id).await?;
        self.require_conflict(conflict_id).await?.validate_proposal(proposal)?;

        let updated = self
            .backend
            .submit_proposal(
                conflict_id,
                ProposalRequest {
                    agent_id,
                    proposal: proposal.trim().to_string(),
                },
            )
            .await?;
        info!(conflict_id, agent_id, resolved = updated.is_resolved(), "Proposal recorded");
        Ok(updated)
    }
}
