use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// A conflict raised in a collaboration session and the state of its resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub id: i64,
    pub session_id: i64,
    pub conflict_message_id: i64,
    pub resolution_method: String,
    /// Method-specific partial results, owned and computed by the backend
    #[serde(default)]
    pub resolution_data: Value,
    #[serde(default)]
    pub resolved_by_agent_id: Option<i64>,
    #[serde(default)]
    pub resolution_message_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolutionMethod {
    Voting,
    Consensus,
    ManagerDecision,
    Other(String),
}

impl ResolutionMethod {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "voting" => ResolutionMethod::Voting,
            "consensus" => ResolutionMethod::Consensus,
            "manager_decision" => ResolutionMethod::ManagerDecision,
            other => ResolutionMethod::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResolutionMethod::Voting => "voting",
            ResolutionMethod::Consensus => "consensus",
            ResolutionMethod::ManagerDecision => "manager_decision",
            ResolutionMethod::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An agent taking part in a collaboration session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAgent {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub agent_role: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

impl SessionMessage {
    /// Option label derived from a competing message
    pub fn excerpt(&self) -> String {
        let excerpt: String = self.content.chars().take(OPTION_EXCERPT_CHARS).collect();
        format!("{excerpt}...")
    }
}

const OPTION_EXCERPT_CHARS: usize = 100;

/// Body posted to open a conflict resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConflict {
    pub session_id: i64,
    pub conflict_message_id: i64,
    pub resolution_method: String,
    pub resolution_data: Value,
    pub resolved_by_agent_id: Option<i64>,
}

impl NewConflict {
    /// Build the initial request for `method`.
    ///
    /// Voting and manager decisions offer one option per related message;
    /// consensus starts with no proposals. Only a manager decision records the
    /// deciding agent up front.
    pub fn for_method(
        session_id: i64,
        conflict_message_id: i64,
        method: &ResolutionMethod,
        related_messages: &[SessionMessage],
        agent_id: i64,
    ) -> Self {
        let options: Vec<String> = related_messages.iter().map(SessionMessage::excerpt).collect();

        let resolution_data = match method {
            ResolutionMethod::Voting | ResolutionMethod::ManagerDecision => json!({ "options": options }),
            ResolutionMethod::Consensus => json!({ "proposals": {} }),
            ResolutionMethod::Other(_) => json!({}),
        };

        let resolved_by_agent_id = match method {
            ResolutionMethod::ManagerDecision => Some(agent_id),
            _ => None,
        };

        Self {
            session_id,
            conflict_message_id,
            resolution_method: method.as_str().to_string(),
            resolution_data,
            resolved_by_agent_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub agent_id: i64,
    pub vote: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRequest {
    pub agent_id: i64,
    pub proposal: String,
}
