use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::workflows::errors::WorkflowError;

/// A reusable workflow definition: an ordered list of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Role hint used when no specific agent is assigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<i64>,
    #[serde(default)]
    pub instructions: String,
    /// Indices of earlier steps in the same workflow
    #[serde(default)]
    pub depends_on: BTreeSet<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

impl WorkflowStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            agent_role: None,
            agent_id: None,
            instructions: String::new(),
            depends_on: BTreeSet::new(),
            expected_output: None,
        }
    }

    pub fn depending_on(mut self, dependencies: impl IntoIterator<Item = usize>) -> Self {
        self.depends_on.extend(dependencies);
        self
    }

    /// Dependency labels as shown to users (1-based)
    pub fn dependency_labels(&self) -> Vec<usize> {
        self.depends_on.iter().map(|dep| dep + 1).collect()
    }
}

impl Workflow {
    /// Check one step's dependency edges.
    ///
    /// Every dependency must name an existing step strictly before `index`;
    /// that rule alone keeps the dependency graph acyclic.
    pub fn validate_step(&self, index: usize) -> Result<&WorkflowStep, WorkflowError> {
        let step = self.steps.get(index).ok_or(WorkflowError::StepOutOfRange {
            step: index,
            len: self.steps.len(),
        })?;

        if let Some(&dependency) = step.depends_on.iter().find(|&&dep| dep >= index) {
            return Err(WorkflowError::InvalidDependency {
                workflow_id: self.id,
                step: index,
                dependency,
            });
        }

        Ok(step)
    }

    /// Validate the whole definition, typically once when it is loaded.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        (0..self.steps.len()).try_for_each(|index| self.validate_step(index).map(|_| ()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run of a workflow, as last reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSession {
    pub id: i64,
    pub workflow_id: i64,
    /// Outer conversation session this run belongs to
    pub session_id: i64,
    pub status: SessionStatus,
    #[serde(default)]
    pub current_step: usize,
    #[serde(default)]
    pub results: BTreeMap<usize, StepResult>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl WorkflowSession {
    /// A freshly started session, before the backend has assigned an id
    pub fn pending(id: i64, workflow_id: i64, session_id: i64) -> Self {
        Self {
            id,
            workflow_id,
            session_id,
            status: SessionStatus::Pending,
            current_step: 0,
            results: BTreeMap::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn has_result(&self, step: usize) -> bool {
        self.results.contains_key(&step)
    }
}

/// Body posted to create a workflow session
#[derive(Debug, Clone, Serialize)]
pub struct NewWorkflowSession {
    pub workflow_id: i64,
    pub session_id: i64,
    pub status: SessionStatus,
    pub current_step: usize,
    pub results: BTreeMap<usize, StepResult>,
}

impl NewWorkflowSession {
    pub fn new(workflow_id: i64, session_id: i64) -> Self {
        Self {
            workflow_id,
            session_id,
            status: SessionStatus::Pending,
            current_step: 0,
            results: BTreeMap::new(),
        }
    }
}

/// Payload recorded for an executed step.
///
/// The backend does not fix a schema for step output, so known shapes are
/// matched first and anything else is carried as an opaque value. Every
/// variant serializes back to exactly what was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepResult {
    Message(AgentMessage),
    Text(String),
    Structured(Map<String, Value>),
    Opaque(Value),
}

/// Agent output with optional attribution.
///
/// `agent_name` and `timestamp` keep absent (`None`) apart from an explicit
/// `null` (`Some(None)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub content: Value,
    #[serde(default, deserialize_with = "present_field", skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_field", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Only called when the key is present, so `null` becomes `Some(None)`.
fn present_field<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl StepResult {
    pub fn text(content: impl Into<String>) -> Self {
        StepResult::Text(content.into())
    }

    pub fn message(content: impl Into<Value>, agent_name: Option<String>, timestamp: Option<String>) -> Self {
        StepResult::Message(AgentMessage {
            content: content.into(),
            agent_name: agent_name.map(Some),
            timestamp: timestamp.map(Some),
            extra: Map::new(),
        })
    }

    pub fn agent_name(&self) -> Option<&str> {
        match self {
            StepResult::Message(message) => message.agent_name.as_ref().and_then(Option::as_deref),
            _ => None,
        }
    }

    pub fn timestamp(&self) -> Option<&str> {
        match self {
            StepResult::Message(message) => message.timestamp.as_ref().and_then(Option::as_deref),
            _ => None,
        }
    }

    /// Human-readable content: text as-is, anything structured as pretty JSON
    pub fn display_content(&self) -> String {
        match self {
            StepResult::Message(message) => display_value(&message.content),
            StepResult::Text(text) => text.clone(),
            StepResult::Structured(map) => {
                serde_json::to_string_pretty(map).unwrap_or_else(|_| format!("{map:?}"))
            }
            StepResult::Opaque(value) => display_value(value),
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Response of `POST /api/workflows/execute/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub status: SessionStatus,
    /// Steps attempted so far; the executed step is `current_step - 1`
    pub current_step: i64,
    #[serde(default)]
    pub step_result: Option<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl ExecutionResponse {
    pub fn new(status: SessionStatus, current_step: i64, step_result: StepResult) -> Self {
        Self {
            status,
            current_step,
            step_result: Some(step_result),
            agent_name: None,
            timestamp: None,
            content: None,
        }
    }

    /// The result to record for the executed step.
    ///
    /// Falls back to the top-level `content`/`agent_name`/`timestamp` fields
    /// when the backend did not send a `step_result`.
    pub fn recorded_result(&self) -> StepResult {
        if let Some(result) = &self.step_result {
            return result.clone();
        }
        match &self.content {
            Some(content) => StepResult::message(
                content.clone(),
                self.agent_name.clone(),
                self.timestamp.clone(),
            ),
            None => StepResult::Opaque(Value::Null),
        }
    }
}

/// Render a backend timestamp for display, or `N/A` when absent or unparseable.
///
/// The backend emits ISO-8601 both with and without an offset; naive values
/// are taken as UTC.
pub fn format_timestamp(timestamp: Option<&str>) -> String {
    timestamp
        .and_then(parse_timestamp)
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.trim().is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
