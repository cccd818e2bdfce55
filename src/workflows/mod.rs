// Workflow sessions: definitions, derived step status, and execution driving
// The backend is the source of truth; everything here works on snapshots

pub mod auto_execute;
pub mod errors;
pub mod progress;
pub mod runner;
pub mod state_machine;
pub mod summary;
pub mod types;

pub use auto_execute::AutoExecutor;
pub use errors::{ErrorKind, WorkflowError};
pub use progress::{StepStatus, WorkflowProgressModel};
pub use runner::{RunnerState, SessionRunner};
pub use state_machine::{StateTransition, TransitionResult};
pub use summary::{select_active_session, session_listing_line, ResultView, SessionSummary, StepView};
pub use types::{
    format_timestamp, AgentMessage, ExecutionResponse, NewWorkflowSession, SessionStatus, StepResult, Workflow,
    WorkflowSession, WorkflowStep,
};
