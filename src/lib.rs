// Workflow Runner Library - multi-agent workflow sessions over a collaboration backend
// This exposes the core components for testing and integration

pub mod backend;
pub mod cli;
pub mod config;
pub mod conflicts;
pub mod http;
pub mod observability;
pub mod shutdown;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use backend::{BackendError, ConflictBackend, HttpBackend, RetryPolicy, WorkflowBackend};
pub use config::{config, init_config, RunnerConfig};
pub use conflicts::{ConflictError, ConflictResolution, ConflictSession, ResolutionMethod, ResolutionState};
pub use http::RateLimitedHttpClient;
pub use observability::{backend_metrics, BackendApiMetrics, OperationTimer};
pub use shutdown::ShutdownCoordinator;
pub use telemetry::{create_session_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflows::{
    AutoExecutor, ErrorKind, ExecutionResponse, SessionRunner, SessionStatus, SessionSummary, StepResult,
    StepStatus, Workflow, WorkflowError, WorkflowProgressModel, WorkflowSession, WorkflowStep,
};
