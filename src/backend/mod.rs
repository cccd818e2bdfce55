// Collaboration backend access: traits, HTTP implementation, errors and retries

pub mod client;
pub mod errors;
pub mod retry;

pub use client::{ConflictBackend, HttpBackend, WorkflowBackend};
pub use errors::BackendError;
pub use retry::RetryPolicy;

#[cfg(test)]
pub use client::{MockConflictBackend, MockWorkflowBackend};
