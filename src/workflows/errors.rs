use thiserror::Error;

use crate::backend::BackendError;
use crate::workflows::types::SessionStatus;

/// Broad error categories callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Protocol,
    InvalidState,
    Transport,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow {workflow_id}: step {step} depends on step {dependency}, which is not an earlier step")]
    InvalidDependency {
        workflow_id: i64,
        step: usize,
        dependency: usize,
    },
    #[error("step {step} is out of range for a workflow with {len} steps")]
    StepOutOfRange { step: usize, len: usize },
    #[error("backend protocol violation: {reason}")]
    Protocol { reason: String },
    #[error("workflow session {session_id} is {status}: {reason}")]
    InvalidState {
        session_id: i64,
        status: SessionStatus,
        reason: String,
    },
    #[error("workflow session {session_id} already has a step execution in flight")]
    ExecutionOutstanding { session_id: i64 },
    #[error(transparent)]
    Transport(#[from] BackendError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::InvalidDependency { .. } | WorkflowError::StepOutOfRange { .. } => {
                ErrorKind::Validation
            }
            WorkflowError::Protocol { .. } => ErrorKind::Protocol,
            WorkflowError::InvalidState { .. } | WorkflowError::ExecutionOutstanding { .. } => {
                ErrorKind::InvalidState
            }
            WorkflowError::Transport(_) => ErrorKind::Transport,
        }
    }

    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        WorkflowError::Protocol {
            reason: reason.into(),
        }
    }
}
