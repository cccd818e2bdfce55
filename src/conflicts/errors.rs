use thiserror::Error;

use crate::backend::BackendError;

#[derive(Error, Debug)]
pub enum ConflictError {
    #[error("Conflict #{conflict_id} uses {actual}, not {expected}")]
    WrongMethod {
        conflict_id: i64,
        expected: String,
        actual: String,
    },

    #[error("Conflict #{conflict_id} is already resolved")]
    AlreadyResolved { conflict_id: i64 },

    #[error("'{option}' is not one of the offered options: {offered:?}")]
    UnknownOption { option: String, offered: Vec<String> },

    #[error("Proposal text must not be empty")]
    EmptyProposal,

    #[error("Conflict #{conflict_id} not found in session {session_id}")]
    NotFound { conflict_id: i64, session_id: i64 },

    #[error("Agent #{agent_id} is not part of session {session_id}")]
    UnknownAgent { agent_id: i64, session_id: i64 },

    #[error("Session {session_id} has no message to resolve")]
    NoMessage { session_id: i64 },

    #[error(transparent)]
    Transport(#[from] BackendError),
}
