//! Conflict resolution between agents of a collaboration session.
//!
//! The backend owns tallies and resolution decisions; this module only
//! interprets the partial results it reports and validates input before it is
//! submitted.

pub mod errors;
pub mod resolution;
pub mod session;
pub mod types;

pub use errors::ConflictError;
pub use resolution::{
    ConsensusState, ManagerDecisionState, ResolutionProgress, ResolutionState, VotingState,
};
pub use session::ConflictSession;
pub use types::{
    ConflictResolution, NewConflict, ProposalRequest, ResolutionMethod, SessionAgent,
    SessionMessage, VoteRequest,
};
