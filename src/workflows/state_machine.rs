// Workflow session lifecycle
//
// pending --(first step)--> in_progress --(more steps)--> in_progress
// in_progress --(last step)--> completed
// in_progress --(fatal step error)--> failed
//
// A single-step workflow may go straight from pending to completed or failed.
// completed and failed are terminal.

use crate::workflows::types::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    Accepted(StateTransition),
    Rejected { transition: StateTransition, reason: &'static str },
}

impl StateTransition {
    pub fn new(from: SessionStatus, to: SessionStatus) -> Self {
        Self { from, to }
    }

    /// Check a status change reported by the backend after a step execution
    pub fn evaluate(self) -> TransitionResult {
        use SessionStatus::*;

        match (self.from, self.to) {
            (Completed | Failed, _) => TransitionResult::Rejected {
                transition: self,
                reason: "session is terminal",
            },
            (Pending | InProgress, InProgress | Completed | Failed) => {
                TransitionResult::Accepted(self)
            }
            (Pending | InProgress, Pending) => TransitionResult::Rejected {
                transition: self,
                reason: "an executed step cannot leave the session pending",
            },
        }
    }
}

impl SessionStatus {
    pub fn transition_to(self, next: SessionStatus) -> TransitionResult {
        StateTransition::new(self, next).evaluate()
    }

    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(self.transition_to(next), TransitionResult::Accepted(_))
    }
}
