use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::errors::ConflictError;
use super::types::{ConflictResolution, ResolutionMethod};

/// Partial results of a resolution, interpreted per method
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionState {
    Voting(VotingState),
    Consensus(ConsensusState),
    ManagerDecision(ManagerDecisionState),
    /// Unknown method or data that does not match the method's shape
    Opaque(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VotingState {
    #[serde(default)]
    pub options: Vec<String>,
    /// Agent id (as a JSON object key) to the option that agent chose
    #[serde(default)]
    pub votes: BTreeMap<String, String>,
    #[serde(default)]
    pub vote_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub total_votes: Option<u64>,
    #[serde(default)]
    pub result: Option<String>,
}

impl VotingState {
    pub fn total_votes(&self) -> u64 {
        self.total_votes.unwrap_or(self.votes.len() as u64)
    }

    pub fn count_for(&self, option: &str) -> u64 {
        self.vote_counts.get(option).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConsensusState {
    /// Agent id to the text that agent proposed
    #[serde(default)]
    pub proposals: BTreeMap<String, Value>,
    #[serde(default)]
    pub synthesis: Option<String>,
}

impl ConsensusState {
    pub fn proposal_text(&self, agent_id: i64) -> Option<String> {
        self.proposals.get(&agent_id.to_string()).map(|proposal| match proposal {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ManagerDecisionState {
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub manager_decision: Option<String>,
}

/// How many session agents have contributed so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionProgress {
    pub received: u64,
    pub expected: u64,
}

impl ResolutionProgress {
    /// Fraction in `[0, 1]`; an empty session counts as no progress
    pub fn ratio(&self) -> f64 {
        if self.expected == 0 {
            return 0.0;
        }
        (self.received as f64 / self.expected as f64).clamp(0.0, 1.0)
    }

    pub fn percent(&self) -> u8 {
        (self.ratio() * 100.0).round() as u8
    }
}

impl ResolutionState {
    pub fn from_data(method: &ResolutionMethod, data: &Value) -> Self {
        let parsed = match method {
            ResolutionMethod::Voting => {
                parse_or_default::<VotingState>(data).map(ResolutionState::Voting)
            }
            ResolutionMethod::Consensus => {
                parse_or_default::<ConsensusState>(data).map(ResolutionState::Consensus)
            }
            ResolutionMethod::ManagerDecision => {
                parse_or_default::<ManagerDecisionState>(data).map(ResolutionState::ManagerDecision)
            }
            ResolutionMethod::Other(_) => None,
        };
        parsed.unwrap_or_else(|| ResolutionState::Opaque(data.clone()))
    }

    /// Votes or proposals received against the number of session agents.
    ///
    /// Manager decisions and unknown methods have no progress measure.
    pub fn progress(&self, agent_count: usize) -> Option<ResolutionProgress> {
        let received = match self {
            ResolutionState::Voting(voting) => voting.total_votes(),
            ResolutionState::Consensus(consensus) => consensus.proposals.len() as u64,
            ResolutionState::ManagerDecision(_) | ResolutionState::Opaque(_) => return None,
        };
        Some(ResolutionProgress {
            received,
            expected: agent_count as u64,
        })
    }

    pub fn options(&self) -> &[String] {
        match self {
            ResolutionState::Voting(voting) => &voting.options,
            ResolutionState::ManagerDecision(manager) => &manager.options,
            _ => &[],
        }
    }
}

fn parse_or_default<T>(data: &Value) -> Option<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    match data {
        Value::Null => Some(T::default()),
        other => serde_json::from_value(other.clone()).ok(),
    }
}

impl ConflictResolution {
    pub fn method(&self) -> ResolutionMethod {
        ResolutionMethod::parse(&self.resolution_method)
    }

    pub fn state(&self) -> ResolutionState {
        ResolutionState::from_data(&self.method(), &self.resolution_data)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    pub fn progress(&self, agent_count: usize) -> Option<ResolutionProgress> {
        self.state().progress(agent_count)
    }

    /// Text describing how the conflict was settled
    pub fn outcome_summary(&self) -> String {
        let from_state = match self.state() {
            ResolutionState::Consensus(consensus) => consensus.synthesis,
            ResolutionState::ManagerDecision(manager) => manager.manager_decision,
            _ => None,
        };
        from_state
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| format!("Conflict resolved by {}.", self.method()))
    }

    /// The posted resolution message, once the backend has produced one
    pub fn resolution_message(&self) -> Option<String> {
        self.resolution_message_id.map(|_| self.outcome_summary())
    }

    /// Check that `option` can be voted for on this conflict
    pub fn validate_vote(&self, option: &str) -> Result<(), ConflictError> {
        self.ensure_open(ResolutionMethod::Voting)?;
        let state = self.state();
        let options = state.options();
        if !options.is_empty() && !options.iter().any(|offered| offered == option) {
            return Err(ConflictError::UnknownOption {
                option: option.to_string(),
                offered: options.to_vec(),
            });
        }
        Ok(())
    }

    /// Check that `proposal` can be submitted on this conflict
    pub fn validate_proposal(&self, proposal: &str) -> Result<(), ConflictError> {
        self.ensure_open(ResolutionMethod::Consensus)?;
        if proposal.trim().is_empty() {
            return Err(ConflictError::EmptyProposal);
        }
        Ok(())
    }

    fn ensure_open(&self, expected: ResolutionMethod) -> Result<(), ConflictError> {
        let actual = self.method();
        if actual != expected {
            return Err(ConflictError::WrongMethod {
                conflict_id: self.id,
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        if self.is_resolved() {
            return Err(ConflictError::AlreadyResolved {
                conflict_id: self.id,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conflict(method: &str, data: Value) -> ConflictResolution {
        ConflictResolution {
            id: 11,
            session_id: 2,
            conflict_message_id: 40,
            resolution_method: method.to_string(),
            resolution_data: data,
            resolved_by_agent_id: None,
            resolution_message_id: None,
            created_at: None,
            resolved_at: None,
        }
    }

    #[test]
    fn test_voting_progress_counts_votes() {
        let voting = conflict(
            "voting",
            json!({
                "options": ["A...", "B..."],
                "votes": {"1": "A...", "2": "B..."},
                "vote_counts": {"A...": 1, "B...": 1},
                "total_votes": 2
            }),
        );

        let progress = voting.progress(4).unwrap();
        assert_eq!(progress.received, 2);
        assert_eq!(progress.percent(), 50);

        match voting.state() {
            ResolutionState::Voting(state) => {
                assert_eq!(state.count_for("A..."), 1);
                assert_eq!(state.count_for("C..."), 0);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_progress_ratio_is_clamped() {
        let progress = ResolutionProgress { received: 5, expected: 3 };
        assert_eq!(progress.ratio(), 1.0);
        let empty = ResolutionProgress { received: 2, expected: 0 };
        assert_eq!(empty.ratio(), 0.0);
    }

    #[test]
    fn test_consensus_progress_and_proposals() {
        let consensus = conflict(
            "consensus",
            json!({"proposals": {"3": "Split the work", "5": {"text": "structured"}}}),
        );
        assert_eq!(consensus.progress(2).unwrap().received, 2);
        match consensus.state() {
            ResolutionState::Consensus(state) => {
                assert_eq!(state.proposal_text(3).as_deref(), Some("Split the work"));
                assert_eq!(state.proposal_text(9), None);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_manager_decision_has_no_progress() {
        let manager = conflict("manager_decision", json!({"options": ["A..."]}));
        assert!(manager.progress(3).is_none());
    }

    #[test]
    fn test_mismatched_data_is_opaque() {
        let odd = conflict("voting", json!({"options": "not a list"}));
        assert!(matches!(odd.state(), ResolutionState::Opaque(_)));
        let unknown = conflict("coin_flip", json!({"heads": true}));
        assert!(matches!(unknown.state(), ResolutionState::Opaque(_)));
        assert!(unknown.progress(2).is_none());
    }

    #[test]
    fn test_outcome_summary_preference() {
        let mut consensus = conflict("consensus", json!({"synthesis": "Merged plan"}));
        assert_eq!(consensus.outcome_summary(), "Merged plan");
        assert_eq!(consensus.resolution_message(), None);
        consensus.resolution_message_id = Some(77);
        assert_eq!(consensus.resolution_message().as_deref(), Some("Merged plan"));

        let manager = conflict("manager_decision", json!({"manager_decision": "Option B"}));
        assert_eq!(manager.outcome_summary(), "Option B");

        let voting = conflict("voting", json!({"result": "A..."}));
        assert_eq!(voting.outcome_summary(), "Conflict resolved by voting.");
    }

    #[test]
    fn test_vote_validation() {
        let mut voting = conflict("voting", json!({"options": ["A...", "B..."]}));
        assert!(voting.validate_vote("A...").is_ok());
        assert!(matches!(
            voting.validate_vote("Z..."),
            Err(ConflictError::UnknownOption { .. })
        ));

        voting.resolved_at = Some("2024-05-01T10:00:00".to_string());
        assert!(matches!(
            voting.validate_vote("A..."),
            Err(ConflictError::AlreadyResolved { conflict_id: 11 })
        ));

        let consensus = conflict("consensus", json!({}));
        assert!(matches!(
            consensus.validate_vote("A..."),
            Err(ConflictError::WrongMethod { .. })
        ));
    }

    #[test]
    fn test_proposal_validation() {
        let consensus = conflict("consensus", Value::Null);
        assert!(consensus.validate_proposal("Let's pair on it").is_ok());
        assert!(matches!(
            consensus.validate_proposal("   "),
            Err(ConflictError::EmptyProposal)
        ));
    }
}
