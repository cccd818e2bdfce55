use anyhow::Result;

use crate::backend::ConflictBackend;
use crate::conflicts::{
    ConflictResolution, ConflictSession, ResolutionMethod, ResolutionState, SessionAgent,
};
use crate::workflows::format_timestamp;

pub struct ListConflictsCommand {
    pub session_id: i64,
}

impl ListConflictsCommand {
    pub async fn execute(&self, backend: &dyn ConflictBackend) -> Result<()> {
        let session = ConflictSession::new(backend, self.session_id);
        let conflicts = session.conflicts().await?;
        if conflicts.is_empty() {
            println!("⚖️  No conflict resolutions in session {}", self.session_id);
            return Ok(());
        }

        let agents = session.agents().await?;
        println!("⚖️  {} conflict resolution(s) in session {}:", conflicts.len(), self.session_id);
        for conflict in &conflicts {
            println!();
            print_conflict(conflict, &agents);
        }
        Ok(())
    }
}

pub struct CreateConflictCommand {
    pub session_id: i64,
    pub agent_id: i64,
    pub method: ResolutionMethod,
    pub message_id: Option<i64>,
}

impl CreateConflictCommand {
    pub async fn execute(&self, backend: &dyn ConflictBackend) -> Result<()> {
        let session = ConflictSession::new(backend, self.session_id);
        let created = session
            .open(self.agent_id, self.method.clone(), self.message_id)
            .await?;
        println!("⚖️  Opened conflict resolution #{} ({})", created.id, created.method());
        let agents = session.agents().await?;
        print_conflict(&created, &agents);
        Ok(())
    }
}

pub struct VoteCommand {
    pub session_id: i64,
    pub conflict_id: i64,
    pub agent_id: i64,
    pub option: String,
}

impl VoteCommand {
    pub async fn execute(&self, backend: &dyn ConflictBackend) -> Result<()> {
        let session = ConflictSession::new(backend, self.session_id);
        let updated = session.vote(self.conflict_id, self.agent_id, &self.option).await?;
        println!("🗳️  Vote recorded on conflict #{}", updated.id);
        let agents = session.agents().await?;
        print_conflict(&updated, &agents);
        Ok(())
    }
}

pub struct ProposeCommand {
    pub session_id: i64,
    pub conflict_id: i64,
    pub agent_id: i64,
    pub text: String,
}

impl ProposeCommand {
    pub async fn execute(&self, backend: &dyn ConflictBackend) -> Result<()> {
        let session = ConflictSession::new(backend, self.session_id);
        let updated = session.propose(self.conflict_id, self.agent_id, &self.text).await?;
        println!("📝 Proposal recorded on conflict #{}", updated.id);
        let agents = session.agents().await?;
        print_conflict(&updated, &agents);
        Ok(())
    }
}

fn agent_name(agents: &[SessionAgent], raw_id: &str) -> String {
    raw_id
        .parse::<i64>()
        .ok()
        .and_then(|id| agents.iter().find(|agent| agent.id == id))
        .map(|agent| agent.name.clone())
        .unwrap_or_else(|| format!("Agent {raw_id}"))
}

fn print_conflict(conflict: &ConflictResolution, agents: &[SessionAgent]) {
    let badge = if conflict.is_resolved() { "✅ Resolved" } else { "🔄 In progress" };
    println!(
        "#{} {} on message #{} [{}]",
        conflict.id,
        conflict.method(),
        conflict.conflict_message_id,
        badge
    );
    println!("   Opened: {}", format_timestamp(conflict.created_at.as_deref()));

    let state = conflict.state();
    if let Some(progress) = state.progress(agents.len()) {
        let noun = match state {
            ResolutionState::Voting(_) => "votes",
            _ => "proposals",
        };
        println!(
            "   Progress: {} / {} {} ({}%)",
            progress.received,
            progress.expected,
            noun,
            progress.percent()
        );
    }

    match &state {
        ResolutionState::Voting(voting) => {
            for option in &voting.options {
                let winner = if voting.result.as_deref() == Some(option.as_str()) { " 🏆" } else { "" };
                println!("   • {} ({} votes){}", option, voting.count_for(option), winner);
            }
        }
        ResolutionState::Consensus(consensus) => {
            for (agent_id, proposal) in &consensus.proposals {
                let text = proposal.as_str().map(str::to_string).unwrap_or_else(|| proposal.to_string());
                println!("   💬 {}: {}", agent_name(agents, agent_id), text);
            }
        }
        ResolutionState::ManagerDecision(manager) => {
            for option in &manager.options {
                println!("   • {option}");
            }
            if let Some(manager_id) = conflict.resolved_by_agent_id {
                println!("   👤 Deciding agent: {}", agent_name(agents, &manager_id.to_string()));
            }
        }
        ResolutionState::Opaque(data) => {
            if !data.is_null() {
                println!("   {data}");
            }
        }
    }

    if let Some(message) = conflict.resolution_message() {
        println!("   📣 {message}");
    }
    if conflict.is_resolved() {
        println!("   Resolved: {}", format_timestamp(conflict.resolved_at.as_deref()));
    }
}
