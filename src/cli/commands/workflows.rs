use anyhow::Result;
use std::sync::Arc;

use crate::backend::WorkflowBackend;
use crate::cli::commands::load_session_context;
use crate::workflows::{
    select_active_session, session_listing_line, SessionRunner, SessionStatus, SessionSummary, StepStatus,
    WorkflowProgressModel,
};

pub struct WorkflowsCommand;

impl WorkflowsCommand {
    pub async fn execute(&self, backend: &dyn WorkflowBackend) -> Result<()> {
        let workflows = backend.list_workflows().await?;
        if workflows.is_empty() {
            println!("📋 No workflows found");
            println!("   💡 Create one in the dashboard, then run 'workflow-runner workflows' again");
            return Ok(());
        }

        println!("📋 {} workflow(s):", workflows.len());
        println!();
        for workflow in &workflows {
            let visibility = if workflow.is_public { "public" } else { "private" };
            println!("#{} {} ({} steps, {})", workflow.id, workflow.name, workflow.steps.len(), visibility);
            if !workflow.description.is_empty() {
                println!("   📄 {}", workflow.description);
            }
            for (index, step) in workflow.steps.iter().enumerate() {
                let deps = step.dependency_labels();
                if deps.is_empty() {
                    println!("   {}. {}", index + 1, step.name);
                } else {
                    println!("   {}. {} (after {})", index + 1, step.name, join_labels(&deps));
                }
            }
            if let Err(e) = workflow.validate() {
                println!("   ⚠️  {e}");
            }
        }
        Ok(())
    }
}

pub struct SessionsCommand {
    pub outer_session_id: i64,
}

impl SessionsCommand {
    pub async fn execute(&self, backend: &dyn WorkflowBackend) -> Result<()> {
        let sessions = backend.list_sessions(self.outer_session_id).await?;
        if sessions.is_empty() {
            println!("🗂️  No workflow sessions in collaboration session {}", self.outer_session_id);
            println!("   💡 Start one with: workflow-runner start <workflow-id> --session {}", self.outer_session_id);
            return Ok(());
        }

        let workflows = backend.list_workflows().await?;
        let active_id = select_active_session(&sessions).map(|session| session.id);

        println!("🗂️  Workflow sessions in collaboration session {}:", self.outer_session_id);
        for session in &sessions {
            let workflow = workflows.iter().find(|workflow| workflow.id == session.workflow_id);
            let marker = if Some(session.id) == active_id { "▶️ " } else { "  " };
            println!("{marker} {}", session_listing_line(session, workflow));
        }
        Ok(())
    }
}

pub struct StartCommand {
    pub workflow_id: i64,
    pub outer_session_id: i64,
}

impl StartCommand {
    pub async fn execute(&self, backend: &dyn WorkflowBackend) -> Result<()> {
        let session = backend.start_session(self.workflow_id, self.outer_session_id).await?;
        println!("🚀 Started workflow session #{} [{}]", session.id, session.status);
        println!(
            "💡 Execute the first step with: workflow-runner execute {} --session {}",
            session.id, self.outer_session_id
        );
        Ok(())
    }
}

pub struct StatusCommand {
    pub workflow_session_id: i64,
    pub outer_session_id: i64,
}

impl StatusCommand {
    pub async fn execute(&self, backend: &dyn WorkflowBackend) -> Result<()> {
        let (workflow, session) =
            load_session_context(backend, self.workflow_session_id, self.outer_session_id).await?;
        let summary = SessionSummary::build(&WorkflowProgressModel::new(&workflow, &session))?;
        print_summary(&summary);
        Ok(())
    }
}

pub struct ExecuteCommand {
    pub workflow_session_id: i64,
    pub outer_session_id: i64,
}

impl ExecuteCommand {
    pub async fn execute(&self, backend: Arc<dyn WorkflowBackend>) -> Result<()> {
        let (workflow, session) =
            load_session_context(backend.as_ref(), self.workflow_session_id, self.outer_session_id).await?;
        let runner = SessionRunner::new(backend, workflow, session)?;

        println!("▶️  Executing next step of workflow session #{}...", self.workflow_session_id);
        match runner.execute_next_step().await {
            Ok(_) => {
                print_summary(&runner.summary()?);
                Ok(())
            }
            Err(e) => {
                println!("❌ Step execution failed: {e}");
                Err(e.into())
            }
        }
    }
}

pub fn print_summary(summary: &SessionSummary) {
    println!();
    println!("📊 {} - session #{}", summary.workflow_name, summary.session_id);
    println!("   Status: {}  |  {}", status_badge(summary.status), summary.progress_line());
    println!();

    for step in &summary.steps {
        println!("{} {}. {}", step_icon(step.status), step.index + 1, step.name);
        if !step.description.is_empty() {
            println!("      {}", step.description);
        }
        if step.agent_required {
            println!("      🤖 Agent required");
        } else if let Some(role) = &step.agent_role {
            println!("      🤖 Role: {role}");
        }
        if !step.depends_on.is_empty() {
            println!("      ⛓️  Depends on step(s) {}", join_labels(&step.depends_on));
        }
        if let Some(result) = &step.result {
            println!("      💬 {} at {}", result.agent_name, result.timestamp);
            for line in result.content.lines() {
                println!("         {line}");
            }
        }
    }

    println!();
    match summary.status {
        SessionStatus::Completed => println!("✅ Workflow completed"),
        SessionStatus::Failed => println!("❌ Workflow failed"),
        _ if summary.executable => println!("💡 Next step can be executed"),
        _ => println!("💡 Execute the first step to start this session"),
    }
    if let Some(step) = summary.next_step.and_then(|index| summary.steps.get(index)) {
        println!("👉 Next: {}. {}", step.index + 1, step.name);
    }
}

fn status_badge(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Pending => "⏳ pending",
        SessionStatus::InProgress => "🔄 in progress",
        SessionStatus::Completed => "✅ completed",
        SessionStatus::Failed => "❌ failed",
    }
}

fn step_icon(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Completed => "  ✅",
        StepStatus::Current => "  ▶️ ",
        StepStatus::Blocked => "  🔒",
        StepStatus::Pending => "  ⏳",
    }
}

fn join_labels(labels: &[usize]) -> String {
    labels
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
