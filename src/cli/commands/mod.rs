use anyhow::{anyhow, Result};
use std::io::Write;
use std::sync::Arc;

use crate::backend::{HttpBackend, WorkflowBackend};
use crate::config::BackendConfig;
use crate::observability::OperationTimer;
use crate::workflows::{Workflow, WorkflowSession};

pub mod conflicts;
pub mod run;
pub mod workflows;

pub async fn connect_backend(config: &BackendConfig) -> Result<Arc<HttpBackend>> {
    print!("🔄 Connecting to {}... ", config.base_url);
    std::io::stdout().flush()?;

    match HttpBackend::new(config) {
        Ok(backend) => {
            println!("✅");
            Ok(Arc::new(backend))
        }
        Err(e) => {
            println!("❌");
            Err(e.into())
        }
    }
}

/// Find a workflow session and its definition from the backend listings
pub async fn load_session_context(
    backend: &dyn WorkflowBackend,
    workflow_session_id: i64,
    outer_session_id: i64,
) -> Result<(Workflow, WorkflowSession)> {
    let timer = OperationTimer::new("load_session_context");
    let session = backend
        .list_sessions(outer_session_id)
        .await?
        .into_iter()
        .find(|session| session.id == workflow_session_id)
        .ok_or_else(|| {
            anyhow!(
                "Workflow session #{workflow_session_id} not found in collaboration session {outer_session_id}"
            )
        })?;

    let workflow = backend
        .list_workflows()
        .await?
        .into_iter()
        .find(|workflow| workflow.id == session.workflow_id)
        .ok_or_else(|| {
            anyhow!(
                "Workflow #{} for session #{} is not visible to this account",
                session.workflow_id,
                session.id
            )
        })?;

    timer.finish();
    Ok((workflow, session))
}

pub async fn show_how_to_get_started() -> Result<()> {
    println!("🎯 workflow-runner - Multi-Agent Workflow Sessions");
    println!();
    println!("To get started:");
    println!("  📋 workflow-runner workflows                       # List workflows");
    println!("  🗂️  workflow-runner sessions <session>              # List workflow sessions");
    println!("  🚀 workflow-runner start <workflow> --session <id>  # Start a workflow session");
    println!("  📊 workflow-runner status <ws> --session <id>       # Show step progress");
    println!("  ▶️  workflow-runner execute <ws> --session <id>      # Execute the next step");
    println!("  ⏱️  workflow-runner run <ws> --session <id>          # Auto-execute until done");
    println!();
    println!("Conflict resolution:");
    println!("  ⚖️  workflow-runner conflicts list --session <id>");
    println!();
    println!("💡 Configure the backend in workflow-runner.toml or WORKFLOW_RUNNER_BACKEND__BASE_URL");
    Ok(())
}
