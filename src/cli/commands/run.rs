use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::backend::WorkflowBackend;
use crate::cli::commands::load_session_context;
use crate::cli::commands::workflows::print_summary;
use crate::shutdown::ShutdownCoordinator;
use crate::workflows::{AutoExecutor, SessionRunner, SessionStatus};

pub struct RunCommand {
    pub workflow_session_id: i64,
    pub outer_session_id: i64,
    pub interval: Duration,
}

impl RunCommand {
    pub async fn execute(&self, backend: Arc<dyn WorkflowBackend>) -> Result<()> {
        let (workflow, session) =
            load_session_context(backend.as_ref(), self.workflow_session_id, self.outer_session_id).await?;
        let runner = Arc::new(SessionRunner::new(backend, workflow, session)?);

        let status = runner.session().status;
        if status.is_terminal() {
            println!("ℹ️  Workflow session #{} is already {status}", self.workflow_session_id);
            print_summary(&runner.summary()?);
            return Ok(());
        }

        if status == SessionStatus::Pending {
            println!("▶️  Executing the first step to start the session...");
            runner.execute_next_step().await?;
        }

        println!(
            "⏱️  Auto-executing every {} ms (Ctrl-C to stop)",
            self.interval.as_millis()
        );

        let mut state_rx = runner.subscribe();
        let executor = AutoExecutor::spawn(runner.clone(), self.interval, true);
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.wait_for_signal();
        tokio::pin!(signal);
        let mut liveness = tokio::time::interval(Duration::from_secs(1));
        let mut last_step = runner.session().current_step;

        let interrupted = loop {
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break false;
                    }
                    let state = state_rx.borrow_and_update().clone();
                    if state.executing {
                        println!("   🔄 Executing step {}...", state.session.current_step + 1);
                    } else if state.session.current_step != last_step {
                        last_step = state.session.current_step;
                        println!("   ✅ {} step(s) done [{}]", last_step, state.session.status);
                    }
                    if state.session.status.is_terminal() {
                        break false;
                    }
                }
                result = &mut signal => {
                    result?;
                    break true;
                }
                _ = liveness.tick() => {
                    if executor.is_finished() {
                        break false;
                    }
                }
            }
        };

        if interrupted {
            println!();
            println!("🛑 Stopping auto-execute...");
            ShutdownCoordinator::shutdown_run(executor, runner.subscribe()).await?;
        } else {
            executor.wait().await;
            info!(workflow_session.id = self.workflow_session_id, "Run finished");
        }

        print_summary(&runner.summary()?);
        Ok(())
    }
}
