// Timer-driven advancement of a workflow session
//
// A delay is armed only while auto-execute is enabled, the session is
// in_progress and no execution is outstanding. Any change to those conditions
// drops the pending delay before it can fire.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::workflows::errors::{ErrorKind, WorkflowError};
use crate::workflows::runner::SessionRunner;
use crate::workflows::types::SessionStatus;

/// Background task executing the next step of a session at a fixed interval
pub struct AutoExecutor {
    enabled: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl AutoExecutor {
    /// Spawn the executor onto the current tokio runtime
    pub fn spawn(runner: Arc<SessionRunner>, interval: Duration, enabled: bool) -> Self {
        let (enabled_tx, enabled_rx) = watch::channel(enabled);
        let handle = tokio::spawn(auto_execute_loop(runner, enabled_rx, interval));
        Self {
            enabled: enabled_tx,
            handle: Some(handle),
        }
    }

    pub fn enable(&self) {
        self.set_enabled(true);
    }

    /// Stop scheduling executions; a request already in flight still completes
    pub fn disable(&self) {
        self.set_enabled(false);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.send_if_modified(|current| {
            let changed = *current != enabled;
            *current = enabled;
            changed
        });
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// The loop has ended, normally because the session became terminal
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the loop to end
    pub async fn wait(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    error!(error = %err, "Auto-execute task panicked");
                }
            }
        }
    }
}

impl Drop for AutoExecutor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn auto_execute_loop(
    runner: Arc<SessionRunner>,
    mut enabled_rx: watch::Receiver<bool>,
    interval: Duration,
) {
    let mut state_rx = runner.subscribe();
    let session_id = state_rx.borrow().session.id;
    info!(
        workflow_session.id = session_id,
        interval_ms = interval.as_millis() as u64,
        "Auto-execute loop started"
    );

    loop {
        let armed = {
            let state = state_rx.borrow_and_update();
            if state.session.status.is_terminal() {
                info!(
                    workflow_session.id = session_id,
                    status = %state.session.status,
                    "Session finished, auto-execute loop stopping"
                );
                return;
            }
            let enabled = *enabled_rx.borrow_and_update();
            enabled && state.session.status == SessionStatus::InProgress && !state.executing
        };

        if armed {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(err) = runner.execute_next_step().await {
                        if !keep_running_after(&err) {
                            error!(
                                workflow_session.id = session_id,
                                error = %err,
                                "Auto-execute stopped"
                            );
                            return;
                        }
                    }
                }
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    debug!(workflow_session.id = session_id, "Session changed, pending auto-execute cancelled");
                }
                changed = enabled_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    debug!(workflow_session.id = session_id, "Auto-execute toggled, pending auto-execute cancelled");
                }
            }
        } else {
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                changed = enabled_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Transport failures and lost races leave the loop running; anything else
/// means the session can no longer be advanced by retrying.
fn keep_running_after(err: &WorkflowError) -> bool {
    match err {
        WorkflowError::ExecutionOutstanding { .. } => {
            debug!("Execution already outstanding, skipping this tick");
            true
        }
        err if err.kind() == ErrorKind::Transport => {
            warn!(error = %err, "Auto-execute step failed, will retry on the next interval");
            true
        }
        _ => false,
    }
}
