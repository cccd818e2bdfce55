use anyhow::Result;
use clap::Parser;
use std::time::Duration;

use workflow_runner::cli::commands::{
    conflicts::{CreateConflictCommand, ListConflictsCommand, ProposeCommand, VoteCommand},
    connect_backend,
    run::RunCommand,
    show_how_to_get_started,
    workflows::{ExecuteCommand, SessionsCommand, StartCommand, StatusCommand, WorkflowsCommand},
};
use workflow_runner::cli::{Cli, Commands, ConflictCommands};
use workflow_runner::{config, init_config, init_telemetry, shutdown_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_config()?;
    let config = config()?;
    init_telemetry(&config.observability)?;

    let Some(command) = cli.command else {
        return tokio::runtime::Runtime::new()?.block_on(show_how_to_get_started());
    };

    let result = tokio::runtime::Runtime::new()?.block_on(async {
        let backend = connect_backend(&config.backend).await?;

        match command {
            Commands::Workflows => WorkflowsCommand.execute(backend.as_ref()).await,
            Commands::Sessions { session } => {
                SessionsCommand { outer_session_id: session }
                    .execute(backend.as_ref())
                    .await
            }
            Commands::Start { workflow_id, session } => {
                StartCommand {
                    workflow_id,
                    outer_session_id: session,
                }
                .execute(backend.as_ref())
                .await
            }
            Commands::Status {
                workflow_session_id,
                session,
            } => {
                StatusCommand {
                    workflow_session_id,
                    outer_session_id: session,
                }
                .execute(backend.as_ref())
                .await
            }
            Commands::Execute {
                workflow_session_id,
                session,
            } => {
                ExecuteCommand {
                    workflow_session_id,
                    outer_session_id: session,
                }
                .execute(backend)
                .await
            }
            Commands::Run {
                workflow_session_id,
                session,
                interval_ms,
            } => {
                let interval = interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| config.auto_execute.interval());
                RunCommand {
                    workflow_session_id,
                    outer_session_id: session,
                    interval,
                }
                .execute(backend)
                .await
            }
            Commands::Conflicts { command } => match command {
                ConflictCommands::List { session } => {
                    ListConflictsCommand { session_id: session }
                        .execute(backend.as_ref())
                        .await
                }
                ConflictCommands::Create {
                    session,
                    agent,
                    method,
                    message,
                } => {
                    CreateConflictCommand {
                        session_id: session,
                        agent_id: agent,
                        method: method.into(),
                        message_id: message,
                    }
                    .execute(backend.as_ref())
                    .await
                }
                ConflictCommands::Vote {
                    conflict_id,
                    session,
                    agent,
                    option,
                } => {
                    VoteCommand {
                        session_id: session,
                        conflict_id,
                        agent_id: agent,
                        option,
                    }
                    .execute(backend.as_ref())
                    .await
                }
                ConflictCommands::Propose {
                    conflict_id,
                    session,
                    agent,
                    text,
                } => {
                    ProposeCommand {
                        session_id: session,
                        conflict_id,
                        agent_id: agent,
                        text,
                    }
                    .execute(backend.as_ref())
                    .await
                }
            },
        }
    });

    shutdown_telemetry();
    result
}
