use clap::{Parser, Subcommand, ValueEnum};

pub mod commands;

#[derive(Parser)]
#[command(name = "workflow-runner")]
#[command(about = "Drive multi-agent workflow sessions on a collaboration backend")]
#[command(long_about = "workflow-runner lists workflows, starts workflow sessions inside a collaboration \
                       session, shows per-step progress and executes steps one at a time or on a timer. \
                       It also opens and votes on conflict resolutions between agents.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List workflow definitions available on the backend
    Workflows,
    /// List workflow sessions attached to a collaboration session
    Sessions {
        /// Collaboration session id
        session: i64,
    },
    /// Start a new run of a workflow
    Start {
        /// Workflow id to run
        workflow_id: i64,
        /// Collaboration session the run belongs to
        #[arg(long, help = "Collaboration session id the workflow session is attached to")]
        session: i64,
    },
    /// Show per-step status of a workflow session
    Status {
        /// Workflow session id
        workflow_session_id: i64,
        #[arg(long, help = "Collaboration session id the workflow session is attached to")]
        session: i64,
    },
    /// Execute the next step of a workflow session once
    Execute {
        /// Workflow session id
        workflow_session_id: i64,
        #[arg(long, help = "Collaboration session id the workflow session is attached to")]
        session: i64,
    },
    /// Execute steps on a timer until the session finishes or Ctrl-C
    Run {
        /// Workflow session id
        workflow_session_id: i64,
        #[arg(long, help = "Collaboration session id the workflow session is attached to")]
        session: i64,
        /// Delay before each automatic execution
        #[arg(long, help = "Milliseconds to wait before each step (defaults to auto_execute.interval_ms)")]
        interval_ms: Option<u64>,
    },
    /// Conflict resolution between session agents
    Conflicts {
        #[command(subcommand)]
        command: ConflictCommands,
    },
}

#[derive(Subcommand)]
pub enum ConflictCommands {
    /// List conflict resolutions of a collaboration session
    List {
        #[arg(long, help = "Collaboration session id")]
        session: i64,
    },
    /// Open a conflict resolution on a message
    Create {
        #[arg(long, help = "Collaboration session id")]
        session: i64,
        #[arg(long, help = "Agent opening the resolution (the deciding agent for manager decisions)")]
        agent: i64,
        #[arg(long, value_enum, help = "How the conflict will be resolved")]
        method: MethodArg,
        #[arg(long, help = "Conflicting message id (defaults to the latest message of the session)")]
        message: Option<i64>,
    },
    /// Vote for one of the offered options
    Vote {
        /// Conflict resolution id
        conflict_id: i64,
        #[arg(long, help = "Collaboration session id")]
        session: i64,
        #[arg(long, help = "Voting agent id")]
        agent: i64,
        #[arg(long, help = "Option text exactly as listed")]
        option: String,
    },
    /// Submit a proposal towards consensus
    Propose {
        /// Conflict resolution id
        conflict_id: i64,
        #[arg(long, help = "Collaboration session id")]
        session: i64,
        #[arg(long, help = "Proposing agent id")]
        agent: i64,
        #[arg(long, help = "Proposal text")]
        text: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Voting,
    Consensus,
    ManagerDecision,
}

impl From<MethodArg> for crate::conflicts::ResolutionMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Voting => crate::conflicts::ResolutionMethod::Voting,
            MethodArg::Consensus => crate::conflicts::ResolutionMethod::Consensus,
            MethodArg::ManagerDecision => crate::conflicts::ResolutionMethod::ManagerDecision,
        }
    }
}
