use std::process::ExitCode;

use clap::{Parser, Subcommand};

use clawe::commands::agent::{AgentCommand, CheckArgs, NotifyArgs, SquadArgs};
use clawe::commands::chat::ChatCommand;
use clawe::commands::cron::{CronCommand, HealthArgs};
use clawe::commands::feed::FeedArgs;
use clawe::commands::init::InitArgs;
use clawe::commands::tasks::{DeliverArgs, DeliverablesArgs, SubtaskCommand, TaskCommand, TasksArgs};
use clawe::commands::watch::WatchArgs;
use clawe::{commands, error, telemetry};

#[derive(Debug, Parser)]
#[command(
    name = "clawe",
    version,
    about = "Notification watcher, heartbeat bootstrapper, and chat client for an OpenClaw agent squad"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Register the squad, ensure heartbeat crons, and deliver notifications
    Watch(WatchArgs),
    /// Record a heartbeat and claim pending notifications (prints HEARTBEAT_OK if none)
    Check(CheckArgs),
    /// Send a notification to another agent
    Notify(NotifyArgs),
    /// Show every agent and what it is working on
    Squad(SquadArgs),
    /// Manage agent records
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },
    /// List an agent's active tasks
    Tasks(TasksArgs),
    /// Update a task (status, assign, comment)
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    /// Manage subtasks (add, check, uncheck)
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommand,
    },
    /// Register a deliverable for a task
    Deliver(DeliverArgs),
    /// List deliverables of a task
    Deliverables(DeliverablesArgs),
    /// Show the recent activity feed
    Feed(FeedArgs),
    /// Print the business context as JSON
    Business,
    /// Inspect and sync gateway cron jobs
    Cron {
        #[command(subcommand)]
        command: CronCommand,
    },
    /// Check that the gateway answers
    Health(HealthArgs),
    /// Chat with an agent session
    Chat {
        #[command(subcommand)]
        command: ChatCommand,
    },
    /// Write a clawe.toml with the default squad
    Init(InitArgs),
    /// Print the JSON Schema for clawe.toml
    Schema,
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Watch(_) => "watch",
            Self::Check(_) => "check",
            Self::Notify(_) => "notify",
            Self::Squad(_) => "squad",
            Self::Agent { .. } => "agent",
            Self::Tasks(_) => "tasks",
            Self::Task { .. } => "task",
            Self::Subtask { .. } => "subtask",
            Self::Deliver(_) => "deliver",
            Self::Deliverables(_) => "deliverables",
            Self::Feed(_) => "feed",
            Self::Business => "business",
            Self::Cron { .. } => "cron",
            Self::Health(_) => "health",
            Self::Chat { .. } => "chat",
            Self::Init(_) => "init",
            Self::Schema => "schema",
        }
    }
}

fn main() -> ExitCode {
    let _telemetry = telemetry::init();

    let cli = Cli::parse();

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Watch(args) => args.execute(),
        Commands::Check(args) => args.execute(),
        Commands::Notify(args) => args.execute(),
        Commands::Squad(args) => args.execute(),
        Commands::Agent { command } => command.execute(),
        Commands::Tasks(args) => args.execute(),
        Commands::Task { command } => command.execute(),
        Commands::Subtask { command } => command.execute(),
        Commands::Deliver(args) => args.execute(),
        Commands::Deliverables(args) => args.execute(),
        Commands::Feed(args) => args.execute(),
        Commands::Business => commands::feed::run_business(),
        Commands::Cron { command } => command.execute(),
        Commands::Health(args) => args.execute(),
        Commands::Chat { command } => command.execute(),
        Commands::Init(args) => args.execute(),
        Commands::Schema => commands::schema::run_schema(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(exit_err) = e.downcast_ref::<error::ExitError>() {
                eprintln!("error: {exit_err}");
            } else {
                eprintln!("error: {e:#}");
            }
            error::exit_code_for(&e)
        }
    }
}
