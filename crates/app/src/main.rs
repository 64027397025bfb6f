mod config;
mod logging;

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use portal_core::model::{ActivityId, ActivityResult, GroupId, SessionActivityId, SessionId};
use serde::Serialize;
use serde_json::json;
use services::{CatalogServiceError, Clock, PortalServices, SessionServiceError};

use config::{AppConfig, ConfigError};

#[derive(Parser)]
#[command(name = "lang-portal")]
#[command(about = "Study sessions and scoring for the language portal")]
#[command(version)]
struct Cli {
    /// `SQLite` URL or file path (overrides `PORTAL_DB_URL`)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Migrate,

    /// Insert the default study activities and groups
    Seed,

    /// List study activities
    Activities,

    /// Show one study activity
    Activity { id: ActivityId },

    /// List word groups
    Groups,

    /// Manage study sessions
    #[command(subcommand)]
    Sessions(SessionCommands),
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List sessions, newest first
    List {
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,

        #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
        page_size: i64,
    },

    /// Show a session with its activities and aggregate score
    Show { id: SessionId },

    /// Open a session for a study activity
    Start {
        #[arg(long)]
        activity: ActivityId,

        #[arg(long)]
        group: Option<GroupId>,
    },

    /// Record an answered prompt in an open session
    Answer {
        session: SessionId,

        #[arg(long)]
        activity: ActivityId,

        #[arg(long)]
        challenge: String,

        #[arg(long)]
        answer: String,

        /// What the learner typed
        #[arg(long, default_value = "")]
        input: String,
    },

    /// Evaluate a recorded answer
    Evaluate {
        id: SessionActivityId,

        /// success or failure
        #[arg(long)]
        result: ActivityResult,

        /// 0 to 100
        #[arg(long, allow_negative_numbers = true)]
        score: i64,
    },

    /// Close a session with its final score
    End {
        id: SessionId,

        #[arg(long, allow_negative_numbers = true)]
        score: i64,
    },

    /// Delete one session and its activities
    Delete { id: SessionId },

    /// Delete one recorded answer
    DeleteActivity { id: SessionActivityId },

    /// Delete every session and activity
    Purge,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.db)?;
    config.prepare_sqlite_file()?;
    let services = PortalServices::new_sqlite(&config.sqlite(), Clock::system())
        .await
        .with_context(|| format!("opening {}", config.database_url))?;
    tracing::debug!(database = %config.database_url, "storage ready");

    match cli.command {
        Commands::Migrate => print_json(&json!({ "migrated": config.database_url })),
        Commands::Seed => {
            let report = services.catalog().seed_defaults().await?;
            print_json(&json!({
                "activities_added": report.activities_added,
                "groups_added": report.groups_added,
            }))
        }
        Commands::Activities => print_json(&services.catalog().list_activities().await?),
        Commands::Activity { id } => print_json(&services.catalog().get_activity(id).await?),
        Commands::Groups => print_json(&services.catalog().list_groups().await?),
        Commands::Sessions(command) => run_session_command(&services, command).await,
    }
}

async fn run_session_command(
    services: &PortalServices,
    command: SessionCommands,
) -> anyhow::Result<()> {
    let sessions = services.sessions();
    match command {
        SessionCommands::List { page, page_size } => {
            print_json(&sessions.list_sessions(page, page_size).await?)
        }
        SessionCommands::Show { id } => print_json(&sessions.session_results(id).await?),
        SessionCommands::Start { activity, group } => {
            print_json(&sessions.create_session(activity, group).await?)
        }
        SessionCommands::Answer {
            session,
            activity,
            challenge,
            answer,
            input,
        } => {
            let recorded = sessions
                .add_session_activity(session, activity, &challenge, &answer, &input)
                .await?;
            print_json(&recorded)
        }
        SessionCommands::Evaluate { id, result, score } => {
            print_json(&sessions.evaluate_session_activity(id, result, score).await?)
        }
        SessionCommands::End { id, score } => print_json(&sessions.end_session(id, score).await?),
        SessionCommands::Delete { id } => {
            let activities_deleted = sessions.delete_session(id).await?;
            print_json(&json!({ "deleted": id, "activities_deleted": activities_deleted }))
        }
        SessionCommands::DeleteActivity { id } => {
            sessions.delete_session_activity(id).await?;
            print_json(&json!({ "deleted": id }))
        }
        SessionCommands::Purge => {
            let outcome = sessions.delete_all_sessions().await?;
            if outcome.is_noop() {
                print_json(&json!({ "deleted": 0, "message": "no sessions to delete" }))
            } else {
                print_json(&json!({
                    "deleted": outcome.sessions_deleted,
                    "activities_deleted": outcome.activities_deleted,
                }))
            }
        }
    }
}

/// Print what the user may see and pick the exit code: 2 for client errors, 1 otherwise.
fn report(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<SessionServiceError>() {
        eprintln!("error: {}", e.user_message());
        return if e.is_client_error() { 2 } else { 1 };
    }
    if let Some(e) = err.downcast_ref::<CatalogServiceError>() {
        if matches!(e, CatalogServiceError::ActivityNotFound(_)) {
            eprintln!("error: {e}");
            return 2;
        }
    }
    if let Some(e) = err.downcast_ref::<ConfigError>() {
        eprintln!("error: {e}");
        return 2;
    }
    eprintln!("error: operation failed");
    1
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();
    logging::init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "command failed");
            ExitCode::from(report(&err))
        }
    }
}
