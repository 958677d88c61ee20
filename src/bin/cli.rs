//! CLI binary for alfred.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alfred::format::{PlainFormatter, TodoFormatter};
use alfred::notify::LogSink;
use alfred::scheduler::{PatrolDriver, Scheduler};
use alfred::store::NewTemplate;
use alfred::{AlfredConfig, Store, TaskEngine, TaskQuery, Transition};
use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Alfred: recurring todos from cron templates, with escalation and audit log.
#[derive(Parser)]
#[command(name = "alfred", version, about)]
struct Cli {
    /// Path to TOML configuration file (default: $ALFRED_CONFIG, then ~/.config/alfred/config.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the database path from the config.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run the scheduler and notification patrol until Ctrl-C.
    Run,

    /// Run one scheduling pass (create due todos, escalate overdue ones).
    Tick {
        /// Reference time, `YYYY-MM-DDTHH:MM:SS` (default: now).
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<NaiveDateTime>,
    },

    /// Add a recurring template.
    AddTemplate {
        #[arg(long)]
        user: String,
        #[arg(long)]
        content: String,
        /// Five-field cron expression, e.g. "0 9 * * 1-5".
        #[arg(long)]
        cron: String,
        /// Deadline after each occurrence: 30s, 5m, 2h or 1d.
        #[arg(long)]
        offset: String,
        /// Deactivate after the first todo.
        #[arg(long)]
        run_once: bool,
    },

    /// List templates.
    Templates,

    /// List todos, optionally for one date.
    Todos {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show one todo.
    Todo { id: i64 },

    /// Show the status history of a todo.
    Log { id: i64 },

    /// Mark a todo completed.
    Complete { id: i64 },

    /// Revert a completed todo to pending.
    Undo { id: i64 },

    /// Activate a template.
    Activate { id: i64 },

    /// Deactivate a template and revoke its open todos.
    Deactivate { id: i64 },

    /// Print every table as JSON.
    Dump,
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .map_err(|e| format!("expected YYYY-MM-DDTHH:MM:SS: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AlfredConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }
    let _log_guard = alfred::logging::init(&config.logging)?;

    let store = Arc::new(
        Store::open(&config.store)
            .with_context(|| format!("cannot open {}", config.store.path.display()))?,
    );
    let engine = Arc::new(TaskEngine::new(Arc::clone(&store)));
    let query = TaskQuery::new(Arc::clone(&store));
    let fmt = PlainFormatter;
    let now = || chrono::Local::now().naive_local();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, engine, query).await?,
        Command::Tick { at } => {
            let report = engine.tick(at.unwrap_or_else(now))?;
            println!(
                "created {} todo(s), escalated {}",
                report.created, report.escalated
            );
        }
        Command::AddTemplate {
            user,
            content,
            cron,
            offset,
            run_once,
        } => {
            let id = engine.add_template(
                &NewTemplate {
                    user_id: &user,
                    content: &content,
                    cron: &cron,
                    ddl_offset: &offset,
                    run_once,
                },
                now(),
            )?;
            println!("template {id} added");
        }
        Command::Templates => println!("{}", fmt.templates(&query.get_templates()?)),
        Command::Todos { date } => println!("{}", fmt.todos(&query.todos_for_date(date)?)),
        Command::Todo { id } => println!("{}", fmt.todo(&query.get_todo(id)?)),
        Command::Log { id } => println!("{}", fmt.status_logs(&query.get_status_log(id)?)),
        Command::Complete { id } => match engine.complete_todo(id, now())? {
            Transition::Changed { .. } => println!("todo {id} completed"),
            Transition::Unchanged { status } => println!("todo {id} is already {status}"),
        },
        Command::Undo { id } => {
            engine.revert_completion(id, now())?;
            println!("todo {id} reverted to pending");
        }
        Command::Activate { id } => {
            engine.set_template_active(id, true, now())?;
            println!("template {id} activated");
        }
        Command::Deactivate { id } => {
            let revoked = engine.set_template_active(id, false, now())?;
            println!("template {id} deactivated, {revoked} todo(s) revoked");
        }
        Command::Dump => println!("{}", serde_json::to_string_pretty(&store.dump()?)?),
    }
    Ok(())
}

async fn run(
    config: AlfredConfig,
    engine: Arc<TaskEngine>,
    query: TaskQuery,
) -> anyhow::Result<()> {
    println!("Alfred v{}", env!("CARGO_PKG_VERSION"));
    let cancel = CancellationToken::new();

    let scheduler = Scheduler::new(engine, cancel.child_token())
        .with_interval(Duration::from_secs(config.scheduler.tick_interval_secs))
        .run();

    let patrol = if config.patrol.enabled {
        let sink = Arc::new(LogSink::new(PlainFormatter));
        let driver = PatrolDriver::new(query, sink, cancel.child_token())
            .with_interval(Duration::from_secs(config.patrol.interval_secs))
            .with_summary_hour(config.patrol.summary_hour);
        Some(driver.run())
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    cancel.cancel();

    scheduler.await?;
    if let Some(patrol) = patrol {
        patrol.await?;
    }
    Ok(())
}
