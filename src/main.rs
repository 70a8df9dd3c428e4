use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use discipline::clock::{Clock, SystemClock};
use discipline::config::{default_config_path, DisciplineConfig};
use discipline::models::{
    CurrentTask, ImportMode, NodeStatus, SessionStatus, TaskInput, TaskKind, TaskUpdate,
    TASK_PRESETS,
};
use discipline::planner::TaskPlanner;
use discipline::session::SessionEngine;
use discipline::store::{KeyValueStore, SqliteStore};
use discipline::tree::{codec, invariants, render, TreeEngine};

#[derive(Parser)]
#[command(name = "disc")]
#[command(about = "Focus-session chains and a gated commitment tree")]
struct Cli {
    /// Path to config.json (defaults to the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Focus sessions and chains
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },
    /// The commitment tree
    Tree {
        #[command(subcommand)]
        action: TreeCommand,
    },
    /// Task groups to start sessions from
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Show status, chains and any open window
    Status,
    /// Reserve a seat and open the grace window
    Reserve,
    /// Start a focus session
    Start {
        /// What this session is for
        #[arg(long, conflicts_with = "task_id")]
        task: Option<String>,
        /// Planned minutes for the task
        #[arg(long, requires = "task")]
        minutes: Option<u32>,
        /// Start from a stored task (see `disc task list`)
        #[arg(long)]
        task_id: Option<String>,
    },
    /// Pause with a logged reason
    Pause { reason: String },
    /// Resume a paused session
    Resume,
    /// Complete the running session
    Complete {
        #[arg(default_value = "")]
        notes: String,
    },
    /// Break the chain
    Fail {
        #[arg(default_value = "Gave up")]
        reason: String,
    },
    /// Reset chains and return to idle
    Reset,
    /// List, add or remove saved pause reasons
    Reasons {
        #[arg(long, conflicts_with = "remove")]
        add: Option<String>,
        #[arg(long)]
        remove: Option<String>,
    },
    /// Show completed sessions, newest first
    History,
    /// Replace the notes of a history entry
    Note { id: Uuid, note: String },
}

#[derive(Subcommand)]
enum TreeCommand {
    /// Render the tree
    Show,
    /// Report structural problems in the stored tree
    Check,
    /// Add a node (uses today's quota)
    Add {
        parent: String,
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Unlock a node (uses today's quota)
    Activate { id: String },
    /// Set a node's status: inactive, active, completed or failed
    Status { id: String, status: String },
    /// Set a node and its descendants inactive
    Extinguish { id: String },
    /// Delete a node and its descendants
    Delete { id: String },
    /// Move a node under a new parent
    Move { id: String, parent: String },
    /// Print the share code for the tree
    Export,
    /// Preview a share code, or replace the tree with it
    Import {
        /// Share code or share link
        token: String,
        #[arg(long)]
        replace: bool,
    },
    /// Keep a share code as a separate read-only tree
    ImportNew {
        token: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// List imported trees
    Imported,
    /// Copy one node from an imported tree (uses today's quota)
    Adopt {
        snapshot: String,
        node: String,
        parent: String,
    },
    /// Toggle sharing
    Share,
}

#[derive(Subcommand)]
enum TaskCommand {
    /// List groups and their tasks
    List,
    /// List the built-in presets
    Presets,
    /// Create a task group
    GroupAdd { name: String },
    /// Rename a task group
    GroupRename { id: String, name: String },
    /// Add a task to a group
    Add {
        group: String,
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        /// Planned minutes; omit for open-ended
        #[arg(long)]
        minutes: Option<u32>,
        /// i_will, i_want or i_wont
        #[arg(long, default_value = "i_will")]
        kind: String,
    },
    /// Add a preset (numbered as in `disc task presets`) to a group
    Preset { group: String, number: usize },
    /// Edit a task
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long, conflicts_with = "open_ended")]
        minutes: Option<u32>,
        /// Remove the planned length
        #[arg(long)]
        open_ended: bool,
        #[arg(long)]
        kind: Option<String>,
    },
    /// Delete a task
    Delete { id: String },
}

/// Initialize tracing with output to stderr so stdout stays parseable
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "discipline=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = DisciplineConfig::load(&config_path)?;

    let db = SqliteStore::open(config.database_path()?)?;
    db.migrate()?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    let store: Arc<dyn KeyValueStore> = Arc::new(db);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Commands::Session { action } => {
            let planner = TaskPlanner::new(store.clone())?;
            let engine = SessionEngine::with_config(store, clock, &config)?;
            run_session(engine, &planner, action)
        }
        Commands::Tree { action } => {
            let engine = TreeEngine::with_config(store, clock, &config)?;
            run_tree(engine, action)
        }
        Commands::Task { action } => run_task(TaskPlanner::new(store)?, action),
    }
}

fn run_session(
    mut engine: SessionEngine,
    planner: &TaskPlanner,
    action: SessionCommand,
) -> anyhow::Result<()> {
    if engine.is_reservation_expired() {
        engine.fail("Reservation expired")?;
        eprintln!("Reservation expired, chains reset.");
    }

    match action {
        SessionCommand::Status => {
            let state = engine.state();
            println!("status: {}", state.status);
            println!("chain: {}  aux chain: {}", state.chain_count, state.aux_chain_count);
            if let Some(left) = engine.reservation_remaining() {
                println!("reservation: {}s left", left.num_seconds());
            }
            if let Some(focused) = engine.focused_elapsed() {
                println!("focused: {}m", focused.num_minutes());
            }
            if let Some(task) = &state.current_task {
                println!("task: {}", task.title);
            }
        }
        SessionCommand::Reserve => print_json(engine.reserve()?)?,
        SessionCommand::Start {
            task,
            minutes,
            task_id,
        } => {
            let task = match task_id {
                Some(id) => Some(planner.current_task(&id)?),
                None => task.map(|title| CurrentTask::new(title, minutes)),
            };
            print_json(engine.start_session(task)?)?;
        }
        SessionCommand::Pause { reason } => print_json(engine.pause(&reason)?)?,
        SessionCommand::Resume => print_json(engine.resume()?)?,
        SessionCommand::Complete { notes } => print_json(&engine.complete_session(&notes)?)?,
        SessionCommand::Fail { reason } => {
            let reason = engine.fail(&reason)?;
            println!("Chains reset: {}", reason);
        }
        SessionCommand::Reset => {
            engine.reset()?;
            println!("Chains reset.");
        }
        SessionCommand::Reasons { add, remove } => {
            if let Some(reason) = add {
                engine.add_reason(&reason)?;
            }
            if let Some(reason) = remove {
                engine.remove_reason(&reason)?;
            }
            for reason in &engine.state().saved_reasons {
                println!("{}", reason);
            }
        }
        SessionCommand::History => print_json(engine.history())?,
        SessionCommand::Note { id, note } => {
            if !engine.update_history_note(id, &note)? {
                bail!("No history entry with id {}", id);
            }
        }
    }

    if engine.status() == SessionStatus::Reserved {
        if let Some(deadline) = engine.reservation_deadline() {
            eprintln!("Start before {}.", deadline.with_timezone(&chrono::Local));
        }
    }
    Ok(())
}

fn run_tree(mut engine: TreeEngine, action: TreeCommand) -> anyhow::Result<()> {
    match action {
        TreeCommand::Show => {
            print!("{}", render::render_tree(&engine.nodes()));
            let available = engine.can_activate_today()?;
            let remaining = engine.daily_limit().saturating_sub(engine.quota().count);
            if available {
                println!("\n{} unlock(s) left today", remaining);
            } else {
                println!("\nToday's quota is spent");
            }
        }
        TreeCommand::Check => {
            let errors = invariants::validate_invariants(&engine.nodes());
            if errors.is_empty() {
                println!("Tree is consistent");
            } else {
                for error in &errors {
                    println!("{}", error);
                }
                bail!("{} problem(s) found", errors.len());
            }
        }
        TreeCommand::Add {
            parent,
            title,
            description,
        } => print_json(&engine.add_node(&parent, &title, &description)?)?,
        TreeCommand::Activate { id } => print_json(engine.activate_node(&id)?)?,
        TreeCommand::Status { id, status } => {
            let Some(status) = NodeStatus::from_str(&status) else {
                bail!("Unknown status '{}'", status);
            };
            engine.set_node_status(&id, status)?;
        }
        TreeCommand::Extinguish { id } => {
            let count = engine.extinguish_node(&id)?;
            println!("{} node(s) extinguished", count);
        }
        TreeCommand::Delete { id } => {
            let removed = engine.delete_node(&id)?;
            println!("{} node(s) deleted", removed.len());
        }
        TreeCommand::Move { id, parent } => {
            if !engine.move_node(&id, &parent)? {
                println!("Nothing to move");
            }
        }
        TreeCommand::Export => println!("{}", engine.export_tree()?),
        TreeCommand::Import { token, replace } => {
            let mode = if replace {
                ImportMode::Replace
            } else {
                ImportMode::Preview
            };
            let nodes = engine.import_tree(codec::extract_share_code(&token), mode)?;
            print!("{}", render::render_tree(&nodes));
        }
        TreeCommand::ImportNew { token, name } => {
            let id = engine.import_as_new_tree(codec::extract_share_code(&token), &name)?;
            println!("{}", id);
        }
        TreeCommand::Imported => {
            for snapshot in engine.imported_trees() {
                println!("{}  {} ({} nodes)", snapshot.id, snapshot.name, snapshot.nodes.len());
            }
        }
        TreeCommand::Adopt {
            snapshot,
            node,
            parent,
        } => print_json(&engine.import_node_from_snapshot(&snapshot, &node, &parent)?)?,
        TreeCommand::Share => {
            let shared = engine.toggle_share()?;
            println!("shared: {}", shared);
            if shared {
                println!("{}", engine.export_tree()?);
            }
        }
    }
    Ok(())
}

fn run_task(mut planner: TaskPlanner, action: TaskCommand) -> anyhow::Result<()> {
    match action {
        TaskCommand::List => {
            for group in planner.groups() {
                println!("{}  {}", group.id, group.name);
                for task in &group.tasks {
                    let minutes = task
                        .minutes
                        .map_or_else(|| "open-ended".to_string(), |m| format!("{m} min"));
                    println!("  {} {} {} ({})", task.id, task.kind.symbol(), task.title, minutes);
                }
            }
        }
        TaskCommand::Presets => {
            for (i, preset) in TASK_PRESETS.iter().enumerate() {
                let minutes = preset
                    .minutes
                    .map_or_else(|| "open-ended".to_string(), |m| format!("{m} min"));
                println!("{}. {} {} ({})", i + 1, preset.kind.symbol(), preset.title, minutes);
            }
        }
        TaskCommand::GroupAdd { name } => print_json(&planner.create_group(&name)?)?,
        TaskCommand::GroupRename { id, name } => planner.rename_group(&id, &name)?,
        TaskCommand::Add {
            group,
            title,
            content,
            minutes,
            kind,
        } => {
            let input = TaskInput {
                title,
                content,
                minutes,
                kind: parse_kind(&kind)?,
            };
            print_json(&planner.add_task(&group, input)?)?;
        }
        TaskCommand::Preset { group, number } => {
            let Some(index) = number.checked_sub(1) else {
                bail!("Presets are numbered from 1");
            };
            print_json(&planner.add_preset(&group, index)?)?;
        }
        TaskCommand::Edit {
            id,
            title,
            content,
            minutes,
            open_ended,
            kind,
        } => {
            let update = TaskUpdate {
                title,
                content,
                minutes: if open_ended { Some(None) } else { minutes.map(Some) },
                kind: kind.as_deref().map(parse_kind).transpose()?,
            };
            print_json(&planner.update_task(&id, update)?)?;
        }
        TaskCommand::Delete { id } => {
            if !planner.delete_task(&id)? {
                bail!("No task with id {}", id);
            }
        }
    }
    Ok(())
}

fn parse_kind(s: &str) -> anyhow::Result<TaskKind> {
    match TaskKind::from_str(s) {
        Some(kind) => Ok(kind),
        None => bail!("Unknown task type '{}'", s),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
