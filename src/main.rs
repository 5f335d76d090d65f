//! senet CLI: Kanban task board with AI-assisted enrichment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use miette::Result;

use senet::ai::{Assistant, ViewToken, fetch_insights};
use senet::store::json::JsonStore;
use senet::store::{StoreEvent, Subscription, TaskStore};
use senet::sync::SyncedBoard;
use senet::task::{Priority, Status, Task, TaskDraft, TaskPatch};

/// User id under which the local JSON store files rows.
const LOCAL_USER: &str = "local";

#[derive(Parser)]
#[command(name = "senet", version, about = "Kanban task board with AI-assisted enrichment")]
struct Cli {
    /// Board file (defaults to $XDG_DATA_HOME/senet/board.json).
    #[arg(long, global = true)]
    board: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task to the backlog.
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        status: Option<Status>,
        /// Comma-separated tags.
        #[arg(long)]
        tags: Option<String>,
    },

    /// List tasks by column.
    List {
        /// Show archived tasks instead of the working columns.
        #[arg(long)]
        archived: bool,
    },

    /// Show one task in full.
    Show { id: String },

    /// Edit task fields.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        /// Comma-separated tags (replaces the current set).
        #[arg(long)]
        tags: Option<String>,
    },

    /// Move a task to another column.
    Move { id: String, status: Status },

    /// Delete a task permanently.
    Rm { id: String },

    /// Archive a task (soft delete; restore with unarchive).
    Archive { id: String },

    /// Restore an archived task to its old column.
    Unarchive { id: String },

    /// Ask the AI to improve a task's description, tags, and priority.
    Enhance {
        id: String,
        /// Apply the suggestions instead of just printing them.
        #[arg(long)]
        apply: bool,
    },

    /// Parse natural-language input into a structured task.
    Parse {
        input: String,
        /// Create the parsed task instead of just printing it.
        #[arg(long)]
        save: bool,
    },

    /// Suggest tags for a task.
    Tags {
        id: String,
        /// Append the suggested tags to the task.
        #[arg(long)]
        apply: bool,
    },

    /// Break a task down into subtasks.
    Subtasks {
        id: String,
        /// Create the subtasks as new backlog tasks.
        #[arg(long)]
        save: bool,
    },

    /// Fetch productivity insights and priority recommendations.
    Insights {
        /// Apply the priority recommendations to the board.
        #[arg(long)]
        apply: bool,
    },

    /// Group archived tasks into categories.
    Organize,

    /// Watch the board file for changes and print them.
    Watch {
        /// Poll interval in seconds.
        #[arg(long, default_value = "2")]
        interval: u64,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let board_path = match cli.board {
        Some(p) => p,
        None => default_board_path()?,
    };
    let store = JsonStore::new(board_path);
    let mut board = SyncedBoard::open(Arc::new(store.clone()), LOCAL_USER)?;

    match cli.command {
        Commands::Add {
            title,
            description,
            priority,
            status,
            tags,
        } => {
            let task = board.create(TaskDraft {
                title,
                description,
                priority,
                status,
                tags: split_tags(tags),
            })?;
            println!("Created {} - {}", task.id, task.title);
        }

        Commands::List { archived } => {
            if archived {
                let tasks: Vec<&Task> = board.board().archived().collect();
                if tasks.is_empty() {
                    println!("No archived tasks.");
                } else {
                    print_rows(&tasks);
                }
            } else {
                for status in Status::ALL {
                    let tasks = board.board().by_status(status);
                    println!("── {} ({})", status.title(), tasks.len());
                    print_rows(&tasks);
                }
            }
        }

        Commands::Show { id } => {
            let task = board
                .board()
                .get(&id)
                .ok_or_else(|| miette::miette!("task not found: {id}"))?;
            print_task(task);
        }

        Commands::Edit {
            id,
            title,
            description,
            priority,
            tags,
        } => {
            let task = board.update(
                &id,
                TaskPatch {
                    title,
                    description,
                    priority,
                    tags: tags.map(|t| split_tags(Some(t))),
                    ..Default::default()
                },
            )?;
            print_task(&task);
        }

        Commands::Move { id, status } => {
            let task = board.move_to(&id, status)?;
            println!("{} → {}", task.title, task.status.title());
        }

        Commands::Rm { id } => {
            board.delete(&id)?;
            println!("Deleted {id}");
        }

        Commands::Archive { id } => {
            let task = board.archive(&id)?;
            println!("Archived {} - {}", task.id, task.title);
        }

        Commands::Unarchive { id } => {
            let task = board.unarchive(&id)?;
            println!("Restored {} to {}", task.title, task.status.title());
        }

        Commands::Enhance { id, apply } => {
            let task = board
                .board()
                .get(&id)
                .ok_or_else(|| miette::miette!("task not found: {id}"))?
                .clone();
            let assistant = Assistant::from_env();
            let enhancement = assistant.enhance_task(&task)?;

            if let Some(desc) = &enhancement.improved_description {
                println!("Improved description:\n  {desc}");
            }
            if let Some(priority) = enhancement.recommended_priority {
                println!("Recommended priority: {priority}");
            }
            if !enhancement.recommended_tags.is_empty() {
                println!("Recommended tags: {}", enhancement.recommended_tags.join(", "));
            }
            if let Some(estimate) = &enhancement.estimated_time {
                println!("Estimated time: {estimate}");
            }
            for tip in &enhancement.suggestions {
                println!("Tip: {tip}");
            }
            for subtask in &enhancement.subtasks {
                println!("Subtask: {subtask}");
            }

            if apply {
                let mut tags = task.tags.clone();
                tags.extend(enhancement.recommended_tags.iter().cloned());
                board.update(
                    &id,
                    TaskPatch {
                        description: enhancement.improved_description.clone(),
                        priority: enhancement.recommended_priority,
                        tags: Some(tags),
                        ai_enhanced: Some(true),
                        ai_suggested_tags: Some(enhancement.recommended_tags.clone()),
                        ..Default::default()
                    },
                )?;
                println!("Applied.");
            }
        }

        Commands::Parse { input, save } => {
            let assistant = Assistant::from_env();
            let parsed = assistant.parse_natural_language(&input)?;
            println!(
                "Title: {}\nPriority: {}\nStatus: {}\nTags: {}",
                parsed.title,
                parsed
                    .priority
                    .map_or_else(|| "medium (default)".into(), |p| p.to_string()),
                parsed
                    .status
                    .map_or_else(|| "backlog (default)".into(), |s| s.to_string()),
                if parsed.tags.is_empty() {
                    "-".into()
                } else {
                    parsed.tags.join(", ")
                },
            );
            if let Some(desc) = &parsed.description {
                println!("Description: {desc}");
            }
            if save {
                let task = board.create(parsed.into())?;
                println!("Created {} - {}", task.id, task.title);
            }
        }

        Commands::Tags { id, apply } => {
            let task = board
                .board()
                .get(&id)
                .ok_or_else(|| miette::miette!("task not found: {id}"))?
                .clone();
            let assistant = Assistant::from_env();
            let suggested = assistant
                .suggest_tags(&task.title, task.description.as_deref())
                ?;
            println!("Suggested tags: {}", suggested.join(", "));
            if apply {
                let mut tags = task.tags.clone();
                tags.extend(suggested.iter().cloned());
                board.update(
                    &id,
                    TaskPatch {
                        tags: Some(tags),
                        ai_suggested_tags: Some(suggested),
                        ..Default::default()
                    },
                )?;
                println!("Applied.");
            }
        }

        Commands::Subtasks { id, save } => {
            let task = board
                .board()
                .get(&id)
                .ok_or_else(|| miette::miette!("task not found: {id}"))?
                .clone();
            let assistant = Assistant::from_env();
            let subtasks = assistant
                .generate_subtasks(&task.title, task.description.as_deref())
                ?;
            for sub in &subtasks {
                println!(
                    "- {} [{}]",
                    sub.title,
                    sub.priority.unwrap_or(Priority::Medium)
                );
            }
            if save {
                for sub in subtasks {
                    board.create(TaskDraft {
                        title: sub.title,
                        description: sub.description,
                        priority: sub.priority,
                        status: None,
                        tags: sub.tags,
                    })?;
                }
                println!("Created.");
            }
        }

        Commands::Insights { apply } => {
            let tasks: Vec<Task> = board.board().working().cloned().collect();
            if tasks.is_empty() {
                println!("Nothing on the board yet.");
                return Ok(());
            }
            let assistant = Assistant::from_env();
            let token = ViewToken::new();
            let Some(bundle) = fetch_insights(&assistant, &tasks, &token)?
            else {
                return Ok(());
            };

            let summary = &bundle.report.summary;
            println!(
                "{} tasks, {} complete",
                summary.total_tasks, summary.completion_rate
            );
            if let Some(avg) = &summary.average_time_in_progress {
                println!("Average time in progress: {avg}");
            }
            for insight in &bundle.report.insights {
                println!("[{:?}] {} - {}", insight.kind, insight.title, insight.description);
            }

            for rec in &bundle.recommendations {
                println!(
                    "Priority: {} {} → {} ({})",
                    rec.task_id, rec.current_priority, rec.recommended_priority, rec.reason
                );
            }
            if apply {
                for rec in &bundle.recommendations {
                    board.apply_recommendation(rec)?;
                }
                println!("Applied {} recommendation(s).", bundle.recommendations.len());
            }
        }

        Commands::Organize => {
            let archived: Vec<Task> = board.board().archived().cloned().collect();
            if archived.is_empty() {
                println!("No archived tasks to organize.");
                return Ok(());
            }
            let assistant = Assistant::from_env();
            let categories = assistant.sort_archived(&archived)?;
            for cat in categories {
                println!("── {}", cat.name);
                if let Some(desc) = &cat.description {
                    println!("   {desc}");
                }
                for id in &cat.task_ids {
                    if let Some(task) = archived.iter().find(|t| &t.id == id) {
                        println!("   {} - {}", task.id, task.title);
                    }
                }
            }
        }

        Commands::Watch { interval } => {
            let sub = Subscription::watch(
                Arc::new(store) as Arc<dyn TaskStore>,
                LOCAL_USER,
                Duration::from_secs(interval),
            );
            println!("Watching for changes (Ctrl-C to stop)...");
            loop {
                match sub.next_timeout(Duration::from_secs(60)) {
                    Some(StoreEvent::Inserted(task)) => {
                        println!("+ {} - {}", task.id, task.title)
                    }
                    Some(StoreEvent::Updated(task)) => {
                        println!("~ {} - {} [{}]", task.id, task.title, task.status)
                    }
                    Some(StoreEvent::Deleted(id)) => println!("- {id}"),
                    None => {}
                }
            }
        }
    }

    Ok(())
}

/// `$SENET_DATA_DIR`, else the XDG data directory, else `~/.local/share`.
fn default_board_path() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("SENET_DATA_DIR") {
        return Ok(PathBuf::from(dir).join("board.json"));
    }
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| {
            std::env::var("HOME").map(|home| PathBuf::from(home).join(".local/share"))
        })
        .map_err(|_| miette::miette!("cannot determine home directory"))?;
    Ok(base.join("senet").join("board.json"))
}

fn split_tags(raw: Option<String>) -> Vec<String> {
    raw.map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default()
}

fn print_rows(tasks: &[&Task]) {
    for task in tasks {
        let tags = if task.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", task.tags.join(","))
        };
        let marker = if task.ai_enhanced { "*" } else { " " };
        println!("  {:<28} {:<6}{marker} {}{tags}", task.id, task.priority, task.title);
    }
}

fn print_task(task: &Task) {
    println!("{} - {}", task.id, task.title);
    println!("  status:    {}", task.status);
    println!("  priority:  {}", task.priority);
    if let Some(desc) = &task.description {
        println!("  about:     {desc}");
    }
    if !task.tags.is_empty() {
        println!("  tags:      {}", task.tags.join(", "));
    }
    if task.ai_enhanced {
        println!("  ai:        enhanced ({})", task.ai_suggested_tags.join(", "));
    }
    println!("  created:   {}", task.created_at.to_rfc3339());
    println!("  updated:   {}", task.updated_at.to_rfc3339());
    if let Some(at) = task.archived_at {
        println!("  archived:  {}", at.to_rfc3339());
    }
}
