//! mindqueue CLI - task queue and memory store from the command line
//!
//! Usage:
//!   mindqueue task add "description" -p high -c docs
//!   mindqueue task next [-c category]
//!   mindqueue task claim [-c category]
//!   mindqueue task update <id> completed --result "done"
//!   mindqueue task list [--status pending] [-c category]
//!   mindqueue task delete <id>
//!   mindqueue memory store "content" -m fact -c research -t tag
//!   mindqueue memory retrieve [query] [-c category] [-m type] [-t tag]
//!   mindqueue memory merge <id> <id>... --content "merged"
//!   mindqueue memory decay [--threshold 0.01] [--action archive]
//!   mindqueue memory categories
//!   mindqueue memory touch <id>
//!   mindqueue cleanup                Purge old completed tasks, rescore memories
//!   mindqueue stats                  Show statistics

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use mindqueue::{
    Assistant, CreateMemoryInput, CreateTaskInput, DecayAction, MaintenanceConfigBuilder, Memory,
    MemoryType, Priority, RetrieveQuery, StatusFilter, Task, TaskStatus, DEFAULT_DECAY_THRESHOLD,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mindqueue")]
#[command(about = "mindqueue - task queue and decaying memory store for agents")]
#[command(version)]
struct Cli {
    /// Path to data directory
    #[arg(
        short,
        long,
        env = "MINDQUEUE_DATA_DIR",
        default_value = "./mindqueue_data"
    )]
    data_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work with the task queue
    #[command(subcommand)]
    Task(TaskCommand),

    /// Work with the memory store
    #[command(subcommand)]
    Memory(MemoryCommand),

    /// Purge old completed tasks and rescore memories
    Cleanup {
        /// Keep completed tasks for this many days
        #[arg(short, long, default_value = "7")]
        retention_days: i64,

        /// Report memories scoring below this
        #[arg(short, long, default_value_t = DEFAULT_DECAY_THRESHOLD)]
        threshold: f64,
    },

    /// Get statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Add a task
    Add {
        /// Task description
        description: String,

        /// Priority
        #[arg(short, long, value_enum, default_value = "medium")]
        priority: CliPriority,

        /// Category
        #[arg(short, long, default_value = "general")]
        category: String,

        /// Due date (RFC 3339)
        #[arg(long)]
        due: Option<DateTime<Utc>>,

        /// Task that must complete first (repeatable)
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
    },

    /// Show the next eligible task
    Next {
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Take the next eligible task and mark it in progress
    Claim {
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Set a task's status
    Update {
        /// Task ID
        id: String,

        /// pending, in_progress, completed or failed
        status: TaskStatus,

        /// Outcome text
        #[arg(short, long)]
        result: Option<String>,
    },

    /// List tasks
    List {
        /// Status filter, or "all"
        #[arg(short, long, default_value = "all")]
        status: StatusFilter,

        #[arg(short, long)]
        category: Option<String>,
    },

    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
}

#[derive(Subcommand)]
enum MemoryCommand {
    /// Store a memory
    Store {
        /// Memory content
        content: String,

        /// Memory type
        #[arg(short, long, value_enum, default_value = "fact")]
        memory_type: CliMemoryType,

        #[arg(short, long, default_value = "general")]
        category: String,

        /// Add tags
        #[arg(short, long)]
        tags: Vec<String>,

        /// Importance (1-10)
        #[arg(short, long)]
        importance: Option<u8>,
    },

    /// Retrieve memories ranked by decay score
    Retrieve {
        /// Text to match
        query: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long, value_enum)]
        memory_type: Option<CliMemoryType>,

        /// Match any of these tags
        #[arg(short, long)]
        tags: Vec<String>,

        /// Minimum decay score
        #[arg(long)]
        min_score: Option<f64>,

        /// Maximum results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Merge memories into one
    Merge {
        /// Memory IDs, at least two
        #[arg(required = true, num_args = 2..)]
        ids: Vec<String>,

        /// Content of the merged memory
        #[arg(long)]
        content: String,
    },

    /// Sweep memories below a decay threshold
    Decay {
        #[arg(long)]
        threshold: Option<f64>,

        #[arg(short, long, value_enum)]
        action: Option<CliDecayAction>,
    },

    /// List categories
    Categories,

    /// Record an access to a memory
    Touch {
        /// Memory ID
        id: String,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum CliPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl From<CliPriority> for Priority {
    fn from(cli: CliPriority) -> Self {
        match cli {
            CliPriority::Critical => Priority::Critical,
            CliPriority::High => Priority::High,
            CliPriority::Medium => Priority::Medium,
            CliPriority::Low => Priority::Low,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum CliMemoryType {
    Preference,
    Skill,
    Pattern,
    Decision,
    Fact,
    Interaction,
}

impl From<CliMemoryType> for MemoryType {
    fn from(cli: CliMemoryType) -> Self {
        match cli {
            CliMemoryType::Preference => MemoryType::Preference,
            CliMemoryType::Skill => MemoryType::Skill,
            CliMemoryType::Pattern => MemoryType::Pattern,
            CliMemoryType::Decision => MemoryType::Decision,
            CliMemoryType::Fact => MemoryType::Fact,
            CliMemoryType::Interaction => MemoryType::Interaction,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum CliDecayAction {
    Archive,
    Delete,
}

impl From<CliDecayAction> for DecayAction {
    fn from(cli: CliDecayAction) -> Self {
        match cli {
            CliDecayAction::Archive => DecayAction::Archive,
            CliDecayAction::Delete => DecayAction::Delete,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "mindqueue=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let assistant = Assistant::with_data_dir(&cli.data_dir)?;

    match cli.command {
        Commands::Task(command) => cmd_task(&assistant, command).await,
        Commands::Memory(command) => cmd_memory(&assistant, command).await,
        Commands::Cleanup {
            retention_days,
            threshold,
        } => cmd_cleanup(&assistant, retention_days, threshold).await,
        Commands::Stats { json } => cmd_stats(&assistant, json).await,
    }
}

async fn cmd_task(assistant: &Assistant, command: TaskCommand) -> anyhow::Result<()> {
    let tasks = assistant.tasks();

    match command {
        TaskCommand::Add {
            description,
            priority,
            category,
            due,
            depends_on,
        } => {
            let mut input = CreateTaskInput::new(description, priority.into(), category)
                .with_dependencies(depends_on);
            if let Some(due) = due {
                input = input.with_due_date(due.to_rfc3339());
            }
            let task = tasks.create_task(input).await?;

            println!("{}", "Task added successfully".green().bold());
            print_task(&task);
        }
        TaskCommand::Next { category } => {
            match tasks.get_next_task(category.as_deref()).await? {
                Some(task) => print_task(&task),
                None => println!("{}", "No eligible task".yellow()),
            }
        }
        TaskCommand::Claim { category } => match tasks.claim_next(category.as_deref()).await? {
            Some(task) => {
                println!("{}", "Claimed".green().bold());
                print_task(&task);
            }
            None => println!("{}", "No eligible task".yellow()),
        },
        TaskCommand::Update { id, status, result } => {
            let task = tasks.update_task_status(&id, status, result).await?;
            println!("{}", format!("Task is now {}", task.status).green());
            print_task(&task);
        }
        TaskCommand::List { status, category } => {
            let listed = tasks.list_tasks(status, category.as_deref()).await?;
            if listed.is_empty() {
                println!("{}", "No tasks found".yellow());
                return Ok(());
            }

            println!("{}", format!("{} tasks:", listed.len()).bold().green());
            for task in &listed {
                println!(
                    "  {} [{}] {} ({})",
                    task.id.dimmed(),
                    priority_label(task.priority),
                    task.description,
                    status_label(task.status)
                );
            }
        }
        TaskCommand::Delete { id } => {
            let task = tasks.delete_task(&id).await?;
            println!("{}", format!("Deleted {}", task.id).green());
        }
    }

    Ok(())
}

async fn cmd_memory(assistant: &Assistant, command: MemoryCommand) -> anyhow::Result<()> {
    let memories = assistant.memories();

    match command {
        MemoryCommand::Store {
            content,
            memory_type,
            category,
            tags,
            importance,
        } => {
            let mut input =
                CreateMemoryInput::new(memory_type.into(), category, content).with_tags(tags);
            input.importance = importance;
            let memory = memories.store_memory(input).await?;

            println!("{}", "Memory stored successfully".green().bold());
            print_memory(&memory);
        }
        MemoryCommand::Retrieve {
            query,
            category,
            memory_type,
            tags,
            min_score,
            limit,
        } => {
            let query = RetrieveQuery {
                query,
                category,
                memory_type: memory_type.map(Into::into),
                tags,
                min_decay_score: min_score,
                limit,
            };
            let found = memories.retrieve_memory(&query).await?;

            if found.is_empty() {
                println!("{}", "No memories found".yellow());
                return Ok(());
            }

            println!(
                "{}",
                format!("Found {} memories:", found.len()).bold().green()
            );
            println!();
            for (i, memory) in found.iter().enumerate() {
                println!(
                    "{}. {} ({} - {} - score: {})",
                    i + 1,
                    memory.content.chars().take(60).collect::<String>(),
                    memory.memory_type.to_string().cyan(),
                    memory.id.dimmed(),
                    score_label(memory)
                );
            }
        }
        MemoryCommand::Merge { ids, content } => {
            let merged = memories.merge_memories(&ids, &content).await?;
            println!(
                "{}",
                format!("Merged {} memories", merged.related_ids.len())
                    .green()
                    .bold()
            );
            print_memory(&merged);
        }
        MemoryCommand::Decay { threshold, action } => {
            let report = memories
                .decay_old_memories(threshold, action.map(Into::into))
                .await?;
            println!(
                "{}",
                format!(
                    "Decay sweep: {} memories {}d",
                    report.processed_count, report.action
                )
                .green()
            );
            if let Some(archive) = report.archive {
                println!("  Archive: {}", archive.cyan());
            }
        }
        MemoryCommand::Categories => {
            let categories = memories.list_categories().await?;
            if categories.is_empty() {
                println!("{}", "No categories yet".yellow());
            }
            for category in categories {
                println!("  {}", category);
            }
        }
        MemoryCommand::Touch { id } => {
            let memory = memories.update_memory_access(&id).await?;
            println!(
                "{}",
                format!("Accessed {} times", memory.access_count).green()
            );
            print_memory(&memory);
        }
    }

    Ok(())
}

async fn cmd_cleanup(
    assistant: &Assistant,
    retention_days: i64,
    threshold: f64,
) -> anyhow::Result<()> {
    let config = MaintenanceConfigBuilder::new()
        .completed_retention_days(retention_days)
        .decay_threshold(threshold)
        .build();

    println!("{}", "Running cleanup...".bold());
    let report = assistant.run_maintenance(&config).await?;

    println!("  Completed tasks purged: {}", report.tasks_purged);
    println!("  Tasks remaining: {}", report.tasks_kept);
    println!("  Memories rescored: {}", report.memories_rescored);
    println!(
        "  Below {}: {}",
        threshold,
        report.memories_below_threshold.to_string().yellow()
    );
    println!("{}", "Cleanup complete".green());

    Ok(())
}

async fn cmd_stats(assistant: &Assistant, json: bool) -> anyhow::Result<()> {
    let stats = assistant.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "mindqueue Statistics".bold().underline());

    println!("\n{}", "Tasks:".bold());
    println!("  Total: {}", stats.tasks.total);
    println!("  Pending: {}", stats.tasks.pending);
    println!("  In progress: {}", stats.tasks.in_progress);
    println!("  Completed: {}", stats.tasks.completed.to_string().green());
    println!("  Failed: {}", stats.tasks.failed.to_string().red());
    for (priority, count) in &stats.tasks.by_priority {
        println!("  {}: {}", priority, count);
    }

    println!("\n{}", "Memories:".bold());
    println!("  Total: {}", stats.memories.total);
    println!("  Categories: {}", stats.memories.categories);
    for (memory_type, count) in &stats.memories.by_type {
        println!("  {}: {}", memory_type, count);
    }
    if stats.memories.total > 0 {
        println!(
            "\n  Average importance: {:.2}",
            stats.memories.average_importance
        );
    }

    Ok(())
}

fn print_task(task: &Task) {
    println!("  ID: {}", task.id.cyan());
    println!("  Description: {}", task.description);
    println!("  Priority: {}", priority_label(task.priority));
    println!("  Category: {}", task.category);
    println!("  Status: {}", status_label(task.status));
    if !task.dependencies.is_empty() {
        println!("  Depends on: {}", task.dependencies.join(", "));
    }
    if let Some(due) = &task.due_date {
        println!("  Due: {}", due);
    }
    if let Some(result) = &task.result {
        println!("  Result: {}", result);
    }
}

fn print_memory(memory: &Memory) {
    println!("  ID: {}", memory.id.cyan());
    println!("  Type: {}", memory.memory_type);
    println!("  Category: {}", memory.category);
    println!("  Importance: {}", memory.importance);
    println!("  Score: {}", score_label(memory));
    if !memory.tags.is_empty() {
        println!("  Tags: {}", memory.tags.join(", "));
    }
}

fn priority_label(priority: Priority) -> ColoredString {
    let label = priority.to_string();
    match priority {
        Priority::Critical => label.red().bold(),
        Priority::High => label.red(),
        Priority::Medium => label.yellow(),
        Priority::Low => label.normal(),
    }
}

fn status_label(status: TaskStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        TaskStatus::Pending => label.normal(),
        TaskStatus::InProgress => label.blue(),
        TaskStatus::Completed => label.green(),
        TaskStatus::Failed => label.red(),
    }
}

fn score_label(memory: &Memory) -> ColoredString {
    let score = memory.decay_score;
    let label = score.to_string();
    if score.value() >= 0.5 {
        label.green()
    } else if score.value() >= DEFAULT_DECAY_THRESHOLD {
        label.yellow()
    } else {
        label.red()
    }
}
