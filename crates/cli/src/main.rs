//! bookwork CLI - booking progress tracking.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;
use bookwork_core::{BookingId, MilestoneId, Task, TaskId, WorkStatus};
use bookwork_progress::{
    describe, CascadeOrchestrator, CascadeResult, FanoutSink, HttpRecompute, LogSink,
    NotificationSink, WebhookSink,
};
use bookwork_storage::{JsonStorage, Storage};
use bookwork_work::{
    BookingWorkManager, MilestoneUpdate, NewBooking, NewMilestone, NewTask, TaskUpdate,
    WorkManager,
};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "bookwork")]
#[command(about = "Track booking progress across milestones and tasks", long_about = None)]
struct Cli {
    /// Config file (defaults to bookwork.toml in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(long, global = true, env = "BOOKWORK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage bookings
    Booking {
        #[command(subcommand)]
        action: BookingCommand,
    },
    /// Manage milestones
    Milestone {
        #[command(subcommand)]
        action: MilestoneCommand,
    },
    /// Manage tasks
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },
}

#[derive(Subcommand)]
enum BookingCommand {
    /// Create a booking
    Create {
        /// Title
        title: String,
        /// Client reference
        #[arg(long)]
        client: Option<String>,
        /// Provider reference
        #[arg(long)]
        provider: Option<String>,
    },
    /// List bookings
    List,
    /// Show a booking with its milestones and tasks
    Show {
        /// Booking ID
        id: BookingId,
    },
    /// Recompute a booking's progress
    Recompute {
        /// Booking ID
        id: BookingId,
    },
}

#[derive(Subcommand)]
enum MilestoneCommand {
    /// Add a milestone to a booking
    Add {
        /// Booking ID
        booking: BookingId,
        /// Title
        title: String,
        /// Relative weight
        #[arg(long)]
        weight: Option<f64>,
    },
    /// Update a milestone
    Update {
        /// Milestone ID
        id: MilestoneId,
        /// New status
        #[arg(long)]
        status: Option<WorkStatus>,
        /// New weight
        #[arg(long)]
        weight: Option<f64>,
    },
    /// Delete a milestone and its tasks
    Delete {
        /// Milestone ID
        id: MilestoneId,
    },
    /// Recompute a milestone and its booking
    Recompute {
        /// Milestone ID
        id: MilestoneId,
    },
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Add a task to a milestone
    Add {
        /// Milestone ID
        milestone: MilestoneId,
        /// Title
        title: String,
    },
    /// Update a task's status or progress
    Update {
        /// Task ID
        id: TaskId,
        /// New status
        #[arg(long)]
        status: Option<WorkStatus>,
        /// New progress (0-100)
        #[arg(long)]
        progress: Option<u8>,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: TaskId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref(), cli.data_dir.clone())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let manager = build_manager(&config).await?;

    match cli.command {
        Commands::Booking { action } => run_booking(&manager, action).await?,
        Commands::Milestone { action } => run_milestone(&manager, action).await?,
        Commands::Task { action } => run_task(&manager, action).await?,
    }

    Ok(())
}

async fn build_manager(config: &Config) -> Result<BookingWorkManager> {
    let storage: Arc<dyn Storage> = Arc::new(JsonStorage::new(&config.data_dir).await?);
    debug!("Opened store at {}", config.data_dir.display());

    let mut sinks = FanoutSink::new().with(Arc::new(LogSink));
    if let Some(webhook) = &config.webhook {
        sinks = sinks.with(Arc::new(WebhookSink::new(webhook.url.clone())));
    }
    let sink: Arc<dyn NotificationSink> = Arc::new(sinks);

    let mut orchestrator = CascadeOrchestrator::new(storage)
        .with_sink(sink)
        .with_config(config.cascade.clone());
    if let Some(remote) = &config.remote {
        let mut client = HttpRecompute::new(remote.base_url.clone());
        if let Some(key) = &remote.api_key {
            client = client.with_api_key(key.clone());
        }
        info!("Using remote recompute at {}", remote.base_url);
        orchestrator = orchestrator.with_remote(Arc::new(client));
    }

    Ok(BookingWorkManager::new(Arc::new(orchestrator)))
}

async fn run_booking(manager: &BookingWorkManager, action: BookingCommand) -> Result<()> {
    match action {
        BookingCommand::Create {
            title,
            client,
            provider,
        } => {
            let booking = manager
                .create_booking(NewBooking {
                    title,
                    client_id: client,
                    provider_id: provider,
                })
                .await?;
            println!("Created booking: {} - {}", booking.id, booking.title);
        }
        BookingCommand::List => {
            let bookings = manager.list_bookings().await?;
            println!("Bookings ({})", bookings.len());
            for booking in bookings {
                println!(
                    "  {} | {:>3}% | {}",
                    booking.id, booking.progress_percentage, booking.title
                );
            }
        }
        BookingCommand::Show { id } => {
            let overview = manager.overview(id).await?;
            let booking = &overview.booking;
            println!("Booking: {}", booking.id);
            println!("  Title: {}", booking.title);
            println!("  Progress: {}%", booking.progress_percentage);
            println!("  Created: {}", booking.created_at);
            for entry in &overview.milestones {
                let m = &entry.milestone;
                println!(
                    "  Milestone {} | {} | {:>3}% | weight {} | {}/{} done | {}",
                    m.id,
                    m.status,
                    m.progress_percentage,
                    m.effective_weight(),
                    m.completed_tasks,
                    m.total_tasks,
                    m.title
                );
                for task in &entry.tasks {
                    println!("    {}", format_task(task));
                }
            }
        }
        BookingCommand::Recompute { id } => {
            let result = manager.recompute_booking(id).await?;
            print_cascade(&result);
        }
    }
    Ok(())
}

async fn run_milestone(manager: &BookingWorkManager, action: MilestoneCommand) -> Result<()> {
    match action {
        MilestoneCommand::Add {
            booking,
            title,
            weight,
        } => {
            let new = NewMilestone {
                weight,
                ..NewMilestone::titled(title)
            };
            let mutation = manager.create_milestone(booking, new).await?;
            println!("Added milestone: {} - {}", mutation.record.id, mutation.record.title);
            print_cascade(&mutation.cascade);
        }
        MilestoneCommand::Update { id, status, weight } => {
            let update = MilestoneUpdate {
                status,
                weight,
                ..MilestoneUpdate::default()
            };
            let mutation = manager.update_milestone(id, update).await?;
            println!(
                "Updated milestone: {} ({}, weight {})",
                mutation.record.id,
                mutation.record.status,
                mutation.record.effective_weight()
            );
            print_cascade(&mutation.cascade);
        }
        MilestoneCommand::Delete { id } => {
            let result = manager.delete_milestone(id).await?;
            println!("Deleted milestone: {}", id);
            print_cascade(&result);
        }
        MilestoneCommand::Recompute { id } => {
            let result = manager.recompute_milestone(id).await?;
            print_cascade(&result);
        }
    }
    Ok(())
}

async fn run_task(manager: &BookingWorkManager, action: TaskCommand) -> Result<()> {
    match action {
        TaskCommand::Add { milestone, title } => {
            let mutation = manager.create_task(milestone, NewTask::titled(title)).await?;
            println!("Added task: {} - {}", mutation.record.id, mutation.record.title);
            print_cascade(&mutation.cascade);
        }
        TaskCommand::Update {
            id,
            status,
            progress,
        } => {
            let update = TaskUpdate {
                status,
                progress_percentage: progress,
                ..TaskUpdate::default()
            };
            let mutation = manager.update_task(id, update).await?;
            println!("Updated task: {}", format_task(&mutation.record));
            print_cascade(&mutation.cascade);
        }
        TaskCommand::Delete { id } => {
            let result = manager.delete_task(id).await?;
            println!("Deleted task: {}", id);
            print_cascade(&result);
        }
    }
    Ok(())
}

fn format_task(task: &Task) -> String {
    format!(
        "{} | {} | {:>3}% | {}",
        task.id,
        format_status(task.status),
        task.effective_progress(),
        task.title
    )
}

fn format_status(status: WorkStatus) -> &'static str {
    match status {
        WorkStatus::Pending => "PENDING",
        WorkStatus::InProgress => "IN PROGRESS",
        WorkStatus::OnHold => "ON HOLD",
        WorkStatus::Completed => "COMPLETED",
        WorkStatus::Cancelled => "CANCELLED",
    }
}

fn print_cascade(result: &CascadeResult) {
    println!("Progress: {}", describe(result));
}
