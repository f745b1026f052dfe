//! Work management service.
//!
//! Validates a mutation, performs the one conditional child write, then runs
//! the cascade. Validation failures happen before any write; cascade failures
//! other than missing records are absorbed by the orchestrator.

use std::sync::Arc;
use async_trait::async_trait;
use bookwork_core::{Booking, BookingId, Milestone, MilestoneId, Task, TaskId};
use bookwork_progress::{CascadeOrchestrator, CascadeResult};
use bookwork_storage::Storage;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, WorkError};
use crate::update::{MilestoneUpdate, NewBooking, NewMilestone, NewTask, TaskUpdate};

/// A written record and the cascade it triggered.
#[derive(Debug, Clone, Serialize)]
pub struct Mutation<T> {
    /// Record as written
    pub record: T,
    /// Progress settled by the cascade
    pub cascade: CascadeResult,
}

/// A booking with its milestones and their tasks.
#[derive(Debug, Clone, Serialize)]
pub struct BookingOverview {
    /// The booking
    pub booking: Booking,
    /// Milestones in display order, each with its tasks
    pub milestones: Vec<MilestoneOverview>,
}

/// A milestone with its tasks.
#[derive(Debug, Clone, Serialize)]
pub struct MilestoneOverview {
    /// The milestone
    pub milestone: Milestone,
    /// Tasks in display order
    pub tasks: Vec<Task>,
}

/// Work management service.
#[async_trait]
pub trait WorkManager: Send + Sync {
    /// Create a booking with progress 0.
    async fn create_booking(&self, new: NewBooking) -> Result<Booking>;

    /// Create a milestone under a booking.
    async fn create_milestone(
        &self,
        booking_id: BookingId,
        new: NewMilestone,
    ) -> Result<Mutation<Milestone>>;

    /// Update a milestone's descriptive fields, status or weight.
    async fn update_milestone(
        &self,
        milestone_id: MilestoneId,
        update: MilestoneUpdate,
    ) -> Result<Mutation<Milestone>>;

    /// Delete a milestone and its tasks.
    async fn delete_milestone(&self, milestone_id: MilestoneId) -> Result<CascadeResult>;

    /// Create a task under a milestone.
    async fn create_task(&self, milestone_id: MilestoneId, new: NewTask) -> Result<Mutation<Task>>;

    /// Update a task.
    async fn update_task(&self, task_id: TaskId, update: TaskUpdate) -> Result<Mutation<Task>>;

    /// Delete a task.
    async fn delete_task(&self, task_id: TaskId) -> Result<CascadeResult>;

    /// Recompute a milestone and its booking.
    async fn recompute_milestone(&self, milestone_id: MilestoneId) -> Result<CascadeResult>;

    /// Recompute a booking from its stored milestones.
    async fn recompute_booking(&self, booking_id: BookingId) -> Result<CascadeResult>;
}

/// Work manager backed by a cascade orchestrator.
pub struct BookingWorkManager {
    orchestrator: Arc<CascadeOrchestrator>,
}

impl BookingWorkManager {
    /// Create a new work manager.
    pub fn new(orchestrator: Arc<CascadeOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// The orchestrator mutations cascade through.
    pub fn orchestrator(&self) -> &Arc<CascadeOrchestrator> {
        &self.orchestrator
    }

    fn storage(&self) -> &Arc<dyn Storage> {
        self.orchestrator.storage()
    }

    // === Reads ===

    /// Load a booking.
    pub async fn get_booking(&self, id: BookingId) -> Result<Booking> {
        self.storage()
            .load_booking(id)
            .await?
            .ok_or_else(|| WorkError::not_found("booking", id))
    }

    /// Load a milestone.
    pub async fn get_milestone(&self, id: MilestoneId) -> Result<Milestone> {
        self.storage()
            .load_milestone(id)
            .await?
            .ok_or_else(|| WorkError::not_found("milestone", id))
    }

    /// Load a task.
    pub async fn get_task(&self, id: TaskId) -> Result<Task> {
        self.storage()
            .load_task(id)
            .await?
            .ok_or_else(|| WorkError::not_found("task", id))
    }

    /// All bookings.
    pub async fn list_bookings(&self) -> Result<Vec<Booking>> {
        Ok(self.storage().list_bookings().await?)
    }

    /// Milestones of a booking, in display order.
    pub async fn list_milestones(&self, booking_id: BookingId) -> Result<Vec<Milestone>> {
        self.get_booking(booking_id).await?;
        Ok(self.storage().list_milestones(booking_id).await?)
    }

    /// Tasks of a milestone, in display order.
    pub async fn list_tasks(&self, milestone_id: MilestoneId) -> Result<Vec<Task>> {
        self.get_milestone(milestone_id).await?;
        Ok(self.storage().list_tasks(milestone_id).await?)
    }

    /// A booking with its whole subtree.
    pub async fn overview(&self, booking_id: BookingId) -> Result<BookingOverview> {
        let booking = self.get_booking(booking_id).await?;
        let mut milestones = Vec::new();
        for milestone in self.storage().list_milestones(booking_id).await? {
            let tasks = self.storage().list_tasks(milestone.id).await?;
            milestones.push(MilestoneOverview { milestone, tasks });
        }
        Ok(BookingOverview {
            booking,
            milestones,
        })
    }
}

#[async_trait]
impl WorkManager for BookingWorkManager {
    async fn create_booking(&self, new: NewBooking) -> Result<Booking> {
        let mut booking = new.into_booking()?;
        booking.version = self.storage().save_booking(&booking).await?;

        info!("Created booking {}: {}", booking.id, booking.title);
        Ok(booking)
    }

    async fn create_milestone(
        &self,
        booking_id: BookingId,
        new: NewMilestone,
    ) -> Result<Mutation<Milestone>> {
        let siblings = self.list_milestones(booking_id).await?;

        let mut base = Milestone::new(booking_id, String::new());
        base.position = siblings.len() as u32;
        let mut milestone = new.into_milestone(base)?;
        milestone.version = self.storage().save_milestone(&milestone).await?;
        info!("Created milestone {} in booking {}", milestone.id, booking_id);

        let cascade = self.orchestrator.on_milestone_created(milestone.id).await?;
        Ok(Mutation {
            record: milestone,
            cascade,
        })
    }

    async fn update_milestone(
        &self,
        milestone_id: MilestoneId,
        update: MilestoneUpdate,
    ) -> Result<Mutation<Milestone>> {
        let mut milestone = self.get_milestone(milestone_id).await?;

        let cascade = if update.apply_to(&mut milestone, chrono::Utc::now())? {
            milestone.version = self.storage().save_milestone(&milestone).await?;
            info!(
                "Updated milestone {} (status {}, weight {})",
                milestone.id,
                milestone.status,
                milestone.effective_weight()
            );
            self.orchestrator.on_milestone_mutated(milestone_id).await?
        } else {
            debug!("Milestone {} unchanged", milestone_id);
            self.orchestrator.resettle_milestone(milestone_id).await?
        };
        Ok(Mutation {
            record: milestone,
            cascade,
        })
    }

    async fn delete_milestone(&self, milestone_id: MilestoneId) -> Result<CascadeResult> {
        let milestone = self.get_milestone(milestone_id).await?;

        self.storage().delete_milestone(milestone_id).await?;
        info!("Deleted milestone {} from booking {}", milestone_id, milestone.booking_id);

        Ok(self
            .orchestrator
            .on_milestone_deleted(milestone_id, milestone.booking_id)
            .await?)
    }

    async fn create_task(&self, milestone_id: MilestoneId, new: NewTask) -> Result<Mutation<Task>> {
        let siblings = self.list_tasks(milestone_id).await?;

        let mut base = Task::new(milestone_id, String::new());
        base.position = siblings.len() as u32;
        let mut task = new.into_task(base, chrono::Utc::now())?;
        task.version = self.storage().save_task(&task).await?;
        info!("Created task {} in milestone {}", task.id, milestone_id);

        let cascade = self.orchestrator.on_task_created(task.id).await?;
        Ok(Mutation {
            record: task,
            cascade,
        })
    }

    async fn update_task(&self, task_id: TaskId, update: TaskUpdate) -> Result<Mutation<Task>> {
        let mut task = self.get_task(task_id).await?;

        let cascade = if update.apply_to(&mut task, chrono::Utc::now())? {
            task.version = self.storage().save_task(&task).await?;
            info!(
                "Updated task {} ({} at {}%)",
                task.id, task.status, task.progress_percentage
            );
            self.orchestrator.on_task_mutated(task_id).await?
        } else {
            debug!("Task {} unchanged", task_id);
            self.orchestrator.resettle_task(task_id).await?
        };
        Ok(Mutation {
            record: task,
            cascade,
        })
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<CascadeResult> {
        let task = self.get_task(task_id).await?;

        self.storage().delete_task(task_id).await?;
        info!("Deleted task {} from milestone {}", task_id, task.milestone_id);

        Ok(self
            .orchestrator
            .on_task_deleted(task_id, task.milestone_id)
            .await?)
    }

    async fn recompute_milestone(&self, milestone_id: MilestoneId) -> Result<CascadeResult> {
        Ok(self.orchestrator.recompute_milestone(milestone_id).await?)
    }

    async fn recompute_booking(&self, booking_id: BookingId) -> Result<CascadeResult> {
        Ok(self.orchestrator.recompute_booking(booking_id).await?)
    }
}
