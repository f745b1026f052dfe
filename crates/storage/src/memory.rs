//! In-memory storage backend.
//!
//! Used by tests and by embedders that keep the authoritative copy elsewhere.
//! All three tables live behind one lock so a conditional write is atomic.

use std::collections::HashMap;
use async_trait::async_trait;
use bookwork_core::{
    Booking, BookingId, Milestone, MilestoneId, Task, TaskCounts, TaskId,
};
use tokio::sync::RwLock;
use super::{Storage, StorageError, Result};
use crate::trait_::{check_version, keep_booking_progress, keep_milestone_progress};

#[derive(Default)]
struct Tables {
    bookings: HashMap<BookingId, Booking>,
    milestones: HashMap<MilestoneId, Milestone>,
    tasks: HashMap<TaskId, Task>,
}

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_booking(&self, booking: &Booking) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let existing = tables.bookings.get(&booking.id);
        check_version("booking", booking.id, booking.version, existing.map(|b| b.version))?;

        let mut stored = booking.clone();
        if let Some(existing) = existing {
            keep_booking_progress(&mut stored, existing);
        }
        stored.version = booking.version + 1;
        tables.bookings.insert(stored.id, stored);
        Ok(booking.version + 1)
    }

    async fn load_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>> {
        let mut bookings: Vec<Booking> =
            self.tables.read().await.bookings.values().cloned().collect();
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(bookings)
    }

    async fn write_booking_progress(&self, id: BookingId, percentage: u8) -> Result<()> {
        let mut tables = self.tables.write().await;
        let booking = tables
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("booking", id))?;
        booking.progress_percentage = percentage;
        booking.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn save_milestone(&self, milestone: &Milestone) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let existing = tables.milestones.get(&milestone.id);
        check_version("milestone", milestone.id, milestone.version, existing.map(|m| m.version))?;

        let mut stored = milestone.clone();
        if let Some(existing) = existing {
            keep_milestone_progress(&mut stored, existing);
        }
        stored.version = milestone.version + 1;
        tables.milestones.insert(stored.id, stored);
        Ok(milestone.version + 1)
    }

    async fn load_milestone(&self, id: MilestoneId) -> Result<Option<Milestone>> {
        Ok(self.tables.read().await.milestones.get(&id).cloned())
    }

    async fn list_milestones(&self, booking_id: BookingId) -> Result<Vec<Milestone>> {
        let mut milestones: Vec<Milestone> = self
            .tables
            .read()
            .await
            .milestones
            .values()
            .filter(|m| m.booking_id == booking_id)
            .cloned()
            .collect();
        milestones.sort_by(|a, b| (a.position, a.id).cmp(&(b.position, b.id)));
        Ok(milestones)
    }

    async fn delete_milestone(&self, id: MilestoneId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.milestones.remove(&id);
        tables.tasks.retain(|_, t| t.milestone_id != id);
        Ok(())
    }

    async fn write_milestone_progress(
        &self,
        id: MilestoneId,
        percentage: u8,
        counts: TaskCounts,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let milestone = tables
            .milestones
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("milestone", id))?;
        milestone.progress_percentage = percentage;
        milestone.completed_tasks = counts.completed;
        milestone.total_tasks = counts.total;
        milestone.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn save_task(&self, task: &Task) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let found = tables.tasks.get(&task.id).map(|t| t.version);
        check_version("task", task.id, task.version, found)?;

        let mut stored = task.clone();
        stored.version = task.version + 1;
        tables.tasks.insert(stored.id, stored);
        Ok(task.version + 1)
    }

    async fn load_task(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, milestone_id: MilestoneId) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tables
            .read()
            .await
            .tasks
            .values()
            .filter(|t| t.milestone_id == milestone_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| (a.position, a.id).cmp(&(b.position, b.id)));
        Ok(tasks)
    }

    async fn delete_task(&self, id: TaskId) -> Result<()> {
        self.tables.write().await.tasks.remove(&id);
        Ok(())
    }
}
