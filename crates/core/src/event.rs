//! Change events emitted after a cascade.

use crate::id::{BookingId, EventId, MilestoneId, TaskId};
use crate::status::WorkStatus;
use crate::Time;
use serde::{Deserialize, Serialize};

/// What happened to trigger the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Task created
    TaskCreated,
    /// Task status, progress or details changed
    TaskUpdated,
    /// Task removed
    TaskDeleted,
    /// Milestone created
    MilestoneCreated,
    /// Milestone status, weight or details changed
    MilestoneUpdated,
    /// Milestone and its tasks removed
    MilestoneDeleted,
    /// Explicit recompute request with no child mutation
    Recompute,
}

impl ChangeKind {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::TaskCreated => "task_created",
            ChangeKind::TaskUpdated => "task_updated",
            ChangeKind::TaskDeleted => "task_deleted",
            ChangeKind::MilestoneCreated => "milestone_created",
            ChangeKind::MilestoneUpdated => "milestone_updated",
            ChangeKind::MilestoneDeleted => "milestone_deleted",
            ChangeKind::Recompute => "recompute",
        }
    }
}

/// An "entity changed" notification fanned out to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Unique identifier
    pub id: EventId,

    /// What happened
    pub kind: ChangeKind,

    /// Task involved, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,

    /// Milestone involved, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<MilestoneId>,

    /// Booking whose subtree changed
    pub booking_id: BookingId,

    /// New status of the mutated entity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkStatus>,

    /// Milestone progress after the cascade
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_progress: Option<u8>,

    /// Booking progress after the cascade
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_progress: Option<u8>,

    /// When it happened
    pub timestamp: Time,
}

impl ChangeEvent {
    /// Create a new event for `booking_id`.
    pub fn new(kind: ChangeKind, booking_id: BookingId) -> Self {
        Self {
            id: EventId::new(),
            kind,
            task_id: None,
            milestone_id: None,
            booking_id,
            status: None,
            milestone_progress: None,
            booking_progress: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Attach the task.
    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Attach the milestone.
    pub fn with_milestone(mut self, milestone_id: MilestoneId) -> Self {
        self.milestone_id = Some(milestone_id);
        self
    }

    /// Attach the new status.
    pub fn with_status(mut self, status: WorkStatus) -> Self {
        self.status = Some(status);
        self
    }
}
