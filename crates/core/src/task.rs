//! Task model - the unit of delivery tracked under a milestone.

use serde::{Deserialize, Serialize};
use crate::id::{MilestoneId, TaskId};
use crate::status::TaskStatus;
use crate::Time;

/// A task belongs to exactly one milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    #[serde(rename = "task_id")]
    pub id: TaskId,

    /// Owning milestone
    pub milestone_id: MilestoneId,

    /// Task title
    pub title: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Current status
    pub status: TaskStatus,

    /// Stored completion percentage (0-100)
    pub progress_percentage: u8,

    /// Estimated effort in hours
    #[serde(default)]
    pub estimated_hours: Option<f64>,

    /// Actual effort in hours
    #[serde(default)]
    pub actual_hours: Option<f64>,

    /// Due date
    #[serde(default)]
    pub due_date: Option<Time>,

    /// Assignee reference
    #[serde(default)]
    pub assignee: Option<String>,

    /// Whether descriptive fields may still be changed
    #[serde(default = "default_editable")]
    pub editable: bool,

    /// Display order within the milestone
    #[serde(default)]
    pub position: u32,

    /// First time the task entered in_progress
    #[serde(default)]
    pub started_at: Option<Time>,

    /// When the task was completed
    #[serde(default)]
    pub completed_at: Option<Time>,

    /// Creation timestamp
    pub created_at: Time,

    /// Last update timestamp
    pub updated_at: Time,

    /// Stored record version, used for conditional writes
    #[serde(default)]
    pub version: u64,
}

fn default_editable() -> bool {
    true
}

impl Task {
    /// Create a pending task under `milestone_id`.
    pub fn new(milestone_id: MilestoneId, title: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: TaskId::new(),
            milestone_id,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            progress_percentage: 0,
            estimated_hours: None,
            actual_hours: None,
            due_date: None,
            assignee: None,
            editable: true,
            position: 0,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Progress this task contributes to its milestone.
    ///
    /// Status wins over the stored percentage: completed counts as 100,
    /// pending and cancelled count as 0.
    pub fn effective_progress(&self) -> u8 {
        match self.status {
            TaskStatus::Completed => 100,
            TaskStatus::Pending | TaskStatus::Cancelled => 0,
            TaskStatus::InProgress | TaskStatus::OnHold => self.progress_percentage.min(100),
        }
    }

    /// Whether the task is completed.
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Move to `status`, keeping the stored percentage consistent with it.
    ///
    /// Does not validate the move; callers check the transition table first.
    /// Re-applying the current status leaves timestamps alone.
    pub fn apply_status(&mut self, status: TaskStatus, now: Time) {
        if status != self.status {
            match status {
                TaskStatus::InProgress if self.started_at.is_none() => {
                    self.started_at = Some(now);
                }
                TaskStatus::Completed => self.completed_at = Some(now),
                _ => {}
            }
            self.status = status;
        }
        self.normalize_progress();
    }

    /// Force the stored percentage to agree with the status.
    pub fn normalize_progress(&mut self) {
        self.progress_percentage = match self.status {
            TaskStatus::Completed => 100,
            TaskStatus::Pending | TaskStatus::Cancelled => 0,
            TaskStatus::InProgress | TaskStatus::OnHold => self.progress_percentage.min(100),
        };
    }
}

/// Completed/total task counts cached on a milestone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    /// Tasks in completed status
    pub completed: u32,
    /// All tasks, cancelled included
    pub total: u32,
}

impl TaskCounts {
    /// Count a task set.
    pub fn of(tasks: &[Task]) -> Self {
        Self {
            completed: tasks.iter().filter(|t| t.is_completed()).count() as u32,
            total: tasks.len() as u32,
        }
    }
}
