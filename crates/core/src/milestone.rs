//! Milestone model - a weighted stage of a booking that owns tasks.

use serde::{Deserialize, Serialize};
use crate::id::{BookingId, MilestoneId};
use crate::status::MilestoneStatus;
use crate::task::TaskCounts;
use crate::Time;

/// Weight used when a milestone has none, or a non-positive one.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// A milestone belongs to exactly one booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// Unique identifier
    #[serde(rename = "milestone_id")]
    pub id: MilestoneId,

    /// Owning booking
    pub booking_id: BookingId,

    /// Milestone title
    pub title: String,

    /// Description
    #[serde(default)]
    pub description: String,

    /// Milestone status
    pub status: MilestoneStatus,

    /// Derived from tasks, never hand-edited
    pub progress_percentage: u8,

    /// Relative contribution to booking progress
    #[serde(default)]
    pub weight: Option<f64>,

    /// Due date
    #[serde(default)]
    pub due_date: Option<Time>,

    /// Cached count of completed tasks
    #[serde(default)]
    pub completed_tasks: u32,

    /// Cached count of all tasks
    #[serde(default)]
    pub total_tasks: u32,

    /// Display order within the booking
    #[serde(default)]
    pub position: u32,

    /// Actor that created the milestone
    #[serde(default)]
    pub created_by: Option<String>,

    /// Created at
    pub created_at: Time,

    /// Updated at
    pub updated_at: Time,

    /// Stored record version, used for conditional writes
    #[serde(default)]
    pub version: u64,
}

impl Milestone {
    /// Create an empty pending milestone under `booking_id`.
    pub fn new(booking_id: BookingId, title: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: MilestoneId::new(),
            booking_id,
            title: title.into(),
            description: String::new(),
            status: MilestoneStatus::Pending,
            progress_percentage: 0,
            weight: None,
            due_date: None,
            completed_tasks: 0,
            total_tasks: 0,
            position: 0,
            created_by: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Weight used for booking aggregation.
    pub fn effective_weight(&self) -> f64 {
        effective_weight(self.weight)
    }

    /// Cached task counts.
    pub fn counts(&self) -> TaskCounts {
        TaskCounts {
            completed: self.completed_tasks,
            total: self.total_tasks,
        }
    }
}

/// Resolve an optional weight: unset, non-positive and non-finite values become 1.
pub fn effective_weight(weight: Option<f64>) -> f64 {
    match weight {
        Some(w) if w.is_finite() && w > 0.0 => w,
        _ => DEFAULT_WEIGHT,
    }
}
