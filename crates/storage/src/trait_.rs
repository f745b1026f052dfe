//! Storage trait abstraction.

use async_trait::async_trait;
use bookwork_core::{
    Booking, BookingId, Milestone, MilestoneId, Task, TaskCounts, TaskId,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {kind} {id}")]
    NotFound {
        /// Record kind
        kind: &'static str,
        /// Record id
        id: String,
    },

    /// Conditional write lost against a concurrent writer
    #[error("Version conflict on {kind} {id}: expected {expected}, found {found:?}")]
    Conflict {
        /// Record kind
        kind: &'static str,
        /// Record id
        id: String,
        /// Version the writer read
        expected: u64,
        /// Version currently stored, `None` if the record is gone
        found: Option<u64>,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl StorageError {
    /// Build a `NotFound` for `kind`/`id`.
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Compare-and-set check shared by the backends.
///
/// `expected == 0` means "create": the record must not exist yet.
pub(crate) fn check_version(
    kind: &'static str,
    id: impl ToString,
    expected: u64,
    found: Option<u64>,
) -> Result<()> {
    match (expected, found) {
        (0, None) => Ok(()),
        (e, Some(f)) if e == f => Ok(()),
        _ => Err(StorageError::Conflict {
            kind,
            id: id.to_string(),
            expected,
            found,
        }),
    }
}

/// Derived fields owned by the `write_*_progress` upserts survive a
/// conditional save of an existing record.
pub(crate) fn keep_milestone_progress(record: &mut Milestone, existing: &Milestone) {
    record.progress_percentage = existing.progress_percentage;
    record.completed_tasks = existing.completed_tasks;
    record.total_tasks = existing.total_tasks;
}

/// See [`keep_milestone_progress`].
pub(crate) fn keep_booking_progress(record: &mut Booking, existing: &Booking) {
    record.progress_percentage = existing.progress_percentage;
}

/// Persistence gateway for bookings, milestones and tasks.
///
/// Every read is a fresh snapshot. `save_*` is a conditional write keyed on the
/// record's `version` and returns the new version. The `write_*_progress`
/// methods are unconditional upserts of derived fields only, and those fields
/// are taken from the record only when `save_*` creates it.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Booking operations ===

    /// Conditionally save a booking. An existing booking keeps its stored progress.
    async fn save_booking(&self, booking: &Booking) -> Result<u64>;

    /// Load a booking by ID.
    async fn load_booking(&self, id: BookingId) -> Result<Option<Booking>>;

    /// List all bookings.
    async fn list_bookings(&self) -> Result<Vec<Booking>>;

    /// Overwrite a booking's derived progress.
    async fn write_booking_progress(&self, id: BookingId, percentage: u8) -> Result<()>;

    // === Milestone operations ===

    /// Conditionally save a milestone. An existing milestone keeps its stored
    /// progress and task counts.
    async fn save_milestone(&self, milestone: &Milestone) -> Result<u64>;

    /// Load a milestone by ID.
    async fn load_milestone(&self, id: MilestoneId) -> Result<Option<Milestone>>;

    /// Milestones of a booking, in display order.
    async fn list_milestones(&self, booking_id: BookingId) -> Result<Vec<Milestone>>;

    /// Delete a milestone and the tasks it owns.
    async fn delete_milestone(&self, id: MilestoneId) -> Result<()>;

    /// Overwrite a milestone's derived progress and cached task counts.
    async fn write_milestone_progress(
        &self,
        id: MilestoneId,
        percentage: u8,
        counts: TaskCounts,
    ) -> Result<()>;

    // === Task operations ===

    /// Conditionally save a task.
    async fn save_task(&self, task: &Task) -> Result<u64>;

    /// Load a task by ID.
    async fn load_task(&self, id: TaskId) -> Result<Option<Task>>;

    /// Tasks of a milestone, in display order.
    async fn list_tasks(&self, milestone_id: MilestoneId) -> Result<Vec<Task>>;

    /// Delete a task. Deleting a missing task is not an error.
    async fn delete_task(&self, id: TaskId) -> Result<()>;
}
