//! bookwork core data models.
//!
//! Records for the Task → Milestone → Booking hierarchy, the shared status
//! transition table, and the change events emitted when progress moves.

#![warn(missing_docs)]

// Core identities
mod id;

// Hierarchy
mod booking;
mod milestone;
mod task;

// Lifecycle
mod status;
mod event;

// Re-exports
pub use id::*;

pub use booking::{Booking, BookingStatus, ApprovalStatus};
pub use milestone::{Milestone, effective_weight, DEFAULT_WEIGHT};
pub use task::{Task, TaskCounts};
pub use status::{
    WorkStatus, TaskStatus, MilestoneStatus, EntityKind, StatusTransition, TransitionError,
    can_transition, check_transition,
};
pub use event::{ChangeEvent, ChangeKind};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
