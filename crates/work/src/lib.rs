//! Work management.
//!
//! The operations callers use to change bookings, milestones and tasks. Every
//! mutation is validated up front, written with a conditional child write, and
//! then cascaded up the hierarchy.

#![warn(missing_docs)]

pub mod error;
pub mod manager;
pub mod update;

pub use error::{Result, WorkError};
pub use manager::{BookingOverview, BookingWorkManager, MilestoneOverview, Mutation, WorkManager};
pub use update::{MilestoneUpdate, NewBooking, NewMilestone, NewTask, TaskUpdate};
