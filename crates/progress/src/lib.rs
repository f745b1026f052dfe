//! Progress aggregation and cascade.
//!
//! Pure roll-up of task progress into milestones and of milestone progress
//! into bookings, plus the orchestrator that keeps stored aggregates current
//! after every child mutation.

#![warn(missing_docs)]

pub mod calculator;
pub mod bounded;
pub mod remote;
pub mod notify;
pub mod config;
pub mod cascade;

pub use calculator::{booking_progress, booking_progress_of, milestone_progress, WeightedProgress};
pub use bounded::{attempt_with_fallback, Attempt, Source};
pub use remote::{HttpRecompute, RecomputeError, RemoteRecompute};
pub use notify::{
    ChannelSink, FanoutSink, LogSink, NoopSink, NotificationSink, NotifyError, WebhookSink,
};
pub use config::CascadeConfig;
pub use cascade::{describe, CascadeError, CascadeOrchestrator, CascadeResult, LevelOutcome};
