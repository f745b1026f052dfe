//! Cascade orchestration.
//!
//! After a child write, recompute the owning milestone and then the owning
//! booking. Each level reads its children fresh, tries the remote procedure
//! under a deadline, falls back to the local formula, and upserts the result.
//! Aggregates are pure functions of the children they were computed from, so
//! concurrent cascades may race and the last writer wins.

use std::sync::Arc;
use bookwork_core::{
    BookingId, ChangeEvent, ChangeKind, Milestone, MilestoneId, TaskCounts, TaskId, WorkStatus,
};
use bookwork_storage::{Storage, StorageError};
use serde::Serialize;
use tracing::{debug, warn};

use crate::bounded::{attempt_with_fallback, Attempt, Source};
use crate::calculator::{booking_progress_of, milestone_progress};
use crate::config::CascadeConfig;
use crate::notify::{LogSink, NotificationSink};
use crate::remote::RemoteRecompute;

/// Errors that abort a cascade.
#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    /// An entity the cascade had to read does not exist
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind
        kind: &'static str,
        /// Entity id
        id: String,
    },

    /// Reading children failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CascadeError {
    fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Progress settled at one level of the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelOutcome<Id> {
    /// Entity recomputed
    pub id: Id,
    /// Adopted percentage
    pub progress: u8,
    /// Path that produced it
    pub source: Source,
}

/// What a cascade settled.
///
/// `milestone` is `None` for cascades that start at the booking level
/// (milestone created, updated or deleted; explicit booking recompute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CascadeResult {
    /// Milestone level
    pub milestone: Option<LevelOutcome<MilestoneId>>,
    /// Booking level
    pub booking: LevelOutcome<BookingId>,
}

impl CascadeResult {
    /// Milestone progress, if the milestone level ran.
    pub fn milestone_progress(&self) -> Option<u8> {
        self.milestone.map(|m| m.progress)
    }

    /// Booking progress.
    pub fn booking_progress(&self) -> u8 {
        self.booking.progress
    }
}

/// What triggered a cascade, for the change event.
#[derive(Debug, Clone, Copy)]
struct Trigger {
    kind: ChangeKind,
    task_id: Option<TaskId>,
    status: Option<WorkStatus>,
    /// Unset when the triggering request wrote nothing
    publish: bool,
}

impl Trigger {
    fn new(kind: ChangeKind) -> Self {
        Self {
            kind,
            task_id: None,
            status: None,
            publish: true,
        }
    }

    fn quiet(self) -> Self {
        Self {
            publish: false,
            ..self
        }
    }
}

/// Recomputes milestone and booking progress after child mutations.
pub struct CascadeOrchestrator {
    storage: Arc<dyn Storage>,
    remote: Option<Arc<dyn RemoteRecompute>>,
    sink: Arc<dyn NotificationSink>,
    config: CascadeConfig,
}

impl CascadeOrchestrator {
    /// Create an orchestrator with no remote path that logs its events.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            remote: None,
            sink: Arc::new(LogSink),
            config: CascadeConfig::default(),
        }
    }

    /// Use `remote` as the primary path.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteRecompute>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Publish change events to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: CascadeConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Storage the orchestrator reads and writes.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    // === Entry points ===

    /// Recompute after a task was created.
    pub async fn on_task_created(&self, task_id: TaskId) -> Result<CascadeResult, CascadeError> {
        self.from_task(task_id, Trigger::new(ChangeKind::TaskCreated))
            .await
    }

    /// Recompute after a task's status or progress changed.
    pub async fn on_task_mutated(&self, task_id: TaskId) -> Result<CascadeResult, CascadeError> {
        self.from_task(task_id, Trigger::new(ChangeKind::TaskUpdated))
            .await
    }

    /// Recompute after a task update that wrote nothing.
    ///
    /// Progress is still settled and persisted, but no change event is
    /// published for an entity that did not change.
    pub async fn resettle_task(&self, task_id: TaskId) -> Result<CascadeResult, CascadeError> {
        self.from_task(task_id, Trigger::new(ChangeKind::TaskUpdated).quiet())
            .await
    }

    /// Recompute after a task was removed from `milestone_id`.
    pub async fn on_task_deleted(
        &self,
        task_id: TaskId,
        milestone_id: MilestoneId,
    ) -> Result<CascadeResult, CascadeError> {
        let trigger = Trigger {
            task_id: Some(task_id),
            ..Trigger::new(ChangeKind::TaskDeleted)
        };
        self.from_milestone(milestone_id, trigger).await
    }

    /// Recompute the booking after a milestone was created.
    pub async fn on_milestone_created(
        &self,
        milestone_id: MilestoneId,
    ) -> Result<CascadeResult, CascadeError> {
        self.from_milestone_change(milestone_id, Trigger::new(ChangeKind::MilestoneCreated))
            .await
    }

    /// Recompute the booking after a milestone's status or weight changed.
    pub async fn on_milestone_mutated(
        &self,
        milestone_id: MilestoneId,
    ) -> Result<CascadeResult, CascadeError> {
        self.from_milestone_change(milestone_id, Trigger::new(ChangeKind::MilestoneUpdated))
            .await
    }

    /// Recompute the booking after a milestone update that wrote nothing.
    /// Publishes no event.
    pub async fn resettle_milestone(
        &self,
        milestone_id: MilestoneId,
    ) -> Result<CascadeResult, CascadeError> {
        let trigger = Trigger::new(ChangeKind::MilestoneUpdated).quiet();
        self.from_milestone_change(milestone_id, trigger).await
    }

    /// Recompute the booking over the milestones left after a deletion.
    pub async fn on_milestone_deleted(
        &self,
        milestone_id: MilestoneId,
        booking_id: BookingId,
    ) -> Result<CascadeResult, CascadeError> {
        let booking = self.settle_booking(booking_id).await?;
        let result = CascadeResult {
            milestone: None,
            booking,
        };

        let event = ChangeEvent::new(ChangeKind::MilestoneDeleted, booking_id)
            .with_milestone(milestone_id);
        self.publish(event, &result).await;
        Ok(result)
    }

    /// Explicit recompute of a milestone and its booking.
    pub async fn recompute_milestone(
        &self,
        milestone_id: MilestoneId,
    ) -> Result<CascadeResult, CascadeError> {
        self.from_milestone(milestone_id, Trigger::new(ChangeKind::Recompute))
            .await
    }

    /// Explicit recompute of a booking from its stored milestones.
    pub async fn recompute_booking(&self, booking_id: BookingId) -> Result<CascadeResult, CascadeError> {
        let booking = self.settle_booking(booking_id).await?;
        let result = CascadeResult {
            milestone: None,
            booking,
        };
        self.publish(ChangeEvent::new(ChangeKind::Recompute, booking_id), &result)
            .await;
        Ok(result)
    }

    // === Pipeline ===

    async fn from_task(&self, task_id: TaskId, trigger: Trigger) -> Result<CascadeResult, CascadeError> {
        let task = self
            .storage
            .load_task(task_id)
            .await?
            .ok_or_else(|| CascadeError::not_found("task", task_id))?;

        let trigger = Trigger {
            task_id: Some(task.id),
            status: Some(task.status),
            ..trigger
        };
        self.from_milestone(task.milestone_id, trigger).await
    }

    async fn from_milestone(
        &self,
        milestone_id: MilestoneId,
        trigger: Trigger,
    ) -> Result<CascadeResult, CascadeError> {
        let milestone = self.load_milestone(milestone_id).await?;

        let milestone_level = self.settle_milestone(&milestone).await?;
        let booking_level = self.settle_booking(milestone.booking_id).await?;

        let result = CascadeResult {
            milestone: Some(milestone_level),
            booking: booking_level,
        };
        debug!(
            "Cascade for milestone {} settled at {}% ({}), booking {} at {}% ({})",
            milestone_id,
            milestone_level.progress,
            milestone_level.source,
            milestone.booking_id,
            booking_level.progress,
            booking_level.source,
        );

        if trigger.publish {
            let mut event =
                ChangeEvent::new(trigger.kind, milestone.booking_id).with_milestone(milestone_id);
            event.task_id = trigger.task_id;
            event.status = trigger.status;
            self.publish(event, &result).await;
        }
        Ok(result)
    }

    async fn from_milestone_change(
        &self,
        milestone_id: MilestoneId,
        trigger: Trigger,
    ) -> Result<CascadeResult, CascadeError> {
        let milestone = self.load_milestone(milestone_id).await?;
        let booking = self.settle_booking(milestone.booking_id).await?;
        let result = CascadeResult {
            milestone: None,
            booking,
        };

        if trigger.publish {
            let mut event = ChangeEvent::new(trigger.kind, milestone.booking_id)
                .with_milestone(milestone_id)
                .with_status(milestone.status);
            event.milestone_progress = Some(milestone.progress_percentage);
            self.publish(event, &result).await;
        }
        Ok(result)
    }

    async fn load_milestone(&self, id: MilestoneId) -> Result<Milestone, CascadeError> {
        self.storage
            .load_milestone(id)
            .await?
            .ok_or_else(|| CascadeError::not_found("milestone", id))
    }

    /// Recompute one milestone from a fresh read of its tasks.
    async fn settle_milestone(
        &self,
        milestone: &Milestone,
    ) -> Result<LevelOutcome<MilestoneId>, CascadeError> {
        let tasks = self.storage.list_tasks(milestone.id).await?;
        let local = milestone_progress(&tasks);
        let counts = TaskCounts::of(&tasks);

        let attempt = match &self.remote {
            Some(remote) => {
                attempt_with_fallback(
                    self.config.remote_timeout(),
                    remote.recompute_milestone(milestone.id),
                    || local,
                )
                .await
            }
            None => Attempt::local(local),
        };
        if let Some(err) = &attempt.primary_error {
            warn!(
                milestone = %milestone.id,
                error = %err,
                "Remote milestone recompute failed, using local progress {}%",
                local
            );
        }

        if let Err(e) = self
            .storage
            .write_milestone_progress(milestone.id, attempt.value, counts)
            .await
        {
            warn!("Failed to write progress for milestone {}: {}", milestone.id, e);
        }

        Ok(LevelOutcome {
            id: milestone.id,
            progress: attempt.value,
            source: attempt.source,
        })
    }

    /// Recompute one booking from a fresh read of its milestones.
    async fn settle_booking(&self, booking_id: BookingId) -> Result<LevelOutcome<BookingId>, CascadeError> {
        if self.storage.load_booking(booking_id).await?.is_none() {
            return Err(CascadeError::not_found("booking", booking_id));
        }

        let milestones = self.storage.list_milestones(booking_id).await?;
        let local = booking_progress_of(&milestones);

        let attempt = match &self.remote {
            Some(remote) => {
                attempt_with_fallback(
                    self.config.remote_timeout(),
                    remote.recompute_booking(booking_id),
                    || local,
                )
                .await
            }
            None => Attempt::local(local),
        };
        if let Some(err) = &attempt.primary_error {
            warn!(
                booking = %booking_id,
                error = %err,
                "Remote booking recompute failed, using local progress {}%",
                local
            );
        }

        if let Err(e) = self
            .storage
            .write_booking_progress(booking_id, attempt.value)
            .await
        {
            warn!("Failed to write progress for booking {}: {}", booking_id, e);
        }

        Ok(LevelOutcome {
            id: booking_id,
            progress: attempt.value,
            source: attempt.source,
        })
    }

    async fn publish(&self, mut event: ChangeEvent, result: &CascadeResult) {
        if !self.config.notify {
            return;
        }

        if let Some(progress) = result.milestone_progress() {
            event.milestone_progress = Some(progress);
        }
        event.booking_progress = Some(result.booking_progress());

        let kind = event.kind.as_str();
        match tokio::time::timeout(self.config.notify_timeout(), self.sink.publish(&event)).await {
            Ok(Ok(())) => debug!("Published {} event for booking {}", kind, event.booking_id),
            Ok(Err(e)) => warn!("Dropping {} notification for booking {}: {}", kind, event.booking_id, e),
            Err(_) => warn!(
                "Dropping {} notification for booking {}: sink timed out",
                kind, event.booking_id
            ),
        }
    }
}

impl std::fmt::Debug for CascadeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeOrchestrator")
            .field("remote", &self.remote.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// One-line summary of a finished cascade.
pub fn describe(result: &CascadeResult) -> String {
    match result.milestone {
        Some(m) => format!(
            "milestone {} -> {}% ({}), booking {} -> {}% ({})",
            m.id, m.progress, m.source, result.booking.id, result.booking.progress, result.booking.source
        ),
        None => format!(
            "booking {} -> {}% ({})",
            result.booking.id, result.booking.progress, result.booking.source
        ),
    }
}
