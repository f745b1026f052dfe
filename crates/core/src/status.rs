//! Work status and the transition table shared by tasks and milestones.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a task or milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    /// Not started
    #[default]
    Pending,
    /// Being worked on
    InProgress,
    /// Paused, may resume
    OnHold,
    /// Done (terminal)
    Completed,
    /// Dropped (terminal)
    Cancelled,
}

/// Status of a task.
pub type TaskStatus = WorkStatus;

/// Status of a milestone.
pub type MilestoneStatus = WorkStatus;

impl WorkStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [WorkStatus; 5] = [
        WorkStatus::Pending,
        WorkStatus::InProgress,
        WorkStatus::OnHold,
        WorkStatus::Completed,
        WorkStatus::Cancelled,
    ];

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Pending => "pending",
            WorkStatus::InProgress => "in_progress",
            WorkStatus::OnHold => "on_hold",
            WorkStatus::Completed => "completed",
            WorkStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkStatus::Completed | WorkStatus::Cancelled)
    }

    /// Whether a stored percentage between 0 and 100 is meaningful in this status.
    pub fn allows_partial_progress(&self) -> bool {
        matches!(self, WorkStatus::InProgress | WorkStatus::OnHold)
    }

    /// Statuses reachable in one step from this one.
    pub fn successors(&self) -> &'static [WorkStatus] {
        match self {
            WorkStatus::Pending => &[WorkStatus::InProgress, WorkStatus::Cancelled],
            WorkStatus::InProgress => &[
                WorkStatus::OnHold,
                WorkStatus::Completed,
                WorkStatus::Cancelled,
            ],
            WorkStatus::OnHold => &[WorkStatus::InProgress, WorkStatus::Cancelled],
            WorkStatus::Completed | WorkStatus::Cancelled => &[],
        }
    }
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(WorkStatus::Pending),
            "in_progress" => Ok(WorkStatus::InProgress),
            "on_hold" => Ok(WorkStatus::OnHold),
            "completed" => Ok(WorkStatus::Completed),
            "cancelled" | "canceled" => Ok(WorkStatus::Cancelled),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// Kind of entity whose status is being changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A task
    Task,
    /// A milestone
    Milestone,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Task => f.write_str("task"),
            EntityKind::Milestone => f.write_str("milestone"),
        }
    }
}

/// Outcome of checking a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// Requested status equals the current one
    NoChange(WorkStatus),
    /// Move permitted by the table
    Allowed {
        /// Current status
        from: WorkStatus,
        /// Requested status
        to: WorkStatus,
    },
    /// Move not in the table
    Denied {
        /// Current status
        from: WorkStatus,
        /// Requested status
        to: WorkStatus,
    },
}

impl StatusTransition {
    /// Classify a requested change.
    pub fn between(from: WorkStatus, to: WorkStatus) -> Self {
        if from == to {
            Self::NoChange(from)
        } else if from.successors().contains(&to) {
            Self::Allowed { from, to }
        } else {
            Self::Denied { from, to }
        }
    }

    /// Whether the change may be committed.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }

    /// Whether the status actually moves.
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// A denied status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{kind} cannot move from {from} to {to}")]
pub struct TransitionError {
    /// Entity whose status was being changed
    pub kind: EntityKind,
    /// Current status
    pub from: WorkStatus,
    /// Requested status
    pub to: WorkStatus,
}

/// Whether `kind` may move from `from` to `to`.
///
/// Tasks and milestones share one table. Re-submitting the current status is
/// allowed.
pub fn can_transition(kind: EntityKind, from: WorkStatus, to: WorkStatus) -> bool {
    match kind {
        EntityKind::Task | EntityKind::Milestone => {
            StatusTransition::between(from, to).is_allowed()
        }
    }
}

/// Like [`can_transition`] but reports the denial.
pub fn check_transition(
    kind: EntityKind,
    from: WorkStatus,
    to: WorkStatus,
) -> Result<StatusTransition, TransitionError> {
    match StatusTransition::between(from, to) {
        StatusTransition::Denied { from, to } => Err(TransitionError { kind, from, to }),
        ok => Ok(ok),
    }
}
