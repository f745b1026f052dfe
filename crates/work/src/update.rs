//! Typed mutation requests.
//!
//! Each mutation has its own field set. Unknown fields are rejected when a
//! request is deserialized, and the known ones are validated before anything
//! is written.

use bookwork_core::{
    check_transition, Booking, EntityKind, Milestone, MilestoneStatus, StatusTransition, Task,
    TaskStatus, Time,
};
use serde::Deserialize;

use crate::error::{Result, WorkError};

/// Fields for creating a task.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTask {
    /// Task title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Initial status, pending when absent
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Initial percentage, only for in_progress/on_hold
    #[serde(default)]
    pub progress_percentage: Option<u8>,
    /// Estimated effort in hours
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    /// Due date
    #[serde(default)]
    pub due_date: Option<Time>,
    /// Assignee reference
    #[serde(default)]
    pub assignee: Option<String>,
    /// Whether descriptive fields stay editable, true when absent
    #[serde(default)]
    pub editable: Option<bool>,
    /// Display order, appended when absent
    #[serde(default)]
    pub position: Option<u32>,
}

impl NewTask {
    /// A task with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Build the record, validating every field.
    pub(crate) fn into_task(self, mut task: Task, now: Time) -> Result<Task> {
        task.title = validate_title(&self.title)?;
        if let Some(description) = self.description {
            task.description = description;
        }
        task.estimated_hours = validate_hours("estimated_hours", self.estimated_hours)?;
        task.due_date = self.due_date;
        task.assignee = self.assignee;
        task.editable = self.editable.unwrap_or(true);
        if let Some(position) = self.position {
            task.position = position;
        }

        let status = self.status.unwrap_or(TaskStatus::Pending);
        validate_progress(self.progress_percentage, status)?;
        if let Some(pct) = self.progress_percentage {
            task.progress_percentage = pct;
        }
        task.apply_status(status, now);
        Ok(task)
    }
}

/// Fields for updating a task. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskUpdate {
    /// New title
    #[serde(default)]
    pub title: Option<String>,
    /// New description
    #[serde(default)]
    pub description: Option<String>,
    /// Requested status
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// New percentage, only for in_progress/on_hold
    #[serde(default)]
    pub progress_percentage: Option<u8>,
    /// New estimate
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    /// Actual effort so far
    #[serde(default)]
    pub actual_hours: Option<f64>,
    /// New due date
    #[serde(default)]
    pub due_date: Option<Time>,
    /// New assignee
    #[serde(default)]
    pub assignee: Option<String>,
}

impl TaskUpdate {
    /// Request a status change only.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Request a progress change only.
    pub fn progress(percentage: u8) -> Self {
        Self {
            progress_percentage: Some(percentage),
            ..Self::default()
        }
    }

    fn touches_details(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.estimated_hours.is_some()
            || self.actual_hours.is_some()
            || self.due_date.is_some()
            || self.assignee.is_some()
    }

    /// Apply to `task`. Returns whether anything changed.
    ///
    /// On error `task` is left untouched.
    pub fn apply_to(&self, task: &mut Task, now: Time) -> Result<bool> {
        if !task.editable && self.touches_details() {
            return Err(WorkError::NotEditable(task.id));
        }

        let transition = match self.status {
            Some(to) => check_transition(EntityKind::Task, task.status, to)?,
            None => StatusTransition::NoChange(task.status),
        };
        let status = self.status.unwrap_or(task.status);
        validate_progress(self.progress_percentage, status)?;

        let title = self.title.as_deref().map(validate_title).transpose()?;
        let estimated_hours = validate_hours("estimated_hours", self.estimated_hours)?;
        let actual_hours = validate_hours("actual_hours", self.actual_hours)?;

        let before = task.clone();
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if estimated_hours.is_some() {
            task.estimated_hours = estimated_hours;
        }
        if actual_hours.is_some() {
            task.actual_hours = actual_hours;
        }
        if self.due_date.is_some() {
            task.due_date = self.due_date;
        }
        if let Some(assignee) = &self.assignee {
            task.assignee = Some(assignee.clone());
        }
        if let Some(pct) = self.progress_percentage {
            task.progress_percentage = pct;
        }
        if transition.is_change() {
            task.apply_status(status, now);
        } else {
            task.normalize_progress();
        }

        let changed = *task != before;
        if changed {
            task.updated_at = now;
        }
        Ok(changed)
    }
}

/// Fields for creating a milestone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMilestone {
    /// Milestone title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Relative weight, 1 when absent
    #[serde(default)]
    pub weight: Option<f64>,
    /// Due date
    #[serde(default)]
    pub due_date: Option<Time>,
    /// Display order, appended when absent
    #[serde(default)]
    pub position: Option<u32>,
    /// Creating actor
    #[serde(default)]
    pub created_by: Option<String>,
}

impl NewMilestone {
    /// A milestone with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set the weight.
    pub fn weighted(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub(crate) fn into_milestone(self, mut milestone: Milestone) -> Result<Milestone> {
        milestone.title = validate_title(&self.title)?;
        if let Some(description) = self.description {
            milestone.description = description;
        }
        milestone.weight = validate_weight(self.weight)?;
        milestone.due_date = self.due_date;
        if let Some(position) = self.position {
            milestone.position = position;
        }
        milestone.created_by = self.created_by;
        Ok(milestone)
    }
}

/// Fields for updating a milestone. Progress is derived and cannot be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MilestoneUpdate {
    /// New title
    #[serde(default)]
    pub title: Option<String>,
    /// New description
    #[serde(default)]
    pub description: Option<String>,
    /// Requested status
    #[serde(default)]
    pub status: Option<MilestoneStatus>,
    /// New weight
    #[serde(default)]
    pub weight: Option<f64>,
    /// New due date
    #[serde(default)]
    pub due_date: Option<Time>,
}

impl MilestoneUpdate {
    /// Apply to `milestone`. Returns whether anything changed.
    pub fn apply_to(&self, milestone: &mut Milestone, now: Time) -> Result<bool> {
        if let Some(to) = self.status {
            check_transition(EntityKind::Milestone, milestone.status, to)?;
        }
        let title = self.title.as_deref().map(validate_title).transpose()?;
        let weight = validate_weight(self.weight)?;

        let before = milestone.clone();
        if let Some(title) = title {
            milestone.title = title;
        }
        if let Some(description) = &self.description {
            milestone.description = description.clone();
        }
        if let Some(status) = self.status {
            milestone.status = status;
        }
        if weight.is_some() {
            milestone.weight = weight;
        }
        if self.due_date.is_some() {
            milestone.due_date = self.due_date;
        }

        let changed = *milestone != before;
        if changed {
            milestone.updated_at = now;
        }
        Ok(changed)
    }
}

/// Fields for creating a booking.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewBooking {
    /// Booking title
    pub title: String,
    /// Client reference
    #[serde(default)]
    pub client_id: Option<String>,
    /// Provider reference
    #[serde(default)]
    pub provider_id: Option<String>,
}

impl NewBooking {
    pub(crate) fn into_booking(self) -> Result<Booking> {
        let mut booking = Booking::new(validate_title(&self.title)?);
        booking.client_id = self.client_id;
        booking.provider_id = self.provider_id;
        Ok(booking)
    }
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(WorkError::invalid("title", "must not be empty"));
    }
    Ok(title.to_string())
}

fn validate_hours(field: &'static str, hours: Option<f64>) -> Result<Option<f64>> {
    match hours {
        Some(h) if !h.is_finite() || h < 0.0 => {
            Err(WorkError::invalid(field, format!("{} is not a non-negative number", h)))
        }
        other => Ok(other),
    }
}

fn validate_weight(weight: Option<f64>) -> Result<Option<f64>> {
    match weight {
        Some(w) if !w.is_finite() => Err(WorkError::invalid("weight", "must be a finite number")),
        other => Ok(other),
    }
}

/// An explicit percentage must be in range, and only in_progress and on_hold
/// tasks take one. Other statuses fix the percentage themselves.
fn validate_progress(progress: Option<u8>, status: TaskStatus) -> Result<()> {
    let Some(pct) = progress else {
        return Ok(());
    };
    if pct > 100 {
        return Err(WorkError::invalid("progress_percentage", format!("{} exceeds 100", pct)));
    }

    match status {
        TaskStatus::InProgress | TaskStatus::OnHold => Ok(()),
        TaskStatus::Pending | TaskStatus::Cancelled | TaskStatus::Completed => Err(
            WorkError::invalid(
                "progress_percentage",
                format!("cannot be set on a {} task", status),
            ),
        ),
    }
}
