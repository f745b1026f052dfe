//! Booking model - the aggregate root whose progress rolls up from milestones.

use serde::{Deserialize, Serialize};
use crate::id::BookingId;
use crate::Time;

/// A client's booking of a provider's service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Unique identifier
    #[serde(rename = "booking_id")]
    pub id: BookingId,

    /// Booking title
    pub title: String,

    /// Client reference
    #[serde(default)]
    pub client_id: Option<String>,

    /// Provider reference
    #[serde(default)]
    pub provider_id: Option<String>,

    /// Booking status
    pub status: BookingStatus,

    /// Approval status
    pub approval_status: ApprovalStatus,

    /// Weighted roll-up of milestone progress
    pub progress_percentage: u8,

    /// When created
    pub created_at: Time,

    /// Last updated
    pub updated_at: Time,

    /// Stored record version, used for conditional writes
    #[serde(default)]
    pub version: u64,
}

impl Booking {
    /// Create a pending booking with no progress.
    pub fn new(title: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: BookingId::new(),
            title: title.into(),
            client_id: None,
            provider_id: None,
            status: BookingStatus::Pending,
            approval_status: ApprovalStatus::Pending,
            progress_percentage: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

/// Booking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Requested, not yet confirmed
    #[default]
    Pending,
    /// Accepted by the provider
    Confirmed,
    /// Delivery under way
    InProgress,
    /// Delivered
    Completed,
    /// Cancelled
    Cancelled,
}

/// Approval status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting review
    #[default]
    Pending,
    /// Approved
    Approved,
    /// Rejected
    Rejected,
}
