//! Notification and delivery status values and the notification state machine.
//!
//! ```text
//! draft ──> sending ──> sent
//!   │          │
//!   └──────────┴──────> failed
//! ```
//!
//! `draft -> failed` covers sends rejected before dispatch (no eligible
//! recipients, quota exceeded). `sent` and `failed` are terminal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle status of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Draft,
    Sending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// Statuses reachable from `self`.
    pub fn valid_transitions(self) -> &'static [NotificationStatus] {
        match self {
            Self::Draft => &[Self::Sending, Self::Failed],
            Self::Sending => &[Self::Sent, Self::Failed],
            Self::Sent | Self::Failed => &[],
        }
    }

    pub fn can_transition(self, to: NotificationStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a transition, returning [`CoreError::InvalidTransition`] otherwise.
    pub fn validate_transition(self, to: NotificationStatus) -> Result<(), CoreError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                from: self.as_str(),
                to: to.as_str(),
            })
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown notification status '{other}'"
            ))),
        }
    }
}

/// Outcome of one provider delivery attempt for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Ok,
    Error,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}
