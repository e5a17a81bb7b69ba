//! Provider receipts and per-token delivery tickets.

use beacon_core::status::DeliveryStatus;
use serde::{Deserialize, Serialize};

/// Provider error code for a token that no longer identifies a device.
pub const DEVICE_NOT_REGISTERED: &str = "DeviceNotRegistered";

// ---------------------------------------------------------------------------
// ProviderReceipt
// ---------------------------------------------------------------------------

/// The provider's answer for one message, as returned on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderReceipt {
    pub status: DeliveryStatus,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<ReceiptDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptDetails {
    #[serde(default)]
    pub error: Option<String>,
}

impl ProviderReceipt {
    /// A successful receipt.
    pub fn ok() -> Self {
        Self {
            status: DeliveryStatus::Ok,
            id: None,
            message: None,
            details: None,
        }
    }

    /// An error receipt carrying a provider error code.
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            status: DeliveryStatus::Error,
            id: None,
            message: Some(message.to_string()),
            details: Some(ReceiptDetails {
                error: Some(code.to_string()),
            }),
        }
    }

    fn error_code(&self) -> Option<&str> {
        self.details.as_ref().and_then(|d| d.error.as_deref())
    }

    /// Attach the originating token.
    pub fn into_ticket(self, token: String) -> PushTicket {
        match self.status {
            DeliveryStatus::Ok => PushTicket::ok(token),
            DeliveryStatus::Error => {
                let kind = match self.error_code() {
                    Some(DEVICE_NOT_REGISTERED) => FailureKind::DeviceNotRegistered,
                    _ => FailureKind::Provider,
                };
                let message = self
                    .message
                    .clone()
                    .or_else(|| self.error_code().map(str::to_string))
                    .unwrap_or_else(|| "provider reported an error".to_string());
                PushTicket::failed(token, kind, message)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PushTicket
// ---------------------------------------------------------------------------

/// Why a ticket is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Rejected by token-format validation; never sent.
    InvalidFormat,
    /// The provider says the token no longer identifies a device.
    DeviceNotRegistered,
    /// The whole chunk failed (network, HTTP status, timeout, deadline).
    Transport,
    /// Any other per-message provider error.
    Provider,
}

/// The outcome for one requested token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushTicket {
    pub token: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
}

impl PushTicket {
    pub fn ok(token: String) -> Self {
        Self {
            token,
            status: DeliveryStatus::Ok,
            error: None,
            failure: None,
        }
    }

    pub fn failed(token: String, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            token,
            status: DeliveryStatus::Error,
            error: Some(message.into()),
            failure: Some(kind),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == DeliveryStatus::Ok
    }

    /// Whether the device endpoint behind this token should be retired.
    pub fn is_permanently_invalid(&self) -> bool {
        matches!(
            self.failure,
            Some(FailureKind::InvalidFormat | FailureKind::DeviceNotRegistered)
        )
    }
}
