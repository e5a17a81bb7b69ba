use beacon_core::error::CoreError;
use beacon_core::quota::{QuotaKind, QuotaStatus};
use beacon_core::types::DbId;

use crate::audience::AudienceBreakdown;
use crate::store::StoreError;

/// Errors surfaced by the engine.
///
/// Variants raised after the notification row exists carry its id so the
/// caller can always report it.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Bad request or missing entity, raised before any row is written.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("No active devices to send to")]
    NoEligibleRecipients {
        notification_id: DbId,
        breakdown: AudienceBreakdown,
    },

    #[error("Monthly {} notification quota exceeded", .kind.as_str())]
    QuotaExceeded {
        notification_id: DbId,
        kind: QuotaKind,
        quota: QuotaStatus,
    },

    /// Every endpoint was rejected before any provider call could be made.
    #[error("Delivery could not be dispatched")]
    DispatchFailed { notification_id: DbId },

    /// The row left the status this send expected it in.
    #[error("{source}")]
    StatusConflict {
        notification_id: DbId,
        #[source]
        source: CoreError,
    },

    /// A store call failed after the notification row was created.
    #[error("Persistence failure for notification {notification_id}: {source}")]
    Persistence {
        notification_id: DbId,
        #[source]
        source: StoreError,
    },

    /// A store call failed before any row was written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// The notification this error belongs to, if one was created.
    pub fn notification_id(&self) -> Option<DbId> {
        match self {
            Self::NoEligibleRecipients { notification_id, .. }
            | Self::QuotaExceeded { notification_id, .. }
            | Self::DispatchFailed { notification_id }
            | Self::StatusConflict { notification_id, .. }
            | Self::Persistence { notification_id, .. } => Some(*notification_id),
            Self::Core(_) | Self::Store(_) => None,
        }
    }
}

/// Attach a notification id to store failures.
pub(crate) trait PersistenceContext<T> {
    fn for_notification(self, notification_id: DbId) -> Result<T, EngineError>;
}

impl<T> PersistenceContext<T> for Result<T, StoreError> {
    fn for_notification(self, notification_id: DbId) -> Result<T, EngineError> {
        self.map_err(|source| EngineError::Persistence {
            notification_id,
            source,
        })
    }
}
