//! Quota tracking over the store's atomic counters.

use std::sync::Arc;

use beacon_core::error::CoreError;
use beacon_core::quota::{check_quota, effective_usage, QuotaKind, QuotaStatus};
use beacon_core::types::{DbId, Timestamp};

use crate::error::EngineError;
use crate::store::NotificationStore;

#[derive(Clone)]
pub struct QuotaTracker {
    store: Arc<dyn NotificationStore>,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Read-only check with the lazy monthly reset applied.
    pub async fn check(&self, kind: QuotaKind, id: DbId, now: Timestamp) -> Result<QuotaStatus, EngineError> {
        let counter = self
            .store
            .find_quota(kind, id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: kind.entity(),
                id,
            })?;
        let used = effective_usage(counter.notification_usage, counter.usage_resets_at, now);
        Ok(check_quota(counter.monthly_notification_limit, used))
    }

    /// Take one unit atomically. `None` when the limit is reached.
    ///
    /// The returned status reflects usage after the increment.
    pub async fn reserve(&self, kind: QuotaKind, id: DbId, now: Timestamp) -> Result<Option<QuotaStatus>, EngineError> {
        let counter = self.store.try_increment_quota(kind, id, now).await?;
        Ok(counter.map(|c| check_quota(c.monthly_notification_limit, c.notification_usage)))
    }

    /// Give back a unit taken by [`reserve`](Self::reserve).
    pub async fn release(&self, kind: QuotaKind, id: DbId, now: Timestamp) -> Result<bool, EngineError> {
        Ok(self.store.release_quota(kind, id, now).await?)
    }

    /// Zero every stale counter of both kinds. Returns `(businesses, towns)`.
    pub async fn reset_stale(&self, now: Timestamp) -> Result<(u64, u64), EngineError> {
        let businesses = self.store.reset_stale_quotas(QuotaKind::Business, now).await?;
        let towns = self.store.reset_stale_quotas(QuotaKind::Town, now).await?;
        Ok((businesses, towns))
    }
}
