//! Storage seam for the engine.

use async_trait::async_trait;
use beacon_core::quota::QuotaKind;
use beacon_core::types::{DbId, Timestamp};
use beacon_db::models::device::DeviceToken;
use beacon_db::models::notification::{
    CreateDelivery, CreateNotification, Notification, NotificationDelivery,
};
use beacon_db::models::profile::Profile;
use beacon_db::models::quota_subject::{Business, QuotaCounter, Town};

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod postgres;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// The backing store could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Every read and write the engine performs.
///
/// Notification status updates are conditional on the current status and
/// return `false` when the row was not in an allowed source state. Quota
/// increments are atomic and refuse at the limit.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Round-trip to the backing store.
    async fn ping(&self) -> StoreResult<()>;

    // -- notifications --

    async fn create_notification(&self, input: &CreateNotification) -> StoreResult<Notification>;

    async fn find_notification(&self, id: DbId) -> StoreResult<Option<Notification>>;

    /// `draft -> sending`.
    async fn mark_sending(&self, id: DbId, audience_count: i32) -> StoreResult<bool>;

    /// `sending -> sent`, stamping `sent_at`.
    async fn mark_sent(&self, id: DbId, delivery_count: i32) -> StoreResult<bool>;

    /// `draft | sending -> failed`.
    async fn mark_failed(&self, id: DbId, delivery_count: i32, reason: &str) -> StoreResult<bool>;

    async fn insert_deliveries(
        &self,
        notification_id: DbId,
        deliveries: &[CreateDelivery],
    ) -> StoreResult<u64>;

    async fn list_deliveries(&self, notification_id: DbId) -> StoreResult<Vec<NotificationDelivery>>;

    // -- audience --

    async fn find_town(&self, id: DbId) -> StoreResult<Option<Town>>;

    async fn find_business(&self, id: DbId) -> StoreResult<Option<Business>>;

    async fn list_town_profiles(&self, town_id: DbId) -> StoreResult<Vec<Profile>>;

    async fn list_subscriber_ids(&self, business_id: DbId) -> StoreResult<Vec<DbId>>;

    async fn list_active_devices(&self, owner_ids: &[DbId]) -> StoreResult<Vec<DeviceToken>>;

    /// Idempotent. `false` when no device has this token.
    async fn deactivate_device(&self, token: &str) -> StoreResult<bool>;

    // -- preferences --

    async fn find_profile(&self, user_id: DbId) -> StoreResult<Option<Profile>>;

    async fn update_preferences(&self, user_id: DbId, preferences: &serde_json::Value) -> StoreResult<bool>;

    // -- quota --

    async fn find_quota(&self, kind: QuotaKind, id: DbId) -> StoreResult<Option<QuotaCounter>>;

    /// Apply the lazy reset and increment by one unless at the limit.
    async fn try_increment_quota(
        &self,
        kind: QuotaKind,
        id: DbId,
        now: Timestamp,
    ) -> StoreResult<Option<QuotaCounter>>;

    async fn release_quota(&self, kind: QuotaKind, id: DbId, now: Timestamp) -> StoreResult<bool>;

    async fn reset_stale_quotas(&self, kind: QuotaKind, now: Timestamp) -> StoreResult<u64>;
}
