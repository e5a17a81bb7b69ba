//! [`NotificationStore`] over the `beacon-db` repositories.

use async_trait::async_trait;
use beacon_core::quota::QuotaKind;
use beacon_core::types::{DbId, Timestamp};
use beacon_db::models::device::DeviceToken;
use beacon_db::models::notification::{
    CreateDelivery, CreateNotification, Notification, NotificationDelivery,
};
use beacon_db::models::profile::Profile;
use beacon_db::models::quota_subject::{Business, QuotaCounter, Town};
use beacon_db::repositories::{
    BusinessRepo, DeviceTokenRepo, NotificationDeliveryRepo, NotificationRepo, ProfileRepo,
    QuotaRepo, SubscriptionRepo, TownRepo,
};
use beacon_db::DbPool;

use super::{NotificationStore, StoreResult};

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(beacon_db::health_check(&self.pool).await?)
    }

    async fn create_notification(&self, input: &CreateNotification) -> StoreResult<Notification> {
        Ok(NotificationRepo::create(&self.pool, input).await?)
    }

    async fn find_notification(&self, id: DbId) -> StoreResult<Option<Notification>> {
        Ok(NotificationRepo::find_by_id(&self.pool, id).await?)
    }

    async fn mark_sending(&self, id: DbId, audience_count: i32) -> StoreResult<bool> {
        Ok(NotificationRepo::mark_sending(&self.pool, id, audience_count).await?)
    }

    async fn mark_sent(&self, id: DbId, delivery_count: i32) -> StoreResult<bool> {
        Ok(NotificationRepo::mark_sent(&self.pool, id, delivery_count).await?)
    }

    async fn mark_failed(&self, id: DbId, delivery_count: i32, reason: &str) -> StoreResult<bool> {
        Ok(NotificationRepo::mark_failed(&self.pool, id, delivery_count, reason).await?)
    }

    async fn insert_deliveries(
        &self,
        notification_id: DbId,
        deliveries: &[CreateDelivery],
    ) -> StoreResult<u64> {
        Ok(NotificationDeliveryRepo::insert_batch(&self.pool, notification_id, deliveries).await?)
    }

    async fn list_deliveries(&self, notification_id: DbId) -> StoreResult<Vec<NotificationDelivery>> {
        Ok(NotificationDeliveryRepo::list_for_notification(&self.pool, notification_id).await?)
    }

    async fn find_town(&self, id: DbId) -> StoreResult<Option<Town>> {
        Ok(TownRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_business(&self, id: DbId) -> StoreResult<Option<Business>> {
        Ok(BusinessRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_town_profiles(&self, town_id: DbId) -> StoreResult<Vec<Profile>> {
        Ok(ProfileRepo::list_for_town(&self.pool, town_id).await?)
    }

    async fn list_subscriber_ids(&self, business_id: DbId) -> StoreResult<Vec<DbId>> {
        Ok(SubscriptionRepo::list_active_subscriber_ids(&self.pool, business_id).await?)
    }

    async fn list_active_devices(&self, owner_ids: &[DbId]) -> StoreResult<Vec<DeviceToken>> {
        Ok(DeviceTokenRepo::list_active_for_owners(&self.pool, owner_ids).await?)
    }

    async fn deactivate_device(&self, token: &str) -> StoreResult<bool> {
        Ok(DeviceTokenRepo::deactivate(&self.pool, token).await?)
    }

    async fn find_profile(&self, user_id: DbId) -> StoreResult<Option<Profile>> {
        Ok(ProfileRepo::find_by_user(&self.pool, user_id).await?)
    }

    async fn update_preferences(&self, user_id: DbId, preferences: &serde_json::Value) -> StoreResult<bool> {
        Ok(ProfileRepo::update_preferences(&self.pool, user_id, preferences).await?)
    }

    async fn find_quota(&self, kind: QuotaKind, id: DbId) -> StoreResult<Option<QuotaCounter>> {
        Ok(QuotaRepo::find(&self.pool, kind, id).await?)
    }

    async fn try_increment_quota(
        &self,
        kind: QuotaKind,
        id: DbId,
        now: Timestamp,
    ) -> StoreResult<Option<QuotaCounter>> {
        Ok(QuotaRepo::try_increment(&self.pool, kind, id, now).await?)
    }

    async fn release_quota(&self, kind: QuotaKind, id: DbId, now: Timestamp) -> StoreResult<bool> {
        Ok(QuotaRepo::release(&self.pool, kind, id, now).await?)
    }

    async fn reset_stale_quotas(&self, kind: QuotaKind, now: Timestamp) -> StoreResult<u64> {
        Ok(QuotaRepo::reset_stale(&self.pool, kind, now).await?)
    }
}
