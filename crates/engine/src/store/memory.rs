//! In-memory [`NotificationStore`] for tests.
//!
//! All state sits behind one mutex; every trait method takes the lock once,
//! so quota increments are as atomic as the Postgres statement they mirror.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use beacon_core::quota::{effective_usage, needs_reset, QuotaKind};
use beacon_core::status::NotificationStatus;
use beacon_core::types::{DbId, Timestamp};
use beacon_db::models::device::DeviceToken;
use beacon_db::models::notification::{
    CreateDelivery, CreateNotification, Notification, NotificationDelivery,
};
use beacon_db::models::profile::Profile;
use beacon_db::models::quota_subject::{Business, QuotaCounter, Town};
use chrono::Utc;

use super::{NotificationStore, StoreError, StoreResult};

#[derive(Default)]
struct State {
    next_id: DbId,
    towns: HashMap<DbId, Town>,
    businesses: HashMap<DbId, Business>,
    profiles: Vec<Profile>,
    subscriptions: Vec<(DbId, DbId, bool)>,
    devices: Vec<DeviceToken>,
    notifications: HashMap<DbId, Notification>,
    deliveries: Vec<NotificationDelivery>,
    transitions: Vec<(DbId, NotificationStatus)>,
    fail_delivery_inserts: bool,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn counter_mut(&mut self, kind: QuotaKind, id: DbId) -> Option<(&mut Option<i32>, &mut i32, &mut Timestamp)> {
        match kind {
            QuotaKind::Business => self.businesses.get_mut(&id).map(|b| {
                (&mut b.monthly_notification_limit, &mut b.notification_usage, &mut b.usage_resets_at)
            }),
            QuotaKind::Town => self.towns.get_mut(&id).map(|t| {
                (&mut t.monthly_notification_limit, &mut t.notification_usage, &mut t.usage_resets_at)
            }),
        }
    }

    fn transition(&mut self, id: DbId, to: NotificationStatus) -> Option<&mut Notification> {
        let notification = self.notifications.get_mut(&id)?;
        let current = notification.status.parse::<NotificationStatus>().ok()?;
        if !current.can_transition(to) {
            return None;
        }
        notification.status = to.as_str().to_string();
        self.transitions.push((id, to));
        self.notifications.get_mut(&id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn guard(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- seeding --

    pub fn add_town(&self, id: DbId, utc_offset_minutes: i32, limit: Option<i32>, usage: i32) -> Town {
        let town = Town {
            id,
            name: format!("Town {id}"),
            utc_offset_minutes,
            monthly_notification_limit: limit,
            notification_usage: usage,
            usage_resets_at: Utc::now(),
        };
        self.guard().towns.insert(id, town.clone());
        town
    }

    pub fn add_business(&self, id: DbId, town_id: DbId, label: &str, limit: Option<i32>, usage: i32) -> Business {
        let business = Business {
            id,
            town_id,
            name: format!("Business {id}"),
            category_label: label.to_string(),
            monthly_notification_limit: limit,
            notification_usage: usage,
            usage_resets_at: Utc::now(),
        };
        self.guard().businesses.insert(id, business.clone());
        business
    }

    /// Move a counter's last reset to `at`.
    pub fn set_usage_resets_at(&self, kind: QuotaKind, id: DbId, at: Timestamp) {
        if let Some((_, _, resets_at)) = self.guard().counter_mut(kind, id) {
            *resets_at = at;
        }
    }

    pub fn add_profile(&self, user_id: DbId, town_id: DbId, preferences: Option<serde_json::Value>) {
        let now = Utc::now();
        self.guard().profiles.push(Profile {
            user_id,
            town_id,
            notification_preferences: preferences,
            created_at: now,
            updated_at: now,
        });
    }

    pub fn add_subscription(&self, business_id: DbId, user_id: DbId, is_active: bool) {
        self.guard().subscriptions.push((business_id, user_id, is_active));
    }

    pub fn add_device(&self, owner_id: DbId, token: &str) -> DeviceToken {
        let mut state = self.guard();
        let device = DeviceToken {
            id: state.next_id(),
            owner_id,
            token: token.to_string(),
            is_active: true,
            deactivated_at: None,
            created_at: Utc::now(),
        };
        state.devices.push(device.clone());
        device
    }

    /// Make every subsequent delivery insert fail.
    pub fn fail_delivery_inserts(&self, fail: bool) {
        self.guard().fail_delivery_inserts = fail;
    }

    // -- inspection --

    pub fn device(&self, token: &str) -> Option<DeviceToken> {
        self.guard().devices.iter().find(|d| d.token == token).cloned()
    }

    pub fn notification(&self, id: DbId) -> Option<Notification> {
        self.guard().notifications.get(&id).cloned()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        let mut all: Vec<Notification> = self.guard().notifications.values().cloned().collect();
        all.sort_by_key(|n| n.id);
        all
    }

    pub fn deliveries(&self, notification_id: DbId) -> Vec<NotificationDelivery> {
        self.guard()
            .deliveries
            .iter()
            .filter(|d| d.notification_id == notification_id)
            .cloned()
            .collect()
    }

    /// Every status a notification has been moved to, in order.
    pub fn transitions(&self, notification_id: DbId) -> Vec<NotificationStatus> {
        self.guard()
            .transitions
            .iter()
            .filter(|(id, _)| *id == notification_id)
            .map(|(_, s)| *s)
            .collect()
    }

    /// Raw stored usage for a subject.
    pub fn usage(&self, kind: QuotaKind, id: DbId) -> Option<i32> {
        self.guard().counter_mut(kind, id).map(|(_, usage, _)| *usage)
    }

    pub fn stored_preferences(&self, user_id: DbId) -> Option<serde_json::Value> {
        self.guard()
            .profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .and_then(|p| p.notification_preferences.clone())
    }
}

fn counter(id: DbId, limit: Option<i32>, usage: i32, resets_at: Timestamp) -> QuotaCounter {
    QuotaCounter {
        id,
        monthly_notification_limit: limit,
        notification_usage: usage,
        usage_resets_at: resets_at,
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }

    async fn create_notification(&self, input: &CreateNotification) -> StoreResult<Notification> {
        let mut state = self.lock()?;
        let id = state.next_id();
        let notification = Notification {
            id,
            title: input.title.clone(),
            body: input.body.clone(),
            category: input.category.clone(),
            target_type: input.target_type.clone(),
            status: NotificationStatus::Draft.as_str().to_string(),
            sender_id: input.sender_id,
            business_id: input.business_id,
            town_id: input.town_id,
            segment: input.segment.clone(),
            deeplink: input.deeplink.clone(),
            image_url: input.image_url.clone(),
            audience_count: None,
            delivery_count: 0,
            failure_reason: None,
            created_at: Utc::now(),
            sent_at: None,
        };
        state.notifications.insert(id, notification.clone());
        state.transitions.push((id, NotificationStatus::Draft));
        Ok(notification)
    }

    async fn find_notification(&self, id: DbId) -> StoreResult<Option<Notification>> {
        Ok(self.lock()?.notifications.get(&id).cloned())
    }

    async fn mark_sending(&self, id: DbId, audience_count: i32) -> StoreResult<bool> {
        let mut state = self.lock()?;
        Ok(state
            .transition(id, NotificationStatus::Sending)
            .map(|n| n.audience_count = Some(audience_count))
            .is_some())
    }

    async fn mark_sent(&self, id: DbId, delivery_count: i32) -> StoreResult<bool> {
        let mut state = self.lock()?;
        Ok(state
            .transition(id, NotificationStatus::Sent)
            .map(|n| {
                n.delivery_count = delivery_count;
                n.sent_at = Some(Utc::now());
            })
            .is_some())
    }

    async fn mark_failed(&self, id: DbId, delivery_count: i32, reason: &str) -> StoreResult<bool> {
        let mut state = self.lock()?;
        Ok(state
            .transition(id, NotificationStatus::Failed)
            .map(|n| {
                n.delivery_count = delivery_count;
                n.failure_reason = Some(reason.to_string());
            })
            .is_some())
    }

    async fn insert_deliveries(
        &self,
        notification_id: DbId,
        deliveries: &[CreateDelivery],
    ) -> StoreResult<u64> {
        let mut state = self.lock()?;
        if state.fail_delivery_inserts {
            return Err(StoreError::Unavailable("delivery insert rejected".into()));
        }
        let now = Utc::now();
        for d in deliveries {
            let id = state.next_id();
            state.deliveries.push(NotificationDelivery {
                id,
                notification_id,
                owner_id: d.owner_id,
                device_token: d.device_token.clone(),
                status: d.status.clone(),
                error: d.error.clone(),
                sent_at: now,
            });
        }
        Ok(deliveries.len() as u64)
    }

    async fn list_deliveries(&self, notification_id: DbId) -> StoreResult<Vec<NotificationDelivery>> {
        let state = self.lock()?;
        Ok(state
            .deliveries
            .iter()
            .filter(|d| d.notification_id == notification_id)
            .cloned()
            .collect())
    }

    async fn find_town(&self, id: DbId) -> StoreResult<Option<Town>> {
        Ok(self.lock()?.towns.get(&id).cloned())
    }

    async fn find_business(&self, id: DbId) -> StoreResult<Option<Business>> {
        Ok(self.lock()?.businesses.get(&id).cloned())
    }

    async fn list_town_profiles(&self, town_id: DbId) -> StoreResult<Vec<Profile>> {
        let state = self.lock()?;
        Ok(state.profiles.iter().filter(|p| p.town_id == town_id).cloned().collect())
    }

    async fn list_subscriber_ids(&self, business_id: DbId) -> StoreResult<Vec<DbId>> {
        let state = self.lock()?;
        let mut ids: Vec<DbId> = state
            .subscriptions
            .iter()
            .filter(|(b, _, active)| *b == business_id && *active)
            .map(|(_, user, _)| *user)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn list_active_devices(&self, owner_ids: &[DbId]) -> StoreResult<Vec<DeviceToken>> {
        let owners: HashSet<DbId> = owner_ids.iter().copied().collect();
        let state = self.lock()?;
        Ok(state
            .devices
            .iter()
            .filter(|d| d.is_active && owners.contains(&d.owner_id))
            .cloned()
            .collect())
    }

    async fn deactivate_device(&self, token: &str) -> StoreResult<bool> {
        let mut state = self.lock()?;
        let Some(device) = state.devices.iter_mut().find(|d| d.token == token) else {
            return Ok(false);
        };
        device.is_active = false;
        if device.deactivated_at.is_none() {
            device.deactivated_at = Some(Utc::now());
        }
        Ok(true)
    }

    async fn find_profile(&self, user_id: DbId) -> StoreResult<Option<Profile>> {
        Ok(self.lock()?.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn update_preferences(&self, user_id: DbId, preferences: &serde_json::Value) -> StoreResult<bool> {
        let mut state = self.lock()?;
        let Some(profile) = state.profiles.iter_mut().find(|p| p.user_id == user_id) else {
            return Ok(false);
        };
        profile.notification_preferences = Some(preferences.clone());
        profile.updated_at = Utc::now();
        Ok(true)
    }

    async fn find_quota(&self, kind: QuotaKind, id: DbId) -> StoreResult<Option<QuotaCounter>> {
        let mut state = self.lock()?;
        Ok(state
            .counter_mut(kind, id)
            .map(|(limit, usage, resets_at)| counter(id, *limit, *usage, *resets_at)))
    }

    async fn try_increment_quota(
        &self,
        kind: QuotaKind,
        id: DbId,
        now: Timestamp,
    ) -> StoreResult<Option<QuotaCounter>> {
        let mut state = self.lock()?;
        let Some((limit, usage, resets_at)) = state.counter_mut(kind, id) else {
            return Ok(None);
        };
        let current = effective_usage(*usage, *resets_at, now);
        if limit.is_some_and(|l| current >= l) {
            return Ok(None);
        }
        if needs_reset(*resets_at, now) {
            *resets_at = now;
        }
        *usage = current + 1;
        Ok(Some(counter(id, *limit, *usage, *resets_at)))
    }

    async fn release_quota(&self, kind: QuotaKind, id: DbId, now: Timestamp) -> StoreResult<bool> {
        let mut state = self.lock()?;
        let Some((_, usage, resets_at)) = state.counter_mut(kind, id) else {
            return Ok(false);
        };
        if needs_reset(*resets_at, now) {
            return Ok(false);
        }
        *usage = (*usage - 1).max(0);
        Ok(true)
    }

    async fn reset_stale_quotas(&self, kind: QuotaKind, now: Timestamp) -> StoreResult<u64> {
        let mut state = self.lock()?;
        let mut reset = 0;
        let counters: Vec<(&mut i32, &mut Timestamp)> = match kind {
            QuotaKind::Business => state
                .businesses
                .values_mut()
                .map(|b| (&mut b.notification_usage, &mut b.usage_resets_at))
                .collect(),
            QuotaKind::Town => state
                .towns
                .values_mut()
                .map(|t| (&mut t.notification_usage, &mut t.usage_resets_at))
                .collect(),
        };
        for (usage, resets_at) in counters {
            if needs_reset(*resets_at, now) {
                *usage = 0;
                *resets_at = now;
                reset += 1;
            }
        }
        Ok(reset)
    }
}
