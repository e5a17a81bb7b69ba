//! Audience resolution.
//!
//! Turns a target into the concrete, deduplicated list of active device
//! endpoints, plus a breakdown of why candidates were dropped. An empty
//! audience is a normal result; the caller decides what it means.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use beacon_core::category::{BusinessType, NotificationCategory, PreferenceFlag};
use beacon_core::error::CoreError;
use beacon_core::preferences::resolve_preferences;
use beacon_core::quiet_hours::local_minute_of_day;
use beacon_core::types::{DbId, Timestamp};
use serde::Serialize;

use crate::error::EngineError;
use crate::store::NotificationStore;

/// Who a message goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudienceTarget {
    /// Every profile in the town.
    Town { town_id: DbId },
    /// Active subscribers of a business.
    BusinessSubscribers { business_id: DbId },
    /// A named segment. Narrowing by segment is done elsewhere; today a
    /// segment resolves to its whole town.
    Segment { town_id: DbId, segment: String },
}

/// Preference filters applied to town-scoped audiences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudienceFilter {
    /// Flag the recipient must have on. `None` checks only the global toggle.
    pub flag: Option<PreferenceFlag>,
    pub respect_quiet_hours: bool,
}

impl AudienceFilter {
    pub fn for_category(category: Option<NotificationCategory>, business_type: Option<BusinessType>) -> Self {
        Self {
            flag: category.and_then(|c| c.preference_flag(business_type)),
            respect_quiet_hours: !category.is_some_and(NotificationCategory::bypasses_quiet_hours),
        }
    }
}

/// One device to deliver to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub owner_id: DbId,
    pub token: String,
}

/// Where the candidates went. Every candidate lands in exactly one bucket
/// after `total_candidates`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceBreakdown {
    /// Profiles in the town, or active subscribers of the business.
    pub total_candidates: usize,
    /// Candidates kept with at least one active device.
    pub eligible_users: usize,
    /// Global toggle or category flag off.
    pub blocked_by_preferences: usize,
    pub blocked_by_quiet_hours: usize,
    /// Kept, but no active device.
    pub no_device_token: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Audience {
    pub endpoints: Vec<Endpoint>,
    pub breakdown: AudienceBreakdown,
}

impl Audience {
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.token.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AudienceResolver {
    store: Arc<dyn NotificationStore>,
}

impl AudienceResolver {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(
        &self,
        target: &AudienceTarget,
        filter: AudienceFilter,
        now: Timestamp,
    ) -> Result<Audience, EngineError> {
        match target {
            AudienceTarget::BusinessSubscribers { business_id } => self.resolve_subscribers(*business_id).await,
            AudienceTarget::Town { town_id } | AudienceTarget::Segment { town_id, .. } => {
                self.resolve_town(*town_id, filter, now).await
            }
        }
    }

    async fn resolve_subscribers(&self, business_id: DbId) -> Result<Audience, EngineError> {
        let subscriber_ids = self.store.list_subscriber_ids(business_id).await?;
        let mut breakdown = AudienceBreakdown {
            total_candidates: subscriber_ids.len(),
            ..AudienceBreakdown::default()
        };
        let endpoints = self.endpoints_for(&subscriber_ids, &mut breakdown).await?;
        Ok(Audience { endpoints, breakdown })
    }

    async fn resolve_town(
        &self,
        town_id: DbId,
        filter: AudienceFilter,
        now: Timestamp,
    ) -> Result<Audience, EngineError> {
        let town = self
            .store
            .find_town(town_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Town",
                id: town_id,
            })?;
        let local_minute = local_minute_of_day(now, town.utc_offset_minutes);

        let profiles = self.store.list_town_profiles(town_id).await?;
        let mut breakdown = AudienceBreakdown {
            total_candidates: profiles.len(),
            ..AudienceBreakdown::default()
        };

        let mut kept = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            let prefs = resolve_preferences(profile.notification_preferences.as_ref());
            if !prefs.global_enabled || !prefs.allows(filter.flag) {
                breakdown.blocked_by_preferences += 1;
            } else if filter.respect_quiet_hours && prefs.quiet_hours.blocks_at(local_minute) {
                breakdown.blocked_by_quiet_hours += 1;
            } else {
                kept.push(profile.user_id);
            }
        }

        let endpoints = self.endpoints_for(&kept, &mut breakdown).await?;
        tracing::debug!(
            town_id,
            local_minute,
            candidates = breakdown.total_candidates,
            endpoints = endpoints.len(),
            "Resolved town audience"
        );
        Ok(Audience { endpoints, breakdown })
    }

    /// Active devices of `owner_ids`, deduplicated by token. Fills the
    /// eligible / no-device counts.
    async fn endpoints_for(
        &self,
        owner_ids: &[DbId],
        breakdown: &mut AudienceBreakdown,
    ) -> Result<Vec<Endpoint>, EngineError> {
        let devices = self.store.list_active_devices(owner_ids).await?;

        let mut per_owner: HashMap<DbId, usize> = HashMap::new();
        let mut seen = HashSet::new();
        let mut endpoints = Vec::with_capacity(devices.len());
        for device in devices {
            *per_owner.entry(device.owner_id).or_default() += 1;
            if seen.insert(device.token.clone()) {
                endpoints.push(Endpoint {
                    owner_id: device.owner_id,
                    token: device.token,
                });
            }
        }

        let unique_owners: HashSet<DbId> = owner_ids.iter().copied().collect();
        breakdown.eligible_users = unique_owners.iter().filter(|id| per_owner.contains_key(id)).count();
        breakdown.no_device_token = unique_owners.len() - breakdown.eligible_users;
        Ok(endpoints)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
