//! The notification orchestrator.
//!
//! A send moves its notification `draft -> sending -> {sent, failed}`:
//!
//! 1. Create the row in `draft`.
//! 2. Check the quota (read only); an exhausted subject fails here whatever
//!    the audience would have been.
//! 3. Resolve the audience; empty means `failed` with no quota consumed.
//! 4. Take an atomic reservation, then `sending` with the audience size.
//! 5. Dispatch and record.
//! 6. A send that ends `failed` gives its reservation back, so usage only
//!    grows on `sent`.

use std::sync::Arc;

use beacon_core::category::{business_type_for_label, BusinessType, NotificationCategory};
use beacon_core::error::CoreError;
use beacon_core::preferences::{resolve_preferences, PreferenceRecord};
use beacon_core::quota::{QuotaKind, QuotaStatus};
use beacon_core::status::NotificationStatus;
use beacon_core::target::TargetType;
use beacon_core::types::{DbId, Timestamp};
use beacon_db::models::notification::{CreateNotification, Notification, NotificationDelivery};
use beacon_delivery::{Dispatcher, PushContent};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::audience::{AudienceBreakdown, AudienceFilter, AudienceResolver, AudienceTarget};
use crate::error::{EngineError, PersistenceContext};
use crate::quota::QuotaTracker;
use crate::recorder::DeliveryRecorder;
use crate::store::NotificationStore;

const NO_RECIPIENTS: &str = "no eligible recipients";
const QUOTA_EXCEEDED: &str = "quota exceeded";

// ---------------------------------------------------------------------------
// Inputs / outputs
// ---------------------------------------------------------------------------

/// The already-authorized sender. The engine trusts it as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderContext {
    pub user_id: DbId,
    pub role: String,
    pub business_id: Option<DbId>,
    pub town_id: Option<DbId>,
}

#[derive(Debug, Clone)]
pub struct SendRequest {
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
    pub target_type: TargetType,
    /// Defaults to the sender's town for TOWN and SEGMENT targets.
    pub town_id: Option<DbId>,
    pub segment: Option<String>,
    pub deeplink: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub notification_id: DbId,
    pub status: NotificationStatus,
    pub delivered: usize,
    pub failed: usize,
    pub audience_count: usize,
}

#[derive(Debug, Clone)]
pub struct EstimateRequest {
    pub target: AudienceTarget,
    /// Without a category only the global toggle and quiet hours apply.
    pub category: Option<NotificationCategory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    pub estimated_audience: usize,
    pub breakdown: AudienceBreakdown,
}

/// Everything derived from the request before the row is written.
struct SendPlan {
    target: AudienceTarget,
    business_id: Option<DbId>,
    town_id: DbId,
    filter: AudienceFilter,
    quota: Option<(QuotaKind, DbId)>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct NotificationEngine {
    store: Arc<dyn NotificationStore>,
    dispatcher: Dispatcher,
    resolver: AudienceResolver,
    quota: QuotaTracker,
    recorder: DeliveryRecorder,
}

impl NotificationEngine {
    pub fn new(store: Arc<dyn NotificationStore>, dispatcher: Dispatcher) -> Self {
        Self {
            resolver: AudienceResolver::new(store.clone()),
            quota: QuotaTracker::new(store.clone()),
            recorder: DeliveryRecorder::new(store.clone()),
            store,
            dispatcher,
        }
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub async fn send(&self, sender: &SenderContext, request: &SendRequest) -> Result<SendOutcome, EngineError> {
        self.send_at(sender, request, Utc::now()).await
    }

    /// [`send`](Self::send) with an explicit clock.
    pub async fn send_at(
        &self,
        sender: &SenderContext,
        request: &SendRequest,
        now: Timestamp,
    ) -> Result<SendOutcome, EngineError> {
        let plan = self.plan(sender, request).await?;

        let notification = self
            .store
            .create_notification(&CreateNotification {
                title: request.title.clone(),
                body: request.body.clone(),
                category: request.category.as_str().to_string(),
                target_type: request.target_type.as_str().to_string(),
                sender_id: sender.user_id,
                business_id: plan.business_id,
                town_id: Some(plan.town_id),
                segment: request.segment.clone(),
                deeplink: request.deeplink.clone(),
                image_url: request.image_url.clone(),
            })
            .await?;
        let id = notification.id;
        tracing::info!(
            notification_id = id,
            sender_id = sender.user_id,
            category = request.category.as_str(),
            target_type = request.target_type.as_str(),
            "Notification created"
        );

        if let Some((kind, subject)) = plan.quota {
            self.precheck_quota(id, kind, subject, now).await?;
        }

        let audience = match self.resolver.resolve(&plan.target, plan.filter, now).await {
            Ok(audience) => audience,
            Err(e) => return Err(self.abort(id, None, now, e).await),
        };
        if audience.is_empty() {
            self.store.mark_failed(id, 0, NO_RECIPIENTS).await.for_notification(id)?;
            tracing::info!(notification_id = id, "No eligible recipients");
            return Err(EngineError::NoEligibleRecipients {
                notification_id: id,
                breakdown: audience.breakdown,
            });
        }

        let reserved = match plan.quota {
            Some((kind, subject)) => {
                self.reserve_quota(id, kind, subject, now).await?;
                Some((kind, subject))
            }
            None => None,
        };

        let audience_count = audience.len();
        match self
            .store
            .mark_sending(id, i32::try_from(audience_count).unwrap_or(i32::MAX))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                let source = self.status_conflict(id, NotificationStatus::Sending).await;
                let e = EngineError::StatusConflict {
                    notification_id: id,
                    source,
                };
                return Err(self.abort(id, reserved, now, e).await);
            }
            Err(e) => return Err(self.abort(id, reserved, now, e.into()).await),
        }

        let content = PushContent {
            title: request.title.clone(),
            body: request.body.clone(),
            data: serde_json::json!({
                "notificationId": id,
                "type": request.category,
                "deeplink": request.deeplink,
                "imageUrl": request.image_url,
                "businessId": plan.business_id,
                "townId": plan.town_id,
            }),
        };
        let result = self.dispatcher.dispatch(&content, &audience.tokens()).await;

        let outcome = match self.recorder.record(id, &audience.endpoints, &result).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if !result.attempted() {
                    self.release_quota(id, reserved, now).await;
                }
                return Err(e);
            }
        };

        if outcome.status == NotificationStatus::Failed {
            self.release_quota(id, reserved, now).await;
            return Err(EngineError::DispatchFailed { notification_id: id });
        }

        Ok(SendOutcome {
            notification_id: id,
            status: outcome.status,
            delivered: result.success,
            failed: result.failed,
            audience_count,
        })
    }

    /// Dry run: resolve the audience without writing anything.
    pub async fn estimate(&self, sender: &SenderContext, request: &EstimateRequest) -> Result<Estimate, EngineError> {
        self.estimate_at(sender, request, Utc::now()).await
    }

    pub async fn estimate_at(
        &self,
        sender: &SenderContext,
        request: &EstimateRequest,
        now: Timestamp,
    ) -> Result<Estimate, EngineError> {
        let business_type = match &request.target {
            AudienceTarget::BusinessSubscribers { business_id } => {
                self.business_type(*business_id).await?
            }
            AudienceTarget::Town { .. } | AudienceTarget::Segment { .. } => {
                match (request.category, sender.business_id) {
                    (Some(c), Some(business_id)) if c.is_business() => self.business_type(business_id).await?,
                    _ => None,
                }
            }
        };
        let filter = AudienceFilter::for_category(request.category, business_type);
        let audience = self.resolver.resolve(&request.target, filter, now).await?;
        Ok(Estimate {
            estimated_audience: audience.len(),
            breakdown: audience.breakdown,
        })
    }

    // -- reads --

    pub async fn notification(&self, id: DbId) -> Result<Notification, EngineError> {
        self.store
            .find_notification(id)
            .await?
            .ok_or(EngineError::Core(CoreError::NotFound {
                entity: "Notification",
                id,
            }))
    }

    pub async fn deliveries(&self, notification_id: DbId) -> Result<Vec<NotificationDelivery>, EngineError> {
        self.notification(notification_id).await?;
        Ok(self.store.list_deliveries(notification_id).await?)
    }

    // -- preferences --

    /// The user's resolved preferences.
    pub async fn preferences(&self, user_id: DbId) -> Result<PreferenceRecord, EngineError> {
        let profile = self
            .store
            .find_profile(user_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Profile",
                id: user_id,
            })?;
        Ok(resolve_preferences(profile.notification_preferences.as_ref()))
    }

    /// Replace the user's preferences. The input is resolved field by field
    /// first, so the stored record is always complete.
    pub async fn update_preferences(
        &self,
        user_id: DbId,
        raw: &serde_json::Value,
    ) -> Result<PreferenceRecord, EngineError> {
        let record = resolve_preferences(Some(raw));
        let value = serde_json::to_value(&record).map_err(|e| CoreError::Internal(e.to_string()))?;
        if !self.store.update_preferences(user_id, &value).await? {
            return Err(CoreError::NotFound {
                entity: "Profile",
                id: user_id,
            }
            .into());
        }
        Ok(record)
    }

    // -- internals --

    async fn plan(&self, sender: &SenderContext, request: &SendRequest) -> Result<SendPlan, EngineError> {
        let counts_quota = request.category.requires_quota();

        match request.target_type {
            TargetType::BusinessSubscribers => {
                let business_id = sender.business_id.ok_or_else(|| {
                    CoreError::Validation("BUSINESS_SUBSCRIBERS requires a sending business".into())
                })?;
                let business = self.store.find_business(business_id).await?.ok_or(CoreError::NotFound {
                    entity: "Business",
                    id: business_id,
                })?;
                let business_type = business_type_for_label(&business.category_label);
                Ok(SendPlan {
                    target: AudienceTarget::BusinessSubscribers { business_id },
                    business_id: Some(business_id),
                    town_id: business.town_id,
                    filter: AudienceFilter::for_category(Some(request.category), business_type),
                    quota: counts_quota.then_some((QuotaKind::Business, business_id)),
                })
            }
            TargetType::Town | TargetType::Segment => {
                let town_id = request
                    .town_id
                    .or(sender.town_id)
                    .ok_or_else(|| CoreError::Validation("townId is required".into()))?;
                if self.store.find_town(town_id).await?.is_none() {
                    return Err(CoreError::NotFound {
                        entity: "Town",
                        id: town_id,
                    }
                    .into());
                }

                let target = if request.target_type == TargetType::Segment {
                    let segment = request
                        .segment
                        .clone()
                        .filter(|s| !s.trim().is_empty())
                        .ok_or_else(|| CoreError::Validation("segment is required for SEGMENT targets".into()))?;
                    AudienceTarget::Segment { town_id, segment }
                } else {
                    AudienceTarget::Town { town_id }
                };

                let business_type = match sender.business_id {
                    Some(business_id) if request.category.is_business() => self.business_type(business_id).await?,
                    _ => None,
                };
                Ok(SendPlan {
                    target,
                    business_id: None,
                    town_id,
                    filter: AudienceFilter::for_category(Some(request.category), business_type),
                    quota: counts_quota.then_some((QuotaKind::Town, town_id)),
                })
            }
        }
    }

    async fn business_type(&self, business_id: DbId) -> Result<Option<BusinessType>, EngineError> {
        let business = self.store.find_business(business_id).await?.ok_or(CoreError::NotFound {
            entity: "Business",
            id: business_id,
        })?;
        Ok(business_type_for_label(&business.category_label))
    }

    /// Read-only check ahead of audience resolution. On refusal the
    /// notification is marked `failed` and never reaches `sending`.
    async fn precheck_quota(&self, id: DbId, kind: QuotaKind, subject: DbId, now: Timestamp) -> Result<(), EngineError> {
        let status = match self.quota.check(kind, subject, now).await {
            Ok(status) => status,
            Err(e) => return Err(self.abort(id, None, now, e).await),
        };
        if !status.allowed {
            return Err(self.reject_quota(id, kind, status).await);
        }
        Ok(())
    }

    /// Atomic reservation; a concurrent send may have taken the last slot
    /// since the pre-check.
    async fn reserve_quota(&self, id: DbId, kind: QuotaKind, subject: DbId, now: Timestamp) -> Result<(), EngineError> {
        match self.quota.reserve(kind, subject, now).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                let status = self.recheck_quota(id, kind, subject, now).await;
                Err(self.reject_quota(id, kind, status).await)
            }
            Err(e) => Err(self.abort(id, None, now, e).await),
        }
    }

    /// Status to report after a refused reservation. A failing read is
    /// logged and reported as exhausted.
    async fn recheck_quota(&self, id: DbId, kind: QuotaKind, subject: DbId, now: Timestamp) -> QuotaStatus {
        match self.quota.check(kind, subject, now).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(
                    notification_id = id,
                    kind = kind.as_str(),
                    subject,
                    error = %e,
                    "Quota re-check failed after a lost reservation"
                );
                QuotaStatus {
                    allowed: false,
                    used: 0,
                    limit: None,
                    remaining: Some(0),
                }
            }
        }
    }

    /// Describe why the row could not move to `to`, from its stored status.
    async fn status_conflict(&self, id: DbId, to: NotificationStatus) -> CoreError {
        let current = match self.store.find_notification(id).await {
            Ok(found) => found.and_then(|n| n.status.parse::<NotificationStatus>().ok()),
            Err(e) => {
                tracing::error!(notification_id = id, error = %e, "Failed to read notification status");
                None
            }
        };
        match current.map(|status| status.validate_transition(to)) {
            Some(Err(e)) => e,
            _ => CoreError::InvalidTransition {
                from: current.map_or("unknown", NotificationStatus::as_str),
                to: to.as_str(),
            },
        }
    }

    async fn reject_quota(&self, id: DbId, kind: QuotaKind, quota: QuotaStatus) -> EngineError {
        if let Err(e) = self.store.mark_failed(id, 0, QUOTA_EXCEEDED).await {
            return EngineError::Persistence {
                notification_id: id,
                source: e,
            };
        }
        tracing::warn!(
            notification_id = id,
            kind = kind.as_str(),
            used = quota.used,
            limit = ?quota.limit,
            "Notification quota exceeded"
        );
        EngineError::QuotaExceeded {
            notification_id: id,
            kind,
            quota,
        }
    }

    /// Best-effort cleanup after an unexpected error once the row exists.
    async fn abort(
        &self,
        id: DbId,
        reserved: Option<(QuotaKind, DbId)>,
        now: Timestamp,
        error: EngineError,
    ) -> EngineError {
        tracing::error!(notification_id = id, error = %error, "Send aborted");
        if let Err(e) = self.store.mark_failed(id, 0, &error.to_string()).await {
            tracing::error!(notification_id = id, error = %e, "Failed to mark notification failed");
        }
        self.release_quota(id, reserved, now).await;
        match error {
            EngineError::Store(source) => EngineError::Persistence {
                notification_id: id,
                source,
            },
            other => other,
        }
    }

    async fn release_quota(&self, id: DbId, reserved: Option<(QuotaKind, DbId)>, now: Timestamp) {
        let Some((kind, subject)) = reserved else {
            return;
        };
        if let Err(e) = self.quota.release(kind, subject, now).await {
            tracing::error!(notification_id = id, kind = kind.as_str(), subject, error = %e, "Failed to release quota reservation");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
