//! Handlers for the `/notifications` resource.
//!
//! Sending and estimating require a sender role ([`RequireSender`]); the
//! preference endpoints only need an authenticated user.

use axum::extract::{Path, State};
use axum::Json;
use beacon_core::category::NotificationCategory;
use beacon_core::error::CoreError;
use beacon_core::preferences::PreferenceRecord;
use beacon_core::roles::ROLE_ADMIN;
use beacon_core::target::TargetType;
use beacon_core::types::DbId;
use beacon_db::models::notification::{Notification, NotificationDelivery};
use beacon_engine::{AudienceTarget, EstimateRequest, SendRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use super::validate_body;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{authorize_estimate, authorize_send, RequireSender};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /notifications/send`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(min = 1, max = 1000))]
    pub body: String,
    /// Category tag, e.g. `town_alert`.
    #[serde(rename = "type")]
    pub category: String,
    /// `TOWN`, `BUSINESS_SUBSCRIBERS` or `SEGMENT`.
    pub target_type: String,
    pub town_id: Option<DbId>,
    #[validate(length(min = 1, max = 100))]
    pub segment: Option<String>,
    #[validate(length(max = 2048))]
    pub deeplink: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationResponse {
    pub success: bool,
    pub notification_id: DbId,
    pub delivered: usize,
    pub failed: usize,
    pub audience_count: usize,
}

/// Body of `POST /notifications/audience-estimate`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AudienceEstimateRequest {
    /// `BUSINESS` or `TOWN`.
    pub target_type: String,
    pub business_id: Option<DbId>,
    pub town_id: Option<DbId>,
    #[validate(length(min = 1, max = 100))]
    pub segment: Option<String>,
    #[serde(rename = "type")]
    pub category: Option<String>,
}

impl AudienceEstimateRequest {
    /// Resolve the target, defaulting ids to the caller's own.
    fn target(&self, user: &AuthUser) -> Result<AudienceTarget, CoreError> {
        match self.target_type.as_str() {
            "BUSINESS" | "BUSINESS_SUBSCRIBERS" => {
                let business_id = self
                    .business_id
                    .or(user.business_id)
                    .ok_or_else(|| CoreError::Validation("businessId is required".into()))?;
                Ok(AudienceTarget::BusinessSubscribers { business_id })
            }
            "TOWN" | "SEGMENT" => {
                let town_id = self
                    .town_id
                    .or(user.town_id)
                    .ok_or_else(|| CoreError::Validation("townId is required".into()))?;
                Ok(match &self.segment {
                    Some(segment) => AudienceTarget::Segment {
                        town_id,
                        segment: segment.clone(),
                    },
                    None => AudienceTarget::Town { town_id },
                })
            }
            other => Err(CoreError::Validation(format!("Unknown target type '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Send / estimate
// ---------------------------------------------------------------------------

/// POST /api/v1/notifications/send
pub async fn send_notification(
    RequireSender(user): RequireSender,
    State(state): State<AppState>,
    Json(input): Json<SendNotificationRequest>,
) -> AppResult<Json<SendNotificationResponse>> {
    validate_body(&input)?;
    let category: NotificationCategory = input.category.parse()?;
    let target_type: TargetType = input.target_type.parse()?;
    authorize_send(&user, category, target_type, input.town_id)?;

    let request = SendRequest {
        title: input.title,
        body: input.body,
        category,
        target_type,
        town_id: input.town_id,
        segment: input.segment,
        deeplink: input.deeplink,
        image_url: input.image_url,
    };
    // The send runs on its own task so a request timeout or a dropped
    // connection cannot cancel it between `sending` and its terminal status.
    let engine = state.engine.clone();
    let sender = user.sender();
    let outcome = tokio::spawn(async move { engine.send(&sender, &request).await })
        .await
        .map_err(|e| AppError::InternalError(format!("send task failed: {e}")))??;

    Ok(Json(SendNotificationResponse {
        success: true,
        notification_id: outcome.notification_id,
        delivered: outcome.delivered,
        failed: outcome.failed,
        audience_count: outcome.audience_count,
    }))
}

/// POST /api/v1/notifications/audience-estimate
///
/// Dry run: nothing is written and no quota is consumed.
pub async fn audience_estimate(
    RequireSender(user): RequireSender,
    State(state): State<AppState>,
    Json(input): Json<AudienceEstimateRequest>,
) -> AppResult<Json<serde_json::Value>> {
    validate_body(&input)?;
    let target = input.target(&user)?;
    let category = input
        .category
        .as_deref()
        .map(str::parse::<NotificationCategory>)
        .transpose()?;
    authorize_estimate(&user, &target)?;

    let total_key = match target {
        AudienceTarget::BusinessSubscribers { .. } => "totalSubscribers",
        AudienceTarget::Town { .. } | AudienceTarget::Segment { .. } => "totalProfiles",
    };
    let estimate = state
        .engine
        .estimate(&user.sender(), &EstimateRequest { target, category })
        .await?;
    let b = estimate.breakdown;

    Ok(Json(json!({
        "estimatedAudience": estimate.estimated_audience,
        "breakdown": {
            total_key: b.total_candidates,
            "eligibleUsers": b.eligible_users,
            "blockedByPreferences": b.blocked_by_preferences,
            "blockedByQuietHours": b.blocked_by_quiet_hours,
            "noDeviceToken": b.no_device_token,
        }
    })))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Senders see their own notifications; admins see all. Others get 404.
async fn visible_notification(state: &AppState, user: &AuthUser, id: DbId) -> AppResult<Notification> {
    let notification = state.engine.notification(id).await?;
    if user.role != ROLE_ADMIN && notification.sender_id != user.user_id {
        return Err(CoreError::NotFound {
            entity: "Notification",
            id,
        }
        .into());
    }
    Ok(notification)
}

/// GET /api/v1/notifications/{id}
pub async fn get_notification(
    RequireSender(user): RequireSender,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Notification>>> {
    let notification = visible_notification(&state, &user, id).await?;
    Ok(Json(DataResponse { data: notification }))
}

/// GET /api/v1/notifications/{id}/deliveries
pub async fn list_deliveries(
    RequireSender(user): RequireSender,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<NotificationDelivery>>>> {
    visible_notification(&state, &user, id).await?;
    let deliveries = state.engine.deliveries(id).await?;
    Ok(Json(DataResponse { data: deliveries }))
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// GET /api/v1/notifications/preferences
pub async fn get_preferences(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<PreferenceRecord>>> {
    let record = state.engine.preferences(auth.user_id).await?;
    Ok(Json(DataResponse { data: record }))
}

/// PUT /api/v1/notifications/preferences
///
/// Replaces the caller's record. Missing or mistyped fields take their
/// defaults.
pub async fn update_preferences(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<serde_json::Value>,
) -> AppResult<Json<DataResponse<PreferenceRecord>>> {
    if !input.is_object() {
        return Err(CoreError::Validation("Preferences must be a JSON object".into()).into());
    }
    let record = state.engine.update_preferences(auth.user_id, &input).await?;
    tracing::info!(user_id = auth.user_id, "Notification preferences updated");
    Ok(Json(DataResponse { data: record }))
}
