//! Handler for `/quota`.

use axum::extract::State;
use axum::Json;
use beacon_core::quota::{QuotaKind, QuotaStatus};
use chrono::Utc;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::rbac::RequireSender;
use crate::response::DataResponse;
use crate::state::AppState;

/// Quota of the caller's own business and town.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaOverview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business: Option<QuotaStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub town: Option<QuotaStatus>,
}

/// GET /api/v1/quota
pub async fn get_quota(
    RequireSender(user): RequireSender,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<QuotaOverview>>> {
    let now = Utc::now();
    let tracker = state.engine.quota();

    let business = match user.business_id {
        Some(id) => Some(tracker.check(QuotaKind::Business, id, now).await?),
        None => None,
    };
    let town = match user.town_id {
        Some(id) => Some(tracker.check(QuotaKind::Town, id, now).await?),
        None => None,
    };

    Ok(Json(DataResponse {
        data: QuotaOverview { business, town },
    }))
}
