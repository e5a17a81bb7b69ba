//! Towns and businesses, the two entities that carry notification quotas.

use beacon_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `towns` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Town {
    pub id: DbId,
    pub name: String,
    pub utc_offset_minutes: i32,
    pub monthly_notification_limit: Option<i32>,
    pub notification_usage: i32,
    pub usage_resets_at: Timestamp,
}

/// A row from the `businesses` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: DbId,
    pub town_id: DbId,
    pub name: String,
    pub category_label: String,
    pub monthly_notification_limit: Option<i32>,
    pub notification_usage: i32,
    pub usage_resets_at: Timestamp,
}

/// The quota columns shared by `towns` and `businesses`.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaCounter {
    pub id: DbId,
    pub monthly_notification_limit: Option<i32>,
    pub notification_usage: i32,
    pub usage_resets_at: Timestamp,
}
