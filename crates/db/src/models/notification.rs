//! Notification and notification-delivery models.

use beacon_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: DbId,
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub category: String,
    pub target_type: String,
    pub status: String,
    pub sender_id: DbId,
    pub business_id: Option<DbId>,
    pub town_id: Option<DbId>,
    pub segment: Option<String>,
    pub deeplink: Option<String>,
    pub image_url: Option<String>,
    pub audience_count: Option<i32>,
    pub delivery_count: i32,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub sent_at: Option<Timestamp>,
}

/// DTO for inserting a notification in `draft`.
#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub title: String,
    pub body: String,
    pub category: String,
    pub target_type: String,
    pub sender_id: DbId,
    pub business_id: Option<DbId>,
    pub town_id: Option<DbId>,
    pub segment: Option<String>,
    pub deeplink: Option<String>,
    pub image_url: Option<String>,
}

/// A row from the `notification_deliveries` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDelivery {
    pub id: DbId,
    pub notification_id: DbId,
    pub owner_id: DbId,
    pub device_token: String,
    pub status: String,
    pub error: Option<String>,
    pub sent_at: Timestamp,
}

/// DTO for one delivery row; `notification_id` is supplied per batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDelivery {
    pub owner_id: DbId,
    pub device_token: String,
    pub status: String,
    pub error: Option<String>,
}
