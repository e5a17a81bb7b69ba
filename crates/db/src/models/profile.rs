//! Recipient profile model.

use beacon_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `profiles` table.
///
/// `notification_preferences` is the raw stored blob; it may be missing or
/// carry a legacy shape and must go through
/// [`resolve_preferences`](beacon_core::preferences::resolve_preferences)
/// before use.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: DbId,
    pub town_id: DbId,
    pub notification_preferences: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
