//! Push device token model.

use beacon_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `device_tokens` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceToken {
    pub id: DbId,
    pub owner_id: DbId,
    pub token: String,
    pub is_active: bool,
    pub deactivated_at: Option<Timestamp>,
    pub created_at: Timestamp,
}
