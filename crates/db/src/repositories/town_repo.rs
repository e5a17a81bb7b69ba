//! Repository for the `towns` table.

use beacon_core::types::DbId;
use sqlx::PgPool;

use crate::models::quota_subject::Town;

/// Column list for `towns` queries.
const COLUMNS: &str =
    "id, name, utc_offset_minutes, monthly_notification_limit, notification_usage, usage_resets_at";

pub struct TownRepo;

impl TownRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Town>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM towns WHERE id = $1");
        sqlx::query_as::<_, Town>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
