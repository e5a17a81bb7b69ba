//! Repository for the `businesses` table.

use beacon_core::types::DbId;
use sqlx::PgPool;

use crate::models::quota_subject::Business;

/// Column list for `businesses` queries.
const COLUMNS: &str = "id, town_id, name, category_label, monthly_notification_limit, \
    notification_usage, usage_resets_at";

pub struct BusinessRepo;

impl BusinessRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Business>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM businesses WHERE id = $1");
        sqlx::query_as::<_, Business>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
