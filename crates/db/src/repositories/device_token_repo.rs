//! Repository for the `device_tokens` table.

use beacon_core::types::DbId;
use sqlx::PgPool;

use crate::models::device::DeviceToken;

/// Column list for `device_tokens` queries.
const COLUMNS: &str = "id, owner_id, token, is_active, deactivated_at, created_at";

/// Provides lookups and deactivation for push device tokens.
pub struct DeviceTokenRepo;

impl DeviceTokenRepo {
    /// List active device tokens belonging to any of the given owners.
    pub async fn list_active_for_owners(
        pool: &PgPool,
        owner_ids: &[DbId],
    ) -> Result<Vec<DeviceToken>, sqlx::Error> {
        if owner_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM device_tokens \
             WHERE owner_id = ANY($1) AND is_active = true \
             ORDER BY id"
        );
        sqlx::query_as::<_, DeviceToken>(&query)
            .bind(owner_ids)
            .fetch_all(pool)
            .await
    }

    /// Mark a token inactive. Idempotent: an already-inactive token keeps its
    /// original `deactivated_at`.
    ///
    /// Returns `false` if no row has this token.
    pub async fn deactivate(pool: &PgPool, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE device_tokens \
             SET is_active = false, deactivated_at = COALESCE(deactivated_at, NOW()) \
             WHERE token = $1",
        )
        .bind(token)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
