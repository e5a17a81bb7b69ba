//! Repository for the `notification_deliveries` table.

use beacon_core::types::DbId;
use sqlx::PgPool;

use crate::models::notification::{CreateDelivery, NotificationDelivery};

/// Column list for `notification_deliveries` queries.
const COLUMNS: &str = "id, notification_id, owner_id, device_token, status, error, sent_at";

/// Append-only persistence for per-device delivery outcomes.
pub struct NotificationDeliveryRepo;

impl NotificationDeliveryRepo {
    /// Insert all delivery rows for one notification in a single statement.
    ///
    /// Returns the number of rows inserted.
    pub async fn insert_batch(
        pool: &PgPool,
        notification_id: DbId,
        deliveries: &[CreateDelivery],
    ) -> Result<u64, sqlx::Error> {
        if deliveries.is_empty() {
            return Ok(0);
        }

        let owner_ids: Vec<DbId> = deliveries.iter().map(|d| d.owner_id).collect();
        let tokens: Vec<&str> = deliveries.iter().map(|d| d.device_token.as_str()).collect();
        let statuses: Vec<&str> = deliveries.iter().map(|d| d.status.as_str()).collect();
        let errors: Vec<Option<&str>> = deliveries.iter().map(|d| d.error.as_deref()).collect();

        let result = sqlx::query(
            "INSERT INTO notification_deliveries \
                (notification_id, owner_id, device_token, status, error) \
             SELECT $1, owner_id, device_token, status, error \
             FROM UNNEST($2::BIGINT[], $3::TEXT[], $4::TEXT[], $5::TEXT[]) \
                AS t(owner_id, device_token, status, error)",
        )
        .bind(notification_id)
        .bind(owner_ids)
        .bind(tokens)
        .bind(statuses)
        .bind(errors)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// List delivery rows for a notification, oldest first.
    pub async fn list_for_notification(
        pool: &PgPool,
        notification_id: DbId,
    ) -> Result<Vec<NotificationDelivery>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_deliveries \
             WHERE notification_id = $1 \
             ORDER BY id"
        );
        sqlx::query_as::<_, NotificationDelivery>(&query)
            .bind(notification_id)
            .fetch_all(pool)
            .await
    }
}
