//! Repository for the `notifications` table.
//!
//! Status updates are conditional on the current status so that the
//! `draft -> sending -> sent | failed` state machine is enforced by the
//! database even when two writers race. Each `mark_*` method returns `false`
//! when the row was not in an allowed source state.

use beacon_core::status::NotificationStatus;
use beacon_core::types::DbId;
use sqlx::PgPool;

use crate::models::notification::{CreateNotification, Notification};

/// Column list for `notifications` queries.
const COLUMNS: &str = "id, title, body, category, target_type, status, sender_id, \
    business_id, town_id, segment, deeplink, image_url, audience_count, delivery_count, \
    failure_reason, created_at, sent_at";

/// Provides persistence for notifications.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Insert a notification in `draft`, returning the full row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateNotification,
    ) -> Result<Notification, sqlx::Error> {
        let query = format!(
            "INSERT INTO notifications \
                (title, body, category, target_type, status, sender_id, business_id, \
                 town_id, segment, deeplink, image_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(&input.title)
            .bind(&input.body)
            .bind(&input.category)
            .bind(&input.target_type)
            .bind(NotificationStatus::Draft.as_str())
            .bind(input.sender_id)
            .bind(input.business_id)
            .bind(input.town_id)
            .bind(&input.segment)
            .bind(&input.deeplink)
            .bind(&input.image_url)
            .fetch_one(pool)
            .await
    }

    /// Find a notification by id.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Notification>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notifications WHERE id = $1");
        sqlx::query_as::<_, Notification>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// `draft -> sending`, recording the resolved audience size.
    pub async fn mark_sending(
        pool: &PgPool,
        id: DbId,
        audience_count: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET status = $2, audience_count = $3 \
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(NotificationStatus::Sending.as_str())
        .bind(audience_count)
        .bind(NotificationStatus::Draft.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `sending -> sent`, recording the delivered count and `sent_at = NOW()`.
    pub async fn mark_sent(
        pool: &PgPool,
        id: DbId,
        delivery_count: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET status = $2, delivery_count = $3, sent_at = NOW() \
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(NotificationStatus::Sent.as_str())
        .bind(delivery_count)
        .bind(NotificationStatus::Sending.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `draft | sending -> failed` with a human-readable reason.
    pub async fn mark_failed(
        pool: &PgPool,
        id: DbId,
        delivery_count: i32,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET status = $2, delivery_count = $3, failure_reason = $4 \
             WHERE id = $1 AND status IN ($5, $6)",
        )
        .bind(id)
        .bind(NotificationStatus::Failed.as_str())
        .bind(delivery_count)
        .bind(reason)
        .bind(NotificationStatus::Draft.as_str())
        .bind(NotificationStatus::Sending.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
