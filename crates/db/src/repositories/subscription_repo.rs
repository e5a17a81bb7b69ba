//! Repository for the `business_subscriptions` table.

use beacon_core::types::DbId;
use sqlx::PgPool;

/// Read access to business subscriptions.
pub struct SubscriptionRepo;

impl SubscriptionRepo {
    /// User ids with an active subscription to the business.
    pub async fn list_active_subscriber_ids(
        pool: &PgPool,
        business_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT user_id FROM business_subscriptions \
             WHERE business_id = $1 AND is_active = true \
             ORDER BY user_id",
        )
        .bind(business_id)
        .fetch_all(pool)
        .await
    }
}
