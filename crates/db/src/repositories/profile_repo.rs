//! Repository for the `profiles` table.

use beacon_core::types::DbId;
use sqlx::PgPool;

use crate::models::profile::Profile;

/// Column list for `profiles` queries.
const COLUMNS: &str = "user_id, town_id, notification_preferences, created_at, updated_at";

/// Provides profile lookups and preference persistence.
pub struct ProfileRepo;

impl ProfileRepo {
    /// List every profile scoped to a town.
    pub async fn list_for_town(pool: &PgPool, town_id: DbId) -> Result<Vec<Profile>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM profiles \
             WHERE town_id = $1 \
             ORDER BY user_id"
        );
        sqlx::query_as::<_, Profile>(&query)
            .bind(town_id)
            .fetch_all(pool)
            .await
    }

    /// Find a profile by its user id.
    pub async fn find_by_user(pool: &PgPool, user_id: DbId) -> Result<Option<Profile>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM profiles WHERE user_id = $1");
        sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Overwrite the stored preference blob.
    ///
    /// Returns `false` if the user has no profile.
    pub async fn update_preferences(
        pool: &PgPool,
        user_id: DbId,
        preferences: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE profiles SET notification_preferences = $2, updated_at = NOW() \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(preferences)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
