//! Atomic quota counters on `towns` and `businesses`.
//!
//! Every mutation is a single `UPDATE` so that concurrent senders serialize
//! on the row lock. The lazy monthly reset is folded into the same statement:
//! a counter whose `usage_resets_at` is before `month_start` is treated as 0,
//! so an increment racing a reset sweep always lands on the post-reset value.

use beacon_core::quota::{start_of_month, QuotaKind};
use beacon_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::quota_subject::QuotaCounter;

/// Column list for quota counter queries.
const COLUMNS: &str = "id, monthly_notification_limit, notification_usage, usage_resets_at";

/// Table holding the counter for a quota kind.
fn table(kind: QuotaKind) -> &'static str {
    match kind {
        QuotaKind::Business => "businesses",
        QuotaKind::Town => "towns",
    }
}

/// Atomic quota counter operations.
pub struct QuotaRepo;

impl QuotaRepo {
    /// Read the raw counter for a subject.
    pub async fn find(
        pool: &PgPool,
        kind: QuotaKind,
        id: DbId,
    ) -> Result<Option<QuotaCounter>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {} WHERE id = $1", table(kind));
        sqlx::query_as::<_, QuotaCounter>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Increment usage by one if the subject is still under its limit.
    ///
    /// Applies the lazy monthly reset in the same statement. Returns the
    /// updated counter, or `None` when the limit is already reached (or the
    /// subject does not exist).
    pub async fn try_increment(
        pool: &PgPool,
        kind: QuotaKind,
        id: DbId,
        now: Timestamp,
    ) -> Result<Option<QuotaCounter>, sqlx::Error> {
        let query = format!(
            "UPDATE {table} SET \
                notification_usage = CASE WHEN usage_resets_at < $2 THEN 1 \
                                          ELSE notification_usage + 1 END, \
                usage_resets_at = CASE WHEN usage_resets_at < $2 THEN $3 \
                                       ELSE usage_resets_at END \
             WHERE id = $1 \
               AND (monthly_notification_limit IS NULL \
                    OR (CASE WHEN usage_resets_at < $2 THEN 0 \
                             ELSE notification_usage END) < monthly_notification_limit) \
             RETURNING {COLUMNS}",
            table = table(kind),
        );
        sqlx::query_as::<_, QuotaCounter>(&query)
            .bind(id)
            .bind(start_of_month(now))
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Give back one unit taken by [`try_increment`](Self::try_increment).
    ///
    /// Floors at zero and does nothing if the counter has been reset since
    /// (the unit then belongs to a month that is already closed).
    pub async fn release(
        pool: &PgPool,
        kind: QuotaKind,
        id: DbId,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET notification_usage = GREATEST(notification_usage - 1, 0) \
             WHERE id = $1 AND usage_resets_at >= $2",
            table(kind),
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(start_of_month(now))
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Zero every counter of this kind that was last reset before the current
    /// month, stamping `usage_resets_at = now`. Idempotent.
    ///
    /// Returns the number of counters reset.
    pub async fn reset_stale(
        pool: &PgPool,
        kind: QuotaKind,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET notification_usage = 0, usage_resets_at = $2 \
             WHERE usage_resets_at < $1",
            table(kind),
        );
        let result = sqlx::query(&query)
            .bind(start_of_month(now))
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
