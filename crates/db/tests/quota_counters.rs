//! Integration tests for the atomic quota counters.
//!
//! Requires a PostgreSQL instance reachable through `DATABASE_URL`; run with
//! `cargo test -p beacon-db -- --ignored`.

use beacon_core::quota::QuotaKind;
use beacon_db::repositories::QuotaRepo;
use chrono::{Duration, Utc};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_town(pool: &PgPool) -> i64 {
    sqlx::query_scalar("INSERT INTO towns (name) VALUES ('Harbor') RETURNING id")
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn insert_business(pool: &PgPool, limit: Option<i32>, usage: i32) -> i64 {
    let town_id = insert_town(pool).await;
    sqlx::query_scalar(
        "INSERT INTO businesses (town_id, name, category_label, monthly_notification_limit, \
         notification_usage) VALUES ($1, 'Dockside Cafe', 'cafe', $2, $3) RETURNING id",
    )
    .bind(town_id)
    .bind(limit)
    .bind(usage)
    .fetch_one(pool)
    .await
    .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn increment_refuses_when_limit_reached(pool: PgPool) {
    let id = insert_business(&pool, Some(2), 2).await;

    let result = QuotaRepo::try_increment(&pool, QuotaKind::Business, id, Utc::now())
        .await
        .unwrap();
    assert!(result.is_none());

    let counter = QuotaRepo::find(&pool, QuotaKind::Business, id).await.unwrap().unwrap();
    assert_eq!(counter.notification_usage, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn parallel_increments_lose_no_updates(pool: PgPool) {
    let id = insert_business(&pool, None, 0).await;

    let tasks = (0..25).map(|_| {
        let pool = pool.clone();
        tokio::spawn(async move {
            QuotaRepo::try_increment(&pool, QuotaKind::Business, id, Utc::now())
                .await
                .unwrap()
        })
    });
    for result in futures::future::join_all(tasks).await {
        assert!(result.unwrap().is_some());
    }

    let counter = QuotaRepo::find(&pool, QuotaKind::Business, id).await.unwrap().unwrap();
    assert_eq!(counter.notification_usage, 25);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn parallel_increments_never_exceed_limit(pool: PgPool) {
    let id = insert_business(&pool, Some(3), 0).await;

    let tasks = (0..10).map(|_| {
        let pool = pool.clone();
        tokio::spawn(async move {
            QuotaRepo::try_increment(&pool, QuotaKind::Business, id, Utc::now())
                .await
                .unwrap()
        })
    });
    let granted = futures::future::join_all(tasks)
        .await
        .into_iter()
        .filter(|r| r.as_ref().unwrap().is_some())
        .count();
    assert_eq!(granted, 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn increment_after_month_boundary_starts_from_zero(pool: PgPool) {
    let id = insert_business(&pool, Some(2), 2).await;
    sqlx::query("UPDATE businesses SET usage_resets_at = $2 WHERE id = $1")
        .bind(id)
        .bind(Utc::now() - Duration::days(40))
        .execute(&pool)
        .await
        .unwrap();

    let counter = QuotaRepo::try_increment(&pool, QuotaKind::Business, id, Utc::now())
        .await
        .unwrap()
        .expect("stale counter must be treated as reset");
    assert_eq!(counter.notification_usage, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn reset_sweep_is_idempotent(pool: PgPool) {
    let town_id = insert_town(&pool).await;
    sqlx::query("UPDATE towns SET notification_usage = 7, usage_resets_at = $2 WHERE id = $1")
        .bind(town_id)
        .bind(Utc::now() - Duration::days(40))
        .execute(&pool)
        .await
        .unwrap();

    let now = Utc::now();
    assert_eq!(QuotaRepo::reset_stale(&pool, QuotaKind::Town, now).await.unwrap(), 1);
    assert_eq!(QuotaRepo::reset_stale(&pool, QuotaKind::Town, now).await.unwrap(), 0);

    let counter = QuotaRepo::find(&pool, QuotaKind::Town, town_id).await.unwrap().unwrap();
    assert_eq!(counter.notification_usage, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn release_floors_at_zero(pool: PgPool) {
    let id = insert_business(&pool, Some(5), 0).await;

    QuotaRepo::release(&pool, QuotaKind::Business, id, Utc::now()).await.unwrap();

    let counter = QuotaRepo::find(&pool, QuotaKind::Business, id).await.unwrap().unwrap();
    assert_eq!(counter.notification_usage, 0);
}
