//! Monthly quota rollover.
//!
//! Usage counters are also reset lazily when a quota is read or reserved;
//! this sweep catches businesses and towns that stop sending mid-month so
//! their stored counters do not stay stale.

use std::time::Duration;

use beacon_engine::QuotaTracker;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

/// Run the quota reset loop until `cancel` is triggered.
///
/// The first sweep runs immediately.
pub async fn run(quota: QuotaTracker, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Quota reset job started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Quota reset job stopping");
                break;
            }
            _ = interval.tick() => {
                match quota.reset_stale(Utc::now()).await {
                    Ok((businesses, towns)) if businesses + towns > 0 => {
                        tracing::info!(businesses, towns, "Quota reset: rolled over stale counters");
                    }
                    Ok(_) => {
                        tracing::debug!("Quota reset: nothing to roll over");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Quota reset: sweep failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use beacon_core::quota::QuotaKind;
    use beacon_engine::store::memory::MemoryStore;
    use chrono::Duration as ChronoDuration;

    use super::*;

    #[tokio::test]
    async fn first_tick_resets_stale_counters_then_stops_on_cancel() {
        let store = Arc::new(MemoryStore::new());
        store.add_town(1, 0, Some(10), 7);
        store.set_usage_resets_at(QuotaKind::Town, 1, Utc::now() - ChronoDuration::days(40));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            QuotaTracker::new(store.clone()),
            Duration::from_secs(3600),
            cancel.clone(),
        ));

        // The immediate first tick performs the sweep.
        for _ in 0..50 {
            if store.usage(QuotaKind::Town, 1) == Some(0) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.usage(QuotaKind::Town, 1), Some(0));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("job stops on cancel")
            .unwrap();
    }
}
