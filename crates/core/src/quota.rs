//! Monthly notification quota arithmetic.
//!
//! Usage counters are reset lazily: a subject whose `usage_resets_at` is
//! before the first instant of the current calendar month (UTC) is treated as
//! having used nothing. The same predicate is used by the storage layer's
//! atomic increment and by the monthly reset sweep.

use chrono::{Datelike, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Which kind of entity a quota counter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    Business,
    Town,
}

impl QuotaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Town => "town",
        }
    }

    /// Entity name used in not-found errors.
    pub fn entity(self) -> &'static str {
        match self {
            Self::Business => "Business",
            Self::Town => "Town",
        }
    }
}

/// Result of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub allowed: bool,
    pub used: i32,
    /// `None` means unlimited.
    pub limit: Option<i32>,
    /// `None` when unlimited.
    pub remaining: Option<i32>,
}

/// Evaluate a counter against a nullable limit.
pub fn check_quota(limit: Option<i32>, used: i32) -> QuotaStatus {
    let used = used.max(0);
    match limit {
        None => QuotaStatus {
            allowed: true,
            used,
            limit: None,
            remaining: None,
        },
        Some(limit) => QuotaStatus {
            allowed: used < limit,
            used,
            limit: Some(limit),
            remaining: Some(limit.saturating_sub(used).max(0)),
        },
    }
}

/// First instant of the calendar month containing `now`.
pub fn start_of_month(now: Timestamp) -> Timestamp {
    let date = now.date_naive();
    let first = date.with_day(1).unwrap_or(date);
    first.and_time(NaiveTime::MIN).and_utc()
}

/// Whether a counter last reset at `usage_resets_at` belongs to a past month.
pub fn needs_reset(usage_resets_at: Timestamp, now: Timestamp) -> bool {
    usage_resets_at < start_of_month(now)
}

/// The usage value a check should see, applying the lazy monthly reset.
pub fn effective_usage(usage: i32, usage_resets_at: Timestamp, now: Timestamp) -> i32 {
    if needs_reset(usage_resets_at, now) {
        0
    } else {
        usage.max(0)
    }
}
