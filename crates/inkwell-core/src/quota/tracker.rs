//! Daily unit quota per user.
//!
//! Usage is a per-user counter keyed by UTC date, expiring at the next
//! UTC midnight so the allowance resets without any scheduled job. The
//! gating check fails closed when the store is unreachable (a retry
//! message beats unmetered generation); pure reads fail open to zero
//! because they gate nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use inkwell_types::chat::QuotaDecision;
use inkwell_types::config::QuotaLimits;
use inkwell_types::error::StoreError;

use crate::storage::ExpiringKvStore;

fn usage_key(user_id: &str, date: NaiveDate) -> String {
    format!("chat:units:{user_id}:{}", date.format("%Y-%m-%d"))
}

/// Seconds from `now` until the next UTC midnight, floored at one second.
fn ttl_until_midnight(now: DateTime<Utc>) -> Duration {
    let next_midnight = (now.date_naive() + chrono::Days::new(1))
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now);
    let secs = (next_midnight - now).num_seconds().max(1) as u64;
    Duration::from_secs(secs)
}

/// Tracks per-user daily unit consumption behind an [`ExpiringKvStore`].
pub struct QuotaTracker<K> {
    kv: Arc<K>,
    limits: QuotaLimits,
}

impl<K: ExpiringKvStore> QuotaTracker<K> {
    pub fn new(kv: Arc<K>, limits: QuotaLimits) -> Self {
        Self { kv, limits }
    }

    /// Daily allowance in units.
    pub fn daily_limit(&self) -> u64 {
        self.limits.daily_unit_limit()
    }

    /// Gate a request against today's allowance. Fails closed on store
    /// errors.
    pub async fn check(&self, user_id: &str) -> Result<QuotaDecision, StoreError> {
        let used = self.read_usage(user_id).await?;
        let limit = self.daily_limit();
        Ok(QuotaDecision {
            can_use: used < limit,
            current_usage: used,
            limit,
        })
    }

    /// Today's consumed units, for display. Fails open to zero.
    pub async fn usage(&self, user_id: &str) -> u64 {
        match self.read_usage(user_id).await {
            Ok(used) => used,
            Err(err) => {
                warn!(user_id, %err, "quota read failed, reporting zero usage");
                0
            }
        }
    }

    /// Add consumed units to today's counter and return the new total.
    ///
    /// The counter's expiry is anchored at the next UTC midnight by its
    /// first increment of the day.
    pub async fn record(&self, user_id: &str, units: u64) -> Result<u64, StoreError> {
        if units == 0 {
            return self.read_usage(user_id).await;
        }
        let now = Utc::now();
        self.kv
            .incr_by_ex(
                &usage_key(user_id, now.date_naive()),
                units,
                ttl_until_midnight(now),
            )
            .await
    }

    async fn read_usage(&self, user_id: &str) -> Result<u64, StoreError> {
        let key = usage_key(user_id, Utc::now().date_naive());
        let raw = self.kv.get(&key).await?;
        Ok(raw.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FailingKvStore, MemoryKvStore};

    fn tracker() -> QuotaTracker<MemoryKvStore> {
        QuotaTracker::new(Arc::new(MemoryKvStore::new()), QuotaLimits::default())
    }

    #[tokio::test]
    async fn test_fresh_user_is_under_quota() {
        let tracker = tracker();
        let decision = tracker.check("u1").await.unwrap();
        assert!(decision.can_use);
        assert_eq!(decision.current_usage, 0);
        assert_eq!(decision.limit, 6_000);
    }

    #[tokio::test]
    async fn test_record_accumulates() {
        let tracker = tracker();
        assert_eq!(tracker.record("u1", 100).await.unwrap(), 100);
        assert_eq!(tracker.record("u1", 250).await.unwrap(), 350);
        assert_eq!(tracker.usage("u1").await, 350);
    }

    #[tokio::test]
    async fn test_exceeded_quota_blocks() {
        let limits = QuotaLimits {
            free_daily_words: 10,
        };
        let tracker = QuotaTracker::new(Arc::new(MemoryKvStore::new()), limits);
        tracker.record("u1", 15).await.unwrap();
        let decision = tracker.check("u1").await.unwrap();
        assert!(!decision.can_use);
        assert_eq!(decision.current_usage, 15);
        assert_eq!(decision.limit, 15);
    }

    #[tokio::test]
    async fn test_check_fails_closed_on_store_error() {
        let tracker = QuotaTracker::new(Arc::new(FailingKvStore), QuotaLimits::default());
        assert!(tracker.check("u1").await.is_err());
    }

    #[tokio::test]
    async fn test_usage_fails_open_on_store_error() {
        let tracker = QuotaTracker::new(Arc::new(FailingKvStore), QuotaLimits::default());
        assert_eq!(tracker.usage("u1").await, 0);
    }

    #[tokio::test]
    async fn test_quota_is_per_user() {
        let tracker = tracker();
        tracker.record("u1", 500).await.unwrap();
        assert_eq!(tracker.usage("u2").await, 0);
    }

    #[test]
    fn test_usage_key_is_date_scoped() {
        let d1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(usage_key("u1", d1), "chat:units:u1:2026-03-01");
        assert_ne!(usage_key("u1", d1), usage_key("u1", d2));
    }

    #[test]
    fn test_ttl_until_midnight() {
        let now = "2026-03-01T23:59:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(ttl_until_midnight(now), Duration::from_secs(60));

        let midnight = "2026-03-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(ttl_until_midnight(midnight), Duration::from_secs(86_400));
    }
}
