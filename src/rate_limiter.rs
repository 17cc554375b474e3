use std::sync::Arc;
use std::time::Duration;

use crate::error::{FaucetError, FaucetResult};
use crate::store::KvStore;

/// Lifetime of a daily counter, measured from its first increment.
pub const DAILY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Fixed-expiry daily counters kept in the shared store.
///
/// A counter is created with a 24h TTL on first use and simply expires; later
/// increments never extend it.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Current usage recorded for `key`.
    pub async fn count(&self, key: &str) -> FaucetResult<u64> {
        match self.store.get(key).await? {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                FaucetError::Store(format!("Counter {} holds a non-numeric value", key))
            }),
            None => Ok(0),
        }
    }

    /// Returns `true` when `key` has already reached `limit`. Read-only.
    pub async fn check(&self, key: &str, limit: u32) -> FaucetResult<bool> {
        Ok(self.count(key).await? >= u64::from(limit))
    }

    /// Record one unit of usage for `key`, returning the new count.
    pub async fn record(&self, key: &str) -> FaucetResult<i64> {
        self.store.incr_with_expiry(key, DAILY_WINDOW).await
    }
}
