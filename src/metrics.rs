use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetMetrics {
    pub total_claims: u64,
    pub successful_claims: u64,
    pub rejected_claims: u64,
    /// Claim results keyed by response code.
    pub claims_by_code: BTreeMap<u16, u64>,
    /// Bullets dequeued by claims whose transaction then failed.
    pub bullets_lost: u64,
    pub refills_completed: u64,
    pub refills_skipped: u64,
    pub refills_failed: u64,
    pub bullets_created: u64,
    /// Unix seconds when the collector was created.
    pub started_at: u64,
}

impl Default for FaucetMetrics {
    fn default() -> Self {
        Self {
            total_claims: 0,
            successful_claims: 0,
            rejected_claims: 0,
            claims_by_code: BTreeMap::new(),
            bullets_lost: 0,
            refills_completed: 0,
            refills_skipped: 0,
            refills_failed: 0,
            bullets_created: 0,
            started_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<FaucetMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_claim(&self, code: u16) {
        let mut metrics = self.metrics.write().await;
        metrics.total_claims += 1;
        if code == 0 {
            metrics.successful_claims += 1;
        } else {
            metrics.rejected_claims += 1;
        }
        *metrics.claims_by_code.entry(code).or_default() += 1;
    }

    pub async fn record_lost_bullet(&self) {
        self.metrics.write().await.bullets_lost += 1;
    }

    pub async fn record_refill(&self, bullets: usize) {
        let mut metrics = self.metrics.write().await;
        metrics.refills_completed += 1;
        metrics.bullets_created += bullets as u64;
    }

    pub async fn record_refill_skipped(&self) {
        self.metrics.write().await.refills_skipped += 1;
    }

    pub async fn record_refill_failed(&self) {
        self.metrics.write().await.refills_failed += 1;
    }

    pub async fn snapshot(&self) -> FaucetMetrics {
        self.metrics.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claim_counters() {
        let collector = MetricsCollector::new();
        collector.record_claim(0).await;
        collector.record_claim(30).await;
        collector.record_claim(30).await;

        let snapshot = collector.snapshot().await;
        assert_eq!(snapshot.total_claims, 3);
        assert_eq!(snapshot.successful_claims, 1);
        assert_eq!(snapshot.rejected_claims, 2);
        assert_eq!(snapshot.claims_by_code.get(&30), Some(&2));
    }

    #[tokio::test]
    async fn test_refill_counters() {
        let collector = MetricsCollector::new();
        collector.record_refill(4).await;
        collector.record_refill_skipped().await;
        collector.record_refill_failed().await;
        collector.record_lost_bullet().await;

        let snapshot = collector.snapshot().await;
        assert_eq!(snapshot.refills_completed, 1);
        assert_eq!(snapshot.bullets_created, 4);
        assert_eq!(snapshot.refills_skipped, 1);
        assert_eq!(snapshot.refills_failed, 1);
        assert_eq!(snapshot.bullets_lost, 1);
    }
}
