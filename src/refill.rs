use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bullet_queue::BulletQueue;
use crate::config::RefillSettings;
use crate::error::FaucetResult;
use crate::metrics::MetricsCollector;
use crate::pool::PoolState;
use crate::provider::NetworkClient;
use crate::store::KvStore;
use crate::utxo::SpendableOutput;
use crate::wallet::{Payment, TxBuilder};

/// Result of one refill cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefillOutcome {
    /// Queue depth was at or above the threshold.
    Sufficient { depth: usize },
    /// Another refill instance holds the pool lease.
    LeaseHeld,
    Refilled {
        tx_id: String,
        bullets: usize,
        /// New pool output; `None` when the split consumed the whole pool.
        pool: Option<SpendableOutput>,
    },
}

/// Background producer that splits the pool output into queued bullets.
pub struct RefillController {
    settings: RefillSettings,
    pool: PoolState,
    queue: BulletQueue,
    wallet: Arc<dyn TxBuilder>,
    provider: Arc<dyn NetworkClient>,
    store: Arc<dyn KvStore>,
    lease_key: String,
    metrics: MetricsCollector,
}

impl RefillController {
    pub fn new(
        settings: RefillSettings,
        pool: PoolState,
        queue: BulletQueue,
        wallet: Arc<dyn TxBuilder>,
        provider: Arc<dyn NetworkClient>,
        store: Arc<dyn KvStore>,
        lease_key: impl Into<String>,
    ) -> Self {
        Self {
            settings,
            pool,
            queue,
            wallet,
            provider,
            store,
            lease_key: lease_key.into(),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    /// Check depth and, when low, split the pool output once.
    pub async fn run_cycle(&self) -> FaucetResult<RefillOutcome> {
        let depth = self.queue.len().await?;
        if depth >= self.settings.bullets_threshold {
            debug!(depth, "Bullet queue above threshold");
            return Ok(RefillOutcome::Sufficient { depth });
        }

        let lease = match self.settings.lease_ttl {
            Some(ttl) => {
                let token = Uuid::new_v4().to_string();
                if !self.store.set_if_absent(&self.lease_key, &token, ttl).await? {
                    debug!("Refill lease held elsewhere");
                    return Ok(RefillOutcome::LeaseHeld);
                }
                Some(token)
            }
            None => None,
        };

        let result = self.refill(depth).await;

        if let Some(token) = lease {
            if let Err(e) = self.store.delete_if_equals(&self.lease_key, &token).await {
                warn!(error = %e, "Failed to release refill lease");
            }
        }
        result
    }

    async fn refill(&self, depth: usize) -> FaucetResult<RefillOutcome> {
        let pool_output = self.pool.get().await?;
        info!(depth, pool = %pool_output, "Refilling bullets");

        let owner = self.wallet.address().clone();
        let payments = vec![
            Payment::new(owner.clone(), self.settings.bullet_satoshis);
            self.settings.bullets_per_round
        ];
        let built = self.wallet.build(&pool_output, &payments, &owner)?;

        let reported = self.provider.broadcast(&built.raw_hex).await?;
        info!(txid = %built.tx_id, reported = %reported, "Split transaction broadcast");

        let (pool_updated, queue_updated) = tokio::join!(
            self.pool.set(built.change.as_ref()),
            self.queue.enqueue_many(&built.outputs)
        );
        if pool_updated.is_err() || queue_updated.is_err() {
            error!(
                txid = %built.tx_id,
                change = ?built.change,
                bullets = ?built.outputs,
                "Split transaction broadcast but state update failed, manual recovery required"
            );
        }
        pool_updated?;
        queue_updated?;

        match &built.change {
            Some(change) => info!(
                bullets = built.outputs.len(),
                pool = %change,
                "Injected bullets, pool output updated"
            ),
            None => warn!(
                bullets = built.outputs.len(),
                "Injected bullets, pool exhausted and cleared"
            ),
        }

        Ok(RefillOutcome::Refilled {
            tx_id: built.tx_id,
            bullets: built.outputs.len(),
            pool: built.change,
        })
    }

    /// Run cycles every `interval` until `shutdown` flips to `true` or its
    /// sender goes away. Cycle errors are logged and never end the loop.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            threshold = self.settings.bullets_threshold,
            per_round = self.settings.bullets_per_round,
            "Bullet refill daemon started"
        );

        while !*shutdown.borrow() {
            match self.run_cycle().await {
                Ok(RefillOutcome::Refilled { bullets, .. }) => {
                    self.metrics.record_refill(bullets).await
                }
                Ok(_) => self.metrics.record_refill_skipped().await,
                Err(e) => {
                    error!(error = %e, "Error preparing bullets");
                    self.metrics.record_refill_failed().await;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Bullet refill daemon stopped");
    }
}
