//! Per-request claim pipeline.
//!
//! validate address -> address limit -> IP limit -> pop bullet -> build and
//! broadcast -> record usage. The first failing step short-circuits. Steps
//! before the pop mutate nothing; once a bullet is popped it is never put
//! back, even if the transaction fails.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::address::Address;
use crate::bullet_queue::BulletQueue;
use crate::config::ClaimSettings;
use crate::error::{FaucetError, FaucetResult};
use crate::key_generator::{KeyGenerator, RateScope};
use crate::metrics::MetricsCollector;
use crate::provider::NetworkClient;
use crate::rate_limiter::RateLimiter;
use crate::utxo::SpendableOutput;
use crate::wallet::TxBuilder;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimReceipt {
    pub tx_id: String,
    pub raw_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimRejection {
    #[error("captcha validation failed")]
    CaptchaFailed,
    #[error("invalid address")]
    InvalidAddress,
    #[error("limit exceeded for this address")]
    AddressLimitExceeded,
    #[error("limit exceeded for this ip")]
    IpLimitExceeded,
    #[error("no available utxo")]
    NoAvailableOutput,
    #[error("{0}")]
    Internal(String),
}

impl ClaimRejection {
    pub fn code(&self) -> u16 {
        match self {
            ClaimRejection::CaptchaFailed => 10,
            ClaimRejection::InvalidAddress => 20,
            ClaimRejection::AddressLimitExceeded => 30,
            ClaimRejection::IpLimitExceeded => 31,
            ClaimRejection::NoAvailableOutput => 40,
            ClaimRejection::Internal(_) => 90,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ClaimRejection::Internal(msg) if msg.is_empty() => "unknown exception".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<FaucetError> for ClaimRejection {
    fn from(err: FaucetError) -> Self {
        ClaimRejection::Internal(err.to_string())
    }
}

pub type ClaimResult = Result<ClaimReceipt, ClaimRejection>;

pub struct ClaimHandler {
    settings: ClaimSettings,
    keys: KeyGenerator,
    limiter: RateLimiter,
    queue: BulletQueue,
    wallet: Arc<dyn TxBuilder>,
    provider: Arc<dyn NetworkClient>,
    metrics: MetricsCollector,
}

impl ClaimHandler {
    pub fn new(
        settings: ClaimSettings,
        keys: KeyGenerator,
        limiter: RateLimiter,
        queue: BulletQueue,
        wallet: Arc<dyn TxBuilder>,
        provider: Arc<dyn NetworkClient>,
    ) -> Self {
        Self {
            settings,
            keys,
            limiter,
            queue,
            wallet,
            provider,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn settings(&self) -> &ClaimSettings {
        &self.settings
    }

    /// Dispense one bullet to `addr`, attributing the claim to `client_ip`.
    pub async fn claim(&self, addr: Option<&str>, client_ip: Option<&str>) -> ClaimResult {
        let result = self.run(addr, client_ip).await;
        let code = match &result {
            Ok(_) => 0,
            Err(rejection) => rejection.code(),
        };
        self.metrics.record_claim(code).await;
        result
    }

    async fn run(&self, addr: Option<&str>, client_ip: Option<&str>) -> ClaimResult {
        let addr = addr.map(str::trim).unwrap_or_default();
        let recipient = Address::parse(self.settings.network, addr)
            .map_err(|_| ClaimRejection::InvalidAddress)?;

        let addr_key = self.keys.limit_key(RateScope::Address, addr);
        if self
            .limiter
            .check(&addr_key, self.settings.limit_per_addr_per_day)
            .await?
        {
            info!(addr, "Limit exceeded for address");
            return Err(ClaimRejection::AddressLimitExceeded);
        }

        let ip_key = match client_ip {
            Some(ip) if self.settings.should_check_ip(Some(ip)) => {
                Some(self.keys.limit_key(RateScope::Ip, ip))
            }
            _ => None,
        };
        if let Some(key) = &ip_key {
            if self
                .limiter
                .check(key, self.settings.limit_per_ip_per_day)
                .await?
            {
                info!(ip = client_ip.unwrap_or_default(), "Limit exceeded for ip");
                return Err(ClaimRejection::IpLimitExceeded);
            }
        }

        let bullet = match self.queue.dequeue_one().await? {
            Some(bullet) => bullet,
            None => {
                info!("No available bullets to dispense");
                return Err(ClaimRejection::NoAvailableOutput);
            }
        };

        let spend = self.spend(&bullet, &recipient);
        let receipt = match tokio::time::timeout(self.settings.timeout, spend).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => return Err(self.lose_bullet(&bullet, e).await),
            Err(_) => {
                let e = FaucetError::Timeout(self.settings.timeout.as_secs());
                return Err(self.lose_bullet(&bullet, e).await);
            }
        };
        info!(txid = %receipt.tx_id, addr, "Claim transaction broadcast");

        let (addr_recorded, ip_recorded) = tokio::join!(self.limiter.record(&addr_key), async {
            match &ip_key {
                Some(key) => self.limiter.record(key).await.map(Some),
                None => Ok(None),
            }
        });
        // the payment is already on the network, so a failed write only loses accounting
        for (scope, recorded) in [("address", addr_recorded.map(Some)), ("ip", ip_recorded)] {
            if let Err(e) = recorded {
                warn!(scope, error = %e, "Failed to record claim usage");
            }
        }

        Ok(receipt)
    }

    async fn spend(
        &self,
        bullet: &SpendableOutput,
        recipient: &Address,
    ) -> FaucetResult<ClaimReceipt> {
        let built = self.wallet.build(bullet, &[], recipient)?;
        let reported = self.provider.broadcast(&built.raw_hex).await?;

        let tx_id = if reported.is_empty() {
            built.tx_id
        } else {
            if reported != built.tx_id {
                warn!(
                    reported = %reported,
                    computed = %built.tx_id,
                    "Broadcast returned a different txid"
                );
            }
            reported
        };

        Ok(ClaimReceipt {
            tx_id,
            raw_hex: built.raw_hex,
        })
    }

    async fn lose_bullet(&self, bullet: &SpendableOutput, err: FaucetError) -> ClaimRejection {
        warn!(
            outpoint = %bullet.outpoint(),
            satoshis = bullet.satoshis,
            error = %err,
            "Claim transaction failed, bullet is not requeued"
        );
        self.metrics.record_lost_bullet().await;
        ClaimRejection::from(err)
    }
}
