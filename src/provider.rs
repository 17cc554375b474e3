use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::address::Address;
use crate::error::{FaucetError, FaucetResult};
use crate::utxo::SpendableOutput;

/// Chain access the faucet needs: discover unspent outputs and broadcast.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn list_unspent(&self, address: &Address) -> FaucetResult<Vec<SpendableOutput>>;

    /// Submit a raw transaction, returning the txid reported by the network.
    async fn broadcast(&self, raw_hex: &str) -> FaucetResult<String>;
}

#[derive(Debug, Deserialize)]
struct UtxoEntry {
    txid: String,
    vout: u32,
    value: u64,
}

/// Client for a mempool.space-compatible REST API.
pub struct MempoolProvider {
    base_url: String,
    client: reqwest::Client,
}

impl MempoolProvider {
    pub fn new(base_url: impl Into<String>) -> FaucetResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl NetworkClient for MempoolProvider {
    async fn list_unspent(&self, address: &Address) -> FaucetResult<Vec<SpendableOutput>> {
        let url = format!("{}/address/{}/utxo", self.base_url, address);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FaucetError::Provider(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FaucetError::Provider(format!("{} returned {}: {}", url, status, body)));
        }

        let entries: Vec<UtxoEntry> = response
            .json()
            .await
            .map_err(|e| FaucetError::Provider(format!("Invalid utxo response: {}", e)))?;

        let script = hex::encode(address.script_pubkey().as_bytes());
        Ok(entries
            .into_iter()
            .map(|entry| SpendableOutput::new(entry.txid, entry.vout, entry.value, script.clone()))
            .collect())
    }

    async fn broadcast(&self, raw_hex: &str) -> FaucetResult<String> {
        let url = format!("{}/tx", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(raw_hex.to_string())
            .send()
            .await
            .map_err(|e| FaucetError::Broadcast(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FaucetError::Broadcast(format!("Unreadable response: {}", e)))?;

        if !status.is_success() {
            return Err(FaucetError::Broadcast(format!("{}: {}", status, body.trim())));
        }

        Ok(body.trim().to_string())
    }
}
