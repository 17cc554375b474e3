use std::sync::Arc;

use crate::address::Address;
use crate::error::{FaucetError, FaucetResult};
use crate::provider::NetworkClient;
use crate::store::KvStore;
use crate::utxo::SpendableOutput;

/// The single funding output earmarked for splitting.
///
/// Only the refill controller writes it, so there is no locking here.
#[derive(Clone)]
pub struct PoolState {
    store: Arc<dyn KvStore>,
    key: String,
    provider: Arc<dyn NetworkClient>,
    owner: Address,
}

impl PoolState {
    pub fn new(
        store: Arc<dyn KvStore>,
        key: impl Into<String>,
        provider: Arc<dyn NetworkClient>,
        owner: Address,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            provider,
            owner,
        }
    }

    /// Stored pool output, without falling back to discovery.
    pub async fn peek(&self) -> FaucetResult<Option<SpendableOutput>> {
        match self.store.get(&self.key).await? {
            Some(raw) => Ok(Some(SpendableOutput::from_json(&raw)?)),
            None => Ok(None),
        }
    }

    /// Stored pool output, or the owner's only unspent output when nothing is
    /// stored yet. Discovery requires exactly one candidate.
    pub async fn get(&self) -> FaucetResult<SpendableOutput> {
        if let Some(output) = self.peek().await? {
            return Ok(output);
        }

        let mut candidates = self.provider.list_unspent(&self.owner).await?;
        if candidates.len() != 1 {
            tracing::error!(
                owner = %self.owner,
                found = candidates.len(),
                "Pool discovery needs exactly one unspent output"
            );
            return Err(FaucetError::PoolDiscovery {
                found: candidates.len(),
            });
        }

        let output = candidates.remove(0);
        self.store.set(&self.key, &output.to_json()?).await?;
        tracing::info!(outpoint = %output.outpoint(), satoshis = output.satoshis, "Discovered pool output");
        Ok(output)
    }

    /// Replace the stored pool output, or clear it.
    pub async fn set(&self, output: Option<&SpendableOutput>) -> FaucetResult<()> {
        match output {
            Some(output) => self.store.set(&self.key, &output.to_json()?).await,
            None => self.store.delete(&self.key).await.map(|_| ()),
        }
    }
}
