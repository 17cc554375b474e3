use std::sync::Arc;

use crate::error::FaucetResult;
use crate::store::KvStore;
use crate::utxo::SpendableOutput;

/// FIFO of pre-split outputs, kept in a store list.
///
/// `dequeue_one` relies on the store's atomic pop, so any number of
/// concurrent claims can race on it without ever sharing a bullet.
#[derive(Clone)]
pub struct BulletQueue {
    store: Arc<dyn KvStore>,
    key: String,
}

impl BulletQueue {
    pub fn new(store: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Append `outputs` to the tail, preserving their order. Returns the new depth.
    pub async fn enqueue_many(&self, outputs: &[SpendableOutput]) -> FaucetResult<usize> {
        let encoded = outputs
            .iter()
            .map(SpendableOutput::to_json)
            .collect::<FaucetResult<Vec<_>>>()?;
        self.store.push_back(&self.key, &encoded).await
    }

    /// Pop the head bullet, if any.
    pub async fn dequeue_one(&self) -> FaucetResult<Option<SpendableOutput>> {
        match self.store.pop_front(&self.key).await? {
            Some(raw) => Ok(Some(SpendableOutput::from_json(&raw)?)),
            None => Ok(None),
        }
    }

    /// Advisory depth; may be stale by the time the caller acts on it.
    pub async fn len(&self) -> FaucetResult<usize> {
        self.store.list_len(&self.key).await
    }

    pub async fn is_empty(&self) -> FaucetResult<bool> {
        Ok(self.len().await? == 0)
    }
}
