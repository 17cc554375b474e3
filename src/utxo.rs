use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FaucetResult;

/// One unspent transaction output the faucet is able to spend.
///
/// Stored as JSON in the shared store, so field names are part of the
/// persisted layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendableOutput {
    /// Transaction id in display (big-endian) hex.
    pub tx_id: String,
    pub output_index: u32,
    /// Value in the smallest unit.
    pub satoshis: u64,
    /// Hex-encoded locking script.
    pub script: String,
}

impl SpendableOutput {
    pub fn new(tx_id: impl Into<String>, output_index: u32, satoshis: u64, script: impl Into<String>) -> Self {
        Self {
            tx_id: tx_id.into(),
            output_index,
            satoshis,
            script: script.into(),
        }
    }

    /// `txid:vout` form used in logs.
    pub fn outpoint(&self) -> String {
        format!("{}:{}", self.tx_id, self.output_index)
    }

    pub fn to_json(&self) -> FaucetResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> FaucetResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl fmt::Display for SpendableOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} sat)", self.outpoint(), self.satoshis)
    }
}
