//! Legacy (pre-segwit) transaction assembly and fee sizing.

use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use std::str::FromStr;

use crate::error::{FaucetError, FaucetResult};
use crate::utxo::SpendableOutput;

/// Smallest output value relayed for a P2PKH output.
pub const DUST_LIMIT: u64 = 546;

/// Largest P2PKH unlocking script for a compressed key: a push of a low-S
/// DER signature plus sighash byte (1 + 72) and a push of the key (1 + 33).
pub const P2PKH_SCRIPT_SIG_MAX: usize = 107;

pub fn outpoint(output: &SpendableOutput) -> FaucetResult<OutPoint> {
    let txid = Txid::from_str(&output.tx_id)
        .map_err(|e| FaucetError::Transaction(format!("bad txid {}: {}", output.tx_id, e)))?;
    Ok(OutPoint::new(txid, output.output_index))
}

pub fn pay_to(script_pubkey: ScriptBuf, satoshis: u64) -> TxOut {
    TxOut {
        value: Amount::from_sat(satoshis),
        script_pubkey,
    }
}

/// Version 2 transaction spending `input` with an empty unlocking script.
pub fn unsigned_spend(input: &SpendableOutput, outputs: Vec<TxOut>) -> FaucetResult<Transaction> {
    Ok(Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: outpoint(input)?,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: outputs,
    })
}

/// Upper bound on the signed size of `tx`, assuming every input is still
/// unsigned and will carry a compressed-key P2PKH unlocking script.
pub fn estimate_size(tx: &Transaction) -> usize {
    tx.total_size() + tx.input.len() * P2PKH_SCRIPT_SIG_MAX
}

/// Fee at a flat rate in satoshis per byte, rounded up.
pub fn fee_for(fee_rate: f64, size: usize) -> u64 {
    (fee_rate * size as f64).ceil() as u64
}
