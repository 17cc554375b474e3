//! Transaction building and signing capability.
//!
//! The faucet only needs one shape of transaction: spend a single output the
//! faucet owns, pay a list of recipients and return any remainder as change.
//! `TxBuilder` is that capability; `P2pkhWallet` implements it with a local
//! compressed secp256k1 key.

use bitcoin::consensus::encode::serialize_hex;
use bitcoin::ecdsa;
use bitcoin::hashes::Hash as _;
use bitcoin::secp256k1::{Message, Secp256k1, SignOnly};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{PrivateKey, PublicKey, Script, ScriptBuf, Transaction, TxOut};
use serde::Serialize;

use crate::address::{Address, Network};
use crate::error::{FaucetError, FaucetResult};
use crate::transaction::{estimate_size, fee_for, pay_to, unsigned_spend, DUST_LIMIT};
use crate::utxo::SpendableOutput;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub address: Address,
    pub satoshis: u64,
}

impl Payment {
    pub fn new(address: Address, satoshis: u64) -> Self {
        Self { address, satoshis }
    }
}

/// A signed, broadcastable transaction together with the outputs it creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltTransaction {
    pub tx_id: String,
    pub raw_hex: String,
    /// One entry per payment, in payment order.
    pub outputs: Vec<SpendableOutput>,
    /// Remainder returned to the change address, when above dust.
    pub change: Option<SpendableOutput>,
}

pub trait TxBuilder: Send + Sync {
    /// Address owning every output this builder can spend.
    fn address(&self) -> &Address;

    fn build(
        &self,
        input: &SpendableOutput,
        payments: &[Payment],
        change_to: &Address,
    ) -> FaucetResult<BuiltTransaction>;
}

pub struct P2pkhWallet {
    secp: Secp256k1<SignOnly>,
    private_key: PrivateKey,
    public_key: PublicKey,
    address: Address,
    fee_rate: f64,
}

impl P2pkhWallet {
    /// Fee sizing assumes a 33-byte public key in every unlocking script, so
    /// keys flagged uncompressed are refused.
    pub fn from_wif(network: Network, wif: &str, fee_rate: f64) -> FaucetResult<Self> {
        let private_key = PrivateKey::from_wif(wif.trim())
            .map_err(|e| FaucetError::InvalidKey(e.to_string()))?;
        if private_key.network != network.kind() {
            return Err(FaucetError::InvalidKey(format!("key is not for {}", network)));
        }
        if !private_key.compressed {
            return Err(FaucetError::InvalidKey("uncompressed keys are not supported".into()));
        }

        let secp = Secp256k1::signing_only();
        let public_key = private_key.public_key(&secp);
        let address = Address::from_public_key(network, &public_key);

        Ok(Self {
            secp,
            private_key,
            public_key,
            address,
            fee_rate,
        })
    }

    fn sign_input(
        &self,
        tx: &mut Transaction,
        index: usize,
        script_code: &Script,
    ) -> FaucetResult<()> {
        let sighash = SighashCache::new(&*tx)
            .legacy_signature_hash(index, script_code, EcdsaSighashType::All.to_u32())
            .map_err(|e| FaucetError::Transaction(format!("sighash failed: {}", e)))?;
        let message = Message::from_digest(sighash.to_byte_array());
        let signature = ecdsa::Signature::sighash_all(
            self.secp.sign_ecdsa(&message, &self.private_key.inner),
        );

        tx.input[index].script_sig = ScriptBuf::builder()
            .push_slice(signature.serialize())
            .push_key(&self.public_key)
            .into_script();
        Ok(())
    }

    fn fee(&self, input: &SpendableOutput, outputs: Vec<TxOut>) -> FaucetResult<u64> {
        let tx = unsigned_spend(input, outputs)?;
        Ok(fee_for(self.fee_rate, estimate_size(&tx)))
    }
}

impl TxBuilder for P2pkhWallet {
    fn address(&self) -> &Address {
        &self.address
    }

    fn build(
        &self,
        input: &SpendableOutput,
        payments: &[Payment],
        change_to: &Address,
    ) -> FaucetResult<BuiltTransaction> {
        let own_script = self.address.script_pubkey();
        if !input.script.is_empty() && input.script != hex::encode(own_script.as_bytes()) {
            return Err(FaucetError::Transaction(format!(
                "{} is not locked to {}",
                input.outpoint(),
                self.address
            )));
        }
        if let Some(small) = payments.iter().find(|p| p.satoshis < DUST_LIMIT) {
            return Err(FaucetError::Transaction(format!(
                "payment of {} to {} is below dust",
                small.satoshis, small.address
            )));
        }

        let paid = payments
            .iter()
            .try_fold(0u64, |acc, p| acc.checked_add(p.satoshis))
            .ok_or_else(|| FaucetError::Transaction("payment total overflows".into()))?;

        let mut outputs: Vec<TxOut> = payments
            .iter()
            .map(|p| pay_to(p.address.script_pubkey(), p.satoshis))
            .collect();
        let fee_without_change = self.fee(input, outputs.clone())?;
        let mut with_change = outputs.clone();
        with_change.push(pay_to(change_to.script_pubkey(), 0));
        let fee_with_change = self.fee(input, with_change)?;

        let change_value = input
            .satoshis
            .checked_sub(paid)
            .and_then(|rest| rest.checked_sub(fee_with_change))
            .filter(|rest| *rest >= DUST_LIMIT);

        if change_value.is_none() {
            let required = if payments.is_empty() {
                fee_with_change + DUST_LIMIT
            } else {
                paid + fee_without_change
            };
            if payments.is_empty() || input.satoshis < required {
                return Err(FaucetError::InsufficientFunds {
                    available: input.satoshis,
                    required,
                });
            }
        }

        if let Some(value) = change_value {
            outputs.push(pay_to(change_to.script_pubkey(), value));
        }

        let mut tx = unsigned_spend(input, outputs)?;
        self.sign_input(&mut tx, 0, &own_script)?;

        let tx_id = tx.compute_txid().to_string();
        let mut created: Vec<SpendableOutput> = tx
            .output
            .iter()
            .enumerate()
            .map(|(index, out)| {
                SpendableOutput::new(
                    tx_id.clone(),
                    index as u32,
                    out.value.to_sat(),
                    hex::encode(out.script_pubkey.as_bytes()),
                )
            })
            .collect();
        let change = change_value.and_then(|_| created.pop());

        Ok(BuiltTransaction {
            raw_hex: serialize_hex(&tx),
            tx_id,
            outputs: created,
            change,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::consensus::encode::deserialize;
    use bitcoin::hashes::Hash as _;
    use bitcoin::script::Instruction;
    use bitcoin::secp256k1::SecretKey;
    use bitcoin::NetworkKind;

    fn secret() -> SecretKey {
        SecretKey::from_slice(&[7u8; 32]).unwrap()
    }

    fn wallet() -> P2pkhWallet {
        let wif = PrivateKey::new(secret(), NetworkKind::Test).to_wif();
        P2pkhWallet::from_wif(Network::Testnet, &wif, 1.0).unwrap()
    }

    fn owned_output(wallet: &P2pkhWallet, satoshis: u64) -> SpendableOutput {
        SpendableOutput::new(
            format!("{:064x}", 42),
            0,
            satoshis,
            hex::encode(wallet.address().script_pubkey().as_bytes()),
        )
    }

    fn recipient() -> Address {
        Address::from_pubkey_hash(Network::Testnet, [9u8; 20])
    }

    fn decode(built: &BuiltTransaction) -> Transaction {
        deserialize(&hex::decode(&built.raw_hex).unwrap()).unwrap()
    }

    #[test]
    fn test_split_produces_bullets_and_change() {
        let wallet = wallet();
        let pool = owned_output(&wallet, 1_000_000);
        let payments = vec![Payment::new(wallet.address().clone(), 10_000); 3];

        let built = wallet.build(&pool, &payments, wallet.address()).unwrap();

        assert_eq!(built.outputs.len(), 3);
        for (i, bullet) in built.outputs.iter().enumerate() {
            assert_eq!(bullet.output_index, i as u32);
            assert_eq!(bullet.satoshis, 10_000);
            assert_eq!(bullet.tx_id, built.tx_id);
        }
        let change = built.change.unwrap();
        assert_eq!(change.output_index, 3);
        // 187 unsigned bytes + 107 for the unlocking script
        assert_eq!(change.satoshis, 1_000_000 - 30_000 - 294);
        assert_eq!(change.script, hex::encode(wallet.address().script_pubkey().as_bytes()));
    }

    #[test]
    fn test_sweep_pays_remainder_to_recipient() {
        let wallet = wallet();
        let bullet = owned_output(&wallet, 10_000);
        let built = wallet.build(&bullet, &[], &recipient()).unwrap();

        assert!(built.outputs.is_empty());
        let paid = built.change.unwrap();
        assert_eq!(paid.satoshis, 10_000 - 192);
        assert_eq!(paid.script, hex::encode(recipient().script_pubkey().as_bytes()));
    }

    #[test]
    fn test_fee_covers_signed_size() {
        let wallet = wallet();
        let cases = [
            (10_000, vec![]),
            (1_000_000, vec![Payment::new(recipient(), 10_000); 3]),
        ];

        for (value, payments) in cases {
            let built = wallet
                .build(&owned_output(&wallet, value), &payments, &recipient())
                .unwrap();
            let tx = decode(&built);
            let spent: u64 = tx.output.iter().map(|out| out.value.to_sat()).sum();

            assert!(
                value - spent >= tx.total_size() as u64,
                "fee {} below size {}",
                value - spent,
                tx.total_size()
            );
        }
    }

    #[test]
    fn test_signature_verifies() {
        let wallet = wallet();
        let bullet = owned_output(&wallet, 10_000);
        let built = wallet.build(&bullet, &[], &recipient()).unwrap();

        let tx = decode(&built);
        assert_eq!(tx.compute_txid().to_string(), built.tx_id);

        let pushes: Vec<&[u8]> = tx.input[0]
            .script_sig
            .instructions()
            .map(|instruction| match instruction.unwrap() {
                Instruction::PushBytes(bytes) => bytes.as_bytes(),
                Instruction::Op(op) => panic!("unexpected {:?}", op),
            })
            .collect();
        assert_eq!(pushes.len(), 2);

        let signature = ecdsa::Signature::from_slice(pushes[0]).unwrap();
        assert_eq!(signature.sighash_type, EcdsaSighashType::All);
        let key = PublicKey::from_slice(pushes[1]).unwrap();
        assert!(key.compressed);
        assert_eq!(&Address::from_public_key(Network::Testnet, &key), wallet.address());

        let sighash = SighashCache::new(&tx)
            .legacy_signature_hash(
                0,
                &wallet.address().script_pubkey(),
                EcdsaSighashType::All.to_u32(),
            )
            .unwrap();
        let message = Message::from_digest(sighash.to_byte_array());
        Secp256k1::verification_only()
            .verify_ecdsa(&message, &signature.signature, &key.inner)
            .unwrap();
    }

    #[test]
    fn test_rejects_uncompressed_key() {
        let wif = PrivateKey::new_uncompressed(secret(), NetworkKind::Test).to_wif();
        assert!(matches!(
            P2pkhWallet::from_wif(Network::Testnet, &wif, 1.0),
            Err(FaucetError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_rejects_key_for_other_network() {
        let wif = PrivateKey::new(secret(), NetworkKind::Main).to_wif();
        assert!(matches!(
            P2pkhWallet::from_wif(Network::Testnet, &wif, 1.0),
            Err(FaucetError::InvalidKey(_))
        ));
        assert!(P2pkhWallet::from_wif(Network::Mainnet, &wif, 1.0).is_ok());
    }

    #[test]
    fn test_small_remainder_goes_to_fee() {
        let wallet = wallet();
        let input = owned_output(&wallet, 5_000 + 192 + 100);
        let built = wallet
            .build(&input, &[Payment::new(recipient(), 5_000)], wallet.address())
            .unwrap();

        assert_eq!(built.outputs.len(), 1);
        assert!(built.change.is_none());
    }

    #[test]
    fn test_insufficient_funds() {
        let wallet = wallet();
        let input = owned_output(&wallet, 600);
        let err = wallet.build(&input, &[], &recipient()).unwrap_err();
        assert!(matches!(err, FaucetError::InsufficientFunds { available: 600, .. }));

        let input = owned_output(&wallet, 10_000);
        let payments = vec![Payment::new(recipient(), 10_000)];
        assert!(wallet.build(&input, &payments, wallet.address()).is_err());
    }

    #[test]
    fn test_rejects_foreign_input() {
        let wallet = wallet();
        let foreign = SpendableOutput::new(
            format!("{:064x}", 1),
            0,
            10_000,
            hex::encode(recipient().script_pubkey().as_bytes()),
        );
        assert!(wallet.build(&foreign, &[], &recipient()).is_err());
    }

    #[test]
    fn test_rejects_dust_payment() {
        let wallet = wallet();
        let input = owned_output(&wallet, 10_000);
        let payments = vec![Payment::new(recipient(), 100)];
        assert!(wallet.build(&input, &payments, wallet.address()).is_err());
    }
}
