//! Network parameters and P2PKH addresses.

use bitcoin::address::NetworkUnchecked;
use bitcoin::hashes::Hash as _;
use bitcoin::{AddressType, NetworkKind, PubkeyHash, PublicKey, ScriptBuf};
use std::fmt;
use std::str::FromStr;

use crate::error::FaucetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    /// Chain parameters used for address and key checks.
    pub fn to_bitcoin(&self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }

    /// Prefix family shared by legacy addresses and WIF keys.
    pub fn kind(&self) -> NetworkKind {
        NetworkKind::from(self.to_bitcoin())
    }

    /// Default mempool-style REST endpoint.
    pub fn default_provider_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://mempool.space/api",
            Network::Testnet => "https://mempool.space/testnet/api",
            Network::Regtest => "http://127.0.0.1:3002/api",
        }
    }
}

impl FromStr for Network {
    type Err = FaucetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let name = name.strip_prefix("opcat-").unwrap_or(name.as_str());
        match name {
            "mainnet" | "livenet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(FaucetError::Configuration(format!(
                "Unsupported network '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Regtest => write!(f, "regtest"),
        }
    }
}

/// A pay-to-pubkey-hash address bound to one network.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    inner: bitcoin::Address,
}

impl Address {
    pub fn from_pubkey_hash(network: Network, pubkey_hash: [u8; 20]) -> Self {
        let hash = PubkeyHash::from_byte_array(pubkey_hash);
        Self {
            network,
            inner: bitcoin::Address::p2pkh(hash, network.kind()),
        }
    }

    pub fn from_public_key(network: Network, public_key: &PublicKey) -> Self {
        Self {
            network,
            inner: bitcoin::Address::p2pkh(public_key.pubkey_hash(), network.kind()),
        }
    }

    /// Decode a base58check P2PKH address, rejecting other networks and
    /// other script types.
    pub fn parse(network: Network, s: &str) -> Result<Self, FaucetError> {
        let inner = s
            .trim()
            .parse::<bitcoin::Address<NetworkUnchecked>>()
            .map_err(|e| FaucetError::InvalidAddress(format!("{}: {}", s, e)))?
            .require_network(network.to_bitcoin())
            .map_err(|e| FaucetError::InvalidAddress(format!("{}: {}", s, e)))?;

        if inner.address_type() != Some(AddressType::P2pkh) {
            return Err(FaucetError::InvalidAddress(format!(
                "{}: only P2PKH addresses are supported",
                s
            )));
        }

        Ok(Self { network, inner })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn script_pubkey(&self) -> ScriptBuf {
        self.inner.script_pubkey()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}
