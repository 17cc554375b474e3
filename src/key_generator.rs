//! Store key layout for the faucet.

use std::fmt;

/// Identity class a daily counter is kept for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    Address,
    Ip,
}

impl fmt::Display for RateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateScope::Address => write!(f, "addr"),
            RateScope::Ip => write!(f, "ip"),
        }
    }
}

/// Builds every key the faucet reads or writes, under one namespace prefix.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    prefix: String,
}

impl KeyGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Scalar key holding the current pool output.
    pub fn pool_key(&self) -> String {
        format!("{}pool", self.prefix)
    }

    /// Lease taken by a refill cycle before it touches the pool output.
    pub fn pool_lease_key(&self) -> String {
        format!("{}pool:lease", self.prefix)
    }

    /// List key holding queued bullets.
    pub fn bullets_key(&self) -> String {
        format!("{}bullets", self.prefix)
    }

    /// Daily counter key for one identity.
    pub fn limit_key(&self, scope: RateScope, identity: &str) -> String {
        format!(
            "{}limit:{}:{}",
            self.prefix,
            scope,
            Self::sanitize_key(identity.trim())
        )
    }

    /// Percent-encode every byte outside `[A-Za-z0-9:.-]`, so distinct
    /// identities always map to distinct keys.
    pub fn sanitize_key(key: &str) -> String {
        let mut out = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b':' | b'-' | b'.') {
                out.push(byte as char);
            } else {
                out.push_str(&format!("%{:02X}", byte));
            }
        }
        out
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new("faucet:")
    }
}
