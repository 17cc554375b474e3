use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::address::Network;
use crate::captcha::TURNSTILE_VERIFY_URL;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Server bind address
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3001")]
    pub bind_addr: SocketAddr,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Namespace prefix for every store key
    #[arg(long, env = "KEY_PREFIX", default_value = "faucet:")]
    pub key_prefix: String,

    /// Target network
    #[arg(long, env = "NETWORK", default_value = "testnet")]
    pub network: Network,

    /// WIF-encoded signing key of the faucet
    #[arg(long, env = "WIF", hide_env_values = true)]
    pub wif: String,

    /// Mempool-style REST endpoint, defaults per network
    #[arg(long, env = "PROVIDER_URL")]
    pub provider_url: Option<String>,

    /// Fee rate in satoshis per byte
    #[arg(long, env = "FEE_RATE", default_value_t = 1.0)]
    pub fee_rate: f64,

    /// Value of every bullet, in satoshis
    #[arg(long, env = "BULLET_SATOSHIS", default_value_t = 10_000_000)]
    pub bullet_satoshis: u64,

    /// Bullets created by one refill transaction
    #[arg(long, env = "BULLETS_PER_ROUND", default_value_t = 2)]
    pub bullets_per_round: usize,

    /// Refill when fewer bullets than this are queued
    #[arg(long, env = "BULLETS_THRESHOLD", default_value_t = 1)]
    pub bullets_threshold: usize,

    /// Pause between refill cycles, in seconds
    #[arg(long, env = "DAEMON_SLEEP_SECONDS", default_value_t = 10)]
    pub daemon_sleep_secs: u64,

    #[arg(long, env = "LIMIT_PER_ADDR_PER_DAY", default_value_t = 5)]
    pub limit_per_addr_per_day: u32,

    #[arg(long, env = "LIMIT_PER_IP_PER_DAY", default_value_t = 10)]
    pub limit_per_ip_per_day: u32,

    /// Client IPs exempt from IP limits and captcha
    #[arg(
        long,
        env = "IP_CHECK_BYPASS",
        value_delimiter = ',',
        default_value = "127.0.0.1,::1,::ffff:127.0.0.1"
    )]
    pub ip_check_bypass: Vec<String>,

    /// Turnstile secret; captcha is disabled when unset
    #[arg(long, env = "TURNSTILE_SECRET", hide_env_values = true)]
    pub turnstile_secret: Option<String>,

    #[arg(long, env = "TURNSTILE_VERIFY_URL", default_value = TURNSTILE_VERIFY_URL)]
    pub turnstile_verify_url: String,

    /// Deadline for building and broadcasting one claim transaction
    #[arg(long, env = "CLAIM_TIMEOUT_SECS", default_value_t = 30)]
    pub claim_timeout_secs: u64,

    /// Refill lease lifetime in seconds, 0 disables the lease
    #[arg(long, env = "REFILL_LEASE_SECS", default_value_t = 120)]
    pub refill_lease_secs: u64,
}

/// Parameters of the claim path.
#[derive(Debug, Clone)]
pub struct ClaimSettings {
    pub network: Network,
    pub limit_per_addr_per_day: u32,
    pub limit_per_ip_per_day: u32,
    pub ip_check_bypass: Vec<String>,
    pub timeout: Duration,
}

impl ClaimSettings {
    /// Whether limits (and captcha) apply to `ip`. Unknown and bypassed
    /// addresses are exempt.
    pub fn should_check_ip(&self, ip: Option<&str>) -> bool {
        match ip.map(str::trim) {
            Some(ip) if !ip.is_empty() => !self.ip_check_bypass.iter().any(|b| b.trim() == ip),
            _ => false,
        }
    }
}

/// Parameters of the refill loop.
#[derive(Debug, Clone)]
pub struct RefillSettings {
    pub bullet_satoshis: u64,
    pub bullets_per_round: usize,
    pub bullets_threshold: usize,
    pub interval: Duration,
    /// `None` runs without a lease.
    pub lease_ttl: Option<Duration>,
}

impl Config {
    /// Load configuration from command line flags and environment variables
    pub fn from_env() -> Result<Self, clap::Error> {
        Config::try_parse()
    }

    pub fn provider_url(&self) -> String {
        self.provider_url
            .clone()
            .unwrap_or_else(|| self.network.default_provider_url().to_string())
    }

    pub fn claim_settings(&self) -> ClaimSettings {
        ClaimSettings {
            network: self.network,
            limit_per_addr_per_day: self.limit_per_addr_per_day,
            limit_per_ip_per_day: self.limit_per_ip_per_day,
            ip_check_bypass: self.ip_check_bypass.clone(),
            timeout: Duration::from_secs(self.claim_timeout_secs),
        }
    }

    pub fn refill_settings(&self) -> RefillSettings {
        RefillSettings {
            bullet_satoshis: self.bullet_satoshis,
            bullets_per_round: self.bullets_per_round,
            bullets_threshold: self.bullets_threshold,
            interval: Duration::from_secs(self.daemon_sleep_secs),
            lease_ttl: (self.refill_lease_secs > 0)
                .then(|| Duration::from_secs(self.refill_lease_secs)),
        }
    }
}
