use crate::config::Config;
use crate::error::FaucetError;

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a Redis URL
    pub fn validate_redis_url(url: &str) -> Result<(), FaucetError> {
        if url.is_empty() {
            return Err(FaucetError::Configuration(
                "Redis URL cannot be empty".to_string(),
            ));
        }

        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(FaucetError::Configuration(
                "Redis URL must start with 'redis://' or 'rediss://'".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates the bullet split parameters
    pub fn validate_refill(bullet_satoshis: u64, bullets_per_round: usize, interval_secs: u64) -> Result<(), FaucetError> {
        if bullet_satoshis == 0 {
            return Err(FaucetError::Configuration(
                "Bullet value must be greater than 0".to_string(),
            ));
        }

        if bullets_per_round == 0 {
            return Err(FaucetError::Configuration(
                "Bullets per round must be greater than 0".to_string(),
            ));
        }

        if interval_secs == 0 {
            return Err(FaucetError::Configuration(
                "Daemon sleep interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates the flat fee rate
    pub fn validate_fee_rate(fee_rate: f64) -> Result<(), FaucetError> {
        if !fee_rate.is_finite() || fee_rate <= 0.0 {
            return Err(FaucetError::Configuration(format!(
                "Fee rate must be a positive number, got {}",
                fee_rate
            )));
        }

        Ok(())
    }

    /// Validates daily claim limits
    pub fn validate_limits(per_addr: u32, per_ip: u32) -> Result<(), FaucetError> {
        if per_addr == 0 {
            return Err(FaucetError::Configuration(
                "Per-address daily limit must be greater than 0".to_string(),
            ));
        }

        if per_ip == 0 {
            return Err(FaucetError::Configuration(
                "Per-IP daily limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates a full service configuration
    pub fn validate(config: &Config) -> Result<(), FaucetError> {
        Self::validate_redis_url(&config.redis_url)?;
        Self::validate_refill(
            config.bullet_satoshis,
            config.bullets_per_round,
            config.daemon_sleep_secs,
        )?;
        Self::validate_fee_rate(config.fee_rate)?;
        Self::validate_limits(config.limit_per_addr_per_day, config.limit_per_ip_per_day)?;

        if config.claim_timeout_secs == 0 {
            return Err(FaucetError::Configuration(
                "Claim timeout must be greater than 0".to_string(),
            ));
        }

        if config.wif.trim().is_empty() {
            return Err(FaucetError::Configuration("WIF cannot be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_valid_redis_url() {
        assert!(ConfigValidator::validate_redis_url("redis://localhost:6379").is_ok());
        assert!(ConfigValidator::validate_redis_url("rediss://localhost:6379").is_ok());
    }

    #[test]
    fn test_invalid_redis_url() {
        assert!(ConfigValidator::validate_redis_url("").is_err());
        assert!(ConfigValidator::validate_redis_url("http://localhost:6379").is_err());
    }

    #[test]
    fn test_invalid_refill() {
        assert!(ConfigValidator::validate_refill(0, 2, 10).is_err());
        assert!(ConfigValidator::validate_refill(1000, 0, 10).is_err());
        assert!(ConfigValidator::validate_refill(1000, 2, 0).is_err());
        assert!(ConfigValidator::validate_refill(1000, 2, 10).is_ok());
    }

    #[test]
    fn test_fee_rate() {
        assert!(ConfigValidator::validate_fee_rate(0.5).is_ok());
        assert!(ConfigValidator::validate_fee_rate(0.0).is_err());
        assert!(ConfigValidator::validate_fee_rate(f64::NAN).is_err());
    }

    #[test]
    fn test_limits() {
        assert!(ConfigValidator::validate_limits(5, 10).is_ok());
        assert!(ConfigValidator::validate_limits(0, 10).is_err());
        assert!(ConfigValidator::validate_limits(5, 0).is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::try_parse_from(["utxo-faucet", "--wif", "cTest"]).unwrap();
        assert!(ConfigValidator::validate(&config).is_ok());
    }
}
