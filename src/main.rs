use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utxo_faucet::bullet_queue::BulletQueue;
use utxo_faucet::captcha::{CaptchaVerifier, TurnstileVerifier};
use utxo_faucet::claim::ClaimHandler;
use utxo_faucet::config::Config;
use utxo_faucet::config_validator::ConfigValidator;
use utxo_faucet::handlers::AppState;
use utxo_faucet::health::HealthChecker;
use utxo_faucet::key_generator::KeyGenerator;
use utxo_faucet::metrics::MetricsCollector;
use utxo_faucet::pool::PoolState;
use utxo_faucet::provider::{MempoolProvider, NetworkClient};
use utxo_faucet::rate_limiter::RateLimiter;
use utxo_faucet::redis::RedisStore;
use utxo_faucet::refill::RefillController;
use utxo_faucet::server::Server;
use utxo_faucet::store::KvStore;
use utxo_faucet::wallet::{P2pkhWallet, TxBuilder};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    ConfigValidator::validate(&config)
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("utxo_faucet={},tower_http=debug", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let provider_url = config.provider_url();
    tracing::info!("Starting utxo faucet");
    tracing::info!(
        "Configuration: bind_addr={}, redis_url={}, network={}, provider_url={}",
        config.bind_addr,
        config.redis_url,
        config.network,
        provider_url
    );

    let store: Arc<dyn KvStore> = Arc::new(
        RedisStore::connect(&config.redis_url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to store: {}", e))?,
    );
    let wallet = P2pkhWallet::from_wif(config.network, &config.wif, config.fee_rate)
        .map_err(|e| anyhow::anyhow!("Failed to load signing key: {}", e))?;
    let faucet_address = wallet.address().clone();
    let wallet: Arc<dyn TxBuilder> = Arc::new(wallet);
    let provider: Arc<dyn NetworkClient> = Arc::new(
        MempoolProvider::new(provider_url)
            .map_err(|e| anyhow::anyhow!("Failed to create network client: {}", e))?,
    );
    tracing::info!(address = %faucet_address, "Faucet signing key loaded");

    let captcha: Option<Arc<dyn CaptchaVerifier>> = match &config.turnstile_secret {
        Some(secret) if !secret.is_empty() => {
            let verifier = TurnstileVerifier::new(secret.clone(), config.turnstile_verify_url.clone())
                .map_err(|e| anyhow::anyhow!("Failed to create captcha verifier: {}", e))?;
            Some(Arc::new(verifier) as Arc<dyn CaptchaVerifier>)
        }
        _ => {
            tracing::warn!("TURNSTILE_SECRET not set, captcha verification disabled");
            None
        }
    };

    let keys = KeyGenerator::new(config.key_prefix.clone());
    let metrics = MetricsCollector::new();
    let queue = BulletQueue::new(store.clone(), keys.bullets_key());
    let pool = PoolState::new(
        store.clone(),
        keys.pool_key(),
        provider.clone(),
        faucet_address.clone(),
    );

    let refill = RefillController::new(
        config.refill_settings(),
        pool.clone(),
        queue.clone(),
        wallet.clone(),
        provider.clone(),
        store.clone(),
        keys.pool_lease_key(),
    )
    .with_metrics(metrics.clone());

    let claim = ClaimHandler::new(
        config.claim_settings(),
        keys,
        RateLimiter::new(store.clone()),
        queue.clone(),
        wallet,
        provider,
    )
    .with_metrics(metrics.clone());

    let state = AppState {
        claim: Arc::new(claim),
        captcha,
        health: HealthChecker::new(store, queue.clone()),
        metrics,
        queue,
        pool,
        faucet_address,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let daemon = tokio::spawn(refill.run(shutdown_rx));

    // Create and run the server
    Server::new(state, config.bind_addr, shutdown_tx)
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    if let Err(e) = daemon.await {
        tracing::error!(error = %e, "Refill daemon terminated abnormally");
    }

    Ok(())
}
