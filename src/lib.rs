pub mod address;
pub mod bullet_queue;
pub mod captcha;
pub mod claim;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod handlers;
pub mod health;
pub mod key_generator;
pub mod metrics;
pub mod middleware;
pub mod pool;
pub mod provider;
pub mod rate_limiter;
pub mod redis;
pub mod refill;
pub mod response;
pub mod server;
pub mod store;
pub mod transaction;
pub mod utxo;
pub mod wallet;

pub use claim::{ClaimHandler, ClaimReceipt, ClaimRejection, ClaimResult};
pub use config::Config;
pub use error::{FaucetError, FaucetResult};
pub use refill::{RefillController, RefillOutcome};
pub use response::ApiResponse;
pub use server::create_app;
