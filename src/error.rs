use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

#[derive(Debug, Error)]
pub enum FaucetError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Unexpected pool outputs: expected exactly one, found {found}")]
    PoolDiscovery { found: usize },

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Network provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type FaucetResult<T> = Result<T, FaucetError>;

impl From<redis::RedisError> for FaucetError {
    fn from(err: redis::RedisError) -> Self {
        FaucetError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for FaucetError {
    fn from(err: serde_json::Error) -> Self {
        FaucetError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for FaucetError {
    fn from(err: reqwest::Error) -> Self {
        FaucetError::Provider(err.to_string())
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");
        let body = ApiResponse::<()>::error(90, self.to_string());
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
