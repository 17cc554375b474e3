use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::address::Address;
use crate::bullet_queue::BulletQueue;
use crate::captcha::CaptchaVerifier;
use crate::claim::{ClaimHandler, ClaimReceipt, ClaimRejection};
use crate::error::FaucetError;
use crate::health::HealthChecker;
use crate::metrics::MetricsCollector;
use crate::middleware::client_ip;
use crate::pool::PoolState;
use crate::response::ApiResponse;
use crate::utxo::SpendableOutput;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub claim: Arc<ClaimHandler>,
    /// `None` disables captcha verification.
    pub captcha: Option<Arc<dyn CaptchaVerifier>>,
    pub health: HealthChecker,
    pub metrics: MetricsCollector,
    pub queue: BulletQueue,
    pub pool: PoolState,
    pub faucet_address: Address,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    #[serde(default)]
    pub addr: Option<String>,
    #[serde(default)]
    pub captcha_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub address: String,
    pub network: String,
    pub bullets_queued: usize,
    pub pool: Option<SpendableOutput>,
}

/// Liveness check
pub async fn root() -> &'static str {
    "OK"
}

/// Dispense one bullet to the requested address
pub async fn claim(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Option<Json<ClaimRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));

    if let Some(captcha) = &state.captcha {
        if state.claim.settings().should_check_ip(ip.as_deref())
            && !captcha
                .verify(request.captcha_token.as_deref(), ip.as_deref())
                .await
        {
            tracing::info!(ip = ip.as_deref().unwrap_or_default(), "Captcha validation failed");
            let rejection = ClaimRejection::CaptchaFailed;
            state.metrics.record_claim(rejection.code()).await;
            let body = ApiResponse::<ClaimReceipt>::error(rejection.code(), rejection.message());
            return (StatusCode::FORBIDDEN, Json(body));
        }
    }

    let result = state
        .claim
        .claim(request.addr.as_deref(), ip.as_deref())
        .await;
    (StatusCode::OK, Json(ApiResponse::from(result)))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.health.check_health().await;
    let status = if health.status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}

/// Claim and refill counters
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot().await)
}

/// Faucet address, queue depth and current pool output
pub async fn status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StatusResponse>>, FaucetError> {
    let (bullets_queued, pool) = tokio::try_join!(state.queue.len(), state.pool.peek())?;

    Ok(Json(ApiResponse::ok(StatusResponse {
        address: state.faucet_address.to_string(),
        network: state.faucet_address.network().to_string(),
        bullets_queued,
        pool,
    })))
}
