use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::info;

/// Logging middleware for request/response tracking
pub async fn logging_middleware(
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(&request).unwrap_or_else(|| "unknown".to_string());

    info!(
        target: "utxo_faucet::middleware",
        method = %method,
        uri = %uri,
        client_ip = %client_ip,
        "Incoming request"
    );

    let response = next.run(request).await;

    let status = response.status();
    info!(
        target: "utxo_faucet::middleware",
        method = %method,
        uri = %uri,
        status = %status,
        "Request completed"
    );

    response
}

/// Resolve the caller's IP, trusting reverse-proxy headers before the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    for header in ["x-real-ip", "cf-connecting-ip"] {
        if let Some(value) = headers.get(header) {
            if let Ok(ip_str) = value.to_str() {
                let ip_str = ip_str.trim();
                if !ip_str.is_empty() {
                    return Some(ip_str.to_string());
                }
            }
        }
    }

    peer.map(|addr| addr.ip().to_string())
}

fn get_client_ip(request: &Request) -> Option<String> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_ip(request.headers(), peer)
}
