use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const TURNSTILE_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Returns `true` only for a token the provider accepted. Any transport
    /// failure counts as a rejection.
    async fn verify(&self, token: Option<&str>, remote_ip: Option<&str>) -> bool;
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

/// Cloudflare Turnstile server-side verification.
pub struct TurnstileVerifier {
    secret: String,
    verify_url: String,
    client: reqwest::Client,
}

impl TurnstileVerifier {
    pub fn new(secret: impl Into<String>, verify_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            secret: secret.into(),
            verify_url: verify_url.into(),
            client,
        })
    }
}

#[async_trait]
impl CaptchaVerifier for TurnstileVerifier {
    async fn verify(&self, token: Option<&str>, remote_ip: Option<&str>) -> bool {
        let token = match token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return false,
        };

        let mut form = vec![("secret", self.secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = match self.client.post(&self.verify_url).form(&form).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Captcha verification request failed");
                return false;
            }
        };

        match response.json::<SiteVerifyResponse>().await {
            Ok(body) => {
                if !body.success {
                    tracing::debug!(errors = ?body.error_codes, "Captcha token rejected");
                }
                body.success
            }
            Err(e) => {
                tracing::warn!(error = %e, "Captcha verification returned an invalid body");
                false
            }
        }
    }
}
