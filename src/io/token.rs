//! Bearer tokens for the remote services.
//!
//! Providers are injected into the clients; `OAuthTokenProvider` exchanges
//! client credentials and caches the token until shortly before it expires.
use std::future::Future;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::params::ServiceConfig;
use crate::error::{Error, Result};

pub trait TokenProvider: Send + Sync {
    /// A token valid for at least the provider's refresh margin.
    fn bearer_token(&self) -> impl Future<Output = Result<String>> + Send;
}

/// Fixed token, for tests and pre-issued credentials.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    async fn bearer_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// OAuth2 client-credentials token provider with expiry tracking.
pub struct OAuthTokenProvider {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_margin: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl OAuthTokenProvider {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_margin: config.token_refresh_margin(),
            cached: Mutex::new(None),
        })
    }

    async fn exchange(&self) -> Result<CachedToken> {
        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::UpstreamService {
                service: "token",
                status: status.as_u16(),
                message: body,
            });
        }
        if body.is_empty() {
            return Err(Error::EmptyResult { service: "token" });
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        info!("Obtained access token (expires in {}s)", token.expires_in);
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

impl TokenProvider for OAuthTokenProvider {
    async fn bearer_token(&self) -> Result<String> {
        // Held across the exchange so concurrent callers share one refresh.
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Instant::now(), self.refresh_margin) {
                debug!("Reusing cached access token");
                return Ok(token.access_token.clone());
            }
        }
        let token = self.exchange().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }
}
