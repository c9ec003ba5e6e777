//! Backend access token and its background renewal
//!
//! The commerce backend authenticates with short-lived `client_credentials`
//! tokens. A single `TokenCell` is shared process-wide: the renewal task is
//! its only writer, gateway calls read it. A caller may observe the old token
//! during rotation; the resulting auth failure is an ordinary gateway error.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Access token with its expiry instant
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_in_secs: i64, now: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at: now + ChronoDuration::seconds(expires_in_secs),
        }
    }

    /// Time left before the token should be replaced, never negative
    pub fn refresh_in(&self, now: DateTime<Utc>, margin_secs: i64) -> Duration {
        let refresh_at = self.expires_at - ChronoDuration::seconds(margin_secs);
        (refresh_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Process-wide slot holding the current backend token
#[derive(Debug, Clone, Default)]
pub struct TokenCell {
    inner: Arc<RwLock<Option<AccessToken>>>,
}

impl TokenCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token value, if one has been fetched yet
    pub async fn current(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|token| token.value.clone())
    }

    pub async fn store(&self, token: AccessToken) {
        *self.inner.write().await = Some(token);
    }
}

/// Client credentials for the token endpoint
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Exchange client credentials for a fresh access token
pub async fn fetch_access_token(
    http: &reqwest::Client,
    base_url: &str,
    credentials: &ClientCredentials,
) -> Result<AccessToken> {
    let response = http
        .post(format!("{base_url}/oauth/access_token"))
        .form(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ])
        .send()
        .await
        .context("Failed to reach token endpoint")?
        .error_for_status()
        .context("Token endpoint rejected credentials")?;

    let body: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;

    Ok(AccessToken::new(body.access_token, body.expires_in, Utc::now()))
}

/// Spawn the periodic renewal task
///
/// The task fetches a token immediately, then sleeps until shortly before
/// expiry. Failed renewals are retried after `retry_delay`.
pub fn spawn_token_renewal(
    http: reqwest::Client,
    base_url: String,
    credentials: ClientCredentials,
    cell: TokenCell,
    refresh_margin_secs: i64,
    retry_delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = match fetch_access_token(&http, &base_url, &credentials).await {
                Ok(token) => {
                    let wait = token.refresh_in(Utc::now(), refresh_margin_secs);
                    info!(
                        expires_at = %token.expires_at,
                        next_refresh_secs = wait.as_secs(),
                        "Backend access token renewed"
                    );
                    cell.store(token).await;
                    wait.max(retry_delay)
                }
                Err(e) => {
                    error!(error = %e, "Failed to renew backend access token");
                    retry_delay
                }
            };
            tokio::time::sleep(wait).await;
        }
    })
}
