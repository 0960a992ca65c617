//! Authenticated HTTP client for the Directory API

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::TokenSource;
use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Retry delays stop doubling after this many steps
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Directory API HTTP client
///
/// Provides JSON request execution with bearer authentication, retries with
/// exponential backoff on rate limiting and server errors, and a single
/// token refresh on 401.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    tokens: Arc<dyn TokenSource>,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client with the given configuration and token source
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            tokens,
            http_client,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Get the underlying HTTP client
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Build an absolute URL from path segments, percent-encoding each one.
    pub fn url(&self, segments: &[&str]) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.config.base_url)
            .map_err(|e| Error::Config(format!("Invalid base URL {}: {}", self.config.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Base URL cannot be a base: {}", self.config.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn get<T>(&self, url: url::Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.execute::<(), T>(Method::GET, url, None).await
    }

    pub async fn patch<B, T>(&self, url: url::Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::PATCH, url, Some(body)).await
    }

    pub async fn post<B, T>(&self, url: url::Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, url, Some(body)).await
    }

    /// Execute a request with automatic retries and error handling.
    ///
    /// The request is rebuilt on every attempt so a refreshed token is used.
    pub async fn execute<B, T>(&self, method: Method, url: url::Url, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut last_error = None;
        let mut refreshed = false;
        let mut attempt = 0;

        while attempt < self.config.retry_attempts {
            if attempt > 0 {
                let backoff = backoff_delay(self.config.retry_delay, attempt);
                let delay = match &last_error {
                    Some(Error::RateLimited { retry_after: Some(after) }) => (*after).max(backoff),
                    _ => backoff,
                };
                tokio::time::sleep(delay).await;
            }
            attempt += 1;

            let token = self.tokens.access_token().await?;
            let mut request = self
                .http_client
                .request(method.clone(), url.clone())
                .bearer_auth(token);
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(%method, %url, attempt, "Directory request");

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: T = response.json().await?;
                        return Ok(body);
                    }

                    // One token refresh per request; does not consume an attempt
                    if status == reqwest::StatusCode::UNAUTHORIZED && !refreshed {
                        refreshed = true;
                        attempt -= 1;
                        self.tokens.invalidate().await;
                        continue;
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    let error = match Error::from_status(status, body) {
                        Error::RateLimited { .. } => Error::RateLimited { retry_after },
                        other => other,
                    };

                    if !error.is_retryable() {
                        return Err(error);
                    }

                    warn!(%method, %url, attempt, error = %error, "Retryable directory error");
                    last_error = Some(error);
                }
                Err(e) => {
                    warn!(%method, %url, attempt, error = %e, "Directory request failed");
                    last_error = Some(Error::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Other("Request failed".into())))
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<std::time::Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(std::time::Duration::from_secs)
}

/// Exponential backoff before retry `attempt` (1-based), doubling up to 2^16
/// times the base delay.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    base.saturating_mul(1u32 << exponent)
}
