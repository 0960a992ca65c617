//! Authentication support for the Directory client
//!
//! Provides the OAuth2 installed-application flow: an interactive
//! authorization-code exchange on first use, then refresh-token renewal
//! against a token cached on disk.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::token_cache::TokenCache;

/// Scopes needed to read and rewrite customers, users and groups.
pub const DIRECTORY_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/admin.directory.user",
    "https://www.googleapis.com/auth/admin.directory.customer",
    "https://www.googleapis.com/auth/admin.directory.group",
];

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const OUT_OF_BAND_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Supplies bearer tokens to the HTTP client.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Get a valid access token, refreshing if necessary
    async fn access_token(&self) -> Result<String>;

    /// Drop the current token so the next call refreshes it
    async fn invalidate(&self);
}

/// A fixed bearer token, for tests and pre-authorized environments.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    async fn invalidate(&self) {}
}

/// OAuth2 client registration, as downloaded from the Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Parse `client_secret.json` (either the `installed` or `web` section).
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(json)?;
        file.installed.or(file.web).ok_or_else(|| {
            Error::Config("client secret has neither an 'installed' nor a 'web' section".into())
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Unable to read {}: {}. Download one from https://console.developers.google.com/project",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(OUT_OF_BAND_REDIRECT)
    }
}

/// A persisted OAuth2 token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Token {
    /// Check if the token is still valid (with 60-second buffer)
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry > now + Duration::seconds(60),
            None => true,
        }
    }
}

/// Token response from the OAuth2 token endpoint
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<String>) -> Token {
        Token {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token.or(previous_refresh),
            expiry: self
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

/// Authorization-code flow for an installed application.
#[derive(Debug, Clone)]
pub struct InstalledAppFlow {
    secret: ClientSecret,
    scopes: Vec<String>,
    http_client: reqwest::Client,
}

impl InstalledAppFlow {
    pub fn new(secret: ClientSecret, http_client: reqwest::Client) -> Self {
        Self {
            secret,
            scopes: DIRECTORY_SCOPES.iter().map(|s| s.to_string()).collect(),
            http_client,
        }
    }

    /// URL the operator opens to grant access. Requests offline access so
    /// a refresh token is issued.
    pub fn authorization_url(&self) -> Result<String> {
        let scope = self.scopes.join(" ");
        let url = url::Url::parse_with_params(
            &self.secret.auth_uri,
            &[
                ("access_type", "offline"),
                ("client_id", self.secret.client_id.as_str()),
                ("redirect_uri", self.secret.redirect_uri()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", "state-token"),
            ],
        )
        .map_err(|e| Error::Config(format!("Invalid auth_uri: {}", e)))?;
        Ok(url.into())
    }

    /// Exchange a pasted authorization code for a token.
    pub async fn exchange_code(&self, code: &str) -> Result<Token> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code.trim()),
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("redirect_uri", self.secret.redirect_uri()),
        ];
        let response = self.post_token_request(&form).await?;
        Ok(response.into_token(None))
    }

    /// Use a refresh token to obtain a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Token> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
        ];
        let response = self.post_token_request(&form).await?;
        Ok(response.into_token(Some(refresh_token.to_string())))
    }

    async fn post_token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http_client
            .post(&self.secret.token_uri)
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Authentication(format!(
                "Token request failed with status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}

/// Token manager backed by the on-disk cache.
#[derive(Debug)]
pub struct TokenManager {
    flow: InstalledAppFlow,
    cache: TokenCache,
    current: RwLock<Option<Token>>,
}

impl TokenManager {
    /// Create a manager, loading any token already in the cache.
    ///
    /// An unreadable cache file is treated like a missing one.
    pub fn new(flow: InstalledAppFlow, cache: TokenCache) -> Self {
        let current = match cache.load() {
            Ok(token) => token,
            Err(e) => {
                debug!(path = %cache.path().display(), error = %e, "Ignoring unreadable token cache");
                None
            }
        };
        Self {
            flow,
            cache,
            current: RwLock::new(current),
        }
    }

    /// True when there is no cached token and the operator must authorize.
    pub async fn needs_authorization(&self) -> bool {
        self.current.read().await.is_none()
    }

    pub fn authorization_url(&self) -> Result<String> {
        self.flow.authorization_url()
    }

    /// Complete the interactive flow with the code the operator pasted.
    pub async fn authorize_with_code(&self, code: &str) -> Result<()> {
        let token = self.flow.exchange_code(code).await?;
        info!(path = %self.cache.path().display(), "Saving credential file");
        self.cache.save(&token)?;
        *self.current.write().await = Some(token);
        Ok(())
    }
}

#[async_trait]
impl TokenSource for TokenManager {
    async fn access_token(&self) -> Result<String> {
        {
            let current = self.current.read().await;
            if let Some(ref token) = *current {
                if token.is_valid_at(Utc::now()) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut current = self.current.write().await;

        // Double-check in case another task refreshed while we waited
        if let Some(ref token) = *current {
            if token.is_valid_at(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let refresh_token = current
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| {
                Error::Authentication("No usable cached token; authorization required".into())
            })?;

        debug!("Refreshing access token");
        let token = self.flow.refresh(&refresh_token).await?;
        self.cache.save(&token)?;
        let access_token = token.access_token.clone();
        *current = Some(token);
        Ok(access_token)
    }

    async fn invalidate(&self) {
        let mut current = self.current.write().await;
        if let Some(ref mut token) = *current {
            // Keep the refresh token, force renewal of the access token
            token.expiry = Some(DateTime::<Utc>::MIN_UTC);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_JSON: &str = r#"{
        "installed": {
            "client_id": "123.apps.googleusercontent.com",
            "client_secret": "shh",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "redirect_uris": ["urn:ietf:wg:oauth:2.0:oob", "http://localhost"]
        }
    }"#;

    #[test]
    fn test_client_secret_installed_section() {
        let secret = ClientSecret::from_json(SECRET_JSON).unwrap();
        assert_eq!(secret.client_id, "123.apps.googleusercontent.com");
        assert_eq!(secret.redirect_uri(), "urn:ietf:wg:oauth:2.0:oob");
    }

    #[test]
    fn test_client_secret_without_section_is_rejected() {
        let err = ClientSecret::from_json(r#"{"other": {}}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_authorization_url_requests_offline_directory_scopes() {
        let secret = ClientSecret::from_json(SECRET_JSON).unwrap();
        let flow = InstalledAppFlow::new(secret, reqwest::Client::new());
        let url = url::Url::parse(&flow.authorization_url().unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["state"], "state-token");
        assert_eq!(params["response_type"], "code");
        assert!(params["scope"].contains("admin.directory.customer"));
        assert!(params["scope"].contains("admin.directory.group"));
    }

    #[test]
    fn test_token_validity_window() {
        let now = Utc::now();
        let mut token = Token {
            access_token: "a".into(),
            token_type: "Bearer".into(),
            refresh_token: None,
            expiry: Some(now + Duration::seconds(30)),
        };
        assert!(!token.is_valid_at(now));
        token.expiry = Some(now + Duration::minutes(10));
        assert!(token.is_valid_at(now));
        token.expiry = None;
        assert!(token.is_valid_at(now));
    }

    #[test]
    fn test_refresh_keeps_previous_refresh_token() {
        let response = TokenResponse {
            access_token: "new".into(),
            token_type: "Bearer".into(),
            expires_in: Some(3600),
            refresh_token: None,
        };
        let token = response.into_token(Some("1//keep".into()));
        assert_eq!(token.refresh_token.as_deref(), Some("1//keep"));
        assert!(token.expiry.is_some());
    }
}
