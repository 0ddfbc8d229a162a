//! Bearer token resolution.
//!
//! Tokens are fetched lazily on the first authenticated call and cached
//! until shortly before they expire. A personal access token is returned
//! as-is without touching the network.

use crate::credentials::AuthMethod;
use crate::{ApiError, ApiResult};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

const OAUTH_SCOPE: &str = "openid client groups";
/// Refresh this long before the reported expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    token: Secret<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + ChronoDuration::seconds(EXPIRY_MARGIN_SECS) < expires_at,
            None => true,
        }
    }
}

/// Shared token source for every client built from one factory
pub struct TokenProvider {
    http: Client,
    method: AuthMethod,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    pub fn new(http: Client, method: AuthMethod) -> Self {
        Self {
            http,
            method,
            cached: Mutex::new(None),
        }
    }

    /// Current bearer token, requesting a new one when none is cached or the
    /// cached one is about to expire. Concurrent callers share one request.
    pub async fn bearer_token(&self) -> ApiResult<String> {
        let (token_url, username, password, client_id, client_secret) = match &self.method {
            AuthMethod::AccessToken(token) => return Ok(token.expose_secret().clone()),
            AuthMethod::Password {
                token_url,
                username,
                password,
                client_id,
                client_secret,
            } => (token_url, username, password, client_id, client_secret),
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.token.expose_secret().clone());
        }

        debug!(%token_url, %username, "requesting access token");
        let form = [
            ("grant_type", "password"),
            ("username", username.as_str()),
            ("password", password.expose_secret().as_str()),
            ("scope", OAUTH_SCOPE),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.expose_secret().as_str()),
        ];

        let response = self
            .http
            .post(token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::Authentication(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Authentication(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ApiError::Authentication(format!("unexpected token response: {}", e))
        })?;

        // An expiry too far out to represent is treated as no expiry
        let expires_at = parsed
            .expires_in
            .and_then(ChronoDuration::try_seconds)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));
        info!(?expires_at, "access token acquired");

        let token = parsed.access_token;
        *cached = Some(CachedToken {
            token: Secret::new(token.clone()),
            expires_at,
        });
        Ok(token)
    }

    /// Whether a rejected token can be replaced by asking the token endpoint again
    pub fn can_refresh(&self) -> bool {
        matches!(self.method, AuthMethod::Password { .. })
    }

    /// Drop the cached token so the next call fetches a fresh one
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_without_expiry_stays_fresh() {
        let token = CachedToken {
            token: Secret::new("t".to_string()),
            expires_at: None,
        };
        assert!(token.is_fresh(Utc::now()));
    }

    #[test]
    fn token_inside_margin_is_stale() {
        let now = Utc::now();
        let token = CachedToken {
            token: Secret::new("t".to_string()),
            expires_at: Some(now + ChronoDuration::seconds(30)),
        };
        assert!(!token.is_fresh(now));

        let later = CachedToken {
            token: Secret::new("t".to_string()),
            expires_at: Some(now + ChronoDuration::seconds(3600)),
        };
        assert!(later.is_fresh(now));
    }

    #[tokio::test]
    async fn access_token_is_returned_without_network() {
        let provider = TokenProvider::new(
            Client::new(),
            AuthMethod::AccessToken(Secret::new("pat-xyz".to_string())),
        );
        assert_eq!(provider.bearer_token().await.unwrap(), "pat-xyz");
    }
}
