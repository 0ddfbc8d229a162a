//! API Credentials Management
//!
//! Credentials are resolved from a JSON secrets file, from `FBN_*`
//! environment variables, or from both (file values win, the environment
//! fills the gaps). Secrets are held in `secrecy` wrappers so they never end
//! up in logs or debug output.

use crate::{ApiError, ApiResult};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const ENV_API_URL: &str = "FBN_LUSID_API_URL";
pub const ENV_TOKEN_URL: &str = "FBN_TOKEN_URL";
pub const ENV_USERNAME: &str = "FBN_USERNAME";
pub const ENV_PASSWORD: &str = "FBN_PASSWORD";
pub const ENV_CLIENT_ID: &str = "FBN_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "FBN_CLIENT_SECRET";
pub const ENV_ACCESS_TOKEN: &str = "FBN_ACCESS_TOKEN";
pub const ENV_APP_NAME: &str = "FBN_APP_NAME";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RATE_LIMIT: u32 = 10;

/// How the client obtains its bearer token
#[derive(Clone)]
pub enum AuthMethod {
    /// Pre-issued personal access token, used as-is
    AccessToken(Secret<String>),
    /// OAuth2 resource-owner password grant against `token_url`
    Password {
        token_url: Url,
        username: String,
        password: Secret<String>,
        client_id: String,
        client_secret: Secret<String>,
    },
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::AccessToken(_) => f
                .debug_tuple("AccessToken")
                .field(&"[REDACTED]")
                .finish(),
            AuthMethod::Password {
                token_url,
                username,
                client_id,
                ..
            } => f
                .debug_struct("Password")
                .field("token_url", &token_url.as_str())
                .field("username", username)
                .field("password", &"[REDACTED]")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Fully resolved credentials for one service deployment
#[derive(Clone, Debug)]
pub struct ApiCredentials {
    /// Base URL of the REST API, e.g. `https://example.lusid.com/api`
    pub api_url: Url,
    pub auth: AuthMethod,
    /// Sent as the `X-LUSID-Application` header when present
    pub app_name: Option<String>,
    pub proxy_address: Option<String>,
    pub request_timeout: Duration,
    pub rate_limit_per_second: u32,
}

#[derive(Deserialize, Default)]
struct SecretsFile {
    #[serde(default)]
    api: ApiSection,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ApiSection {
    api_url: Option<String>,
    token_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    access_token: Option<String>,
    app_name: Option<String>,
    proxy_address: Option<String>,
    request_timeout_secs: Option<u64>,
    rate_limit_per_second: Option<u32>,
}

impl ApiCredentials {
    /// Create credentials authenticating with a personal access token
    pub fn with_access_token(api_url: &str, access_token: impl Into<String>) -> ApiResult<Self> {
        let credentials = Self {
            api_url: parse_url("apiUrl", api_url)?,
            auth: AuthMethod::AccessToken(Secret::new(access_token.into())),
            app_name: None,
            proxy_address: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            rate_limit_per_second: DEFAULT_RATE_LIMIT,
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Load credentials from a JSON secrets file, filling missing values from
    /// the environment
    pub fn from_secrets_file(path: impl AsRef<Path>) -> ApiResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading API credentials from secrets file");

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ApiError::Configuration(format!(
                "cannot read secrets file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_secrets_json(&contents, |var| env::var(var).ok())
    }

    /// Load credentials from `FBN_*` environment variables only
    pub fn from_env() -> ApiResult<Self> {
        debug!("loading API credentials from environment");
        Self::resolve(ApiSection::default(), |var| env::var(var).ok())
    }

    /// Parse secrets JSON, using `lookup` for values the document leaves out
    pub fn from_secrets_json(
        contents: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ApiResult<Self> {
        let file: SecretsFile = serde_json::from_str(contents)
            .map_err(|e| ApiError::Configuration(format!("malformed secrets file: {}", e)))?;
        Self::resolve(file.api, lookup)
    }

    fn resolve(section: ApiSection, lookup: impl Fn(&str) -> Option<String>) -> ApiResult<Self> {
        let pick = |value: Option<String>, var: &str| {
            value
                .filter(|v| !v.trim().is_empty())
                .or_else(|| lookup(var).filter(|v| !v.trim().is_empty()))
        };

        let api_url = pick(section.api_url, ENV_API_URL)
            .ok_or_else(|| missing("apiUrl", ENV_API_URL))?;

        let auth = match pick(section.access_token, ENV_ACCESS_TOKEN) {
            Some(token) => AuthMethod::AccessToken(Secret::new(token)),
            None => {
                let token_url = pick(section.token_url, ENV_TOKEN_URL)
                    .ok_or_else(|| missing("tokenUrl", ENV_TOKEN_URL))?;
                AuthMethod::Password {
                    token_url: Url::parse(&token_url).map_err(|e| {
                        ApiError::Configuration(format!("invalid tokenUrl '{}': {}", token_url, e))
                    })?,
                    username: pick(section.username, ENV_USERNAME)
                        .ok_or_else(|| missing("username", ENV_USERNAME))?,
                    password: Secret::new(
                        pick(section.password, ENV_PASSWORD)
                            .ok_or_else(|| missing("password", ENV_PASSWORD))?,
                    ),
                    client_id: pick(section.client_id, ENV_CLIENT_ID)
                        .ok_or_else(|| missing("clientId", ENV_CLIENT_ID))?,
                    client_secret: Secret::new(
                        pick(section.client_secret, ENV_CLIENT_SECRET)
                            .ok_or_else(|| missing("clientSecret", ENV_CLIENT_SECRET))?,
                    ),
                }
            }
        };

        let credentials = Self {
            api_url: parse_url("apiUrl", &api_url)?,
            auth,
            app_name: pick(section.app_name, ENV_APP_NAME),
            proxy_address: section.proxy_address.filter(|p| !p.trim().is_empty()),
            request_timeout: Duration::from_secs(
                section.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            rate_limit_per_second: section.rate_limit_per_second.unwrap_or(DEFAULT_RATE_LIMIT),
        };

        credentials.validate()?;
        Ok(credentials)
    }

    /// Validate that the resolved values are usable
    pub fn validate(&self) -> ApiResult<()> {
        if !matches!(self.api_url.scheme(), "http" | "https") {
            return Err(ApiError::Configuration(format!(
                "apiUrl must be http(s), got {}",
                self.api_url
            )));
        }

        match &self.auth {
            AuthMethod::AccessToken(token) => {
                if token.expose_secret().is_empty() {
                    return Err(ApiError::Configuration(
                        "access token cannot be empty".to_string(),
                    ));
                }
            }
            AuthMethod::Password {
                password,
                client_secret,
                ..
            } => {
                if password.expose_secret().is_empty() || client_secret.expose_secret().is_empty()
                {
                    return Err(ApiError::Configuration(
                        "password and client secret cannot be empty".to_string(),
                    ));
                }
            }
        }

        if self.request_timeout.is_zero() {
            return Err(ApiError::Configuration(
                "requestTimeoutSecs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn missing(field: &str, var: &str) -> ApiError {
    ApiError::Configuration(format!(
        "missing credential '{}' (secrets file) or {} (environment)",
        field, var
    ))
}

fn parse_url(field: &str, raw: &str) -> ApiResult<Url> {
    // Trailing slash so relative joins keep the base path
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized)
        .map_err(|e| ApiError::Configuration(format!("invalid {} '{}': {}", field, raw, e)))
}
