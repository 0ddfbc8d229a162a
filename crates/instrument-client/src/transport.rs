//! Shared HTTP plumbing for every API surface.

use crate::auth::TokenProvider;
use crate::credentials::ApiCredentials;
use crate::{ApiError, ApiResult, RateLimiter};
use reqwest::{Client, Method, Proxy, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

const APPLICATION_HEADER: &str = "X-LUSID-Application";
const USER_AGENT: &str = concat!("instrument-client/", env!("CARGO_PKG_VERSION"));

/// Query string pairs; repeated keys are sent as repeated parameters
pub type Query<'a> = Vec<(&'a str, String)>;

struct ClientInner {
    http: Client,
    base_url: Url,
    tokens: TokenProvider,
    rate_limiter: RateLimiter,
    app_name: Option<String>,
}

/// Authenticated handle on the REST API. Cloning shares the connection pool,
/// token cache and rate limiter.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("app_name", &self.inner.app_name)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Build the HTTP client. Performs no network I/O.
    pub fn new(credentials: &ApiCredentials) -> ApiResult<Self> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(credentials.request_timeout);

        if let Some(proxy) = &credentials.proxy_address {
            builder = builder.proxy(Proxy::all(proxy).map_err(|e| {
                ApiError::Configuration(format!("invalid proxy address '{}': {}", proxy, e))
            })?);
        }

        let http = builder
            .build()
            .map_err(|e| ApiError::Configuration(format!("building HTTP client: {}", e)))?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                tokens: TokenProvider::new(http.clone(), credentials.auth.clone()),
                rate_limiter: RateLimiter::new(credentials.rate_limit_per_second),
                base_url: credentials.api_url.clone(),
                app_name: credentials.app_name.clone(),
                http,
            }),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Resolve path segments against the base URL, percent-encoding each one
    pub fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::Configuration(format!(
                    "apiUrl cannot be used as a base: {}",
                    self.inner.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn get<T>(&self, segments: &[&str], query: &Query<'_>) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let body = self
            .execute(Method::GET, &url, |req| req.query(query))
            .await?;
        decode(&body)
    }

    pub async fn post<B, T>(&self, segments: &[&str], query: &Query<'_>, payload: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let body = self
            .execute(Method::POST, &url, |req| req.query(query).json(payload))
            .await?;
        decode(&body)
    }

    pub async fn delete(&self, segments: &[&str]) -> ApiResult<()> {
        let url = self.endpoint(segments)?;
        self.execute(Method::DELETE, &url, |req| req).await?;
        Ok(())
    }

    /// Send one request, retrying once with a fresh token when a cached
    /// token is rejected. Returns the raw body of a successful response.
    async fn execute<F>(&self, method: Method, url: &Url, configure: F) -> ApiResult<String>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let mut retried = false;
        loop {
            self.inner.rate_limiter.acquire().await;
            let token = self.inner.tokens.bearer_token().await?;

            let mut request = configure(self.inner.http.request(method.clone(), url.clone()))
                .bearer_auth(token);
            if let Some(app_name) = &self.inner.app_name {
                request = request.header(APPLICATION_HEADER, app_name);
            }

            debug!(%method, %url, "sending request");
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            debug!(%method, %url, %status, "received response");

            if status.is_success() {
                return Ok(body);
            }

            if status == StatusCode::UNAUTHORIZED && !retried && self.inner.tokens.can_refresh() {
                warn!(%url, "access token rejected; refreshing and retrying once");
                self.inner.tokens.invalidate().await;
                retried = true;
                continue;
            }

            return Err(ApiError::from_response(status, body));
        }
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    // Empty success bodies decode as JSON null
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|e| ApiError::Decode(format!("{}: {}", e, body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_url: &str) -> ApiClient {
        let credentials = ApiCredentials::with_access_token(api_url, "pat").unwrap();
        ApiClient::new(&credentials).unwrap()
    }

    #[test]
    fn endpoint_keeps_base_path_and_encodes_segments() {
        let client = client("https://tenant.example.com/api");
        let url = client
            .endpoint(&["instruments", "Figi", "BBG 000/X"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://tenant.example.com/api/instruments/Figi/BBG%20000%2FX"
        );
    }

    #[test]
    fn endpoint_allows_dollar_actions() {
        let client = client("https://tenant.example.com/api/");
        let url = client.endpoint(&["instruments", "$get"]).unwrap();
        assert_eq!(url.path(), "/api/instruments/$get");
    }

    #[test]
    fn decode_reports_body_on_failure() {
        let err = decode::<Vec<u32>>("{\"oops\":1}").unwrap_err();
        assert!(matches!(err, ApiError::Decode(msg) if msg.contains("oops")));
    }

    #[test]
    fn decode_empty_body_as_null() {
        let value: Option<u32> = decode("").unwrap();
        assert!(value.is_none());
    }
}
