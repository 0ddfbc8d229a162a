//! Instrument Master Client
//!
//! This crate provides typed access to two surfaces of the instrument master
//! REST service:
//! - Instruments API (upsert, lookup, list, delete, property upserts)
//! - Property Definitions API (get, create, idempotent ensure)
//!
//! Clients are built by [`factory::ApiClientFactory`] from a secrets file or
//! the environment. Every surface implements [`factory::ApiSurface`].

use reqwest::StatusCode;
use thiserror::Error;

pub mod auth;
pub mod credentials;
pub mod factory;
pub mod instruments;
pub mod models;
pub mod property_definitions;
pub mod transport;

pub use credentials::ApiCredentials;
pub use factory::{ApiClientFactory, ApiSurface};
pub use instruments::InstrumentsApi;
pub use property_definitions::{
    ensure_property_definition, EnsureOutcome, PropertyDefinitionStore, PropertyDefinitionsApi,
};

/// Client error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Remote API error: {status} {name} - {body}")]
    Remote {
        status: u16,
        name: String,
        body: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Classify a non-success response by status code and the `name` field
    /// of the remote error body. The body is kept verbatim.
    pub fn from_response(status: StatusCode, body: String) -> Self {
        let name = serde_json::from_str::<models::RemoteErrorBody>(&body)
            .map(|err| err.name)
            .unwrap_or_default();

        if name.ends_with("AlreadyExists") || status == StatusCode::CONFLICT {
            return ApiError::AlreadyExists(body);
        }
        if name.ends_with("NotFound") || status == StatusCode::NOT_FOUND {
            return ApiError::NotFound(body);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return ApiError::Authentication(body);
        }

        ApiError::Remote {
            status: status.as_u16(),
            name,
            body,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ApiError::AlreadyExists(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Result of a lookup where absence is an expected answer rather than a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

/// Turns a `NotFound` error into [`Lookup::NotFound`], leaving every other
/// error in place.
pub trait IntoLookup<T> {
    fn into_lookup(self) -> ApiResult<Lookup<T>>;
}

impl<T> IntoLookup<T> for ApiResult<T> {
    fn into_lookup(self) -> ApiResult<Lookup<T>> {
        match self {
            Ok(value) => Ok(Lookup::Found(value)),
            Err(ApiError::NotFound(_)) => Ok(Lookup::NotFound),
            Err(err) => Err(err),
        }
    }
}

/// Client-side throttle for outgoing API calls
pub struct RateLimiter {
    governor: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        use governor::{Quota, RateLimiter as GovernorRateLimiter};
        use std::num::NonZeroU32;

        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = GovernorRateLimiter::direct(Quota::per_second(per_second));

        Self { governor: limiter }
    }

    pub async fn acquire(&self) {
        self.governor.until_ready().await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_exists_is_classified_by_error_name() {
        let body = r#"{"name":"PropertyAlreadyExists","status":400,"title":"Property already exists"}"#;
        let err = ApiError::from_response(StatusCode::BAD_REQUEST, body.to_string());
        assert!(err.is_already_exists());
    }

    #[test]
    fn conflict_status_is_already_exists() {
        let err = ApiError::from_response(StatusCode::CONFLICT, String::new());
        assert!(err.is_already_exists());
    }

    #[test]
    fn not_found_by_status_or_name() {
        let by_status = ApiError::from_response(StatusCode::NOT_FOUND, "gone".to_string());
        assert!(by_status.is_not_found());

        let body = r#"{"name":"PropertyNotFound","status":400}"#;
        let by_name = ApiError::from_response(StatusCode::BAD_REQUEST, body.to_string());
        assert!(by_name.is_not_found());
    }

    #[test]
    fn other_failures_keep_the_body_verbatim() {
        let body = r#"{"name":"ValidationError","status":400,"detail":"bad scope"}"#;
        match ApiError::from_response(StatusCode::BAD_REQUEST, body.to_string()) {
            ApiError::Remote {
                status,
                name,
                body: kept,
            } => {
                assert_eq!(status, 400);
                assert_eq!(name, "ValidationError");
                assert_eq!(kept, body);
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn unauthorized_maps_to_authentication() {
        let err = ApiError::from_response(StatusCode::UNAUTHORIZED, "nope".to_string());
        assert!(matches!(err, ApiError::Authentication(_)));
    }

    #[test]
    fn into_lookup_only_swallows_not_found() {
        let found: ApiResult<u32> = Ok(7);
        assert_eq!(found.into_lookup().unwrap(), Lookup::Found(7));

        let missing: ApiResult<u32> = Err(ApiError::NotFound("x".into()));
        assert_eq!(missing.into_lookup().unwrap(), Lookup::NotFound);

        let failed: ApiResult<u32> = Err(ApiError::Network("reset".into()));
        assert!(failed.into_lookup().is_err());

        assert_eq!(Lookup::Found(7).found(), Some(7));
        assert_eq!(Lookup::<u32>::NotFound.found(), None);
    }

    #[tokio::test]
    async fn rate_limiter_accepts_zero_as_one_per_second() {
        let limiter = RateLimiter::new(0);
        limiter.acquire().await;
    }
}
