//! API client factory.
//!
//! The factory resolves credentials once and hands out surface clients that
//! share a single HTTP connection pool and token cache. Building a surface
//! never touches the network.

use crate::credentials::ApiCredentials;
use crate::transport::ApiClient;
use crate::ApiResult;
use std::path::Path;
use tracing::{debug, info};

/// A named group of remote operations bound to an authenticated client
pub trait ApiSurface: Sized {
    /// Name used in logs
    const NAME: &'static str;

    fn from_client(client: ApiClient) -> Self;

    fn client(&self) -> &ApiClient;
}

#[derive(Debug, Clone)]
pub struct ApiClientFactory {
    credentials: ApiCredentials,
    client: ApiClient,
}

impl ApiClientFactory {
    /// Create a factory from a JSON secrets file
    pub fn from_secrets_file(path: impl AsRef<Path>) -> ApiResult<Self> {
        Self::from_credentials(ApiCredentials::from_secrets_file(path)?)
    }

    /// Create a factory from `FBN_*` environment variables
    pub fn from_env() -> ApiResult<Self> {
        Self::from_credentials(ApiCredentials::from_env()?)
    }

    pub fn from_credentials(credentials: ApiCredentials) -> ApiResult<Self> {
        credentials.validate()?;
        let client = ApiClient::new(&credentials)?;
        info!(api_url = %credentials.api_url, "API client factory ready");
        Ok(Self {
            credentials,
            client,
        })
    }

    /// Build a client for the requested surface, e.g.
    /// `factory.build::<InstrumentsApi>()`
    pub fn build<A: ApiSurface>(&self) -> A {
        debug!(surface = A::NAME, "building API surface client");
        A::from_client(self.client.clone())
    }

    pub fn credentials(&self) -> &ApiCredentials {
        &self.credentials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InstrumentsApi, PropertyDefinitionsApi};

    #[test]
    fn surfaces_share_the_base_url() {
        let credentials =
            ApiCredentials::with_access_token("https://tenant.example.com/api", "pat").unwrap();
        let factory = ApiClientFactory::from_credentials(credentials).unwrap();

        let instruments: InstrumentsApi = factory.build();
        let properties: PropertyDefinitionsApi = factory.build();

        assert_eq!(instruments.client().base_url(), properties.client().base_url());
        assert_eq!(instruments.client().base_url(), &factory.credentials().api_url);
        assert_eq!(InstrumentsApi::NAME, "instruments");
        assert_eq!(PropertyDefinitionsApi::NAME, "property-definitions");
    }
}
