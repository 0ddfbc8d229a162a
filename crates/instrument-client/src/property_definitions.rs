//! Property Definitions API surface and the idempotent ensure helper.
//!
//! [`ensure_property_definition`] looks the definition up first and only
//! creates it when the lookup reports not-found. A create that loses a race
//! against another creator (the service answers AlreadyExists) counts as
//! success, so several processes may ensure the same key at once.

use crate::factory::ApiSurface;
use crate::models::{CreatePropertyDefinitionRequest, PropertyDefinition, PropertyKey};
use crate::transport::{ApiClient, Query};
use crate::{ApiError, ApiResult, IntoLookup, Lookup};
use async_trait::async_trait;
use tracing::{debug, info};

const PROPERTY_DEFINITIONS: &str = "propertydefinitions";

/// How a definition came to be present after [`ensure_property_definition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The lookup found it; nothing was written
    AlreadyPresent,
    /// This call created it
    Created,
    /// Absent on lookup, but another creator got there first
    CreatedConcurrently,
}

/// Remote operations the ensure policy needs
#[async_trait]
pub trait PropertyDefinitionStore: Send + Sync {
    async fn find(&self, key: &PropertyKey) -> ApiResult<Lookup<PropertyDefinition>>;

    async fn create(
        &self,
        request: &CreatePropertyDefinitionRequest,
    ) -> ApiResult<PropertyDefinition>;
}

/// Make sure the definition described by `request` exists.
///
/// Only NotFound on the lookup and AlreadyExists on the create are
/// tolerated; every other failure propagates unchanged.
pub async fn ensure_property_definition<S>(
    store: &S,
    request: &CreatePropertyDefinitionRequest,
) -> ApiResult<EnsureOutcome>
where
    S: PropertyDefinitionStore + ?Sized,
{
    let key = request.key();

    if store.find(&key).await?.is_found() {
        debug!(%key, "property definition already present");
        return Ok(EnsureOutcome::AlreadyPresent);
    }

    match store.create(request).await {
        Ok(_) => {
            info!(%key, "property definition created");
            Ok(EnsureOutcome::Created)
        }
        Err(ApiError::AlreadyExists(_)) => {
            debug!(%key, "property definition created concurrently");
            Ok(EnsureOutcome::CreatedConcurrently)
        }
        Err(err) => Err(err),
    }
}

#[derive(Debug, Clone)]
pub struct PropertyDefinitionsApi {
    client: ApiClient,
}

impl ApiSurface for PropertyDefinitionsApi {
    const NAME: &'static str = "property-definitions";

    fn from_client(client: ApiClient) -> Self {
        Self { client }
    }

    fn client(&self) -> &ApiClient {
        &self.client
    }
}

impl PropertyDefinitionsApi {
    /// Fails with [`ApiError::NotFound`] when the definition does not exist
    pub async fn get_property_definition(
        &self,
        domain: &str,
        scope: &str,
        code: &str,
    ) -> ApiResult<PropertyDefinition> {
        self.client
            .get(&[PROPERTY_DEFINITIONS, domain, scope, code], &Query::new())
            .await
    }

    /// Fails with [`ApiError::AlreadyExists`] when the key is taken
    pub async fn create_property_definition(
        &self,
        request: &CreatePropertyDefinitionRequest,
    ) -> ApiResult<PropertyDefinition> {
        debug!(key = %request.key(), "creating property definition");
        self.client
            .post(&[PROPERTY_DEFINITIONS], &Query::new(), request)
            .await
    }

    pub async fn ensure(&self, request: &CreatePropertyDefinitionRequest) -> ApiResult<EnsureOutcome> {
        ensure_property_definition(self, request).await
    }
}

#[async_trait]
impl PropertyDefinitionStore for PropertyDefinitionsApi {
    async fn find(&self, key: &PropertyKey) -> ApiResult<Lookup<PropertyDefinition>> {
        self.get_property_definition(&key.domain, &key.scope, &key.code)
            .await
            .into_lookup()
    }

    async fn create(
        &self,
        request: &CreatePropertyDefinitionRequest,
    ) -> ApiResult<PropertyDefinition> {
        self.create_property_definition(request).await
    }
}
