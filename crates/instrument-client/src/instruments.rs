//! Instruments API surface

use crate::factory::ApiSurface;
use crate::models::{
    GetInstrumentsResponse, Instrument, InstrumentDefinition, InstrumentIdTypeDescriptor,
    ResourceList, UpsertInstrumentPropertiesResponse, UpsertInstrumentPropertyRequest,
    UpsertInstrumentsResponse,
};
use crate::transport::{ApiClient, Query};
use crate::{ApiResult, IntoLookup, Lookup};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

const INSTRUMENTS: &str = "instruments";

/// Convenience for lookups that request no properties
pub const NO_PROPERTY_KEYS: &[&str] = &[];

#[derive(Debug, Clone)]
pub struct InstrumentsApi {
    client: ApiClient,
}

impl ApiSurface for InstrumentsApi {
    const NAME: &'static str = "instruments";

    fn from_client(client: ApiClient) -> Self {
        Self { client }
    }

    fn client(&self) -> &ApiClient {
        &self.client
    }
}

fn property_key_query<'a, S: AsRef<str>>(query: &mut Query<'a>, property_keys: &[S]) {
    query.extend(
        property_keys
            .iter()
            .map(|key| ("propertyKeys", key.as_ref().to_string())),
    );
}

impl InstrumentsApi {
    /// Insert or update instruments keyed by a caller-chosen correlation id.
    /// Entries the service rejects come back in `failed`.
    pub async fn upsert_instruments(
        &self,
        request: &BTreeMap<String, InstrumentDefinition>,
    ) -> ApiResult<UpsertInstrumentsResponse> {
        debug!(count = request.len(), "upserting instruments");
        let response: UpsertInstrumentsResponse =
            self.client.post(&[INSTRUMENTS], &Query::new(), request).await?;

        if !response.failed.is_empty() {
            warn!(
                failed = response.failed.len(),
                "some instruments were rejected by the upsert"
            );
        }
        info!(
            upserted = response.values.len(),
            "instrument upsert complete"
        );
        Ok(response)
    }

    /// Batch lookup by one identifier type
    pub async fn get_instruments<S, K>(
        &self,
        identifier_type: &str,
        identifiers: &[S],
        property_keys: &[K],
    ) -> ApiResult<GetInstrumentsResponse>
    where
        S: AsRef<str>,
        K: AsRef<str>,
    {
        let mut query: Query<'_> = vec![("identifierType", identifier_type.to_string())];
        property_key_query(&mut query, property_keys);

        let ids: Vec<&str> = identifiers.iter().map(|id| id.as_ref()).collect();
        self.client
            .post(&[INSTRUMENTS, "$get"], &query, &ids)
            .await
    }

    pub async fn get_instrument<K: AsRef<str>>(
        &self,
        identifier_type: &str,
        identifier: &str,
        property_keys: &[K],
    ) -> ApiResult<Instrument> {
        let mut query = Query::new();
        property_key_query(&mut query, property_keys);

        self.client
            .get(&[INSTRUMENTS, identifier_type, identifier], &query)
            .await
    }

    /// Like [`Self::get_instrument`] but reports absence as [`Lookup::NotFound`]
    pub async fn find_instrument<K: AsRef<str>>(
        &self,
        identifier_type: &str,
        identifier: &str,
        property_keys: &[K],
    ) -> ApiResult<Lookup<Instrument>> {
        self.get_instrument(identifier_type, identifier, property_keys)
            .await
            .into_lookup()
    }

    /// First page of instruments, at most `limit` entries when given
    pub async fn list_instruments(&self, limit: Option<u32>) -> ApiResult<ResourceList<Instrument>> {
        let mut query = Query::new();
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.client.get(&[INSTRUMENTS], &query).await
    }

    pub async fn get_instrument_identifier_types(
        &self,
    ) -> ApiResult<ResourceList<InstrumentIdTypeDescriptor>> {
        self.client
            .get(&[INSTRUMENTS, "identifierTypes"], &Query::new())
            .await
    }

    pub async fn delete_instrument(&self, identifier_type: &str, identifier: &str) -> ApiResult<()> {
        debug!(identifier_type, identifier, "deleting instrument");
        self.client
            .delete(&[INSTRUMENTS, identifier_type, identifier])
            .await
    }

    pub async fn upsert_instruments_properties(
        &self,
        requests: &[UpsertInstrumentPropertyRequest],
    ) -> ApiResult<UpsertInstrumentPropertiesResponse> {
        debug!(count = requests.len(), "upserting instrument properties");
        let response: Option<UpsertInstrumentPropertiesResponse> = self
            .client
            .post(&[INSTRUMENTS, "$upsertproperties"], &Query::new(), requests)
            .await?;
        Ok(response.unwrap_or_default())
    }
}
