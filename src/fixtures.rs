//! Fixture data and the per-suite fixture context.
//!
//! [`FixtureContext`] is built once per test suite and passed by reference to
//! each test. [`InstrumentLoader`] seeds and removes the fixed set of five
//! fixture instruments.

use crate::config::HarnessConfig;
use instrument_client::models::{
    CreatePropertyDefinitionRequest, Instrument, InstrumentDefinition, PropertyKey,
};
use instrument_client::{
    ApiClientFactory, ApiError, ApiResult, EnsureOutcome, InstrumentsApi, PropertyDefinitionsApi,
};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{info, warn};

pub const FIGI: &str = "Figi";
pub const CLIENT_INTERNAL: &str = "ClientInternal";
pub const INSTRUMENT_DOMAIN: &str = "Instrument";

/// Property key the service maintains for the client-internal identifier
pub const CLIENT_INTERNAL_PROPERTY_KEY: &str = "Instrument/default/ClientInternal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentSpec {
    pub figi: &'static str,
    pub name: &'static str,
}

/// Instruments seeded by [`InstrumentLoader`]
pub const FIXTURE_INSTRUMENTS: [InstrumentSpec; 5] = [
    InstrumentSpec { figi: "BBG000HD53D6", name: "AVIVA PLC" },
    InstrumentSpec { figi: "BBG004QC8KB1", name: "NEWS CORP - CLASS A" },
    InstrumentSpec { figi: "BBG008HKT8K8", name: "DOMTAR CORP" },
    InstrumentSpec { figi: "BBG00D87QJR8", name: "MARKS & SPENCER" },
    InstrumentSpec { figi: "BBG0007G3X64", name: "ASDA GROUP PLC" },
];

/// Instruments used by the instrument-master walkthrough, each with a
/// client-internal identifier alongside its FIGI
pub const TUTORIAL_INSTRUMENTS: [(InstrumentSpec, &str); 5] = [
    (InstrumentSpec { figi: "BBG000FSK0Y1", name: "REDDE PLC" }, "internal_id_1_example2"),
    (InstrumentSpec { figi: "BBG003FZ2QK7", name: "SYNCONA LTD" }, "internal_id_2_example2"),
    (InstrumentSpec { figi: "BBG0058ZH3C4", name: "RENEWABLES INFRASTRUCTURE GR" }, "internal_id_3_example2"),
    (InstrumentSpec { figi: "BBG000GRLN26", name: "SPECTRIS PLC" }, "internal_id_4_example2"),
    (InstrumentSpec { figi: "BBG0027KC0S9", name: "RHI MAGNESITA INDIA LTD" }, "internal_id_5_example2"),
];

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("service rejected fixture instruments: {0:?}")]
    Rejected(Vec<String>),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Upsert request for the fixture instruments, keyed by FIGI
pub fn fixture_definitions() -> BTreeMap<String, InstrumentDefinition> {
    FIXTURE_INSTRUMENTS
        .iter()
        .map(|fixture| {
            (
                fixture.figi.to_string(),
                InstrumentDefinition::new(fixture.name).with_identifier(FIGI, fixture.figi),
            )
        })
        .collect()
}

/// Upsert request for the tutorial instruments. A `run_id` suffix keeps the
/// client-internal ids of concurrent runs apart.
pub fn tutorial_definitions(run_id: Option<&str>) -> BTreeMap<String, InstrumentDefinition> {
    TUTORIAL_INSTRUMENTS
        .iter()
        .map(|(fixture, internal_id)| {
            let internal_id = match run_id {
                Some(run_id) => format!("{}_{}", internal_id, run_id),
                None => internal_id.to_string(),
            };
            (
                fixture.figi.to_string(),
                InstrumentDefinition::new(fixture.name)
                    .with_identifier(FIGI, fixture.figi)
                    .with_identifier(CLIENT_INTERNAL, internal_id),
            )
        })
        .collect()
}

/// Expected identifiers that are absent from a lookup response
pub fn missing_identifiers<'a>(
    values: &HashMap<String, Instrument>,
    expected: &[&'a str],
) -> Vec<&'a str> {
    expected
        .iter()
        .copied()
        .filter(|id| !values.contains_key(*id))
        .collect()
}

/// Seeds and deletes the fixture instruments
#[derive(Debug, Clone)]
pub struct InstrumentLoader {
    instruments_api: InstrumentsApi,
}

impl InstrumentLoader {
    pub fn new(instruments_api: InstrumentsApi) -> Self {
        Self { instruments_api }
    }

    /// Upsert the fixture instruments and return their service-assigned ids, sorted
    pub async fn load_instruments(&self) -> Result<Vec<String>, FixtureError> {
        let response = self
            .instruments_api
            .upsert_instruments(&fixture_definitions())
            .await?;

        if !response.failed.is_empty() {
            let mut rejected: Vec<String> = response.failed.into_keys().collect();
            rejected.sort();
            return Err(FixtureError::Rejected(rejected));
        }

        let mut ids: Vec<String> = response
            .values
            .into_values()
            .map(|instrument| instrument.instrument_uid)
            .collect();
        ids.sort();

        info!(count = ids.len(), "fixture instruments loaded");
        Ok(ids)
    }

    /// Delete the fixture instruments. Instruments that are already gone are skipped.
    pub async fn delete_instruments(&self) -> Result<(), FixtureError> {
        for fixture in &FIXTURE_INSTRUMENTS {
            match self.instruments_api.delete_instrument(FIGI, fixture.figi).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {
                    warn!(figi = fixture.figi, "fixture instrument already deleted");
                }
                Err(err) => return Err(err.into()),
            }
        }
        info!("fixture instruments deleted");
        Ok(())
    }
}

/// API clients and settings shared by every test in a suite
#[derive(Debug, Clone)]
pub struct FixtureContext {
    pub instruments_api: InstrumentsApi,
    pub property_definitions_api: PropertyDefinitionsApi,
    pub scope: String,
}

impl FixtureContext {
    pub fn from_factory(factory: &ApiClientFactory, scope: impl Into<String>) -> Self {
        Self {
            instruments_api: factory.build(),
            property_definitions_api: factory.build(),
            scope: scope.into(),
        }
    }

    /// Build the factory from the configured secrets file, or the
    /// environment when none is configured
    pub fn from_config(config: &HarnessConfig) -> Result<Self, FixtureError> {
        let factory = match &config.secrets_path {
            Some(path) => ApiClientFactory::from_secrets_file(path)?,
            None => ApiClientFactory::from_env()?,
        };
        info!(api_url = %factory.credentials().api_url, "API client factory ready");
        Ok(Self::from_factory(&factory, config.tutorials_scope.clone()))
    }

    pub fn loader(&self) -> InstrumentLoader {
        InstrumentLoader::new(self.instruments_api.clone())
    }

    /// Identity of an instrument property in this context's scope
    pub fn instrument_property(&self, code: &str) -> PropertyKey {
        PropertyKey::new(INSTRUMENT_DOMAIN, &self.scope, code)
    }

    /// Make sure a string-valued instrument property exists in this scope and
    /// return its key, e.g. `Instrument/tutorials/CustomSector`
    pub async fn ensure_instrument_property(
        &self,
        code: &str,
        display_name: &str,
    ) -> ApiResult<(String, EnsureOutcome)> {
        let key = self.instrument_property(code);
        let request = CreatePropertyDefinitionRequest::string_label(&key, display_name);
        let outcome = self.property_definitions_api.ensure(&request).await?;
        Ok((key.to_string(), outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_definitions_are_keyed_by_figi() {
        let definitions = fixture_definitions();
        assert_eq!(definitions.len(), 5);
        for fixture in FIXTURE_INSTRUMENTS {
            let definition = &definitions[fixture.figi];
            assert_eq!(definition.name, fixture.name);
            assert_eq!(definition.identifiers[FIGI].value, fixture.figi);
        }
    }

    #[test]
    fn tutorial_run_id_suffixes_client_internal_only() {
        let definitions = tutorial_definitions(Some("run42"));
        let redde = &definitions["BBG000FSK0Y1"];
        assert_eq!(redde.identifiers[FIGI].value, "BBG000FSK0Y1");
        assert_eq!(
            redde.identifiers[CLIENT_INTERNAL].value,
            "internal_id_1_example2_run42"
        );

        let fixed = tutorial_definitions(None);
        assert_eq!(
            fixed["BBG000FSK0Y1"].identifiers[CLIENT_INTERNAL].value,
            "internal_id_1_example2"
        );
    }

    #[test]
    fn missing_identifiers_lists_absent_entries() {
        let mut values = HashMap::new();
        values.insert("A".to_string(), Instrument::default());
        assert_eq!(missing_identifiers(&values, &["A", "B"]), vec!["B"]);
    }
}
