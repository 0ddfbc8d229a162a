//! Request and response bodies exchanged with the instrument master service.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Error body returned by the service on non-success responses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteErrorBody {
    pub name: String,
    pub status: u16,
    pub title: Option<String>,
    pub detail: Option<String>,
    pub code: Option<i64>,
}

/// Per-item failure reported inside an otherwise successful batch response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorDetail {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentIdValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_at: Option<String>,
}

impl InstrumentIdValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            effective_at: None,
        }
    }
}

/// Instrument as submitted to an upsert, keyed by identifier type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentDefinition {
    pub name: String,
    pub identifiers: BTreeMap<String, InstrumentIdValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
}

impl InstrumentDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifiers: BTreeMap::new(),
            properties: Vec::new(),
        }
    }

    pub fn with_identifier(
        mut self,
        identifier_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.identifiers
            .insert(identifier_type.into(), InstrumentIdValue::new(value));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_value: Option<MetricValue>,
}

impl PropertyValue {
    pub fn label(value: impl Into<String>) -> Self {
        Self {
            label_value: Some(value.into()),
            metric_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub key: String,
    pub value: PropertyValue,
}

impl Property {
    pub fn label(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: PropertyValue::label(value),
        }
    }
}

/// Instrument as stored by the service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Instrument {
    #[serde(rename = "lusidInstrumentId")]
    pub instrument_uid: String,
    pub name: String,
    pub identifiers: HashMap<String, String>,
    pub properties: Vec<Property>,
    pub state: Option<String>,
}

impl Instrument {
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.key == key)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.property(key)
            .and_then(|p| p.value.label_value.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpsertInstrumentsResponse {
    pub values: HashMap<String, Instrument>,
    pub failed: HashMap<String, ErrorDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetInstrumentsResponse {
    pub values: HashMap<String, Instrument>,
    pub failed: HashMap<String, ErrorDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceList<T> {
    pub values: Vec<T>,
    pub next_page: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstrumentIdTypeDescriptor {
    pub identifier_type: String,
    pub property_key: String,
    pub is_unique_identifier_type: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertInstrumentPropertyRequest {
    pub identifier_type: String,
    pub identifier: String,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpsertInstrumentPropertiesResponse {
    pub as_at_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub scope: String,
    pub code: String,
}

impl ResourceId {
    pub fn new(scope: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            code: code.into(),
        }
    }

    pub fn system_string() -> Self {
        Self::new("system", "string")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeTime {
    Perpetual,
    TimeVariant,
}

/// Composite identity of a property definition: domain, scope and code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyKey {
    pub domain: String,
    pub scope: String,
    pub code: String,
}

impl PropertyKey {
    pub fn new(
        domain: impl Into<String>,
        scope: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            scope: scope.into(),
            code: code.into(),
        }
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.domain, self.scope, self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyDefinitionRequest {
    pub domain: String,
    pub scope: String,
    pub code: String,
    pub display_name: String,
    pub data_type_id: ResourceId,
    pub life_time: LifeTime,
    pub value_required: bool,
}

impl CreatePropertyDefinitionRequest {
    /// Perpetual, optional string-valued property
    pub fn string_label(key: &PropertyKey, display_name: impl Into<String>) -> Self {
        Self {
            domain: key.domain.clone(),
            scope: key.scope.clone(),
            code: key.code.clone(),
            display_name: display_name.into(),
            data_type_id: ResourceId::system_string(),
            life_time: LifeTime::Perpetual,
            value_required: false,
        }
    }

    pub fn key(&self) -> PropertyKey {
        PropertyKey::new(&self.domain, &self.scope, &self.code)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyDefinition {
    pub key: String,
    pub domain: String,
    pub scope: String,
    pub code: String,
    pub display_name: String,
    pub data_type_id: Option<ResourceId>,
    pub life_time: Option<LifeTime>,
    pub value_required: bool,
}
