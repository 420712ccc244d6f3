//! Metadata bags attached to service instances and interfaces.
//!
//! Registry records carry free-form nested key/value maps. The broker only
//! understands a handful of well-known keys; everything else is kept opaque
//! and passed through untouched.

use super::{BridgeDomainError, DataModelId, InterfaceTemplateName, OperationName};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Key of the interface bridging declaration of an interface translator.
pub const INTERFACE_BRIDGE_KEY: &str = "interfaceBridge";
/// Sub-key listing the consumer-side interface templates a translator accepts.
pub const BRIDGE_FROM_KEY: &str = "from";
/// Sub-key naming the target-side interface template a translator speaks.
pub const BRIDGE_TO_KEY: &str = "to";
/// Key listing the `[from, to]` data model pairs a data model translator supports.
pub const DATA_MODEL_IDS_KEY: &str = "dataModelIds";
/// Interface property mapping operations to their declared data models.
pub const DATA_MODELS_KEY: &str = "dataModels";
/// Sub-key of an operation's input data model.
pub const INPUT_KEY: &str = "input";
/// Sub-key of an operation's output data model.
pub const OUTPUT_KEY: &str = "output";
/// Interface property listing reachable host addresses.
pub const ACCESS_ADDRESSES_KEY: &str = "accessAddresses";
/// Interface property holding the TCP port.
pub const ACCESS_PORT_KEY: &str = "accessPort";
/// Interface property holding an optional base path.
pub const BASE_PATH_KEY: &str = "basePath";
/// Interface property mapping operation names to `{method, path}` overrides.
pub const OPERATIONS_KEY: &str = "operations";

const PATH_SEPARATOR: char = '.';

/// Free-form metadata or interface properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

/// Data models an interface declares for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredDataModels {
    /// Data model of the request payload.
    pub input: Option<DataModelId>,
    /// Data model of the response payload.
    pub output: Option<DataModelId>,
}

/// Per-operation HTTP method and path override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationOverride {
    /// HTTP method, when overridden.
    pub method: Option<String>,
    /// Path relative to the base path, when overridden.
    pub path: Option<String>,
}

impl Metadata {
    /// Creates an empty metadata bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing JSON object.
    #[must_use]
    pub const fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Returns the underlying JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the bag and returns the underlying JSON object.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Returns whether the bag has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the value stored under a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the value stored under a dotted path such as `interfaceBridge.to`.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split(PATH_SEPARATOR);
        let first = self.0.get(segments.next()?)?;
        segments.try_fold(first, |current, segment| current.as_object()?.get(segment))
    }

    /// Returns the bag with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the consumer-side templates an interface translator accepts.
    #[must_use]
    pub fn bridge_from(&self) -> Vec<InterfaceTemplateName> {
        self.template_list(BRIDGE_FROM_KEY)
    }

    /// Returns the target-side templates an interface translator speaks.
    #[must_use]
    pub fn bridge_to(&self) -> Vec<InterfaceTemplateName> {
        self.template_list(BRIDGE_TO_KEY)
    }

    fn template_list(&self, sub_key: &str) -> Vec<InterfaceTemplateName> {
        let path = format!("{INTERFACE_BRIDGE_KEY}{PATH_SEPARATOR}{sub_key}");
        self.lookup(&path)
            .map(texts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|text| InterfaceTemplateName::new(text).ok())
            .collect()
    }

    /// Returns whether a data model translator declares the `(from, to)` pair.
    #[must_use]
    pub fn supports_data_model_pair(&self, from: &DataModelId, to: &DataModelId) -> bool {
        MetadataRequirement::data_model_pair(from, to).matches(self)
    }

    /// Returns the declared access addresses of an HTTP interface.
    #[must_use]
    pub fn access_addresses(&self) -> Vec<String> {
        self.get(ACCESS_ADDRESSES_KEY)
            .map(texts)
            .unwrap_or_default()
    }

    /// Returns the declared access port of an HTTP interface.
    #[must_use]
    pub fn access_port(&self) -> Option<u16> {
        match self.get(ACCESS_PORT_KEY)? {
            Value::Number(number) => number.as_u64().and_then(|port| u16::try_from(port).ok()),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the declared base path of an HTTP interface.
    #[must_use]
    pub fn base_path(&self) -> Option<&str> {
        self.get(BASE_PATH_KEY).and_then(Value::as_str)
    }

    /// Returns the `{method, path}` override declared for `operation`.
    #[must_use]
    pub fn operation_override(&self, operation: &str) -> Option<OperationOverride> {
        let entry = self.get(OPERATIONS_KEY)?.as_object()?.get(operation)?.as_object()?;
        Some(OperationOverride {
            method: entry.get("method").and_then(text),
            path: entry.get("path").and_then(text),
        })
    }

    /// Returns the data models this interface declares for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeDomainError::InvalidDataModelId`] when a declared
    /// identifier is malformed.
    pub fn declared_data_models(
        &self,
        operation: &OperationName,
    ) -> Result<DeclaredDataModels, BridgeDomainError> {
        let Some(entry) = self
            .get(DATA_MODELS_KEY)
            .and_then(Value::as_object)
            .and_then(|models| models.get(operation.as_str()))
            .and_then(Value::as_object)
        else {
            return Ok(DeclaredDataModels::default());
        };
        let parse = |key: &str| {
            entry
                .get(key)
                .and_then(text)
                .map(DataModelId::new)
                .transpose()
        };
        Ok(DeclaredDataModels {
            input: parse(INPUT_KEY)?,
            output: parse(OUTPUT_KEY)?,
        })
    }

    /// Returns a copy whose `dataModels` entry only describes `operation`.
    #[must_use]
    pub fn with_declared_data_models(
        &self,
        operation: &OperationName,
        declared: &DeclaredDataModels,
    ) -> Self {
        let mut models = Map::new();
        models.insert(
            INPUT_KEY.to_owned(),
            declared
                .input
                .as_ref()
                .map_or(Value::Null, |id| Value::from(id.as_str())),
        );
        models.insert(
            OUTPUT_KEY.to_owned(),
            declared
                .output
                .as_ref()
                .map_or(Value::Null, |id| Value::from(id.as_str())),
        );
        let mut by_operation = Map::new();
        by_operation.insert(operation.as_str().to_owned(), Value::Object(models));

        let mut copy = self.0.clone();
        copy.insert(DATA_MODELS_KEY.to_owned(), Value::Object(by_operation));
        Self(copy)
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(inner) => Some(inner.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Reads a scalar or a list of scalars as text.
fn texts(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        other => text(other).into_iter().collect(),
    }
}

/// Comparison operator of a metadata predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataOperator {
    /// The metadata value equals the expected value.
    Equals,
    /// The metadata value (or every element of it) is one of the expected values.
    In,
    /// The metadata list contains the expected element, or the metadata
    /// string contains the expected substring.
    Contains,
    /// The metadata value shares at least one element with the expected list.
    ContainsAny,
}

/// One predicate of a metadata requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPredicate {
    /// Comparison operator.
    pub op: MetadataOperator,
    /// Expected value.
    pub value: Value,
}

impl MetadataPredicate {
    /// Evaluates the predicate against an actual metadata value.
    #[must_use]
    pub fn matches(&self, actual: &Value) -> bool {
        match self.op {
            MetadataOperator::Equals => actual == &self.value,
            MetadataOperator::In => {
                let Value::Array(allowed) = &self.value else {
                    return actual == &self.value;
                };
                match actual {
                    Value::Array(items) => items.iter().all(|item| allowed.contains(item)),
                    scalar => allowed.contains(scalar),
                }
            }
            MetadataOperator::Contains => match (actual, &self.value) {
                (Value::Array(items), expected) => items.contains(expected),
                (Value::String(haystack), Value::String(needle)) => haystack.contains(needle),
                _ => false,
            },
            MetadataOperator::ContainsAny => {
                let Value::Array(wanted) = &self.value else {
                    return false;
                };
                match actual {
                    Value::Array(items) => items.iter().any(|item| wanted.contains(item)),
                    scalar => wanted.contains(scalar),
                }
            }
        }
    }
}

/// Conjunction of predicates over dotted metadata paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataRequirement(BTreeMap<String, MetadataPredicate>);

impl MetadataRequirement {
    /// Creates an empty requirement, which every metadata bag satisfies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the requirement extended with a predicate on `path`.
    #[must_use]
    pub fn with(
        mut self,
        path: impl Into<String>,
        op: MetadataOperator,
        value: impl Into<Value>,
    ) -> Self {
        self.0.insert(
            path.into(),
            MetadataPredicate {
                op,
                value: value.into(),
            },
        );
        self
    }

    /// Requirement satisfied by data model translators supporting `from -> to`.
    #[must_use]
    pub fn data_model_pair(from: &DataModelId, to: &DataModelId) -> Self {
        Self::new().with(
            DATA_MODEL_IDS_KEY,
            MetadataOperator::Contains,
            Value::from(vec![from.as_str(), to.as_str()]),
        )
    }

    /// Returns whether the requirement has no predicates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns whether `metadata` satisfies every predicate.
    #[must_use]
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.0.iter().all(|(path, predicate)| {
            metadata
                .lookup(path)
                .is_some_and(|actual| predicate.matches(actual))
        })
    }
}
