//! Untyped record and payload values exchanged with connectors.
//!
//! # Responsibility
//! - Carry backend-returned key/value bags before they become typed entities.
//! - Provide the explicit encode/decode step between typed values and records.
//!
//! # Invariants
//! - Decoding never guesses: a shape mismatch is a `Serialization` error.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::error::{StoreError, StoreResult};

/// One stored entity instance, as returned by a backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes a typed value into a record.
    ///
    /// Fails when the value does not serialize to a JSON object.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> StoreResult<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StoreError::Serialization(format!(
                "expected an object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Decodes this record into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(StoreError::from)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns the field as text when it is a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl TryFrom<Value> for Record {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StoreError::Serialization(format!(
                "expected an object, got {}",
                json_type_name(&other)
            ))),
        }
    }
}

/// Value accepted by `save` and returned by `read`.
///
/// Structured backends speak `Record`; the object store speaks raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Record(Record),
    Bytes(Vec<u8>),
}

impl Payload {
    /// Decodes the payload into a typed value.
    ///
    /// Byte payloads are parsed as JSON, which is how the object store
    /// persists structured values.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        match self {
            Self::Record(record) => record.decode(),
            Self::Bytes(bytes) => serde_json::from_slice(bytes).map_err(StoreError::from),
        }
    }

    pub fn into_record(self) -> StoreResult<Record> {
        match self {
            Self::Record(record) => Ok(record),
            Self::Bytes(bytes) => Record::try_from(serde_json::from_slice::<Value>(&bytes)?),
        }
    }

    pub fn into_bytes(self) -> StoreResult<Vec<u8>> {
        match self {
            Self::Record(record) => Ok(serde_json::to_vec(&record)?),
            Self::Bytes(bytes) => Ok(bytes),
        }
    }
}

impl From<Record> for Payload {
    fn from(value: Record) -> Self {
        Self::Record(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
