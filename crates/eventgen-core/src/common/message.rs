//! Message values produced by a [`MessageFactory`](super::MessageFactory) and
//! the record schema a sink checks them against.
//!
//! A [`Message`] is a mapping of field name to typed [`Value`]. Values
//! serialize to their natural JSON form; timestamps are carried as
//! microseconds since the Unix epoch, the same representation as an Avro
//! `timestamp-micros` logical type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// One generated message: field name to value, ordered by field name.
pub type Message = BTreeMap<String, Value>;

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Microseconds since the Unix epoch.
    TimestampMicros(i64),
}

impl Value {
    /// Converts a wall-clock time into a [`Value::TimestampMicros`].
    ///
    /// Times before the epoch are represented as negative offsets.
    pub fn timestamp(time: SystemTime) -> Self {
        let micros = match time.duration_since(UNIX_EPOCH) {
            Ok(since) => i64::try_from(since.as_micros()).unwrap_or(i64::MAX),
            Err(before) => -i64::try_from(before.duration().as_micros()).unwrap_or(i64::MAX),
        };
        Self::TimestampMicros(micros)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// A record schema, deserialized from an Avro-style `.avsc` document.
///
/// Only the record name and field names are retained. Encoding against the
/// full schema is left to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchemaField {
    pub name: String,
}

impl Schema {
    /// Returns the first schema field absent from `message`, if any.
    pub fn missing_field<'a>(&'a self, message: &Message) -> Option<&'a str> {
        self.fields
            .iter()
            .map(|field| field.name.as_str())
            .find(|name| !message.contains_key(*name))
    }
}
