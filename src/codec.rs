//! Type-tagged JSON codec for persisted snapshots
//! Round-trips timestamps and unique-element sets that plain JSON flattens
//! into bare strings and arrays

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeSet;

const TYPE_TAG: &str = "__type";
const VALUE_FIELD: &str = "value";
const DATE_TAG: &str = "Date";
const SET_TAG: &str = "Set";

/// Field names that may hold untagged ISO strings, written before tagging
/// was introduced
const LEGACY_DATE_FIELDS: &[&str] = &["createdAt", "updatedAt"];

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode stored payload: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("invalid timestamp in stored payload: {0}")]
    BadTimestamp(String),
}

/// Encode a snapshot to its stored string form.
pub fn encode<T: Serialize>(snapshot: &T) -> Result<String, CodecError> {
    serde_json::to_string(snapshot).map_err(CodecError::Encode)
}

/// Decode a stored payload into a snapshot.
///
/// Runs a normalization pass between parsing and the typed deserialize so
/// records written before type tagging still decode: a bare ISO string under
/// a field literally named `createdAt` or `updatedAt` is rewritten into the
/// tagged timestamp form. Objects carrying a foreign `__type` tag pass
/// through untouched.
pub fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, CodecError> {
    let mut value: Value = serde_json::from_str(payload).map_err(CodecError::Parse)?;
    normalize(&mut value);
    serde_json::from_value(value).map_err(CodecError::Parse)
}

fn normalize(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let tag = map.get(TYPE_TAG).and_then(Value::as_str).map(str::to_owned);
            match tag.as_deref() {
                // Tagged timestamps are already in canonical form.
                Some(DATE_TAG) => {}
                // A set's elements may themselves carry legacy fields.
                Some(SET_TAG) => {
                    if let Some(inner) = map.get_mut(VALUE_FIELD) {
                        normalize(inner);
                    }
                }
                // Foreign tag: pass through unchanged.
                Some(_) => {}
                None => {
                    for (key, child) in map.iter_mut() {
                        if LEGACY_DATE_FIELDS.contains(&key.as_str()) {
                            let tagged = match child {
                                Value::String(s) if parse_iso(s).is_ok() => Some(tagged_date(s)),
                                _ => None,
                            };
                            if let Some(tagged) = tagged {
                                *child = tagged;
                                continue;
                            }
                        }
                        normalize(child);
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                normalize(item);
            }
        }
        _ => {}
    }
}

fn tagged_date(iso: &str) -> Value {
    let mut map = serde_json::Map::with_capacity(2);
    map.insert(TYPE_TAG.to_string(), Value::String(DATE_TAG.to_string()));
    map.insert(VALUE_FIELD.to_string(), Value::String(iso.to_string()));
    Value::Object(map)
}

fn parse_iso(s: &str) -> Result<DateTime<Utc>, CodecError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CodecError::BadTimestamp(s.to_string()))
}

/// Serialized shape shared by both tagged types
#[derive(Serialize)]
struct TaggedRepr<V> {
    #[serde(rename = "__type")]
    tag: &'static str,
    value: V,
}

// --- Stamp ---

/// A timestamp that survives JSON round-trips.
///
/// Serializes as `{"__type":"Date","value":"<ISO8601>"}`; deserializes from
/// that form or from a bare ISO string (legacy records). Held at millisecond
/// precision - finer precision is truncated at construction so a stored and
/// reloaded value compares equal to the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamp(DateTime<Utc>);

impl Stamp {
    pub fn new(instant: DateTime<Utc>) -> Self {
        // Truncate to millis, matching the stored ISO form.
        let millis = instant.timestamp_millis();
        Self(DateTime::from_timestamp_millis(millis).unwrap_or(instant))
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    /// The stored ISO-8601 form, e.g. `2024-01-01T00:00:00.000Z`
    pub fn to_iso(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl From<DateTime<Utc>> for Stamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::new(instant)
    }
}

impl std::fmt::Display for Stamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso())
    }
}

impl Serialize for Stamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TaggedRepr {
            tag: DATE_TAG,
            value: self.to_iso(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Stamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let iso = match &value {
            Value::String(s) => s.as_str(),
            Value::Object(map) => {
                let tag = map.get(TYPE_TAG).and_then(Value::as_str);
                if tag != Some(DATE_TAG) {
                    return Err(serde::de::Error::custom("expected a tagged Date object"));
                }
                map.get(VALUE_FIELD)
                    .and_then(Value::as_str)
                    .ok_or_else(|| serde::de::Error::custom("tagged Date without a value"))?
            }
            _ => {
                return Err(serde::de::Error::custom(
                    "expected an ISO string or tagged Date object",
                ))
            }
        };
        parse_iso(iso)
            .map(Stamp::new)
            .map_err(serde::de::Error::custom)
    }
}

// --- TaggedSet ---

/// An ordered unique-element collection that keeps its set-ness across JSON
/// round-trips. Serializes as `{"__type":"Set","value":[...]}`; a bare array
/// is also accepted on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSet<T: Ord>(BTreeSet<T>);

impl<T: Ord> TaggedSet<T> {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn insert(&mut self, item: T) -> bool {
        self.0.insert(item)
    }

    pub fn remove(&mut self, item: &T) -> bool {
        self.0.remove(item)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.0.contains(item)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl<T: Ord> Default for TaggedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> FromIterator<T> for TaggedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: Ord> IntoIterator for TaggedSet<T> {
    type Item = T;
    type IntoIter = std::collections::btree_set::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<T: Ord + Serialize> Serialize for TaggedSet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TaggedRepr {
            tag: SET_TAG,
            value: &self.0,
        }
        .serialize(serializer)
    }
}

impl<'de, T: Ord + DeserializeOwned> Deserialize<'de> for TaggedSet<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let inner = match value {
            Value::Object(mut map) => {
                let tag = map.get(TYPE_TAG).and_then(Value::as_str);
                if tag != Some(SET_TAG) {
                    return Err(serde::de::Error::custom("expected a tagged Set object"));
                }
                map.remove(VALUE_FIELD).unwrap_or(Value::Array(Vec::new()))
            }
            Value::Array(_) => value,
            _ => {
                return Err(serde::de::Error::custom(
                    "expected an array or tagged Set object",
                ))
            }
        };
        let items: Vec<T> = serde_json::from_value(inner).map_err(serde::de::Error::custom)?;
        Ok(items.into_iter().collect())
    }
}
