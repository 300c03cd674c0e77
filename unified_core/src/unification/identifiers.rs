use crate::{Error, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A provider's primary identifier, always held as a string.
///
/// Deserializes from either a JSON string or a JSON number so provider record
/// structs can declare `id: RemoteId` regardless of the provider's native id type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::invalid_field("remote_id", "provider id is empty"));
        }
        Ok(Self(id))
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Self::new(s.clone()),
            Value::Number(n) => Self::new(n.to_string()),
            Value::Null => Err(Error::missing_field("remote_id")),
            other => Err(Error::invalid_field(
                "remote_id",
                format!("provider id must be a string or number, got {other}"),
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RemoteId> for String {
    fn from(value: RemoteId) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for RemoteId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RemoteIdVisitor;

        impl Visitor<'_> for RemoteIdVisitor {
            type Value = RemoteId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-empty string or integer id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<RemoteId, E> {
                if v.trim().is_empty() {
                    return Err(E::custom("provider id is empty"));
                }
                Ok(RemoteId(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<RemoteId, E> {
                Ok(RemoteId(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<RemoteId, E> {
                Ok(RemoteId(v.to_string()))
            }
        }

        deserializer.deserialize_any(RemoteIdVisitor)
    }
}
