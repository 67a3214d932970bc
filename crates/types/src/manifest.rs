//! Property manifest data model.
//!
//! The JSON produced here is persisted to content-addressed storage and read
//! by other consumers, so field names and order are part of the format:
//! `{propertyId, propertyOwnerName, propertyType, propertyName,
//! documents: [{name, documentType, cid}], timestamp}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content identifier returned by the pinning service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(raw: impl Into<String>) -> Result<Self, String> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("content id cannot be empty".to_string());
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(format!("content id `{trimmed}` contains whitespace"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A document that has been pinned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedFile {
    pub name: String,
    /// MIME type of the document.
    #[serde(rename = "documentType")]
    pub document_kind: String,
    #[serde(rename = "cid")]
    pub content_id: ContentId,
}

/// Metadata manifest describing a property and its pinned documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyManifest {
    pub property_id: String,
    #[serde(rename = "propertyOwnerName")]
    pub owner_name: String,
    #[serde(rename = "propertyType")]
    pub property_kind: String,
    pub property_name: String,
    pub documents: Vec<PinnedFile>,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
}

impl PropertyManifest {
    /// Deterministic JSON encoding of the manifest.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Name under which the manifest is pinned. Derived from the captured
    /// timestamp so repeated pins of one manifest carry the same name.
    pub fn pin_name(&self) -> String {
        format!(
            "metadata-{}-{}",
            self.property_id,
            self.timestamp.timestamp_millis()
        )
    }
}

/// ISO-8601 UTC with millisecond precision and a `Z` suffix.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
