/*!
 * Serde utilities for common serialization/deserialization patterns.
 *
 * Commands and audit records share one wall-clock format on the wire,
 * `dd-MM-yyyyTHH:mm:ss` (UTC, second precision), so every timestamp field
 * goes through the helpers in this module.
 */

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Wire format for command and audit timestamps
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%YT%H:%M:%S";

/// Format a timestamp the way it appears on the wire and in audit output
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a wire timestamp (interpreted as UTC)
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

/// `#[serde(with = "crate::utils::serde::timestamp")]`
pub mod timestamp {
    use super::*;

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .map_err(|e| D::Error::custom(format!("Invalid timestamp '{raw}': {e}")))
    }
}

/// `#[serde(default, with = "crate::utils::serde::optional_timestamp")]`
pub mod optional_timestamp {
    use super::*;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_some(&format_timestamp(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            parse_timestamp(&s).map_err(|e| D::Error::custom(format!("Invalid timestamp '{s}': {e}")))
        })
        .transpose()
    }
}
