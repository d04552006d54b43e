//! Lenient numeric decoding for API payloads.
//!
//! The inventory API serializes decimal columns as strings (`"9.99"`) on some
//! endpoints and as JSON numbers on others. These helpers accept both and are
//! meant for `#[serde(deserialize_with = "...")]`.

use serde::{Deserialize, Deserializer, de::Error as _};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(serde_json::Number),
    Text(String),
}

/// Decode a float from a JSON number or a numeric string.
pub fn f64_from_any<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom(format!("number out of range: {}", n))),
        NumberOrText::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| D::Error::custom(format!("invalid number {:?}: {}", s, e))),
    }
}

/// Decode an integer from a JSON number or a numeric string.
pub fn i64_from_any<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom(format!("expected an integer, got {}", n))),
        NumberOrText::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| D::Error::custom(format!("invalid integer {:?}: {}", s, e))),
    }
}
