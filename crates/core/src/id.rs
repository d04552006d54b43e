//! Entity identifiers.
//!
//! The remote API assigns numeric ids while entities accepted in offline mode
//! carry a locally generated one, so the identifier is kept opaque.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

const LOCAL_PREFIX: &str = "local-";

/// Identifier of a remote or local-only entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Create an identifier for an entity that exists only on this device.
    ///
    /// Uses UUIDv7 so local entities sort in creation order.
    pub fn local() -> Self {
        Self(format!("{}{}", LOCAL_PREFIX, Uuid::now_v7()))
    }

    /// True for identifiers minted by [`EntityId::local`].
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Signed(i64),
            Unsigned(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Signed(n) => Self(n.to_string()),
            Raw::Unsigned(n) => Self(n.to_string()),
            Raw::Text(s) => Self(s),
        })
    }
}
