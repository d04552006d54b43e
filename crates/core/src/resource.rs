//! Remote collections addressed by the client session.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::entity::Entity;
use crate::error::FieldErrors;
use crate::id::EntityId;

/// A caller-built create form for a resource.
///
/// Validation runs before any network attempt; a draft that validates yields
/// the payload that is POSTed to the API (or kept locally in offline mode).
pub trait Draft {
    type Payload: Serialize + Clone + core::fmt::Debug + Send + Sync + 'static;

    fn validate(&self) -> Result<Self::Payload, FieldErrors>;
}

/// A named remote collection (`GET/POST {base}/{NAME}`,
/// `DELETE {base}/{NAME}/{id}`).
pub trait Resource: Send + Sync + 'static {
    /// Path segment under the API base URL.
    const NAME: &'static str;

    type Entity: Entity + Clone + core::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Draft: Draft + Send + Sync;

    /// Built-in placeholder collection served while offline. Never sent to
    /// the server.
    fn samples() -> Vec<Self::Entity>;

    /// Build the entity kept locally when a create is accepted without
    /// remote persistence.
    fn local_entity(id: EntityId, payload: &<Self::Draft as Draft>::Payload) -> Self::Entity;
}
