//! Entity trait: identity across the remote API and the local view.

use crate::id::EntityId;

/// Entity marker + minimal interface.
///
/// The session never looks inside an entity beyond this identifier; every
/// other field is passed through to and from the API untouched.
pub trait Entity {
    /// Returns the entity identifier.
    fn id(&self) -> &EntityId;
}
