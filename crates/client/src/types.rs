//! Outcomes reported by the session.
//!
//! Nothing here is an error in the `Result` sense: every network failure is
//! translated into one of these outcomes so a screen can always render
//! something.

use storefront_core::{Draft, FieldErrors, Resource};

use crate::transport::TransportError;

/// Result of a resolution cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// This base URL answered the probe and is now active.
    Resolved(String),
    /// Every candidate failed; the session is offline.
    Exhausted,
    /// The session was closed while the cycle ran; nothing was changed.
    Cancelled,
    /// The user switched offline while the cycle ran; its result was dropped.
    Superseded,
}

impl Resolution {
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(url) => Some(url),
            _ => None,
        }
    }
}

/// Why a remote call did not produce what was asked for.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FailureReason {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("could not encode request body: {0}")]
    Encode(String),
    #[error("no candidate endpoint responded")]
    Exhausted,
    #[error("session closed")]
    Closed,
}

/// Where a collection came from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// Live data from this endpoint.
    Remote { endpoint: String },
    /// Sample data because the session is offline.
    Offline,
    /// Sample data because fetching failed just now.
    Degraded(FailureReason),
}

impl DataSource {
    pub fn is_remote(&self) -> bool {
        matches!(self, DataSource::Remote { .. })
    }

    /// True when the items shown are placeholders, not server data.
    pub fn is_sample(&self) -> bool {
        !self.is_remote()
    }
}

/// Result of `fetch_collection`: items in server order plus their origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<E> {
    pub items: Vec<E>,
    pub source: DataSource,
}

/// Whether a write reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Remote,
    LocalOnly,
}

/// A create that could not reach the server.
///
/// Hand it back to [`EndpointSession::accept_local`](crate::EndpointSession::accept_local)
/// to keep the entity locally (the session switches to offline), or call
/// [`discard`](PendingLocal::discard) to drop the attempt.
#[must_use = "a failed create must be accepted locally or discarded"]
pub struct PendingLocal<R: Resource> {
    pub(crate) payload: <R::Draft as Draft>::Payload,
}

impl<R: Resource> PendingLocal<R> {
    pub fn payload(&self) -> &<R::Draft as Draft>::Payload {
        &self.payload
    }

    pub fn discard(self) {
        tracing::debug!(resource = R::NAME, "discarded failed create");
    }
}

impl<R: Resource> core::fmt::Debug for PendingLocal<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PendingLocal")
            .field("resource", &R::NAME)
            .field("payload", &self.payload)
            .finish()
    }
}

pub enum CreateOutcome<R: Resource> {
    /// Created by the server; the entity is the server's response.
    RemoteSuccess(R::Entity),
    /// Kept on this device only; the id is local and not persisted remotely.
    LocalOnlySuccess(R::Entity),
    /// The draft is invalid; nothing was sent and no state changed.
    ValidationFailure(FieldErrors),
    /// The API rejected the payload with per-field messages.
    ServerValidationFailure(FieldErrors),
    /// The POST failed even after one re-resolution and retry.
    RemoteFailure {
        reason: FailureReason,
        pending: PendingLocal<R>,
    },
}

impl<R: Resource> CreateOutcome<R> {
    pub fn entity(&self) -> Option<&R::Entity> {
        match self {
            CreateOutcome::RemoteSuccess(e) | CreateOutcome::LocalOnlySuccess(e) => Some(e),
            _ => None,
        }
    }

    pub fn persistence(&self) -> Option<Persistence> {
        match self {
            CreateOutcome::RemoteSuccess(_) => Some(Persistence::Remote),
            CreateOutcome::LocalOnlySuccess(_) => Some(Persistence::LocalOnly),
            _ => None,
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            CreateOutcome::ValidationFailure(e) | CreateOutcome::ServerValidationFailure(e) => {
                Some(e)
            }
            _ => None,
        }
    }
}

impl<R: Resource> core::fmt::Debug for CreateOutcome<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CreateOutcome::RemoteSuccess(e) => f.debug_tuple("RemoteSuccess").field(e).finish(),
            CreateOutcome::LocalOnlySuccess(e) => f.debug_tuple("LocalOnlySuccess").field(e).finish(),
            CreateOutcome::ValidationFailure(e) => f.debug_tuple("ValidationFailure").field(e).finish(),
            CreateOutcome::ServerValidationFailure(e) => {
                f.debug_tuple("ServerValidationFailure").field(e).finish()
            }
            CreateOutcome::RemoteFailure { reason, pending } => f
                .debug_struct("RemoteFailure")
                .field("reason", reason)
                .field("pending", pending)
                .finish(),
        }
    }
}

/// Result of a delete. There is no partial state: either the entity is gone
/// (from the server, or from the local view while offline) or nothing changed.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Removed(Persistence),
    RemoteFailure(FailureReason),
    /// The id was never observed in the local view.
    NotFound,
}

impl DeleteOutcome {
    pub fn is_removed(&self) -> bool {
        matches!(self, DeleteOutcome::Removed(_))
    }
}
