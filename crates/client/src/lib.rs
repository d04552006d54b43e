//! `storefront-client`
//!
//! **Responsibility:** connectivity for the storefront app.
//!
//! This crate provides:
//! - Endpoint resolution over an ordered list of candidate API base URLs
//! - Offline mode with built-in sample data
//! - Product and sale reads/writes that degrade instead of failing
//! - Per-screen views that only change on reported success
//!
//! The API stays the authority: nothing here persists across restarts and
//! local-only entities are never sent later.

pub mod config;
pub mod offline;
pub mod session;
pub mod transport;
pub mod types;
pub mod view;

#[cfg(test)]
mod fake;

pub use config::{ConfigError, SessionConfig};
pub use offline::SessionState;
pub use session::EndpointSession;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport, TransportError};
pub use types::{
    CreateOutcome, DataSource, DeleteOutcome, FailureReason, Fetched, PendingLocal, Persistence,
    Resolution,
};
pub use view::ResourceView;
