//! Connectivity state of a session.

/// Where the session currently sends requests.
///
/// Only [`EndpointSession`](crate::EndpointSession) changes this; everyone
/// else observes it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No resolution cycle has completed yet (or the user asked to go back
    /// online and the next probe has not finished).
    #[default]
    Unresolved,
    /// Connected; every call goes to this base URL until one fails.
    Online(String),
    /// Every candidate failed, or the user switched to offline mode.
    /// Reads are served from sample data and writes stay local.
    Offline,
}

impl SessionState {
    pub fn is_offline(&self) -> bool {
        matches!(self, SessionState::Offline)
    }

    pub fn is_online(&self) -> bool {
        matches!(self, SessionState::Online(_))
    }

    /// Base URL of the authoritative endpoint, if any.
    pub fn active_endpoint(&self) -> Option<&str> {
        match self {
            SessionState::Online(url) => Some(url),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Unresolved => "unresolved",
            SessionState::Online(_) => "online",
            SessionState::Offline => "offline",
        }
    }
}

impl core::fmt::Display for SessionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SessionState::Online(url) => write!(f, "online ({})", url),
            other => f.write_str(other.label()),
        }
    }
}
