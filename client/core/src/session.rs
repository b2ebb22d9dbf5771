//! Session Store
//!
//! The server-tracked conversational context, referenced by an opaque id.
//!
//! A [`Session`] is a value: every transition builds a new one instead of
//! patching fields, so nobody can observe an id that belongs to one state
//! paired with another state. The constructors are the only way to build a
//! session and each of them upholds the invariant that an id is present
//! exactly when the state is [`SessionState::Bound`] or
//! [`SessionState::Rebinding`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque chat id
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an id handed out by the service
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh local id
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("chat-{}", Uuid::new_v4()))
    }

    /// The id as sent on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No id yet
    Unbound,
    /// Id set and usable
    Bound,
    /// Id cleared after the service stopped recognizing it; recovery pending
    Expired,
    /// A new id has been generated and the "ready" notice is pending
    Rebinding,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unbound => "unbound",
            Self::Bound => "bound",
            Self::Expired => "expired",
            Self::Rebinding => "rebinding",
        };
        f.write_str(label)
    }
}

/// Current session id and lifecycle state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    id: Option<SessionId>,
    state: SessionState,
}

impl Session {
    /// No conversation bound yet
    #[must_use]
    pub fn unbound() -> Self {
        Self {
            id: None,
            state: SessionState::Unbound,
        }
    }

    /// A usable session
    #[must_use]
    pub fn bound(id: SessionId) -> Self {
        Self {
            id: Some(id),
            state: SessionState::Bound,
        }
    }

    /// The service forgot the session; id cleared
    #[must_use]
    pub fn expired() -> Self {
        Self {
            id: None,
            state: SessionState::Expired,
        }
    }

    /// A replacement id has been assigned but not announced
    #[must_use]
    pub fn rebinding(id: SessionId) -> Self {
        Self {
            id: Some(id),
            state: SessionState::Rebinding,
        }
    }

    /// The same lifecycle position under a different id
    ///
    /// Used when the service hands back a chat id. A session without an id
    /// (unbound or expired) becomes bound, since it now has one.
    #[must_use]
    pub fn with_id(&self, id: SessionId) -> Self {
        match self.state {
            SessionState::Rebinding => Self::rebinding(id),
            SessionState::Unbound | SessionState::Expired | SessionState::Bound => Self::bound(id),
        }
    }

    /// Current id, if any
    #[must_use]
    pub fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether turns can be sent with an id
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.state == SessionState::Bound
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::unbound()
    }
}
