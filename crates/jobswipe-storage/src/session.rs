//! Sessions and the auth provider seam

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// An authenticated identity: who the user is and the bearer token that
/// authorizes their storage calls
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// User id, also the top-level folder of every object the user writes
    pub user_id: String,
    /// Bearer token
    pub access_token: String,
}

impl Session {
    /// Create a new session
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Supplies the current session, or `None` when nobody is signed in
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Get the active session
    async fn current_session(&self) -> Option<Session>;
}

/// Shared in-memory session holder
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    /// Create an empty store (signed out)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `session`
    pub fn with_session(session: Session) -> Self {
        let store = Self::new();
        store.set(session);
        store
    }

    /// Replace the active session
    pub fn set(&self, session: Session) {
        *self.inner.write() = Some(session);
    }

    /// Sign out locally
    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    /// Get a copy of the active session
    pub fn get(&self) -> Option<Session> {
        self.inner.read().clone()
    }
}

#[async_trait]
impl SessionProvider for SessionStore {
    async fn current_session(&self) -> Option<Session> {
        self.get()
    }
}
