//! Session state and its single synchronized write path
//!
//! The auth supervisor (startup or background task) and the control channel
//! (its own I/O task) both update the session. Every write replaces the whole
//! `Arc<SessionState>` inside a `tokio::sync::watch` cell, so a reader sees
//! either the previous consistent state or the next one, never a mix.

use crate::types::{Credentials, Permissions, ProfileDescriptor};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle of the control channel as seen by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Authenticated,
    Degraded,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticated => "authenticated",
            ConnectionState::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

/// Authoritative record of the current identity and selected profile
#[derive(Debug, Clone)]
pub struct SessionState {
    pub credentials: Credentials,
    pub permissions: Permissions,
    pub profile: Option<ProfileDescriptor>,
    pub connection: ConnectionState,
    /// Set by the first successful login and refreshed by every later one
    pub authenticated_at: Option<DateTime<Utc>>,
    /// Incremented on every successful authentication
    pub generation: u64,
}

impl SessionState {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            permissions: Permissions::default(),
            profile: None,
            connection: ConnectionState::Disconnected,
            authenticated_at: None,
            generation: 0,
        }
    }

    /// True once any login has succeeded
    pub fn has_authenticated(&self) -> bool {
        self.authenticated_at.is_some()
    }
}

/// Single-writer-path, multi-reader cell holding the current `SessionState`
#[derive(Clone)]
pub struct SessionCell {
    tx: Arc<watch::Sender<Arc<SessionState>>>,
}

impl SessionCell {
    pub fn new(credentials: Credentials) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(SessionState::new(credentials)));
        Self { tx: Arc::new(tx) }
    }

    /// Current state. The returned snapshot never changes underneath the caller.
    pub fn snapshot(&self) -> Arc<SessionState> {
        self.tx.borrow().clone()
    }

    /// Credentials the session was created with
    pub fn credentials(&self) -> Credentials {
        self.tx.borrow().credentials.clone()
    }

    /// Publish the outcome of a successful login.
    ///
    /// Returns the new generation number.
    pub fn publish_authenticated(
        &self,
        permissions: Permissions,
        profile: Option<ProfileDescriptor>,
    ) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|current| {
            let mut next = SessionState::clone(current);
            next.permissions = permissions;
            next.profile = profile;
            next.authenticated_at = Some(Utc::now());
            next.generation += 1;
            generation = next.generation;
            *current = Arc::new(next);
        });
        generation
    }

    /// Record a connection state transition. Returns false if nothing changed.
    pub fn set_connection(&self, state: ConnectionState) -> bool {
        self.tx.send_if_modified(|current| {
            if current.connection == state {
                return false;
            }
            let mut next = SessionState::clone(current);
            next.connection = state;
            *current = Arc::new(next);
            true
        })
    }

    pub fn connection(&self) -> ConnectionState {
        self.tx.borrow().connection
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionState>> {
        self.tx.subscribe()
    }

    /// Wait until at least one login has succeeded
    pub async fn wait_authenticated(&self) -> Arc<SessionState> {
        let mut rx = self.tx.subscribe();
        let state = match rx.wait_for(|state| state.has_authenticated()).await {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so the channel cannot close while we wait.
            Err(_) => self.snapshot(),
        };
        state
    }
}

impl fmt::Debug for SessionCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCell")
            .field("state", &*self.snapshot())
            .finish()
    }
}
