//! Concurrency-safe store of live session handles.
//!
//! The registry owns the canonical copy of every live session. It is
//! constructed once at startup and injected into the creation endpoint, the
//! bind handshake and the relay drivers; tests construct isolated registries.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::handle::SessionHandle;
use super::SessionError;
use crate::transport::TerminationStatus;

/// Maps session ids to handles behind a single reader/writer lock.
///
/// Lookups take the shared lock; create, set and terminate take the
/// exclusive lock. The lock is never held across an await point.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pending session.
    ///
    /// Fails if the id is already present. Ids are 128-bit random values, so
    /// a collision is vanishingly unlikely but still rejected rather than
    /// silently overwriting a live session.
    pub fn create(&self, handle: Arc<SessionHandle>) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().unwrap();

        if sessions.contains_key(handle.id()) {
            return Err(SessionError::IdInUse(handle.id().to_string()));
        }

        tracing::debug!(session_id = %handle.id(), "registered pending session");
        sessions.insert(handle.id().to_string(), handle);
        Ok(())
    }

    /// Looks up a session by id.
    pub fn get(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().unwrap().get(id).cloned()
    }

    /// Stores a handle under the given id, replacing any existing entry.
    pub fn set(&self, id: impl Into<String>, handle: Arc<SessionHandle>) {
        self.sessions.write().unwrap().insert(id.into(), handle);
    }

    /// Removes a session and closes its transport, delivering the status and
    /// reason to the client.
    ///
    /// Idempotent: terminating an id that is absent (or already terminated)
    /// is a no-op. The transport close happens after the lock is released.
    pub async fn terminate(&self, id: &str, status: TerminationStatus, reason: &str) {
        let removed = self.sessions.write().unwrap().remove(id);

        match removed {
            Some(handle) => {
                tracing::info!(
                    session_id = %id,
                    status = status.code(),
                    reason = %reason,
                    "session terminated"
                );
                handle.close_transport(status, reason).await;
            }
            None => {
                tracing::debug!(session_id = %id, "terminate on absent session ignored");
            }
        }
    }

    /// Whether a session with the given id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().unwrap().contains_key(id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
