//! Per-session credential storage.
//!
//! Connection parameters are remembered between a connect call and later
//! execute/schema/disconnect calls, keyed by an opaque session id. The
//! password and the rest of the parameters are stored under separate keys so
//! that reading the metadata for display never touches the secret.

mod store;

pub use store::{MemorySessionStore, SessionStore};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ConnectionMetadata, ConnectionParameters};
use crate::error::{GateError, Result};

/// Key holding the serialized [`ConnectionMetadata`].
pub const METADATA_KEY: &str = "db_connection";
/// Key holding the password.
pub const PASSWORD_KEY: &str = "db_password";

/// Opaque identifier of one caller session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Saves, loads and clears connection parameters for sessions.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn SessionStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// A store backed by process memory with the given expiry.
    pub fn in_memory(ttl: Option<std::time::Duration>) -> Self {
        Self::new(Arc::new(MemorySessionStore::new(ttl)))
    }

    /// Remembers `params` for `session`, replacing anything stored before.
    pub fn save(&self, session: &SessionId, params: &ConnectionParameters) -> Result<()> {
        let (metadata, password) = params.split();
        let encoded = serde_json::to_string(&metadata)
            .map_err(|e| GateError::session(format!("Failed to encode connection metadata: {e}")))?;

        self.store.set(session, METADATA_KEY, encoded);
        self.store.set(session, PASSWORD_KEY, password);
        debug!("Saved credentials for session {}", session);
        Ok(())
    }

    /// Rebuilds the full parameters for `session`.
    ///
    /// Both parts must be present. A session holding only one of them, or
    /// metadata that no longer parses, is reported as [`GateError::NotConnected`].
    pub fn load(&self, session: &SessionId) -> Result<ConnectionParameters> {
        let metadata = self.metadata(session).ok_or(GateError::NotConnected)?;
        let password = self
            .store
            .get(session, PASSWORD_KEY)
            .ok_or(GateError::NotConnected)?;

        metadata.with_password(password).map_err(|e| {
            warn!("Stored credentials for session {} are invalid: {}", session, e);
            GateError::NotConnected
        })
    }

    /// Reads the metadata part alone.
    pub fn metadata(&self, session: &SessionId) -> Option<ConnectionMetadata> {
        let encoded = self.store.get(session, METADATA_KEY)?;
        match serde_json::from_str(&encoded) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("Unreadable connection metadata for session {}: {}", session, e);
                None
            }
        }
    }

    /// Whether `load` would currently succeed.
    pub fn is_connected(&self, session: &SessionId) -> bool {
        self.load(session).is_ok()
    }

    /// Forgets both parts. Clearing an empty session is not an error.
    pub fn clear(&self, session: &SessionId) {
        self.store.remove(session, METADATA_KEY);
        self.store.remove(session, PASSWORD_KEY);
        debug!("Cleared credentials for session {}", session);
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
