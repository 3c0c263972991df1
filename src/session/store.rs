//! Key-value session storage.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::SessionId;

/// Key-value storage partitioned by session id.
///
/// Implementations must tolerate concurrent use for different sessions. For
/// the same session, last write wins.
pub trait SessionStore: Send + Sync {
    fn get(&self, session: &SessionId, key: &str) -> Option<String>;
    fn set(&self, session: &SessionId, key: &str, value: String);
    fn remove(&self, session: &SessionId, key: &str);
}

#[derive(Debug)]
struct Entry {
    values: HashMap<String, String>,
    written_at: Instant,
}

/// In-process session storage with optional time-boxed expiry.
///
/// A session expires `ttl` after its most recent write; reads do not extend it.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Entry>>,
    ttl: Option<Duration>,
}

impl MemorySessionStore {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.written_at.elapsed() >= ttl)
    }

    /// Drops every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry));
        before - sessions.len()
    }

    /// Number of sessions currently held, expired or not.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session: &SessionId, key: &str) -> Option<String> {
        let sessions = self.sessions.read();
        let entry = sessions.get(session)?;
        if self.is_expired(entry) {
            return None;
        }
        entry.values.get(key).cloned()
    }

    fn set(&self, session: &SessionId, key: &str, value: String) {
        let mut sessions = self.sessions.write();
        // Reclaim every expired session, including this one's stale values.
        if self.ttl.is_some() {
            sessions.retain(|_, entry| !self.is_expired(entry));
        }

        let entry = sessions.entry(session.clone()).or_insert_with(|| Entry {
            values: HashMap::new(),
            written_at: Instant::now(),
        });
        entry.values.insert(key.to_string(), value);
        entry.written_at = Instant::now();
    }

    fn remove(&self, session: &SessionId, key: &str) {
        let mut sessions = self.sessions.write();
        if let Some(entry) = sessions.get_mut(session) {
            entry.values.remove(key);
            if entry.values.is_empty() {
                sessions.remove(session);
            }
        }
    }
}
