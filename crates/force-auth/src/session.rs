//! Server-side session storage.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};

use crate::context::SecurityContext;

/// Default inactivity window, in minutes, after which a session expires.
pub const DEFAULT_MAX_INACTIVE_MINUTES: i64 = 30;

/// Trait for server-side session stores holding a security context per session.
pub trait SessionStore: Send + Sync {
    /// Get the context stored for a session, refreshing its last-access time.
    fn get(&self, session_id: &str) -> Option<SecurityContext>;

    /// Store a context for a session, creating the session if needed.
    fn put(&self, session_id: &str, context: SecurityContext);

    /// Remove the context stored for a session.
    fn remove(&self, session_id: &str) -> Option<SecurityContext>;

    /// Drop every expired session. Returns the number removed.
    fn purge_expired(&self) -> usize {
        0
    }
}

#[derive(Debug, Clone)]
struct SessionEntry {
    context: SecurityContext,
    last_accessed: DateTime<Utc>,
}

/// In-memory session store.
///
/// Sessions are lost on restart and not shared between processes. Expired
/// sessions are dropped when read, and all of them at most once per
/// inactivity window when a session is stored.
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    max_inactive: Duration,
    last_purge: Arc<Mutex<DateTime<Utc>>>,
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionStore")
            .field("sessions", &self.sessions.read().len())
            .field("max_inactive", &self.max_inactive)
            .finish()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    /// Create a store with the default 30 minute inactivity window.
    pub fn new() -> Self {
        Self::with_max_inactive(Duration::minutes(DEFAULT_MAX_INACTIVE_MINUTES))
    }

    /// Create a store with a custom inactivity window.
    pub fn with_max_inactive(max_inactive: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_inactive,
            last_purge: Arc::new(Mutex::new(Utc::now())),
        }
    }

    /// Number of sessions currently held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_due(&self, now: DateTime<Utc>) -> bool {
        let mut last_purge = self.last_purge.lock();
        if now - *last_purge < self.max_inactive {
            return false;
        }
        *last_purge = now;
        true
    }

    fn is_expired(&self, entry: &SessionEntry, now: DateTime<Utc>) -> bool {
        now - entry.last_accessed > self.max_inactive
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session_id: &str) -> Option<SecurityContext> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();

        let entry = sessions.get_mut(session_id)?;
        if !self.is_expired(entry, now) {
            entry.last_accessed = now;
            return Some(entry.context.clone());
        }

        tracing::debug!("Dropping expired server session");
        sessions.remove(session_id);
        None
    }

    fn put(&self, session_id: &str, context: SecurityContext) {
        let now = Utc::now();
        if self.purge_due(now) {
            self.purge_expired();
        }

        self.sessions.write().insert(
            session_id.to_string(),
            SessionEntry {
                context,
                last_accessed: now,
            },
        );
    }

    fn remove(&self, session_id: &str) -> Option<SecurityContext> {
        self.sessions
            .write()
            .remove(session_id)
            .map(|entry| entry.context)
    }

    fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, "Purged expired server sessions");
        }
        removed
    }
}
