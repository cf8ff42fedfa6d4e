//! HTTP sessions of a context.
//!
//! # Responsibilities
//! - Keep per-context sessions with string attributes
//! - Expire idle sessions lazily on lookup and in bulk via `scavenge`
//! - Hand request-scoped `SessionAccess` handles to filters and servlets
//!
//! # Design Decisions
//! - Sessions are created on demand; a request that never asks for one
//!   never gets a cookie
//! - An idle timeout of zero means sessions never expire

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use uuid::Uuid;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "RUNNERSESSIONID";

#[derive(Debug)]
struct Session {
    last_accessed: Instant,
    attributes: HashMap<String, String>,
}

/// Session store of a single context.
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<String, Session>,
    max_inactive: Option<Duration>,
}

impl SessionManager {
    /// Create a manager; `max_inactive_secs == 0` disables expiry.
    pub fn new(max_inactive_secs: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            max_inactive: (max_inactive_secs > 0).then(|| Duration::from_secs(max_inactive_secs)),
        }
    }

    pub fn max_inactive(&self) -> Option<Duration> {
        self.max_inactive
    }

    /// Create a fresh session and return its id.
    pub fn create(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            id.clone(),
            Session {
                last_accessed: Instant::now(),
                attributes: HashMap::new(),
            },
        );
        tracing::debug!(session_id = %id, "Session created");
        id
    }

    /// Whether `id` names a live session. Refreshes its access time.
    pub fn touch(&self, id: &str) -> bool {
        let now = Instant::now();
        if let Some(mut session) = self.sessions.get_mut(id) {
            if !self.is_expired(&session, now) {
                session.last_accessed = now;
                return true;
            }
        } else {
            return false;
        }
        self.sessions.remove(id);
        false
    }

    pub fn attribute(&self, id: &str, key: &str) -> Option<String> {
        self.sessions
            .get(id)
            .and_then(|session| session.attributes.get(key).cloned())
    }

    pub fn set_attribute(
        &self,
        id: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut session) => {
                session.attributes.insert(key.into(), value.into());
                true
            }
            None => false,
        }
    }

    pub fn invalidate(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn scavenge(&self) -> usize {
        if self.max_inactive.is_none() {
            return 0;
        }
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !self.is_expired(session, now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn is_expired(&self, session: &Session, now: Instant) -> bool {
        self.max_inactive
            .is_some_and(|max| now.saturating_duration_since(session.last_accessed) > max)
    }
}

/// Request-scoped access to the caller's session.
///
/// Inserted as a request extension by the context. Clones share state, so a
/// session created deep in the filter chain is visible to the context when
/// it writes the response cookie.
#[derive(Clone)]
pub struct SessionAccess {
    manager: Arc<SessionManager>,
    current: Arc<ArcSwapOption<String>>,
    created: Arc<AtomicBool>,
}

impl SessionAccess {
    /// Bind to the session named by the request cookie, if still live.
    pub fn new(manager: Arc<SessionManager>, requested: Option<&str>) -> Self {
        let current = requested
            .filter(|id| manager.touch(id))
            .map(|id| Arc::new(id.to_string()));
        Self {
            manager,
            current: Arc::new(ArcSwapOption::new(current)),
            created: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Id of the current session, without creating one.
    pub fn id(&self) -> Option<String> {
        self.current.load_full().map(|id| id.as_ref().clone())
    }

    /// Id of the current session, creating one if needed.
    pub fn get_or_create(&self) -> String {
        if let Some(id) = self.id() {
            return id;
        }
        let id = self.manager.create();
        self.current.store(Some(Arc::new(id.clone())));
        self.created.store(true, Ordering::Release);
        id
    }

    /// True when this request created the session.
    pub fn is_new(&self) -> bool {
        self.created.load(Ordering::Acquire)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.id().and_then(|id| self.manager.attribute(&id, key))
    }

    /// Set an attribute, creating the session if needed.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let id = self.get_or_create();
        self.manager.set_attribute(&id, key, value);
    }

    pub fn invalidate(&self) {
        if let Some(id) = self.current.swap(None) {
            self.manager.invalidate(&id);
        }
    }
}

/// Extract the session id from a `Cookie` header value.
pub fn session_id_from_cookie(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
    })
}
