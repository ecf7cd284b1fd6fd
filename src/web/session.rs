use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Marks a browser session as authenticated for one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionMarker {
    pub user_id: i64,
    pub username: String,
    pub signed_in_at: DateTime<Utc>,
}

impl SessionMarker {
    pub fn new(user_id: i64, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            signed_in_at: Utc::now(),
        }
    }
}

/// Server-side storage for session markers, keyed by the id carried in the
/// session cookie.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: Uuid) -> Option<SessionMarker>;

    async fn set(&self, session_id: Uuid, marker: SessionMarker);

    /// Removes the marker, returning it if one was present.
    async fn clear(&self, session_id: Uuid) -> Option<SessionMarker>;
}

/// Process-local session store. Markers disappear when the process exits.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, SessionMarker>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: Uuid) -> Option<SessionMarker> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    async fn set(&self, session_id: Uuid, marker: SessionMarker) {
        self.sessions.write().await.insert(session_id, marker);
    }

    async fn clear(&self, session_id: Uuid) -> Option<SessionMarker> {
        self.sessions.write().await.remove(&session_id)
    }
}
