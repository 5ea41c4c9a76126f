//! In-memory session registry.
//!
//! Each session owns one [`Conversation`] behind an async mutex. A turn holds
//! the lock from start to commit, so turns within a session are serialized
//! while different sessions run in parallel.
//!
//! Sessions nobody ended explicitly are evicted once they have been idle for
//! longer than the registry's idle TTL.

use finanbot_core::message::{Conversation, ConversationId, Message};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;
use tracing::info;

/// Idle time after which an abandoned session is dropped.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

pub struct Session {
    pub id: ConversationId,
    pub conversation: Arc<Mutex<Conversation>>,
    last_active: StdMutex<Instant>,
}

impl Session {
    fn new() -> Self {
        let id = ConversationId::new();
        Self {
            conversation: Arc::new(Mutex::new(Conversation::with_id(id.clone()))),
            id,
            last_active: StdMutex::new(Instant::now()),
        }
    }

    /// Wait for the conversation lock. Waiters are served in call order.
    pub async fn lock_owned(&self) -> OwnedMutexGuard<Conversation> {
        self.touch();
        self.conversation.clone().lock_owned().await
    }

    /// Mark the session as used now.
    pub fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// A turn currently holds the conversation.
    pub fn is_busy(&self) -> bool {
        self.conversation.try_lock().is_err()
    }
}

pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    idle_ttl: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_idle_ttl(DEFAULT_IDLE_TTL)
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    /// Open a session with an empty history. Idle sessions are swept first.
    pub async fn start_session(&self) -> Arc<Session> {
        self.evict_idle().await;
        let session = Arc::new(Session::new());
        self.sessions
            .write()
            .await
            .insert(session.id.as_str().to_string(), session.clone());
        info!(session_id = session.id.as_str(), "Session started");
        session
    }

    /// Look up a session and mark it active.
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.read().await.get(id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Discard a session and its history. Returns whether it existed.
    pub async fn end_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(session_id = id, "Session ended");
        }
        removed
    }

    /// Drop sessions idle for longer than the TTL. A session with a turn in
    /// flight is never evicted. Returns how many were dropped.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.is_busy() || s.idle_for() <= self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Idle sessions evicted");
        }
        evicted
    }

    /// A copy of the committed history. Waits for any in-flight turn.
    pub async fn history(&self, id: &str) -> Option<Vec<Message>> {
        let session = self.get(id).await?;
        let conversation = session.conversation.lock().await;
        Some(conversation.messages.clone())
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
