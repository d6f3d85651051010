//! Per-session conversation histories for the HTTP front end

use crate::agent::history::ChatHistory;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// One conversation's history. Hold the lock for a whole turn so concurrent
/// questions on the same session run one after the other.
pub type SharedHistory = Arc<Mutex<ChatHistory>>;

struct SessionEntry {
    history: SharedHistory,
    last_active: Instant,
}

/// Bounded map from session id to history; the least recently active session
/// is evicted when the store is full
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    max_sessions: usize,
    history_limit: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize, history_limit: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            history_limit,
        }
    }

    /// Fresh random session id (128 bits, hex)
    pub fn new_session_id() -> String {
        format!("{:032x}", rand::random::<u128>())
    }

    /// History handle for `session_id`, created empty on first use.
    ///
    /// A session cleared or evicted while a turn holds its handle is detached:
    /// that turn's result is dropped with it instead of resurrecting the session.
    pub async fn session(&self, session_id: &str) -> SharedHistory {
        let mut sessions = self.sessions.write().await;

        if let Some(entry) = sessions.get_mut(session_id) {
            entry.last_active = Instant::now();
            return entry.history.clone();
        }

        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_active)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                debug!("Evicting idle session {}", oldest);
                sessions.remove(&oldest);
            }
        }

        let history = Arc::new(Mutex::new(ChatHistory::with_limit(self.history_limit)));
        sessions.insert(
            session_id.to_string(),
            SessionEntry {
                history: history.clone(),
                last_active: Instant::now(),
            },
        );
        history
    }

    /// Forget a session; returns whether it existed
    pub async fn clear(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ask(store: &SessionStore, id: &str, question: &str) {
        let session = store.session(id).await;
        session.lock().await.record_exchange(question, "answer");
    }

    async fn first_question(store: &SessionStore, id: &str) -> Option<String> {
        let session = store.session(id).await;
        let history = session.lock().await;
        history.turns().first().map(|turn| turn.content.clone())
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new(10, 10);
        ask(&store, "alice", "alice question").await;
        ask(&store, "bob", "bob question").await;

        assert_eq!(first_question(&store, "alice").await.as_deref(), Some("alice question"));
        assert_eq!(first_question(&store, "bob").await.as_deref(), Some("bob question"));
        assert_eq!(first_question(&store, "carol").await, None);
    }

    #[tokio::test]
    async fn test_least_recently_active_is_evicted() {
        let store = SessionStore::new(2, 10);
        ask(&store, "first", "1").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        ask(&store, "second", "2").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        ask(&store, "first", "1 again").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        ask(&store, "third", "3").await;

        assert_eq!(store.len().await, 2);
        assert!(!store.clear("second").await);
        assert_eq!(first_question(&store, "first").await.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_clear() {
        let store = SessionStore::new(10, 10);
        ask(&store, "s", "q").await;
        assert!(store.clear("s").await);
        assert!(!store.clear("s").await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_turn_finishing_after_clear_is_dropped() {
        let store = SessionStore::new(10, 10);
        let in_flight = store.session("s").await;
        let mut history = in_flight.lock().await;

        assert!(store.clear("s").await);
        history.record_exchange("late question", "late answer");
        drop(history);

        assert_eq!(first_question(&store, "s").await, None);
    }

    #[tokio::test]
    async fn test_same_session_handles_share_one_history() {
        let store = SessionStore::new(10, 10);
        let a = store.session("s").await;
        let b = store.session("s").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.history_limit, a.lock().await.limit());
    }

    #[test]
    fn test_session_ids_are_unique_hex() {
        let a = SessionStore::new_session_id();
        let b = SessionStore::new_session_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
