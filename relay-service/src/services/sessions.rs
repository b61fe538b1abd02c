//! In-memory per-user sessions.
//!
//! A session pairs the provider's [`Conversation`] with a short, human-readable
//! history. Sessions live for the life of the process.

use crate::services::providers::{ChatProvider, Conversation};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Maximum number of entries kept in a session's history.
pub const HISTORY_CAPACITY: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Bot,
}

impl Speaker {
    fn label(self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Bot => "Bot",
        }
    }
}

#[derive(Debug)]
pub struct Session {
    conversation: Conversation,
    history: VecDeque<String>,
}

impl Session {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Append `"<Speaker>: <text>"`, evicting the oldest entry when full.
    pub fn record(&mut self, speaker: Speaker, text: &str) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history
            .push_back(format!("{}: {}", speaker.label(), text));
    }

    pub fn history(&self) -> Vec<String> {
        self.history.iter().cloned().collect()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }
}

/// Shared, lockable session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Maps user identifiers to their sessions.
///
/// Cloning is cheap; clones share the same sessions. Each session sits behind
/// its own async mutex so one user's exchange is serialized without blocking
/// other users.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `user_id`, creating it with a fresh conversation.
    pub fn get_or_create(&self, user_id: &str, provider: &dyn ChatProvider) -> SessionHandle {
        if let Some(existing) = self.sessions.get(user_id) {
            return existing.value().clone();
        }

        self.sessions
            .entry(user_id.to_string())
            .or_insert_with(|| {
                tracing::info!(user_id = %user_id, "Creating session");
                Arc::new(Mutex::new(Session::new(provider.start_session())))
            })
            .value()
            .clone()
    }

    pub fn get(&self, user_id: &str) -> Option<SessionHandle> {
        self.sessions.get(user_id).map(|s| s.value().clone())
    }

    /// Append a labelled entry to an existing session's history.
    ///
    /// Returns `false` when no session exists for `user_id`.
    pub async fn record(&self, user_id: &str, speaker: Speaker, text: &str) -> bool {
        match self.get(user_id) {
            Some(session) => {
                session.lock().await.record(speaker, text);
                true
            }
            None => false,
        }
    }

    pub async fn history(&self, user_id: &str) -> Option<Vec<String>> {
        let session = self.get(user_id)?;
        let history = session.lock().await.history();
        Some(history)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.sessions.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockChatProvider;

    #[test]
    fn record_labels_entries() {
        let mut session = Session::new(Conversation::new());
        session.record(Speaker::User, "Hello");
        session.record(Speaker::Bot, "Hi there");

        assert_eq!(session.history(), vec!["User: Hello", "Bot: Hi there"]);
    }

    #[test]
    fn history_evicts_oldest_first() {
        let mut session = Session::new(Conversation::new());
        for i in 0..40 {
            session.record(Speaker::User, &format!("q{}", i));
        }

        let history = session.history();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.first().unwrap(), "User: q15");
        assert_eq!(history.last().unwrap(), "User: q39");
    }

    #[tokio::test]
    async fn get_or_create_reuses_existing_session() {
        let store = SessionStore::new();
        let provider = MockChatProvider::fixed("ok");

        let first = store.get_or_create("u1", &provider);
        first.lock().await.record(Speaker::User, "Hello");
        let second = store.get_or_create("u1", &provider);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
        assert_eq!(store.history("u1").await.unwrap(), vec!["User: Hello"]);
    }

    #[tokio::test]
    async fn new_session_starts_empty() {
        let store = SessionStore::new();
        let provider = MockChatProvider::fixed("ok");

        let session = store.get_or_create("fresh", &provider);
        let session = session.lock().await;

        assert!(session.history().is_empty());
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn record_on_unknown_user_is_noop() {
        let store = SessionStore::new();

        assert!(!store.record("ghost", Speaker::User, "hi").await);
        assert!(!store.contains("ghost"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn clones_share_sessions() {
        let store = SessionStore::new();
        let provider = MockChatProvider::fixed("ok");
        let clone = store.clone();

        store.get_or_create("u1", &provider);
        assert!(clone.record("u1", Speaker::Bot, "shared").await);
        assert_eq!(store.history("u1").await.unwrap(), vec!["Bot: shared"]);
    }
}
