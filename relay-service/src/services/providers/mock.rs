//! Mock provider implementation for testing.

use super::{ChatProvider, Conversation, ProviderError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Always the same text.
    Fixed(String),
    /// The prompt, prefixed with `echo: `.
    Echo,
    /// Fail every call with an API error.
    Fail,
}

/// Mock chat provider for testing.
pub struct MockChatProvider {
    reply: Mutex<MockReply>,
    calls: AtomicUsize,
    context_lengths: Mutex<Vec<usize>>,
    healthy: AtomicBool,
    health_checks: AtomicUsize,
}

impl MockChatProvider {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            context_lengths: Mutex::new(Vec::new()),
            healthy: AtomicBool::new(true),
            health_checks: AtomicUsize::new(0),
        }
    }

    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(MockReply::Fixed(text.into()))
    }

    pub fn echo() -> Self {
        Self::new(MockReply::Echo)
    }

    pub fn failing() -> Self {
        Self::new(MockReply::Fail)
    }

    pub fn set_reply(&self, reply: MockReply) {
        if let Ok(mut current) = self.reply.lock() {
            *current = reply;
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn health_check_count(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    /// Number of `send` calls, successful or not.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Conversation length observed at the start of each `send`.
    pub fn context_lengths(&self) -> Vec<usize> {
        self.context_lengths
            .lock()
            .map(|lengths| lengths.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn send(
        &self,
        conversation: &mut Conversation,
        text: &str,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut lengths) = self.context_lengths.lock() {
            lengths.push(conversation.len());
        }

        let reply = self
            .reply
            .lock()
            .map(|reply| reply.clone())
            .unwrap_or(MockReply::Fail);

        let text_reply = match reply {
            MockReply::Fixed(reply) => reply,
            MockReply::Echo => format!("echo: {}", text),
            MockReply::Fail => {
                return Err(ProviderError::ApiError(
                    "Mock provider configured to fail".to_string(),
                ))
            }
        };

        // Yield so concurrent callers can interleave.
        tokio::task::yield_now().await;

        conversation.push_exchange(text, &text_reply);
        Ok(text_reply)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProviderError::NetworkError(
                "Mock provider marked unhealthy".to_string(),
            ))
        }
    }
}
