//! Chat provider abstractions and implementations.
//!
//! A provider owns the wire format of a hosted model. Callers only see a
//! [`Conversation`] handle, which the provider extends on every successful
//! exchange.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Provider returned no text")]
    EmptyResponse,

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Accumulated dialogue context for one user.
///
/// Only providers extend it, and only with a complete user/model pair, so a
/// failed exchange leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub(crate) fn push_exchange(&mut self, prompt: &str, reply: &str) {
        self.turns.push(Turn {
            role: Role::User,
            text: prompt.to_string(),
        });
        self.turns.push(Turn {
            role: Role::Model,
            text: reply.to_string(),
        });
    }
}

/// Trait for conversational text providers (e.g., Gemini).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Create a new, empty conversation context.
    fn start_session(&self) -> Conversation {
        Conversation::new()
    }

    /// Submit `text` as the next user turn and wait for the reply.
    ///
    /// On success the exchange is appended to `conversation`. No retries.
    async fn send(
        &self,
        conversation: &mut Conversation,
        text: &str,
    ) -> Result<String, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
