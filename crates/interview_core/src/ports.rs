//! crates/interview_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Completion, Critique, Message, MessageId, Role, Session, SessionConfig, SessionSummary,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Generation Types
//=========================================================================================

/// One prior turn handed to the text generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persists sessions and their ordered messages.
///
/// Every operation is scoped by `owner`; a session owned by someone else is
/// reported as `NotFound`, exactly like a session that does not exist.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Inserts a new `in_progress` session and returns its id.
    async fn create(
        &self,
        owner: Uuid,
        config: &SessionConfig,
        started_at: DateTime<Utc>,
    ) -> PortResult<Uuid>;

    /// Appends a message at the end of the session's log.
    /// Fails with `InvalidState` when the session is already completed.
    async fn append_message(
        &self,
        owner: Uuid,
        session_id: Uuid,
        role: Role,
        content: &str,
    ) -> PortResult<Message>;

    async fn attach_evaluation(
        &self,
        owner: Uuid,
        message_id: MessageId,
        critique: &Critique,
    ) -> PortResult<()>;

    /// Loads the session with its messages in insertion order.
    async fn get(&self, owner: Uuid, session_id: Uuid) -> PortResult<Session>;

    /// Lists the owner's sessions, newest first.
    async fn list(&self, owner: Uuid) -> PortResult<Vec<SessionSummary>>;

    /// Writes the terminal state. Fails with `InvalidState` when already completed.
    async fn finalize(
        &self,
        owner: Uuid,
        session_id: Uuid,
        completion: &Completion,
    ) -> PortResult<()>;

    /// Hard-deletes the session and all of its messages.
    async fn delete(&self, owner: Uuid, session_id: Uuid) -> PortResult<()>;

    /// Returns the parsed text of one of the owner's resumes, if it exists.
    async fn resume_snapshot(&self, owner: Uuid, resume_id: Uuid) -> PortResult<Option<String>>;
}

/// The external text-generation backend.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Produces one assistant utterance from a system context and prior turns.
    async fn generate_text(&self, system_context: &str, history: &[ChatTurn])
        -> PortResult<String>;

    /// Sends a prompt that asks for a JSON document and returns the raw reply text.
    async fn generate_structured(&self, prompt: &str) -> PortResult<String>;
}

#[async_trait]
pub trait SpeechToTextService: Send + Sync {
    /// Transcribes audio data into text. `language` is a two-letter code or
    /// `None` to let the backend auto-detect.
    async fn transcribe_audio(
        &self,
        audio_data: &[u8],
        filename: &str,
        language: Option<&str>,
    ) -> PortResult<String>;
}

/// Resolves an opaque bearer credential to the id of the user it belongs to.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate_token(&self, token: &str) -> PortResult<Uuid>;
}

/// Bounds an external call; expiry becomes `PortError::Timeout`.
pub async fn with_timeout<T, F>(timeout: std::time::Duration, what: &str, call: F) -> PortResult<T>
where
    F: std::future::Future<Output = PortResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(PortError::Timeout(format!(
            "{what} did not complete within {}s",
            timeout.as_secs()
        ))),
    }
}
