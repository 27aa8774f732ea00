//! crates/interview_core/src/error.rs
//!
//! The error taxonomy surfaced by the interview state machine.

use crate::ports::PortError;

/// Every failure a caller of the state machine can observe.
#[derive(Debug, thiserror::Error)]
pub enum InterviewError {
    /// Malformed input; rejected before any state change.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The session does not exist or belongs to someone else.
    #[error("Interview not found")]
    NotFound,

    /// The operation is not permitted in the session's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A required Generation Service call failed or timed out.
    #[error("Upstream generation failed: {0}")]
    Upstream(String),

    /// The transcription backend failed.
    #[error("Transcription failed: {0}")]
    Transcription(String),

    /// The audio was processed but no speech was recognised.
    #[error("No speech could be recognised in the audio")]
    EmptyTranscript,

    /// The session repository failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl InterviewError {
    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InterviewError::Upstream(_)
                | InterviewError::Transcription(_)
                | InterviewError::EmptyTranscript
                | InterviewError::Storage(_)
        )
    }
}

impl From<PortError> for InterviewError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(_) => InterviewError::NotFound,
            PortError::InvalidState(msg) => InterviewError::InvalidState(msg),
            PortError::Unauthorized => InterviewError::NotFound,
            PortError::Timeout(msg) | PortError::Unexpected(msg) => InterviewError::Storage(msg),
        }
    }
}
