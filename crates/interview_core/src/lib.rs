pub mod domain;
pub mod error;
pub mod evaluation;
pub mod interview;
pub mod ports;
pub mod prompts;
pub mod transcription;

pub use domain::{
    Completion, Critique, Difficulty, Grade, InterviewType, Language, Message, MessageId,
    NewInterview, Report, Role, Session, SessionConfig, SessionStatus, SessionSummary,
};
pub use error::InterviewError;
pub use interview::{
    EndOutcome, InterviewService, InterviewSettings, StartedInterview, TurnOutcome, VoiceAnswer,
    VoiceTurnOutcome,
};
pub use ports::{
    ChatTurn, CredentialValidator, GenerationService, PortError, PortResult, SessionRepository,
    SpeechToTextService,
};
pub use transcription::TranscriptionError;
