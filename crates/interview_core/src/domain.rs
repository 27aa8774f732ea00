//! crates/interview_core/src/domain.rs
//!
//! Defines the pure, core data structures for the interview service.
//! These structs are independent of any database or HTTP representation;
//! serde derives exist only so adapters can persist and return them as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::InterviewError;

/// Messages are ordered by this id; it only ever grows within the store.
pub type MessageId = i64;

//=========================================================================================
// Enumerated Configuration Values
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = InterviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(InterviewError::Validation(format!(
                "difficulty must be one of easy, medium, hard (got '{other}')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InterviewType {
    Behavioral,
    Technical,
    #[default]
    Mixed,
}

impl InterviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewType::Behavioral => "behavioral",
            InterviewType::Technical => "technical",
            InterviewType::Mixed => "mixed",
        }
    }
}

impl FromStr for InterviewType {
    type Err = InterviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "behavioral" => Ok(InterviewType::Behavioral),
            "technical" => Ok(InterviewType::Technical),
            "mixed" => Ok(InterviewType::Mixed),
            other => Err(InterviewError::Validation(format!(
                "interview_type must be one of behavioral, technical, mixed (got '{other}')"
            ))),
        }
    }
}

/// The language an interview is conducted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ar")]
    Arabic,
}

impl Language {
    /// The two-letter code, as stored and as sent to the transcription backend.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Arabic => "ar",
        }
    }

    /// Human-readable name used inside prompts.
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Arabic => "Arabic",
        }
    }
}

impl FromStr for Language {
    type Err = InterviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::English),
            "ar" => Ok(Language::Arabic),
            other => Err(InterviewError::Validation(format!(
                "language must be one of en, ar (got '{other}')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = InterviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(InterviewError::Validation(format!("unknown status '{other}'"))),
        }
    }
}

/// Exactly two participants ever author persisted messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = InterviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(InterviewError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

//=========================================================================================
// Session Configuration
//=========================================================================================

pub const JOB_ROLE_MIN_CHARS: usize = 2;
pub const JOB_ROLE_MAX_CHARS: usize = 255;
pub const JOB_DESCRIPTION_MAX_CHARS: usize = 5000;
pub const ANSWER_MAX_CHARS: usize = 5000;

/// Unvalidated input for starting an interview, as received from a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewInterview {
    pub job_role: String,
    pub difficulty: Option<String>,
    pub interview_type: Option<String>,
    pub language: Option<String>,
    pub resume_id: Option<Uuid>,
    pub job_description: Option<String>,
}

/// The immutable configuration of a session, fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub job_role: String,
    pub difficulty: Difficulty,
    pub interview_type: InterviewType,
    pub language: Language,
    pub resume_id: Option<Uuid>,
    /// Resume text captured once when the session was created.
    pub resume_snapshot: Option<String>,
    pub job_description: Option<String>,
}

impl NewInterview {
    /// Validates every field, producing a config without a resume snapshot.
    /// The snapshot is attached later by the state machine.
    pub fn validate(&self) -> Result<SessionConfig, InterviewError> {
        let job_role = self.job_role.trim();
        let role_len = job_role.chars().count();
        if !(JOB_ROLE_MIN_CHARS..=JOB_ROLE_MAX_CHARS).contains(&role_len) {
            return Err(InterviewError::Validation(format!(
                "job_role must be between {JOB_ROLE_MIN_CHARS} and {JOB_ROLE_MAX_CHARS} characters"
            )));
        }

        let difficulty = match self.difficulty.as_deref() {
            Some(raw) => raw.parse()?,
            None => Difficulty::default(),
        };
        let interview_type = match self.interview_type.as_deref() {
            Some(raw) => raw.parse()?,
            None => InterviewType::default(),
        };
        let language = match self.language.as_deref() {
            Some(raw) => raw.parse()?,
            None => Language::default(),
        };

        let job_description = self
            .job_description
            .as_deref()
            .map(str::trim)
            .filter(|jd| !jd.is_empty())
            .map(str::to_string);
        if let Some(jd) = &job_description {
            if jd.chars().count() > JOB_DESCRIPTION_MAX_CHARS {
                return Err(InterviewError::Validation(format!(
                    "job_description must be at most {JOB_DESCRIPTION_MAX_CHARS} characters"
                )));
            }
        }

        Ok(SessionConfig {
            job_role: job_role.to_string(),
            difficulty,
            interview_type,
            language,
            resume_id: self.resume_id,
            resume_snapshot: None,
            job_description,
        })
    }
}

/// Trims an answer and checks its length.
pub fn validate_answer(content: &str) -> Result<String, InterviewError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(InterviewError::Validation("answer content cannot be empty".to_string()));
    }
    if trimmed.chars().count() > ANSWER_MAX_CHARS {
        return Err(InterviewError::Validation(format!(
            "answer content must be at most {ANSWER_MAX_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

//=========================================================================================
// Evaluations
//=========================================================================================

/// Per-answer critique on a 1-10 scale. Fractional scores such as 7.5 are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default, alias = "tip", skip_serializing_if = "Option::is_none")]
    pub brief_feedback: Option<String>,
}

impl Critique {
    pub const MIN_SCORE: f64 = 1.0;
    pub const MAX_SCORE: f64 = 10.0;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

/// End-of-interview aggregate report. `overall_score` is on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub overall_score: f64,
    pub grade: Grade,
    pub summary: String,
    #[serde(default, alias = "top_strengths")]
    pub strengths: Vec<String>,
    #[serde(default, alias = "areas_for_improvement")]
    pub areas_to_improve: Vec<String>,
    #[serde(default, alias = "next_steps")]
    pub action_items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communication_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    /// Books, courses or topics to study next.
    #[serde(default)]
    pub recommended_resources: Vec<String>,
}

impl Report {
    pub const MAX_SCORE: f64 = 100.0;

    pub fn neutral() -> Self {
        Self {
            overall_score: 50.0,
            grade: Grade::C,
            summary: "Interview completed.".to_string(),
            strengths: Vec::new(),
            areas_to_improve: Vec::new(),
            action_items: Vec::new(),
            recommendation: Some("Needs practice".to_string()),
            communication_score: None,
            technical_score: None,
            confidence_score: None,
            recommended_resources: Vec::new(),
        }
    }
}

//=========================================================================================
// Sessions and Messages
//=========================================================================================

/// A single turn of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session_id: Uuid,
    pub role: Role,
    pub content: String,
    pub evaluation: Option<Critique>,
    /// Display only; ordering is by `id`.
    pub timestamp: DateTime<Utc>,
}

/// One interview attempt by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub config: SessionConfig,
    pub status: SessionStatus,
    pub score: Option<f64>,
    pub feedback: Option<Report>,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub messages: Vec<Message>,
}

impl Session {
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn user_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    /// The most recent interviewer question, if any.
    pub fn last_question(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }
}

/// The listing view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub job_role: String,
    pub difficulty: Difficulty,
    pub interview_type: InterviewType,
    pub language: Language,
    pub status: SessionStatus,
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub message_count: i64,
}

/// The terminal-state fields written exactly once when a session completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub score: f64,
    pub feedback: Report,
    pub completed_at: DateTime<Utc>,
    pub duration_minutes: i32,
}

impl Completion {
    /// Builds the completion record, rounding the duration up to at least one minute.
    pub fn new(report: Report, started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> Self {
        let elapsed = (completed_at - started_at).num_minutes();
        let duration_minutes = i32::try_from(elapsed.max(1)).unwrap_or(i32::MAX);
        Self {
            score: report.overall_score,
            feedback: report,
            completed_at,
            duration_minutes,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
