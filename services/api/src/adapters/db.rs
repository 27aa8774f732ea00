//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! `SessionRepository` and `CredentialValidator` ports from the core crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.
//!
//! Writes that must not touch a completed interview carry
//! `status = 'in_progress'` in their `WHERE` clause, so the terminal state is
//! enforced by the database even with several API processes running.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interview_core::{
    Completion, CredentialValidator, Critique, Message, MessageId, PortError, PortResult, Report,
    Role, Session, SessionConfig, SessionRepository, SessionStatus, SessionSummary,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the repository and credential ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Tells "does not exist for this owner" apart from "already completed"
    /// after a conditional write matched no row.
    async fn explain_missed_write(&self, owner: Uuid, session_id: Uuid) -> PortError {
        let status: Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT status FROM interviews WHERE id = $1 AND user_id = $2")
                .bind(session_id)
                .bind(owner)
                .fetch_optional(&self.pool)
                .await;
        match status {
            Ok(Some(_)) => PortError::InvalidState("Interview already completed".to_string()),
            Ok(None) => not_found(session_id),
            Err(e) => unexpected(e),
        }
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found(session_id: Uuid) -> PortError {
    PortError::NotFound(format!("Interview {} not found", session_id))
}

fn parse_column<T>(column: &str, raw: &str) -> PortResult<T>
where
    T: FromStr,
{
    raw.parse::<T>().map_err(|_| {
        PortError::Unexpected(format!("Unrecognised value '{}' in column {}", raw, column))
    })
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct InterviewRecord {
    id: Uuid,
    user_id: Uuid,
    job_role: String,
    difficulty: String,
    interview_type: String,
    language: String,
    resume_id: Option<Uuid>,
    resume_snapshot: Option<String>,
    job_description: Option<String>,
    status: String,
    score: Option<f64>,
    feedback: Option<Json<Report>>,
    created_at: DateTime<Utc>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    duration_minutes: Option<i32>,
}
impl InterviewRecord {
    fn to_domain(self, messages: Vec<Message>) -> PortResult<Session> {
        Ok(Session {
            id: self.id,
            user_id: self.user_id,
            config: SessionConfig {
                job_role: self.job_role,
                difficulty: parse_column("difficulty", &self.difficulty)?,
                interview_type: parse_column("interview_type", &self.interview_type)?,
                language: parse_column("language", &self.language)?,
                resume_id: self.resume_id,
                resume_snapshot: self.resume_snapshot,
                job_description: self.job_description,
            },
            status: parse_column::<SessionStatus>("status", &self.status)?,
            score: self.score,
            feedback: self.feedback.map(|Json(report)| report),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_minutes: self.duration_minutes,
            messages,
        })
    }
}

#[derive(FromRow)]
struct SummaryRecord {
    id: Uuid,
    job_role: String,
    difficulty: String,
    interview_type: String,
    language: String,
    status: String,
    score: Option<f64>,
    created_at: DateTime<Utc>,
    duration_minutes: Option<i32>,
    message_count: i64,
}
impl SummaryRecord {
    fn to_domain(self) -> PortResult<SessionSummary> {
        Ok(SessionSummary {
            id: self.id,
            job_role: self.job_role,
            difficulty: parse_column("difficulty", &self.difficulty)?,
            interview_type: parse_column("interview_type", &self.interview_type)?,
            language: parse_column("language", &self.language)?,
            status: parse_column("status", &self.status)?,
            score: self.score,
            created_at: self.created_at,
            duration_minutes: self.duration_minutes,
            message_count: self.message_count,
        })
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: i64,
    interview_id: Uuid,
    role: String,
    content: String,
    evaluation: Option<Json<Critique>>,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> PortResult<Message> {
        Ok(Message {
            id: self.id,
            session_id: self.interview_id,
            role: parse_column::<Role>("role", &self.role)?,
            content: self.content,
            evaluation: self.evaluation.map(|Json(critique)| critique),
            timestamp: self.created_at,
        })
    }
}

const INTERVIEW_COLUMNS: &str = "id, user_id, job_role, difficulty, interview_type, language, \
     resume_id, resume_snapshot, job_description, status, score, feedback, created_at, \
     started_at, completed_at, duration_minutes";

const MESSAGE_COLUMNS: &str = "id, interview_id, role, content, evaluation, created_at";

//=========================================================================================
// `SessionRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionRepository for DbAdapter {
    async fn create(
        &self,
        owner: Uuid,
        config: &SessionConfig,
        started_at: DateTime<Utc>,
    ) -> PortResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO interviews (id, user_id, job_role, difficulty, interview_type, language, \
             resume_id, resume_snapshot, job_description, started_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&config.job_role)
        .bind(config.difficulty.as_str())
        .bind(config.interview_type.as_str())
        .bind(config.language.code())
        .bind(config.resume_id)
        .bind(&config.resume_snapshot)
        .bind(&config.job_description)
        .bind(started_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(id)
    }

    async fn append_message(
        &self,
        owner: Uuid,
        session_id: Uuid,
        role: Role,
        content: &str,
    ) -> PortResult<Message> {
        let query = format!(
            "INSERT INTO interview_messages (interview_id, role, content) \
             SELECT id, $3, $4 FROM interviews \
             WHERE id = $1 AND user_id = $2 AND status = 'in_progress' \
             RETURNING {MESSAGE_COLUMNS}"
        );
        let record: Option<MessageRecord> = sqlx::query_as(&query)
            .bind(session_id)
            .bind(owner)
            .bind(role.as_str())
            .bind(content)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;

        match record {
            Some(record) => record.to_domain(),
            None => Err(self.explain_missed_write(owner, session_id).await),
        }
    }

    async fn attach_evaluation(
        &self,
        owner: Uuid,
        message_id: MessageId,
        critique: &Critique,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE interview_messages AS m SET evaluation = $1 \
             FROM interviews AS i \
             WHERE m.id = $2 AND m.role = 'user' AND m.interview_id = i.id AND i.user_id = $3",
        )
        .bind(Json(critique))
        .bind(message_id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Message {} not found", message_id)));
        }
        Ok(())
    }

    async fn get(&self, owner: Uuid, session_id: Uuid) -> PortResult<Session> {
        let query =
            format!("SELECT {INTERVIEW_COLUMNS} FROM interviews WHERE id = $1 AND user_id = $2");
        let record: InterviewRecord = sqlx::query_as(&query)
            .bind(session_id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| not_found(session_id))?;

        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM interview_messages \
             WHERE interview_id = $1 ORDER BY id ASC"
        );
        let messages = sqlx::query_as::<_, MessageRecord>(&query)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?
            .into_iter()
            .map(MessageRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;

        record.to_domain(messages)
    }

    async fn list(&self, owner: Uuid) -> PortResult<Vec<SessionSummary>> {
        let records: Vec<SummaryRecord> = sqlx::query_as(
            "SELECT i.id, i.job_role, i.difficulty, i.interview_type, i.language, i.status, \
             i.score, i.created_at, i.duration_minutes, COUNT(m.id) AS message_count \
             FROM interviews AS i \
             LEFT JOIN interview_messages AS m ON m.interview_id = i.id \
             WHERE i.user_id = $1 \
             GROUP BY i.id \
             ORDER BY i.created_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(SummaryRecord::to_domain).collect()
    }

    async fn finalize(
        &self,
        owner: Uuid,
        session_id: Uuid,
        completion: &Completion,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE interviews \
             SET status = 'completed', score = $3, feedback = $4, completed_at = $5, \
                 duration_minutes = $6 \
             WHERE id = $1 AND user_id = $2 AND status = 'in_progress'",
        )
        .bind(session_id)
        .bind(owner)
        .bind(completion.score)
        .bind(Json(&completion.feedback))
        .bind(completion.completed_at)
        .bind(completion.duration_minutes)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(self.explain_missed_write(owner, session_id).await);
        }
        Ok(())
    }

    async fn delete(&self, owner: Uuid, session_id: Uuid) -> PortResult<()> {
        // Messages go with the interview via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM interviews WHERE id = $1 AND user_id = $2")
            .bind(session_id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(not_found(session_id));
        }
        Ok(())
    }

    async fn resume_snapshot(&self, owner: Uuid, resume_id: Uuid) -> PortResult<Option<String>> {
        sqlx::query_scalar("SELECT parsed_content FROM resumes WHERE id = $1 AND user_id = $2")
            .bind(resume_id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)
    }
}

//=========================================================================================
// `CredentialValidator` Trait Implementation
//=========================================================================================

#[async_trait]
impl CredentialValidator for DbAdapter {
    async fn validate_token(&self, token: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE token = $1 AND expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        user_id.ok_or_else(|| {
            debug!("Rejected unknown or expired bearer token.");
            PortError::Unauthorized
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::{Difficulty, InterviewType, Language};

    fn record(status: &str, difficulty: &str) -> InterviewRecord {
        let now = Utc::now();
        InterviewRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            job_role: "Data Engineer".to_string(),
            difficulty: difficulty.to_string(),
            interview_type: "behavioral".to_string(),
            language: "ar".to_string(),
            resume_id: None,
            resume_snapshot: Some("Spark, Airflow".to_string()),
            job_description: None,
            status: status.to_string(),
            score: None,
            feedback: None,
            created_at: now,
            started_at: now,
            completed_at: None,
            duration_minutes: None,
        }
    }

    #[test]
    fn test_interview_record_maps_text_columns() {
        let session = record("in_progress", "hard").to_domain(Vec::new()).unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.config.difficulty, Difficulty::Hard);
        assert_eq!(session.config.interview_type, InterviewType::Behavioral);
        assert_eq!(session.config.language, Language::Arabic);
        assert_eq!(session.config.resume_snapshot.as_deref(), Some("Spark, Airflow"));
    }

    #[test]
    fn test_corrupt_column_is_unexpected_not_validation() {
        let err = record("in_progress", "extreme").to_domain(Vec::new()).unwrap_err();
        assert!(matches!(err, PortError::Unexpected(msg) if msg.contains("difficulty")));
    }

    #[test]
    fn test_message_record_unwraps_evaluation() {
        let critique = Critique {
            score: 7.5,
            strengths: vec!["measured before optimising".to_string()],
            improvements: Vec::new(),
            brief_feedback: None,
        };
        let message = MessageRecord {
            id: 42,
            interview_id: Uuid::new_v4(),
            role: "user".to_string(),
            content: "I profiled the hot path first.".to_string(),
            evaluation: Some(Json(critique.clone())),
            created_at: Utc::now(),
        }
        .to_domain()
        .unwrap();
        assert_eq!(message.id, 42);
        assert_eq!(message.role, Role::User);
        assert_eq!(message.evaluation, Some(critique));
    }
}
