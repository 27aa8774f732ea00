//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::state::{AppState, CurrentUser};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use interview_core::{
    Critique, EndOutcome, Message, NewInterview, Report, Session, SessionSummary, TurnOutcome,
    VoiceAnswer,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        create_interview_handler,
        list_interviews_handler,
        get_interview_handler,
        delete_interview_handler,
        submit_answer_handler,
        submit_voice_handler,
        end_interview_handler,
    ),
    components(
        schemas(
            CreateInterviewRequest,
            CreateInterviewResponse,
            AnswerRequest,
            MessageView,
            InterviewDetail,
            InterviewSummaryView,
            TurnResponse,
            VoiceTurnResponse,
            EndResponse,
            HealthResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Interviews", description = "Mock interview sessions: create, answer, end, review.")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl utoipa::Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The payload for starting an interview.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInterviewRequest {
    #[schema(example = "Backend Engineer")]
    pub job_role: String,
    /// `easy`, `medium` (default) or `hard`.
    pub difficulty: Option<String>,
    /// `behavioral`, `technical` or `mixed` (default).
    pub interview_type: Option<String>,
    /// `en` (default) or `ar`.
    pub language: Option<String>,
    pub resume_id: Option<Uuid>,
    pub job_description: Option<String>,
}

impl From<CreateInterviewRequest> for NewInterview {
    fn from(req: CreateInterviewRequest) -> Self {
        NewInterview {
            job_role: req.job_role,
            difficulty: req.difficulty,
            interview_type: req.interview_type,
            language: req.language,
            resume_id: req.resume_id,
            job_description: req.job_description,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerRequest {
    pub content: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GetInterviewQuery {
    /// Whether to include the full message history (defaults to true).
    pub include_messages: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageView {
    pub id: i64,
    #[schema(example = "assistant")]
    pub role: String,
    pub content: String,
    #[schema(value_type = Option<Object>)]
    pub evaluation: Option<Critique>,
    pub timestamp: DateTime<Utc>,
}

impl From<Message> for MessageView {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            role: m.role.as_str().to_string(),
            content: m.content,
            evaluation: m.evaluation,
            timestamp: m.timestamp,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateInterviewResponse {
    pub session_id: Uuid,
    #[schema(example = "in_progress")]
    pub status: String,
    pub opening_message: MessageView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InterviewDetail {
    pub id: Uuid,
    pub job_role: String,
    pub difficulty: String,
    pub interview_type: String,
    pub language: String,
    pub resume_id: Option<Uuid>,
    pub job_description: Option<String>,
    pub status: String,
    pub score: Option<f64>,
    #[schema(value_type = Option<Object>)]
    pub feedback: Option<Report>,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub message_count: usize,
    /// Present unless `include_messages=false` was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<MessageView>>,
}

impl InterviewDetail {
    fn from_session(session: Session, include_messages: bool) -> Self {
        let message_count = session.messages.len();
        let messages = include_messages
            .then(|| session.messages.into_iter().map(MessageView::from).collect());
        Self {
            id: session.id,
            job_role: session.config.job_role,
            difficulty: session.config.difficulty.as_str().to_string(),
            interview_type: session.config.interview_type.as_str().to_string(),
            language: session.config.language.code().to_string(),
            resume_id: session.config.resume_id,
            job_description: session.config.job_description,
            status: session.status.as_str().to_string(),
            score: session.score,
            feedback: session.feedback,
            created_at: session.created_at,
            started_at: session.started_at,
            completed_at: session.completed_at,
            duration_minutes: session.duration_minutes,
            message_count,
            messages,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InterviewSummaryView {
    pub id: Uuid,
    pub job_role: String,
    pub difficulty: String,
    pub interview_type: String,
    pub language: String,
    pub status: String,
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub message_count: i64,
}

impl From<SessionSummary> for InterviewSummaryView {
    fn from(s: SessionSummary) -> Self {
        Self {
            id: s.id,
            job_role: s.job_role,
            difficulty: s.difficulty.as_str().to_string(),
            interview_type: s.interview_type.as_str().to_string(),
            language: s.language.code().to_string(),
            status: s.status.as_str().to_string(),
            score: s.score,
            created_at: s.created_at,
            duration_minutes: s.duration_minutes,
            message_count: s.message_count,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TurnResponse {
    pub user_message: MessageView,
    pub assistant_message: MessageView,
    #[schema(example = "in_progress")]
    pub interview_status: String,
    pub score: Option<f64>,
    #[schema(value_type = Option<Object>)]
    pub feedback: Option<Report>,
}

impl From<TurnOutcome> for TurnResponse {
    fn from(t: TurnOutcome) -> Self {
        Self {
            user_message: t.user_message.into(),
            assistant_message: t.assistant_message.into(),
            interview_status: t.status.as_str().to_string(),
            score: t.score,
            feedback: t.feedback,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoiceTurnResponse {
    pub transcript: String,
    #[serde(flatten)]
    pub turn: TurnResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EndResponse {
    pub interview_status: String,
    pub score: Option<f64>,
    #[schema(value_type = Option<Object>)]
    pub feedback: Option<Report>,
}

impl From<EndOutcome> for EndResponse {
    fn from(e: EndOutcome) -> Self {
        Self {
            interview_status: e.status.as_str().to_string(),
            score: e.score,
            feedback: e.feedback,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Start a new interview and receive the interviewer's opening question.
#[utoipa::path(
    post,
    path = "/api/v1/interviews",
    tag = "Interviews",
    request_body = CreateInterviewRequest,
    responses(
        (status = 201, description = "Interview started", body = CreateInterviewResponse),
        (status = 400, description = "Invalid configuration"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 502, description = "The interviewer model is unavailable")
    ),
    security(("bearer" = []))
)]
pub async fn create_interview_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(payload): Json<CreateInterviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let started = state
        .interviews
        .create_session(user_id, &payload.into())
        .await?;
    let response = CreateInterviewResponse {
        session_id: started.session_id,
        status: "in_progress".to_string(),
        opening_message: started.opening.into(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// List the caller's interviews, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/interviews",
    tag = "Interviews",
    responses(
        (status = 200, description = "The caller's interviews", body = [InterviewSummaryView]),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearer" = []))
)]
pub async fn list_interviews_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Vec<InterviewSummaryView>>, ApiError> {
    let summaries = state.interviews.list_sessions(user_id).await?;
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/interviews/{id}",
    tag = "Interviews",
    params(("id" = Uuid, Path, description = "Interview id"), GetInterviewQuery),
    responses(
        (status = 200, description = "The interview", body = InterviewDetail),
        (status = 404, description = "No such interview for this user")
    ),
    security(("bearer" = []))
)]
pub async fn get_interview_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<GetInterviewQuery>,
) -> Result<Json<InterviewDetail>, ApiError> {
    let session = state.interviews.get_session(user_id, id).await?;
    let include_messages = query.include_messages.unwrap_or(true);
    Ok(Json(InterviewDetail::from_session(session, include_messages)))
}

/// Permanently delete an interview and its messages.
#[utoipa::path(
    delete,
    path = "/api/v1/interviews/{id}",
    tag = "Interviews",
    params(("id" = Uuid, Path, description = "Interview id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such interview for this user")
    ),
    security(("bearer" = []))
)]
pub async fn delete_interview_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.interviews.delete_session(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Answer the current question in text.
#[utoipa::path(
    post,
    path = "/api/v1/interviews/{id}/message",
    tag = "Interviews",
    params(("id" = Uuid, Path, description = "Interview id")),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "The next question, or the final report", body = TurnResponse),
        (status = 400, description = "Empty or oversized answer"),
        (status = 404, description = "No such interview for this user"),
        (status = 409, description = "The interview is already completed"),
        (status = 502, description = "The interviewer model is unavailable")
    ),
    security(("bearer" = []))
)]
pub async fn submit_answer_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let turn = state
        .interviews
        .submit_answer(user_id, id, &payload.content)
        .await?;
    Ok(Json(turn.into()))
}

/// Answer the current question with a recording.
///
/// Accepts `multipart/form-data` with an `audio` file part and an optional
/// `language` text part (e.g. `en`, `ar-SA`).
#[utoipa::path(
    post,
    path = "/api/v1/interviews/{id}/voice",
    tag = "Interviews",
    params(("id" = Uuid, Path, description = "Interview id")),
    request_body(
        content_type = "multipart/form-data",
        description = "`audio` file and optional `language`."
    ),
    responses(
        (status = 200, description = "Transcript plus the next question", body = VoiceTurnResponse),
        (status = 400, description = "Missing audio part"),
        (status = 409, description = "The interview is already completed"),
        (status = 422, description = "No speech was recognised"),
        (status = 503, description = "Speech recognition is unavailable")
    ),
    security(("bearer" = []))
)]
pub async fn submit_voice_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<VoiceTurnResponse>, ApiError> {
    let mut audio: Option<Bytes> = None;
    let mut filename: Option<String> = None;
    let mut language: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("audio") => {
                filename = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read audio bytes: {}", e))
                })?;
                audio = Some(bytes);
            }
            Some("language") => {
                let text = field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read language field: {}", e))
                })?;
                language = Some(text);
            }
            _ => {}
        }
    }

    let audio = audio.ok_or_else(|| {
        ApiError::BadRequest("Multipart form must include an 'audio' file".to_string())
    })?;
    info!("Received {} bytes of audio for interview {}.", audio.len(), id);

    let voice = VoiceAnswer {
        audio: &audio,
        filename: filename.as_deref(),
        language: language.as_deref(),
    };
    let outcome = state
        .interviews
        .submit_voice_answer(user_id, id, voice)
        .await?;

    Ok(Json(VoiceTurnResponse {
        transcript: outcome.transcript,
        turn: outcome.turn.into(),
    }))
}

/// End the interview now and receive the final report. Safe to repeat.
#[utoipa::path(
    post,
    path = "/api/v1/interviews/{id}/end",
    tag = "Interviews",
    params(("id" = Uuid, Path, description = "Interview id")),
    responses(
        (status = 200, description = "The final status and report", body = EndResponse),
        (status = 404, description = "No such interview for this user")
    ),
    security(("bearer" = []))
)]
pub async fn end_interview_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<EndResponse>, ApiError> {
    let outcome = state.interviews.end_session(user_id, id).await?;
    Ok(Json(outcome.into()))
}
