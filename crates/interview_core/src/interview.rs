//! crates/interview_core/src/interview.rs
//!
//! The interview session state machine.
//!
//! A session is created `in_progress` together with its opening question and
//! moves to `completed` exactly once. Every turn-advancing operation runs as one
//! linear sequence (store answer, evaluate, ask next question, maybe finalize)
//! while holding a per-session lock, so turns of one session never interleave.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    validate_answer, Completion, Message, NewInterview, Report, Role, Session, SessionStatus,
    SessionSummary,
};
use crate::error::InterviewError;
use crate::evaluation::Evaluator;
use crate::ports::{
    with_timeout, ChatTurn, GenerationService, PortError, SessionRepository, SpeechToTextService,
};
use crate::prompts::{self, COMPLETION_SENTINEL};
use crate::transcription::Transcriber;

/// Used only when a session somehow has no interviewer message to answer.
const FALLBACK_QUESTION: &str = "Tell me about yourself.";

//=========================================================================================
// Settings and Results
//=========================================================================================

#[derive(Debug, Clone)]
pub struct InterviewSettings {
    /// The interview ends after this many candidate answers even without a sentinel.
    pub max_user_turns: usize,
    /// Upper bound for every Generation Service and transcription call.
    pub ai_timeout: Duration,
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            max_user_turns: 7,
            ai_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StartedInterview {
    pub session_id: Uuid,
    pub opening: Message,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub user_message: Message,
    pub assistant_message: Message,
    pub status: SessionStatus,
    pub score: Option<f64>,
    pub feedback: Option<Report>,
}

#[derive(Debug, Clone)]
pub struct VoiceTurnOutcome {
    pub transcript: String,
    pub turn: TurnOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndOutcome {
    pub status: SessionStatus,
    pub score: Option<f64>,
    pub feedback: Option<Report>,
}

/// A recorded voice answer awaiting transcription.
#[derive(Debug, Clone, Copy)]
pub struct VoiceAnswer<'a> {
    pub audio: &'a [u8],
    pub filename: Option<&'a str>,
    pub language: Option<&'a str>,
}

//=========================================================================================
// End-of-Interview Decision
//=========================================================================================

/// Whether a reply ends the interview, and the text to store for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndDecision {
    pub should_end: bool,
    pub message: String,
    pub sentinel_seen: bool,
    pub turn_limit_reached: bool,
}

/// Strips the sentinel from `reply` and decides whether the interview ends.
/// The sentinel alone is enough; the turn counter is a fallback.
pub fn decide_end(reply: &str, user_turns: usize, max_user_turns: usize) -> EndDecision {
    let sentinel_seen = reply.contains(COMPLETION_SENTINEL);
    let message = reply.replace(COMPLETION_SENTINEL, "").trim().to_string();
    let turn_limit_reached = user_turns >= max_user_turns;
    EndDecision {
        should_end: sentinel_seen || turn_limit_reached,
        message,
        sentinel_seen,
        turn_limit_reached,
    }
}

//=========================================================================================
// Per-Session Serialisation
//=========================================================================================

#[derive(Default)]
struct SessionLocks {
    inner: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    async fn acquire(&self, session_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on are only referenced by the map.
            map.retain(|id, lock| *id == session_id || Arc::strong_count(lock) > 1);
            map.entry(session_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    fn forget(&self, session_id: Uuid) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session_id);
    }
}

//=========================================================================================
// The State Machine
//=========================================================================================

pub struct InterviewService {
    repo: Arc<dyn SessionRepository>,
    generator: Arc<dyn GenerationService>,
    evaluator: Evaluator,
    transcriber: Transcriber,
    settings: InterviewSettings,
    locks: SessionLocks,
}

impl InterviewService {
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        generator: Arc<dyn GenerationService>,
        speech: Arc<dyn SpeechToTextService>,
        settings: InterviewSettings,
    ) -> Self {
        Self {
            evaluator: Evaluator::new(generator.clone(), settings.ai_timeout),
            transcriber: Transcriber::new(speech, settings.ai_timeout),
            repo,
            generator,
            settings,
            locks: SessionLocks::default(),
        }
    }

    pub fn settings(&self) -> &InterviewSettings {
        &self.settings
    }

    async fn generate(&self, system: &str, history: &[ChatTurn]) -> Result<String, InterviewError> {
        with_timeout(
            self.settings.ai_timeout,
            "text generation",
            self.generator.generate_text(system, history),
        )
        .await
        .map_err(|e| InterviewError::Upstream(e.to_string()))
    }

    async fn load_in_progress(
        &self,
        owner: Uuid,
        session_id: Uuid,
    ) -> Result<Session, InterviewError> {
        let session = self.repo.get(owner, session_id).await?;
        if session.is_completed() {
            return Err(InterviewError::InvalidState(
                "Interview already completed".to_string(),
            ));
        }
        Ok(session)
    }

    /// Starts an interview. Either the session and its opening question both
    /// exist afterwards, or neither does.
    pub async fn create_session(
        &self,
        owner: Uuid,
        request: &NewInterview,
    ) -> Result<StartedInterview, InterviewError> {
        let mut config = request.validate()?;
        if let Some(resume_id) = config.resume_id {
            config.resume_snapshot = self.repo.resume_snapshot(owner, resume_id).await?;
            if config.resume_snapshot.is_none() {
                info!(
                    "Resume {} not available to user {}; starting without it.",
                    resume_id, owner
                );
                config.resume_id = None;
            }
        }

        let session_id = self.repo.create(owner, &config, Utc::now()).await?;
        info!(
            "Created interview {} for user {} ({} {} {}).",
            session_id,
            owner,
            config.job_role,
            config.difficulty.as_str(),
            config.interview_type.as_str()
        );

        let system = prompts::system_context(&config);
        let opening_turn = [ChatTurn::user(prompts::opening_instruction(config.language))];
        let opening_text = match self.generate(&system, &opening_turn).await {
            Ok(reply) => {
                let text = reply.replace(COMPLETION_SENTINEL, "").trim().to_string();
                if text.is_empty() {
                    Err(InterviewError::Upstream("opening message was empty".to_string()))
                } else {
                    Ok(text)
                }
            }
            Err(e) => Err(e),
        };

        let opening = match opening_text {
            Ok(text) => self
                .repo
                .append_message(owner, session_id, Role::Assistant, &text)
                .await
                .map_err(InterviewError::from),
            Err(e) => Err(e),
        };

        match opening {
            Ok(opening) => Ok(StartedInterview { session_id, opening }),
            Err(e) => {
                error!("Starting interview {} failed, rolling back: {}", session_id, e);
                if let Err(cleanup) = self.repo.delete(owner, session_id).await {
                    error!("Rollback of interview {} failed: {}", session_id, cleanup);
                }
                Err(e)
            }
        }
    }

    pub async fn submit_answer(
        &self,
        owner: Uuid,
        session_id: Uuid,
        content: &str,
    ) -> Result<TurnOutcome, InterviewError> {
        let content = validate_answer(content)?;
        let _turn = self.locks.acquire(session_id).await;
        let session = self.load_in_progress(owner, session_id).await?;
        self.advance(owner, session, &content).await
    }

    /// Transcribes the audio first; nothing is recorded unless speech was recognised.
    pub async fn submit_voice_answer(
        &self,
        owner: Uuid,
        session_id: Uuid,
        voice: VoiceAnswer<'_>,
    ) -> Result<VoiceTurnOutcome, InterviewError> {
        let _turn = self.locks.acquire(session_id).await;
        let session = self.load_in_progress(owner, session_id).await?;

        let transcript = self
            .transcriber
            .transcribe(voice.audio, voice.filename, voice.language)
            .await?;
        let content = validate_answer(&transcript)?;
        info!(
            "Transcribed voice answer for interview {}: {} chars",
            session_id,
            content.len()
        );

        let turn = self.advance(owner, session, &content).await?;
        Ok(VoiceTurnOutcome {
            transcript: content,
            turn,
        })
    }

    /// One full turn. The caller holds the session lock and has checked the status.
    async fn advance(
        &self,
        owner: Uuid,
        session: Session,
        content: &str,
    ) -> Result<TurnOutcome, InterviewError> {
        let config = &session.config;

        // 1. The answer is durable before any AI call.
        let mut user_message = self
            .repo
            .append_message(owner, session.id, Role::User, content)
            .await?;

        // 2. The question being answered.
        let question = match session.last_question() {
            Some(m) => m.content.as_str(),
            None => {
                warn!(
                    "Interview {} has no interviewer message; using a fallback question.",
                    session.id
                );
                FALLBACK_QUESTION
            }
        };

        // 3. Best-effort critique of the answer; none is stored when it fails.
        let critique = self
            .evaluator
            .evaluate_turn(
                question,
                content,
                &config.job_role,
                config.difficulty,
                config.language,
            )
            .await;
        if let Some(critique) = critique {
            match self
                .repo
                .attach_evaluation(owner, user_message.id, &critique)
                .await
            {
                Ok(()) => user_message.evaluation = Some(critique),
                Err(e) => warn!(
                    "Could not store evaluation for message {}: {}",
                    user_message.id, e
                ),
            }
        }

        // 4. Next question (or closing remarks once the turn limit is hit).
        let user_turns = session.user_turns() + 1;
        let mut history: Vec<ChatTurn> = session.messages.iter().map(ChatTurn::from).collect();
        history.push(ChatTurn::user(content));
        if user_turns >= self.settings.max_user_turns {
            history.push(ChatTurn::user(prompts::closing_instruction(config.language)));
        }

        let system = prompts::system_context(config);
        let reply = self.generate(&system, &history).await.map_err(|e| {
            error!("Next question for interview {} failed: {}", session.id, e);
            e
        })?;

        // 5. End-of-interview decision.
        let decision = decide_end(&reply, user_turns, self.settings.max_user_turns);
        if decision.sentinel_seen != decision.turn_limit_reached {
            info!(
                "Interview {}: end signals disagree at turn {} (sentinel={}, turn_limit={}).",
                session.id, user_turns, decision.sentinel_seen, decision.turn_limit_reached
            );
        }
        let assistant_text = if !decision.message.is_empty() {
            decision.message.clone()
        } else if decision.should_end {
            prompts::default_closing(config.language).to_string()
        } else {
            return Err(InterviewError::Upstream("next question was empty".to_string()));
        };

        // 6. Score the whole interview when it ends.
        let completion = if decision.should_end {
            let mut transcript = session.messages.clone();
            transcript.push(user_message.clone());
            let report = self
                .evaluator
                .evaluate_interview(
                    &transcript,
                    &config.job_role,
                    config.difficulty,
                    config.interview_type,
                    config.language,
                )
                .await;
            Some(Completion::new(report, session.started_at, Utc::now()))
        } else {
            None
        };

        // 7. Record the interviewer's message, then close the session.
        let assistant_message = self
            .repo
            .append_message(owner, session.id, Role::Assistant, &assistant_text)
            .await?;

        let Some(completion) = completion else {
            return Ok(TurnOutcome {
                user_message,
                assistant_message,
                status: SessionStatus::InProgress,
                score: None,
                feedback: None,
            });
        };

        match self.repo.finalize(owner, session.id, &completion).await {
            Ok(()) => {
                info!(
                    "Interview {} completed after {} answers with score {}.",
                    session.id, user_turns, completion.score
                );
                Ok(TurnOutcome {
                    user_message,
                    assistant_message,
                    status: SessionStatus::Completed,
                    score: Some(completion.score),
                    feedback: Some(completion.feedback),
                })
            }
            Err(PortError::InvalidState(_)) => {
                // Another process completed it first; report what was stored.
                let current = self.repo.get(owner, session.id).await?;
                info!(
                    "Interview {} was completed concurrently; returning the stored result.",
                    session.id
                );
                Ok(TurnOutcome {
                    user_message,
                    assistant_message,
                    status: current.status,
                    score: current.score,
                    feedback: current.feedback,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Ends the interview early. Calling it again returns the stored result.
    pub async fn end_session(
        &self,
        owner: Uuid,
        session_id: Uuid,
    ) -> Result<EndOutcome, InterviewError> {
        let _turn = self.locks.acquire(session_id).await;
        let session = self.repo.get(owner, session_id).await?;

        if session.is_completed() {
            return Ok(EndOutcome {
                status: session.status,
                score: session.score,
                feedback: session.feedback,
            });
        }

        if session.messages.is_empty() {
            warn!("Interview {} has no messages; leaving it in progress.", session_id);
            return Ok(EndOutcome {
                status: session.status,
                score: None,
                feedback: None,
            });
        }

        let config = &session.config;
        let report = self
            .evaluator
            .evaluate_interview(
                &session.messages,
                &config.job_role,
                config.difficulty,
                config.interview_type,
                config.language,
            )
            .await;
        let completion = Completion::new(report, session.started_at, Utc::now());

        match self.repo.finalize(owner, session_id, &completion).await {
            Ok(()) => {
                info!(
                    "Interview {} ended early with score {}.",
                    session_id, completion.score
                );
                Ok(EndOutcome {
                    status: SessionStatus::Completed,
                    score: Some(completion.score),
                    feedback: Some(completion.feedback),
                })
            }
            Err(PortError::InvalidState(_)) => {
                // Another process completed it first; report what was stored.
                let current = self.repo.get(owner, session_id).await?;
                Ok(EndOutcome {
                    status: current.status,
                    score: current.score,
                    feedback: current.feedback,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_session(
        &self,
        owner: Uuid,
        session_id: Uuid,
    ) -> Result<Session, InterviewError> {
        Ok(self.repo.get(owner, session_id).await?)
    }

    pub async fn list_sessions(&self, owner: Uuid) -> Result<Vec<SessionSummary>, InterviewError> {
        Ok(self.repo.list(owner).await?)
    }

    /// Irreversibly removes the session and its messages, whatever its status.
    pub async fn delete_session(
        &self,
        owner: Uuid,
        session_id: Uuid,
    ) -> Result<(), InterviewError> {
        {
            let _turn = self.locks.acquire(session_id).await;
            self.repo.delete(owner, session_id).await?;
        }
        self.locks.forget(session_id);
        info!("Deleted interview {} for user {}.", session_id, owner);
        Ok(())
    }
}
