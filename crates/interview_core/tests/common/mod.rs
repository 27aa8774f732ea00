//! In-memory test doubles for the core ports.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interview_core::{
    ChatTurn, Completion, Critique, GenerationService, InterviewService, InterviewSettings,
    Message, MessageId, NewInterview, PortError, PortResult, Role, Session, SessionConfig,
    SessionRepository, SessionStatus, SessionSummary, SpeechToTextService,
};
use uuid::Uuid;

//=========================================================================================
// Repository
//=========================================================================================

struct Stored {
    owner: Uuid,
    session: Session,
}

#[derive(Default)]
struct RepoState {
    sessions: HashMap<Uuid, Stored>,
    resumes: HashMap<Uuid, (Uuid, String)>,
    next_message_id: MessageId,
}

#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<RepoState>,
    lose_finalize_race: AtomicBool,
}

/// Score written by the simulated competing replica.
pub const RACING_SCORE: f64 = 91.0;

impl MemoryRepository {
    pub fn add_resume(&self, owner: Uuid, text: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state
            .lock()
            .unwrap()
            .resumes
            .insert(id, (owner, text.to_string()));
        id
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    /// Direct read that bypasses ownership, for assertions.
    pub fn raw(&self, session_id: Uuid) -> Option<Session> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .get(&session_id)
            .map(|s| s.session.clone())
    }

    /// The next `finalize` behaves as if another process completed the
    /// session just before it: the session ends up completed with
    /// `RACING_SCORE` and the call reports `InvalidState`.
    pub fn lose_next_finalize_race(&self) {
        self.lose_finalize_race.store(true, Ordering::SeqCst);
    }

    fn not_found(session_id: Uuid) -> PortError {
        PortError::NotFound(format!("Interview {session_id} not found"))
    }
}

#[async_trait]
impl SessionRepository for MemoryRepository {
    async fn create(
        &self,
        owner: Uuid,
        config: &SessionConfig,
        started_at: DateTime<Utc>,
    ) -> PortResult<Uuid> {
        let id = Uuid::new_v4();
        let session = Session {
            id,
            user_id: owner,
            config: config.clone(),
            status: SessionStatus::InProgress,
            score: None,
            feedback: None,
            created_at: started_at,
            started_at,
            completed_at: None,
            duration_minutes: None,
            messages: Vec::new(),
        };
        self.state
            .lock()
            .unwrap()
            .sessions
            .insert(id, Stored { owner, session });
        Ok(id)
    }

    async fn append_message(
        &self,
        owner: Uuid,
        session_id: Uuid,
        role: Role,
        content: &str,
    ) -> PortResult<Message> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let stored = state
            .sessions
            .get_mut(&session_id)
            .filter(|s| s.owner == owner)
            .ok_or_else(|| Self::not_found(session_id))?;
        if stored.session.status == SessionStatus::Completed {
            return Err(PortError::InvalidState("Interview already completed".to_string()));
        }
        state.next_message_id += 1;
        let id = state.next_message_id;
        let message = Message {
            id,
            session_id,
            role,
            content: content.to_string(),
            evaluation: None,
            timestamp: Utc::now(),
        };
        stored.session.messages.push(message.clone());
        Ok(message)
    }

    async fn attach_evaluation(
        &self,
        owner: Uuid,
        message_id: MessageId,
        critique: &Critique,
    ) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        let message = state
            .sessions
            .values_mut()
            .filter(|s| s.owner == owner)
            .flat_map(|s| s.session.messages.iter_mut())
            .find(|m| m.id == message_id && m.role == Role::User)
            .ok_or_else(|| PortError::NotFound(format!("Message {message_id} not found")))?;
        message.evaluation = Some(critique.clone());
        Ok(())
    }

    async fn get(&self, owner: Uuid, session_id: Uuid) -> PortResult<Session> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .get(&session_id)
            .filter(|s| s.owner == owner)
            .map(|s| s.session.clone())
            .ok_or_else(|| Self::not_found(session_id))
    }

    async fn list(&self, owner: Uuid) -> PortResult<Vec<SessionSummary>> {
        let state = self.state.lock().unwrap();
        let mut summaries: Vec<SessionSummary> = state
            .sessions
            .values()
            .filter(|s| s.owner == owner)
            .map(|s| SessionSummary {
                id: s.session.id,
                job_role: s.session.config.job_role.clone(),
                difficulty: s.session.config.difficulty,
                interview_type: s.session.config.interview_type,
                language: s.session.config.language,
                status: s.session.status,
                score: s.session.score,
                created_at: s.session.created_at,
                duration_minutes: s.session.duration_minutes,
                message_count: s.session.messages.len() as i64,
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn finalize(
        &self,
        owner: Uuid,
        session_id: Uuid,
        completion: &Completion,
    ) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .sessions
            .get_mut(&session_id)
            .filter(|s| s.owner == owner)
            .ok_or_else(|| Self::not_found(session_id))?;
        if stored.session.status == SessionStatus::Completed {
            return Err(PortError::InvalidState("Interview already completed".to_string()));
        }
        let lost_race = self.lose_finalize_race.swap(false, Ordering::SeqCst);
        stored.session.status = SessionStatus::Completed;
        stored.session.feedback = Some(completion.feedback.clone());
        stored.session.completed_at = Some(completion.completed_at);
        stored.session.duration_minutes = Some(completion.duration_minutes);
        if lost_race {
            stored.session.score = Some(RACING_SCORE);
            return Err(PortError::InvalidState("Interview already completed".to_string()));
        }
        stored.session.score = Some(completion.score);
        Ok(())
    }

    async fn delete(&self, owner: Uuid, session_id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.sessions.get(&session_id) {
            Some(s) if s.owner == owner => {
                state.sessions.remove(&session_id);
                Ok(())
            }
            _ => Err(Self::not_found(session_id)),
        }
    }

    async fn resume_snapshot(&self, owner: Uuid, resume_id: Uuid) -> PortResult<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .resumes
            .get(&resume_id)
            .filter(|(o, _)| *o == owner)
            .map(|(_, text)| text.clone()))
    }
}

//=========================================================================================
// Generation Service
//=========================================================================================

pub const CRITIQUE_JSON: &str = r#"{"score": 7, "strengths": ["concrete experience"],
 "improvements": ["add metrics"], "brief_feedback": "Quantify results."}"#;
pub const REPORT_JSON: &str = r#"```json
{"overall_score": 78, "grade": "B", "summary": "Good fundamentals.", "strengths": ["Python"],
 "areas_to_improve": ["system design"], "action_items": ["practice scaling questions"],
 "recommendation": "Needs practice"}
```"#;

/// Replays queued replies; when a queue runs dry it answers plausibly.
#[derive(Default)]
pub struct ScriptedGenerator {
    text: Mutex<VecDeque<PortResult<String>>>,
    structured: Mutex<VecDeque<PortResult<String>>>,
    pub text_calls: Mutex<Vec<(String, Vec<ChatTurn>)>>,
    pub structured_calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
    text_delays: Mutex<VecDeque<Duration>>,
    structured_delays: Mutex<VecDeque<Duration>>,
}

impl ScriptedGenerator {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn push_text(&self, reply: PortResult<String>) {
        self.text.lock().unwrap().push_back(reply);
    }

    pub fn push_structured(&self, reply: PortResult<String>) {
        self.structured.lock().unwrap().push_back(reply);
    }

    /// Delays text calls in order; a queued delay overrides `with_delay`.
    pub fn delay_next_text(&self, delay: Duration) {
        self.text_delays.lock().unwrap().push_back(delay);
    }

    /// Delays structured calls in order; `Duration::ZERO` lets one through.
    pub fn delay_next_structured(&self, delay: Duration) {
        self.structured_delays.lock().unwrap().push_back(delay);
    }

    pub fn text_call_count(&self) -> usize {
        self.text_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate_text(&self, system: &str, history: &[ChatTurn]) -> PortResult<String> {
        let delay = self.text_delays.lock().unwrap().pop_front().or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let n = {
            let mut calls = self.text_calls.lock().unwrap();
            calls.push((system.to_string(), history.to_vec()));
            calls.len()
        };
        let queued = self.text.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(format!("Question number {n}: tell me more?")))
    }

    async fn generate_structured(&self, prompt: &str) -> PortResult<String> {
        let delay = self.structured_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.structured_calls.lock().unwrap().push(prompt.to_string());
        let queued = self.structured.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            if prompt.contains("overall_score") {
                Ok(REPORT_JSON.to_string())
            } else {
                Ok(CRITIQUE_JSON.to_string())
            }
        })
    }
}

//=========================================================================================
// Speech-to-Text
//=========================================================================================

#[derive(Default)]
pub struct ScriptedSpeech {
    replies: Mutex<VecDeque<PortResult<String>>>,
    pub languages: Mutex<Vec<Option<String>>>,
}

impl ScriptedSpeech {
    pub fn push(&self, reply: PortResult<String>) {
        self.replies.lock().unwrap().push_back(reply);
    }
}

#[async_trait]
impl SpeechToTextService for ScriptedSpeech {
    async fn transcribe_audio(
        &self,
        _audio: &[u8],
        _filename: &str,
        language: Option<&str>,
    ) -> PortResult<String> {
        self.languages
            .lock()
            .unwrap()
            .push(language.map(str::to_string));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

//=========================================================================================
// Harness
//=========================================================================================

pub struct Harness {
    pub repo: Arc<MemoryRepository>,
    pub generator: Arc<ScriptedGenerator>,
    pub speech: Arc<ScriptedSpeech>,
    pub service: Arc<InterviewService>,
    pub owner: Uuid,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_generator(ScriptedGenerator::default())
    }

    pub fn with_generator(generator: ScriptedGenerator) -> Self {
        let repo = Arc::new(MemoryRepository::default());
        let generator = Arc::new(generator);
        let speech = Arc::new(ScriptedSpeech::default());
        let service = Arc::new(InterviewService::new(
            repo.clone(),
            generator.clone(),
            speech.clone(),
            InterviewSettings::default(),
        ));
        Self {
            repo,
            generator,
            speech,
            service,
            owner: Uuid::new_v4(),
        }
    }

    pub fn backend_request() -> NewInterview {
        NewInterview {
            job_role: "Backend Engineer".to_string(),
            difficulty: Some("medium".to_string()),
            interview_type: Some("technical".to_string()),
            language: Some("en".to_string()),
            resume_id: None,
            job_description: None,
        }
    }

    pub async fn start(&self) -> Uuid {
        self.service
            .create_session(self.owner, &Self::backend_request())
            .await
            .expect("session starts")
            .session_id
    }

    pub async fn messages(&self, session_id: Uuid) -> Vec<Message> {
        self.service
            .get_session(self.owner, session_id)
            .await
            .expect("session readable")
            .messages
    }
}
