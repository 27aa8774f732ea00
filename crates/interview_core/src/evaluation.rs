//! crates/interview_core/src/evaluation.rs
//!
//! The evaluation engine: per-answer critiques and the end-of-interview report.
//! Both are best-effort enrichments: a failed critique is simply absent and a
//! failed report degrades to a neutral default.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::domain::{Critique, Difficulty, InterviewType, Language, Message, Report};
use crate::ports::{with_timeout, GenerationService, PortError};
use crate::prompts;

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("fence pattern is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("generation call failed: {0}")]
    Generation(#[from] PortError),

    #[error("response is not valid JSON for the expected shape: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("response failed schema checks: {0}")]
    Schema(String),
}

/// Strips a surrounding markdown code fence, with or without a language tag.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    match JSON_FENCE.captures(text).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str(),
        None => text,
    }
}

/// Parses a structured reply into `T` after removing formatting wrappers.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, EvaluationError> {
    Ok(serde_json::from_str(strip_json_fences(raw))?)
}

fn check_critique(critique: Critique) -> Result<Critique, EvaluationError> {
    let score = critique.score;
    if !score.is_finite() || !(Critique::MIN_SCORE..=Critique::MAX_SCORE).contains(&score) {
        return Err(EvaluationError::Schema(format!("critique score {score} outside 1-10")));
    }
    Ok(critique)
}

fn check_report(report: Report) -> Result<Report, EvaluationError> {
    let in_range = |v: f64| v.is_finite() && (0.0..=Report::MAX_SCORE).contains(&v);
    if !in_range(report.overall_score) {
        return Err(EvaluationError::Schema(format!(
            "overall_score {} outside 0-100",
            report.overall_score
        )));
    }
    for sub in [
        report.communication_score,
        report.technical_score,
        report.confidence_score,
    ]
    .into_iter()
    .flatten()
    {
        if !in_range(sub) {
            return Err(EvaluationError::Schema(format!("sub-score {sub} outside 0-100")));
        }
    }
    if report.summary.trim().is_empty() {
        return Err(EvaluationError::Schema("summary is empty".to_string()));
    }
    Ok(report)
}

/// Scores answers and interviews through the Generation Service.
#[derive(Clone)]
pub struct Evaluator {
    generator: Arc<dyn GenerationService>,
    timeout: Duration,
}

impl Evaluator {
    pub fn new(generator: Arc<dyn GenerationService>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    async fn structured<T: DeserializeOwned>(
        &self,
        prompt: &str,
        what: &str,
    ) -> Result<T, EvaluationError> {
        let call = self.generator.generate_structured(prompt);
        let raw = with_timeout(self.timeout, what, call).await?;
        debug!("{} raw reply: {} chars", what, raw.len());
        parse_structured(&raw)
    }

    pub async fn try_evaluate_turn(
        &self,
        question: &str,
        answer: &str,
        job_role: &str,
        difficulty: Difficulty,
        language: Language,
    ) -> Result<Critique, EvaluationError> {
        let prompt =
            prompts::turn_evaluation_prompt(question, answer, job_role, difficulty, language);
        let critique = self.structured(&prompt, "answer evaluation").await?;
        check_critique(critique)
    }

    /// Evaluates one answer; never fails.
    ///
    /// A failed evaluation yields `None` rather than a made-up score, so the
    /// stored message carries `evaluation = null` and the turn goes on.
    pub async fn evaluate_turn(
        &self,
        question: &str,
        answer: &str,
        job_role: &str,
        difficulty: Difficulty,
        language: Language,
    ) -> Option<Critique> {
        match self
            .try_evaluate_turn(question, answer, job_role, difficulty, language)
            .await
        {
            Ok(critique) => Some(critique),
            Err(e) => {
                warn!("Answer evaluation failed; storing none: {}", e);
                None
            }
        }
    }

    pub async fn try_evaluate_interview(
        &self,
        transcript: &[Message],
        job_role: &str,
        difficulty: Difficulty,
        interview_type: InterviewType,
        language: Language,
    ) -> Result<Report, EvaluationError> {
        let rendered = prompts::render_transcript(transcript);
        let prompt = prompts::interview_report_prompt(
            &rendered,
            job_role,
            difficulty,
            interview_type,
            language,
        );
        let report = self.structured(&prompt, "interview report").await?;
        check_report(report)
    }

    /// Produces the end-of-interview report; never fails.
    pub async fn evaluate_interview(
        &self,
        transcript: &[Message],
        job_role: &str,
        difficulty: Difficulty,
        interview_type: InterviewType,
        language: Language,
    ) -> Report {
        let attempt =
            self.try_evaluate_interview(transcript, job_role, difficulty, interview_type, language);
        match attempt.await
        {
            Ok(report) => report,
            Err(e) => {
                warn!("Interview report degraded to neutral default: {}", e);
                Report::neutral()
            }
        }
    }
}
