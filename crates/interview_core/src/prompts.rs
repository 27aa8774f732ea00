//! crates/interview_core/src/prompts.rs
//!
//! Every piece of text the core sends to the Generation Service.

use crate::domain::{Difficulty, InterviewType, Language, Message, SessionConfig};

/// The in-band marker the interviewer appends when it decides to wrap up.
pub const COMPLETION_SENTINEL: &str = "[INTERVIEW_COMPLETE]";

const RESUME_CONTEXT_CHARS: usize = 2000;
const JOB_DESCRIPTION_CONTEXT_CHARS: usize = 1000;
const TRANSCRIPT_CHARS: usize = 3000;

/// Keeps at most `max` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn language_instruction(language: Language) -> &'static str {
    match language {
        Language::Arabic => {
            "You MUST respond ONLY in Arabic (Modern Standard Arabic). \
             Ask all questions in Arabic. Give all feedback in Arabic."
        }
        Language::English => "Respond in clear, professional English.",
    }
}

fn difficulty_instruction(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "Ask straightforward, entry-level questions. Be encouraging and patient.",
        Difficulty::Medium => "Ask standard interview questions. Maintain professional expectations.",
        Difficulty::Hard => "Ask challenging questions. Probe deeply. Ask sharp follow-ups.",
    }
}

fn type_instruction(interview_type: InterviewType, job_role: &str) -> String {
    match interview_type {
        InterviewType::Behavioral => {
            "Focus on behavioral questions (STAR method). Ask about past experiences.".to_string()
        }
        InterviewType::Technical => format!("Focus on technical questions specific to {job_role}."),
        InterviewType::Mixed => "Mix behavioral and technical questions naturally.".to_string(),
    }
}

/// The system-level description of the interviewer for a session.
pub fn system_context(config: &SessionConfig) -> String {
    let mut prompt = format!(
        "You are an expert {role} interviewer conducting a {difficulty} {kind} interview.\n\n\
         LANGUAGE: {language}\n\n\
         DIFFICULTY: {difficulty_rule}\n\n\
         INTERVIEW TYPE: {type_rule}\n\n\
         YOUR BEHAVIOUR:\n\
         - Be professional but human and conversational.\n\
         - Ask ONE question at a time. Never ask multiple questions in one message.\n\
         - Listen carefully and ask relevant follow-up questions based on answers.\n\
         - If an answer is weak, probe gently: \"Can you elaborate?\" or \"Can you give a specific example?\"\n\
         - After 6-8 candidate answers, naturally wrap up the interview and thank the candidate.\n\
         - When wrapping up, end your message with exactly: {sentinel}\n\
         - Never break character. You are the interviewer, not an AI assistant.",
        role = config.job_role,
        difficulty = config.difficulty.as_str(),
        kind = config.interview_type.as_str(),
        language = language_instruction(config.language),
        difficulty_rule = difficulty_instruction(config.difficulty),
        type_rule = type_instruction(config.interview_type, &config.job_role),
        sentinel = COMPLETION_SENTINEL,
    );

    if let Some(resume) = config.resume_snapshot.as_deref().filter(|r| !r.trim().is_empty()) {
        prompt.push_str("\n\nCANDIDATE RESUME:\n");
        prompt.push_str(truncate_chars(resume, RESUME_CONTEXT_CHARS));
    }
    if let Some(jd) = config.job_description.as_deref() {
        prompt.push_str("\n\nJOB DESCRIPTION:\n");
        prompt.push_str(truncate_chars(jd, JOB_DESCRIPTION_CONTEXT_CHARS));
    }
    prompt
}

/// The user turn that asks the interviewer for its greeting and first question.
pub fn opening_instruction(language: Language) -> &'static str {
    match language {
        Language::Arabic => "ابدأ المقابلة. قدم نفسك باختصار واطرح سؤالك الأول.",
        Language::English => {
            "Begin the interview. Introduce yourself briefly and ask your first question."
        }
    }
}

/// The extra user turn sent when the turn limit has been reached.
pub fn closing_instruction(language: Language) -> &'static str {
    match language {
        Language::Arabic => "الآن أنهِ المقابلة بلطف، واشكر المرشح، وقدم ملاحظاتك العامة باختصار.",
        Language::English => {
            "Now gracefully close the interview, thank the candidate, and give brief overall feedback."
        }
    }
}

/// Stored when the interviewer's wrap-up reply carried nothing but the sentinel.
pub fn default_closing(language: Language) -> &'static str {
    match language {
        Language::Arabic => "شكراً لوقتك. بهذا نختتم المقابلة.",
        Language::English => "Thank you for your time. That concludes our interview.",
    }
}

pub fn turn_evaluation_prompt(
    question: &str,
    answer: &str,
    job_role: &str,
    difficulty: Difficulty,
    language: Language,
) -> String {
    format!(
        "Respond in {language}.\n\
         Evaluate this {job_role} interview answer ({difficulty} level).\n\
         Question: {question}\n\
         Answer: {answer}\n\n\
         Return ONLY valid JSON (no markdown):\n\
         {{\"score\": <number 1-10>, \"strengths\": [\"...\"], \"improvements\": [\"...\"], \
         \"brief_feedback\": \"<one actionable tip in {language}>\"}}",
        language = language.name(),
        difficulty = difficulty.as_str(),
    )
}

/// Renders messages as `ROLE: content` lines.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn interview_report_prompt(
    transcript: &str,
    job_role: &str,
    difficulty: Difficulty,
    interview_type: InterviewType,
    language: Language,
) -> String {
    format!(
        "Respond entirely in {language}.\n\
         Analyze this complete {job_role} interview ({difficulty} {kind}) \
         and give a detailed report.\n\n\
         CONVERSATION:\n{conversation}\n\n\
         Return ONLY valid JSON (no markdown):\n\
         {{\"overall_score\": <0-100>, \"grade\": \"A|B|C|D|F\", \
         \"summary\": \"<2-3 sentence overall assessment>\", \
         \"strengths\": [\"...\"], \"areas_to_improve\": [\"...\"], \"action_items\": [\"...\"], \
         \"recommendation\": \"Ready to hire|Needs practice|Not ready\", \
         \"communication_score\": <0-100>, \"technical_score\": <0-100>, \
         \"confidence_score\": <0-100>, \"recommended_resources\": [\"...\"]}}",
        language = language.name(),
        difficulty = difficulty.as_str(),
        kind = interview_type.as_str(),
        conversation = truncate_chars(transcript, TRANSCRIPT_CHARS),
    )
}
