//! crates/interview_core/src/transcription.rs
//!
//! Turns raw audio into answer text via the `SpeechToTextService` port,
//! normalising language hints and separating "nothing was said" from outages.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::InterviewError;
use crate::ports::{with_timeout, SpeechToTextService};

/// Uploads without a filename are raw PCM from the recorder.
const DEFAULT_FILENAME: &str = "audio.pcm";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptionError {
    /// The backend answered, but the transcript is empty or whitespace.
    #[error("empty transcript")]
    EmptyTranscript,

    /// The backend could not be reached, failed, or timed out.
    #[error("transcription service error: {0}")]
    Service(String),
}

impl From<TranscriptionError> for InterviewError {
    fn from(err: TranscriptionError) -> Self {
        match err {
            TranscriptionError::EmptyTranscript => InterviewError::EmptyTranscript,
            TranscriptionError::Service(msg) => InterviewError::Transcription(msg),
        }
    }
}

/// Reduces a client language hint to a two-letter code, or `None` for auto-detect.
///
/// `" EN-us "` becomes `"en"`; `"english"` or `"e"` become `None`.
pub fn normalize_language_hint(hint: Option<&str>) -> Option<String> {
    let primary = hint?.trim().split(['-', '_']).next()?.to_ascii_lowercase();
    if primary.len() == 2 && primary.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(primary)
    } else {
        None
    }
}

#[derive(Clone)]
pub struct Transcriber {
    speech: Arc<dyn SpeechToTextService>,
    timeout: Duration,
}

impl Transcriber {
    pub fn new(speech: Arc<dyn SpeechToTextService>, timeout: Duration) -> Self {
        Self { speech, timeout }
    }

    pub async fn transcribe(
        &self,
        audio: &[u8],
        filename_hint: Option<&str>,
        language_hint: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        if audio.is_empty() {
            return Err(TranscriptionError::EmptyTranscript);
        }

        let filename = filename_hint
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILENAME);
        let language = normalize_language_hint(language_hint);

        let raw = with_timeout(
            self.timeout,
            "transcription",
            self.speech
                .transcribe_audio(audio, filename, language.as_deref()),
        )
        .await
        .map_err(|e| {
            warn!("Transcription of {} ({} bytes) failed: {}", filename, audio.len(), e);
            TranscriptionError::Service(e.to_string())
        })?;

        let text = raw.trim();
        if text.is_empty() {
            info!("Transcription of {} produced no speech.", filename);
            return Err(TranscriptionError::EmptyTranscript);
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSpeech {
        reply: Mutex<Option<PortResult<String>>>,
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl SpeechToTextService for RecordingSpeech {
        async fn transcribe_audio(
            &self,
            _audio: &[u8],
            filename: &str,
            language: Option<&str>,
        ) -> PortResult<String> {
            self.seen
                .lock()
                .unwrap()
                .push((filename.to_string(), language.map(str::to_string)));
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn transcriber(reply: PortResult<String>) -> (Transcriber, Arc<RecordingSpeech>) {
        let speech = Arc::new(RecordingSpeech {
            reply: Mutex::new(Some(reply)),
            ..Default::default()
        });
        (Transcriber::new(speech.clone(), Duration::from_secs(5)), speech)
    }

    #[test]
    fn test_normalize_language_hint() {
        assert_eq!(normalize_language_hint(Some(" EN-us ")), Some("en".to_string()));
        assert_eq!(normalize_language_hint(Some("ar_EG")), Some("ar".to_string()));
        assert_eq!(normalize_language_hint(Some("english")), None);
        assert_eq!(normalize_language_hint(Some("")), None);
        assert_eq!(normalize_language_hint(None), None);
    }

    #[tokio::test]
    async fn test_transcript_is_trimmed() {
        let (t, speech) = transcriber(Ok("  I led the migration.\n".to_string()));
        let text = t.transcribe(b"RIFF", Some("answer.wav"), Some("en-GB")).await.unwrap();
        assert_eq!(text, "I led the migration.");
        assert_eq!(
            speech.seen.lock().unwrap()[0],
            ("answer.wav".to_string(), Some("en".to_string()))
        );
    }

    #[tokio::test]
    async fn test_whitespace_transcript_is_empty_not_service_error() {
        let (t, _) = transcriber(Ok(" \n\t ".to_string()));
        let err = t.transcribe(b"RIFF", None, None).await.unwrap_err();
        assert_eq!(err, TranscriptionError::EmptyTranscript);
    }

    #[tokio::test]
    async fn test_service_failure_is_distinct() {
        let (t, _) = transcriber(Err(PortError::Unexpected("connection reset".to_string())));
        let err = t.transcribe(b"RIFF", None, Some("xx-long")).await.unwrap_err();
        assert!(matches!(
            err,
            TranscriptionError::Service(msg) if msg.contains("connection reset")
        ));
    }

    #[tokio::test]
    async fn test_zero_length_audio_skips_the_service() {
        let (t, speech) = transcriber(Ok("never used".to_string()));
        assert_eq!(
            t.transcribe(&[], None, None).await.unwrap_err(),
            TranscriptionError::EmptyTranscript
        );
        assert!(speech.seen.lock().unwrap().is_empty());
    }
}
