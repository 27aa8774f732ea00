//! services/api/src/adapters/sst.rs
//!
//! This module contains the adapter for OpenAI's Speech-to-Text (Whisper) service.
//! It implements the `SpeechToTextService` port from the core crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::audio::{AudioInput, CreateTranscriptionRequest},
    Client,
};
use async_trait::async_trait;
use hound::{WavSpec, WavWriter};
use interview_core::{PortError, PortResult, SpeechToTextService};
use tracing::debug;

/// Sample rate assumed for raw PCM uploads from the browser recorder.
const PCM_SAMPLE_RATE: u32 = 48_000;

/// Container extensions Whisper accepts as-is.
const CONTAINER_EXTENSIONS: [&str; 9] = [
    "webm", "wav", "mp3", "mp4", "m4a", "mpeg", "mpga", "ogg", "flac",
];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SpeechToTextService` port using the OpenAI Whisper API.
#[derive(Clone)]
pub struct OpenAiSstAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiSstAdapter {
    /// Creates a new `OpenAiSstAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Wraps 16-bit little-endian mono PCM in a WAV container.
    fn pcm16_to_wav(pcm_data: &[u8], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
        let mut cursor = std::io::Cursor::new(Vec::new());

        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for chunk in pcm_data.chunks_exact(2) {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            writer.write_sample(sample)?;
        }
        writer.finalize()?;

        Ok(cursor.into_inner())
    }

    /// Chooses the bytes and filename to upload. Anything without a known
    /// container extension is treated as raw PCM.
    fn prepare_upload(audio_data: &[u8], filename: &str) -> PortResult<(String, Vec<u8>)> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match extension {
            Some(ext) if CONTAINER_EXTENSIONS.contains(&ext.as_str()) => {
                Ok((filename.to_string(), audio_data.to_vec()))
            }
            _ => {
                let wav = Self::pcm16_to_wav(audio_data, PCM_SAMPLE_RATE)
                    .map_err(|e| PortError::Unexpected(format!("Failed to encode WAV: {}", e)))?;
                Ok(("user_audio.wav".to_string(), wav))
            }
        }
    }
}

//=========================================================================================
// `SpeechToTextService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SpeechToTextService for OpenAiSstAdapter {
    /// Transcribes a slice of audio data into text using the configured Whisper model.
    async fn transcribe_audio(
        &self,
        audio_data: &[u8],
        filename: &str,
        language: Option<&str>,
    ) -> PortResult<String> {
        let (upload_name, bytes) = Self::prepare_upload(audio_data, filename)?;
        debug!(
            "Uploading {} ({} bytes) for transcription, language={:?}.",
            upload_name,
            bytes.len(),
            language
        );

        let request = CreateTranscriptionRequest {
            file: AudioInput::from_vec_u8(upload_name, bytes),
            model: self.model.clone(),
            language: language.map(str::to_string),
            ..Default::default()
        };

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .audio()
            .transcription()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        Ok(response.text)
    }
}
