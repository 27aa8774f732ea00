//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the interviewer and evaluator LLM.
//! It implements the `GenerationService` port from the core crate on top of an
//! OpenAI-compatible chat-completions endpoint.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};
use async_trait::async_trait;
use interview_core::{ChatTurn, GenerationService, PortError, PortResult, Role};
use tracing::debug;

const CONVERSATION_TEMPERATURE: f32 = 0.7;
const EVALUATION_TEMPERATURE: f32 = 0.3;
const CONVERSATION_MAX_TOKENS: u32 = 500;
const EVALUATION_MAX_TOKENS: u32 = 1200;

const EVALUATOR_SYSTEM_PROMPT: &str =
    "You are an expert interview evaluator. You reply with a single JSON document and nothing else.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerationService` using an OpenAI-compatible LLM.
///
/// Conversation turns and structured evaluations may use different models.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    chat_model: String,
    evaluation_model: String,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, chat_model: String, evaluation_model: String) -> Self {
        Self {
            client,
            chat_model,
            evaluation_model,
        }
    }

    async fn complete(
        &self,
        model: &str,
        messages: Vec<ChatCompletionRequestMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> PortResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(temperature)
            .max_completion_tokens(max_tokens)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        first_choice_text(response)
    }
}

/// Lays out the system context followed by the prior turns, oldest first.
fn build_messages(
    system_context: &str,
    history: &[ChatTurn],
) -> PortResult<Vec<ChatCompletionRequestMessage>> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_context)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    );
    for turn in history {
        let message: ChatCompletionRequestMessage = match turn.role {
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(turn.content.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.content.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        };
        messages.push(message);
    }
    Ok(messages)
}

fn first_choice_text(response: CreateChatCompletionResponse) -> PortResult<String> {
    match response.choices.into_iter().next() {
        Some(choice) => choice.message.content.ok_or_else(|| {
            PortError::Unexpected("Chat LLM response contained no text content.".to_string())
        }),
        None => Err(PortError::Unexpected(
            "Chat LLM returned no choices in its response.".to_string(),
        )),
    }
}

//=========================================================================================
// `GenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationService for OpenAiChatAdapter {
    async fn generate_text(
        &self,
        system_context: &str,
        history: &[ChatTurn],
    ) -> PortResult<String> {
        let messages = build_messages(system_context, history)?;
        debug!(
            "Requesting interviewer turn from {} ({} prior turns).",
            self.chat_model,
            history.len()
        );
        self.complete(
            &self.chat_model,
            messages,
            CONVERSATION_TEMPERATURE,
            CONVERSATION_MAX_TOKENS,
        )
        .await
    }

    async fn generate_structured(&self, prompt: &str) -> PortResult<String> {
        let messages = build_messages(EVALUATOR_SYSTEM_PROMPT, &[ChatTurn::user(prompt)])?;
        debug!("Requesting structured evaluation from {}.", self.evaluation_model);
        self.complete(
            &self.evaluation_model,
            messages,
            EVALUATION_TEMPERATURE,
            EVALUATION_MAX_TOKENS,
        )
        .await
    }
}
