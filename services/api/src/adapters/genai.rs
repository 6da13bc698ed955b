//! services/api/src/adapters/genai.rs
//!
//! This module contains the adapter for the upstream generative model API.
//! It implements the `TextGenerationService` port from the `core` crate using
//! an OpenAI-compatible chat-completions endpoint (the Gemini API exposes
//! one), with JSON-typed output requested per call.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use learnsphere_core::ports::{PortError, PortResult, TextGenerationService};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerationService` against an
/// OpenAI-compatible LLM endpoint. The model identifier is chosen per call by
/// the pipeline's fallback loop, so the adapter holds only the client.
#[derive(Clone)]
pub struct OpenAiTextAdapter {
    client: Client<OpenAIConfig>,
}

impl OpenAiTextAdapter {
    /// Creates a new `OpenAiTextAdapter`.
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }
}

//=========================================================================================
// `TextGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerationService for OpenAiTextAdapter {
    /// Performs one chat-completion call against the named model, asking for
    /// a JSON object response, and returns the raw text content.
    async fn generate_json(&self, model: &str, prompt: &str) -> PortResult<String> {
        let messages = vec![ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which
        // respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        // Extract the text content from the first choice in the response.
        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Unexpected(
                    "Model response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Unexpected(
                "Model returned no choices in its response.".to_string(),
            ))
        }
    }
}
