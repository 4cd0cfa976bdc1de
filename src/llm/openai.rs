//! OpenAI-backed [`ChatProvider`] implementation.

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_openai::Client;
use async_trait::async_trait;

use super::error::LlmError;
use super::provider::{ChatProvider, ChatRequest, ChatResponse, TokenUsage};

/// Chat provider backed by the OpenAI chat completions API.
pub struct OpenAiChatProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiChatProvider {
    /// Build a provider, overriding the ambient API key when one is given.
    pub fn new(api_key: Option<String>) -> Self {
        let mut config = OpenAIConfig::new();
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }
        Self {
            client: Client::with_config(config),
        }
    }

    pub fn with_client(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn chat_json(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let system = ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(ChatCompletionRequestSystemMessageContent::Text(
                    request.system,
                ))
                .build()
                .map_err(|err| LlmError::Request(err.to_string()))?,
        );

        let user = ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Text(request.user))
                .build()
                .map_err(|err| LlmError::Request(err.to_string()))?,
        );

        let openai_request = CreateChatCompletionRequestArgs::default()
            .model(request.model)
            .messages(vec![system, user])
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|err| LlmError::Request(err.to_string()))?;

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|err| LlmError::Request(err.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(LlmError::EmptyResponse)?;

        let usage = response.usage.map(|usage| TokenUsage {
            prompt_tokens: u64::from(usage.prompt_tokens),
            completion_tokens: u64::from(usage.completion_tokens),
        });

        Ok(ChatResponse { content, usage })
    }
}
