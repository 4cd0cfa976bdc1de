use async_trait::async_trait;

use super::error::LlmError;

/// A single system+user chat exchange expecting a JSON object back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub user: String,
}

/// Token usage reported by the backend, when available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Completion content plus usage accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// Abstraction over the chat completion backend so the translator can be
/// tested without network access.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Issue a chat completion constrained to JSON output.
    async fn chat_json(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}
