use thiserror::Error;

/// Errors surfaced by chat completion providers.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("chat completion request failed: {0}")]
    Request(String),
    #[error("model returned an empty response")]
    EmptyResponse,
}
