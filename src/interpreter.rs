//! Command interpretation: natural language plus bounded page context in,
//! action plan out.
//!
//! The context bounding is a hard contract — whatever the page looks like,
//! the translator call sees at most 500 preview chars, 30 interactive
//! elements (sorted by vertical position), 3 navigation regions, and 3
//! forms. Translation failures are values, never faults: the engine maps
//! a [`TranslationError`] to a failed execution result.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use thiserror::Error;

use crate::llm::{prompts, ChatProvider, ChatRequest, LlmError};
use crate::logging::PilotLogger;
use crate::metrics::{elapsed_ms, TranslatorFunction, TranslatorMetrics};
use crate::types::action::{Action, ActionPlan};
use crate::types::page::{DomSnapshot, PageState};

/// Text preview budget for the bounded context.
const MAX_CONTEXT_TEXT_PREVIEW: usize = 500;
/// Interactive element budget for the bounded context.
const MAX_CONTEXT_ELEMENTS: usize = 30;
/// Navigation region budget for the bounded context.
const MAX_CONTEXT_NAVIGATION: usize = 3;
/// Form budget for the bounded context.
const MAX_CONTEXT_FORMS: usize = 3;

/// Errors surfaced by command translation. All terminal: the engine does
/// not retry a failed translation.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("failed to parse command: {0}")]
    Provider(#[source] LlmError),
    #[error("model response is not valid JSON: {0}")]
    MalformedResponse(String),
    #[error("action type or actions array missing from model response")]
    MissingAction,
    #[error("{0}")]
    UnsupportedAction(String),
    #[error("model returned an empty action plan")]
    EmptyPlan,
}

/// Read-only view of the page handed to translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslationContext<'a> {
    pub page_state: Option<&'a PageState>,
    pub dom_snapshot: Option<&'a DomSnapshot>,
}

/// The seam between the execution engine and the language model backend.
#[async_trait]
pub trait CommandTranslator: Send + Sync {
    /// Translate a natural-language command into an action plan.
    async fn translate(
        &self,
        command: &str,
        context: &TranslationContext<'_>,
    ) -> Result<ActionPlan, TranslationError>;

    /// Generate alternative actions for a failed one. Entries the model
    /// returns in an unusable shape are skipped, not errors.
    async fn fallback_strategies(
        &self,
        action: &Action,
        error: &str,
    ) -> Result<Vec<Action>, TranslationError>;
}

/// Filter and bound the browser context for the translator call. Returns
/// `None` when there is nothing useful to attach.
pub fn bound_context(context: &TranslationContext<'_>) -> Option<JsonValue> {
    let mut filtered = JsonMap::new();

    if let Some(page_state) = context.page_state {
        let mut page_info = JsonMap::new();
        page_info.insert("url".to_string(), json!(page_state.url));
        page_info.insert("title".to_string(), json!(page_state.title));
        if let Some(preview) = &page_state.text_preview {
            let preview = if preview.chars().count() > MAX_CONTEXT_TEXT_PREVIEW {
                let truncated: String = preview.chars().take(MAX_CONTEXT_TEXT_PREVIEW).collect();
                format!("{truncated}...")
            } else {
                preview.clone()
            };
            page_info.insert("text_preview".to_string(), json!(preview));
        }
        filtered.insert("page_info".to_string(), JsonValue::Object(page_info));
    }

    if let Some(snapshot) = context.dom_snapshot {
        filtered.insert("metadata".to_string(), json!(snapshot.metadata));

        let mut elements = snapshot.interactive_elements.clone();
        elements.sort_by(|a, b| {
            a.rect
                .y
                .partial_cmp(&b.rect.y)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        elements.truncate(MAX_CONTEXT_ELEMENTS);
        filtered.insert("interactive_elements".to_string(), json!(elements));

        if !snapshot.navigation.is_empty() {
            let regions: Vec<_> = snapshot
                .navigation
                .iter()
                .take(MAX_CONTEXT_NAVIGATION)
                .collect();
            filtered.insert("navigation".to_string(), json!(regions));
        }

        if !snapshot.form_elements.is_empty() {
            let forms: Vec<_> = snapshot.form_elements.iter().take(MAX_CONTEXT_FORMS).collect();
            filtered.insert("forms".to_string(), json!(forms));
        }
    }

    if filtered.is_empty() {
        None
    } else {
        Some(JsonValue::Object(filtered))
    }
}

/// Parse the translator response body into an action plan.
fn parse_plan(content: &str) -> Result<ActionPlan, TranslationError> {
    let value: JsonValue = serde_json::from_str(content)
        .map_err(|err| TranslationError::MalformedResponse(err.to_string()))?;

    if let Some(steps) = value.get("actions").and_then(JsonValue::as_array) {
        if steps.is_empty() {
            return Err(TranslationError::EmptyPlan);
        }
        let actions = steps
            .iter()
            .map(|step| {
                serde_json::from_value::<Action>(step.clone())
                    .map_err(|err| TranslationError::UnsupportedAction(err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(ActionPlan::Sequence(actions));
    }

    if value.get("action_type").is_some() {
        let action = serde_json::from_value::<Action>(value)
            .map_err(|err| TranslationError::UnsupportedAction(err.to_string()))?;
        return Ok(ActionPlan::Single(action));
    }

    Err(TranslationError::MissingAction)
}

/// Extract the fallback action list from the translator response,
/// skipping entries that do not parse as supported actions.
fn parse_fallbacks(content: &str, logger: &PilotLogger) -> Result<Vec<Action>, TranslationError> {
    let value: JsonValue = serde_json::from_str(content)
        .map_err(|err| TranslationError::MalformedResponse(err.to_string()))?;

    let candidates: Vec<JsonValue> = match value {
        JsonValue::Array(items) => items,
        JsonValue::Object(map) => {
            if let Some(JsonValue::Array(items)) = map.get("alternatives") {
                items.clone()
            } else {
                vec![JsonValue::Object(map)]
            }
        }
        other => vec![other],
    };

    let mut actions = Vec::new();
    for candidate in candidates {
        match serde_json::from_value::<Action>(candidate) {
            Ok(action) => actions.push(action),
            Err(err) => {
                logger.debug(
                    format!("Skipping unusable fallback suggestion: {err}"),
                    Some("interpret"),
                );
            }
        }
    }
    Ok(actions)
}

/// Translator backed by a chat completion provider.
pub struct NlpTranslator<P: ChatProvider> {
    provider: P,
    model: String,
    logger: Arc<PilotLogger>,
    metrics: Mutex<TranslatorMetrics>,
}

impl<P: ChatProvider> NlpTranslator<P> {
    pub fn new(provider: P, model: impl Into<String>, logger: Arc<PilotLogger>) -> Self {
        Self {
            provider,
            model: model.into(),
            logger,
            metrics: Mutex::new(TranslatorMetrics::default()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Snapshot of the accumulated token/latency metrics.
    pub fn metrics(&self) -> TranslatorMetrics {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }

    fn record_metrics(
        &self,
        function: TranslatorFunction,
        usage: Option<crate::llm::TokenUsage>,
        started: Instant,
    ) {
        if let Ok(mut metrics) = self.metrics.lock() {
            let usage = usage.unwrap_or_default();
            metrics.record(
                function,
                usage.prompt_tokens,
                usage.completion_tokens,
                elapsed_ms(started),
            );
        }
    }
}

#[async_trait]
impl<P: ChatProvider> CommandTranslator for NlpTranslator<P> {
    async fn translate(
        &self,
        command: &str,
        context: &TranslationContext<'_>,
    ) -> Result<ActionPlan, TranslationError> {
        let bounded = bound_context(context);
        let request = ChatRequest {
            model: self.model.clone(),
            system: prompts::build_translate_system_prompt(),
            user: prompts::build_translate_user_message(command, bounded.as_ref()),
        };

        let started = Instant::now();
        let response = self
            .provider
            .chat_json(request)
            .await
            .map_err(TranslationError::Provider)?;
        self.record_metrics(TranslatorFunction::Translate, response.usage, started);

        self.logger.debug(
            format!("Translator response: {}", response.content),
            Some("interpret"),
        );

        parse_plan(&response.content)
    }

    async fn fallback_strategies(
        &self,
        action: &Action,
        error: &str,
    ) -> Result<Vec<Action>, TranslationError> {
        let action_json =
            serde_json::to_value(action).unwrap_or_else(|_| JsonValue::Object(JsonMap::new()));
        let request = ChatRequest {
            model: self.model.clone(),
            system: prompts::build_fallback_system_prompt(),
            user: prompts::build_fallback_user_message(&action_json, error),
        };

        let started = Instant::now();
        let response = self
            .provider
            .chat_json(request)
            .await
            .map_err(TranslationError::Provider)?;
        self.record_metrics(TranslatorFunction::Fallback, response.usage, started);

        parse_fallbacks(&response.content, &self.logger)
    }
}
