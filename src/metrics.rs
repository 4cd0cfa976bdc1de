//! Token and latency accounting for translator calls.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// The two translator functions that consume model tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorFunction {
    Translate,
    Fallback,
}

/// Aggregated token usage and latency across translator functions.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranslatorMetrics {
    pub translate_prompt_tokens: u64,
    pub translate_completion_tokens: u64,
    pub translate_inference_time_ms: u64,

    pub fallback_prompt_tokens: u64,
    pub fallback_completion_tokens: u64,
    pub fallback_inference_time_ms: u64,

    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_inference_time_ms: u64,
}

impl TranslatorMetrics {
    /// Record usage for one translator call and update cumulative totals.
    pub fn record(
        &mut self,
        function: TranslatorFunction,
        prompt_tokens: u64,
        completion_tokens: u64,
        inference_time_ms: u64,
    ) {
        match function {
            TranslatorFunction::Translate => {
                self.translate_prompt_tokens += prompt_tokens;
                self.translate_completion_tokens += completion_tokens;
                self.translate_inference_time_ms += inference_time_ms;
            }
            TranslatorFunction::Fallback => {
                self.fallback_prompt_tokens += prompt_tokens;
                self.fallback_completion_tokens += completion_tokens;
                self.fallback_inference_time_ms += inference_time_ms;
            }
        }

        self.total_prompt_tokens += prompt_tokens;
        self.total_completion_tokens += completion_tokens;
        self.total_inference_time_ms += inference_time_ms;
    }

    /// Merge the values from another metrics instance into this one.
    pub fn merge(&mut self, other: &TranslatorMetrics) {
        self.translate_prompt_tokens += other.translate_prompt_tokens;
        self.translate_completion_tokens += other.translate_completion_tokens;
        self.translate_inference_time_ms += other.translate_inference_time_ms;

        self.fallback_prompt_tokens += other.fallback_prompt_tokens;
        self.fallback_completion_tokens += other.fallback_completion_tokens;
        self.fallback_inference_time_ms += other.fallback_inference_time_ms;

        self.total_prompt_tokens += other.total_prompt_tokens;
        self.total_completion_tokens += other.total_completion_tokens;
        self.total_inference_time_ms += other.total_inference_time_ms;
    }
}

/// Elapsed milliseconds since `start`, saturated into `u64`.
pub fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
