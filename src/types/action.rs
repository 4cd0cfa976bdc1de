//! Action data model shared between the interpreter, executor, and engine.
//!
//! The action registry is a closed enum so dispatch stays exhaustive at
//! compile time; the translator-facing wire shape stays the loose JSON the
//! model produces (`action_type` + optional parameters).

use std::fmt;
use std::str::FromStr;

use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::types::page::PageState;

/// Registry of supported browser action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    Navigate,
    Click,
    Fill,
    Wait,
    Scroll,
    Back,
    Forward,
    Reload,
    Screenshot,
    Select,
}

impl ActionType {
    /// Every supported kind, in registry order.
    pub const ALL: [ActionType; 10] = [
        ActionType::Navigate,
        ActionType::Click,
        ActionType::Fill,
        ActionType::Wait,
        ActionType::Scroll,
        ActionType::Back,
        ActionType::Forward,
        ActionType::Reload,
        ActionType::Screenshot,
        ActionType::Select,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Navigate => "navigate",
            ActionType::Click => "click",
            ActionType::Fill => "fill",
            ActionType::Wait => "wait",
            ActionType::Scroll => "scroll",
            ActionType::Back => "back",
            ActionType::Forward => "forward",
            ActionType::Reload => "reload",
            ActionType::Screenshot => "screenshot",
            ActionType::Select => "select",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "navigate" => Some(ActionType::Navigate),
            "click" => Some(ActionType::Click),
            "fill" => Some(ActionType::Fill),
            "wait" => Some(ActionType::Wait),
            "scroll" => Some(ActionType::Scroll),
            "back" => Some(ActionType::Back),
            "forward" => Some(ActionType::Forward),
            "reload" => Some(ActionType::Reload),
            "screenshot" => Some(ActionType::Screenshot),
            "select" => Some(ActionType::Select),
            _ => None,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ActionType::parse(value).ok_or_else(|| format!("Unsupported action type: {value}"))
    }
}

impl Serialize for ActionType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        ActionType::from_str(&value).map_err(DeError::custom)
    }
}

/// What a `wait` action waits for. Unknown kinds are preserved so the
/// executor can surface them as a distinct failure instead of dropping the
/// action at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitKind {
    Time,
    Selector,
    Navigation,
    Unknown(String),
}

impl WaitKind {
    pub fn as_str(&self) -> &str {
        match self {
            WaitKind::Time => "time",
            WaitKind::Selector => "selector",
            WaitKind::Navigation => "navigation",
            WaitKind::Unknown(other) => other,
        }
    }
}

impl Serialize for WaitKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WaitKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(match value.trim().to_ascii_lowercase().as_str() {
            "time" => WaitKind::Time,
            "selector" => WaitKind::Selector,
            "navigation" => WaitKind::Navigation,
            _ => WaitKind::Unknown(value),
        })
    }
}

/// Direction for whole-page scrolling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Top,
    Bottom,
    Unknown(String),
}

impl ScrollDirection {
    pub fn as_str(&self) -> &str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Top => "top",
            ScrollDirection::Bottom => "bottom",
            ScrollDirection::Unknown(other) => other,
        }
    }
}

impl Serialize for ScrollDirection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ScrollDirection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(match value.trim().to_ascii_lowercase().as_str() {
            "up" => ScrollDirection::Up,
            "down" => ScrollDirection::Down,
            "top" => ScrollDirection::Top,
            "bottom" => ScrollDirection::Bottom,
            _ => ScrollDirection::Unknown(value),
        })
    }
}

/// One concrete browser operation with its parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_type: Option<WaitKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<ScrollDirection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_strategies: Vec<Action>,
}

impl Action {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            selector: None,
            value: None,
            wait_type: None,
            direction: None,
            fallback_strategies: Vec::new(),
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<JsonValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_wait_type(mut self, kind: WaitKind) -> Self {
        self.wait_type = Some(kind);
        self
    }

    pub fn with_direction(mut self, direction: ScrollDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<Action>) -> Self {
        self.fallback_strategies = fallbacks;
        self
    }

    /// Selector parameter, treating empty strings as absent.
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// String value parameter, treating empty strings as absent.
    pub fn value_str(&self) -> Option<&str> {
        self.value
            .as_ref()
            .and_then(JsonValue::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Numeric value in milliseconds, falling back to `default` when the
    /// value is missing or not convertible.
    pub fn value_ms(&self, default: u64) -> u64 {
        match self.value.as_ref() {
            Some(JsonValue::Number(number)) => number
                .as_u64()
                .or_else(|| number.as_f64().map(|f| f.max(0.0) as u64))
                .unwrap_or(default),
            Some(JsonValue::String(text)) => text.trim().parse::<u64>().unwrap_or(default),
            _ => default,
        }
    }
}

/// One or many actions produced from a natural-language command.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionPlan {
    Single(Action),
    Sequence(Vec<Action>),
}

/// Outcome of one command execution, including fallback bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_state: Option<PageState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tried_fallbacks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ExecutionResult>>,
}

impl ExecutionResult {
    pub fn failure(command: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            command: command.into(),
            action: None,
            error: Some(error.into()),
            page_state: None,
            used_fallback: None,
            fallback_index: None,
            tried_fallbacks: None,
            results: None,
        }
    }

    pub fn success(
        command: impl Into<String>,
        action: ActionType,
        page_state: Option<PageState>,
    ) -> Self {
        Self {
            success: true,
            command: command.into(),
            action: Some(action),
            error: None,
            page_state,
            used_fallback: None,
            fallback_index: None,
            tried_fallbacks: None,
            results: None,
        }
    }
}

/// Append-only audit record of one attempted action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionHistoryEntry {
    pub command: String,
    pub action: Action,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
