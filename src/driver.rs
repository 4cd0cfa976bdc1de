//! Browser capability interface.
//!
//! [`BrowserDriver`] is the seam between the execution machinery and the
//! underlying automation backend: every primitive the executor or the
//! page-state reader needs is a trait method returning an explicit result.
//! [`Launcher`] acquires a driver; the CDP-backed implementations live in
//! [`crate::chromium`].

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::types::page::Viewport;

/// Error surfaced by browser driver primitives. Converted to opaque
/// strings at the action-executor boundary; nothing above that layer
/// matches on these variants.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser driver not initialized")]
    NotInitialized,
    #[error("timed out after {timeout_ms}ms waiting for selector '{selector}'")]
    WaitTimeout { selector: String, timeout_ms: u64 },
    #[error("element not found for selector '{0}'")]
    ElementNotFound(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("script evaluation failed: {0}")]
    Evaluation(String),
    #[error("unsupported browser engine: {0}")]
    UnsupportedEngine(String),
    #[error("{0}")]
    Message(String),
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::Message(err.to_string())
    }
}

/// Which browser engine to drive. The CDP launcher accepts Chromium only
/// and reports the rest as unsupported at launch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineChoice {
    Chromium,
    Firefox,
    Webkit,
}

impl EngineChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineChoice::Chromium => "chromium",
            EngineChoice::Firefox => "firefox",
            EngineChoice::Webkit => "webkit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Some(EngineChoice::Chromium),
            "firefox" => Some(EngineChoice::Firefox),
            "webkit" => Some(EngineChoice::Webkit),
            _ => None,
        }
    }
}

/// Options controlling a browser launch.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub engine: EngineChoice,
    pub viewport: Viewport,
    pub chrome_executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    pub args: Vec<String>,
    /// Budget for navigation settles (goto, back/forward, reload).
    pub navigation_timeout_ms: u64,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: false,
            engine: EngineChoice::Chromium,
            viewport: Viewport::default(),
            chrome_executable: None,
            user_data_dir: None,
            args: Vec::new(),
            navigation_timeout_ms: 30_000,
        }
    }
}

/// The browser primitives the execution machinery relies on. Every call
/// is bounded: element waits carry explicit timeouts and navigation waits
/// settle on lifecycle events rather than hanging.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to `url` and wait for the load to settle.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Wait for an in-flight navigation (back/forward/reload) to settle.
    async fn wait_for_navigation(&self) -> Result<(), DriverError>;

    /// Poll until the element is visible or the timeout elapses.
    async fn wait_for_visible(&self, selector: &str, timeout_ms: u64) -> Result<(), DriverError>;

    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn select(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn scroll_into_view(&self, selector: &str) -> Result<(), DriverError>;

    /// Evaluate a JS expression in the page and return its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<JsonValue, DriverError>;

    async fn back(&self) -> Result<(), DriverError>;

    async fn forward(&self) -> Result<(), DriverError>;

    async fn reload(&self) -> Result<(), DriverError>;

    async fn screenshot(&self, path: &str) -> Result<(), DriverError>;

    async fn url(&self) -> Result<String, DriverError>;

    async fn title(&self) -> Result<String, DriverError>;

    async fn viewport(&self) -> Result<Viewport, DriverError>;

    /// Release the underlying browser resource. Must be safe to call once;
    /// the session guarantees it is not called twice.
    async fn close(&self) -> Result<(), DriverError>;
}

/// Acquires a [`BrowserDriver`]. Implementations must tear down any
/// partially acquired resources before returning an error.
#[async_trait]
pub trait Launcher: Send + Sync {
    type Driver: BrowserDriver + 'static;

    async fn launch(&self, options: &LaunchOptions) -> Result<Self::Driver, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_choice_parsing() {
        assert_eq!(EngineChoice::parse("Chromium"), Some(EngineChoice::Chromium));
        assert_eq!(EngineChoice::parse("chrome"), Some(EngineChoice::Chromium));
        assert_eq!(EngineChoice::parse("firefox"), Some(EngineChoice::Firefox));
        assert_eq!(EngineChoice::parse("opera"), None);
    }

    #[test]
    fn wait_timeout_error_names_the_selector() {
        let err = DriverError::WaitTimeout {
            selector: "#login".to_string(),
            timeout_ms: 10_000,
        };
        let message = err.to_string();
        assert!(message.contains("#login"));
        assert!(message.contains("10000"));
    }
}
