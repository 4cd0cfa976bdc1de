//! Strongly-typed configuration for the pilot runtime.
//!
//! Values can be constructed from defaults, loaded from environment
//! variables (with optional `.env` support), or merged with explicit
//! overrides for programmatic updates.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::driver::{EngineChoice, LaunchOptions};
use crate::types::page::Viewport;
use crate::worker::WorkerTimeouts;

/// Default chat model used by the command translator.
pub const DEFAULT_MODEL: &str = "gpt-4-turbo";

/// Verbosity level for pilot logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verbosity {
    Minimal,
    Medium,
    Detailed,
}

impl Verbosity {
    pub fn as_u8(self) -> u8 {
        match self {
            Verbosity::Minimal => 0,
            Verbosity::Medium => 1,
            Verbosity::Detailed => 2,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Verbosity::Minimal),
            1 => Some(Verbosity::Medium),
            2 => Some(Verbosity::Detailed),
            _ => None,
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Medium
    }
}

/// Errors produced while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

impl ConfigError {
    fn invalid(var: &'static str, value: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            var,
            value: value.into(),
        }
    }
}

/// Configuration for a pilot session, engine, and worker.
#[derive(Debug, Clone)]
pub struct PilotConfig {
    /// Chat model for command translation and fallback generation.
    pub model_name: String,
    /// API key for the model backend; falls back to the provider's own
    /// environment handling when absent.
    pub model_api_key: Option<String>,
    pub headless: bool,
    pub engine: EngineChoice,
    pub chrome_executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    pub viewport: Viewport,
    /// Bounded wait applied to element-visibility preconditions.
    pub element_wait_timeout_ms: u64,
    /// Budget for navigation settles.
    pub navigation_timeout_ms: u64,
    /// DOM snapshot staleness window.
    pub snapshot_staleness_ms: u64,
    pub verbose: Verbosity,

    // Controller-side per-request budgets.
    pub startup_timeout_ms: u64,
    pub execute_timeout_ms: u64,
    pub status_timeout_ms: u64,
    pub snapshot_timeout_ms: u64,
    pub inspect_timeout_ms: u64,
    pub stop_timeout_ms: u64,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            model_api_key: None,
            headless: false,
            engine: EngineChoice::Chromium,
            chrome_executable: None,
            user_data_dir: None,
            viewport: Viewport::default(),
            element_wait_timeout_ms: 10_000,
            navigation_timeout_ms: 30_000,
            snapshot_staleness_ms: 2_000,
            verbose: Verbosity::default(),
            startup_timeout_ms: 60_000,
            execute_timeout_ms: 300_000,
            status_timeout_ms: 10_000,
            snapshot_timeout_ms: 30_000,
            inspect_timeout_ms: 10_000,
            stop_timeout_ms: 30_000,
        }
    }
}

impl PilotConfig {
    /// Construct a configuration by reading relevant environment variables,
    /// after loading a `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv();
        let mut config = PilotConfig::default();

        if let Some(value) = env_var("MODEL_NAME") {
            config.model_name = value;
        }

        if let Some(value) = env_var("MODEL_API_KEY").or_else(|| env_var("OPENAI_API_KEY")) {
            config.model_api_key = Some(value);
        }

        if let Some(value) = env_var("PILOT_HEADLESS") {
            config.headless = parse_bool("PILOT_HEADLESS", &value)?;
        }

        if let Some(value) = env_var("PILOT_BROWSER") {
            config.engine = EngineChoice::parse(&value)
                .ok_or_else(|| ConfigError::invalid("PILOT_BROWSER", value.clone()))?;
        }

        if let Some(value) = env_var("PILOT_CHROME_BIN") {
            config.chrome_executable = Some(PathBuf::from(value));
        }

        if let Some(value) = env_var("PILOT_USER_DATA_DIR") {
            config.user_data_dir = Some(PathBuf::from(value));
        }

        if let Some(value) = env_var("PILOT_VERBOSE") {
            let level: u8 = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("PILOT_VERBOSE", value.clone()))?;
            config.verbose = Verbosity::from_u8(level)
                .ok_or_else(|| ConfigError::invalid("PILOT_VERBOSE", value.clone()))?;
        }

        if let Some(value) = env_var("PILOT_ELEMENT_WAIT_TIMEOUT_MS") {
            config.element_wait_timeout_ms =
                parse_ms("PILOT_ELEMENT_WAIT_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = env_var("PILOT_NAVIGATION_TIMEOUT_MS") {
            config.navigation_timeout_ms = parse_ms("PILOT_NAVIGATION_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = env_var("PILOT_SNAPSHOT_STALENESS_MS") {
            config.snapshot_staleness_ms = parse_ms("PILOT_SNAPSHOT_STALENESS_MS", &value)?;
        }

        Ok(config)
    }

    /// Apply explicit overrides on top of the current values.
    pub fn merged(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(model_name) = overrides.model_name {
            self.model_name = model_name;
        }
        if let Some(model_api_key) = overrides.model_api_key {
            self.model_api_key = Some(model_api_key);
        }
        if let Some(headless) = overrides.headless {
            self.headless = headless;
        }
        if let Some(engine) = overrides.engine {
            self.engine = engine;
        }
        if let Some(chrome_executable) = overrides.chrome_executable {
            self.chrome_executable = Some(chrome_executable);
        }
        if let Some(user_data_dir) = overrides.user_data_dir {
            self.user_data_dir = Some(user_data_dir);
        }
        if let Some(viewport) = overrides.viewport {
            self.viewport = viewport;
        }
        if let Some(verbose) = overrides.verbose {
            self.verbose = verbose;
        }
        self
    }

    /// Launch options derived from this configuration.
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            headless: self.headless,
            engine: self.engine,
            viewport: self.viewport,
            chrome_executable: self.chrome_executable.clone(),
            user_data_dir: self.user_data_dir.clone(),
            args: Vec::new(),
            navigation_timeout_ms: self.navigation_timeout_ms,
        }
    }

    /// Controller-side request budgets derived from this configuration.
    pub fn worker_timeouts(&self) -> WorkerTimeouts {
        WorkerTimeouts {
            startup: Duration::from_millis(self.startup_timeout_ms),
            execute: Duration::from_millis(self.execute_timeout_ms),
            status: Duration::from_millis(self.status_timeout_ms),
            snapshot: Duration::from_millis(self.snapshot_timeout_ms),
            inspect: Duration::from_millis(self.inspect_timeout_ms),
            stop: Duration::from_millis(self.stop_timeout_ms),
        }
    }

    pub fn snapshot_staleness(&self) -> Duration {
        Duration::from_millis(self.snapshot_staleness_ms)
    }
}

/// Optional overrides applied on top of defaults or environment values.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model_name: Option<String>,
    pub model_api_key: Option<String>,
    pub headless: Option<bool>,
    pub engine: Option<EngineChoice>,
    pub chrome_executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    pub viewport: Option<Viewport>,
    pub verbose: Option<Verbosity>,
}

fn env_var(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(var, value)),
    }
}

fn parse_ms(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(var, value))
}
