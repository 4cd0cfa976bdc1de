//! Natural-language browser automation with fallback-driven execution.
//!
//! A command like "click the login button" is translated into one or more
//! structured browser actions using the live page's state as context,
//! executed over CDP, and — when an action fails — retried through an
//! ordered list of alternative strategies. The whole session runs inside
//! a dedicated worker task reachable only through a timeout-guarded
//! message protocol, so a wedged browser never hangs the caller.
//!
//! The typical embedding goes through [`worker::WorkerManager`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use browser_pilot::chromium::ChromiumLauncher;
//! use browser_pilot::config::PilotConfig;
//! use browser_pilot::engine::ExecutionEngine;
//! use browser_pilot::interpreter::NlpTranslator;
//! use browser_pilot::llm::OpenAiChatProvider;
//! use browser_pilot::logging::PilotLogger;
//! use browser_pilot::session::BrowserSession;
//! use browser_pilot::worker::WorkerManager;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PilotConfig::from_env()?;
//! let logger = Arc::new(PilotLogger::new(config.verbose));
//!
//! let session = BrowserSession::new(
//!     ChromiumLauncher::new(Arc::clone(&logger)),
//!     config.launch_options(),
//!     Arc::clone(&logger),
//! );
//! let translator = NlpTranslator::new(
//!     OpenAiChatProvider::new(config.model_api_key.clone()),
//!     config.model_name.clone(),
//!     Arc::clone(&logger),
//! );
//! let engine = ExecutionEngine::new(translator, Arc::clone(&logger))
//!     .with_snapshot_staleness(config.snapshot_staleness())
//!     .with_element_wait_timeout_ms(config.element_wait_timeout_ms);
//!
//! let mut manager = WorkerManager::new(logger);
//! manager.start(session, engine, config.worker_timeouts()).await?;
//! let result = manager.execute("Navigate to example.com").await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! manager.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod chromium;
pub mod config;
pub mod dom;
pub mod dom_scripts;
pub mod driver;
pub mod engine;
pub mod executor;
pub mod interpreter;
pub mod llm;
pub mod logging;
pub mod metrics;
pub mod session;
pub mod types;
pub mod worker;
