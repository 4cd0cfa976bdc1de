//! Browser session lifecycle.
//!
//! A [`BrowserSession`] exclusively owns the driver for one browser
//! instance. The execution engine and page-state reader only ever see a
//! borrowed reference, valid while the session is active. `is_active` is
//! a cheap handle probe, not a guarantee the browser process survived —
//! command execution must still tolerate driver failures.

use std::sync::Arc;

use thiserror::Error;

use crate::driver::{BrowserDriver, DriverError, LaunchOptions, Launcher};
use crate::logging::PilotLogger;

/// Errors surfaced by session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to start browser session: {0}")]
    Start(#[source] DriverError),
    #[error("Error ending browser session: {0}")]
    End(#[source] DriverError),
}

/// Owns at most one active browser driver at a time.
pub struct BrowserSession<L: Launcher> {
    launcher: L,
    options: LaunchOptions,
    driver: Option<L::Driver>,
    logger: Arc<PilotLogger>,
}

impl<L: Launcher> BrowserSession<L> {
    pub fn new(launcher: L, options: LaunchOptions, logger: Arc<PilotLogger>) -> Self {
        Self {
            launcher,
            options,
            driver: None,
            logger,
        }
    }

    /// Start the session. Calling on an already-active session is a
    /// guarded no-op. On failure the launcher guarantees no handles leak.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.driver.is_some() {
            self.logger
                .info("Browser session already active", Some("session"));
            return Ok(());
        }

        match self.launcher.launch(&self.options).await {
            Ok(driver) => {
                self.driver = Some(driver);
                self.logger.info(
                    format!(
                        "Browser session started (engine: {}, headless: {})",
                        self.options.engine.as_str(),
                        self.options.headless
                    ),
                    Some("session"),
                );
                Ok(())
            }
            Err(err) => {
                self.logger.error(
                    format!("Failed to start browser session: {err}"),
                    Some("session"),
                );
                Err(SessionError::Start(err))
            }
        }
    }

    /// End the session, releasing resources in reverse acquisition order.
    /// Safe to call on an already-ended or never-started session.
    pub async fn end(&mut self) -> Result<(), SessionError> {
        let Some(driver) = self.driver.take() else {
            return Ok(());
        };

        match driver.close().await {
            Ok(()) => {
                self.logger.info("Browser session ended", Some("session"));
                Ok(())
            }
            Err(err) => {
                self.logger.error(
                    format!("Error ending browser session: {err}"),
                    Some("session"),
                );
                Err(SessionError::End(err))
            }
        }
    }

    /// Cheap liveness probe: are the resource handles held?
    pub fn is_active(&self) -> bool {
        self.driver.is_some()
    }

    /// Borrow the active driver, if any.
    pub fn driver(&self) -> Option<&L::Driver> {
        self.driver.as_ref()
    }

    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }
}
