//! Process isolation layer: a worker task exclusively owns the browser
//! session and execution engine, reachable only through a pair of bounded
//! one-directional channels.
//!
//! The worker resolves commands strictly one at a time in arrival order.
//! The controller side wraps every receive in a per-request timeout; a
//! timeout marks the worker unresponsive rather than resubmitting, so a
//! late reply can never pair with the wrong request. Stopping a worker
//! that no longer answers force-terminates its task, and the task is
//! always reaped afterwards.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::dom;
use crate::driver::Launcher;
use crate::engine::ExecutionEngine;
use crate::interpreter::CommandTranslator;
use crate::logging::PilotLogger;
use crate::session::BrowserSession;
use crate::types::action::ExecutionResult;
use crate::types::page::{DomSnapshot, ElementInfo};
use crate::types::worker::{StatusReport, WorkerCommand, WorkerReply, WorkerStatus};

const CHANNEL_CAPACITY: usize = 16;

/// Error reported when a command reaches a worker whose session is gone.
pub const NO_ACTIVE_SESSION: &str = "No active browser session";

const NOT_RUNNING: &str = "Browser worker is not running";

/// Controller-side budgets, one per request type.
#[derive(Debug, Clone, Copy)]
pub struct WorkerTimeouts {
    pub startup: Duration,
    pub execute: Duration,
    pub status: Duration,
    pub snapshot: Duration,
    pub inspect: Duration,
    pub stop: Duration,
}

impl Default for WorkerTimeouts {
    fn default() -> Self {
        Self {
            startup: Duration::from_secs(60),
            execute: Duration::from_secs(300),
            status: Duration::from_secs(10),
            snapshot: Duration::from_secs(30),
            inspect: Duration::from_secs(10),
            stop: Duration::from_secs(30),
        }
    }
}

/// Errors surfaced by the controller side of the worker protocol.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("a browser worker is already running")]
    AlreadyRunning,
    #[error("Timeout waiting for browser to start")]
    StartupTimeout,
    #[error("failed to start browser worker: {0}")]
    Startup(String),
    #[error("Timeout waiting for {0} reply")]
    Timeout(&'static str),
    #[error("browser worker is unresponsive")]
    Unresponsive,
    #[error("browser worker channel closed")]
    Closed,
    #[error("unexpected reply from browser worker")]
    Protocol,
    #[error("{0}")]
    Remote(String),
}

/// Controller handle to one live worker task.
pub struct WorkerHandle {
    command_tx: mpsc::Sender<WorkerCommand>,
    reply_rx: mpsc::Receiver<WorkerReply>,
    join: Option<JoinHandle<()>>,
    timeouts: WorkerTimeouts,
    responsive: bool,
    logger: Arc<PilotLogger>,
}

impl WorkerHandle {
    /// Spawn a worker owning the given session and engine, and block until
    /// it reports startup or the startup budget elapses. A startup timeout
    /// means the worker failed; it is force-terminated, not waited on.
    pub async fn spawn<L, T>(
        session: BrowserSession<L>,
        engine: ExecutionEngine<T>,
        timeouts: WorkerTimeouts,
        logger: Arc<PilotLogger>,
    ) -> Result<WorkerHandle, WorkerError>
    where
        L: Launcher + Send + Sync + 'static,
        T: CommandTranslator + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (reply_tx, reply_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let worker_logger = Arc::clone(&logger);
        let join = tokio::spawn(worker_loop(
            session,
            engine,
            command_rx,
            reply_tx,
            worker_logger,
        ));

        let mut handle = WorkerHandle {
            command_tx,
            reply_rx,
            join: Some(join),
            timeouts,
            responsive: true,
            logger,
        };

        match timeout(handle.timeouts.startup, handle.reply_rx.recv()).await {
            Ok(Some(WorkerReply::Started { success: true, .. })) => Ok(handle),
            Ok(Some(WorkerReply::Started {
                success: false,
                error,
            })) => {
                // The worker exits on its own after a failed start.
                handle.reap().await;
                Err(WorkerError::Startup(error.unwrap_or_else(|| {
                    "Unknown error starting browser".to_string()
                })))
            }
            Ok(_) => {
                handle.force_terminate().await;
                Err(WorkerError::Startup(
                    "worker exited before reporting startup".to_string(),
                ))
            }
            Err(_) => {
                handle.force_terminate().await;
                Err(WorkerError::StartupTimeout)
            }
        }
    }

    /// Execute a natural-language command in the worker.
    pub async fn execute(&mut self, command: &str) -> Result<ExecutionResult, WorkerError> {
        let budget = self.timeouts.execute;
        let reply = self
            .request(
                WorkerCommand::Execute {
                    command: command.to_string(),
                },
                budget,
                "execute",
            )
            .await?;
        match reply {
            WorkerReply::Execution(result) => Ok(result),
            _ => {
                self.responsive = false;
                Err(WorkerError::Protocol)
            }
        }
    }

    /// Ask the worker for its session status.
    pub async fn status(&mut self) -> Result<StatusReport, WorkerError> {
        let budget = self.timeouts.status;
        match self.request(WorkerCommand::Status, budget, "status").await? {
            WorkerReply::Status(report) => Ok(report),
            _ => {
                self.responsive = false;
                Err(WorkerError::Protocol)
            }
        }
    }

    /// Ask the worker for a fresh DOM snapshot.
    pub async fn dom_snapshot(&mut self) -> Result<DomSnapshot, WorkerError> {
        let budget = self.timeouts.snapshot;
        match self
            .request(WorkerCommand::DomSnapshot, budget, "dom_snapshot")
            .await?
        {
            WorkerReply::Snapshot {
                success: true,
                dom_snapshot: Some(snapshot),
                ..
            } => Ok(snapshot),
            WorkerReply::Snapshot { error, .. } => Err(WorkerError::Remote(
                error.unwrap_or_else(|| "Failed to get DOM snapshot".to_string()),
            )),
            _ => {
                self.responsive = false;
                Err(WorkerError::Protocol)
            }
        }
    }

    /// Ask the worker to inspect one element.
    pub async fn inspect_element(&mut self, selector: &str) -> Result<ElementInfo, WorkerError> {
        let budget = self.timeouts.inspect;
        match self
            .request(
                WorkerCommand::InspectElement {
                    selector: selector.to_string(),
                },
                budget,
                "inspect_element",
            )
            .await?
        {
            WorkerReply::Element {
                success: true,
                element: Some(element),
                ..
            } => Ok(element),
            WorkerReply::Element { error, .. } => Err(WorkerError::Remote(
                error.unwrap_or_else(|| "Element inspection failed".to_string()),
            )),
            _ => {
                self.responsive = false;
                Err(WorkerError::Protocol)
            }
        }
    }

    /// Stop the worker. Waits up to the stop budget for the final status,
    /// force-terminates on timeout, and always reaps the task.
    pub async fn stop(mut self) -> Result<(), WorkerError> {
        let budget = self.timeouts.stop;
        let outcome = self.request(WorkerCommand::Stop, budget, "stop").await;

        // Terminate and reap regardless of the outcome; a cleanly stopped
        // worker has already exited and the abort is a no-op.
        self.force_terminate().await;

        match outcome {
            Ok(WorkerReply::Stopped { success: true, .. }) => Ok(()),
            Ok(WorkerReply::Stopped {
                success: false,
                error,
            }) => {
                self.logger.info(
                    format!(
                        "Browser worker stopped with warnings: {}",
                        error.unwrap_or_default()
                    ),
                    Some("worker"),
                );
                Ok(())
            }
            Ok(_) => Err(WorkerError::Protocol),
            Err(err) => Err(err),
        }
    }

    async fn request(
        &mut self,
        command: WorkerCommand,
        budget: Duration,
        label: &'static str,
    ) -> Result<WorkerReply, WorkerError> {
        if !self.responsive {
            return Err(WorkerError::Unresponsive);
        }
        if self.command_tx.send(command).await.is_err() {
            self.responsive = false;
            return Err(WorkerError::Closed);
        }
        match timeout(budget, self.reply_rx.recv()).await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => {
                self.responsive = false;
                Err(WorkerError::Closed)
            }
            Err(_) => {
                self.logger.error(
                    format!("Timeout waiting for {label} reply"),
                    Some("worker"),
                );
                self.responsive = false;
                Err(WorkerError::Timeout(label))
            }
        }
    }

    async fn reap(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }

    async fn force_terminate(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
            let _ = join.await;
        }
    }
}

/// Owns at most one live worker per logical session.
pub struct WorkerManager {
    handle: Option<WorkerHandle>,
    logger: Arc<PilotLogger>,
}

impl WorkerManager {
    pub fn new(logger: Arc<PilotLogger>) -> Self {
        Self {
            handle: None,
            logger,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Start a worker. Rejected while one is already running.
    pub async fn start<L, T>(
        &mut self,
        session: BrowserSession<L>,
        engine: ExecutionEngine<T>,
        timeouts: WorkerTimeouts,
    ) -> Result<(), WorkerError>
    where
        L: Launcher + Send + Sync + 'static,
        T: CommandTranslator + 'static,
    {
        if self.handle.is_some() {
            self.logger
                .info("Browser worker is already running", Some("worker"));
            return Err(WorkerError::AlreadyRunning);
        }

        let handle =
            WorkerHandle::spawn(session, engine, timeouts, Arc::clone(&self.logger)).await?;
        self.handle = Some(handle);
        self.logger
            .info("Browser worker started successfully", Some("worker"));
        Ok(())
    }

    /// Execute a command, converting every failure path into a structured
    /// result.
    pub async fn execute(&mut self, command: &str) -> ExecutionResult {
        let Some(handle) = self.handle.as_mut() else {
            return ExecutionResult::failure(command, NOT_RUNNING);
        };
        match handle.execute(command).await {
            Ok(result) => result,
            Err(err) => ExecutionResult::failure(command, err.to_string()),
        }
    }

    /// Report worker status. A worker that misses its status budget is
    /// treated as failed and torn down.
    pub async fn get_status(&mut self) -> StatusReport {
        let Some(mut handle) = self.handle.take() else {
            return StatusReport::inactive(NOT_RUNNING);
        };
        match handle.status().await {
            Ok(report) => {
                self.handle = Some(handle);
                report
            }
            Err(err) => {
                handle.force_terminate().await;
                StatusReport::error(err.to_string())
            }
        }
    }

    pub async fn dom_snapshot(&mut self) -> Result<DomSnapshot, WorkerError> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(WorkerError::Remote(NOT_RUNNING.to_string()));
        };
        handle.dom_snapshot().await
    }

    pub async fn inspect_element(&mut self, selector: &str) -> Result<ElementInfo, WorkerError> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(WorkerError::Remote(NOT_RUNNING.to_string()));
        };
        handle.inspect_element(selector).await
    }

    /// Stop the running worker, if any. Stopping a stopped manager is a
    /// no-op.
    pub async fn stop(&mut self) -> Result<(), WorkerError> {
        let Some(handle) = self.handle.take() else {
            self.logger
                .info("Browser worker is not running", Some("worker"));
            return Ok(());
        };
        handle.stop().await
    }
}

/// The worker task: starts the session, reports the handshake, then
/// resolves commands sequentially until stopped or disconnected.
async fn worker_loop<L, T>(
    mut session: BrowserSession<L>,
    mut engine: ExecutionEngine<T>,
    mut command_rx: mpsc::Receiver<WorkerCommand>,
    reply_tx: mpsc::Sender<WorkerReply>,
    logger: Arc<PilotLogger>,
) where
    L: Launcher,
    T: CommandTranslator,
{
    if let Err(err) = session.start().await {
        let _ = reply_tx
            .send(WorkerReply::Started {
                success: false,
                error: Some(err.to_string()),
            })
            .await;
        return;
    }
    let _ = reply_tx
        .send(WorkerReply::Started {
            success: true,
            error: None,
        })
        .await;

    while let Some(command) = command_rx.recv().await {
        if let WorkerCommand::Stop = command {
            let outcome = session.end().await;
            let _ = reply_tx
                .send(WorkerReply::Stopped {
                    success: outcome.is_ok(),
                    error: outcome.err().map(|err| err.to_string()),
                })
                .await;
            break;
        }

        logger.debug(
            format!("Processing worker command: {command:?}"),
            Some("worker"),
        );

        let reply = match command {
            WorkerCommand::Execute { command } => match session.driver() {
                Some(driver) => WorkerReply::Execution(engine.execute(driver, &command).await),
                None => WorkerReply::Execution(ExecutionResult::failure(
                    command,
                    NO_ACTIVE_SESSION,
                )),
            },
            WorkerCommand::Status => {
                let report = match session.driver() {
                    Some(driver) => match dom::read_page_state(driver).await {
                        Ok(page) => StatusReport {
                            status: WorkerStatus::Active,
                            page: Some(page),
                            message: None,
                        },
                        Err(err) => StatusReport::error(err.to_string()),
                    },
                    None => StatusReport::inactive("Browser session is not active"),
                };
                WorkerReply::Status(report)
            }
            WorkerCommand::DomSnapshot => match session.driver() {
                Some(driver) => match engine.refresh_snapshot(driver).await {
                    Ok(snapshot) => WorkerReply::Snapshot {
                        success: true,
                        dom_snapshot: Some(snapshot),
                        error: None,
                    },
                    Err(err) => WorkerReply::Snapshot {
                        success: false,
                        dom_snapshot: None,
                        error: Some(err.to_string()),
                    },
                },
                None => WorkerReply::Snapshot {
                    success: false,
                    dom_snapshot: None,
                    error: Some(NO_ACTIVE_SESSION.to_string()),
                },
            },
            WorkerCommand::InspectElement { selector } => match session.driver() {
                Some(driver) => match dom::inspect_element(driver, &selector).await {
                    Ok(element) => WorkerReply::Element {
                        success: true,
                        element: Some(element),
                        error: None,
                    },
                    Err(err) => WorkerReply::Element {
                        success: false,
                        element: None,
                        error: Some(err.to_string()),
                    },
                },
                None => WorkerReply::Element {
                    success: false,
                    element: None,
                    error: Some(NO_ACTIVE_SESSION.to_string()),
                },
            },
            WorkerCommand::Stop => unreachable!("handled above"),
        };

        if reply_tx.send(reply).await.is_err() {
            break;
        }
    }

    // Controller gone or stop processed; make sure nothing leaks.
    let _ = session.end().await;
}
