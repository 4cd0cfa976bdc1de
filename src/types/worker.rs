//! Controller/worker message protocol.
//!
//! One request produces exactly one reply. The shapes serialize to the
//! same tagged JSON a transport front end would relay, so nothing crosses
//! the boundary as an unstructured error.

use serde::{Deserialize, Serialize};

use crate::types::action::ExecutionResult;
use crate::types::page::{DomSnapshot, ElementInfo, PageState};

/// Commands accepted by a running worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command_type", rename_all = "snake_case")]
pub enum WorkerCommand {
    Execute { command: String },
    Status,
    DomSnapshot,
    InspectElement { selector: String },
    Stop,
}

/// Worker liveness as reported by the `status` command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Active,
    Inactive,
    Error,
}

/// Reply to a `status` command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusReport {
    pub status: WorkerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusReport {
    pub fn inactive(message: impl Into<String>) -> Self {
        Self {
            status: WorkerStatus::Inactive,
            page: None,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: WorkerStatus::Error,
            page: None,
            message: Some(message.into()),
        }
    }
}

/// Replies emitted on the result channel, one per request (plus the
/// startup handshake).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "reply_type", rename_all = "snake_case")]
pub enum WorkerReply {
    Started {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Execution(ExecutionResult),
    Status(StatusReport),
    Snapshot {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dom_snapshot: Option<DomSnapshot>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Element {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element: Option<ElementInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Stopped {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}
