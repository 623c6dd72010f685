//! Frames carried by the push channel.
//!
//! Every frame is a JSON text message tagged as `{"type": ..., "data": ...}`.
//! Clients scope their subscription with join/leave frames; the server
//! pushes full task payloads when a task is created or updated.

use serde::{Deserialize, Serialize};

use crate::id::ProjectId;
use crate::task::Task;

/// Frames sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientFrame {
    JoinProject { project_id: ProjectId },
    LeaveProject { project_id: ProjectId },
}

/// Frames sent from the server to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerFrame {
    #[serde(alias = "taskUpdated")]
    TaskUpdated { task: Task },
    #[serde(alias = "taskAdded", alias = "taskCreated")]
    TaskCreated { task: Task },
}

impl ServerFrame {
    /// Frame type names accepted for task updates.
    pub const UPDATED_TYPES: &'static [&'static str] = &["TaskUpdated", "taskUpdated"];
    /// Frame type names accepted for task creation.
    pub const CREATED_TYPES: &'static [&'static str] = &["TaskCreated", "taskAdded", "taskCreated"];
}
