//! Typed error hierarchy for the taskboard client.
//!
//! Two top-level enums cover the two layers:
//! - `ApiError`: a single REST request failed
//! - `SyncError`: a board operation failed, and what happened to local state

use std::time::Duration;

use taskboard_common::{ProjectId, TaskId, TaskStatus};
use thiserror::Error;

/// Errors from a single REST request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned HTTP {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Not authorized (HTTP {status}); log in again")]
    Unauthorized { status: u16 },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

impl ApiError {
    /// True when the server rejected the credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

/// Errors from board operations, surfaced to the view that issued them.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to load tasks for project {project_id}: {source}")]
    FetchFailed {
        project_id: ProjectId,
        #[source]
        source: ApiError,
    },

    #[error("Failed to set task {task_id} to '{status}' (rolled back: {rolled_back}): {source}")]
    StatusUpdateFailed {
        task_id: TaskId,
        status: TaskStatus,
        rolled_back: bool,
        #[source]
        source: ApiError,
    },

    #[error("Failed to create task in project {project_id}: {source}")]
    CreateFailed {
        project_id: ProjectId,
        #[source]
        source: ApiError,
    },

    #[error("Failed to comment on task {task_id}: {source}")]
    CommentFailed {
        task_id: TaskId,
        #[source]
        source: ApiError,
    },

    #[error("No project is open")]
    NotOpen,

    #[error("Push channel error: {0}")]
    PushChannel(String),

    #[error("Board session has shut down")]
    SessionClosed,
}

impl SyncError {
    /// The underlying request error, when there is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            SyncError::FetchFailed { source, .. }
            | SyncError::StatusUpdateFailed { source, .. }
            | SyncError::CreateFailed { source, .. }
            | SyncError::CommentFailed { source, .. } => Some(source),
            SyncError::NotOpen | SyncError::PushChannel(_) | SyncError::SessionClosed => None,
        }
    }
}
