use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ProjectId, TaskId};

/// A status label from a project's ordered status set.
///
/// Projects configure their own labels, so this is an open newtype rather
/// than a closed enum. The three labels every board starts with are exposed
/// as constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskStatus(String);

impl TaskStatus {
    pub const PENDING: &'static str = "pending";
    pub const IN_PROGRESS: &'static str = "in_progress";
    pub const COMPLETED: &'static str = "completed";

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn pending() -> Self {
        Self::new(Self::PENDING)
    }

    pub fn in_progress() -> Self {
        Self::new(Self::IN_PROGRESS)
    }

    pub fn completed() -> Self {
        Self::new(Self::COMPLETED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::pending()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        if label.is_empty() {
            return Err("Status label must not be empty".to_string());
        }
        if label.chars().any(char::is_whitespace) {
            return Err(format!("Invalid status label: {}", s));
        }
        Ok(Self::new(label))
    }
}

impl From<&str> for TaskStatus {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for TaskStatus {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TaskStatus {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A unit of work on a project board, as the server returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id", alias = "id")]
    pub id: TaskId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Minimal task with empty description, used by fixtures and fakes.
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status,
            comment: None,
            attachments: Vec::new(),
            project_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// File names of the attachment URIs (the last path segment).
    pub fn attachment_names(&self) -> impl Iterator<Item = &str> {
        self.attachments
            .iter()
            .map(|uri| uri.rsplit('/').next().unwrap_or(uri.as_str()))
    }
}

/// Body of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub project_id: ProjectId,
}

/// Body of `PATCH /tasks/{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: TaskStatus,
}

/// Body of `PATCH /tasks/{task_id}/comments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentUpdate {
    pub comment: String,
}
