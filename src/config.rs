//! Client configuration.
//!
//! Settings are layered: built-in defaults, then the TOML file
//! (`~/.config/taskboard/config.toml` unless `--config` points elsewhere),
//! then environment variables (a `.env` file is loaded first), then CLI
//! flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! api_url = "http://localhost:5000"
//! push_url = "ws://localhost:5000/ws"
//! request_timeout_secs = 30
//!
//! [endpoints]
//! tasks = "/tasks/{project_id}"
//! create_task = "/tasks"
//! task_status = "/tasks/{task_id}"
//! task_comments = "/tasks/{task_id}/comments"
//!
//! [board]
//! statuses = ["pending", "in_progress", "completed"]
//! fetch_timeout_secs = 10
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use taskboard_common::TaskStatus;

pub const ENV_API_URL: &str = "TASKBOARD_API_URL";
pub const ENV_PUSH_URL: &str = "TASKBOARD_PUSH_URL";
pub const ENV_TOKEN: &str = "TASKBOARD_TOKEN";
pub const ENV_FETCH_TIMEOUT: &str = "TASKBOARD_FETCH_TIMEOUT_SECS";

const PROJECT_PLACEHOLDER: &str = "{project_id}";
const TASK_PLACEHOLDER: &str = "{task_id}";

/// Where the REST API and push channel live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Push channel URL. Derived from `api_url` when unset.
    #[serde(default)]
    pub push_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Where the login token is stored (default: next to the config file).
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            push_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            token_file: None,
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// REST path templates, relative to `api_url`.
///
/// Deployments disagree on exact paths, so every route is configurable.
/// `{project_id}` and `{task_id}` are substituted per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub tasks: String,
    pub create_task: String,
    pub task_status: String,
    pub task_comments: String,
    pub task_detail: String,
    pub login: String,
    pub signup: String,
    pub projects: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            tasks: "/tasks/{project_id}".to_string(),
            create_task: "/tasks".to_string(),
            task_status: "/tasks/{task_id}".to_string(),
            task_comments: "/tasks/{task_id}/comments".to_string(),
            task_detail: "/tasks/detail/{task_id}".to_string(),
            login: "/auth/login".to_string(),
            signup: "/signup".to_string(),
            projects: "/projects".to_string(),
        }
    }
}

/// Board behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Ordered status labels; one column each.
    #[serde(default = "default_statuses")]
    pub statuses: Vec<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            statuses: default_statuses(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_statuses() -> Vec<String> {
    vec![
        TaskStatus::PENDING.to_string(),
        TaskStatus::IN_PROGRESS.to_string(),
        TaskStatus::COMPLETED.to_string(),
    ]
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

/// Complete client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub board: BoardConfig,
    /// Token from the environment or CLI. Never written to the config file.
    #[serde(skip)]
    pub token: Option<String>,
}

impl ClientConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("taskboard").join("config.toml"))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse taskboard config")
    }

    /// Load `path` if given (it must exist), otherwise the default location
    /// if it exists, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content =
            toml::to_string_pretty(self).context("Failed to serialize taskboard config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Overlay environment variables from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay environment variables read through `lookup`.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.server.api_url = url;
        }
        if let Some(url) = lookup(ENV_PUSH_URL).filter(|v| !v.trim().is_empty()) {
            self.server.push_url = Some(url);
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.token = Some(token);
        }
        if let Some(secs) = lookup(ENV_FETCH_TIMEOUT).and_then(|v| v.trim().parse().ok()) {
            self.board.fetch_timeout_secs = secs;
        }
    }

    /// Push channel URL: explicit setting, or `api_url` with the scheme
    /// switched to ws/wss and `/ws` appended.
    pub fn push_url(&self) -> String {
        if let Some(url) = &self.server.push_url {
            return url.clone();
        }
        let base = self.server.api_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/ws", base)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.board.fetch_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Configured status order.
    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.board.statuses.iter().map(TaskStatus::new).collect()
    }

    /// Token file location: configured path, or `token` next to the
    /// default config file.
    pub fn token_path(&self) -> Option<PathBuf> {
        self.server.token_file.clone().or_else(|| {
            dirs::config_dir().map(|dir| dir.join("taskboard").join("token"))
        })
    }

    /// Validate the configuration and return any problems found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let api = self.server.api_url.as_str();
        if !(api.starts_with("http://") || api.starts_with("https://")) {
            problems.push(format!(
                "Invalid api_url '{}': must start with http:// or https://",
                api
            ));
        }
        let push = self.push_url();
        if !(push.starts_with("ws://") || push.starts_with("wss://")) {
            problems.push(format!(
                "Invalid push_url '{}': must start with ws:// or wss://",
                push
            ));
        }

        if self.board.statuses.is_empty() {
            problems.push("board.statuses must list at least one status".to_string());
        }
        let mut seen = HashSet::new();
        for status in &self.board.statuses {
            if let Err(e) = status.parse::<TaskStatus>() {
                problems.push(format!("Invalid status in board.statuses: {}", e));
            }
            if !seen.insert(status.as_str()) {
                problems.push(format!("Duplicate status '{}' in board.statuses", status));
            }
        }

        if self.board.fetch_timeout_secs == 0 {
            problems.push("board.fetch_timeout_secs must be greater than 0".to_string());
        }
        if self.server.request_timeout_secs == 0 {
            problems.push("server.request_timeout_secs must be greater than 0".to_string());
        }

        let templates = [
            ("tasks", &self.endpoints.tasks, Some(PROJECT_PLACEHOLDER)),
            ("create_task", &self.endpoints.create_task, None),
            ("task_status", &self.endpoints.task_status, Some(TASK_PLACEHOLDER)),
            ("task_comments", &self.endpoints.task_comments, Some(TASK_PLACEHOLDER)),
            ("task_detail", &self.endpoints.task_detail, Some(TASK_PLACEHOLDER)),
            ("login", &self.endpoints.login, None),
            ("signup", &self.endpoints.signup, None),
            ("projects", &self.endpoints.projects, None),
        ];
        for (name, template, placeholder) in templates {
            if !template.starts_with('/') {
                problems.push(format!("endpoints.{} must start with '/': '{}'", name, template));
            }
            if let Some(placeholder) = placeholder
                && !template.contains(placeholder)
            {
                problems.push(format!(
                    "endpoints.{} must contain {}: '{}'",
                    name, placeholder, template
                ));
            }
        }

        problems
    }

    /// Fail with every validation problem listed.
    pub fn ensure_valid(&self) -> Result<()> {
        let problems = self.validate();
        if !problems.is_empty() {
            bail!("Invalid configuration:\n  - {}", problems.join("\n  - "));
        }
        Ok(())
    }
}
