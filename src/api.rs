//! REST client.
//!
//! [`TaskApi`] is the seam the board session talks through; [`HttpApi`] is
//! the reqwest implementation. Account and project calls live only on
//! `HttpApi` since the board never needs them.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use taskboard_common::{
    AuthToken, CommentUpdate, LoginRequest, NewProject, NewTask, Project, ProjectId,
    SignupRequest, StatusUpdate, Task, TaskId, TaskStatus,
};
use tracing::debug;

use crate::config::{ClientConfig, Endpoints};
use crate::errors::ApiError;

/// Task operations used by the board session.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// `GET` every task of a project, in server order.
    async fn fetch_tasks(&self, project_id: &ProjectId) -> Result<Vec<Task>, ApiError>;

    /// `POST` a new task; returns it with its assigned id.
    async fn create_task(&self, new_task: &NewTask) -> Result<Task, ApiError>;

    /// `PATCH` a task's status; returns the task as the server now holds it.
    async fn update_status(&self, task_id: &TaskId, status: &TaskStatus)
    -> Result<Task, ApiError>;

    /// `PATCH` a comment onto a task. The acknowledgement has no fixed
    /// shape; a task body is returned when the server sends one.
    async fn add_comment(&self, task_id: &TaskId, comment: &str)
    -> Result<Option<Task>, ApiError>;
}

/// reqwest-backed API client. Attaches `Authorization: Bearer` to every
/// request when a token is set.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    endpoints: Endpoints,
    token: Option<AuthToken>,
}

impl HttpApi {
    pub fn new(config: &ClientConfig, token: Option<AuthToken>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("taskboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ApiError::Transport {
                url: config.server.api_url.clone(),
                source,
            })?;
        Ok(Self {
            client,
            base_url: config.server.api_url.trim_end_matches('/').to_string(),
            endpoints: config.endpoints.clone(),
            token,
        })
    }

    pub fn with_token(mut self, token: AuthToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    /// Build a full URL from a path template, substituting
    /// `{project_id}`/`{task_id}`.
    fn url(&self, template: &str, params: &[(&str, &str)]) -> Result<String, ApiError> {
        let mut path = template.to_string();
        for (name, value) in params {
            if value.is_empty()
                || value
                    .chars()
                    .any(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace())
            {
                return Err(ApiError::InvalidUrl {
                    url: template.to_string(),
                    message: format!("'{}' is not a valid {}", value, name),
                });
            }
            path = path.replace(&format!("{{{}}}", name), value);
        }
        Ok(format!("{}{}", self.base_url, path))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header(reqwest::header::AUTHORIZATION, token.bearer_header()),
            None => builder,
        }
    }

    /// Send a request and return the raw body of a successful response.
    async fn send(&self, builder: RequestBuilder, url: &str) -> Result<Vec<u8>, ApiError> {
        let transport = |source| ApiError::Transport {
            url: url.to_string(),
            source,
        };
        let resp = self.authorize(builder).send().await.map_err(transport)?;
        let status = resp.status();
        debug!(url, status = status.as_u16(), "API response");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        url: &str,
    ) -> Result<T, ApiError> {
        let body = self.send(builder, url).await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthToken, ApiError> {
        let url = self.url(&self.endpoints.login, &[])?;
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.send_json(self.client.post(&url).json(&body), &url).await
    }

    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthToken, ApiError> {
        let url = self.url(&self.endpoints.signup, &[])?;
        let body = SignupRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.send_json(self.client.post(&url).json(&body), &url).await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        let url = self.url(&self.endpoints.projects, &[])?;
        self.send_json(self.client.get(&url), &url).await
    }

    pub async fn create_project(&self, name: &str, description: &str) -> Result<Project, ApiError> {
        let url = self.url(&self.endpoints.projects, &[])?;
        let body = NewProject {
            name: name.to_string(),
            description: description.to_string(),
        };
        self.send_json(self.client.post(&url).json(&body), &url).await
    }

    pub async fn get_task(&self, task_id: &TaskId) -> Result<Task, ApiError> {
        let url = self.url(&self.endpoints.task_detail, &[("task_id", task_id.as_str())])?;
        self.send_json(self.client.get(&url), &url).await
    }
}

#[async_trait]
impl TaskApi for HttpApi {
    async fn fetch_tasks(&self, project_id: &ProjectId) -> Result<Vec<Task>, ApiError> {
        let url = self.url(&self.endpoints.tasks, &[("project_id", project_id.as_str())])?;
        self.send_json(self.client.get(&url), &url).await
    }

    async fn create_task(&self, new_task: &NewTask) -> Result<Task, ApiError> {
        let url = self.url(&self.endpoints.create_task, &[])?;
        self.send_json(self.client.post(&url).json(new_task), &url).await
    }

    async fn update_status(
        &self,
        task_id: &TaskId,
        status: &TaskStatus,
    ) -> Result<Task, ApiError> {
        let url = self.url(&self.endpoints.task_status, &[("task_id", task_id.as_str())])?;
        let body = StatusUpdate {
            status: status.clone(),
        };
        self.send_json(self.client.patch(&url).json(&body), &url).await
    }

    async fn add_comment(
        &self,
        task_id: &TaskId,
        comment: &str,
    ) -> Result<Option<Task>, ApiError> {
        let url = self.url(&self.endpoints.task_comments, &[("task_id", task_id.as_str())])?;
        let body = CommentUpdate {
            comment: comment.to_string(),
        };
        let ack = self.send(self.client.patch(&url).json(&body), &url).await?;
        Ok(serde_json::from_slice::<Task>(&ack).ok())
    }
}
