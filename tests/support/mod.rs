//! In-process fake of the task board backend: REST routes plus a `/ws`
//! push endpoint that forwards task frames to sockets joined to the task's
//! project.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        Path as UrlPath, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use futures_util::{SinkExt, StreamExt};
use taskboard::ClientConfig;
use taskboard_common::{
    AuthToken, ClientFrame, CommentUpdate, LoginRequest, NewProject, NewTask, Project, ProjectId,
    ServerFrame, SignupRequest, StatusUpdate, Task, TaskId,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// The only token the fake accepts.
pub const TOKEN: &str = "test-token";

/// Password that the login route rejects.
pub const BAD_PASSWORD: &str = "wrong";

pub const WAIT: Duration = Duration::from_secs(5);

pub struct Backend {
    tasks: Mutex<Vec<Task>>,
    projects: Mutex<Vec<Project>>,
    push: broadcast::Sender<(ProjectId, String)>,
    joined: Mutex<Vec<ProjectId>>,
    after_leave: Mutex<Vec<String>>,
    next_id: AtomicU64,
    pub fail_status: AtomicBool,
    pub fail_fetch: AtomicBool,
}

type Shared = Arc<Backend>;

pub struct FakeServer {
    pub addr: SocketAddr,
    pub state: Shared,
    task: JoinHandle<()>,
}

impl FakeServer {
    pub async fn start() -> Self {
        let (push, _) = broadcast::channel(64);
        let state = Arc::new(Backend {
            tasks: Mutex::new(Vec::new()),
            projects: Mutex::new(Vec::new()),
            push,
            joined: Mutex::new(Vec::new()),
            after_leave: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            fail_status: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
        });

        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/signup", post(signup))
            .route("/projects", get(list_projects).post(create_project))
            .route("/tasks", post(create_task))
            .route("/tasks/detail/{id}", get(task_detail))
            .route("/tasks/{id}", get(list_tasks).patch(update_status))
            .route("/tasks/{id}/comments", patch(add_comment))
            .route("/ws", get(ws_handler))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state, task }
    }

    pub fn api_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client config pointing at this server, with a short fetch timeout.
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.server.api_url = self.api_url();
        config.board.fetch_timeout_secs = 5;
        config
    }

    /// TOML config file for CLI tests.
    pub fn write_config(&self, path: &Path, token_file: &Path) {
        let mut config = self.config();
        config.server.token_file = Some(token_file.to_path_buf());
        config.save(path).unwrap();
    }

    pub fn seed(&self, task: Task) {
        self.state.tasks.lock().unwrap().push(task);
    }

    pub fn seed_project(&self, id: &str, name: &str) {
        self.state.projects.lock().unwrap().push(Project {
            id: ProjectId::from(id),
            name: name.to_string(),
            description: String::new(),
        });
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.state
            .tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id.as_str() == id)
            .cloned()
    }

    /// Broadcast a raw text frame to sockets joined to `project`.
    pub fn push_raw(&self, project: &str, text: &str) {
        let _ = self
            .state
            .push
            .send((ProjectId::from(project), text.to_string()));
    }

    /// Write `frame` to the next socket that leaves a project, straight
    /// after the leave is processed. Models a frame already in flight.
    pub fn send_after_leave(&self, frame: &ServerFrame) {
        let json = serde_json::to_string(frame).unwrap();
        self.state.after_leave.lock().unwrap().push(json);
    }

    pub fn joined(&self, project: &str) -> usize {
        self.state
            .joined
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == project)
            .count()
    }

    /// Wait until some socket has joined `project`.
    pub async fn wait_for_join(&self, project: &str) {
        tokio::time::timeout(WAIT, async {
            while self.joined(project) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("no socket joined the project");
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Task fixture belonging to `project`.
pub fn task(id: &str, title: &str, status: &str, project: &str) -> Task {
    let mut task = Task::new(id, title, status.into());
    task.project_id = Some(ProjectId::from(project));
    task
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = AuthToken::new(TOKEN).bearer_header();
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(expected.as_str())
}

fn broadcast(state: &Backend, frame: &ServerFrame) {
    let task = match frame {
        ServerFrame::TaskUpdated { task } | ServerFrame::TaskCreated { task } => task,
    };
    let (Some(project), Ok(json)) = (task.project_id.clone(), serde_json::to_string(frame)) else {
        return;
    };
    let _ = state.push.send((project, json));
}

// ── REST routes ──────────────────────────────────────────────────────

async fn login(Json(body): Json<LoginRequest>) -> Response {
    if body.password == BAD_PASSWORD {
        return (StatusCode::UNAUTHORIZED, "invalid credentials").into_response();
    }
    Json(AuthToken::new(TOKEN)).into_response()
}

async fn signup(Json(_body): Json<SignupRequest>) -> Response {
    Json(AuthToken::new(TOKEN)).into_response()
}

async fn list_projects(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let projects = state.projects.lock().unwrap().clone();
    Json(projects).into_response()
}

async fn create_project(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<NewProject>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let id = state.next_id.fetch_add(1, Ordering::SeqCst);
    let project = Project {
        id: ProjectId::from(format!("p{}", id)),
        name: body.name,
        description: body.description,
    };
    state.projects.lock().unwrap().push(project.clone());
    Json(project).into_response()
}

async fn list_tasks(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(project_id): UrlPath<String>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if state.fail_fetch.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "task store unavailable").into_response();
    }
    let tasks: Vec<Task> = state
        .tasks
        .lock()
        .unwrap()
        .iter()
        .filter(|t| t.project_id.as_ref().is_some_and(|p| p.as_str() == project_id))
        .cloned()
        .collect();
    Json(tasks).into_response()
}

async fn create_task(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<NewTask>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let id = state.next_id.fetch_add(1, Ordering::SeqCst);
    let mut task = Task::new(format!("t{}", id).as_str(), body.title, Default::default());
    task.description = body.description;
    task.project_id = Some(body.project_id);
    state.tasks.lock().unwrap().push(task.clone());
    broadcast(&state, &ServerFrame::TaskCreated { task: task.clone() });
    Json(task).into_response()
}

async fn update_status(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(task_id): UrlPath<String>,
    Json(body): Json<StatusUpdate>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if state.fail_status.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "status store unavailable").into_response();
    }
    let updated = {
        let mut tasks = state.tasks.lock().unwrap();
        tasks.iter_mut().find(|t| t.id.as_str() == task_id).map(|t| {
            t.status = body.status;
            t.clone()
        })
    };
    match updated {
        Some(task) => {
            broadcast(&state, &ServerFrame::TaskUpdated { task: task.clone() });
            Json(task).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn add_comment(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(task_id): UrlPath<String>,
    Json(body): Json<CommentUpdate>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut tasks = state.tasks.lock().unwrap();
    match tasks.iter_mut().find(|t| t.id.as_str() == task_id) {
        Some(task) => {
            task.comment = Some(body.comment);
            Json(task.clone()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn task_detail(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(task_id): UrlPath<String>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let task_id = TaskId::from(task_id);
    let task = state
        .tasks
        .lock()
        .unwrap()
        .iter()
        .find(|t| t.id == task_id)
        .cloned();
    match task {
        Some(task) => Json(task).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ── Push endpoint ────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Shared>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Shared) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.push.subscribe();
    let mut current: Option<ProjectId> = None;

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok((project, json)) => {
                        if current.as_ref() != Some(&project) {
                            continue;
                        }
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(text.as_str()) {
                            Ok(ClientFrame::JoinProject { project_id }) => {
                                state.joined.lock().unwrap().push(project_id.clone());
                                current = Some(project_id);
                            }
                            Ok(ClientFrame::LeaveProject { project_id }) => {
                                if current.as_ref() == Some(&project_id) {
                                    current = None;
                                }
                                {
                                    let mut joined = state.joined.lock().unwrap();
                                    if let Some(pos) = joined.iter().position(|p| p == &project_id) {
                                        joined.remove(pos);
                                    }
                                }
                                let in_flight: Vec<String> =
                                    state.after_leave.lock().unwrap().drain(..).collect();
                                for json in in_flight {
                                    if sender.send(Message::Text(json.into())).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Err(_) => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}
