//! Board session: drives one [`TaskBoardSync`] against the REST API and a
//! push channel.
//!
//! ## Event flow
//!
//! ```text
//!  BoardHandle ──commands──┐
//!                          v
//!  spawned requests ──> select! loop ──> TaskBoardSync ──> BoardEvent
//!                          ^
//!  PushChannel ──deliveries┘
//! ```
//!
//! Everything that touches the collection happens inside the one select
//! loop, one event at a time. Requests run on spawned tasks and report back
//! through a completion channel; they are never aborted. A completion that
//! arrives after its project was closed or replaced is discarded by the
//! sync core's epoch check. `Shutdown` stops taking commands but keeps the
//! loop running until every status, create and comment request has been
//! settled, so its outcome is still published.

use std::sync::Arc;
use std::time::Duration;

use taskboard_common::{NewTask, ProjectId, Task, TaskId, TaskStatus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::TaskApi;
use crate::errors::{ApiError, SyncError};
use crate::push::{PushChannel, PushDelivery};
use crate::sync::{
    AddOutcome, FetchOutcome, PushOutcome, StatusOutcome, StatusTicket, Subscription,
    TaskBoardSync,
};

/// Capacity of the command channel between handles and the session.
const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum BoardCommand {
    Open(ProjectId),
    /// Re-open the current project with a fresh fetch.
    Refresh,
    Close,
    SetStatus { task_id: TaskId, status: TaskStatus },
    AddTask { title: String, description: String },
    Comment { task_id: TaskId, comment: String },
    Shutdown,
}

/// What the session reports back to its view.
#[derive(Debug)]
pub enum BoardEvent {
    /// The collection changed. Carries a snapshot in collection order.
    Updated {
        project_id: ProjectId,
        tasks: Vec<Task>,
    },
    /// The bulk fetch for `project_id` has been applied.
    Loaded { project_id: ProjectId },
    Closed,
    Failed(SyncError),
}

enum Completion {
    Fetched {
        sub: Subscription,
        result: Result<Vec<Task>, ApiError>,
    },
    StatusSettled {
        ticket: StatusTicket,
        result: Result<Task, ApiError>,
    },
    Created {
        sub: Subscription,
        result: Result<Task, ApiError>,
    },
    Commented {
        sub: Subscription,
        task_id: TaskId,
        result: Result<Option<Task>, ApiError>,
    },
}

enum Step {
    Command(BoardCommand),
    Completion(Completion),
    Push(Option<PushDelivery>),
}

/// Cloneable command side of a running session.
#[derive(Clone)]
pub struct BoardHandle {
    commands: mpsc::Sender<BoardCommand>,
}

impl BoardHandle {
    pub async fn send(&self, command: BoardCommand) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SyncError::SessionClosed)
    }

    pub async fn open(&self, project_id: ProjectId) -> Result<(), SyncError> {
        self.send(BoardCommand::Open(project_id)).await
    }

    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.send(BoardCommand::Refresh).await
    }

    pub async fn close(&self) -> Result<(), SyncError> {
        self.send(BoardCommand::Close).await
    }

    pub async fn set_status(&self, task_id: TaskId, status: TaskStatus) -> Result<(), SyncError> {
        self.send(BoardCommand::SetStatus { task_id, status }).await
    }

    pub async fn add_task(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<(), SyncError> {
        self.send(BoardCommand::AddTask {
            title: title.into(),
            description: description.into(),
        })
        .await
    }

    pub async fn comment(&self, task_id: TaskId, comment: impl Into<String>) -> Result<(), SyncError> {
        self.send(BoardCommand::Comment {
            task_id,
            comment: comment.into(),
        })
        .await
    }

    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.send(BoardCommand::Shutdown).await
    }
}

/// Owns the sync state, the API client and the push channel for one view.
pub struct BoardSession<P: PushChannel> {
    sync: TaskBoardSync,
    api: Arc<dyn TaskApi>,
    push: P,
    fetch_timeout: Duration,
    events: mpsc::UnboundedSender<BoardEvent>,
    /// Status, create and comment requests not yet reported back.
    writes_in_flight: usize,
}

impl<P: PushChannel + 'static> BoardSession<P> {
    /// Spawn a session. Returns the command handle, the event stream and
    /// the session task, which ends after `shutdown` (or once every handle
    /// is dropped) and the writes already sent have settled.
    pub fn start(
        api: Arc<dyn TaskApi>,
        push: P,
        fetch_timeout: Duration,
    ) -> (
        BoardHandle,
        mpsc::UnboundedReceiver<BoardEvent>,
        JoinHandle<()>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let session = Self {
            sync: TaskBoardSync::new(),
            api,
            push,
            fetch_timeout,
            events: event_tx,
            writes_in_flight: 0,
        };
        let task = tokio::spawn(session.run(command_rx));
        (
            BoardHandle {
                commands: command_tx,
            },
            event_rx,
            task,
        )
    }

    async fn run(mut self, mut commands: mpsc::Receiver<BoardCommand>) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let mut push_open = true;
        let mut stopping = false;

        loop {
            if stopping && self.writes_in_flight == 0 {
                break;
            }
            let step = tokio::select! {
                command = commands.recv(), if !stopping => {
                    Step::Command(command.unwrap_or(BoardCommand::Shutdown))
                }
                Some(done) = done_rx.recv() => Step::Completion(done),
                delivery = self.push.recv(), if push_open => Step::Push(delivery),
            };

            match step {
                Step::Command(BoardCommand::Shutdown) => {
                    if self.writes_in_flight > 0 {
                        debug!(
                            pending = self.writes_in_flight,
                            "Waiting for in-flight writes before stopping"
                        );
                    }
                    stopping = true;
                }
                Step::Command(command) => self.handle_command(command, &done_tx).await,
                Step::Completion(done) => {
                    if !matches!(done, Completion::Fetched { .. }) {
                        self.writes_in_flight -= 1;
                    }
                    self.handle_completion(done);
                }
                Step::Push(Some(delivery)) => self.handle_push(delivery),
                Step::Push(None) => {
                    push_open = false;
                    warn!("Push channel closed; board will no longer receive live updates");
                    self.emit(BoardEvent::Failed(SyncError::PushChannel(
                        "Push channel closed".to_string(),
                    )));
                }
            }
        }
        self.close().await;
        debug!("Board session stopped");
    }

    fn emit(&self, event: BoardEvent) {
        // The view may have gone away; the session keeps running regardless.
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        if let Some(project_id) = self.sync.project_id() {
            self.emit(BoardEvent::Updated {
                project_id: project_id.clone(),
                tasks: self.sync.tasks().to_vec(),
            });
        }
    }

    fn fail(&self, error: SyncError) {
        warn!(error = %error, "Board operation failed");
        self.emit(BoardEvent::Failed(error));
    }

    /// Leave the active subscription, if any. Returns true if one was open.
    async fn close(&mut self) -> bool {
        let Some(old) = self.sync.close() else {
            return false;
        };
        if let Err(e) = self.push.leave(&old).await {
            warn!(project_id = %old.project_id(), error = %e, "Failed to leave project channel");
        }
        true
    }

    async fn open(&mut self, project_id: ProjectId, done: &mpsc::UnboundedSender<Completion>) {
        // Leave before joining so no cross-project events are received.
        self.close().await;
        let sub = self.sync.open(project_id);
        if let Err(e) = self.push.join(&sub).await {
            self.fail(e);
        }
        self.publish();

        let api = Arc::clone(&self.api);
        let done = done.clone();
        let timeout = self.fetch_timeout;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, api.fetch_tasks(sub.project_id())).await
            {
                Ok(result) => result,
                Err(_) => Err(ApiError::Timeout(timeout)),
            };
            let _ = done.send(Completion::Fetched { sub, result });
        });
    }

    async fn handle_command(&mut self, command: BoardCommand, done: &mpsc::UnboundedSender<Completion>) {
        match command {
            BoardCommand::Open(project_id) => self.open(project_id, done).await,
            BoardCommand::Refresh => match self.sync.project_id().cloned() {
                Some(project_id) => self.open(project_id, done).await,
                None => self.fail(SyncError::NotOpen),
            },
            BoardCommand::Close => {
                if self.close().await {
                    self.emit(BoardEvent::Closed);
                }
            }
            BoardCommand::SetStatus { task_id, status } => {
                let Some(ticket) = self.sync.set_status(&task_id, status) else {
                    debug!(task_id = %task_id, "Ignoring status change for task not on the board");
                    return;
                };
                self.publish();

                let api = Arc::clone(&self.api);
                let done = done.clone();
                self.writes_in_flight += 1;
                tokio::spawn(async move {
                    let result = api.update_status(ticket.task_id(), ticket.requested()).await;
                    let _ = done.send(Completion::StatusSettled { ticket, result });
                });
            }
            BoardCommand::AddTask { title, description } => {
                let sub = match self.sync.begin_add_task() {
                    Ok(sub) => sub,
                    Err(e) => return self.fail(e),
                };
                let new_task = NewTask {
                    title,
                    description,
                    project_id: sub.project_id().clone(),
                };
                let api = Arc::clone(&self.api);
                let done = done.clone();
                self.writes_in_flight += 1;
                tokio::spawn(async move {
                    let result = api.create_task(&new_task).await;
                    let _ = done.send(Completion::Created { sub, result });
                });
            }
            BoardCommand::Comment { task_id, comment } => {
                let Some(sub) = self.sync.active().cloned() else {
                    return self.fail(SyncError::NotOpen);
                };
                let api = Arc::clone(&self.api);
                let done = done.clone();
                self.writes_in_flight += 1;
                tokio::spawn(async move {
                    let result = api.add_comment(&task_id, &comment).await;
                    let _ = done.send(Completion::Commented {
                        sub,
                        task_id,
                        result,
                    });
                });
            }
            BoardCommand::Shutdown => {}
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Fetched { sub, result } => match self.sync.commit_fetch(&sub, result) {
                Ok(FetchOutcome::Loaded(_)) => {
                    self.publish();
                    self.emit(BoardEvent::Loaded {
                        project_id: sub.project_id().clone(),
                    });
                }
                Ok(FetchOutcome::Stale) => {}
                Err(e) => self.fail(e),
            },
            Completion::StatusSettled { ticket, result } => {
                match self.sync.resolve_status(ticket, result) {
                    Ok(StatusOutcome::Confirmed) => self.publish(),
                    Ok(StatusOutcome::Missing | StatusOutcome::Stale) => {}
                    Err(e) => {
                        self.publish();
                        self.fail(e);
                    }
                }
            }
            Completion::Created { sub, result } => match self.sync.commit_add_task(&sub, result) {
                Ok(AddOutcome::Appended | AddOutcome::AlreadyPresent) => self.publish(),
                Ok(AddOutcome::Stale) => {}
                Err(e) => self.fail(e),
            },
            Completion::Commented {
                sub,
                task_id,
                result,
            } => match self.sync.commit_comment(&sub, &task_id, result) {
                Ok(true) => self.publish(),
                Ok(false) => {}
                Err(e) => self.fail(e),
            },
        }
    }

    fn handle_push(&mut self, delivery: PushDelivery) {
        if self.sync.apply_push(delivery) == PushOutcome::Applied {
            self.publish();
        }
    }
}
