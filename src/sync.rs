//! Client-local task state for one open project.
//!
//! `TaskBoardSync` is a synchronous state machine with no I/O. Requests and
//! push deliveries complete elsewhere and are handed back here as explicit
//! calls carrying the [`Subscription`] or [`StatusTicket`] they were issued
//! under. A completion whose epoch no longer matches the active one is
//! discarded, which is how superseded fetches and late push frames are
//! neutralised without cancelling anything.
//!
//! Conflict policy is last-write-observed-wins: there are no versions to
//! compare, so whichever of a push frame or a request response is applied
//! last determines the task's value.

use std::collections::HashMap;

use taskboard_common::{ProjectId, Task, TaskId, TaskStatus};
use tracing::{debug, info, warn};

use crate::errors::{ApiError, SyncError};
use crate::push::{PushDelivery, PushEvent};

pub type Epoch = u64;

/// Identity of one `open` call: the project and the epoch it was opened at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    project_id: ProjectId,
    epoch: Epoch,
}

impl Subscription {
    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }
}

#[derive(Debug, Clone)]
struct Slot {
    task: Task,
    revision: u64,
}

/// Ordered working set of tasks for one project, in arrival order.
///
/// Holds at most one task per identifier. Every write stamps the slot with a
/// fresh revision so a pending rollback can tell whether it is still the
/// latest write to that task.
#[derive(Debug, Clone, Default)]
pub struct TaskCollection {
    slots: Vec<Slot>,
    index: HashMap<TaskId, usize>,
    clock: u64,
}

impl TaskCollection {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.slots[i].task)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.slots.iter().map(|slot| &slot.task)
    }

    pub fn to_vec(&self) -> Vec<Task> {
        self.iter().cloned().collect()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    /// Replace the task with the same id in place, or append it.
    /// Returns true when the task was appended.
    fn upsert(&mut self, task: Task) -> bool {
        let revision = self.tick();
        match self.index.get(&task.id) {
            Some(&i) => {
                self.slots[i] = Slot { task, revision };
                false
            }
            None => {
                self.index.insert(task.id.clone(), self.slots.len());
                self.slots.push(Slot { task, revision });
                true
            }
        }
    }

    /// Replace an existing task in place. Absent ids are left alone.
    fn replace(&mut self, task: Task) -> bool {
        let Some(&i) = self.index.get(&task.id) else {
            return false;
        };
        let revision = self.tick();
        self.slots[i] = Slot { task, revision };
        true
    }

    /// Set a task's status, returning the status it held before and the
    /// revision stamped by this write.
    fn set_status(&mut self, id: &TaskId, status: TaskStatus) -> Option<(TaskStatus, u64)> {
        let &i = self.index.get(id)?;
        let revision = self.tick();
        let slot = &mut self.slots[i];
        let previous = std::mem::replace(&mut slot.task.status, status);
        slot.revision = revision;
        Some((previous, revision))
    }

    fn revision(&self, id: &TaskId) -> Option<u64> {
        self.index.get(id).map(|&i| self.slots[i].revision)
    }
}

/// Pending speculative status change, resolved by [`TaskBoardSync::resolve_status`].
#[derive(Debug)]
pub struct StatusTicket {
    epoch: Epoch,
    task_id: TaskId,
    previous: TaskStatus,
    requested: TaskStatus,
    revision: u64,
}

impl StatusTicket {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn requested(&self) -> &TaskStatus {
        &self.requested
    }

    /// Status the task held immediately before the speculative write.
    pub fn previous(&self) -> &TaskStatus {
        &self.previous
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The collection was replaced with this many tasks.
    Loaded(usize),
    /// The fetch belonged to a closed or superseded subscription.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    /// The task now holds exactly the server's value.
    Confirmed,
    /// The task left the collection before the response arrived.
    Missing,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Appended,
    /// A push frame for the same task arrived first; it was replaced in place.
    AlreadyPresent,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Applied,
    /// Valid for the active subscription but nothing to do (unknown id on
    /// update, known id on create).
    Ignored,
    /// Belongs to a closed subscription or to another project.
    Stale,
}

/// Owns the task collection for at most one open project.
#[derive(Debug, Default)]
pub struct TaskBoardSync {
    active: Option<Subscription>,
    tasks: TaskCollection,
    next_epoch: Epoch,
}

impl TaskBoardSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&Subscription> {
        self.active.as_ref()
    }

    pub fn project_id(&self) -> Option<&ProjectId> {
        self.active.as_ref().map(Subscription::project_id)
    }

    pub fn tasks(&self) -> &TaskCollection {
        &self.tasks
    }

    fn is_current(&self, epoch: Epoch) -> bool {
        self.active.as_ref().is_some_and(|sub| sub.epoch == epoch)
    }

    /// Start a fresh view of `project_id`. Clears the collection and
    /// supersedes every outstanding request and subscription.
    pub fn open(&mut self, project_id: ProjectId) -> Subscription {
        self.next_epoch += 1;
        self.tasks.clear();
        let sub = Subscription {
            project_id,
            epoch: self.next_epoch,
        };
        info!(project_id = %sub.project_id, epoch = sub.epoch, "Opened board");
        self.active = Some(sub.clone());
        sub
    }

    /// Deactivate the current project. Returns the subscription to leave.
    pub fn close(&mut self) -> Option<Subscription> {
        let sub = self.active.take()?;
        self.tasks.clear();
        info!(project_id = %sub.project_id, epoch = sub.epoch, "Closed board");
        Some(sub)
    }

    /// Apply the bulk fetch issued by `open`.
    pub fn commit_fetch(
        &mut self,
        sub: &Subscription,
        result: Result<Vec<Task>, ApiError>,
    ) -> Result<FetchOutcome, SyncError> {
        if !self.is_current(sub.epoch) {
            debug!(project_id = %sub.project_id, epoch = sub.epoch, "Discarding stale fetch");
            return Ok(FetchOutcome::Stale);
        }
        match result {
            Ok(fetched) => {
                self.tasks.clear();
                for task in fetched {
                    self.tasks.upsert(task);
                }
                debug!(project_id = %sub.project_id, count = self.tasks.len(), "Loaded tasks");
                Ok(FetchOutcome::Loaded(self.tasks.len()))
            }
            Err(source) => {
                self.tasks.clear();
                Err(SyncError::FetchFailed {
                    project_id: sub.project_id.clone(),
                    source,
                })
            }
        }
    }

    /// Speculatively move a task to `status`. Returns `None` when no project
    /// is open or the task is not in the collection; no request should be
    /// issued in that case.
    pub fn set_status(&mut self, task_id: &TaskId, status: TaskStatus) -> Option<StatusTicket> {
        let epoch = self.active.as_ref()?.epoch;
        let Some((previous, revision)) = self.tasks.set_status(task_id, status.clone()) else {
            debug!(task_id = %task_id, "Status change for unknown task ignored");
            return None;
        };
        Some(StatusTicket {
            epoch,
            task_id: task_id.clone(),
            previous,
            requested: status,
            revision,
        })
    }

    /// Settle a speculative status change with the server's answer.
    ///
    /// On failure the task reverts to the status captured by `set_status`,
    /// unless another write to the same task has landed since; in that case
    /// the later write stands and `rolled_back` is false.
    pub fn resolve_status(
        &mut self,
        ticket: StatusTicket,
        result: Result<Task, ApiError>,
    ) -> Result<StatusOutcome, SyncError> {
        if !self.is_current(ticket.epoch) {
            debug!(task_id = %ticket.task_id, "Discarding stale status response");
            return Ok(StatusOutcome::Stale);
        }
        match result {
            Ok(mut task) => {
                if task.id != ticket.task_id {
                    warn!(
                        requested = %ticket.task_id,
                        returned = %task.id,
                        "Status response carried a different task id"
                    );
                    task.id = ticket.task_id.clone();
                }
                if self.tasks.replace(task) {
                    Ok(StatusOutcome::Confirmed)
                } else {
                    Ok(StatusOutcome::Missing)
                }
            }
            Err(source) => {
                let latest = self.tasks.revision(&ticket.task_id) == Some(ticket.revision);
                if latest {
                    self.tasks.set_status(&ticket.task_id, ticket.previous.clone());
                }
                warn!(
                    task_id = %ticket.task_id,
                    status = %ticket.requested,
                    rolled_back = latest,
                    error = %source,
                    "Status update failed"
                );
                Err(SyncError::StatusUpdateFailed {
                    task_id: ticket.task_id,
                    status: ticket.requested,
                    rolled_back: latest,
                    source,
                })
            }
        }
    }

    /// Subscription to tag a create request with. There is no speculative
    /// insert; the task appears when the server answers.
    pub fn begin_add_task(&self) -> Result<Subscription, SyncError> {
        self.active.clone().ok_or(SyncError::NotOpen)
    }

    pub fn commit_add_task(
        &mut self,
        sub: &Subscription,
        result: Result<Task, ApiError>,
    ) -> Result<AddOutcome, SyncError> {
        if !self.is_current(sub.epoch) {
            debug!(project_id = %sub.project_id, "Discarding stale create response");
            return Ok(AddOutcome::Stale);
        }
        match result {
            Ok(task) => {
                if self.tasks.upsert(task) {
                    Ok(AddOutcome::Appended)
                } else {
                    Ok(AddOutcome::AlreadyPresent)
                }
            }
            Err(source) => Err(SyncError::CreateFailed {
                project_id: sub.project_id.clone(),
                source,
            }),
        }
    }

    /// Settle a comment request. The acknowledgement has no fixed shape; when
    /// it is a task for the same id it is applied like a push update.
    pub fn commit_comment(
        &mut self,
        sub: &Subscription,
        task_id: &TaskId,
        result: Result<Option<Task>, ApiError>,
    ) -> Result<bool, SyncError> {
        if !self.is_current(sub.epoch) {
            return Ok(false);
        }
        match result {
            Ok(Some(task)) if &task.id == task_id => Ok(self.tasks.replace(task)),
            Ok(_) => Ok(false),
            Err(source) => Err(SyncError::CommentFailed {
                task_id: task_id.clone(),
                source,
            }),
        }
    }

    /// A pushed update replaces the task in place. Tasks outside the loaded
    /// set are not inserted.
    pub fn on_push_update(&mut self, task: Task) -> bool {
        self.tasks.replace(task)
    }

    /// A pushed creation appends the task unless it is already present
    /// (duplicate delivery, or our own create answered first).
    pub fn on_push_create(&mut self, task: Task) -> bool {
        if self.tasks.contains(&task.id) {
            return false;
        }
        self.tasks.upsert(task)
    }

    /// Route a push delivery, dropping it if its subscription is no longer
    /// the active one or if the task names a different project.
    pub fn apply_push(&mut self, delivery: PushDelivery) -> PushOutcome {
        if !self.is_current(delivery.subscription.epoch) {
            debug!(
                project_id = %delivery.subscription.project_id,
                epoch = delivery.subscription.epoch,
                "Dropping push delivery for inactive subscription"
            );
            return PushOutcome::Stale;
        }
        let task = match &delivery.event {
            PushEvent::Updated(task) | PushEvent::Created(task) => task,
        };
        // A frame written before the server saw our leave can arrive tagged
        // with the next subscription.
        if let Some(owner) = &task.project_id
            && owner != &delivery.subscription.project_id
        {
            debug!(
                task_id = %task.id,
                task_project = %owner,
                project_id = %delivery.subscription.project_id,
                "Dropping push delivery for another project"
            );
            return PushOutcome::Stale;
        }
        let applied = match delivery.event {
            PushEvent::Updated(task) => self.on_push_update(task),
            PushEvent::Created(task) => self.on_push_create(task),
        };
        if applied {
            PushOutcome::Applied
        } else {
            PushOutcome::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, status: &str) -> Task {
        Task::new(id, format!("task {}", id), TaskStatus::new(status))
    }

    fn server_error() -> ApiError {
        ApiError::Status {
            url: "http://localhost/tasks".to_string(),
            status: 500,
            body: "internal".to_string(),
        }
    }

    fn ids(sync: &TaskBoardSync) -> Vec<String> {
        sync.tasks().iter().map(|t| t.id.to_string()).collect()
    }

    fn loaded(project: &str, tasks: Vec<Task>) -> (TaskBoardSync, Subscription) {
        let mut sync = TaskBoardSync::new();
        let sub = sync.open(ProjectId::from(project));
        sync.commit_fetch(&sub, Ok(tasks)).unwrap();
        (sync, sub)
    }

    // ── open / fetch ─────────────────────────────────────────────────

    #[test]
    fn test_fetch_replaces_collection_in_order() {
        let (sync, _) = loaded("p1", vec![task("1", "pending"), task("2", "completed")]);
        assert_eq!(ids(&sync), vec!["1", "2"]);
    }

    #[test]
    fn test_fetch_collapses_duplicate_ids() {
        let (sync, _) = loaded(
            "p1",
            vec![task("1", "pending"), task("2", "pending"), task("1", "completed")],
        );
        assert_eq!(ids(&sync), vec!["1", "2"]);
        assert_eq!(sync.tasks().get(&TaskId::from("1")).unwrap().status, "completed");
    }

    #[test]
    fn test_fetch_failure_leaves_collection_empty_and_surfaces() {
        let mut sync = TaskBoardSync::new();
        let sub = sync.open(ProjectId::from("p1"));
        let err = sync.commit_fetch(&sub, Err(server_error())).unwrap_err();
        assert!(matches!(err, SyncError::FetchFailed { ref project_id, .. } if project_id.as_str() == "p1"));
        assert!(sync.tasks().is_empty());
    }

    #[test]
    fn test_stale_fetch_after_reopen_is_discarded() {
        let mut sync = TaskBoardSync::new();
        let sub_a = sync.open(ProjectId::from("A"));
        let sub_b = sync.open(ProjectId::from("B"));
        sync.commit_fetch(&sub_b, Ok(vec![task("b1", "pending")])).unwrap();

        let outcome = sync.commit_fetch(&sub_a, Ok(vec![task("a1", "pending")])).unwrap();
        assert_eq!(outcome, FetchOutcome::Stale);
        assert_eq!(ids(&sync), vec!["b1"]);
    }

    #[test]
    fn test_stale_fetch_failure_is_not_an_error() {
        let mut sync = TaskBoardSync::new();
        let sub_a = sync.open(ProjectId::from("A"));
        sync.open(ProjectId::from("B"));
        assert_eq!(sync.commit_fetch(&sub_a, Err(server_error())).unwrap(), FetchOutcome::Stale);
    }

    #[test]
    fn test_fetch_after_close_is_discarded() {
        let mut sync = TaskBoardSync::new();
        let sub = sync.open(ProjectId::from("p1"));
        assert_eq!(sync.close(), Some(sub.clone()));
        assert_eq!(sync.commit_fetch(&sub, Ok(vec![task("1", "pending")])).unwrap(), FetchOutcome::Stale);
        assert!(sync.tasks().is_empty());
        assert!(sync.active().is_none());
    }

    #[test]
    fn test_reopening_same_project_gets_new_epoch() {
        let mut sync = TaskBoardSync::new();
        let first = sync.open(ProjectId::from("p1"));
        let second = sync.open(ProjectId::from("p1"));
        assert_ne!(first.epoch(), second.epoch());
        assert_eq!(sync.commit_fetch(&first, Ok(vec![])).unwrap(), FetchOutcome::Stale);
    }

    // ── set_status ───────────────────────────────────────────────────

    #[test]
    fn test_set_status_is_visible_before_response() {
        let (mut sync, _) = loaded("p1", vec![task("1", "pending")]);
        let ticket = sync.set_status(&TaskId::from("1"), TaskStatus::completed()).unwrap();
        assert_eq!(ticket.previous(), &TaskStatus::pending());
        assert_eq!(sync.tasks().get(&TaskId::from("1")).unwrap().status, "completed");
    }

    #[test]
    fn test_set_status_failure_rolls_back_to_previous() {
        let (mut sync, _) = loaded("p1", vec![task("1", "pending")]);
        let ticket = sync.set_status(&TaskId::from("1"), TaskStatus::completed()).unwrap();
        let err = sync.resolve_status(ticket, Err(server_error())).unwrap_err();
        assert!(matches!(err, SyncError::StatusUpdateFailed { rolled_back: true, .. }));
        assert_eq!(sync.tasks().get(&TaskId::from("1")).unwrap().status, "pending");
    }

    #[test]
    fn test_rollback_is_exact_when_other_tasks_change() {
        let (mut sync, _) = loaded(
            "p1",
            vec![task("1", "in_progress"), task("2", "pending")],
        );
        let ticket = sync.set_status(&TaskId::from("1"), TaskStatus::completed()).unwrap();
        let other = sync.set_status(&TaskId::from("2"), TaskStatus::completed()).unwrap();
        sync.on_push_create(task("3", "pending"));

        sync.resolve_status(ticket, Err(server_error())).unwrap_err();
        assert_eq!(sync.tasks().get(&TaskId::from("1")).unwrap().status, "in_progress");
        assert_eq!(sync.tasks().get(&TaskId::from("2")).unwrap().status, "completed");
        assert_eq!(other.previous(), &TaskStatus::pending());
    }

    #[test]
    fn test_rollback_skipped_when_push_landed_after_speculation() {
        let (mut sync, _) = loaded("p1", vec![task("1", "pending")]);
        let ticket = sync.set_status(&TaskId::from("1"), TaskStatus::completed()).unwrap();
        sync.on_push_update(task("1", "in_progress"));

        let err = sync.resolve_status(ticket, Err(server_error())).unwrap_err();
        assert!(matches!(err, SyncError::StatusUpdateFailed { rolled_back: false, .. }));
        assert_eq!(sync.tasks().get(&TaskId::from("1")).unwrap().status, "in_progress");
    }

    #[test]
    fn test_set_status_success_takes_server_value() {
        let (mut sync, _) = loaded("p1", vec![task("1", "pending")]);
        let ticket = sync.set_status(&TaskId::from("1"), TaskStatus::in_progress()).unwrap();
        let mut server = task("1", "in_progress");
        server.comment = Some("ok".to_string());

        assert_eq!(sync.resolve_status(ticket, Ok(server.clone())).unwrap(), StatusOutcome::Confirmed);
        assert_eq!(sync.tasks().get(&TaskId::from("1")).unwrap(), &server);
    }

    #[test]
    fn test_set_status_unknown_task_is_noop() {
        let (mut sync, _) = loaded("p1", vec![task("1", "pending")]);
        assert!(sync.set_status(&TaskId::from("404"), TaskStatus::completed()).is_none());
        assert_eq!(sync.tasks().get(&TaskId::from("1")).unwrap().status, "pending");
    }

    #[test]
    fn test_set_status_without_open_project_is_noop() {
        let mut sync = TaskBoardSync::new();
        assert!(sync.set_status(&TaskId::from("1"), TaskStatus::completed()).is_none());
    }

    #[test]
    fn test_status_response_after_reopen_is_stale() {
        let (mut sync, _) = loaded("p1", vec![task("1", "pending")]);
        let ticket = sync.set_status(&TaskId::from("1"), TaskStatus::completed()).unwrap();
        let sub = sync.open(ProjectId::from("p2"));
        sync.commit_fetch(&sub, Ok(vec![task("1", "pending")])).unwrap();

        assert_eq!(sync.resolve_status(ticket, Err(server_error())).unwrap(), StatusOutcome::Stale);
        assert_eq!(sync.tasks().get(&TaskId::from("1")).unwrap().status, "pending");
    }

    // ── add_task ─────────────────────────────────────────────────────

    #[test]
    fn test_add_task_requires_open_project() {
        let sync = TaskBoardSync::new();
        assert!(matches!(sync.begin_add_task(), Err(SyncError::NotOpen)));
    }

    #[test]
    fn test_add_task_appends_server_task() {
        let (mut sync, _) = loaded("p1", vec![task("1", "pending")]);
        let sub = sync.begin_add_task().unwrap();
        let outcome = sync.commit_add_task(&sub, Ok(task("2", "pending"))).unwrap();
        assert_eq!(outcome, AddOutcome::Appended);
        assert_eq!(ids(&sync), vec!["1", "2"]);
    }

    #[test]
    fn test_add_task_then_duplicate_push_create_is_idempotent() {
        let (mut sync, _) = loaded("p1", vec![]);
        let sub = sync.begin_add_task().unwrap();
        sync.commit_add_task(&sub, Ok(task("2", "pending"))).unwrap();
        assert!(!sync.on_push_create(task("2", "pending")));
        assert_eq!(sync.tasks().len(), 1);
    }

    #[test]
    fn test_push_create_before_add_response_does_not_duplicate() {
        let (mut sync, _) = loaded("p1", vec![]);
        let sub = sync.begin_add_task().unwrap();
        sync.on_push_create(task("2", "pending"));
        let outcome = sync.commit_add_task(&sub, Ok(task("2", "pending"))).unwrap();
        assert_eq!(outcome, AddOutcome::AlreadyPresent);
        assert_eq!(sync.tasks().len(), 1);
    }

    #[test]
    fn test_add_task_failure_leaves_collection_unchanged() {
        let (mut sync, _) = loaded("p1", vec![task("1", "pending")]);
        let sub = sync.begin_add_task().unwrap();
        let err = sync.commit_add_task(&sub, Err(server_error())).unwrap_err();
        assert!(matches!(err, SyncError::CreateFailed { .. }));
        assert_eq!(ids(&sync), vec!["1"]);
    }

    // ── push ─────────────────────────────────────────────────────────

    #[test]
    fn test_push_create_into_empty_board() {
        let (mut sync, sub) = loaded("p1", vec![]);
        let mut pushed = task("2", "pending");
        pushed.title = "x".to_string();
        let outcome = sync.apply_push(PushDelivery {
            subscription: sub,
            event: PushEvent::Created(pushed.clone()),
        });
        assert_eq!(outcome, PushOutcome::Applied);
        assert_eq!(sync.tasks().to_vec(), vec![pushed]);
    }

    #[test]
    fn test_push_update_replaces_in_place() {
        let (mut sync, _) = loaded(
            "p1",
            vec![task("1", "pending"), task("2", "pending"), task("3", "pending")],
        );
        assert!(sync.on_push_update(task("2", "completed")));
        assert_eq!(ids(&sync), vec!["1", "2", "3"]);
        assert_eq!(sync.tasks().get(&TaskId::from("2")).unwrap().status, "completed");
    }

    #[test]
    fn test_push_update_for_unknown_task_is_ignored() {
        let (mut sync, sub) = loaded("p1", vec![task("1", "pending")]);
        let outcome = sync.apply_push(PushDelivery {
            subscription: sub,
            event: PushEvent::Updated(task("9", "completed")),
        });
        assert_eq!(outcome, PushOutcome::Ignored);
        assert_eq!(ids(&sync), vec!["1"]);
    }

    #[test]
    fn test_push_from_closed_subscription_is_dropped() {
        let (mut sync, old) = loaded("p1", vec![task("1", "pending")]);
        let new = sync.open(ProjectId::from("p2"));
        sync.commit_fetch(&new, Ok(vec![task("1", "pending")])).unwrap();

        let outcome = sync.apply_push(PushDelivery {
            subscription: old,
            event: PushEvent::Updated(task("1", "completed")),
        });
        assert_eq!(outcome, PushOutcome::Stale);
        assert_eq!(sync.tasks().get(&TaskId::from("1")).unwrap().status, "pending");
    }

    #[test]
    fn test_push_after_close_is_dropped() {
        let (mut sync, sub) = loaded("p1", vec![task("1", "pending")]);
        assert_eq!(sync.close(), Some(sub.clone()));

        for event in [
            PushEvent::Updated(task("1", "completed")),
            PushEvent::Created(task("2", "pending")),
        ] {
            let outcome = sync.apply_push(PushDelivery {
                subscription: sub.clone(),
                event,
            });
            assert_eq!(outcome, PushOutcome::Stale);
        }
        assert!(sync.tasks().is_empty());
        assert!(sync.project_id().is_none());
    }

    #[test]
    fn test_push_for_other_project_is_dropped_under_current_subscription() {
        let mut sync = TaskBoardSync::new();
        let a = sync.open(ProjectId::from("A"));
        sync.close();
        let b = sync.open(ProjectId::from("B"));
        assert_ne!(a, b);
        sync.commit_fetch(&b, Ok(vec![])).unwrap();

        let mut leftover = task("a-task", "pending");
        leftover.project_id = Some(ProjectId::from("A"));
        let outcome = sync.apply_push(PushDelivery {
            subscription: b.clone(),
            event: PushEvent::Created(leftover),
        });
        assert_eq!(outcome, PushOutcome::Stale);
        assert!(sync.tasks().is_empty());

        let mut own = task("b-task", "pending");
        own.project_id = Some(ProjectId::from("B"));
        let outcome = sync.apply_push(PushDelivery {
            subscription: b,
            event: PushEvent::Created(own),
        });
        assert_eq!(outcome, PushOutcome::Applied);
        assert_eq!(ids(&sync), vec!["b-task"]);
    }

    #[test]
    fn test_push_sequences_never_duplicate_ids() {
        let (mut sync, _) = loaded("p1", vec![task("1", "pending")]);
        let events = [
            PushEvent::Created(task("2", "pending")),
            PushEvent::Updated(task("2", "completed")),
            PushEvent::Created(task("2", "pending")),
            PushEvent::Created(task("1", "completed")),
            PushEvent::Updated(task("3", "pending")),
            PushEvent::Created(task("3", "pending")),
            PushEvent::Created(task("3", "pending")),
        ];
        for event in events {
            match event {
                PushEvent::Updated(t) => sync.on_push_update(t),
                PushEvent::Created(t) => sync.on_push_create(t),
            };
        }
        let mut seen = ids(&sync);
        let total = seen.len();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), total);
        assert_eq!(ids(&sync), vec!["1", "2", "3"]);
        assert_eq!(sync.tasks().get(&TaskId::from("2")).unwrap().status, "completed");
    }

    // ── comments ─────────────────────────────────────────────────────

    #[test]
    fn test_comment_ack_with_task_body_is_applied() {
        let (mut sync, sub) = loaded("p1", vec![task("1", "pending")]);
        let mut acked = task("1", "pending");
        acked.comment = Some("looks good".to_string());
        assert!(sync.commit_comment(&sub, &TaskId::from("1"), Ok(Some(acked))).unwrap());
        assert_eq!(
            sync.tasks().get(&TaskId::from("1")).unwrap().comment.as_deref(),
            Some("looks good")
        );
    }

    #[test]
    fn test_comment_ack_without_task_body_changes_nothing() {
        let (mut sync, sub) = loaded("p1", vec![task("1", "pending")]);
        assert!(!sync.commit_comment(&sub, &TaskId::from("1"), Ok(None)).unwrap());
        assert!(!sync
            .commit_comment(&sub, &TaskId::from("1"), Ok(Some(task("2", "done"))))
            .unwrap());
        assert!(sync.tasks().get(&TaskId::from("1")).unwrap().comment.is_none());
    }

    #[test]
    fn test_comment_failure_is_surfaced() {
        let (mut sync, sub) = loaded("p1", vec![task("1", "pending")]);
        let err = sync
            .commit_comment(&sub, &TaskId::from("1"), Err(server_error()))
            .unwrap_err();
        assert!(matches!(err, SyncError::CommentFailed { .. }));
    }
}
