//! Status columns derived from the task collection.
//!
//! The board view is a projection, recomputed from the collection whenever
//! it is rendered. It is never stored or edited on its own.

use serde::Serialize;
use taskboard_common::{Task, TaskStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnView<'a> {
    pub status: TaskStatus,
    pub tasks: Vec<&'a Task>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardView<'a> {
    pub columns: Vec<ColumnView<'a>>,
}

impl<'a> BoardView<'a> {
    pub fn column(&self, status: &TaskStatus) -> Option<&ColumnView<'a>> {
        self.columns.iter().find(|c| &c.status == status)
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }
}

/// Group tasks into one column per configured status, in configured order.
///
/// Every configured status gets a column, even when empty. Tasks whose
/// status is not configured get extra columns after the configured ones,
/// in the order their status is first seen. Within a column, tasks keep
/// their order from `tasks`.
pub fn partition_by_status<'a, I>(tasks: I, statuses: &[TaskStatus]) -> BoardView<'a>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut columns: Vec<ColumnView<'a>> = statuses
        .iter()
        .map(|status| ColumnView {
            status: status.clone(),
            tasks: Vec::new(),
        })
        .collect();

    for task in tasks {
        match columns.iter_mut().find(|c| c.status == task.status) {
            Some(column) => column.tasks.push(task),
            None => columns.push(ColumnView {
                status: task.status.clone(),
                tasks: vec![task],
            }),
        }
    }

    BoardView { columns }
}
