//! One-shot task commands: `taskboard tasks`, `taskboard task`.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use console::style;
use taskboard::view::BoardView;
use taskboard::{TaskApi, partition_by_status};
use taskboard_common::{ProjectId, Task, TaskId, TaskStatus};

use super::{api_client, load_config};
use crate::Cli;

pub async fn cmd_tasks(cli: &Cli, project_id: &str) -> Result<()> {
    let config = load_config(cli)?;
    let api = api_client(&config)?;
    let project_id = ProjectId::from(project_id);

    let tasks = tokio::time::timeout(config.fetch_timeout(), api.fetch_tasks(&project_id))
        .await
        .map_err(|_| taskboard::ApiError::Timeout(config.fetch_timeout()))
        .and_then(|result| result)
        .with_context(|| format!("Failed to load tasks for project {}", project_id))?;

    print_board(&project_id, &tasks, &config.statuses());
    Ok(())
}

pub async fn cmd_task(cli: &Cli, task_id: &str) -> Result<()> {
    let config = load_config(cli)?;
    let api = api_client(&config)?;
    let task = api
        .get_task(&TaskId::from(task_id))
        .await
        .with_context(|| format!("Failed to load task {}", task_id))?;

    println!("{}", style(&task.title).bold());
    println!("  id:          {}", task.id);
    println!("  status:      {}", task.status);
    if let Some(project_id) = &task.project_id {
        println!("  project:     {}", project_id);
    }
    if !task.description.is_empty() {
        println!("  description: {}", task.description);
    }
    if let Some(comment) = &task.comment {
        println!("  comment:     {}", comment);
    }
    if let Some(created) = task.created_at {
        println!("  created:     {}", local_time(created));
    }
    if let Some(updated) = task.updated_at {
        println!("  updated:     {}", local_time(updated));
    }
    let attachments: Vec<&str> = task.attachment_names().collect();
    if !attachments.is_empty() {
        println!("  attachments:");
        for name in attachments {
            println!("    - {}", name);
        }
    }
    Ok(())
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Print tasks as one block per status column.
pub fn print_board(project_id: &ProjectId, tasks: &[Task], statuses: &[TaskStatus]) {
    let view = partition_by_status(tasks, statuses);
    println!();
    println!(
        "{} {} ({} tasks)",
        style("Project").bold().cyan(),
        style(project_id).bold(),
        view.task_count()
    );
    print_columns(&view);
}

fn print_columns(view: &BoardView<'_>) {
    for column in &view.columns {
        println!();
        println!("{} ({})", style(&column.status).bold(), column.tasks.len());
        if column.tasks.is_empty() {
            println!("  {}", style("(empty)").dim());
        }
        for task in &column.tasks {
            println!("  {} {}", style(&task.id).dim(), task.title);
        }
    }
}
