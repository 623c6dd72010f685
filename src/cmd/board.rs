//! Live board: `taskboard board <project_id>`.
//!
//! Redraws the columns on every board update and reads edit commands from
//! stdin until `quit` or end of input.

use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use taskboard::credentials::resolve_token;
use taskboard::{BoardCommand, BoardEvent, BoardSession, HttpApi, WsPushChannel};
use taskboard_common::{ProjectId, TaskId, TaskStatus};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use super::load_config;
use super::tasks::print_board;
use crate::Cli;

const HELP: &str = "\
Commands:
  move <task> <status>       change a task's status
  add <title> [| description] create a task
  comment <task> <text>      comment on a task
  open <project>             switch to another project
  refresh                    reload the current project
  help                       show this help
  quit                       leave the board";

#[derive(Debug, PartialEq)]
enum Input {
    Command(BoardCommand),
    Help,
    Quit,
}

fn parse_input(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let input = match verb {
        "move" | "mv" => {
            let (task, status) = rest
                .split_once(char::is_whitespace)
                .ok_or("usage: move <task> <status>")?;
            let status: TaskStatus = status.trim().parse()?;
            Input::Command(BoardCommand::SetStatus {
                task_id: TaskId::from(task),
                status,
            })
        }
        "add" => {
            let (title, description) = match rest.split_once('|') {
                Some((title, description)) => (title.trim(), description.trim()),
                None => (rest, ""),
            };
            if title.is_empty() {
                return Err("usage: add <title> [| description]".to_string());
            }
            Input::Command(BoardCommand::AddTask {
                title: title.to_string(),
                description: description.to_string(),
            })
        }
        "comment" => {
            let (task, text) = rest
                .split_once(char::is_whitespace)
                .ok_or("usage: comment <task> <text>")?;
            Input::Command(BoardCommand::Comment {
                task_id: TaskId::from(task),
                comment: text.trim().to_string(),
            })
        }
        "open" if !rest.is_empty() => Input::Command(BoardCommand::Open(ProjectId::from(rest))),
        "open" => return Err("usage: open <project>".to_string()),
        "refresh" | "r" => Input::Command(BoardCommand::Refresh),
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => return Err(format!("unknown command '{}' (try 'help')", other)),
    };
    Ok(Some(input))
}

fn show_event(event: BoardEvent, statuses: &[TaskStatus]) {
    match event {
        BoardEvent::Updated { project_id, tasks } => print_board(&project_id, &tasks, statuses),
        BoardEvent::Loaded { .. } => {}
        BoardEvent::Closed => println!("{}", style("Board closed.").dim()),
        BoardEvent::Failed(e) => eprintln!("{} {}", style("Error:").red().bold(), e),
    }
}

/// Print events until the first fetch has been applied or has failed, so
/// commands typed ahead act on the loaded board.
async fn show_initial_load(events: &mut UnboundedReceiver<BoardEvent>, statuses: &[TaskStatus]) {
    while let Some(event) = events.recv().await {
        let done = matches!(event, BoardEvent::Loaded { .. } | BoardEvent::Failed(_));
        show_event(event, statuses);
        if done {
            return;
        }
    }
}

pub async fn cmd_board(cli: &Cli, project_id: &str) -> Result<()> {
    let config = load_config(cli)?;
    let token = resolve_token(&config);
    let api = Arc::new(HttpApi::new(&config, token.clone())?);
    let push_url = config.push_url();
    let push = WsPushChannel::connect(&push_url, token.as_ref())
        .await
        .with_context(|| format!("Failed to connect to push channel at {}", push_url))?;
    let statuses = config.statuses();

    let (handle, mut events, session) = BoardSession::start(api, push, config.fetch_timeout());
    handle.open(ProjectId::from(project_id)).await?;
    show_initial_load(&mut events, &statuses).await;
    println!("{}", style("Type 'help' for commands.").dim());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => show_event(event, &statuses),
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match parse_input(&line) {
                    Ok(Some(Input::Command(command))) => handle.send(command).await?,
                    Ok(Some(Input::Help)) => println!("{}", HELP),
                    Ok(Some(Input::Quit)) => break,
                    Ok(None) => {}
                    Err(message) => eprintln!("{} {}", style("⚠").yellow(), message),
                }
            }
        }
    }

    // The session may already be gone if the event stream ended.
    let _ = handle.shutdown().await;
    // Show the outcome of writes still settling; the stream ends with the session.
    while let Some(event) = events.recv().await {
        show_event(event, &statuses);
    }
    session.await.context("Board session panicked")?;
    Ok(())
}
