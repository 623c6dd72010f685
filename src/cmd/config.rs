//! Configuration view and validation commands: `taskboard config`.

use anyhow::{Context, Result};
use taskboard::ClientConfig;
use taskboard::credentials::resolve_token;

use super::effective_config;
use crate::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => ClientConfig::default_path(),
    };

    match command {
        None | Some(ConfigCommands::Show) => {
            let config = effective_config(cli)?;

            println!();
            println!("Taskboard Configuration");
            println!("=======================");
            println!();
            match &config_path {
                Some(path) if path.exists() => println!("Config file: {}", path.display()),
                Some(path) => println!("Config file: {} (not found, using defaults)", path.display()),
                None => println!("Config file: (none)"),
            }
            println!();

            println!("[server]");
            println!("  api_url = \"{}\"", config.server.api_url);
            println!("  push_url = \"{}\"", config.push_url());
            println!("  request_timeout_secs = {}", config.server.request_timeout_secs);
            println!();

            println!("[endpoints]");
            println!("  tasks = \"{}\"", config.endpoints.tasks);
            println!("  create_task = \"{}\"", config.endpoints.create_task);
            println!("  task_status = \"{}\"", config.endpoints.task_status);
            println!("  task_comments = \"{}\"", config.endpoints.task_comments);
            println!("  task_detail = \"{}\"", config.endpoints.task_detail);
            println!("  login = \"{}\"", config.endpoints.login);
            println!("  signup = \"{}\"", config.endpoints.signup);
            println!("  projects = \"{}\"", config.endpoints.projects);
            println!();

            println!("[board]");
            println!("  statuses = {:?}", config.board.statuses);
            println!("  fetch_timeout_secs = {}", config.board.fetch_timeout_secs);
            println!();

            let token_path = config
                .token_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(unknown)".to_string());
            let logged_in = if resolve_token(&config).is_some() { "yes" } else { "no" };
            println!("Token file: {}", token_path);
            println!("Authenticated: {}", logged_in);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let config = effective_config(cli)?;
            let problems = config.validate();
            if problems.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration problems:");
                for problem in &problems {
                    println!("  - {}", problem);
                }
                println!();
                anyhow::bail!("{} configuration problem(s) found", problems.len());
            }
            println!();
        }
        Some(ConfigCommands::Init { force }) => {
            let path = config_path.context("Could not determine a config file location")?;
            if path.exists() && !force {
                println!("Config already exists at {}", path.display());
                println!("Pass --force to overwrite it.");
                return Ok(());
            }

            ClientConfig::default().save(&path)?;

            println!("Created config at {}", path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] api_url, push_url, request_timeout_secs");
            println!("  - [endpoints] REST path templates");
            println!("  - [board] statuses, fetch_timeout_secs");
            println!();
        }
    }

    Ok(())
}
