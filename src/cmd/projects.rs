//! Project commands: `taskboard projects`.

use anyhow::{Context, Result};
use console::style;

use super::{api_client, load_config};
use crate::{Cli, ProjectsCommands};

pub async fn cmd_projects(cli: &Cli, command: Option<ProjectsCommands>) -> Result<()> {
    let config = load_config(cli)?;
    let api = api_client(&config)?;

    match command {
        None | Some(ProjectsCommands::List) => {
            let projects = api.list_projects().await.context("Failed to list projects")?;
            if projects.is_empty() {
                println!("No projects. Create one with 'taskboard projects create --name <name>'.");
                return Ok(());
            }
            for project in &projects {
                println!("{}  {}", style(&project.id).dim(), style(&project.name).bold());
                if !project.description.is_empty() {
                    println!("    {}", project.description);
                }
            }
        }
        Some(ProjectsCommands::Create { name, description }) => {
            let project = api
                .create_project(&name, &description)
                .await
                .context("Failed to create project")?;
            println!(
                "{} Created project {} ({})",
                style("✓").green(),
                style(&project.name).bold(),
                project.id
            );
        }
    }

    Ok(())
}
