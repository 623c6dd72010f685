use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(version, about = "Real-time Kanban task board client")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: ~/.config/taskboard/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// REST API base URL. Overrides the config file and TASKBOARD_API_URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Bearer token. Overrides the stored login and TASKBOARD_TOKEN.
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and store the token
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored token
    Logout,
    /// List or create projects
    Projects {
        #[command(subcommand)]
        command: Option<ProjectsCommands>,
    },
    /// Open a live board for a project
    Board { project_id: String },
    /// Print a project's tasks grouped by status
    Tasks { project_id: String },
    /// Show one task in detail
    Task { task_id: String },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ProjectsCommands {
    /// List projects visible to the current user
    List,
    /// Create a project
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and list any problems
    Validate,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = taskboard::logging::init_tracing(cli.verbose, cli.log_file.as_deref())?;

    match &cli.command {
        Commands::Login { email, password } => cmd::cmd_login(&cli, email, password).await?,
        Commands::Signup {
            name,
            email,
            password,
        } => cmd::cmd_signup(&cli, name, email, password).await?,
        Commands::Logout => cmd::cmd_logout(&cli)?,
        Commands::Projects { command } => cmd::cmd_projects(&cli, command.clone()).await?,
        Commands::Board { project_id } => cmd::cmd_board(&cli, project_id).await?,
        Commands::Tasks { project_id } => cmd::cmd_tasks(&cli, project_id).await?,
        Commands::Task { task_id } => cmd::cmd_task(&cli, task_id).await?,
        Commands::Config { command } => cmd::cmd_config(&cli, command.clone())?,
    }

    Ok(())
}
