//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module          | Commands handled                 |
//! |-----------------|----------------------------------|
//! | `auth`          | `Login`, `Signup`, `Logout`      |
//! | `projects`      | `Projects`                       |
//! | `board`         | `Board`                          |
//! | `tasks`         | `Tasks`, `Task`                  |
//! | `config`        | `Config`                         |

pub mod auth;
pub mod board;
pub mod config;
pub mod projects;
pub mod tasks;

pub use auth::{cmd_login, cmd_logout, cmd_signup};
pub use board::cmd_board;
pub use config::cmd_config;
pub use projects::cmd_projects;
pub use tasks::{cmd_task, cmd_tasks};

use anyhow::Result;
use taskboard::ClientConfig;
use taskboard::HttpApi;
use taskboard::credentials::resolve_token;

use crate::Cli;

/// Layer the config file, environment and CLI flags, without validating.
pub fn effective_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::load_or_default(cli.config.as_deref())?;
    config.apply_env();
    if let Some(url) = &cli.api_url {
        config.server.api_url = url.clone();
    }
    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }
    Ok(config)
}

/// Effective configuration, rejected if invalid.
pub fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let config = effective_config(cli)?;
    config.ensure_valid()?;
    Ok(config)
}

/// API client carrying whichever token is in effect.
pub fn api_client(config: &ClientConfig) -> Result<HttpApi> {
    Ok(HttpApi::new(config, resolve_token(config))?)
}
