//! Account commands: `taskboard login`, `signup`, `logout`.

use anyhow::{Context, Result};
use console::style;
use taskboard::HttpApi;
use taskboard::credentials::TokenStore;
use taskboard_common::AuthToken;

use super::load_config;
use crate::Cli;

pub async fn cmd_login(cli: &Cli, email: &str, password: &str) -> Result<()> {
    let config = load_config(cli)?;
    let api = HttpApi::new(&config, None)?;
    let token = api.login(email, password).await.context("Login failed")?;
    store_token(&TokenStore::from_config(&config)?, &token)?;
    println!("{} Logged in as {}", style("✓").green(), email);
    Ok(())
}

pub async fn cmd_signup(cli: &Cli, name: &str, email: &str, password: &str) -> Result<()> {
    let config = load_config(cli)?;
    let api = HttpApi::new(&config, None)?;
    let token = api
        .signup(name, email, password)
        .await
        .context("Signup failed")?;
    store_token(&TokenStore::from_config(&config)?, &token)?;
    println!("{} Account created for {}", style("✓").green(), email);
    Ok(())
}

pub fn cmd_logout(cli: &Cli) -> Result<()> {
    let config = super::effective_config(cli)?;
    let store = TokenStore::from_config(&config)?;
    if store.clear()? {
        println!("Logged out. Removed {}", store.path().display());
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

fn store_token(store: &TokenStore, token: &AuthToken) -> Result<()> {
    store.save(token)?;
    println!("Token stored at {}", store.path().display());
    Ok(())
}
