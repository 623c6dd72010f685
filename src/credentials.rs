//! Login token persistence.
//!
//! The token is stored as a single line in a file readable only by the
//! owner. A token passed on the command line or through `TASKBOARD_TOKEN`
//! wins over the stored one.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use taskboard_common::AuthToken;
use tracing::{debug, warn};

use crate::config::ClientConfig;

#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store at the configured (or default) token path.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let path = config
            .token_path()
            .context("Could not determine a location for the token file")?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored token. A missing or blank file means no token.
    pub fn load(&self) -> Result<Option<AuthToken>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| AuthToken::new(token)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }

    pub fn save(&self, token: &AuthToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, token.as_str())
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to chmod {}", self.path.display()))?;
        }
        debug!(path = %self.path.display(), "Stored login token");
        Ok(())
    }

    /// Remove the stored token. Returns false if there was none.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

/// Pick the token to use: explicit (flag or environment) first, then the
/// stored one. An unreadable token file is logged and treated as absent.
pub fn resolve_token(config: &ClientConfig) -> Option<AuthToken> {
    if let Some(token) = config.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return Some(AuthToken::new(token));
    }
    let store = TokenStore::from_config(config).ok()?;
    match store.load() {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable token file");
            None
        }
    }
}
