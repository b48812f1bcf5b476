//! Session token storage.
//!
//! Stores the token pair in `<home>/session.json` with restricted permissions
//! (0600). Tokens are never logged or displayed in full.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use postbridge_types::Session;
use serde::{Deserialize, Serialize};

use crate::config::{paths, write_atomic};

/// On-disk shape: two independently named values.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl SessionFile {
    /// An access token is required; a lone refresh token is no session.
    fn into_session(self) -> Option<Session> {
        self.access_token
            .filter(|t| !t.is_empty())
            .map(|access| Session::new(access, self.refresh_token))
    }
}

/// Process-wide owner of the authentication token pair.
///
/// Writes go to disk first and then replace the in-memory session wholesale,
/// so every holder of the store sees the new value immediately and a failed
/// write leaves the previous session intact.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Opens the store at the default location.
    ///
    /// # Errors
    /// Returns an error if an existing session file cannot be read or parsed.
    pub fn open_default() -> Result<Self> {
        Self::open(paths::session_path())
    }

    /// Opens the store backed by `path`, loading any persisted session.
    ///
    /// # Errors
    /// Returns an error if an existing session file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = load_file(&path)?.into_session();
        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    /// Opens the store at `path`, starting without a session when the file
    /// cannot be read or parsed. The bad file stays until the next write
    /// replaces it or [`SessionStore::clear`] removes it.
    pub fn open_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match load_file(&path) {
            Ok(file) => file.into_session(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
                None
            }
        };
        Self {
            path,
            current: RwLock::new(current),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persists a new session, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if the session file cannot be written.
    pub fn set_session(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        let file = SessionFile {
            access_token: Some(access_token.to_string()),
            refresh_token: refresh_token.map(str::to_string),
        };
        save_file(&self.path, &file)?;

        let session = Session::new(access_token, refresh_token.map(str::to_string));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        tracing::info!(path = %self.path.display(), "session stored");
        Ok(())
    }

    /// Returns the current session, if any.
    pub fn session(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.session().map(|s| s.access_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.session().and_then(|s| s.refresh_token)
    }

    /// Removes both tokens. Returns true if a session was present.
    ///
    /// # Errors
    /// Returns an error if the session file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to remove {}", self.path.display()));
            }
        }

        let had_session = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        tracing::info!(had_session, "session cleared");
        Ok(had_session)
    }
}

fn load_file(path: &Path) -> Result<SessionFile> {
    if !path.exists() {
        return Ok(SessionFile::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session from {}", path.display()))?;

    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse session from {}", path.display()))
}

fn save_file(path: &Path, file: &SessionFile) -> Result<()> {
    let contents = serde_json::to_string_pretty(file).context("Failed to serialize session")?;
    write_atomic(path, &contents, true)
}

/// Returns a masked version of a token for display (first 12 chars + ...).
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 16 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(12).collect();
    format!("{prefix}...")
}
