//! Persistent session storage: the auth token and the user record it
//! authenticates, stored together in one file under the platform data dir.
//!
//! The store fails open: if the file is missing, unreadable, or corrupt,
//! `load` returns an empty session and the app proceeds logged out. Nothing
//! in here retries or errors the caller into a crash on read.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::types::User;

/// The pairing of an auth token and the user record it authenticates.
///
/// Invariant: `token` and `user` are set and cleared together. A persisted
/// file that violates this (e.g. truncated by a crash) is treated as no
/// session at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
  pub token: Option<String>,
  pub user: Option<User>,
}

impl Session {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn authenticated(token: String, user: User) -> Self {
    Self {
      token: Some(token),
      user: Some(user),
    }
  }

  pub fn is_authenticated(&self) -> bool {
    self.token.is_some() && self.user.is_some()
  }
}

/// File-backed session store.
#[derive(Debug, Clone)]
pub struct SessionStore {
  path: PathBuf,
}

impl SessionStore {
  /// Create a store at the default location
  /// (`$XDG_DATA_HOME/kitdex/session.json` or platform equivalent).
  pub fn open() -> Result<Self> {
    Ok(Self {
      path: Self::default_path()?,
    })
  }

  /// Create a store at an explicit path.
  pub fn at_path(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("kitdex").join("session.json"))
  }

  /// Read the persisted session. Any failure yields an empty session.
  pub fn load(&self) -> Session {
    let session = std::fs::read_to_string(&self.path)
      .ok()
      .and_then(|contents| serde_json::from_str::<Session>(&contents).ok())
      .unwrap_or_default();

    // A half-written session is no session.
    if session.token.is_some() != session.user.is_some() {
      return Session::empty();
    }

    session
  }

  /// Persist the session. Token and user are written in one atomic rename so
  /// a concurrent `load` observes both or neither.
  pub fn save(&self, session: &Session) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(session)
      .map_err(|e| eyre!("Failed to serialize session: {}", e))?;

    let tmp = self.path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)
      .map_err(|e| eyre!("Failed to write session file {}: {}", tmp.display(), e))?;
    std::fs::rename(&tmp, &self.path)
      .map_err(|e| eyre!("Failed to replace session file: {}", e))?;

    Ok(())
  }

  /// Remove the persisted session. Missing file is fine.
  pub fn clear(&self) {
    let _ = std::fs::remove_file(&self.path);
  }

  /// The current token, if a valid session is persisted.
  pub fn token(&self) -> Option<String> {
    self.load().token
  }

  #[allow(dead_code)]
  pub fn path(&self) -> &Path {
    &self.path
  }
}
