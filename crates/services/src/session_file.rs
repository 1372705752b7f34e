//! Cross-process session handoff.
//!
//! The launcher writes this small record on successful login and removes it
//! on logout; module processes read `user_id` from it to know which identity
//! to operate on. Writes go through a temporary sibling plus an atomic
//! rename, so a concurrent reader sees either the old record or the new one,
//! never a torn file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use drill_core::model::UserId;

use crate::error::SessionFileError;

/// Identity record shared with the surrounding launcher/viewer processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandoff {
    pub user_id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub login_time: DateTime<Utc>,
}

/// Single-writer, single-reader scoped handle on the handoff file.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the handoff with replace-on-write semantics.
    ///
    /// # Errors
    ///
    /// Returns `SessionFileError` on serialization or filesystem failure.
    pub fn save(&self, handoff: &SessionHandoff) -> Result<(), SessionFileError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(handoff)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Read the current handoff.
    ///
    /// # Errors
    ///
    /// Returns `SessionFileError::NotFound` when no session is active, or
    /// other `SessionFileError` values on filesystem/parse failure.
    pub fn load(&self) -> Result<SessionHandoff, SessionFileError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionFileError::NotFound);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    /// Remove the handoff on logout. Missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `SessionFileError` on filesystem failure.
    pub fn clear(&self) -> Result<(), SessionFileError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
