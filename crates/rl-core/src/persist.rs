//! The on-disk review state shared with the agent.
//!
//! The agent reads the whole file, edits resolution fields in place and
//! writes it back; nothing else is negotiated. Content hashes tell us which
//! file version a comment was written against.

use crate::error::PersistError;
use crate::types::{Comment, FileStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewState {
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub base_ref: String,
    pub updated_at: DateTime<Utc>,
    pub review_round: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_token: Option<String>,
    #[serde(default)]
    pub files: BTreeMap<String, PersistedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedFile {
    pub status: FileStatus,
    pub file_hash: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl ReviewState {
    /// Nothing worth keeping on disk.
    pub fn is_empty(&self) -> bool {
        self.share_url.is_none()
            && self.delete_token.is_none()
            && self.files.values().all(|file| file.comments.is_empty())
    }

    pub fn comment_count(&self) -> usize {
        self.files.values().map(|file| file.comments.len()).sum()
    }

    pub fn comments_for(&self, path: &str) -> Option<&[Comment]> {
        self.files.get(path).map(|file| file.comments.as_slice())
    }
}

/// Returns `Ok(None)` when the file does not exist.
pub fn load(path: &Path) -> Result<Option<ReviewState>, PersistError> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_str(&data)?))
}

/// Writes the state, or removes the file when there is nothing to keep.
pub fn store(path: &Path, state: &ReviewState) -> Result<(), PersistError> {
    if state.is_empty() {
        return remove(path);
    }
    let json = serde_json::to_string_pretty(state)?;
    let tmp = temp_path(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Sibling the state is written to before being renamed into place.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn remove(path: &Path) -> Result<(), PersistError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
