use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Untracked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("repo not found")]
    RepoNotFound,
    #[error("ref not found: {name}")]
    RefNotFound { name: String },
    #[error("command failed: git {args}: {reason}")]
    CommandFailed { args: String, reason: String },
    #[error("diff failed: {reason}")]
    DiffFailed { reason: String },
    #[error("backend error: {reason}")]
    BackendError { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsType {
    Git,
}

/// Read-only view of a working tree, enough to drive a review session.
///
/// `base` is whatever `merge_base` or `"HEAD"` resolved to; implementations
/// pass it through to the underlying tool untouched.
pub trait VcsBackend {
    fn repo_root(path: &Path) -> Result<PathBuf, VcsError>;
    fn current_branch(repo_path: &Path) -> Result<String, VcsError>;
    fn default_branch(repo_path: &Path) -> Result<String, VcsError>;
    fn merge_base(repo_path: &Path, reference: &str) -> Result<String, VcsError>;
    fn changed_files(repo_path: &Path, base: &str) -> Result<Vec<ChangedFile>, VcsError>;
    fn diff_unified(repo_path: &Path, path: &str, base: &str) -> Result<String, VcsError>;
    fn fingerprint(repo_path: &Path) -> Result<String, VcsError>;
}
