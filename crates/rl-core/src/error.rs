use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("file not found: {path}")]
    FileNotFound { path: String },
    #[error("comment not found: {id}")]
    CommentNotFound { id: u32 },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("repo not found")]
    RepoNotFound,
    #[error("no reviewable files found")]
    NoFiles,
    #[error("read failed for {path}: {reason}")]
    ReadFailed { path: String, reason: String },
    #[error("ref not found: {name}")]
    RefNotFound { name: String },
    #[error("diff failed: {reason}")]
    DiffFailed { reason: String },
    #[error("backend error: {reason}")]
    BackendError { reason: String },
}

impl From<rl_vcs::backend::VcsError> for SourceError {
    fn from(value: rl_vcs::backend::VcsError) -> Self {
        match value {
            rl_vcs::backend::VcsError::RepoNotFound => Self::RepoNotFound,
            rl_vcs::backend::VcsError::RefNotFound { name } => Self::RefNotFound { name },
            rl_vcs::backend::VcsError::DiffFailed { reason } => Self::DiffFailed { reason },
            rl_vcs::backend::VcsError::CommandFailed { args, reason } => Self::BackendError {
                reason: format!("git {args}: {reason}"),
            },
            rl_vcs::backend::VcsError::BackendError { reason } => Self::BackendError { reason },
        }
    }
}

#[derive(Debug, Error)]
pub enum RedlineError {
    #[error(transparent)]
    Comment(#[from] CommentError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl From<rl_vcs::backend::VcsError> for RedlineError {
    fn from(value: rl_vcs::backend::VcsError) -> Self {
        RedlineError::Source(SourceError::from(value))
    }
}
