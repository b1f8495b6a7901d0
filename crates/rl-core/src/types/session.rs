use crate::types::comment::Comment;
use crate::types::enums::{FileStatus, FileType, SessionMode};
use crate::types::vcs::{DiffEntry, DiffHunk};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionSnapshot {
    pub mode: SessionMode,
    pub branch: String,
    pub base_ref: String,
    pub review_round: u32,
    pub pending_edits: u32,
    pub last_round_edits: u32,
    pub share_url: Option<String>,
    pub files: Vec<FileSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileSummary {
    pub path: String,
    pub status: FileStatus,
    pub file_type: FileType,
    pub comment_count: usize,
    pub additions: usize,
    pub deletions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileView {
    pub path: String,
    pub status: FileStatus,
    pub file_type: FileType,
    pub content: String,
    pub content_hash: String,
    pub comments: Vec<Comment>,
    pub diff_hunks: Vec<DiffHunk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PreviousRound {
    pub path: String,
    pub content: Option<String>,
    pub comments: Vec<Comment>,
    pub line_diff: Vec<DiffEntry>,
    /// `line_diff` grouped into hunks with surrounding context.
    pub round_hunks: Vec<DiffHunk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoundSummary {
    pub review_round: u32,
    pub last_round_edits: u32,
    pub resolved: usize,
    pub open: usize,
    pub carried_forward: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FinishSummary {
    pub comment_count: usize,
    #[schema(value_type = String)]
    pub state_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShareInput {
    pub share_url: String,
    pub delete_token: String,
}
