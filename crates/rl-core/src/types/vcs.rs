use crate::types::enums::{DiffLineKind, DiffOp};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One line of a line-level diff. Line numbers are 1-based; 0 means the
/// line does not exist on that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiffEntry {
    pub op: DiffOp,
    pub old_line: u32,
    pub new_line: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub header: String,
    pub lines: Vec<DiffLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub content: String,
    pub old_num: u32,
    pub new_num: u32,
}
