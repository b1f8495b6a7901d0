use crate::diff::line_count;
use crate::error::CommentError;
use crate::types::{
    Comment, DiffEntry, DiffHunk, DiffLineKind, DiffSide, FileStatus, FileSummary, FileType,
    FileView, NewComment,
};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Review state for a single file. Owned and mutated only by the session.
#[derive(Debug, Clone)]
pub struct ReviewFile {
    pub path: String,
    pub abs_path: PathBuf,
    pub status: FileStatus,
    pub file_type: FileType,
    pub content: String,
    pub content_hash: String,
    pub comments: Vec<Comment>,
    pub diff_hunks: Vec<DiffHunk>,
    pub previous_content: Option<String>,
    pub previous_comments: Vec<Comment>,
    /// Line diff between `previous_content` and `content`, computed at the
    /// last round transition.
    pub round_diff: Vec<DiffEntry>,
    next_comment_id: u32,
}

impl ReviewFile {
    pub fn new(path: String, abs_path: PathBuf, status: FileStatus, content: String) -> Self {
        let file_type = FileType::from_path(&path);
        let content_hash = content_hash(&content);
        Self {
            path,
            abs_path,
            status,
            file_type,
            content,
            content_hash,
            comments: Vec::new(),
            diff_hunks: Vec::new(),
            previous_content: None,
            previous_comments: Vec::new(),
            round_diff: Vec::new(),
            next_comment_id: 1,
        }
    }

    pub fn line_count(&self) -> u32 {
        line_count(&self.content)
    }

    /// Lines on the old side of the paired view: the base revision implied
    /// by the hunks, or the round-start content, whichever is longer.
    pub fn old_line_count(&self) -> u32 {
        let growth: i64 = self
            .diff_hunks
            .iter()
            .map(|hunk| i64::from(hunk.new_count) - i64::from(hunk.old_count))
            .sum();
        let base = (i64::from(self.line_count()) - growth).max(0);
        let base = u32::try_from(base).unwrap_or(u32::MAX);
        let previous = self.previous_content.as_deref().map_or(0, line_count);
        base.max(previous)
    }

    pub fn set_content(&mut self, content: String, content_hash: String) {
        self.content = content;
        self.content_hash = content_hash;
    }

    /// Copies the live state into the round-start snapshot.
    pub fn snapshot(&mut self) {
        self.previous_content = Some(self.content.clone());
        self.previous_comments = self.comments.clone();
    }

    pub fn add_comment(&mut self, input: NewComment) -> Result<Comment, CommentError> {
        let limit = match input.side {
            Some(DiffSide::Old) => self.old_line_count(),
            _ => self.line_count(),
        };
        validate_range(input.start_line, input.end_line, limit)?;
        if input.body.trim().is_empty() {
            return Err(CommentError::InvalidInput {
                message: "comment body must not be empty".to_string(),
            });
        }
        let now = Utc::now();
        let comment = Comment {
            id: self.issue_id(),
            start_line: input.start_line,
            end_line: input.end_line,
            side: input.side,
            body: input.body,
            created_at: now,
            updated_at: now,
            resolved: false,
            resolution_note: String::new(),
            resolution_lines: Vec::new(),
            carried_forward: false,
        };
        self.comments.push(comment.clone());
        Ok(comment)
    }

    pub fn update_comment(&mut self, id: u32, body: String) -> Result<Comment, CommentError> {
        if body.trim().is_empty() {
            return Err(CommentError::InvalidInput {
                message: "comment body must not be empty".to_string(),
            });
        }
        let comment = self
            .comments
            .iter_mut()
            .find(|comment| comment.id == id)
            .ok_or(CommentError::CommentNotFound { id })?;
        comment.body = body;
        comment.updated_at = Utc::now();
        Ok(comment.clone())
    }

    pub fn delete_comment(&mut self, id: u32) -> Result<(), CommentError> {
        let before = self.comments.len();
        self.comments.retain(|comment| comment.id != id);
        if self.comments.len() == before {
            return Err(CommentError::CommentNotFound { id });
        }
        Ok(())
    }

    /// Replaces all comments and restarts the id counter after them.
    pub fn replace_comments(&mut self, comments: Vec<Comment>) {
        self.next_comment_id = comments.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        self.comments = comments;
    }

    fn issue_id(&mut self) -> u32 {
        let id = self.next_comment_id;
        self.next_comment_id += 1;
        id
    }

    pub fn summary(&self) -> FileSummary {
        let count = |kind| {
            self.diff_hunks
                .iter()
                .flat_map(|hunk| &hunk.lines)
                .filter(|line| line.kind == kind)
                .count()
        };
        FileSummary {
            path: self.path.clone(),
            status: self.status,
            file_type: self.file_type,
            comment_count: self.comments.len(),
            additions: count(DiffLineKind::Add),
            deletions: count(DiffLineKind::Del),
        }
    }

    pub fn view(&self) -> FileView {
        FileView {
            path: self.path.clone(),
            status: self.status,
            file_type: self.file_type,
            content: self.content.clone(),
            content_hash: self.content_hash.clone(),
            comments: self.comments.clone(),
            diff_hunks: self.diff_hunks.clone(),
        }
    }
}

fn validate_range(start_line: u32, end_line: u32, line_count: u32) -> Result<(), CommentError> {
    if start_line < 1 {
        return Err(CommentError::InvalidInput {
            message: "start_line must be >= 1".to_string(),
        });
    }
    if end_line < start_line {
        return Err(CommentError::InvalidInput {
            message: "end_line must be >= start_line".to_string(),
        });
    }
    if end_line > line_count {
        return Err(CommentError::InvalidInput {
            message: format!("end_line {end_line} is past the end of the file ({line_count} lines)"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content: &str) -> ReviewFile {
        ReviewFile::new(
            "docs/plan.md".to_string(),
            PathBuf::from("/repo/docs/plan.md"),
            FileStatus::Modified,
            content.to_string(),
        )
    }

    fn new_comment(start_line: u32, end_line: u32, body: &str) -> NewComment {
        NewComment {
            start_line,
            end_line,
            side: None,
            body: body.to_string(),
        }
    }

    #[test]
    fn ids_are_sequential_per_file() {
        let mut f = file("a\nb\nc");
        assert_eq!(f.add_comment(new_comment(1, 1, "one")).unwrap().id, 1);
        assert_eq!(f.add_comment(new_comment(2, 3, "two")).unwrap().id, 2);
        f.delete_comment(2).unwrap();
        assert_eq!(f.add_comment(new_comment(3, 3, "three")).unwrap().id, 3);
    }

    #[test]
    fn rejects_invalid_ranges_and_bodies() {
        let mut f = file("a\nb");
        assert!(matches!(
            f.add_comment(new_comment(0, 1, "x")),
            Err(CommentError::InvalidInput { .. })
        ));
        assert!(matches!(
            f.add_comment(new_comment(2, 1, "x")),
            Err(CommentError::InvalidInput { .. })
        ));
        assert!(matches!(
            f.add_comment(new_comment(1, 3, "x")),
            Err(CommentError::InvalidInput { .. })
        ));
        assert!(matches!(
            f.add_comment(new_comment(1, 1, "   ")),
            Err(CommentError::InvalidInput { .. })
        ));
    }

    #[test]
    fn old_side_ranges_use_the_base_length() {
        // Two lines now, four in the base: lines 3-4 were deleted.
        let mut f = file("a\nb");
        f.diff_hunks = vec![DiffHunk {
            old_start: 1,
            old_count: 4,
            new_start: 1,
            new_count: 2,
            header: "@@ -1,4 +1,2 @@".to_string(),
            lines: Vec::new(),
        }];
        assert_eq!(f.old_line_count(), 4);

        let old_side = |start_line, end_line| NewComment {
            side: Some(DiffSide::Old),
            ..new_comment(start_line, end_line, "why drop these?")
        };
        assert!(f.add_comment(old_side(3, 4)).is_ok());
        assert!(matches!(
            f.add_comment(old_side(4, 5)),
            Err(CommentError::InvalidInput { .. })
        ));
        assert!(matches!(
            f.add_comment(new_comment(3, 4, "new side")),
            Err(CommentError::InvalidInput { .. })
        ));

        f.previous_content = Some("1\n2\n3\n4\n5\n6".to_string());
        assert_eq!(f.old_line_count(), 6);
    }

    #[test]
    fn unknown_comment_is_not_found() {
        let mut f = file("a");
        assert!(matches!(
            f.update_comment(7, "x".to_string()),
            Err(CommentError::CommentNotFound { id: 7 })
        ));
        assert!(matches!(
            f.delete_comment(7),
            Err(CommentError::CommentNotFound { id: 7 })
        ));
    }

    #[test]
    fn update_changes_body_and_timestamp() {
        let mut f = file("a");
        let created = f.add_comment(new_comment(1, 1, "first")).unwrap();
        let updated = f.update_comment(created.id, "second".to_string()).unwrap();
        assert_eq!(updated.body, "second");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[test]
    fn markdown_detection() {
        assert_eq!(file("").file_type, FileType::Markdown);
        assert_eq!(FileType::from_path("src/main.rs"), FileType::Code);
        assert_eq!(FileType::from_path("README.MD"), FileType::Markdown);
    }

    #[test]
    fn hash_is_stable_hex_sha256() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
