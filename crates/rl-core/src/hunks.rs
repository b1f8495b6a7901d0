//! Everything that produces [`DiffHunk`]s: unified-diff text from an external
//! tool, the line diff engine's own output, and brand-new files.

use crate::diff::split_lines;
use crate::types::{DiffEntry, DiffHunk, DiffLine, DiffLineKind, DiffOp};

const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// Parses the hunks of a unified diff. File headers and anything outside a
/// hunk body are skipped.
pub fn parse_unified_diff(text: &str) -> Vec<DiffHunk> {
    let mut hunks: Vec<DiffHunk> = Vec::new();
    let mut current: Option<HunkCursor> = None;

    for line in text.lines() {
        if line.starts_with("@@ ") {
            if let Some(cursor) = current.take() {
                hunks.push(cursor.hunk);
            }
            current = parse_hunk_header(line).map(HunkCursor::new);
            continue;
        }
        if line.starts_with("diff --git ") {
            if let Some(cursor) = current.take() {
                hunks.push(cursor.hunk);
            }
            continue;
        }
        if line.starts_with(NO_NEWLINE_MARKER) {
            continue;
        }
        let Some(cursor) = current.as_mut() else {
            continue;
        };
        if cursor.is_complete() {
            continue;
        }
        cursor.push(line);
    }

    if let Some(cursor) = current.take() {
        hunks.push(cursor.hunk);
    }
    hunks
}

struct HunkCursor {
    hunk: DiffHunk,
    old_line: u32,
    new_line: u32,
    old_remaining: u32,
    new_remaining: u32,
}

impl HunkCursor {
    fn new(hunk: DiffHunk) -> Self {
        Self {
            old_line: hunk.old_start,
            new_line: hunk.new_start,
            old_remaining: hunk.old_count,
            new_remaining: hunk.new_count,
            hunk,
        }
    }

    fn is_complete(&self) -> bool {
        self.old_remaining == 0 && self.new_remaining == 0
    }

    fn push(&mut self, line: &str) {
        let mut chars = line.chars();
        let kind = match chars.next() {
            Some('+') => DiffLineKind::Add,
            Some('-') => DiffLineKind::Del,
            // Some tools strip the space on empty context lines.
            Some(' ') | None => DiffLineKind::Context,
            Some(_) => return,
        };
        let content: String = chars.collect();
        let (old_num, new_num) = match kind {
            DiffLineKind::Add => {
                let num = self.new_line;
                self.new_line += 1;
                self.new_remaining = self.new_remaining.saturating_sub(1);
                (0, num)
            }
            DiffLineKind::Del => {
                let num = self.old_line;
                self.old_line += 1;
                self.old_remaining = self.old_remaining.saturating_sub(1);
                (num, 0)
            }
            DiffLineKind::Context => {
                let nums = (self.old_line, self.new_line);
                self.old_line += 1;
                self.new_line += 1;
                self.old_remaining = self.old_remaining.saturating_sub(1);
                self.new_remaining = self.new_remaining.saturating_sub(1);
                nums
            }
        };
        self.hunk.lines.push(DiffLine {
            kind,
            content,
            old_num,
            new_num,
        });
    }
}

/// Parses `@@ -a[,b] +c[,d] @@ ...`. Omitted counts default to 1.
fn parse_hunk_header(line: &str) -> Option<DiffHunk> {
    let trimmed = line.strip_prefix("@@ ")?;
    let (ranges, _) = trimmed.split_once(" @@")?;
    let mut range_parts = ranges.split_whitespace();
    let (old_start, old_count) = parse_range(range_parts.next()?.strip_prefix('-')?)?;
    let (new_start, new_count) = parse_range(range_parts.next()?.strip_prefix('+')?)?;
    Some(DiffHunk {
        old_start,
        old_count,
        new_start,
        new_count,
        header: line.to_string(),
        lines: Vec::new(),
    })
}

fn parse_range(value: &str) -> Option<(u32, u32)> {
    let mut parts = value.split(',');
    let start = parts.next()?.parse::<u32>().ok()?;
    let count = match parts.next() {
        Some(count) => count.parse::<u32>().ok()?,
        None => 1,
    };
    Some((start, count))
}

pub fn hunk_header(old_start: u32, old_count: u32, new_start: u32, new_count: u32) -> String {
    format!("@@ -{old_start},{old_count} +{new_start},{new_count} @@")
}

/// Groups the changed entries of a line diff into hunks with `context` lines
/// of surrounding context. Changes separated by at most `2 * context`
/// unchanged lines share a hunk.
pub fn hunks_from_entries(entries: &[DiffEntry], context: usize) -> Vec<DiffHunk> {
    let changed: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.op != DiffOp::Unchanged)
        .map(|(idx, _)| idx)
        .collect();
    let Some((&first, rest)) = changed.split_first() else {
        return Vec::new();
    };

    let mut clusters = vec![(first, first)];
    for &idx in rest {
        let last = clusters.len() - 1;
        if idx - clusters[last].1 - 1 <= 2 * context {
            clusters[last].1 = idx;
        } else {
            clusters.push((idx, idx));
        }
    }

    clusters
        .into_iter()
        .map(|(first, last)| {
            let start = first.saturating_sub(context);
            let end = (last + context).min(entries.len() - 1);
            build_hunk(entries, start, end)
        })
        .collect()
}

fn build_hunk(entries: &[DiffEntry], start: usize, end: usize) -> DiffHunk {
    let slice = &entries[start..=end];
    let old_before = entries[..start]
        .iter()
        .rev()
        .find(|e| e.old_line > 0)
        .map_or(0, |e| e.old_line);
    let new_before = entries[..start]
        .iter()
        .rev()
        .find(|e| e.new_line > 0)
        .map_or(0, |e| e.new_line);
    let old_start = slice
        .iter()
        .find(|e| e.old_line > 0)
        .map_or(old_before, |e| e.old_line);
    let new_start = slice
        .iter()
        .find(|e| e.new_line > 0)
        .map_or(new_before, |e| e.new_line);

    let lines: Vec<DiffLine> = slice
        .iter()
        .map(|e| DiffLine {
            kind: match e.op {
                DiffOp::Unchanged => DiffLineKind::Context,
                DiffOp::Added => DiffLineKind::Add,
                DiffOp::Removed => DiffLineKind::Del,
            },
            content: e.text.clone(),
            old_num: e.old_line,
            new_num: e.new_line,
        })
        .collect();
    let old_count = count_lines(&lines, DiffLineKind::Add);
    let new_count = count_lines(&lines, DiffLineKind::Del);

    DiffHunk {
        old_start,
        old_count,
        new_start,
        new_count,
        header: hunk_header(old_start, old_count, new_start, new_count),
        lines,
    }
}

/// Counts lines attributed to one side, i.e. everything but `excluded`.
fn count_lines(lines: &[DiffLine], excluded: DiffLineKind) -> u32 {
    let count = lines.iter().filter(|line| line.kind != excluded).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// A single all-addition hunk for files without a prior version.
pub fn whole_file_hunk(content: &str) -> Vec<DiffHunk> {
    let lines: Vec<DiffLine> = split_lines(content)
        .into_iter()
        .zip(1u32..)
        .map(|(text, num)| DiffLine {
            kind: DiffLineKind::Add,
            content: text.to_string(),
            old_num: 0,
            new_num: num,
        })
        .collect();
    if lines.is_empty() {
        return Vec::new();
    }
    let count = u32::try_from(lines.len()).unwrap_or(u32::MAX);
    vec![DiffHunk {
        old_start: 0,
        old_count: 0,
        new_start: 1,
        new_count: count,
        header: hunk_header(0, 0, 1, count),
        lines,
    }]
}
