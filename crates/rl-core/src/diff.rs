//! Line-level diffing and the line-number mapping built on top of it.
//!
//! The alignment is a textbook longest-common-subsequence table, so both time
//! and memory grow with `old.len() * new.len()`. That is fine for documents up
//! to a few tens of thousands of lines and is the known scaling limit here.

use crate::types::{DiffEntry, DiffOp};
use std::collections::HashMap;

/// Splits content into lines on `\n`. A trailing newline does not produce an
/// extra empty line and no other normalization is applied.
pub fn split_lines(content: &str) -> Vec<&str> {
    if content.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<&str> = content.split('\n').collect();
    if content.ends_with('\n') {
        lines.pop();
    }
    lines
}

pub fn line_count(content: &str) -> u32 {
    u32::try_from(split_lines(content).len()).unwrap_or(u32::MAX)
}

/// Computes the minimal edit script turning `old` into `new`, in document
/// order. Every input line appears in exactly one entry.
pub fn compute_line_diff(old: &[&str], new: &[&str]) -> Vec<DiffEntry> {
    let (m, n) = (old.len(), new.len());
    let width = n + 1;
    let mut table = vec![0u32; (m + 1) * width];
    for i in 1..=m {
        for j in 1..=n {
            table[i * width + j] = if old[i - 1] == new[j - 1] {
                table[(i - 1) * width + (j - 1)] + 1
            } else {
                table[(i - 1) * width + j].max(table[i * width + (j - 1)])
            };
        }
    }

    let mut entries = Vec::with_capacity(m.max(n));
    let (mut i, mut j) = (m, n);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && old[i - 1] == new[j - 1] {
            entries.push(entry(DiffOp::Unchanged, i, j, old[i - 1]));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[i * width + (j - 1)] >= table[(i - 1) * width + j]) {
            entries.push(entry(DiffOp::Added, 0, j, new[j - 1]));
            j -= 1;
        } else {
            entries.push(entry(DiffOp::Removed, i, 0, old[i - 1]));
            i -= 1;
        }
    }
    entries.reverse();
    entries
}

pub fn diff_contents(old: &str, new: &str) -> Vec<DiffEntry> {
    compute_line_diff(&split_lines(old), &split_lines(new))
}

fn entry(op: DiffOp, old_line: usize, new_line: usize, text: &str) -> DiffEntry {
    DiffEntry {
        op,
        old_line: to_line(old_line),
        new_line: to_line(new_line),
        text: text.to_string(),
    }
}

fn to_line(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Maps old line numbers to new ones.
///
/// Unchanged lines map directly. A removed line maps to the first new line
/// that follows it, or to the last new line when nothing follows. When the
/// new side is empty removed lines stay unmapped.
pub fn build_line_map(entries: &[DiffEntry]) -> HashMap<u32, u32> {
    let mut map = HashMap::new();
    for e in entries.iter().filter(|e| e.op == DiffOp::Unchanged) {
        map.insert(e.old_line, e.new_line);
    }

    let last_new_line = entries.iter().map(|e| e.new_line).max().unwrap_or(0);
    let mut next_new_line = 0;
    for e in entries.iter().rev() {
        if e.new_line > 0 {
            next_new_line = e.new_line;
            continue;
        }
        if e.op != DiffOp::Removed || map.contains_key(&e.old_line) {
            continue;
        }
        let target = if next_new_line > 0 {
            next_new_line
        } else {
            last_new_line
        };
        if target > 0 {
            map.insert(e.old_line, target);
        }
    }
    map
}

/// Relocates an inclusive line range and clamps it into `[1, line_count]`.
///
/// Returns `None` only when the new document has no lines at all.
pub fn remap_range(
    map: &HashMap<u32, u32>,
    start_line: u32,
    end_line: u32,
    line_count: u32,
) -> Option<(u32, u32)> {
    if line_count == 0 {
        return None;
    }
    let start = map.get(&start_line).copied().unwrap_or(start_line);
    let end = map.get(&end_line).copied().unwrap_or(end_line);
    let start = start.clamp(1, line_count);
    let end = end.clamp(1, line_count).max(start);
    Some((start, end))
}
