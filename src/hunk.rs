//! Diff hunk model and mechanical application.
//!
//! A hunk replaces a contiguous run of lines (`old_lines`) starting at a
//! 1-indexed `start_line` with `new_lines`. Applying a set of hunks splices
//! them into a line-split copy of the base text in descending start-line
//! order, so edits earlier in the document are unaffected by line-count
//! shifts introduced by edits later in it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A contiguous line-range replacement within a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// 1-indexed first line the hunk touches.
    pub start_line: usize,

    /// Lines removed from the base, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub old_lines: Vec<String>,

    /// Lines inserted in their place, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_lines: Vec<String>,
}

impl DiffHunk {
    pub fn new(start_line: usize, old_lines: Vec<String>, new_lines: Vec<String>) -> Self {
        Self {
            start_line,
            old_lines,
            new_lines,
        }
    }

    /// Replace a single line.
    pub fn replace_line(start_line: usize, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self::new(start_line, vec![old.into()], vec![new.into()])
    }

    /// Half-open line range `[start, start + max(|old|, |new|))` this hunk
    /// can influence. Used for overlap classification.
    pub fn range(&self) -> (usize, usize) {
        let span = self.old_lines.len().max(self.new_lines.len());
        (self.start_line, self.start_line + span)
    }
}

/// Apply a set of hunks to a base text.
///
/// Hunks are sorted by `start_line` descending before application. A hunk
/// whose start line is zero (on a non-empty document) or whose removed
/// range extends past the end of the document is a fatal error for the
/// file; it is never clamped.
pub fn apply_hunks(path: &str, base: &str, hunks: &[DiffHunk]) -> Result<String> {
    let had_trailing_newline = base.ends_with('\n');
    let mut lines: Vec<String> = if base.is_empty() {
        Vec::new()
    } else {
        base.lines().map(str::to_string).collect()
    };

    let mut ordered: Vec<&DiffHunk> = hunks.iter().collect();
    ordered.sort_by(|a, b| b.start_line.cmp(&a.start_line));

    for hunk in ordered {
        splice_hunk(path, &mut lines, hunk)?;
    }

    let mut merged = lines.join("\n");
    if !merged.is_empty() && (had_trailing_newline || base.is_empty()) {
        merged.push('\n');
    }
    Ok(merged)
}

fn splice_hunk(path: &str, lines: &mut Vec<String>, hunk: &DiffHunk) -> Result<()> {
    if hunk.start_line == 0 && !lines.is_empty() {
        return Err(out_of_bounds(path, hunk, lines.len()));
    }

    // 1-indexed to 0-indexed; start_line == len + 1 with no removals appends.
    let index = hunk.start_line.saturating_sub(1);
    let end = index + hunk.old_lines.len();
    if index > lines.len() || end > lines.len() {
        return Err(out_of_bounds(path, hunk, lines.len()));
    }

    lines.splice(index..end, hunk.new_lines.iter().cloned());
    Ok(())
}

fn out_of_bounds(path: &str, hunk: &DiffHunk, doc_lines: usize) -> Error {
    Error::HunkOutOfBounds {
        path: path.to_string(),
        start_line: hunk.start_line,
        removed: hunk.old_lines.len(),
        doc_lines,
    }
}
