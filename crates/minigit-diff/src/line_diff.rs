//! Line-level diffs of file content.

use crate::myers::{shortest_edit, EditKind};
use serde::{Deserialize, Serialize};

/// Number of unchanged lines kept around each change when rendering hunks.
pub const DEFAULT_CONTEXT: usize = 3;

/// Classification of a line in a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    /// Present in both versions.
    Unchanged,
    /// Only in the new version.
    Inserted,
    /// Only in the old version.
    Deleted,
}

/// A single line of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiff {
    /// Line classification.
    pub kind: LineKind,
    /// Text in the old version; empty for insertions.
    pub old_line: String,
    /// Text in the new version; empty for deletions.
    pub new_line: String,
    /// 1-based line number in the old version.
    pub old_line_no: Option<usize>,
    /// 1-based line number in the new version.
    pub new_line_no: Option<usize>,
}

impl LineDiff {
    /// The line's text, taken from whichever side it belongs to.
    pub fn text(&self) -> &str {
        match self.kind {
            LineKind::Inserted => &self.new_line,
            LineKind::Unchanged | LineKind::Deleted => &self.old_line,
        }
    }

    /// Returns true for inserted and deleted lines.
    pub fn is_change(&self) -> bool {
        self.kind != LineKind::Unchanged
    }
}

/// Splits file content into lines.
///
/// The empty segment after a final newline is not a line, so `"a\nb\n"` and
/// `"a\nb"` both have two lines and empty content has none.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

/// Diffs two sequences of lines.
pub fn diff_lines<S: AsRef<str>>(prev: &[S], curr: &[S]) -> Vec<LineDiff> {
    let prev: Vec<&str> = prev.iter().map(AsRef::as_ref).collect();
    let curr: Vec<&str> = curr.iter().map(AsRef::as_ref).collect();

    shortest_edit(&prev, &curr)
        .into_iter()
        .map(|edit| {
            let (old, new) = (edit.old_index, edit.new_index);
            match edit.kind {
                EditKind::Equal => LineDiff {
                    kind: LineKind::Unchanged,
                    old_line: prev[old].to_string(),
                    new_line: curr[new].to_string(),
                    old_line_no: Some(old + 1),
                    new_line_no: Some(new + 1),
                },
                EditKind::Insert => LineDiff {
                    kind: LineKind::Inserted,
                    old_line: String::new(),
                    new_line: curr[new].to_string(),
                    old_line_no: None,
                    new_line_no: Some(new + 1),
                },
                EditKind::Delete => LineDiff {
                    kind: LineKind::Deleted,
                    old_line: prev[old].to_string(),
                    new_line: String::new(),
                    old_line_no: Some(old + 1),
                    new_line_no: None,
                },
            }
        })
        .collect()
}

/// A contiguous run of diff lines with surrounding context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// First old line covered (the line before, if the hunk has no old lines).
    pub old_start: usize,
    /// Number of old lines covered.
    pub old_len: usize,
    /// First new line covered (the line before, if the hunk has no new lines).
    pub new_start: usize,
    /// Number of new lines covered.
    pub new_len: usize,
    /// The lines, context included.
    pub lines: Vec<LineDiff>,
}

impl Hunk {
    /// Renders the `@@ -a,b +c,d @@` header.
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_len, self.new_start, self.new_len
        )
    }
}

/// The line diff of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    lines: Vec<LineDiff>,
}

impl FileDiff {
    /// Diffs two versions of a file.
    pub fn between(old: &str, new: &str) -> Self {
        Self {
            lines: diff_lines(&split_lines(old), &split_lines(new)),
        }
    }

    /// Diff of a newly created file: every line is inserted.
    pub fn created(new: &str) -> Self {
        Self::between("", new)
    }

    /// Diff of a deleted file: every line is deleted.
    pub fn deleted(old: &str) -> Self {
        Self::between(old, "")
    }

    /// All lines, unchanged ones included.
    pub fn lines(&self) -> &[LineDiff] {
        &self.lines
    }

    /// Returns true if no line changed.
    pub fn is_unchanged(&self) -> bool {
        !self.lines.iter().any(LineDiff::is_change)
    }

    /// Counts `(insertions, deletions)`.
    pub fn summary(&self) -> (usize, usize) {
        self.lines.iter().fold((0, 0), |(ins, del), line| match line.kind {
            LineKind::Inserted => (ins + 1, del),
            LineKind::Deleted => (ins, del + 1),
            LineKind::Unchanged => (ins, del),
        })
    }

    /// Groups changed lines into hunks, keeping `context` unchanged lines on
    /// each side of every change. Hunks whose context would touch or overlap
    /// are merged.
    pub fn hunks(&self, context: usize) -> Vec<Hunk> {
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        for (i, line) in self.lines.iter().enumerate() {
            if !line.is_change() {
                continue;
            }
            let start = i.saturating_sub(context);
            let end = (i + context + 1).min(self.lines.len());
            match ranges.last_mut() {
                Some(last) if start <= last.1 => last.1 = end,
                _ => ranges.push((start, end)),
            }
        }

        ranges
            .into_iter()
            .map(|(start, end)| self.hunk(start, end))
            .collect()
    }

    fn hunk(&self, start: usize, end: usize) -> Hunk {
        let before = &self.lines[..start];
        let lines = &self.lines[start..end];

        let old_before = before.iter().filter(|l| l.old_line_no.is_some()).count();
        let new_before = before.iter().filter(|l| l.new_line_no.is_some()).count();
        let old_len = lines.iter().filter(|l| l.old_line_no.is_some()).count();
        let new_len = lines.iter().filter(|l| l.new_line_no.is_some()).count();

        Hunk {
            old_start: if old_len == 0 { old_before } else { old_before + 1 },
            old_len,
            new_start: if new_len == 0 { new_before } else { new_before + 1 },
            new_len,
            lines: lines.to_vec(),
        }
    }
}
