//! Mutable document state threaded through one interpretation pass.

use std::collections::HashMap;

/// The shared state of one pass over a document.
///
/// A fresh bundle is built per pass and discarded afterwards; the interpreter
/// keeps nothing across passes.  Three parts mutate independently:
///
/// - `lines`: every physical line of the input; `\skip` may delete the line
///   after the cursor.
/// - `out_lines`: the rewritten document so far; `\k`, `\echo` and `\echo@`
///   append or insert.
/// - `variables`: the only channel between the caller and the document.
///   Values change during a pass; keys never do.
#[derive(Debug, Clone)]
pub struct DocState {
    pub lines: Vec<String>,
    pub out_lines: Vec<String>,
    pub variables: HashMap<String, String>,
    /// Index of the line currently being evaluated.  Insertions into `lines`
    /// must only happen at or after this index.
    pub cur: usize,
}

impl DocState {
    pub fn new(lines: Vec<String>, variables: HashMap<String, String>) -> Self {
        DocState {
            lines,
            out_lines: Vec::new(),
            variables,
            cur: 0,
        }
    }

    /// Deep copy for speculative branch evaluation.  The copy shares nothing
    /// with `self`, so discarding it cannot corrupt committed state.
    pub fn snapshot(&self) -> DocState {
        self.clone()
    }

    /// The raw text of the line under the cursor.
    pub fn current_line(&self) -> &str {
        self.lines.get(self.cur).map(String::as_str).unwrap_or("")
    }

    /// The line immediately below the cursor, if any.
    pub fn next_line(&self) -> Option<&str> {
        self.lines.get(self.cur + 1).map(String::as_str)
    }

    /// Delete the line immediately below the cursor; no-op at end of document.
    pub fn delete_next_line(&mut self) {
        if self.cur + 1 < self.lines.len() {
            self.lines.remove(self.cur + 1);
        }
    }

    /// Insert into `out_lines` with list-insert index semantics: negative
    /// indices count from the end, out-of-range indices clamp.
    pub fn insert_out(&mut self, at: i64, text: String) {
        let len = self.out_lines.len() as i64;
        let idx = if at < 0 { (len + at).max(0) } else { at.min(len) };
        self.out_lines.insert(idx as usize, text);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
