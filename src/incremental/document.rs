use std::collections::HashMap;

use serde::Deserialize;

/// Read access to the live text of an open document.
///
/// Lines are 1-based and exclude their terminator. Implementations only
/// need to provide text for lines touched by the latest edit; a missing line
/// is treated as changed.
pub trait LiveDocument {
    fn line_count(&self) -> usize;
    fn line_text(&self, line: usize) -> Option<&str>;
}

impl<S: AsRef<str>> LiveDocument for [S] {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line_text(&self, line: usize) -> Option<&str> {
        line.checked_sub(1)
            .and_then(|idx| self.get(idx))
            .map(AsRef::as_ref)
    }
}

impl<S: AsRef<str>> LiveDocument for Vec<S> {
    fn line_count(&self) -> usize {
        self.as_slice().line_count()
    }

    fn line_text(&self, line: usize) -> Option<&str> {
        self.as_slice().line_text(line)
    }
}

/// Line count plus the text of just the lines an edit touched, as sent
/// across the wasm boundary on every keystroke.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseDocument {
    pub line_count: usize,
    #[serde(default)]
    pub lines: HashMap<usize, String>,
}

impl SparseDocument {
    pub fn new(line_count: usize) -> Self {
        SparseDocument {
            line_count,
            lines: HashMap::new(),
        }
    }

    pub fn with_line(mut self, line: usize, text: impl Into<String>) -> Self {
        self.lines.insert(line, text.into());
        self
    }
}

impl LiveDocument for SparseDocument {
    fn line_count(&self) -> usize {
        self.line_count
    }

    fn line_text(&self, line: usize) -> Option<&str> {
        self.lines.get(&line).map(String::as_str)
    }
}
