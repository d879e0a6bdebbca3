use serde::{Deserialize, Serialize};

/// A 0-based position as reported by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Position { line, character }
    }
}

/// One text edit: `range` of the old text replaced by `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditDelta {
    pub start: Position,
    pub end: Position,
    pub text: String,
}

impl EditDelta {
    pub fn new(start: Position, end: Position, text: impl Into<String>) -> Self {
        EditDelta {
            start,
            end,
            text: text.into(),
        }
    }

    /// Pure insertion at `at`.
    pub fn insert(at: Position, text: impl Into<String>) -> Self {
        EditDelta::new(at, at, text)
    }

    pub fn is_single_line(&self) -> bool {
        self.start.line == self.end.line
    }

    pub fn is_empty_range(&self) -> bool {
        self.start == self.end
    }

    /// Number of line breaks in the replacement text; `\r\n` counts once.
    pub fn inserted_newlines(&self) -> usize {
        let bytes = self.text.as_bytes();
        bytes
            .iter()
            .enumerate()
            .filter(|&(i, &b)| b == b'\n' || (b == b'\r' && bytes.get(i + 1) != Some(&b'\n')))
            .count()
    }

    pub fn ends_with_newline(&self) -> bool {
        self.text.ends_with('\n') || self.text.ends_with('\r')
    }

    /// 1-based lines the replacement text occupies after the edit.
    pub fn touched_lines(&self) -> std::ops::RangeInclusive<usize> {
        let first = self.start.line + 1;
        first..=first + self.inserted_newlines()
    }
}
