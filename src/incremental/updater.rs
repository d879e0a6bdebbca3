use std::sync::Arc;

use log::{debug, trace};
use serde::Serialize;

use super::delta::EditDelta;
use super::document::LiveDocument;
use crate::blame::{AnnotationRecord, AnnotationStore};
use crate::config::DEFAULT_TRAILING_CHAR_ALLOWANCE;

/// What the editor should currently show for a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineState {
    /// The line still matches its blame record.
    Attributed,
    /// The line was edited away from its blame record.
    Stale,
    /// The line has no blame record (new, or not committed).
    Uncommitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// Display state was derived from a clean snapshot and not edited since.
    CleanDerived,
    /// At least one edit has been applied since the last clean snapshot.
    DirtyIncremental,
}

/// How a delta was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum UpdateOutcome {
    /// Line count unchanged; lines `first..=last` were re-verified.
    InLine { first: usize, last: usize },
    /// `count` empty lines were inserted before 1-based line `at`.
    ///
    /// `at` is the line after the edited one, or the edited line itself when
    /// the newline was typed at column 0 and the whole line moved down.
    NewlineInsertion { at: usize, count: usize },
    /// The edit could not be classified; every line from `from` on lost its
    /// attribution until the next clean snapshot.
    Ambiguous { from: usize },
}

#[derive(Debug, Clone)]
struct LineSlot {
    /// Record this line inherited from the last clean snapshot.
    candidate: Option<Arc<AnnotationRecord>>,
    state: LineState,
}

impl LineSlot {
    fn empty(state: LineState) -> Self {
        LineSlot {
            candidate: None,
            state,
        }
    }
}

/// Keeps per-line blame display state in step with edits to a dirty
/// document, without re-running blame.
///
/// Every delta must be applied exactly once and in order; a dropped delta
/// desynchronizes the line mapping.
#[derive(Debug, Clone)]
pub struct IncrementalUpdater {
    slots: Vec<LineSlot>,
    has_store: bool,
    mode: Mode,
    trailing_char_allowance: usize,
}

impl Default for IncrementalUpdater {
    fn default() -> Self {
        IncrementalUpdater::new(DEFAULT_TRAILING_CHAR_ALLOWANCE)
    }
}

impl IncrementalUpdater {
    /// An updater with no snapshot yet and no lines.
    ///
    /// `trailing_char_allowance` is how many extra characters typed at the
    /// end of a line still count as matching its blame record.
    pub fn new(trailing_char_allowance: usize) -> Self {
        IncrementalUpdater {
            slots: Vec::new(),
            has_store: false,
            mode: Mode::CleanDerived,
            trailing_char_allowance,
        }
    }

    /// Rebuild display state from a clean snapshot, verifying each line
    /// against the live text. With no store every line is uncommitted.
    pub fn reset<D: LiveDocument + ?Sized>(&mut self, store: Option<&AnnotationStore>, doc: &D) {
        let line_count = doc.line_count();
        self.has_store = store.is_some();
        self.mode = Mode::CleanDerived;
        self.slots = (1..=line_count)
            .map(|line| LineSlot {
                candidate: store.and_then(|s| s.shared(line)).cloned(),
                state: LineState::Uncommitted,
            })
            .collect();
        for line in 1..=line_count {
            self.verify(line, doc);
        }
        debug!(
            "blame display reset: {line_count} lines, store {}",
            if self.has_store { "present" } else { "absent" }
        );
    }

    /// Apply one edit. `doc` must reflect the text after the edit.
    pub fn apply<D: LiveDocument + ?Sized>(&mut self, delta: &EditDelta, doc: &D) -> UpdateOutcome {
        self.mode = Mode::DirtyIncremental;
        let outcome = self
            .classify(delta, doc.line_count())
            .unwrap_or(UpdateOutcome::Ambiguous {
                from: delta.start.line + 1,
            });

        match outcome {
            UpdateOutcome::InLine { first, last } => {
                for line in first..=last {
                    self.verify(line, doc);
                }
            }
            UpdateOutcome::NewlineInsertion { at, count } => {
                let fresh = std::iter::repeat_with(|| LineSlot::empty(LineState::Uncommitted));
                self.slots.splice(at - 1..at - 1, fresh.take(count));
                for line in delta.touched_lines() {
                    self.verify(line, doc);
                }
            }
            UpdateOutcome::Ambiguous { from } => self.invalidate_from(from, doc.line_count()),
        }

        debug!(
            "edit {}:{}-{}:{} ({} newlines) -> {outcome:?}",
            delta.start.line,
            delta.start.character,
            delta.end.line,
            delta.end.character,
            delta.inserted_newlines()
        );
        outcome
    }

    /// Decide which update rule covers `delta`; `None` means ambiguous.
    fn classify(&self, delta: &EditDelta, new_count: usize) -> Option<UpdateOutcome> {
        let old_count = self.slots.len();
        let newlines = delta.inserted_newlines();
        if delta.start > delta.end || delta.end.line >= old_count.max(1) {
            return None;
        }

        if new_count == old_count {
            if newlines != delta.end.line - delta.start.line {
                return None;
            }
            let lines = delta.touched_lines();
            return Some(UpdateOutcome::InLine {
                first: *lines.start(),
                last: *lines.end(),
            });
        }

        if delta.is_single_line() && delta.ends_with_newline() && new_count == old_count + newlines {
            // An insertion at the very start of a line pushes the whole line
            // down; anywhere else the edited line stays put.
            let at = if delta.is_empty_range() && delta.start.character == 0 {
                delta.start.line + 1
            } else {
                delta.start.line + 2
            };
            if at - 1 <= old_count {
                return Some(UpdateOutcome::NewlineInsertion { at, count: newlines });
            }
        }
        None
    }

    fn invalidate_from(&mut self, from: usize, line_count: usize) {
        let keep = from.saturating_sub(1).min(line_count);
        let fill = if self.has_store {
            LineState::Stale
        } else {
            LineState::Uncommitted
        };
        self.slots.truncate(keep);
        self.slots.resize_with(line_count, || LineSlot::empty(fill));
    }

    fn verify<D: LiveDocument + ?Sized>(&mut self, line: usize, doc: &D) {
        let allowance = self.trailing_char_allowance;
        let Some(slot) = line.checked_sub(1).and_then(|idx| self.slots.get_mut(idx)) else {
            return;
        };
        let Some(candidate) = &slot.candidate else {
            return;
        };
        slot.state = if !candidate.is_committed() {
            LineState::Uncommitted
        } else if text_matches(doc.line_text(line), &candidate.line_text, allowance) {
            LineState::Attributed
        } else {
            LineState::Stale
        };
        trace!("line {line} verified as {:?}", slot.state);
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn line_count(&self) -> usize {
        self.slots.len()
    }

    pub fn state(&self, line: usize) -> Option<LineState> {
        self.slot(line).map(|slot| slot.state)
    }

    /// The record shown for `line`, if the line is attributed.
    pub fn record(&self, line: usize) -> Option<&AnnotationRecord> {
        self.slot(line)
            .filter(|slot| slot.state == LineState::Attributed)
            .and_then(|slot| slot.candidate.as_deref())
    }

    pub fn states(&self) -> Vec<LineState> {
        self.slots.iter().map(|slot| slot.state).collect()
    }

    /// One entry per line: the record to show, or `None` for no attribution.
    pub fn display(&self) -> Vec<Option<&AnnotationRecord>> {
        (1..=self.slots.len()).map(|line| self.record(line)).collect()
    }

    fn slot(&self, line: usize) -> Option<&LineSlot> {
        line.checked_sub(1).and_then(|idx| self.slots.get(idx))
    }
}

/// Live text matches when it equals the recorded text, optionally followed
/// by up to `allowance` freshly typed characters.
fn text_matches(live: Option<&str>, recorded: &str, allowance: usize) -> bool {
    live.and_then(|live| live.strip_prefix(recorded))
        .is_some_and(|extra| extra.chars().count() <= allowance)
}
