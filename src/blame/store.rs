use std::sync::Arc;

use super::types::AnnotationRecord;

/// Blame records for a clean snapshot of a document, indexed by 1-based line.
///
/// Records are shared with the incremental display state, so replacing the
/// store never invalidates what is currently displayed.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    lines: Vec<Option<Arc<AnnotationRecord>>>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        AnnotationStore { lines: Vec::new() }
    }

    /// Build a store from parser output; record `i` lands on line `i + 1`.
    pub fn from_records(records: Vec<AnnotationRecord>) -> Self {
        let mut store = AnnotationStore::new();
        store.commit(records);
        store
    }

    /// Replace the entire contents with a fresh snapshot.
    pub fn commit(&mut self, records: Vec<AnnotationRecord>) {
        self.lines = records
            .into_iter()
            .enumerate()
            .map(|(idx, mut record)| {
                record.line = idx + 1;
                Some(Arc::new(record))
            })
            .collect();
    }

    pub fn get(&self, line: usize) -> Option<&AnnotationRecord> {
        self.shared(line).map(Arc::as_ref)
    }

    pub(crate) fn shared(&self, line: usize) -> Option<&Arc<AnnotationRecord>> {
        line.checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterate `(line, record)` pairs in line order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<&AnnotationRecord>)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(idx, rec)| (idx + 1, rec.as_deref()))
    }
}
