use std::collections::HashMap;

/// Assigns palette colors to revisions in first-seen order.
///
/// A revision keeps its color for as long as the palette is unchanged, so
/// colors stay put while lines are shifted by edits.
#[derive(Debug, Clone, Default)]
pub struct ColorCache {
    palette: Vec<String>,
    assigned: HashMap<String, usize>,
}

impl ColorCache {
    pub fn new(palette: Vec<String>) -> Self {
        ColorCache {
            palette,
            assigned: HashMap::new(),
        }
    }

    /// Color for `revision_id`; `None` when the palette is empty.
    pub fn color_for(&mut self, revision_id: &str) -> Option<&str> {
        if self.palette.is_empty() {
            return None;
        }
        let next = self.assigned.len() % self.palette.len();
        let idx = *self.assigned.entry(revision_id.to_string()).or_insert(next);
        self.palette.get(idx).map(String::as_str)
    }

    /// Swap the palette. Assignments are forgotten only if it changed.
    pub fn set_palette(&mut self, palette: Vec<String>) {
        if palette != self.palette {
            self.palette = palette;
            self.assigned.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}
