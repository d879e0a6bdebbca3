use serde::{Deserialize, Serialize};

/// Revision id git reports for lines that are not committed yet.
pub const UNCOMMITTED_REVISION: &str = "0000000000000000000000000000000000000000";

/// Who authored or committed a revision, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub name: String,
    /// Email without the surrounding angle brackets.
    pub email: String,
    /// Unix epoch seconds.
    pub timestamp: i64,
    /// Offset as printed by git, e.g. `+0200`.
    pub timezone: String,
}

/// Per-revision metadata shared by every line attributed to the revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionMeta {
    pub author: Signature,
    pub committer: Signature,
    pub summary: String,
}

/// The revision and path a line's content came from before the attributed
/// revision touched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousRevision {
    pub revision_id: String,
    pub filename: String,
}

/// Blame attribution for one line of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    /// 1-based line number in the blamed file, counted by the parser.
    pub line: usize,
    pub revision_id: String,
    pub origin_line: u32,
    pub final_line: u32,
    /// Size of the run of lines this chunk opens, when git reported one.
    pub group_size: Option<u32>,
    #[serde(flatten)]
    pub meta: RevisionMeta,
    pub previous: Option<PreviousRevision>,
    pub boundary: bool,
    pub filename: String,
    /// Line content as blame saw it.
    pub line_text: String,
}

impl AnnotationRecord {
    pub fn is_committed(&self) -> bool {
        self.revision_id != UNCOMMITTED_REVISION
    }

    /// True when authorship and commit were done by different identities or
    /// at different times (amended, rebased, cherry-picked...).
    pub fn is_diff_author_committer(&self) -> bool {
        let a = &self.meta.author;
        let c = &self.meta.committer;
        a.name != c.name || a.email != c.email || a.timestamp != c.timestamp
    }

    pub fn short_revision(&self) -> &str {
        let end = self
            .revision_id
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.revision_id.len());
        &self.revision_id[..end]
    }

    pub fn author(&self) -> &Signature {
        &self.meta.author
    }

    pub fn committer(&self) -> &Signature {
        &self.meta.committer
    }

    pub fn summary(&self) -> &str {
        &self.meta.summary
    }
}
