use thiserror::Error;

/// Errors surfaced by the blame core.
///
/// Edit classification never fails; ambiguous edits degrade display state
/// instead of producing an error.
#[derive(Debug, Error)]
pub enum BlameError {
    /// The porcelain stream did not match the chunk grammar.
    #[error("malformed blame output at input line {line}: {reason}")]
    MalformedBlameOutput { line: usize, reason: String },

    /// The raw blame bytes were not valid UTF-8.
    #[error("blame output is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The settings payload could not be decoded.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    /// An edit or snapshot payload from the extension could not be decoded.
    #[error("invalid request payload: {0}")]
    InvalidRequest(#[source] serde_json::Error),

    /// A clean snapshot is already being parsed for this document.
    #[error("a blame snapshot is already in flight (generation {0})")]
    SnapshotInFlight(u64),

    /// The snapshot result does not belong to the outstanding request.
    #[error("snapshot generation {got} does not match outstanding generation {expected:?}")]
    StaleSnapshot { got: u64, expected: Option<u64> },
}

impl BlameError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        BlameError::MalformedBlameOutput {
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BlameError>;
