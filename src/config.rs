use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Extra characters typed at the end of a line that still count as matching
/// its blame record. Display updates run slightly ahead of the editor's
/// confirmation of the last keystroke; one character covers that lag.
pub const DEFAULT_TRAILING_CHAR_ALLOWANCE: usize = 1;

/// Settings the extension passes down, mirroring its `gitBlame.*`
/// configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlameConfig {
    /// `None` detects the URL from the repository remote, an empty string
    /// disables links, anything else is a template containing `${hash}`.
    pub blame_url: Option<String>,
    pub trailing_char_allowance: usize,
    /// Colors assigned to revisions in first-seen order. Empty disables
    /// coloring.
    pub palette: Vec<String>,
    pub label: LabelConfig,
}

impl Default for BlameConfig {
    fn default() -> Self {
        BlameConfig {
            blame_url: None,
            trailing_char_allowance: DEFAULT_TRAILING_CHAR_ALLOWANCE,
            palette: Vec::new(),
            label: LabelConfig::default(),
        }
    }
}

impl BlameConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(BlameConfig::default());
        }
        Ok(serde_json::from_str(json)?)
    }
}

/// Layout of the inline blame label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelConfig {
    pub hash_width: usize,
    pub email_width: usize,
    /// `chrono` strftime format for the author date.
    pub date_format: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        LabelConfig {
            hash_width: 7,
            email_width: 7,
            date_format: "%Y-%m-%d".to_string(),
        }
    }
}
