use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::blame::AnnotationRecord;

const HASH_PLACEHOLDER: &str = "${hash}";

fn github_remote() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:git@github\.com:|ssh://git@github\.com/|https://github\.com/)(?P<path>[^/\s]+/[^/\s]+?)(?:\.git)?/?$",
        )
        .expect("github remote pattern is valid")
    })
}

/// Where commit links for a workspace point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum RepositoryLink {
    /// Links disabled, or the remote is not a recognized host.
    None,
    /// User-supplied template; `${hash}` is replaced by the revision.
    Custom { template: String },
    /// `https://github.com/<org>/<repo>`.
    GitHub { base: String },
}

impl RepositoryLink {
    /// Recognize a remote URL as printed by `git config --get remote.origin.url`.
    pub fn from_remote(remote: &str) -> Self {
        match github_remote().captures(remote.trim()) {
            Some(caps) => RepositoryLink::GitHub {
                base: format!("https://github.com/{}", &caps["path"]),
            },
            None => RepositoryLink::None,
        }
    }

    /// Apply the `blameUrl` setting: unset detects from the remote, empty
    /// disables links, anything else is a custom template.
    pub fn from_setting<F>(blame_url: Option<&str>, remote: F) -> Self
    where
        F: FnOnce() -> Option<String>,
    {
        match blame_url {
            None => remote()
                .map(|r| RepositoryLink::from_remote(&r))
                .unwrap_or(RepositoryLink::None),
            Some("") => RepositoryLink::None,
            Some(template) => RepositoryLink::Custom {
                template: template.to_string(),
            },
        }
    }

    /// Browsable URL for a revision.
    pub fn commit_url(&self, revision: &str) -> Option<String> {
        match self {
            RepositoryLink::None => None,
            RepositoryLink::Custom { template } => Some(template.replace(HASH_PLACEHOLDER, revision)),
            RepositoryLink::GitHub { base } => Some(format!("{base}/commit/{revision}")),
        }
    }

    /// URL for a blamed line. On GitHub this anchors to the line in the
    /// commit's diff view. Uncommitted lines have no URL.
    pub fn line_url(&self, record: &AnnotationRecord) -> Option<String> {
        if !record.is_committed() {
            return None;
        }
        match self {
            RepositoryLink::GitHub { base } => {
                let file_hash = Sha256::digest(record.filename.as_bytes());
                Some(format!(
                    "{base}/commit/{}#diff-{file_hash:x}R{}",
                    record.revision_id, record.origin_line
                ))
            }
            _ => self.commit_url(&record.revision_id),
        }
    }
}
