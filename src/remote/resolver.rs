use std::collections::HashMap;

use log::debug;

use super::link::RepositoryLink;

/// Resolves commit links per workspace folder.
///
/// The first resolution for a workspace is kept for the life of the
/// resolver; the remote is never queried again for that workspace.
#[derive(Debug, Default)]
pub struct RevisionUrlResolver {
    links: HashMap<String, RepositoryLink>,
}

impl RevisionUrlResolver {
    pub fn new() -> Self {
        RevisionUrlResolver {
            links: HashMap::new(),
        }
    }

    /// Link settings for `workspace`, resolving them on first use.
    ///
    /// `remote` is only called when `blame_url` asks for detection and the
    /// workspace has not been resolved yet.
    pub fn link<F>(&mut self, workspace: &str, blame_url: Option<&str>, remote: F) -> &RepositoryLink
    where
        F: FnOnce() -> Option<String>,
    {
        self.links.entry(workspace.to_string()).or_insert_with(|| {
            let link = RepositoryLink::from_setting(blame_url, remote);
            debug!("resolved commit links for {workspace}: {link:?}");
            link
        })
    }

    /// Already-resolved link settings, if any.
    pub fn cached(&self, workspace: &str) -> Option<&RepositoryLink> {
        self.links.get(workspace)
    }

    /// Browsable URL for `revision` in `workspace`, or `None` when links are
    /// disabled or the remote is not recognized.
    pub fn commit_url<F>(
        &mut self,
        workspace: &str,
        blame_url: Option<&str>,
        remote: F,
        revision: &str,
    ) -> Option<String>
    where
        F: FnOnce() -> Option<String>,
    {
        self.link(workspace, blame_url, remote).commit_url(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_first_resolution_wins() {
        let mut resolver = RevisionUrlResolver::new();
        let calls = Cell::new(0);
        let remote = |url: &'static str| {
            let calls = &calls;
            move || {
                calls.set(calls.get() + 1);
                Some(url.to_string())
            }
        };

        let first = resolver.commit_url("/ws", None, remote("git@github.com:org/repo.git"), "deadbeef");
        assert_eq!(first.as_deref(), Some("https://github.com/org/repo/commit/deadbeef"));

        let second = resolver.commit_url("/ws", None, remote("git@github.com:other/repo.git"), "cafe");
        assert_eq!(second.as_deref(), Some("https://github.com/org/repo/commit/cafe"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_workspaces_are_independent() {
        let mut resolver = RevisionUrlResolver::new();
        resolver.link("/a", None, || Some("https://github.com/org/a.git".to_string()));
        resolver.link("/b", None, || Some("https://gitlab.example.com/org/b.git".to_string()));
        assert!(matches!(resolver.cached("/a"), Some(RepositoryLink::GitHub { .. })));
        assert_eq!(resolver.cached("/b"), Some(&RepositoryLink::None));
        assert_eq!(resolver.cached("/c"), None);
    }

    #[test]
    fn test_unrecognized_remote_yields_no_url() {
        let mut resolver = RevisionUrlResolver::new();
        let url = resolver.commit_url(
            "/ws",
            None,
            || Some("https://gitlab.example.com/org/repo.git".to_string()),
            "deadbeef",
        );
        assert_eq!(url, None);
    }
}
