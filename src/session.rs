use std::collections::HashMap;
use std::hash::Hash;

use log::{debug, warn};

use crate::blame::{parse_blame_output, AnnotationRecord, AnnotationStore};
use crate::config::BlameConfig;
use crate::error::{BlameError, Result};
use crate::incremental::{EditDelta, IncrementalUpdater, LiveDocument, UpdateOutcome};

/// Blame state for one open document: the last clean snapshot and the
/// display state derived from it.
#[derive(Debug, Clone)]
pub struct DocumentSession {
    store: Option<AnnotationStore>,
    updater: IncrementalUpdater,
    /// Generation of the snapshot parse currently in flight.
    pending: Option<u64>,
    next_generation: u64,
    /// Editor version the current store was taken at.
    snapshot_version: Option<i64>,
}

impl DocumentSession {
    pub fn new(config: &BlameConfig) -> Self {
        DocumentSession {
            store: None,
            updater: IncrementalUpdater::new(config.trailing_char_allowance),
            pending: None,
            next_generation: 1,
            snapshot_version: None,
        }
    }

    /// Whether a save at `version` calls for a new blame run.
    pub fn needs_snapshot(&self, version: i64) -> bool {
        self.pending.is_none() && self.snapshot_version != Some(version)
    }

    pub fn snapshot_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Reserve the single outstanding snapshot slot. The returned
    /// generation must be handed back to `finish_snapshot` or
    /// `abort_snapshot`.
    pub fn begin_snapshot(&mut self) -> Result<u64> {
        if let Some(generation) = self.pending {
            return Err(BlameError::SnapshotInFlight(generation));
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        self.pending = Some(generation);
        Ok(generation)
    }

    /// `begin_snapshot` for a save at editor `version`. Returns `None` when
    /// the store already reflects that version and no blame run is needed.
    pub fn begin_snapshot_for(&mut self, version: i64) -> Result<Option<u64>> {
        if self.pending.is_none() && !self.needs_snapshot(version) {
            debug!("save at version {version} already blamed; skipping");
            return Ok(None);
        }
        self.begin_snapshot().map(Some)
    }

    fn take_pending(&mut self, generation: u64) -> Result<()> {
        if self.pending != Some(generation) {
            return Err(BlameError::StaleSnapshot {
                got: generation,
                expected: self.pending,
            });
        }
        self.pending = None;
        Ok(())
    }

    /// Install the blame output for a clean snapshot. `doc` must hold the
    /// full saved text.
    ///
    /// On a parse error the previous store is dropped and every line shows
    /// as uncommitted.
    pub fn finish_snapshot<D: LiveDocument + ?Sized>(
        &mut self,
        generation: u64,
        raw: &[u8],
        version: Option<i64>,
        doc: &D,
    ) -> Result<()> {
        self.take_pending(generation)?;
        match parse_blame_output(raw) {
            Ok(records) => {
                debug!("snapshot {generation}: {} blame records", records.len());
                self.store = Some(AnnotationStore::from_records(records));
                self.snapshot_version = version;
                self.updater.reset(self.store.as_ref(), doc);
                Ok(())
            }
            Err(e) => {
                warn!("snapshot {generation} discarded: {e}");
                self.discard(doc);
                Err(e)
            }
        }
    }

    /// The blame run failed or was cancelled; drop the store.
    pub fn abort_snapshot<D: LiveDocument + ?Sized>(&mut self, generation: u64, doc: &D) -> Result<()> {
        self.take_pending(generation)?;
        debug!("snapshot {generation} aborted");
        self.discard(doc);
        Ok(())
    }

    fn discard<D: LiveDocument + ?Sized>(&mut self, doc: &D) {
        self.store = None;
        self.snapshot_version = None;
        self.updater.reset(None, doc);
    }

    /// Feed one edit of the dirty document. `doc` reflects the text after
    /// the edit.
    pub fn apply_edit<D: LiveDocument + ?Sized>(&mut self, delta: &EditDelta, doc: &D) -> UpdateOutcome {
        self.snapshot_version = None;
        self.updater.apply(delta, doc)
    }

    pub fn store(&self) -> Option<&AnnotationStore> {
        self.store.as_ref()
    }

    pub fn updater(&self) -> &IncrementalUpdater {
        &self.updater
    }

    pub fn display(&self) -> Vec<Option<&AnnotationRecord>> {
        self.updater.display()
    }
}

/// Open documents and their blame sessions, keyed by document identity.
#[derive(Debug)]
pub struct Sessions<K> {
    config: BlameConfig,
    sessions: HashMap<K, DocumentSession>,
}

impl<K: Eq + Hash> Sessions<K> {
    pub fn new(config: BlameConfig) -> Self {
        Sessions {
            config,
            sessions: HashMap::new(),
        }
    }

    pub fn config(&self) -> &BlameConfig {
        &self.config
    }

    /// Replace the settings used for documents opened from now on.
    pub fn set_config(&mut self, config: BlameConfig) {
        self.config = config;
    }

    /// Session for `key`, created on first open.
    pub fn open(&mut self, key: K) -> &mut DocumentSession {
        let config = &self.config;
        self.sessions
            .entry(key)
            .or_insert_with(|| DocumentSession::new(config))
    }

    pub fn get(&self, key: &K) -> Option<&DocumentSession> {
        self.sessions.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut DocumentSession> {
        self.sessions.get_mut(key)
    }

    /// Forget a closed document. A snapshot still in flight for it will find
    /// no session and is dropped.
    pub fn close(&mut self, key: &K) -> bool {
        self.sessions.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incremental::{LineState, Position};

    const SCENARIO: &[u8] = b"aaa111 1 1 2\nauthor X\nauthor-mail <x@y>\nauthor-time 1000\nauthor-tz +0000\ncommitter X\ncommitter-mail <x@y>\ncommitter-time 1000\ncommitter-tz +0000\nsummary s\nfilename f\n\tline one\naaa111 2 2\n\tline two\n";

    fn doc() -> Vec<&'static str> {
        vec!["line one", "line two"]
    }

    #[test]
    fn test_snapshot_lifecycle() {
        let mut session = DocumentSession::new(&BlameConfig::default());
        assert!(session.needs_snapshot(1));
        let generation = session.begin_snapshot().unwrap();
        assert!(!session.needs_snapshot(1));
        session.finish_snapshot(generation, SCENARIO, Some(1), &doc()).unwrap();

        assert!(!session.needs_snapshot(1));
        assert!(session.needs_snapshot(2));
        assert_eq!(session.store().unwrap().len(), 2);
        assert_eq!(session.display()[1].unwrap().line_text, "line two");
    }

    #[test]
    fn test_save_at_blamed_version_is_skipped() {
        let mut session = DocumentSession::new(&BlameConfig::default());
        let generation = session.begin_snapshot_for(3).unwrap().unwrap();
        assert!(matches!(
            session.begin_snapshot_for(3),
            Err(BlameError::SnapshotInFlight(g)) if g == generation
        ));
        session.finish_snapshot(generation, SCENARIO, Some(3), &doc()).unwrap();

        assert_eq!(session.begin_snapshot_for(3).unwrap(), None);
        assert!(!session.snapshot_in_flight());
        assert!(session.begin_snapshot_for(4).unwrap().is_some());
    }

    #[test]
    fn test_one_snapshot_at_a_time() {
        let mut session = DocumentSession::new(&BlameConfig::default());
        let first = session.begin_snapshot().unwrap();
        assert!(matches!(
            session.begin_snapshot(),
            Err(BlameError::SnapshotInFlight(g)) if g == first
        ));
        assert!(matches!(
            session.finish_snapshot(first + 1, SCENARIO, None, &doc()),
            Err(BlameError::StaleSnapshot { .. })
        ));
        assert!(session.snapshot_in_flight());
        session.finish_snapshot(first, SCENARIO, None, &doc()).unwrap();
        assert!(session.begin_snapshot().is_ok());
    }

    #[test]
    fn test_failed_parse_discards_store() {
        let mut session = DocumentSession::new(&BlameConfig::default());
        let generation = session.begin_snapshot().unwrap();
        session.finish_snapshot(generation, SCENARIO, Some(1), &doc()).unwrap();

        let generation = session.begin_snapshot().unwrap();
        let err = session
            .finish_snapshot(generation, b"aaa111 1 1\n\tline one\n", Some(2), &doc())
            .unwrap_err();
        assert!(matches!(err, BlameError::MalformedBlameOutput { .. }));
        assert!(session.store().is_none());
        assert_eq!(session.updater().states(), vec![LineState::Uncommitted; 2]);
        assert!(!session.snapshot_in_flight());
    }

    #[test]
    fn test_abort_discards_store() {
        let mut session = DocumentSession::new(&BlameConfig::default());
        let generation = session.begin_snapshot().unwrap();
        session.finish_snapshot(generation, SCENARIO, Some(1), &doc()).unwrap();
        let generation = session.begin_snapshot().unwrap();
        session.abort_snapshot(generation, &doc()).unwrap();
        assert!(session.store().is_none());
        assert!(session.display().iter().all(Option::is_none));
    }

    #[test]
    fn test_edit_marks_session_dirty() {
        let mut session = DocumentSession::new(&BlameConfig::default());
        let generation = session.begin_snapshot().unwrap();
        session.finish_snapshot(generation, SCENARIO, Some(1), &doc()).unwrap();

        let edited = vec!["line one", "line TWO"];
        session.apply_edit(&EditDelta::new(Position::new(1, 5), Position::new(1, 8), "TWO"), &edited);
        assert_eq!(session.updater().state(2), Some(LineState::Stale));
        assert!(session.needs_snapshot(1));
    }

    #[test]
    fn test_sessions_open_and_close() {
        let mut sessions: Sessions<String> = Sessions::new(BlameConfig::default());
        let generation = sessions.open("a.rs".to_string()).begin_snapshot().unwrap();
        sessions.open("b.rs".to_string());
        assert_eq!(sessions.len(), 2);

        assert!(sessions.close(&"a.rs".to_string()));
        assert!(sessions.get_mut(&"a.rs".to_string()).is_none());
        // Reopening starts from scratch; the old generation is unknown.
        let session = sessions.open("a.rs".to_string());
        assert!(session.finish_snapshot(generation, SCENARIO, None, &doc()).is_err());
        assert!(!sessions.is_empty());
    }

    #[test]
    fn test_config_applies_to_new_sessions() {
        let mut sessions: Sessions<u32> = Sessions::new(BlameConfig::default());
        sessions.open(1);
        sessions.set_config(BlameConfig {
            trailing_char_allowance: 0,
            ..BlameConfig::default()
        });
        sessions.open(2);

        let edited = vec!["line one", "line twoX"];
        let delta = EditDelta::insert(Position::new(1, 8), "X");
        for key in [1, 2] {
            let session = sessions.get_mut(&key).unwrap();
            let generation = session.begin_snapshot().unwrap();
            session.finish_snapshot(generation, SCENARIO, None, &doc()).unwrap();
            session.apply_edit(&delta, &edited);
        }
        assert_eq!(sessions.get(&1).unwrap().updater().state(2), Some(LineState::Attributed));
        assert_eq!(sessions.get(&2).unwrap().updater().state(2), Some(LineState::Stale));
    }
}
