pub mod blame;
pub mod config;
pub mod error;
pub mod incremental;
pub mod remote;
pub mod render;
pub mod session;

use std::sync::Mutex;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use blame::AnnotationRecord;
use config::BlameConfig;
use error::BlameError;
use incremental::{EditDelta, LineState, Mode, SparseDocument, UpdateOutcome};
use remote::RevisionUrlResolver;
use render::ColorCache;
use session::{DocumentSession, Sessions};

// ---------------------------------------------------------------------------
// Handle storage for per-document blame sessions across WASM calls.
// ---------------------------------------------------------------------------

/// Global engine state. Uses OnceLock for lazy one-time initialization and
/// Mutex for interior mutability.
fn engine() -> &'static Mutex<Engine> {
    static ENGINE: OnceLock<Mutex<Engine>> = OnceLock::new();
    ENGINE.get_or_init(|| Mutex::new(Engine::new()))
}

struct Engine {
    sessions: Sessions<u32>,
    next_handle: u32,
    /// Commit links, resolved once per workspace for the process lifetime.
    resolver: RevisionUrlResolver,
    colors: ColorCache,
}

impl Engine {
    fn new() -> Self {
        Engine {
            sessions: Sessions::new(BlameConfig::default()),
            next_handle: 1,
            resolver: RevisionUrlResolver::new(),
            colors: ColorCache::default(),
        }
    }

    fn open(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1);
        if self.next_handle == 0 {
            self.next_handle = 1; // skip 0 as a sentinel
        }
        self.sessions.open(handle);
        handle
    }

    fn session(&mut self, handle: u32) -> Result<&mut DocumentSession, String> {
        self.sessions
            .get_mut(&handle)
            .ok_or_else(|| format!("Invalid handle: {}", handle))
    }
}

// ---------------------------------------------------------------------------
// JSON payloads exchanged with the extension.
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DisplayResult<'a> {
    handle: u32,
    mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<UpdateOutcome>,
    states: Vec<LineState>,
    lines: Vec<Option<&'a AnnotationRecord>>,
}

impl<'a> DisplayResult<'a> {
    fn new(handle: u32, session: &'a DocumentSession, outcome: Option<UpdateOutcome>) -> Self {
        DisplayResult {
            handle,
            mode: session.updater().mode(),
            outcome,
            states: session.updater().states(),
            lines: session.display(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderedLine<'a> {
    state: LineState,
    label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revision_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct EditRequest {
    delta: EditDelta,
    document: SparseDocument,
}

#[derive(Serialize)]
struct ErrorResult {
    error: String,
}

fn json_error(msg: &str) -> String {
    serde_json::to_string(&ErrorResult {
        error: msg.to_string(),
    })
    .unwrap_or_else(|_| format!("{{\"error\":\"{}\"}}", msg))
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| json_error(&format!("Serialization error: {}", e)))
}

fn parse_request<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, BlameError> {
    serde_json::from_str(json).map_err(BlameError::InvalidRequest)
}

macro_rules! lock_engine {
    () => {
        match engine().lock() {
            Ok(e) => e,
            Err(_) => return json_error("Failed to acquire engine lock"),
        }
    };
}

// ---------------------------------------------------------------------------
// WASM-exported functions
// ---------------------------------------------------------------------------

/// Apply extension settings (JSON `BlameConfig`).
///
/// Affects documents opened afterwards; the palette applies immediately.
#[wasm_bindgen]
pub fn configure(config_json: &str) -> String {
    let config = match BlameConfig::from_json(config_json) {
        Ok(c) => c,
        Err(e) => return json_error(&e.to_string()),
    };
    let mut engine = lock_engine!();
    engine.colors.set_palette(config.palette.clone());
    engine.sessions.set_config(config);
    to_json(&serde_json::json!({ "ok": true }))
}

/// Parse raw `git blame --line-porcelain` output into JSON.
///
/// Returns: JSON array of AnnotationRecord objects, or `{ error }`.
#[wasm_bindgen]
pub fn parse_blame(raw_blame: &[u8]) -> String {
    match blame::parse_blame_output(raw_blame) {
        Ok(records) => to_json(&records),
        Err(e) => json_error(&e.to_string()),
    }
}

/// Start tracking a document.
///
/// Returns: JSON `{ handle }`. The handle must be freed with
/// `free_document` when the document closes.
#[wasm_bindgen]
pub fn open_document() -> String {
    let mut engine = lock_engine!();
    let handle = engine.open();
    to_json(&serde_json::json!({ "handle": handle }))
}

/// Reserve the snapshot slot before running `git blame` for a save at
/// editor `version`.
///
/// Returns: JSON `{ generation }`, `{ skip: true }` when that version is
/// already blamed (git need not run), or `{ error }` if a run is already
/// outstanding for this document.
#[wasm_bindgen]
pub fn begin_snapshot(handle: u32, version: i64) -> String {
    let mut engine = lock_engine!();
    let session = match engine.session(handle) {
        Ok(s) => s,
        Err(e) => return json_error(&e),
    };
    match session.begin_snapshot_for(version) {
        Ok(Some(generation)) => to_json(&serde_json::json!({ "generation": generation })),
        Ok(None) => to_json(&serde_json::json!({ "skip": true })),
        Err(e) => json_error(&e.to_string()),
    }
}

/// Install blame output for a saved document.
///
/// `lines_json` is a JSON array with the full saved text, one string per
/// line. Returns: JSON `{ handle, mode, states, lines }`, or `{ error }` if
/// the output was malformed (the document then shows no attribution).
#[wasm_bindgen]
pub fn finish_snapshot(
    handle: u32,
    generation: u64,
    raw_blame: &[u8],
    version: i64,
    lines_json: &str,
) -> String {
    let lines: Vec<String> = match parse_request(lines_json) {
        Ok(l) => l,
        Err(e) => return json_error(&e.to_string()),
    };
    let mut engine = lock_engine!();
    let session = match engine.session(handle) {
        Ok(s) => s,
        Err(e) => return json_error(&e),
    };
    match session.finish_snapshot(generation, raw_blame, Some(version), &lines) {
        Ok(()) => to_json(&DisplayResult::new(handle, session, None)),
        Err(e) => json_error(&e.to_string()),
    }
}

/// Give up on an outstanding blame run (git failed or was cancelled).
#[wasm_bindgen]
pub fn abort_snapshot(handle: u32, generation: u64, line_count: usize) -> String {
    let mut engine = lock_engine!();
    let session = match engine.session(handle) {
        Ok(s) => s,
        Err(e) => return json_error(&e),
    };
    match session.abort_snapshot(generation, &SparseDocument::new(line_count)) {
        Ok(()) => to_json(&DisplayResult::new(handle, session, None)),
        Err(e) => json_error(&e.to_string()),
    }
}

/// Apply one content change of a dirty document.
///
/// Input: JSON `{ delta: { start, end, text }, document: { lineCount, lines } }`
/// where `lines` maps 1-based line numbers to text for the touched lines.
/// Returns: JSON `{ handle, mode, outcome, states, lines }`.
#[wasm_bindgen]
pub fn apply_edit(handle: u32, edit_json: &str) -> String {
    let request: EditRequest = match parse_request(edit_json) {
        Ok(r) => r,
        Err(e) => return json_error(&e.to_string()),
    };
    let mut engine = lock_engine!();
    let session = match engine.session(handle) {
        Ok(s) => s,
        Err(e) => return json_error(&e),
    };
    let outcome = session.apply_edit(&request.delta, &request.document);
    to_json(&DisplayResult::new(handle, session, Some(outcome)))
}

/// Labels and colors for every line of a document, ready for decorations.
#[wasm_bindgen]
pub fn render_lines(handle: u32) -> String {
    let mut engine = lock_engine!();
    let Engine {
        sessions, colors, ..
    } = &mut *engine;
    let label_config = sessions.config().label.clone();
    let session = match sessions.get(&handle) {
        Some(s) => s,
        None => return json_error(&format!("Invalid handle: {}", handle)),
    };
    let updater = session.updater();
    let rendered: Vec<RenderedLine> = (1..=updater.line_count())
        .map(|line| {
            let state = updater.state(line).unwrap_or(LineState::Uncommitted);
            match updater.record(line) {
                Some(rec) => RenderedLine {
                    state,
                    label: render::line_label(rec, &label_config),
                    color: rec
                        .is_committed()
                        .then(|| colors.color_for(&rec.revision_id).map(str::to_string))
                        .flatten(),
                    revision_id: Some(rec.revision_id.as_str()),
                },
                None => RenderedLine {
                    state,
                    label: render::empty_label(&label_config),
                    color: None,
                    revision_id: None,
                },
            }
        })
        .collect();
    to_json(&rendered)
}

/// Status bar text for a 1-based line, or an empty string.
#[wasm_bindgen]
pub fn status_text(handle: u32, line: usize) -> String {
    let engine = match engine().lock() {
        Ok(e) => e,
        Err(_) => return String::new(),
    };
    engine
        .sessions
        .get(&handle)
        .and_then(|s| s.updater().record(line))
        .and_then(|rec| render::status_text(line, rec))
        .unwrap_or_default()
}

/// Browsable URL for a revision, or an empty string.
///
/// `remote` is the output of `git config --get remote.origin.url` for the
/// workspace (empty if there is none); it is only consulted the first time
/// a workspace is resolved.
#[wasm_bindgen]
pub fn resolve_commit_url(workspace: &str, remote: &str, revision: &str) -> String {
    let mut engine = match engine().lock() {
        Ok(e) => e,
        Err(_) => return String::new(),
    };
    let Engine {
        sessions, resolver, ..
    } = &mut *engine;
    let blame_url = sessions.config().blame_url.clone();
    let remote = (!remote.is_empty()).then(|| remote.to_string());
    resolver
        .commit_url(workspace, blame_url.as_deref(), || remote, revision)
        .unwrap_or_default()
}

/// URL for an attributed line of a document, anchored to the line where the
/// host supports it; empty string when there is none.
#[wasm_bindgen]
pub fn line_url(handle: u32, workspace: &str, remote: &str, line: usize) -> String {
    let mut engine = match engine().lock() {
        Ok(e) => e,
        Err(_) => return String::new(),
    };
    let Engine {
        sessions, resolver, ..
    } = &mut *engine;
    let Some(record) = sessions.get(&handle).and_then(|s| s.updater().record(line)) else {
        return String::new();
    };
    let blame_url = sessions.config().blame_url.as_deref();
    let remote = (!remote.is_empty()).then(|| remote.to_string());
    resolver
        .link(workspace, blame_url, || remote)
        .line_url(record)
        .unwrap_or_default()
}

/// Stop tracking a document. Any snapshot still in flight is dropped.
#[wasm_bindgen]
pub fn free_document(handle: u32) {
    if let Ok(mut engine) = engine().lock() {
        engine.sessions.close(&handle);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &[u8] = b"aaa111 1 1 2\nauthor X\nauthor-mail <x@y>\nauthor-time 1000\nauthor-tz +0000\ncommitter X\ncommitter-mail <x@y>\ncommitter-time 1000\ncommitter-tz +0000\nsummary s\nfilename f\n\tline one\naaa111 2 2\n\tline two\n";

    fn open() -> u32 {
        let parsed: serde_json::Value = serde_json::from_str(&open_document()).unwrap();
        parsed["handle"].as_u64().unwrap() as u32
    }

    fn snapshot(handle: u32) -> serde_json::Value {
        let begun: serde_json::Value = serde_json::from_str(&begin_snapshot(handle, 1)).unwrap();
        let generation = begun["generation"].as_u64().unwrap();
        let result = finish_snapshot(handle, generation, RAW, 1, r#"["line one","line two"]"#);
        serde_json::from_str(&result).unwrap()
    }

    #[test]
    fn test_parse_blame_wasm() {
        let parsed: serde_json::Value = serde_json::from_str(&parse_blame(RAW)).unwrap();
        assert!(parsed.is_array());
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[1]["author"]["name"], "X");
        assert_eq!(parsed[1]["lineText"], "line two");
    }

    #[test]
    fn test_parse_blame_error_wasm() {
        let parsed: serde_json::Value =
            serde_json::from_str(&parse_blame(b"aaa111 1 1\n\tline\n")).unwrap();
        assert!(parsed["error"].as_str().unwrap().contains("malformed"));
    }

    #[test]
    fn test_snapshot_and_edit_wasm() {
        let handle = open();
        let display = snapshot(handle);
        assert_eq!(display["mode"], "cleanDerived");
        assert_eq!(display["states"], serde_json::json!(["attributed", "attributed"]));

        let edit = r#"{"delta":{"start":{"line":0,"character":8},"end":{"line":0,"character":8},"text":"\n"},
                       "document":{"lineCount":3,"lines":{"1":"line one","2":""}}}"#;
        let result: serde_json::Value = serde_json::from_str(&apply_edit(handle, edit)).unwrap();
        assert_eq!(result["mode"], "dirtyIncremental");
        assert_eq!(result["outcome"]["kind"], "newlineInsertion");
        assert_eq!(
            result["states"],
            serde_json::json!(["attributed", "uncommitted", "attributed"])
        );
        assert!(result["lines"][1].is_null());
        assert_eq!(result["lines"][2]["lineText"], "line two");

        free_document(handle);
        let err: serde_json::Value = serde_json::from_str(&apply_edit(handle, edit)).unwrap();
        assert!(err.get("error").is_some());
    }

    #[test]
    fn test_second_begin_is_rejected_wasm() {
        let handle = open();
        let first: serde_json::Value = serde_json::from_str(&begin_snapshot(handle, 1)).unwrap();
        let second: serde_json::Value = serde_json::from_str(&begin_snapshot(handle, 1)).unwrap();
        assert!(second.get("error").is_some());

        let generation = first["generation"].as_u64().unwrap();
        let aborted: serde_json::Value =
            serde_json::from_str(&abort_snapshot(handle, generation, 2)).unwrap();
        assert_eq!(aborted["states"], serde_json::json!(["uncommitted", "uncommitted"]));
        free_document(handle);
    }

    #[test]
    fn test_save_at_blamed_version_skips_wasm() {
        let handle = open();
        snapshot(handle);
        let again: serde_json::Value = serde_json::from_str(&begin_snapshot(handle, 1)).unwrap();
        assert_eq!(again, serde_json::json!({ "skip": true }));

        let edit = r#"{"delta":{"start":{"line":1,"character":8},"end":{"line":1,"character":8},"text":"!"},
                       "document":{"lineCount":2,"lines":{"2":"line two!"}}}"#;
        apply_edit(handle, edit);
        let dirty: serde_json::Value = serde_json::from_str(&begin_snapshot(handle, 1)).unwrap();
        assert!(dirty["generation"].is_u64());
        free_document(handle);
    }

    #[test]
    fn test_bad_request_payload_wasm() {
        let handle = open();
        let err: serde_json::Value =
            serde_json::from_str(&apply_edit(handle, r#"{"delta":{}}"#)).unwrap();
        let msg = err["error"].as_str().unwrap();
        assert!(msg.starts_with("invalid request payload"), "{msg}");

        let begun: serde_json::Value = serde_json::from_str(&begin_snapshot(handle, 1)).unwrap();
        let generation = begun["generation"].as_u64().unwrap();
        let err: serde_json::Value =
            serde_json::from_str(&finish_snapshot(handle, generation, RAW, 1, "not json")).unwrap();
        assert!(err["error"].as_str().unwrap().starts_with("invalid request payload"));
        free_document(handle);
    }

    #[test]
    fn test_render_lines_and_status_wasm() {
        let handle = open();
        snapshot(handle);
        let rendered: serde_json::Value = serde_json::from_str(&render_lines(handle)).unwrap();
        assert_eq!(rendered.as_array().unwrap().len(), 2);
        assert_eq!(rendered[0]["revisionId"], "aaa111");
        assert!(rendered[0]["label"].as_str().unwrap().starts_with("aaa111"));
        assert_eq!(status_text(handle, 1), "Blame line 1 X");
        assert_eq!(status_text(handle, 9), "");
        free_document(handle);
    }

    #[test]
    fn test_configure_wasm() {
        let ok: serde_json::Value =
            serde_json::from_str(&configure(r##"{"palette":["#aa0000","#00aa00"]}"##)).unwrap();
        assert_eq!(ok["ok"], true);
        let err: serde_json::Value =
            serde_json::from_str(&configure(r#"{"trailingCharAllowance":"x"}"#)).unwrap();
        assert!(err["error"].as_str().unwrap().contains("invalid configuration"));
    }

    #[test]
    fn test_line_url_wasm() {
        let handle = open();
        snapshot(handle);
        let url = line_url(handle, "/ws/lines", "https://github.com/org/repo", 2);
        assert!(url.starts_with("https://github.com/org/repo/commit/aaa111#diff-"));
        assert!(url.ends_with("R2"));
        assert_eq!(line_url(handle, "/ws/lines", "", 5), "");
        free_document(handle);
    }

    #[test]
    fn test_resolve_commit_url_wasm() {
        assert_eq!(
            resolve_commit_url("/ws/github", "git@github.com:org/repo.git", "deadbeef"),
            "https://github.com/org/repo/commit/deadbeef"
        );
        assert_eq!(
            resolve_commit_url("/ws/gitlab", "https://gitlab.example.com/org/repo.git", "deadbeef"),
            ""
        );
        // First resolution wins for the workspace.
        assert_eq!(
            resolve_commit_url("/ws/github", "", "cafe"),
            "https://github.com/org/repo/commit/cafe"
        );
    }
}
