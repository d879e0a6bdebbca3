//! Smoke tests for the exported API, run in a browser or node with
//! `wasm-pack test --node`.
#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

const RAW: &[u8] = b"0123abcd 1 1 1\nauthor Dana\nauthor-mail <dana@example.com>\nauthor-time 1700000000\nauthor-tz +0000\ncommitter Dana\ncommitter-mail <dana@example.com>\ncommitter-time 1700000000\ncommitter-tz +0000\nsummary first\nfilename README.md\n\thello\n";

#[wasm_bindgen_test]
fn parse_blame_returns_records() {
    let json = gitblame_core::parse_blame(RAW);
    assert!(json.starts_with('['));
    assert!(json.contains("\"lineText\":\"hello\""));
}

#[wasm_bindgen_test]
fn document_lifecycle() {
    let opened: serde_json::Value =
        serde_json::from_str(&gitblame_core::open_document()).unwrap();
    let handle = opened["handle"].as_u64().unwrap() as u32;

    let begun: serde_json::Value =
        serde_json::from_str(&gitblame_core::begin_snapshot(handle, 1)).unwrap();
    let generation = begun["generation"].as_u64().unwrap();
    let display: serde_json::Value = serde_json::from_str(&gitblame_core::finish_snapshot(
        handle,
        generation,
        RAW,
        1,
        r#"["hello"]"#,
    ))
    .unwrap();
    assert_eq!(display["states"][0], "attributed");
    assert_eq!(gitblame_core::status_text(handle, 1), "Blame line 1 Dana");

    gitblame_core::free_document(handle);
    assert_eq!(gitblame_core::status_text(handle, 1), "");
}
