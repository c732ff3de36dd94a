//! Integration test: curl transport against a local HTTP server.

mod common;

use std::time::Duration;

use bpatch_core::downloader::{CurlTransport, ManifestSource, Transport};
use bpatch_core::retry::{classify, ErrorKind, TransferError};
use bpatch_core::storage::temp_path;
use common::patch_server::{self, Route};
use tempfile::tempdir;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn fetch_writes_body_and_renames() {
    let server = patch_server::start();
    let body: Vec<u8> = (0u8..=255).cycle().take(200 * 1024).collect();
    server.route("/1/abc123", Route::ok(body.clone()));

    let dir = tempdir().unwrap();
    let dest = dir.path().join("cache").join("abc123");
    let url = server.url("/1/abc123");
    let dest_clone = dest.clone();
    let written = tokio::task::spawn_blocking(move || {
        CurlTransport::new().fetch(&url, &dest_clone, TIMEOUT)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(written, body.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert!(!temp_path(&dest).exists());
}

#[test]
fn http_error_is_reported_and_nothing_is_finalized() {
    let server = patch_server::start();
    server.route("/1/busy", Route::status(503));

    let dir = tempdir().unwrap();
    let dest = dir.path().join("busy");
    let transport = CurlTransport::new();

    let err = transport
        .fetch(&server.url("/1/missing"), &dest, TIMEOUT)
        .unwrap_err();
    assert!(matches!(err, TransferError::Http(404)));
    assert_eq!(classify(&err), ErrorKind::Rejected(404));

    let err = transport
        .fetch(&server.url("/1/busy"), &dest, TIMEOUT)
        .unwrap_err();
    assert_eq!(classify(&err), ErrorKind::Throttled);
    assert!(!dest.exists());
}

#[test]
fn dropped_connection_leaves_partial_file() {
    let server = patch_server::start();
    server.route("/1/short", Route::truncated(vec![7u8; 1000], 4000));

    let dir = tempdir().unwrap();
    let dest = dir.path().join("short");
    let err = CurlTransport::new()
        .fetch(&server.url("/1/short"), &dest, TIMEOUT)
        .unwrap_err();

    assert_eq!(classify(&err), ErrorKind::Connection);
    assert!(!dest.exists());
    assert!(temp_path(&dest).exists(), "partial bytes are kept for a later attempt");
}

#[test]
fn fetch_text_returns_manifest_body() {
    let server = patch_server::start();
    server.route("/3/patch_manifest.json", Route::ok(r#"{"resource_version":3,"bundles":[]}"#));

    let text = CurlTransport::new()
        .fetch_text(&server.url("/3/patch_manifest.json"), TIMEOUT)
        .unwrap();
    assert!(text.contains("\"resource_version\":3"));
}
