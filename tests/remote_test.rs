#![cfg(feature = "http")]

mod common;

use common::{config_for, request_count, serve_http, write_collection_csv};
use csvflow::config::SourceConfig;
use csvflow::engine::QueryEngine;
use csvflow::source::{self, SourceError, SourceHandle};
use csvflow::{Interaction, Session, SessionOptions};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

const CSV: &[u8] = b"id,name\n1,bronze ding\n2,jade cong\n3,lacquer box\n";

fn engine() -> QueryEngine {
    QueryEngine::new(false, 1000, Duration::from_secs(10))
}

fn downloaded_copy(handle: &SourceHandle) -> PathBuf {
    match handle {
        SourceHandle::RemoteCsv { local, .. } | SourceHandle::RemoteParquet { local, .. } => {
            local.clone()
        }
        other => panic!("expected a downloaded source, got {:?}", other),
    }
}

#[test]
fn test_remote_csv_is_scanned_from_a_downloaded_copy() {
    let (base, _) = serve_http(vec![("/r.csv", 200, CSV.to_vec())]);
    let resolved = source::resolve(&format!("{}/r.csv", base), &SourceConfig::default()).unwrap();
    let mut engine = engine();
    let opened = source::open(&resolved, &mut engine).unwrap();

    assert_eq!(opened.handle.kind(), "remote CSV");
    assert_eq!(opened.schema, vec!["id", "name"]);
    assert!(opened.fallback_note.is_none());
    let local = downloaded_copy(&opened.handle);
    assert!(local.exists());

    engine.release(&opened.handle);
    assert!(!local.exists());
}

#[test]
fn test_error_status_is_a_fetch_failure() {
    let (base, hits) = serve_http(vec![]);
    let resolved =
        source::resolve(&format!("{}/missing.csv", base), &SourceConfig::default()).unwrap();
    let err = source::open(&resolved, &mut engine()).unwrap_err();

    match &err {
        SourceError::RemoteFetch {
            primary, message, ..
        } => {
            assert!(primary.contains("404"), "{}", primary);
            assert!(message.contains("404"), "{}", message);
        }
        other => panic!("expected RemoteFetch, got {:?}", other),
    }
    // The scan and the in-memory fetch each asked once.
    assert_eq!(request_count(&hits), 2);
}

#[test]
fn test_unparseable_payload_fails_both_paths_from_one_download() {
    let (base, hits) = serve_http(vec![("/bad.parquet", 200, CSV.to_vec())]);
    let resolved =
        source::resolve(&format!("{}/bad.parquet", base), &SourceConfig::default()).unwrap();
    let err = source::open(&resolved, &mut engine()).unwrap_err();

    match &err {
        SourceError::FallbackFailed {
            primary, fallback, ..
        } => {
            assert!(!primary.is_empty());
            assert!(!fallback.is_empty());
        }
        other => panic!("expected FallbackFailed, got {:?}", other),
    }
    assert_eq!(request_count(&hits), 1);
}

#[test]
fn test_switching_source_removes_previous_download() {
    let (base, hits) = serve_http(vec![("/r.csv", 200, CSV.to_vec())]);
    let url = format!("{}/r.csv", base);
    let dir = TempDir::new().unwrap();
    write_collection_csv(dir.path(), "local", 12);

    let mut session = Session::open(config_for(&dir), &url, &SessionOptions::default());
    let first = downloaded_copy(&session.source().unwrap().handle);
    assert!(first.exists());

    let view = session
        .handle(Interaction::OpenSource(url.clone()))
        .view
        .unwrap();
    assert_eq!(view.total, 3);
    let second = downloaded_copy(&session.source().unwrap().handle);
    assert!(!first.exists());
    assert!(second.exists());
    assert_eq!(request_count(&hits), 2);

    session.apply(Interaction::OpenSource("local.csv".to_string()));
    assert!(!second.exists());
}
