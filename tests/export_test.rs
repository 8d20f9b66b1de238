mod common;

use chrono::NaiveDate;
use common::{config_for, write_collection_csv};
use csvflow::{ExportKind, Interaction, Session, SessionOptions};
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

fn read_back(path: &Path) -> DataFrame {
    let bytes = std::fs::read(path).unwrap();
    CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .unwrap()
}

fn session(rows: usize) -> (TempDir, Session) {
    let dir = TempDir::new().unwrap();
    write_collection_csv(dir.path(), "d01_s1", rows);
    let mut session = Session::open(config_for(&dir), "d01_s1.csv", &SessionOptions::default());
    session.cycle();
    (dir, session)
}

fn at() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 9)
        .unwrap()
        .and_hms_opt(14, 5, 7)
        .unwrap()
}

#[test]
fn test_page_export_name_and_rows() {
    let (dir, mut session) = session(130);
    session.handle(Interaction::SetPageSize(50));
    session.handle(Interaction::GotoPage(3));
    let out = dir.path().join("out");
    let path = session.export(ExportKind::Page, &out, at()).unwrap();
    assert_eq!(path, out.join("d01_s1_page_20240309_140507.csv"));
    let df = read_back(&path);
    assert_eq!(df.height(), 30);
    assert_eq!(df.width(), 7);
}

#[test]
fn test_full_export_uses_filter_not_page() {
    let (dir, mut session) = session(130);
    session.handle(Interaction::SetPageSize(25));
    session.handle(Interaction::SetKeyword("jade".to_string()));
    session.handle(Interaction::ToggleDisplayColumn("url".to_string()));
    let out = dir.path().join("out");
    let path = session.export(ExportKind::All, &out, at()).unwrap();
    assert!(path.ends_with("d01_s1_filtered_20240309_140507.csv"));
    assert!(dir.path().join("scratch.csv").is_file());
    let df = read_back(&path);
    assert_eq!(df.height(), 33);
    assert!(df.column("url").is_err());
}

#[test]
fn test_node_exports() {
    let (dir, session) = session(60);
    let out = dir.path().join("out");

    let nodes = read_back(&session.export(ExportKind::Nodes, &out, at()).unwrap());
    assert_eq!(nodes.height(), 60);
    let names: Vec<String> = nodes
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(names, vec!["id", "sk1", "sk2", "sk3"]);

    let counts = read_back(&session.export(ExportKind::NodeCounts, &out, at()).unwrap());
    let total: i64 = counts
        .column("count")
        .unwrap()
        .as_materialized_series()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .sum();
    assert_eq!(total, 60);
    let missing = counts
        .column("sk3")
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .any(|v| v == Some("(missing)"));
    assert!(missing);
}

#[test]
fn test_node_export_needs_flow_columns() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("plain.csv"), "a,b\n1,2\n").unwrap();
    let session = Session::open(config_for(&dir), "plain.csv", &SessionOptions::default());
    let err = session
        .export(ExportKind::Nodes, dir.path(), at())
        .unwrap_err();
    assert!(err.to_string().contains("sk1"));
}
