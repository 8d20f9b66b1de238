mod common;

use common::{config_for, write_collection_csv};
use csvflow::pagination::{PageNav, PAGE_SIZES};
use csvflow::roles::ColumnRole;
use csvflow::session::PageView;
use csvflow::source::{SourceError, SourceHandle};
use csvflow::{BrowseError, Interaction, Session, SessionOptions};
use polars::prelude::*;
use std::fs::File;
use tempfile::TempDir;

fn open(rows: usize) -> (TempDir, Session) {
    let dir = TempDir::new().unwrap();
    write_collection_csv(dir.path(), "collection", rows);
    let session = Session::open(config_for(&dir), "collection.csv", &SessionOptions::default());
    (dir, session)
}

fn view(session: &mut Session, interaction: Interaction) -> PageView {
    session.handle(interaction).view.unwrap()
}

#[test]
fn test_pages_cover_every_row_once() {
    let (_dir, mut session) = open(237);
    for size in PAGE_SIZES {
        session.apply(Interaction::Navigate(PageNav::First));
        let first = view(&mut session, Interaction::SetPageSize(size));
        let mut seen = first.frame.height();
        for page in 2..=first.total_pages {
            let v = view(&mut session, Interaction::GotoPage(page));
            assert_eq!(v.page, page);
            seen += v.frame.height();
        }
        assert_eq!(seen, 237, "page size {}", size);
    }
}

#[test]
fn test_last_page_holds_the_remainder() {
    let (_dir, mut session) = open(237);
    session.apply(Interaction::SetPageSize(50));
    session.cycle();
    let v = view(&mut session, Interaction::Navigate(PageNav::Last));
    assert_eq!(v.total_pages, 5);
    assert_eq!(v.frame.height(), 37);
    let ids = v.frame.column("id").unwrap().as_materialized_series().i64().unwrap();
    assert_eq!(ids.get(0), Some(200));
}

#[test]
fn test_navigation_is_idempotent_at_the_edges() {
    let (_dir, mut session) = open(120);
    assert_eq!(view(&mut session, Interaction::Navigate(PageNav::Prev)).page, 1);
    assert_eq!(view(&mut session, Interaction::Navigate(PageNav::Last)).page, 2);
    assert_eq!(view(&mut session, Interaction::Navigate(PageNav::Next)).page, 2);
}

#[test]
fn test_narrowing_filter_resets_page() {
    let (_dir, mut session) = open(400);
    assert_eq!(view(&mut session, Interaction::SetPageSize(25)).total_pages, 16);
    assert_eq!(view(&mut session, Interaction::GotoPage(12)).page, 12);
    let v = view(&mut session, Interaction::SetKeyword("lacquer".to_string()));
    assert_eq!(v.total, 100);
    assert_eq!(v.page, 1);
}

#[test]
fn test_keyword_is_case_insensitive() {
    let (_dir, mut session) = open(200);
    let lower = view(&mut session, Interaction::SetKeyword("bronze".to_string()));
    let upper = view(&mut session, Interaction::SetKeyword("BrOnZe".to_string()));
    assert_eq!(lower.total, 100);
    assert_eq!(upper.total, lower.total);
    assert_eq!(lower.base_total, 200);
    assert!(lower.filtered);
}

#[test]
fn test_empty_keyword_matches_base_count() {
    let (_dir, mut session) = open(64);
    let v = view(&mut session, Interaction::SetKeyword(String::new()));
    assert_eq!(v.total, v.base_total);
    assert!(!v.filtered);
    assert_eq!(v.status_line(), "64 rows, page 1 / 1");
}

#[test]
fn test_keyword_only_searches_selected_columns() {
    let (_dir, mut session) = open(40);
    session.apply(Interaction::ToggleSearchColumn("title".to_string()));
    let v = view(&mut session, Interaction::SetKeyword("vessel".to_string()));
    // sk3 holds "Vessel" in four of five rows
    assert_eq!(v.total, 32);
}

#[test]
fn test_keyword_without_search_columns_shows_every_row() {
    let (_dir, mut session) = open(40);
    for column in session.filter.search_columns.clone() {
        session.apply(Interaction::ToggleSearchColumn(column));
    }
    assert!(session.filter.search_columns.is_empty());
    let v = view(&mut session, Interaction::SetKeyword("no such text".to_string()));
    assert_eq!(v.total, 40);
    assert_eq!(v.base_total, 40);
    assert!(!v.filtered);
}

#[test]
fn test_page_roles_follow_visible_columns() {
    let (_dir, mut session) = open(10);
    let v = session.cycle().view.unwrap();
    assert_eq!(v.roles.role_of("url"), Some(ColumnRole::Link));
    assert_eq!(v.roles.role_of("imageUrl_s"), Some(ColumnRole::Image));

    let v = view(&mut session, Interaction::ToggleDisplayColumn("url".to_string()));
    assert!(!v.columns.contains(&"url".to_string()));
    assert_eq!(v.roles.link, None);
}

#[test]
fn test_switching_source_resets_filter_and_page() {
    let dir = TempDir::new().unwrap();
    write_collection_csv(dir.path(), "first", 300);
    write_collection_csv(dir.path(), "second", 30);
    let mut session = Session::open(config_for(&dir), "first.csv", &SessionOptions::default());
    session.cycle();
    session.apply(Interaction::Navigate(PageNav::Last));
    session.apply(Interaction::SetKeyword("jade".to_string()));
    let v = view(&mut session, Interaction::OpenSource("second.csv".to_string()));
    assert_eq!(v.total, 30);
    assert_eq!(v.page, 1);
    assert!(session.filter.keyword.is_empty());
}

#[test]
fn test_unknown_source_fails_the_cycle() {
    let dir = TempDir::new().unwrap();
    let mut session = Session::open(config_for(&dir), "nothing_here", &SessionOptions::default());
    let cycle = session.cycle();
    assert!(matches!(
        cycle.view,
        Err(BrowseError::Source(SourceError::LocalNotFound { .. }))
    ));
    assert!(cycle.error_message().unwrap().contains("nothing_here"));
}

#[test]
fn test_local_parquet_source() {
    let dir = TempDir::new().unwrap();
    let mut df = df!(
        "sk1" => &["A", "A", "A"],
        "sk2" => &["B", "B", "X"],
        "sk3" => &["C", "D", "C"]
    )
    .unwrap();
    let path = dir.path().join("levels.parquet");
    ParquetWriter::new(File::create(&path).unwrap())
        .finish(&mut df)
        .unwrap();

    let mut session = Session::open(
        config_for(&dir),
        &path.display().to_string(),
        &SessionOptions::default(),
    );
    assert!(matches!(
        session.source().unwrap().handle,
        SourceHandle::Local { .. }
    ));
    assert_eq!(session.cycle().view.unwrap().total, 3);
    let diagram = session.flow_diagram().unwrap();
    assert_eq!(diagram.labels, vec!["A", "B", "X", "C", "D"]);
}

#[test]
fn test_startup_options_apply() {
    let dir = TempDir::new().unwrap();
    write_collection_csv(dir.path(), "collection", 90);
    let options = SessionOptions {
        page_size: Some(25),
        keyword: Some("jade".to_string()),
        debug: true,
    };
    let mut session = Session::open(config_for(&dir), "collection.csv", &options);
    let cycle = session.cycle();
    let v = cycle.view.unwrap();
    assert_eq!(v.page_size, 25);
    assert_eq!(v.total, 23);
    assert!(cycle.sql.unwrap().contains("ILIKE"));
}
