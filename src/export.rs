//! CSV artifacts: UTF-8, comma delimiter, header row.

use chrono::NaiveDateTime;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::ExportKind;

/// `<basename>_<kind>_<YYYYmmdd_HHMMSS>.csv`
pub fn export_filename(basename: &str, kind: ExportKind, at: NaiveDateTime) -> String {
    format!(
        "{}_{}_{}.csv",
        basename,
        kind.file_tag(),
        at.format("%Y%m%d_%H%M%S")
    )
}

pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    CsvWriter::new(file)
        .with_separator(b',')
        .include_header(true)
        .finish(df)?;
    Ok(())
}

/// Write to the scratch file first, then copy it to `dest`.
///
/// The scratch path is shared by every session using the same configuration; concurrent
/// full exports may overwrite each other's scratch file.
pub fn write_csv_via_scratch(df: &mut DataFrame, scratch: &Path, dest: &Path) -> Result<()> {
    write_csv(df, scratch)?;
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(scratch, dest).map_err(|e| {
        eyre!(
            "Failed to copy {} to {}: {}",
            scratch.display(),
            dest.display(),
            e
        )
    })?;
    Ok(())
}

/// Destination path for an artifact in `dir`.
pub fn export_path(dir: &Path, basename: &str, kind: ExportKind, at: NaiveDateTime) -> PathBuf {
    dir.join(export_filename(basename, kind, at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 1)
            .unwrap()
    }

    #[test]
    fn test_filename_format() {
        assert_eq!(
            export_filename("d01_s1", ExportKind::Page, at()),
            "d01_s1_page_20240309_070501.csv"
        );
        assert_eq!(
            export_filename("data", ExportKind::NodeCounts, at()),
            "data_node_counts_20240309_070501.csv"
        );
    }

    #[test]
    fn test_scratch_then_copy() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("scratch").join("filtered.csv");
        let dest = export_path(&dir.path().join("out"), "data", ExportKind::All, at());
        let mut df = df!("a" => &[1i64, 2], "b" => &["x,y", "z"]).unwrap();
        write_csv_via_scratch(&mut df, &scratch, &dest).unwrap();
        let written = std::fs::read_to_string(&dest).unwrap();
        assert_eq!(written, "a,b\n1,\"x,y\"\n2,z\n");
        assert!(scratch.exists());
    }
}
