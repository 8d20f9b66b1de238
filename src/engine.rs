//! Session-scoped query engine: runs lazy plans and owns named in-memory views and the
//! temp copies of downloaded sources.

use polars::prelude::*;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use crate::config::AppConfig;
use crate::query::scalar_count;
use crate::source::{SourceFormat, SourceHandle};

/// Collects a LazyFrame into a DataFrame.
///
/// When the `streaming` feature is enabled and `use_streaming` is true, uses the Polars
/// streaming engine. Otherwise collects normally.
pub fn collect_lazy(lf: LazyFrame, use_streaming: bool) -> PolarsResult<DataFrame> {
    #[cfg(feature = "streaming")]
    {
        if use_streaming {
            lf.with_new_streaming(true).collect()
        } else {
            lf.collect()
        }
    }
    #[cfg(not(feature = "streaming"))]
    {
        let _ = use_streaming;
        lf.collect()
    }
}

/// Lazy CSV scan with a bounded type-inference sample.
pub fn scan_csv(path: &Path, sample_rows: usize) -> PolarsResult<LazyFrame> {
    let pl_path = PlPath::Local(std::sync::Arc::from(path));
    LazyCsvReader::new(pl_path)
        .with_has_header(true)
        .with_infer_schema_length(Some(sample_rows))
        .finish()
}

pub fn scan_parquet(path: &Path) -> PolarsResult<LazyFrame> {
    let pl_path = PlPath::Local(std::sync::Arc::from(path));
    LazyFrame::scan_parquet(pl_path, ScanArgsParquet::default())
}

/// Parse a CSV payload in memory, inferring types from every row.
pub fn read_csv_bytes(bytes: Vec<u8>) -> PolarsResult<DataFrame> {
    let mut options = CsvReadOptions::default();
    options.has_header = true;
    options.infer_schema_length = None;
    CsvReader::new(Cursor::new(bytes))
        .with_options(options)
        .finish()
}

pub fn read_parquet_bytes(bytes: Vec<u8>) -> PolarsResult<DataFrame> {
    ParquetReader::new(Cursor::new(bytes)).finish()
}

pub struct QueryEngine {
    views: HashMap<String, DataFrame>,
    downloads: Vec<tempfile::TempPath>,
    use_streaming: bool,
    csv_sample_rows: usize,
    http_timeout: Duration,
}

impl QueryEngine {
    pub fn new(use_streaming: bool, csv_sample_rows: usize, http_timeout: Duration) -> Self {
        Self {
            views: HashMap::new(),
            downloads: Vec::new(),
            use_streaming,
            csv_sample_rows,
            http_timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.performance.polars_streaming,
            config.source.csv_sample_rows,
            Duration::from_secs(config.source.http_timeout_secs),
        )
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    /// Register (or replace) a named in-memory table.
    pub fn register_view(&mut self, name: &str, df: DataFrame) {
        tracing::debug!(view = name, rows = df.height(), "registered in-memory view");
        self.views.insert(name.to_string(), df);
    }

    /// Unused view name for the next in-memory fallback.
    pub fn next_view_name(&self) -> String {
        let mut n = self.views.len();
        while self.views.contains_key(&format!("remote_{}", n)) {
            n += 1;
        }
        format!("remote_{}", n)
    }

    /// Keep a downloaded temp file alive until its source is released.
    pub fn adopt_download(&mut self, temp: tempfile::TempPath) {
        self.downloads.push(temp);
    }

    /// Drop what backs `handle`: its in-memory view or its downloaded copy.
    pub fn release(&mut self, handle: &SourceHandle) {
        match handle {
            SourceHandle::InMemory { view, .. } => {
                if self.views.remove(view).is_some() {
                    tracing::debug!(view = %view, "released in-memory view");
                }
            }
            SourceHandle::RemoteCsv { local, .. } | SourceHandle::RemoteParquet { local, .. } => {
                let before = self.downloads.len();
                self.downloads.retain(|temp| &**temp != local.as_path());
                if self.downloads.len() < before {
                    tracing::debug!(path = %local.display(), "removed downloaded copy");
                }
            }
            SourceHandle::Local { .. } => {}
        }
    }

    /// Lazy frame over the whole source behind `handle`.
    pub fn scan(&self, handle: &SourceHandle) -> PolarsResult<LazyFrame> {
        match handle {
            SourceHandle::Local {
                path,
                format: SourceFormat::Csv,
            }
            | SourceHandle::RemoteCsv { local: path, .. } => scan_csv(path, self.csv_sample_rows),
            SourceHandle::Local {
                path,
                format: SourceFormat::Parquet,
            }
            | SourceHandle::RemoteParquet { local: path, .. } => scan_parquet(path),
            SourceHandle::InMemory { view, .. } => self
                .views
                .get(view)
                .map(|df| df.clone().lazy())
                .ok_or_else(|| {
                    PolarsError::ComputeError(format!("view '{}' is not registered", view).into())
                }),
        }
    }

    pub fn collect(&self, lf: LazyFrame) -> PolarsResult<DataFrame> {
        collect_lazy(lf, self.use_streaming)
    }

    /// Run a single-value count query.
    pub fn count(&self, lf: LazyFrame) -> PolarsResult<usize> {
        let df = self.collect(lf)?;
        scalar_count(&df)
    }

    /// Column names of the first row of the source.
    pub fn preview_schema(&self, handle: &SourceHandle) -> PolarsResult<Vec<String>> {
        let lf = crate::query::QueryPlan::preview(self.scan(handle)?);
        let df = self.collect(lf)?;
        Ok(df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect())
    }
}
