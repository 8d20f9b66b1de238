//! Per-session state and the synchronous render cycle.
//!
//! A [`Session`] owns everything one user interaction needs: the engine, the active source,
//! the filter and the page. Every [`Interaction`] is applied to the session and followed by a
//! full re-evaluation ([`Session::cycle`]) that recounts, re-clamps the page and refetches it.

use chrono::NaiveDateTime;
use polars::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::AppConfig;
use crate::engine::QueryEngine;
use crate::error_display::{user_message_from_polars, user_message_from_report};
use crate::export;
use crate::flow::{self, FlowColumns, FlowDiagram, FlowStages};
use crate::pagination::{PageNav, PageState};
use crate::query::{FilterSpec, QueryError, QueryPlan};
use crate::roles::{ColumnRoles, FlowAvailability};
use crate::source::{self, OpenedSource, SourceError};
use crate::ExportKind;

/// Failure of one render cycle or export. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseError {
    /// No source has been opened yet.
    NoSource,
    Source(SourceError),
    Column(QueryError),
    /// The engine failed while counting or fetching.
    Query(String),
    FlowDisabled(Vec<String>),
    Export(String),
}

impl fmt::Display for BrowseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSource => write!(f, "No data source is open"),
            Self::Source(e) => write!(f, "{}", e),
            Self::Column(e) => write!(f, "{}", e),
            Self::Query(msg) => write!(f, "Query failed: {}", msg),
            Self::FlowDisabled(missing) => write!(
                f,
                "Flow views need column(s) {} which the source does not have",
                missing.join(", ")
            ),
            Self::Export(msg) => write!(f, "Export failed: {}", msg),
        }
    }
}

impl std::error::Error for BrowseError {}

impl From<SourceError> for BrowseError {
    fn from(e: SourceError) -> Self {
        Self::Source(e)
    }
}

impl From<QueryError> for BrowseError {
    fn from(e: QueryError) -> Self {
        Self::Column(e)
    }
}

impl From<PolarsError> for BrowseError {
    fn from(e: PolarsError) -> Self {
        Self::Query(user_message_from_polars(&e))
    }
}

/// Startup values taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub page_size: Option<usize>,
    pub keyword: Option<String>,
    pub debug: bool,
}

/// One user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    OpenSource(String),
    SetKeyword(String),
    ToggleDisplayColumn(String),
    ToggleSearchColumn(String),
    SetPageSize(usize),
    CyclePageSize,
    Navigate(PageNav),
    GotoPage(usize),
    SetMinWeight(u64),
}

/// The fetched page and the numbers around it.
#[derive(Debug, Clone)]
pub struct PageView {
    pub frame: DataFrame,
    pub columns: Vec<String>,
    pub roles: ColumnRoles,
    pub total: usize,
    pub base_total: usize,
    pub filtered: bool,
    pub page: usize,
    pub total_pages: usize,
    pub page_size: usize,
}

impl PageView {
    /// A single page over an already collected frame, showing at most `limit` rows.
    pub fn whole(frame: DataFrame, limit: usize) -> Self {
        let total = frame.height();
        let frame = frame.head(Some(limit));
        let columns: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self {
            roles: ColumnRoles::default(),
            columns,
            frame,
            total,
            base_total: total,
            filtered: false,
            page: 1,
            total_pages: 1,
            page_size: limit,
        }
    }

    /// "N matching, page P / T" with "of M total" when a keyword is active.
    pub fn status_line(&self) -> String {
        let matching = if self.filtered {
            format!("{} matching of {} total", self.total, self.base_total)
        } else {
            format!("{} rows", self.total)
        };
        format!("{}, page {} / {}", matching, self.page, self.total_pages)
    }
}

/// Everything the front-end needs to draw after one cycle.
#[derive(Debug, Clone)]
pub struct RenderCycle {
    pub identifier: String,
    pub provenance: Option<String>,
    pub fallback_note: Option<String>,
    pub schema: Vec<String>,
    pub flow: Option<FlowAvailability>,
    pub view: Result<PageView, BrowseError>,
    /// SQL equivalent of the page query, when debug output is on.
    pub sql: Option<String>,
}

impl RenderCycle {
    /// Non-terminal messages for this cycle.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(note) = &self.fallback_note {
            out.push(note.clone());
        }
        if let Some(w) = self.flow.as_ref().and_then(FlowAvailability::warning) {
            out.push(w);
        }
        out
    }

    pub fn error_message(&self) -> Option<String> {
        self.view.as_ref().err().map(|e| e.to_string())
    }
}

pub struct Session {
    config: AppConfig,
    engine: QueryEngine,
    identifier: String,
    source: Result<OpenedSource, BrowseError>,
    flow_columns: FlowColumns,
    flow_stages: Option<FlowStages>,
    pub filter: FilterSpec,
    pub page: PageState,
    pub min_weight: u64,
    pub debug: bool,
}

impl Session {
    /// Create a session and open `identifier` (empty for the configured default file).
    /// A resolution failure is kept in the session and reported by the next cycle.
    pub fn open(config: AppConfig, identifier: &str, options: &SessionOptions) -> Self {
        let engine = QueryEngine::from_config(&config);
        let page = PageState::new(
            options
                .page_size
                .unwrap_or(config.display.default_page_size),
        );
        let mut session = Self {
            flow_columns: FlowColumns::from(&config.flow),
            min_weight: config.flow.min_weight,
            debug: options.debug || config.debug.enabled,
            config,
            engine,
            identifier: String::new(),
            source: Err(BrowseError::NoSource),
            flow_stages: None,
            filter: FilterSpec::default(),
            page,
        };
        session.switch_source(identifier);
        if let Some(kw) = options.keyword.as_deref() {
            session.filter.keyword = kw.to_string();
        }
        session
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn source(&self) -> Option<&OpenedSource> {
        self.source.as_ref().ok()
    }

    pub fn schema(&self) -> &[String] {
        self.source
            .as_ref()
            .map(|s| s.schema.as_slice())
            .unwrap_or(&[])
    }

    pub fn flow_availability(&self) -> Option<FlowAvailability> {
        let levels = self.config.flow.level_columns();
        self.source()
            .map(|s| FlowAvailability::check(&s.schema, levels))
    }

    fn switch_source(&mut self, identifier: &str) {
        let started = Instant::now();
        self.identifier = identifier.trim().to_string();
        self.flow_stages = None;
        if let Ok(previous) = &self.source {
            self.engine.release(&previous.handle);
        }
        let opened = source::resolve(&self.identifier, &self.config.source)
            .and_then(|resolved| source::open(&resolved, &mut self.engine));
        match opened {
            Ok(opened) => {
                self.filter = FilterSpec::initial(
                    &opened.schema,
                    self.config.display.default_visible_columns,
                );
                self.page = PageState::new(self.page.page_size());
                tracing::info!(
                    identifier = %self.identifier,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "source ready"
                );
                self.source = Ok(opened);
            }
            Err(e) => {
                tracing::error!(
                    identifier = %self.identifier,
                    error = %e,
                    "source resolution failed"
                );
                self.filter = FilterSpec::default();
                self.source = Err(BrowseError::Source(e));
            }
        }
    }

    /// Apply one interaction to the session state.
    pub fn apply(&mut self, interaction: Interaction) {
        match interaction {
            Interaction::OpenSource(identifier) => self.switch_source(&identifier),
            Interaction::SetKeyword(keyword) => self.filter.keyword = keyword,
            Interaction::ToggleDisplayColumn(column) => {
                let schema = self.schema().to_vec();
                self.filter.toggle_display(&column, &schema);
            }
            Interaction::ToggleSearchColumn(column) => {
                let schema = self.schema().to_vec();
                self.filter.toggle_search(&column, &schema);
            }
            Interaction::SetPageSize(size) => {
                self.page.set_page_size(size);
            }
            Interaction::CyclePageSize => self.page.cycle_page_size(),
            Interaction::Navigate(nav) => self.page.navigate(nav),
            Interaction::GotoPage(page) => self.page.goto(page),
            Interaction::SetMinWeight(weight) => self.min_weight = weight.max(1),
        }
    }

    /// Apply an interaction and run the cycle it triggers.
    pub fn handle(&mut self, interaction: Interaction) -> RenderCycle {
        self.apply(interaction);
        self.cycle()
    }

    /// Full re-evaluation: count, re-clamp the page, fetch it and annotate its columns.
    pub fn cycle(&mut self) -> RenderCycle {
        let started = Instant::now();
        let mut sql = None;
        let view = self.fetch_page(&mut sql);
        match &view {
            Ok(v) => tracing::debug!(
                total = v.total,
                page = v.page,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "cycle"
            ),
            Err(e) => tracing::warn!(error = %e, "cycle failed"),
        }
        let opened = self.source.as_ref().ok();
        RenderCycle {
            identifier: self.identifier.clone(),
            provenance: opened.map(|s| s.provenance.clone()),
            fallback_note: opened.and_then(|s| s.fallback_note.clone()),
            schema: self.schema().to_vec(),
            flow: self.flow_availability(),
            view,
            sql: if self.debug { sql } else { None },
        }
    }

    fn fetch_page(&mut self, sql: &mut Option<String>) -> Result<PageView, BrowseError> {
        let opened = self.source.as_ref().map_err(Clone::clone)?;
        let plan = QueryPlan::build(&opened.schema, &self.filter, &self.page)?;
        let lf = self.engine.scan(&opened.handle)?;

        let total = self.engine.count(plan.count(lf.clone()))?;
        let base_total = if plan.predicate.is_trivial() {
            total
        } else {
            self.engine.count(QueryPlan::base_count(lf.clone()))?
        };
        self.page.set_total(total);

        let plan = plan.at_page(&self.page);
        *sql = Some(plan.describe_sql(&format!("'{}'", opened.handle.origin())));
        let frame = self.engine.collect(plan.page(lf))?;
        let columns: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let roles = ColumnRoles::infer(
            &columns,
            self.config.display.image_column_override.as_deref(),
        );
        Ok(PageView {
            frame,
            columns,
            roles,
            total,
            base_total,
            filtered: !plan.predicate.is_trivial(),
            page: self.page.page(),
            total_pages: self.page.total_pages(),
            page_size: self.page.page_size(),
        })
    }

    fn require_flow(&self) -> Result<&OpenedSource, BrowseError> {
        let opened = self.source.as_ref().map_err(Clone::clone)?;
        match FlowAvailability::check(&opened.schema, self.config.flow.level_columns()) {
            FlowAvailability::Available => Ok(opened),
            FlowAvailability::Disabled { missing } => Err(BrowseError::FlowDisabled(missing)),
        }
    }

    /// Edge weights for the whole source, computed once per opened source.
    pub fn flow_stages(&mut self) -> Result<&FlowStages, BrowseError> {
        if self.flow_stages.is_none() {
            let started = Instant::now();
            let opened = self.require_flow()?;
            let lf = self.engine.scan(&opened.handle)?;
            let stages = flow::aggregate(lf, &self.flow_columns, &self.engine)?;
            tracing::info!(
                edges = stages.first.len() + stages.second.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "flow aggregated"
            );
            self.flow_stages = Some(stages);
        }
        self.flow_stages.as_ref().ok_or(BrowseError::NoSource)
    }

    /// Diagram at the current minimum weight; the stored weight is clamped to the data.
    pub fn flow_diagram(&mut self) -> Result<FlowDiagram, BrowseError> {
        let requested = self.min_weight;
        let diagram = self.flow_stages()?.diagram(requested);
        self.min_weight = diagram.threshold;
        Ok(diagram)
    }

    /// Raw or deduplicated node table for the whole source.
    pub fn node_frame(&self, with_counts: bool) -> Result<DataFrame, BrowseError> {
        let opened = self.require_flow()?;
        let lf = self.engine.scan(&opened.handle)?;
        let lf = if with_counts {
            flow::node_counts(lf, &self.flow_columns)
        } else {
            flow::node_table(lf, &self.flow_columns, &opened.schema)
        };
        Ok(self.engine.collect(lf)?)
    }

    /// Data for one artifact, under the current filter and page.
    pub fn export_frame(&self, kind: ExportKind) -> Result<DataFrame, BrowseError> {
        match kind {
            ExportKind::Nodes => self.node_frame(false),
            ExportKind::NodeCounts => self.node_frame(true),
            ExportKind::Page | ExportKind::All => {
                let opened = self.source.as_ref().map_err(Clone::clone)?;
                let plan = QueryPlan::build(&opened.schema, &self.filter, &self.page)?;
                let lf = self.engine.scan(&opened.handle)?;
                let lf = match kind {
                    ExportKind::Page => plan.page(lf),
                    _ => plan.export(lf),
                };
                Ok(self.engine.collect(lf)?)
            }
        }
    }

    /// Write one artifact into `dir` and return its path.
    pub fn export(
        &self,
        kind: ExportKind,
        dir: &Path,
        at: NaiveDateTime,
    ) -> Result<PathBuf, BrowseError> {
        let opened = self.source.as_ref().map_err(Clone::clone)?;
        let mut df = self.export_frame(kind)?;
        let dest = export::export_path(dir, &opened.handle.basename(), kind, at);
        let written = match kind {
            ExportKind::All => {
                export::write_csv_via_scratch(&mut df, &self.config.export.scratch_file(), &dest)
            }
            _ => export::write_csv(&mut df, &dest),
        };
        written.map_err(|e| BrowseError::Export(user_message_from_report(&e)))?;
        tracing::info!(
            kind = kind.file_tag(),
            rows = df.height(),
            path = %dest.display(),
            "exported"
        );
        Ok(dest)
    }
}
