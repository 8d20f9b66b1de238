//! Bounded queries over a source: preview, count, base count, page fetch and full export.
//!
//! Column names only reach the engine after being checked against the schema discovered by the
//! preview. The keyword is only ever passed as a literal value.

use polars::prelude::*;
use std::fmt;

use crate::pagination::PageState;

/// Selected display columns, keyword-search columns and the keyword itself.
///
/// Empty `display_columns` means every schema column. The keyword only filters when both it and
/// `search_columns` are non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub display_columns: Vec<String>,
    pub search_columns: Vec<String>,
    pub keyword: String,
}

impl FilterSpec {
    /// Initial selection for a freshly opened source: the first `visible` columns, searched by keyword.
    pub fn initial(schema: &[String], visible: usize) -> Self {
        let display_columns: Vec<String> = schema.iter().take(visible.max(1)).cloned().collect();
        Self {
            search_columns: display_columns.clone(),
            display_columns,
            keyword: String::new(),
        }
    }

    pub fn is_filtering(&self) -> bool {
        !self.keyword.is_empty() && !self.search_columns.is_empty()
    }

    /// Display columns in schema order of selection, falling back to the whole schema.
    pub fn effective_display<'a>(&'a self, schema: &'a [String]) -> &'a [String] {
        if self.display_columns.is_empty() {
            schema
        } else {
            &self.display_columns
        }
    }

    /// Toggle a display column, keeping schema order among the selected ones.
    pub fn toggle_display(&mut self, column: &str, schema: &[String]) {
        toggle_in_schema_order(&mut self.display_columns, column, schema);
    }

    pub fn toggle_search(&mut self, column: &str, schema: &[String]) {
        toggle_in_schema_order(&mut self.search_columns, column, schema);
    }
}

fn toggle_in_schema_order(selected: &mut Vec<String>, column: &str, schema: &[String]) {
    if let Some(pos) = selected.iter().position(|c| c == column) {
        selected.remove(pos);
        return;
    }
    if !schema.iter().any(|c| c == column) {
        return;
    }
    selected.push(column.to_string());
    selected.sort_by_key(|c| schema.iter().position(|s| s == c).unwrap_or(usize::MAX));
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A column name that is not part of the discovered schema.
    UnknownColumn(String),
    /// A schema column whose name the engine would expand as a pattern (`*`, `^...$`).
    UnsafeIdentifier(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownColumn(name) => write!(f, "Unknown column '{}'", name),
            Self::UnsafeIdentifier(name) => write!(
                f,
                "Column '{}' cannot be queried because its name is a column pattern",
                name
            ),
        }
    }
}

impl std::error::Error for QueryError {}

/// Checks column identifiers against the schema before they are used in a query.
pub struct ColumnAllowList<'a> {
    schema: &'a [String],
}

impl<'a> ColumnAllowList<'a> {
    pub fn new(schema: &'a [String]) -> Self {
        Self { schema }
    }

    pub fn check(&self, name: &str) -> Result<(), QueryError> {
        if !self.schema.iter().any(|c| c == name) {
            return Err(QueryError::UnknownColumn(name.to_string()));
        }
        if name == "*" || (name.starts_with('^') && name.ends_with('$')) {
            return Err(QueryError::UnsafeIdentifier(name.to_string()));
        }
        Ok(())
    }

    pub fn check_all(&self, names: &[String]) -> Result<Vec<String>, QueryError> {
        names
            .iter()
            .map(|n| self.check(n).map(|_| n.clone()))
            .collect()
    }
}

/// Translate the ILIKE pattern `%keyword%` into an anchored, case-insensitive regex.
/// `%` and `_` typed by the user keep their LIKE meaning; everything else is literal.
pub fn ilike_contains_regex(keyword: &str) -> String {
    let mut out = String::from("(?is)^.*");
    let mut buf = [0u8; 4];
    for c in keyword.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    out.push_str(".*$");
    out
}

/// Row filter derived from the keyword and the search columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pattern: Option<String>,
    columns: Vec<String>,
}

impl Predicate {
    /// The always-true predicate.
    pub fn all() -> Self {
        Self {
            pattern: None,
            columns: Vec::new(),
        }
    }

    pub fn build(filter: &FilterSpec, schema: &[String]) -> Result<Self, QueryError> {
        if !filter.is_filtering() {
            return Ok(Self::all());
        }
        let columns = ColumnAllowList::new(schema).check_all(&filter.search_columns)?;
        Ok(Self {
            pattern: Some(ilike_contains_regex(&filter.keyword)),
            columns,
        })
    }

    pub fn is_trivial(&self) -> bool {
        self.pattern.is_none()
    }

    /// OR over the search columns of "column as text matches the keyword".
    pub fn to_expr(&self) -> Option<Expr> {
        let pattern = self.pattern.as_deref()?;
        self.columns
            .iter()
            .map(|c| {
                col(c.as_str())
                    .cast(DataType::String)
                    .str()
                    .contains(lit(pattern), false)
            })
            .reduce(|a, b| a.or(b))
    }

    pub fn apply(&self, lf: LazyFrame) -> LazyFrame {
        match self.to_expr() {
            Some(e) => lf.filter(e),
            None => lf,
        }
    }

    fn sql(&self) -> String {
        if self.is_trivial() {
            return "TRUE".to_string();
        }
        let parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("CAST({} AS TEXT) ILIKE $kw", quote_ident(c)))
            .collect();
        format!("({})", parts.join(" OR "))
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The set of bounded queries for one render cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub selection: Vec<String>,
    pub predicate: Predicate,
    pub limit: usize,
    pub offset: usize,
}

impl QueryPlan {
    pub fn build(
        schema: &[String],
        filter: &FilterSpec,
        page: &PageState,
    ) -> Result<Self, QueryError> {
        let selection = ColumnAllowList::new(schema).check_all(filter.effective_display(schema))?;
        Ok(Self {
            selection,
            predicate: Predicate::build(filter, schema)?,
            limit: page.page_size(),
            offset: page.offset(),
        })
    }

    /// Same plan pointed at another page.
    pub fn at_page(&self, page: &PageState) -> Self {
        Self {
            limit: page.page_size(),
            offset: page.offset(),
            ..self.clone()
        }
    }

    /// First row, all columns; used once to discover the schema.
    pub fn preview(lf: LazyFrame) -> LazyFrame {
        lf.limit(1)
    }

    pub fn base_count(lf: LazyFrame) -> LazyFrame {
        lf.select([len().alias("count")])
    }

    pub fn count(&self, lf: LazyFrame) -> LazyFrame {
        self.predicate
            .apply(lf)
            .select([len().alias("count")])
    }

    pub fn page(&self, lf: LazyFrame) -> LazyFrame {
        self.export(lf)
            .slice(self.offset as i64, self.limit as IdxSize)
    }

    /// Filtered selection without pagination.
    pub fn export(&self, lf: LazyFrame) -> LazyFrame {
        let cols: Vec<Expr> = self.selection.iter().map(|c| col(c.as_str())).collect();
        self.predicate.apply(lf).select(cols)
    }

    /// SQL equivalent of the page query, with the keyword shown as the `$kw` parameter.
    pub fn describe_sql(&self, from: &str) -> String {
        let cols: Vec<String> = self.selection.iter().map(|c| quote_ident(c)).collect();
        format!(
            "SELECT {} FROM {} WHERE {} LIMIT {} OFFSET {}",
            cols.join(", "),
            from,
            self.predicate.sql(),
            self.limit,
            self.offset
        )
    }
}

/// Read the single value of a `count` query result.
pub fn scalar_count(df: &DataFrame) -> PolarsResult<usize> {
    let column = df
        .get_columns()
        .first()
        .ok_or_else(|| PolarsError::NoData("count query returned no columns".into()))?;
    match column.get(0)? {
        AnyValue::UInt32(n) => Ok(n as usize),
        AnyValue::UInt64(n) => Ok(n as usize),
        AnyValue::Int64(n) => Ok(n.max(0) as usize),
        AnyValue::Int32(n) => Ok(n.max(0) as usize),
        other => Err(PolarsError::ComputeError(
            format!("unexpected count value: {}", other).into(),
        )),
    }
}

/// Strip engine-internal phrasing from a query failure message.
pub fn sanitize_query_error(msg: &str) -> String {
    let first = msg.lines().next().unwrap_or(msg).trim();
    let lower = first.to_lowercase();
    if lower.contains("not found") && lower.contains("column") {
        return format!("{}. The source schema may have changed; reopen it.", first);
    }
    first.to_string()
}
