//! Three-level flow aggregation over the whole (unfiltered) source.
//!
//! Edges are counted per adjacent level pair: level 1 to level 2, then level 2 to level 3.
//! Missing level values are replaced by a sentinel label so every row contributes to both
//! stages, which keeps the weight of each stage equal to the row count.

use polars::prelude::*;

use crate::config::FlowConfig;
use crate::engine::QueryEngine;

/// Column names and labels driving the flow views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowColumns {
    pub levels: [String; 3],
    pub row_id: String,
    pub missing_label: String,
}

impl From<&FlowConfig> for FlowColumns {
    fn from(config: &FlowConfig) -> Self {
        Self {
            levels: config.level_columns().map(str::to_string),
            row_id: config.row_id_column.clone(),
            missing_label: config.missing_label.clone(),
        }
    }
}

impl FlowColumns {
    /// Each level cast to text with missing values labelled.
    fn labelled_levels(&self) -> Vec<Expr> {
        self.levels
            .iter()
            .map(|c| {
                col(c.as_str())
                    .cast(DataType::String)
                    .fill_null(lit(self.missing_label.as_str()))
                    .alias(c.as_str())
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowEdge {
    pub source: String,
    pub target: String,
    pub weight: u64,
}

/// Weighted transitions for both stages, in first-seen group order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowStages {
    pub first: Vec<FlowEdge>,
    pub second: Vec<FlowEdge>,
}

impl FlowStages {
    /// Largest edge weight over both stages; 0 when there are no edges.
    pub fn max_weight(&self) -> u64 {
        self.first
            .iter()
            .chain(self.second.iter())
            .map(|e| e.weight)
            .max()
            .unwrap_or(0)
    }

    /// Clamp a requested minimum weight into `[1, max_weight]`.
    pub fn clamp_threshold(&self, requested: u64) -> u64 {
        requested.clamp(1, self.max_weight().max(1))
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty() && self.second.is_empty()
    }

    /// Diagram over the edges whose weight is at least `min_weight` (after clamping).
    pub fn diagram(&self, min_weight: u64) -> FlowDiagram {
        let threshold = self.clamp_threshold(min_weight);
        let first: Vec<&FlowEdge> = self.first.iter().filter(|e| e.weight >= threshold).collect();
        let second: Vec<&FlowEdge> = self
            .second
            .iter()
            .filter(|e| e.weight >= threshold)
            .collect();

        let mut diagram = FlowDiagram {
            threshold,
            ..Default::default()
        };
        for e in &first {
            diagram.intern(&e.source, 0);
        }
        for e in &first {
            diagram.intern(&e.target, 1);
        }
        for e in &second {
            diagram.intern(&e.source, 1);
        }
        for e in &second {
            diagram.intern(&e.target, 2);
        }
        for (stage, edges) in [(0u8, &first), (1u8, &second)] {
            for e in edges.iter() {
                let link = FlowLink {
                    source: diagram.intern(&e.source, stage as usize),
                    target: diagram.intern(&e.target, stage as usize + 1),
                    value: e.weight,
                    stage,
                };
                diagram.links.push(link);
            }
        }
        diagram
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowLink {
    pub source: usize,
    pub target: usize,
    pub value: u64,
    /// 0 for level 1 to 2, 1 for level 2 to 3.
    pub stage: u8,
}

/// Node labels and index-based links, ready for rendering.
///
/// Labels share one index space across all levels; a label occurring at two levels is a
/// single node placed at the level it was first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowDiagram {
    pub labels: Vec<String>,
    /// Level (0..3) each label was first seen at.
    pub levels: Vec<usize>,
    pub links: Vec<FlowLink>,
    pub threshold: u64,
}

impl FlowDiagram {
    fn intern(&mut self, label: &str, level: usize) -> usize {
        if let Some(i) = self.labels.iter().position(|l| l == label) {
            return i;
        }
        self.labels.push(label.to_string());
        self.levels.push(level);
        self.labels.len() - 1
    }

    /// Node indices at one level, in index order.
    pub fn nodes_at(&self, level: usize) -> Vec<usize> {
        (0..self.labels.len())
            .filter(|&i| self.levels[i] == level)
            .collect()
    }

    /// Total weight flowing through a node (max of in and out).
    pub fn node_value(&self, node: usize) -> u64 {
        let incoming: u64 = self
            .links
            .iter()
            .filter(|l| l.target == node)
            .map(|l| l.value)
            .sum();
        let outgoing: u64 = self
            .links
            .iter()
            .filter(|l| l.source == node)
            .map(|l| l.value)
            .sum();
        incoming.max(outgoing)
    }
}

fn stage_edges(
    labelled: LazyFrame,
    from: &str,
    to: &str,
    engine: &QueryEngine,
) -> PolarsResult<Vec<FlowEdge>> {
    let lf = labelled
        .group_by_stable([col(from), col(to)])
        .agg([len().cast(DataType::UInt64).alias("weight")]);
    let df = engine.collect(lf)?;
    let sources = df.column(from)?.as_materialized_series().str()?;
    let targets = df.column(to)?.as_materialized_series().str()?;
    let weights = df.column("weight")?.as_materialized_series().u64()?;
    Ok(sources
        .into_iter()
        .zip(targets)
        .zip(weights)
        .map(|((s, t), w)| FlowEdge {
            source: s.unwrap_or_default().to_string(),
            target: t.unwrap_or_default().to_string(),
            weight: w.unwrap_or(0),
        })
        .collect())
}

/// Count level-1 to level-2 and level-2 to level-3 transitions over every row of `lf`.
pub fn aggregate(
    lf: LazyFrame,
    columns: &FlowColumns,
    engine: &QueryEngine,
) -> PolarsResult<FlowStages> {
    let labelled = lf.select(columns.labelled_levels());
    let [l1, l2, l3] = &columns.levels;
    let first = stage_edges(labelled.clone(), l1, l2, engine)?;
    let second = stage_edges(labelled, l2, l3, engine)?;
    tracing::debug!(
        first = first.len(),
        second = second.len(),
        "flow aggregation"
    );
    Ok(FlowStages { first, second })
}

/// One row per record: row id (empty when the id column is absent) and the three levels.
pub fn node_table(lf: LazyFrame, columns: &FlowColumns, schema: &[String]) -> LazyFrame {
    let id = if schema.iter().any(|c| c == &columns.row_id) {
        col(columns.row_id.as_str())
            .cast(DataType::String)
            .fill_null(lit(""))
    } else {
        lit("")
    };
    let mut exprs = vec![id.alias(columns.row_id.as_str())];
    exprs.extend(columns.labelled_levels());
    lf.select(exprs)
}

/// Distinct level triples with their row counts, most frequent first.
pub fn node_counts(lf: LazyFrame, columns: &FlowColumns) -> LazyFrame {
    let keys: Vec<Expr> = columns.levels.iter().map(|c| col(c.as_str())).collect();
    lf.select(columns.labelled_levels())
        .group_by_stable(keys)
        .agg([len().cast(DataType::UInt64).alias("count")])
        .sort(
            ["count"],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
}
