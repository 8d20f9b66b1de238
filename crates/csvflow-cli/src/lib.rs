//! Shared CLI definitions for csvflow.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::builder::BoolishValueParser;
use clap::{CommandFactory, Parser, ValueEnum};
use std::path::PathBuf;

/// Downloadable artifact produced by `--export` (headless mode).
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ExportKind {
    /// The current page of the filtered result
    Page,
    /// The complete filtered result, unpaginated
    All,
    /// One row per record with its row id and the three flow levels
    Nodes,
    /// Distinct flow level triples with their row counts
    NodeCounts,
}

impl ExportKind {
    /// Short tag used in generated file names.
    pub fn file_tag(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::All => "filtered",
            Self::Nodes => "nodes",
            Self::NodeCounts => "node_counts",
        }
    }
}

/// Command-line arguments for csvflow
#[derive(Clone, Parser, Debug)]
#[command(
    name = "csvflow",
    version,
    about = "Browse, filter and export tabular datasets in the terminal",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Data source: file name in the data directory, local path, or http(s) URL (CSV or Parquet).
    /// When omitted, the configured default file is opened.
    #[arg(value_name = "CSV", conflicts_with = "csv")]
    pub source: Option<String>,

    /// Same as the positional CSV argument
    #[arg(long = "csv", value_name = "CSV")]
    pub csv: Option<String>,

    /// Compact layout for embedding; also reports the rendered height as a JSON line on stderr
    #[arg(long = "embed", value_name = "BOOL", num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    pub embed: Option<bool>,

    /// Show the resolved source, its provenance and the active query
    #[arg(long = "debug", value_name = "BOOL", num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    pub debug: Option<bool>,

    /// Rows per page (25, 50, 100, 200 or 500)
    #[arg(long = "page-size", value_name = "N")]
    pub page_size: Option<usize>,

    /// Initial keyword filter (case-insensitive substring match)
    #[arg(long = "keyword", value_name = "TEXT")]
    pub keyword: Option<String>,

    /// Directory that bare file names are resolved against (default: config, then current directory)
    #[arg(long = "data-dir", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Base URL used when a bare file name is not found locally (overrides CSVFLOW_REMOTE_BASE and config)
    #[arg(long = "remote-base", value_name = "URL")]
    pub remote_base: Option<String>,

    /// Write one artifact without starting the terminal UI, print its path and exit
    #[arg(long = "export", value_enum, value_name = "KIND")]
    pub export: Option<ExportKind>,

    /// Directory for exported files (default: config, then current directory)
    #[arg(long = "out-dir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Generate default configuration file at ~/.config/csvflow/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

impl Args {
    /// The raw source identifier from either the positional argument or `--csv`. Empty when neither is set.
    pub fn source_identifier(&self) -> &str {
        self.source
            .as_deref()
            .or(self.csv.as_deref())
            .unwrap_or("")
    }

    pub fn embed_enabled(&self) -> bool {
        self.embed.unwrap_or(false)
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.unwrap_or(false)
    }
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render command-line options as markdown.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let placeholder: String = arg
            .get_value_names()
            .map(|names| {
                names
                    .iter()
                    .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let option_str = if arg.is_positional() {
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            if !arg.get_action().takes_values() || placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}
