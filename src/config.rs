use color_eyre::eyre::eyre;
use color_eyre::Result;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use supports_color::Stream;

use crate::pagination::PAGE_SIZES;

/// Environment variable that overrides `source.remote_base`.
pub const REMOTE_BASE_ENV: &str = "CSVFLOW_REMOTE_BASE";

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate the default configuration as a commented TOML template.
    /// Every field is commented out so defaults apply until the user uncomments it.
    pub fn generate_default_config(&self) -> String {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config)
            .unwrap_or_else(|e| panic!("Failed to serialize default config: {}", e));
        Self::comment_all_fields(toml_str, Self::collect_all_comments())
    }

    fn collect_all_comments() -> HashMap<String, String> {
        let mut comments = HashMap::new();
        for (field, comment) in APP_COMMENTS {
            comments.insert(field.to_string(), comment.to_string());
        }
        let sections: &[(&str, &[(&str, &str)])] = &[
            ("source", SOURCE_COMMENTS),
            ("display", DISPLAY_COMMENTS),
            ("flow", FLOW_COMMENTS),
            ("export", EXPORT_COMMENTS),
            ("performance", PERFORMANCE_COMMENTS),
            ("debug", DEBUG_COMMENTS),
        ];
        for (section, fields) in sections {
            for (field, comment) in *fields {
                comments.insert(format!("{}.{}", section, field), comment.to_string());
            }
        }
        comments
    }

    fn comment_all_fields(toml: String, comments: HashMap<String, String>) -> String {
        let mut seen_fields = HashSet::new();
        let mut result = String::new();
        result.push_str("# csvflow configuration file\n");
        result
            .push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n");
        result.push('\n');

        let mut current_section = String::new();
        for line in toml.lines() {
            if let Some(section) = Self::extract_section_name(line) {
                current_section = section.clone();
                if let Some(header) = SECTION_HEADERS.iter().find(|(s, _)| *s == section) {
                    result.push_str(header.1);
                    result.push('\n');
                }
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
                continue;
            }

            if let Some(field_path) = Self::extract_field_path(line, &current_section) {
                seen_fields.insert(field_path.clone());
                if let Some(comment) = comments.get(&field_path) {
                    for comment_line in comment.lines() {
                        result.push_str("# ");
                        result.push_str(comment_line);
                        result.push('\n');
                    }
                }
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
            } else {
                result.push_str(line);
                result.push('\n');
            }
        }
        Self::add_missing_option_fields(result, &comments, &seen_fields)
    }

    /// Add the `Option` fields that serialization skipped because they are `None`.
    fn add_missing_option_fields(
        mut result: String,
        comments: &HashMap<String, String>,
        seen_fields: &HashSet<String>,
    ) -> String {
        let mut missing_by_section: Vec<(&str, Vec<(&str, &str)>)> = Vec::new();
        for &(field_path, example) in OPTION_FIELDS {
            if seen_fields.contains(field_path) || !comments.contains_key(field_path) {
                continue;
            }
            let Some((section, _)) = field_path.split_once('.') else {
                continue;
            };
            match missing_by_section.iter_mut().find(|(s, _)| *s == section) {
                Some((_, fields)) => fields.push((field_path, example)),
                None => missing_by_section.push((section, vec![(field_path, example)])),
            }
        }

        for (section, fields) in &missing_by_section {
            let mut new_content = String::new();
            for &(field_path, example) in fields {
                if let Some(comment) = comments.get(field_path) {
                    for comment_line in comment.lines() {
                        new_content.push_str("# ");
                        new_content.push_str(comment_line);
                        new_content.push('\n');
                    }
                }
                let field_name = field_path.rsplit('.').next().unwrap_or(field_path);
                new_content.push_str(&format!("# {} = {}\n", field_name, example));
                new_content.push('\n');
            }

            let section_header = format!("# [{}]\n", section);
            match result.find(&section_header) {
                Some(pos) => result.insert_str(pos + section_header.len(), &new_content),
                None => {
                    if let Some(header) = SECTION_HEADERS.iter().find(|(s, _)| s == section) {
                        result.push('\n');
                        result.push_str(header.1);
                        result.push('\n');
                    }
                    result.push_str(&section_header);
                    result.push_str(&new_content);
                }
            }
        }
        result
    }

    /// Extract section name from TOML line like "[display]" or "[theme.colors]"
    fn extract_section_name(line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            Some(trimmed[1..trimmed.len() - 1].to_string())
        } else {
            None
        }
    }

    fn extract_field_path(line: &str, current_section: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }
        let eq_pos = trimmed.find('=')?;
        let field_name = trimmed[..eq_pos].trim();
        if current_section.is_empty() {
            Some(field_name.to_string())
        } else {
            Some(format!("{}.{}", current_section, field_name))
        }
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, self.generate_default_config())?;
        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub source: SourceConfig,
    pub display: DisplayConfig,
    pub flow: FlowConfig,
    pub export: ExportConfig,
    pub performance: PerformanceConfig,
    pub theme: ThemeConfig,
    pub debug: DebugConfig,
}

/// Optional fields listed in the generated template even when unset, with an example value.
const OPTION_FIELDS: &[(&str, &str)] = &[
    ("source.data_dir", "\"data\""),
    ("source.remote_base", "\"https://example.org/datasets\""),
    ("display.image_column_override", "\"imageUrl_s\""),
    ("export.dir", "\"exports\""),
    ("export.scratch_path", "\"/tmp/filtered.csv\""),
];

const APP_COMMENTS: &[(&str, &str)] = &[(
    "version",
    "Configuration format version (for future compatibility)",
)];

const SECTION_HEADERS: &[(&str, &str)] = &[
    (
        "source",
        "# ============================================================================\n# Data Source Resolution\n# ============================================================================",
    ),
    (
        "display",
        "# ============================================================================\n# Table Display\n# ============================================================================",
    ),
    (
        "flow",
        "# ============================================================================\n# Flow View\n# ============================================================================",
    ),
    (
        "export",
        "# ============================================================================\n# CSV Export\n# ============================================================================",
    ),
    (
        "performance",
        "# ============================================================================\n# Performance Settings\n# ============================================================================",
    ),
    (
        "theme.colors",
        "# ============================================================================\n# Color Theme\n# ============================================================================\n# Named colors (\"red\", \"dark_gray\"), hex (\"#5a7bd8\") or indexed(0-255)",
    ),
    (
        "debug",
        "# ============================================================================\n# Debug Settings\n# ============================================================================",
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// File opened when no source identifier is given.
    pub default_file: String,
    /// Directory bare file names are resolved against. None = current directory.
    pub data_dir: Option<String>,
    /// Base URL tried when a bare file name is not found locally.
    pub remote_base: Option<String>,
    /// Rows sampled to infer CSV column types.
    pub csv_sample_rows: usize,
    /// Timeout for remote downloads.
    pub http_timeout_secs: u64,
    /// Dataset names offered in the quick-switch list.
    pub quick_files: Vec<String>,
}

const SOURCE_COMMENTS: &[(&str, &str)] = &[
    (
        "default_file",
        "File opened when no source is given on the command line",
    ),
    (
        "data_dir",
        "Directory that bare file names are resolved against (default: current directory)",
    ),
    (
        "remote_base",
        "Base URL tried when a bare file name is not found locally.\nOverridden by the CSVFLOW_REMOTE_BASE environment variable",
    ),
    (
        "csv_sample_rows",
        "Number of rows sampled to infer CSV column types",
    ),
    ("http_timeout_secs", "Timeout for remote downloads, in seconds"),
    (
        "quick_files",
        "Dataset names offered in the quick-switch list (key: o)",
    ),
];

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            default_file: "data.csv".to_string(),
            data_dir: None,
            remote_base: None,
            csv_sample_rows: 200_000,
            http_timeout_secs: 300,
            quick_files: Vec::new(),
        }
    }
}

impl SourceConfig {
    pub fn merge(&mut self, other: Self) {
        let default = SourceConfig::default();
        if other.default_file != default.default_file {
            self.default_file = other.default_file;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.remote_base.is_some() {
            self.remote_base = other.remote_base;
        }
        if other.csv_sample_rows != default.csv_sample_rows {
            self.csv_sample_rows = other.csv_sample_rows;
        }
        if other.http_timeout_secs != default.http_timeout_secs {
            self.http_timeout_secs = other.http_timeout_secs;
        }
        if !other.quick_files.is_empty() {
            self.quick_files = other.quick_files;
        }
    }

    /// Apply the environment override for the remote base. Empty values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(base) = std::env::var(REMOTE_BASE_ENV) {
            if !base.trim().is_empty() {
                self.remote_base = Some(base.trim().to_string());
            }
        }
    }

    pub fn data_dir_path(&self) -> PathBuf {
        self.data_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Initial rows per page; must be one of 25, 50, 100, 200, 500.
    pub default_page_size: usize,
    /// Number of leading columns shown when a source is opened.
    pub default_visible_columns: usize,
    /// Column used for image hints when present, ahead of name detection.
    pub image_column_override: Option<String>,
    /// Label shown next to link cells.
    pub link_label: String,
}

const DISPLAY_COMMENTS: &[(&str, &str)] = &[
    (
        "default_page_size",
        "Initial rows per page: 25, 50, 100, 200 or 500",
    ),
    (
        "default_visible_columns",
        "Number of leading columns shown when a source is opened",
    ),
    (
        "image_column_override",
        "Column treated as the image column when present (takes precedence over name detection)",
    ),
    ("link_label", "Label shown in front of link cells"),
];

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            default_visible_columns: 10,
            image_column_override: Some("imageUrl_s".to_string()),
            link_label: "open link".to_string(),
        }
    }
}

impl DisplayConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DisplayConfig::default();
        if other.default_page_size != default.default_page_size {
            self.default_page_size = other.default_page_size;
        }
        if other.default_visible_columns != default.default_visible_columns {
            self.default_visible_columns = other.default_visible_columns;
        }
        if other.image_column_override != default.image_column_override {
            self.image_column_override = other.image_column_override;
        }
        if other.link_label != default.link_label {
            self.link_label = other.link_label;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Level columns, outermost first.
    pub level_1: String,
    pub level_2: String,
    pub level_3: String,
    /// Row identifier column for the raw node view; synthesized as empty when absent.
    pub row_id_column: String,
    /// Label substituted for missing level values.
    pub missing_label: String,
    /// Initial minimum edge weight.
    pub min_weight: u64,
}

const FLOW_COMMENTS: &[(&str, &str)] = &[
    ("level_1", "Column holding the first flow level"),
    ("level_2", "Column holding the second flow level"),
    ("level_3", "Column holding the third flow level"),
    (
        "row_id_column",
        "Row identifier column for the node table (empty when the column is absent)",
    ),
    (
        "missing_label",
        "Label used for missing level values so they still count",
    ),
    ("min_weight", "Initial minimum edge weight shown in the flow view"),
];

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            level_1: "sk1".to_string(),
            level_2: "sk2".to_string(),
            level_3: "sk3".to_string(),
            row_id_column: "id".to_string(),
            missing_label: "(missing)".to_string(),
            min_weight: 1,
        }
    }
}

impl FlowConfig {
    pub fn merge(&mut self, other: Self) {
        let default = FlowConfig::default();
        if other.level_1 != default.level_1 {
            self.level_1 = other.level_1;
        }
        if other.level_2 != default.level_2 {
            self.level_2 = other.level_2;
        }
        if other.level_3 != default.level_3 {
            self.level_3 = other.level_3;
        }
        if other.row_id_column != default.row_id_column {
            self.row_id_column = other.row_id_column;
        }
        if other.missing_label != default.missing_label {
            self.missing_label = other.missing_label;
        }
        if other.min_weight != default.min_weight {
            self.min_weight = other.min_weight;
        }
    }

    pub fn level_columns(&self) -> [&str; 3] {
        [&self.level_1, &self.level_2, &self.level_3]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory exported files are written to. None = current directory.
    pub dir: Option<String>,
    /// Scratch file for the full filtered export. None = "<system temp>/filtered.csv".
    pub scratch_path: Option<String>,
}

const EXPORT_COMMENTS: &[(&str, &str)] = &[
    (
        "dir",
        "Directory exported CSV files are written to (default: current directory)",
    ),
    (
        "scratch_path",
        "Scratch file for the full filtered export (default: <temp dir>/filtered.csv)",
    ),
];

impl ExportConfig {
    pub fn merge(&mut self, other: Self) {
        if other.dir.is_some() {
            self.dir = other.dir;
        }
        if other.scratch_path.is_some() {
            self.scratch_path = other.scratch_path;
        }
    }

    pub fn dir_path(&self) -> PathBuf {
        self.dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn scratch_file(&self) -> PathBuf {
        self.scratch_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("filtered.csv"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Use the Polars streaming engine for collects when the streaming feature is enabled.
    pub polars_streaming: bool,
    pub event_poll_interval_ms: u64,
}

const PERFORMANCE_COMMENTS: &[(&str, &str)] = &[
    (
        "polars_streaming",
        "Use the Polars streaming engine when available (default: true)",
    ),
    (
        "event_poll_interval_ms",
        "Event polling interval in milliseconds\nLower values = more responsive but higher CPU usage",
    ),
];

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            polars_streaming: true,
            event_poll_interval_ms: 25,
        }
    }
}

impl PerformanceConfig {
    pub fn merge(&mut self, other: Self) {
        let default = PerformanceConfig::default();
        if other.polars_streaming != default.polars_streaming {
            self.polars_streaming = other.polars_streaming;
        }
        if other.event_poll_interval_ms != default.event_poll_interval_ms {
            self.event_poll_interval_ms = other.event_poll_interval_ms;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ThemeConfig {
    pub colors: ColorConfig,
}

impl ThemeConfig {
    pub fn merge(&mut self, other: Self) {
        self.colors.merge(other.colors);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub background: String,
    pub text_primary: String,
    pub text_secondary: String,
    pub accent: String,
    pub accent_hover: String,
    pub table_header: String,
    pub table_header_bg: String,
    pub cell_bg: String,
    pub link: String,
    pub image: String,
    pub controls_bg: String,
    pub keybind_hints: String,
    pub keybind_labels: String,
    pub success: String,
    pub warning: String,
    pub error: String,
    pub flow_level_1: String,
    pub flow_level_2: String,
    pub flow_level_3: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            background: "#f4f5f7".to_string(),
            text_primary: "#111827".to_string(),
            text_secondary: "indexed(244)".to_string(),
            accent: "#5a7bd8".to_string(),
            accent_hover: "#7395eb".to_string(),
            table_header: "#111827".to_string(),
            table_header_bg: "#eef2f7".to_string(),
            cell_bg: "#fafbfd".to_string(),
            link: "#5a7bd8".to_string(),
            image: "magenta".to_string(),
            controls_bg: "#eef2f7".to_string(),
            keybind_hints: "#5a7bd8".to_string(),
            keybind_labels: "#111827".to_string(),
            success: "green".to_string(),
            warning: "yellow".to_string(),
            error: "red".to_string(),
            flow_level_1: "#5a7bd8".to_string(),
            flow_level_2: "#7395eb".to_string(),
            flow_level_3: "indexed(110)".to_string(),
        }
    }
}

impl ColorConfig {
    fn entries(&self) -> [(&'static str, &String); 19] {
        [
            ("background", &self.background),
            ("text_primary", &self.text_primary),
            ("text_secondary", &self.text_secondary),
            ("accent", &self.accent),
            ("accent_hover", &self.accent_hover),
            ("table_header", &self.table_header),
            ("table_header_bg", &self.table_header_bg),
            ("cell_bg", &self.cell_bg),
            ("link", &self.link),
            ("image", &self.image),
            ("controls_bg", &self.controls_bg),
            ("keybind_hints", &self.keybind_hints),
            ("keybind_labels", &self.keybind_labels),
            ("success", &self.success),
            ("warning", &self.warning),
            ("error", &self.error),
            ("flow_level_1", &self.flow_level_1),
            ("flow_level_2", &self.flow_level_2),
            ("flow_level_3", &self.flow_level_3),
        ]
    }

    /// Validate all color strings can be parsed
    fn validate(&self, parser: &ColorParser) -> Result<()> {
        for (name, value) in self.entries() {
            parser.parse(value).map_err(|e| {
                eyre!(
                    "theme.colors.{}: {}. Use a valid color name (e.g. red, cyan, bright_red), \
                     hex (#rrggbb), or indexed(0-255)",
                    name,
                    e
                )
            })?;
        }
        Ok(())
    }

    pub fn merge(&mut self, other: Self) {
        let default = ColorConfig::default();
        macro_rules! merge_color {
            ($($field:ident),* $(,)?) => {
                $(
                    if other.$field != default.$field {
                        self.$field = other.$field;
                    }
                )*
            };
        }
        merge_color!(
            background,
            text_primary,
            text_secondary,
            accent,
            accent_hover,
            table_header,
            table_header_bg,
            cell_bg,
            link,
            image,
            controls_bg,
            keybind_hints,
            keybind_labels,
            success,
            warning,
            error,
            flow_level_1,
            flow_level_2,
            flow_level_3,
        );
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    /// Show the debug row (resolved source, provenance, query) by default.
    pub enabled: bool,
}

const DEBUG_COMMENTS: &[(&str, &str)] = &[(
    "enabled",
    "Show the resolved source, provenance and active query by default",
)];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            source: SourceConfig::default(),
            display: DisplayConfig::default(),
            flow: FlowConfig::default(),
            export: ExportConfig::default(),
            performance: PerformanceConfig::default(),
            theme: ThemeConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all layers (default → user → environment)
    pub fn load(app_name: &str) -> Result<Self> {
        let mut config = AppConfig::default();

        let config_path = ConfigManager::new(app_name)
            .ok()
            .map(|m| m.config_path("config.toml"));
        config.merge(Self::load_user_config(app_name)?);
        config.source.apply_env();

        config.validate().map_err(|e| {
            let path_hint = config_path
                .as_ref()
                .map(|p| format!(" in {}", p.display()))
                .unwrap_or_default();
            eyre!("Invalid configuration{}: {}", path_hint, e)
        })?;

        Ok(config)
    }

    /// Load user configuration from ~/.config/csvflow/config.toml
    fn load_user_config(app_name: &str) -> Result<AppConfig> {
        let config_manager = ConfigManager::new(app_name)?;
        Self::load_from_path(&config_manager.config_path("config.toml"))
    }

    /// Parse a config file; a missing file yields the defaults.
    pub fn load_from_path(config_path: &Path) -> Result<AppConfig> {
        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }
        self.source.merge(other.source);
        self.display.merge(other.display);
        self.flow.merge(other.flow);
        self.export.merge(other.export);
        self.performance.merge(other.performance);
        self.theme.merge(other.theme);
        if other.debug.enabled {
            self.debug.enabled = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if !PAGE_SIZES.contains(&self.display.default_page_size) {
            return Err(eyre!(
                "display.default_page_size must be one of {:?}, got {}",
                PAGE_SIZES,
                self.display.default_page_size
            ));
        }

        if self.source.csv_sample_rows == 0 {
            return Err(eyre!("source.csv_sample_rows must be greater than 0"));
        }

        if self.performance.event_poll_interval_ms == 0 {
            return Err(eyre!("event_poll_interval_ms must be greater than 0"));
        }

        let levels = self.flow.level_columns();
        if levels.iter().any(|c| c.trim().is_empty()) {
            return Err(eyre!("flow.level_1, level_2 and level_3 must be set"));
        }
        if levels[0] == levels[1] || levels[1] == levels[2] || levels[0] == levels[2] {
            return Err(eyre!(
                "flow level columns must be distinct, got {:?}",
                levels
            ));
        }
        if self.flow.min_weight == 0 {
            return Err(eyre!("flow.min_weight must be at least 1"));
        }

        let parser = ColorParser::new();
        self.theme.colors.validate(&parser)?;

        Ok(())
    }
}

/// Parses color strings from the config and adapts them to the terminal's capabilities
pub struct ColorParser {
    supports_true_color: bool,
    supports_256: bool,
    no_color: bool,
}

impl ColorParser {
    /// Create a new ColorParser with automatic terminal capability detection
    pub fn new() -> Self {
        let no_color = std::env::var("NO_COLOR").is_ok();
        let support = supports_color::on(Stream::Stdout);

        Self {
            supports_true_color: support.as_ref().map(|s| s.has_16m).unwrap_or(false),
            supports_256: support.as_ref().map(|s| s.has_256).unwrap_or(false),
            no_color,
        }
    }

    /// Parse a color string (hex, indexed, or named)
    pub fn parse(&self, s: &str) -> Result<Color> {
        if self.no_color {
            return Ok(Color::Reset);
        }

        let trimmed = s.trim();

        if trimmed.starts_with('#') && trimmed.len() == 7 {
            let (r, g, b) = parse_hex(trimmed)?;
            return Ok(self.convert_rgb_to_terminal_color(r, g, b));
        }

        if trimmed.to_lowercase().starts_with("indexed(") && trimmed.ends_with(')') {
            let num_str = &trimmed[8..trimmed.len() - 1];
            let num = num_str.parse::<u8>().map_err(|_| {
                eyre!(
                    "Invalid indexed color: '{}'. Expected format: indexed(0-255)",
                    trimmed
                )
            })?;
            return Ok(Color::Indexed(num));
        }

        match trimmed.to_lowercase().as_str() {
            "black" => Ok(Color::Black),
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "yellow" => Ok(Color::Yellow),
            "blue" => Ok(Color::Blue),
            "magenta" => Ok(Color::Magenta),
            "cyan" => Ok(Color::Cyan),
            "white" => Ok(Color::White),
            "bright_red" | "bright red" => Ok(Color::Indexed(9)),
            "bright_green" | "bright green" => Ok(Color::Indexed(10)),
            "bright_blue" | "bright blue" => Ok(Color::Indexed(12)),
            "bright_cyan" | "bright cyan" => Ok(Color::Indexed(14)),
            "gray" | "grey" | "dark_gray" | "dark gray" | "dark_grey" | "dark grey" => {
                Ok(Color::Indexed(8))
            }
            "light_gray" | "light gray" | "light_grey" | "light grey" => Ok(Color::Indexed(7)),
            "reset" | "default" | "none" => Ok(Color::Reset),
            _ => Err(eyre!(
                "Unknown color name: '{}'. Supported: basic ANSI colors (red, blue, etc.), \
                 bright variants (bright_red, etc.), or hex colors (#ff0000)",
                trimmed
            )),
        }
    }

    fn convert_rgb_to_terminal_color(&self, r: u8, g: u8, b: u8) -> Color {
        if self.supports_true_color {
            Color::Rgb(r, g, b)
        } else if self.supports_256 {
            Color::Indexed(rgb_to_256_color(r, g, b))
        } else {
            rgb_to_basic_ansi(r, g, b)
        }
    }
}

impl Default for ColorParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_hex(s: &str) -> Result<(u8, u8, u8)> {
    if !s.starts_with('#') || s.len() != 7 || !s.is_ascii() {
        return Err(eyre!(
            "Invalid hex color format: '{}'. Expected format: #rrggbb",
            s
        ));
    }
    let r = u8::from_str_radix(&s[1..3], 16)
        .map_err(|_| eyre!("Invalid red component in hex color: {}", s))?;
    let g = u8::from_str_radix(&s[3..5], 16)
        .map_err(|_| eyre!("Invalid green component in hex color: {}", s))?;
    let b = u8::from_str_radix(&s[5..7], 16)
        .map_err(|_| eyre!("Invalid blue component in hex color: {}", s))?;
    Ok((r, g, b))
}

/// Convert RGB to nearest xterm 256-color palette index
pub fn rgb_to_256_color(r: u8, g: u8, b: u8) -> u8 {
    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 10 {
        let gray = (r as u16 + g as u16 + b as u16) / 3;
        if gray < 8 {
            return 16;
        } else if gray > 247 {
            return 231;
        } else {
            return 232 + ((gray - 8) * 24 / 240) as u8;
        }
    }

    let r_idx = (r as u16 * 5 / 255) as u8;
    let g_idx = (g as u16 * 5 / 255) as u8;
    let b_idx = (b as u16 * 5 / 255) as u8;
    16 + 36 * r_idx + 6 * g_idx + b_idx
}

/// Convert RGB to nearest basic ANSI color (8 colors)
pub fn rgb_to_basic_ansi(r: u8, g: u8, b: u8) -> Color {
    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 30 {
        let avg = (r as u16 + g as u16 + b as u16) / 3;
        return if avg < 64 { Color::Black } else { Color::White };
    }
    match (r > 128, g > 128, b > 128) {
        (false, false, false) => Color::Black,
        (true, false, false) => Color::Red,
        (false, true, false) => Color::Green,
        (true, true, false) => Color::Yellow,
        (false, false, true) => Color::Blue,
        (true, false, true) => Color::Magenta,
        (false, true, true) => Color::Cyan,
        (true, true, true) => Color::White,
    }
}

/// Theme containing parsed colors ready for use
#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: HashMap<String, Color>,
}

impl Theme {
    pub fn from_config(config: &ThemeConfig) -> Result<Self> {
        let parser = ColorParser::new();
        let mut colors = HashMap::new();
        for (name, value) in config.colors.entries() {
            colors.insert(name.to_string(), parser.parse(value)?);
        }
        Ok(Self { colors })
    }

    /// Get a color by name, returns Reset if not found
    pub fn get(&self, name: &str) -> Color {
        self.colors.get(name).copied().unwrap_or(Color::Reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_256_gray_and_cube() {
        assert_eq!(rgb_to_256_color(0, 0, 0), 16);
        assert_eq!(rgb_to_256_color(255, 255, 255), 231);
        assert_eq!(rgb_to_256_color(255, 0, 0), 196);
    }

    #[test]
    fn test_parse_hex_rejects_bad_input() {
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("#zzzzzz").is_err());
        assert_eq!(parse_hex("#5a7bd8").unwrap(), (0x5a, 0x7b, 0xd8));
    }

    #[test]
    fn test_validate_rejects_page_size_outside_set() {
        let mut config = AppConfig::default();
        config.display.default_page_size = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_levels() {
        let mut config = AppConfig::default();
        config.flow.level_2 = config.flow.level_1.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_keeps_non_default_values() {
        let mut base = AppConfig::default();
        let mut user = AppConfig::default();
        user.source.remote_base = Some("https://mirror.example.org/data".to_string());
        user.display.default_page_size = 50;
        user.flow.level_1 = "category".to_string();
        base.merge(user);
        assert_eq!(
            base.source.remote_base.as_deref(),
            Some("https://mirror.example.org/data")
        );
        assert_eq!(base.display.default_page_size, 50);
        assert_eq!(base.flow.level_1, "category");
        assert_eq!(base.flow.level_2, "sk2");
    }
}
