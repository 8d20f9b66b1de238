use clap::Parser;
use csvflow::config::{AppConfig, ConfigManager, REMOTE_BASE_ENV};
use csvflow::{Args, ExportKind, SessionOptions};
use tempfile::TempDir;

#[test]
fn test_generated_template_parses_to_defaults() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_dir(dir.path().join("csvflow"));
    let path = manager.write_default_config(false).unwrap();
    assert!(path.ends_with("config.toml"));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("# [source]"));
    assert!(text.contains("# Data Source Resolution"));
    assert!(text.contains(REMOTE_BASE_ENV));

    let loaded = AppConfig::load_from_path(&path).unwrap();
    assert_eq!(loaded.display.default_page_size, 100);
    assert_eq!(loaded.flow.level_columns(), ["sk1", "sk2", "sk3"]);
}

#[test]
fn test_template_lists_unset_optional_fields() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_dir(dir.path().to_path_buf());
    let text = manager.generate_default_config();

    for field in ["data_dir", "remote_base", "dir", "scratch_path"] {
        assert!(
            text.lines().any(|l| l.starts_with(&format!("# {} = ", field))),
            "missing {} in template",
            field
        );
    }
    assert!(text.contains("# [export]"));

    // Uncommenting an optional field yields a valid config.
    let edited = text.replace(
        "# remote_base = \"https://example.org/datasets\"",
        "remote_base = \"https://example.org/datasets\"",
    );
    let edited = edited.replacen("# [source]", "[source]", 1);
    let path = dir.path().join("config.toml");
    std::fs::write(&path, edited).unwrap();
    let loaded = AppConfig::load_from_path(&path).unwrap();
    assert_eq!(
        loaded.source.remote_base.as_deref(),
        Some("https://example.org/datasets")
    );
}

#[test]
fn test_existing_config_needs_force() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_dir(dir.path().to_path_buf());
    manager.write_default_config(false).unwrap();
    let err = manager.write_default_config(false).unwrap_err();
    assert!(err.to_string().contains("--force"));
    manager.write_default_config(true).unwrap();
}

#[test]
fn test_user_values_override_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[source]
default_file = "d01_s1.csv"
quick_files = ["d01_s1.csv", "d02_s1.csv"]

[display]
default_page_size = 25

[flow]
level_1 = "region"
min_weight = 3

[theme.colors]
accent = "cyan"
"#,
    )
    .unwrap();

    let mut config = AppConfig::default();
    config.merge(AppConfig::load_from_path(&path).unwrap());
    config.validate().unwrap();
    assert_eq!(config.source.default_file, "d01_s1.csv");
    assert_eq!(config.source.quick_files.len(), 2);
    assert_eq!(config.display.default_page_size, 25);
    assert_eq!(config.flow.level_columns(), ["region", "sk2", "sk3"]);
    assert_eq!(config.flow.min_weight, 3);
    assert_eq!(config.theme.colors.accent, "cyan");
    assert_eq!(config.theme.colors.background, "#f4f5f7");
}

#[test]
fn test_validation_rejects_bad_values() {
    let mut config = AppConfig::default();
    config.display.default_page_size = 30;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.flow.level_2 = "sk1".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.flow.min_weight = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_malformed_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[display\n").unwrap();
    let err = AppConfig::load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_cli_arguments() {
    let args = Args::try_parse_from([
        "csvflow",
        "https://example.org/d01_s1.csv",
        "--embed",
        "--page-size",
        "50",
        "--keyword",
        "jade",
        "--export",
        "node-counts",
    ])
    .unwrap();
    assert_eq!(args.source_identifier(), "https://example.org/d01_s1.csv");
    assert!(args.embed_enabled());
    assert!(!args.debug_enabled());
    assert_eq!(args.export, Some(ExportKind::NodeCounts));

    let options = SessionOptions::from(&args);
    assert_eq!(options.page_size, Some(50));
    assert_eq!(options.keyword.as_deref(), Some("jade"));

    let args =
        Args::try_parse_from(["csvflow", "--csv", "d02_s1.csv", "--debug", "false"]).unwrap();
    assert_eq!(args.source_identifier(), "d02_s1.csv");
    assert!(!args.debug_enabled());

    assert!(Args::try_parse_from(["csvflow", "a.csv", "--csv", "b.csv"]).is_err());
    assert!(Args::try_parse_from(["csvflow", "--force"]).is_err());
}
