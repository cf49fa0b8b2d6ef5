use clap::Parser;
use tempfile::TempDir;

use docvalidate::config::OutputFormatConfig;
use docvalidate::{Cli, Config, ConfigError, ConfigManager};

#[tokio::test]
async fn test_load_toml_settings_keeps_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("docvalidate.toml");
    tokio::fs::write(
        &path,
        r#"
[pool]
max_per_key = 2

[source]
directory = "/srv/rules"

[output]
format = "json"
"#,
    )
    .await
    .unwrap();

    let config = ConfigManager::load_from_file(&path).await.unwrap();

    assert_eq!(config.pool.max_per_key, 2);
    assert_eq!(config.pool.idle_timeout_seconds, Some(300));
    assert!(config.source.in_memory);
    assert_eq!(
        config.source.directory.as_deref(),
        Some(std::path::Path::new("/srv/rules"))
    );
    assert_eq!(config.output.format, OutputFormatConfig::Json);
    assert_eq!(config.files.extensions, vec!["xml"]);
}

#[test]
fn test_load_json_settings() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");
    std::fs::write(&path, r#"{"validation": {"threads": 3, "fail_fast": true}}"#).unwrap();

    let config = tokio_test::block_on(ConfigManager::load_from_file(&path)).unwrap();
    assert_eq!(config.validation.threads, Some(3));
    assert!(config.validation.fail_fast);
    assert_eq!(ConfigManager::get_thread_count(&config), 3);
}

#[tokio::test]
async fn test_unsupported_settings_format() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.yaml");
    tokio::fs::write(&path, "pool: {}").await.unwrap();

    let result = ConfigManager::load_from_file(&path).await;
    assert!(matches!(result, Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"));
}

#[test]
fn test_cli_overrides_only_given_options() {
    let mut config = Config::default();
    config.validation.threads = Some(6);
    config.files.extensions = vec!["sbd".to_string()];

    let cli = Cli::try_parse_from([
        "docvalidate",
        "documents",
        "--pool-size",
        "4",
        "--format",
        "summary",
        "--exclude",
        "**/archive/**",
    ])
    .unwrap();
    let merged = ConfigManager::merge_with_cli(config, &cli);

    assert_eq!(merged.pool.max_per_key, 4);
    assert_eq!(merged.validation.threads, Some(6));
    assert_eq!(merged.files.extensions, vec!["sbd"]);
    assert_eq!(merged.files.exclude_patterns, vec!["**/archive/**"]);
    assert_eq!(merged.output.format, OutputFormatConfig::Summary);
}

#[test]
fn test_list_packages_needs_no_path() {
    let cli = Cli::try_parse_from(["docvalidate", "--list-packages"]).unwrap();
    assert!(cli.list_packages);
    assert!(cli.path.is_none());

    assert!(Cli::try_parse_from(["docvalidate"]).is_err());
    assert!(Cli::try_parse_from(["docvalidate", "docs", "--verbose", "--quiet"]).is_err());
}

#[test]
fn test_validate_rejects_bad_pool_settings() {
    let mut config = Config::default();
    config.pool.max_per_key = 0;
    assert!(matches!(
        ConfigManager::validate_config(&config),
        Err(ConfigError::Validation(_))
    ));

    let mut config = Config::default();
    config.pool.idle_timeout_seconds = Some(0);
    assert!(ConfigManager::validate_config(&config).is_err());

    assert!(ConfigManager::validate_config(&Config::default()).is_ok());
}
