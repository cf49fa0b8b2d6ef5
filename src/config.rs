use crate::cli::{Cli, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Engine and application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub pool: PoolSettings,
    pub source: SourceSettings,
    pub validation: ValidationConfig,
    pub output: OutputConfig,
    pub files: FileConfig,
}

/// Checker and presenter pool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of instances per key, borrowed or idle
    pub max_per_key: usize,
    /// Idle instances older than this are evicted
    pub idle_timeout_seconds: Option<u64>,
}

/// Rule source settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceSettings {
    /// Stage containers in memory; the only supported storage
    pub in_memory: bool,
    /// Directory scanned for containers
    pub directory: Option<PathBuf>,
}

/// Validation-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ValidationConfig {
    /// Number of documents validated concurrently
    pub threads: Option<usize>,
    /// Stop validating a document after its first failing check
    pub fail_fast: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormatConfig,
    pub verbose: bool,
    /// Failures only
    pub quiet: bool,
}

/// File processing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    /// File extensions to process
    pub extensions: Vec<String>,
    /// Include patterns (glob syntax)
    pub include_patterns: Vec<String>,
    /// Exclude patterns (glob syntax)
    pub exclude_patterns: Vec<String>,
}

/// Output format configuration (serializable version of CLI OutputFormat)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    #[default]
    Human,
    Json,
    Summary,
}

impl From<OutputFormat> for OutputFormatConfig {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputFormatConfig::Human,
            OutputFormat::Json => OutputFormatConfig::Json,
            OutputFormat::Summary => OutputFormatConfig::Summary,
        }
    }
}

impl From<OutputFormatConfig> for OutputFormat {
    fn from(format: OutputFormatConfig) -> Self {
        match format {
            OutputFormatConfig::Human => OutputFormat::Human,
            OutputFormatConfig::Json => OutputFormat::Json,
            OutputFormatConfig::Summary => OutputFormat::Summary,
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_per_key: 8,
            idle_timeout_seconds: Some(300),
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            in_memory: true,
            directory: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormatConfig::Human,
            verbose: false,
            quiet: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_patterns: vec![],
            exclude_patterns: vec![],
        }
    }
}

/// Configuration manager for loading and merging settings
pub struct ConfigManager;

impl ConfigManager {
    /// Load settings with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            config = Self::load_from_file(config_path).await?;
        } else if let Some(found_config) = Self::find_config_file().await? {
            config = found_config;
        }

        config = Self::apply_environment_overrides(config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load settings from a file (TOML or JSON); missing keys keep their defaults
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find a settings file in the current directory, then the user config directory
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "docvalidate.toml",
            "docvalidate.json",
            ".docvalidate.toml",
            ".docvalidate.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("docvalidate");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
        value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(size) = env.get("DOCVALIDATE_POOL_SIZE") {
            config.pool.max_per_key = Self::parse_env("DOCVALIDATE_POOL_SIZE", &size)?;
        }

        if let Some(timeout) = env.get("DOCVALIDATE_POOL_IDLE_TIMEOUT") {
            config.pool.idle_timeout_seconds =
                Some(Self::parse_env("DOCVALIDATE_POOL_IDLE_TIMEOUT", &timeout)?);
        }

        if let Some(directory) = env.get("DOCVALIDATE_SOURCE_DIR") {
            config.source.directory = Some(PathBuf::from(directory));
        }

        if let Some(in_memory) = env.get("DOCVALIDATE_SOURCE_IN_MEMORY") {
            config.source.in_memory = Self::parse_env("DOCVALIDATE_SOURCE_IN_MEMORY", &in_memory)?;
        }

        if let Some(threads) = env.get("DOCVALIDATE_THREADS") {
            config.validation.threads = Some(Self::parse_env("DOCVALIDATE_THREADS", &threads)?);
        }

        if let Some(fail_fast) = env.get("DOCVALIDATE_FAIL_FAST") {
            config.validation.fail_fast = Self::parse_env("DOCVALIDATE_FAIL_FAST", &fail_fast)?;
        }

        if let Some(verbose) = env.get("DOCVALIDATE_VERBOSE") {
            config.output.verbose = Self::parse_env("DOCVALIDATE_VERBOSE", &verbose)?;
        }

        if let Some(quiet) = env.get("DOCVALIDATE_QUIET") {
            config.output.quiet = Self::parse_env("DOCVALIDATE_QUIET", &quiet)?;
        }

        if let Some(format) = env.get("DOCVALIDATE_FORMAT") {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormatConfig::Human,
                "json" => OutputFormatConfig::Json,
                "summary" => OutputFormatConfig::Summary,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid DOCVALIDATE_FORMAT value: {}",
                        format
                    )));
                }
            };
        }

        if let Some(extensions) = env.get("DOCVALIDATE_EXTENSIONS") {
            config.files.extensions = extensions
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(config)
    }

    /// Merge CLI arguments into the settings; only options given on the command line win
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if let Some(size) = cli.pool_size {
            config.pool.max_per_key = size;
        }

        if let Some(source) = &cli.source {
            config.source.directory = Some(source.clone());
        }

        if cli.threads.is_some() {
            config.validation.threads = cli.threads;
        }
        if cli.fail_fast {
            config.validation.fail_fast = true;
        }

        if let Some(format) = cli.output_format {
            config.output.format = format.into();
        }
        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        if let Some(extensions) = cli.get_extensions() {
            config.files.extensions = extensions;
        }
        if !cli.include_patterns.is_empty() {
            config.files.include_patterns = cli.include_patterns.clone();
        }
        if !cli.exclude_patterns.is_empty() {
            config.files.exclude_patterns = cli.exclude_patterns.clone();
        }

        config
    }

    /// Validate setting values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.pool.max_per_key == 0 {
            return Err(ConfigError::Validation(
                "Pool size must be greater than 0".to_string(),
            ));
        }
        if config.pool.max_per_key > 1024 {
            return Err(ConfigError::Validation(
                "Pool size cannot exceed 1024".to_string(),
            ));
        }
        if config.pool.idle_timeout_seconds == Some(0) {
            return Err(ConfigError::Validation(
                "Pool idle timeout must be greater than 0".to_string(),
            ));
        }

        if let Some(threads) = config.validation.threads {
            if threads == 0 {
                return Err(ConfigError::Validation(
                    "Number of threads must be greater than 0".to_string(),
                ));
            }
            if threads > 1000 {
                return Err(ConfigError::Validation(
                    "Number of threads cannot exceed 1000".to_string(),
                ));
            }
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        if config.files.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one file extension must be specified".to_string(),
            ));
        }

        for ext in &config.files.extensions {
            if ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(ConfigError::Validation(format!(
                    "Invalid file extension: {}",
                    ext
                )));
            }
        }

        Ok(())
    }

    /// Get the effective number of concurrent validations
    pub fn get_thread_count(config: &Config) -> usize {
        config.validation.threads.unwrap_or_else(num_cpus::get)
    }

    /// Idle timeout of pooled instances, if eviction is enabled
    pub fn get_idle_timeout(config: &Config) -> Option<Duration> {
        config.pool.idle_timeout_seconds.map(Duration::from_secs)
    }
}
