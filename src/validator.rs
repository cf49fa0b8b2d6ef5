//! Validator façade
//!
//! [`ValidatorBuilder`] assembles plugins, the rule source and a configuration
//! loader into a [`ValidatorInstance`]; [`Validator`] runs documents through it:
//! - **Single documents**: declaration lookup, cached configuration, checkers in order
//! - **Batches**: semaphore-bounded `tokio::spawn` tasks, one per file
//! - **Aggregation**: `futures::try_join_all` collects the per-file results
//!
//! Checkers are synchronous and run directly inside the tasks.

use futures::future::try_join_all;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::ConfigurationCacheStats;
use crate::config::{Config, ConfigManager};
use crate::configuration::{ConfigurationLoader, FilesystemConfigurationLoader};
use crate::declaration::Resolution;
use crate::document::Document;
use crate::error::{BoxError, Result, StartupError, ValidatorError};
use crate::file_discovery::FileDiscovery;
use crate::instance::ValidatorInstance;
use crate::plugin::{EngineContext, PluginRegistry, SbdhPlugin, ValidatorPlugin, XmlPlugin};
use crate::pool::PoolConfig;
use crate::report::{Report, Severity};
use crate::source::SourceInstance;

/// Result of validating one document
#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    Report(Report),
    /// No installed declaration matches the document
    Unrecognized,
}

impl ValidationOutcome {
    pub fn report(&self) -> Option<&Report> {
        match self {
            ValidationOutcome::Report(report) => Some(report),
            ValidationOutcome::Unrecognized => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, ValidationOutcome::Report(_))
    }
}

/// Status of a single file validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    /// Nothing worse than a warning was asserted
    Valid,
    /// The report holds error or fatal assertions
    Invalid { error_count: usize },
    /// The file could not be validated
    Error { message: String },
    /// The file is not a recognized document
    Skipped { reason: String },
}

impl ValidationStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationStatus::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ValidationStatus::Invalid { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ValidationStatus::Error { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ValidationStatus::Skipped { .. })
    }
}

/// Result of validating a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileValidationResult {
    pub path: PathBuf,
    pub status: ValidationStatus,
    /// Identifier of the matched declaration
    pub declaration: Option<String>,
    pub duration: Duration,
    /// One line per error or fatal assertion, or the failure message
    pub error_details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
}

impl FileValidationResult {
    /// Valid or invalid result, depending on the report's flag
    pub fn from_report(path: PathBuf, report: Report, duration: Duration) -> Self {
        let error_details: Vec<String> = report
            .sections
            .iter()
            .flat_map(|section| section.all_assertions())
            .filter(|assertion| assertion.severity >= Severity::Error)
            .map(|assertion| match &assertion.location {
                Some(location) => format!(
                    "[{}] {}: {} (at {})",
                    assertion.severity, assertion.identifier, assertion.message, location
                ),
                None => format!(
                    "[{}] {}: {}",
                    assertion.severity, assertion.identifier, assertion.message
                ),
            })
            .collect();

        let status = if report.is_valid() {
            ValidationStatus::Valid
        } else {
            ValidationStatus::Invalid {
                error_count: error_details.len(),
            }
        };

        Self {
            path,
            status,
            declaration: Some(report.declaration.identifier.clone()),
            duration,
            error_details,
            report: Some(report),
        }
    }

    pub fn error(path: PathBuf, error: ValidatorError, duration: Duration) -> Self {
        let message = error.to_string();
        Self {
            path,
            status: ValidationStatus::Error {
                message: message.clone(),
            },
            declaration: None,
            duration,
            error_details: vec![message],
            report: None,
        }
    }

    pub fn skipped(path: PathBuf, reason: String, duration: Duration) -> Self {
        Self {
            path,
            status: ValidationStatus::Skipped { reason },
            declaration: None,
            duration,
            error_details: Vec::new(),
            report: None,
        }
    }
}

/// Progress update for batch validation
#[derive(Debug, Clone)]
pub struct ValidationProgress {
    pub current_file: Option<PathBuf>,
    pub completed: usize,
    pub total: usize,
    pub phase: ValidationPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPhase {
    Discovery,
    Validation,
    Aggregation,
    Complete,
}

/// Timing and cache figures of a batch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_duration: Duration,
    pub discovery_duration: Duration,
    pub validation_duration: Duration,
    pub average_time_per_file: Duration,
    pub throughput_files_per_second: f64,
    pub concurrent_validations: usize,
    pub configuration_cache: ConfigurationCacheStats,
}

/// Aggregated results of validating multiple files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResults {
    pub total_files: usize,
    pub valid_files: usize,
    pub invalid_files: usize,
    pub error_files: usize,
    pub skipped_files: usize,
    /// Sum of the per-file durations
    pub total_duration: Duration,
    pub average_duration: Duration,
    pub file_results: Vec<FileValidationResult>,
    /// Declaration identifiers seen, sorted
    pub declarations_used: Vec<String>,
    pub performance_metrics: PerformanceMetrics,
}

impl ValidationResults {
    pub fn aggregate(file_results: Vec<FileValidationResult>) -> Self {
        let total_files = file_results.len();
        let mut valid_files = 0;
        let mut invalid_files = 0;
        let mut error_files = 0;
        let mut skipped_files = 0;
        let mut total_duration = Duration::ZERO;
        let mut declarations_used = std::collections::BTreeSet::new();

        for result in &file_results {
            match result.status {
                ValidationStatus::Valid => valid_files += 1,
                ValidationStatus::Invalid { .. } => invalid_files += 1,
                ValidationStatus::Error { .. } => error_files += 1,
                ValidationStatus::Skipped { .. } => skipped_files += 1,
            }

            total_duration += result.duration;

            if let Some(declaration) = &result.declaration {
                declarations_used.insert(declaration.clone());
            }
        }

        let average_duration = if total_files > 0 {
            total_duration / total_files as u32
        } else {
            Duration::ZERO
        };

        let performance_metrics = PerformanceMetrics {
            total_duration,
            validation_duration: total_duration,
            average_time_per_file: average_duration,
            throughput_files_per_second: throughput(total_files, total_duration),
            ..PerformanceMetrics::default()
        };

        Self {
            total_files,
            valid_files,
            invalid_files,
            error_files,
            skipped_files,
            total_duration,
            average_duration,
            file_results,
            declarations_used: declarations_used.into_iter().collect(),
            performance_metrics,
        }
    }

    pub fn with_metrics(
        file_results: Vec<FileValidationResult>,
        performance_metrics: PerformanceMetrics,
    ) -> Self {
        let mut results = Self::aggregate(file_results);
        results.performance_metrics = performance_metrics;
        results
    }

    /// Whether there was at least one file and every file is valid
    pub fn all_valid(&self) -> bool {
        self.valid_files == self.total_files && self.total_files > 0
    }

    pub fn has_errors(&self) -> bool {
        self.error_files > 0 || self.invalid_files > 0
    }

    /// Share of valid files, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.valid_files as f64 / self.total_files as f64) * 100.0
        }
    }
}

fn throughput(files: usize, duration: Duration) -> f64 {
    if duration.as_secs_f64() > 0.0 {
        files as f64 / duration.as_secs_f64()
    } else {
        0.0
    }
}

/// Progress callback type for validation updates
pub type ProgressCallback = Arc<dyn Fn(ValidationProgress) + Send + Sync>;

/// Assembles a [`Validator`]
pub struct ValidatorBuilder {
    plugins: Vec<std::result::Result<Arc<dyn ValidatorPlugin>, StartupError>>,
    source: Option<SourceInstance>,
    loader: Option<Arc<dyn ConfigurationLoader>>,
    config: Config,
}

impl ValidatorBuilder {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            source: None,
            loader: None,
            config: Config::default(),
        }
    }

    /// Install a plugin; plugins are consulted in installation order
    pub fn plugin(mut self, plugin: impl ValidatorPlugin + 'static) -> Self {
        self.plugins.push(Ok(Arc::new(plugin)));
        self
    }

    /// Install the result of a fallible plugin construction
    ///
    /// A failed construction makes [`build`](Self::build) fail.
    pub fn try_plugin<P, E>(mut self, plugin: std::result::Result<P, E>) -> Self
    where
        P: ValidatorPlugin + 'static,
        E: Into<BoxError>,
    {
        self.plugins.push(
            plugin
                .map(|plugin| Arc::new(plugin) as Arc<dyn ValidatorPlugin>)
                .map_err(|e| StartupError::Plugin { source: e.into() }),
        );
        self
    }

    /// Install the SBDH and generic XML plugins
    pub fn with_default_plugins(self) -> Self {
        self.plugin(SbdhPlugin).plugin(XmlPlugin)
    }

    /// Use an already loaded rule source instead of `source.directory`
    pub fn source(mut self, source: SourceInstance) -> Self {
        self.source = Some(source);
        self
    }

    /// Use `loader` instead of the artifacts found in the rule source
    pub fn configuration_loader(mut self, loader: impl ConfigurationLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub async fn build(self) -> Result<Validator> {
        let plugins = self
            .plugins
            .into_iter()
            .collect::<std::result::Result<Vec<_>, StartupError>>()?;

        let source = match self.source {
            Some(source) => source,
            None => match &self.config.source.directory {
                Some(directory) => {
                    SourceInstance::from_directory(&self.config.source, directory).await?
                }
                None => SourceInstance::empty(&self.config.source)?,
            },
        };

        let loader: Arc<dyn ConfigurationLoader> = match self.loader {
            Some(loader) => loader,
            None => Arc::new(
                FilesystemConfigurationLoader::from_filesystem(source.filesystem())
                    .map_err(StartupError::Artifacts)?,
            ),
        };

        let config = Arc::new(self.config);
        let registry = Arc::new(PluginRegistry::register_all(&plugins));
        let context = EngineContext::new(source.filesystem().clone(), config.clone());
        let instance = ValidatorInstance::new(
            registry,
            loader,
            context,
            PoolConfig::from(&config.pool),
        );

        info!(
            plugins = plugins.len(),
            source_files = source.filesystem().file_count(),
            certificates = source.certificates().len(),
            "Validator ready"
        );

        Ok(Validator {
            instance: Arc::new(instance),
            source: Arc::new(source),
            config,
        })
    }
}

impl Default for ValidatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates and renders documents; cheap to clone and share between tasks
#[derive(Debug, Clone)]
pub struct Validator {
    instance: Arc<ValidatorInstance>,
    source: Arc<SourceInstance>,
    config: Arc<Config>,
}

impl Validator {
    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::new()
    }

    pub fn instance(&self) -> &ValidatorInstance {
        &self.instance
    }

    pub fn source(&self) -> &SourceInstance {
        &self.source
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn packages(&self) -> Vec<String> {
        self.instance.packages()
    }

    /// Run every configured file type over `document`, in configuration order
    ///
    /// Stops after a fatal section, or after an error section when
    /// `fail_fast` is set.
    pub async fn validate(&self, document: &Document) -> Result<ValidationOutcome> {
        let start = Instant::now();

        let declaration = match self.instance.resolve(document) {
            Resolution::Recognized(declaration) => declaration,
            Resolution::Unrecognized => return Ok(ValidationOutcome::Unrecognized),
        };
        let configuration = self.instance.configuration(&declaration).await?;

        let mut report = Report::new(declaration);
        for file_type in configuration.files() {
            let mut section = self.instance.check(file_type, document, &configuration)?;
            if section.title.is_none() {
                section.title = Some(file_type.label().to_string());
            }

            let flag = section.flag();
            report.sections.push(section);

            if flag == Severity::Fatal
                || (flag == Severity::Error && self.config.validation.fail_fast)
            {
                debug!(path = %file_type.path, %flag, "Stopping after failed section");
                break;
            }
        }

        report.duration = start.elapsed();
        Ok(ValidationOutcome::Report(report))
    }

    /// Render `document` with the named stylesheet, or the first configured one
    pub async fn render(
        &self,
        document: &Document,
        stylesheet: Option<&str>,
        output: &mut dyn Write,
    ) -> Result<()> {
        let declaration = self
            .instance
            .resolve(document)
            .declaration()
            .cloned()
            .ok_or(ValidatorError::UnrecognizedDocument)?;
        let configuration = self.instance.configuration(&declaration).await?;

        let selected = match stylesheet {
            Some(identifier) => configuration.stylesheet(identifier),
            None => configuration.stylesheets().first(),
        };
        let selected = selected.ok_or_else(|| ValidatorError::StylesheetNotFound {
            identifier: stylesheet
                .unwrap_or(configuration.identifier())
                .to_string(),
        })?;

        self.instance.present(selected, document, output)
    }

    /// Read and validate one file; failures become an error result
    pub async fn validate_file(&self, path: &Path) -> FileValidationResult {
        let start = Instant::now();

        let document = match tokio::fs::read(path).await {
            Ok(content) => Document::new(content),
            Err(e) => return FileValidationResult::error(path.to_path_buf(), e.into(), start.elapsed()),
        };

        match self.validate(&document).await {
            Ok(ValidationOutcome::Report(report)) => {
                FileValidationResult::from_report(path.to_path_buf(), report, start.elapsed())
            }
            Ok(ValidationOutcome::Unrecognized) => FileValidationResult::skipped(
                path.to_path_buf(),
                "No declaration matches the document".to_string(),
                start.elapsed(),
            ),
            Err(e) => FileValidationResult::error(path.to_path_buf(), e, start.elapsed()),
        }
    }

    /// Files validated at once in a batch
    ///
    /// Each task holds one checker at a time, so the batch never outgrows a
    /// checker pool key and cannot exhaust it on its own.
    pub fn batch_concurrency(&self) -> usize {
        ConfigManager::get_thread_count(&self.config)
            .min(self.instance.checker_pool().config().max_per_key)
            .max(1)
    }

    pub async fn validate_files(&self, files: Vec<PathBuf>) -> Result<Vec<FileValidationResult>> {
        self.validate_files_with_progress(files, None).await
    }

    /// Validate `files` concurrently; results keep the input order
    pub async fn validate_files_with_progress(
        &self,
        files: Vec<PathBuf>,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<Vec<FileValidationResult>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let total_files = files.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.batch_concurrency()));

        let tasks: Vec<_> = files
            .into_iter()
            .map(|path| {
                let validator = self.clone();
                let semaphore = Arc::clone(&semaphore);
                let completed = Arc::clone(&completed);
                let progress_callback = progress_callback.clone();

                tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.map_err(|_| {
                        ValidatorError::Concurrency {
                            details: "Failed to acquire validation semaphore".to_string(),
                        }
                    })?;

                    let result = validator.validate_file(&path).await;

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(callback) = &progress_callback {
                        callback(ValidationProgress {
                            current_file: Some(path),
                            completed: done,
                            total: total_files,
                            phase: ValidationPhase::Validation,
                        });
                    }

                    Ok::<FileValidationResult, ValidatorError>(result)
                })
            })
            .collect();

        let task_results = try_join_all(tasks)
            .await
            .map_err(|e| ValidatorError::Concurrency {
                details: format!("Task join error: {}", e),
            })?;

        task_results.into_iter().collect()
    }

    /// Discover the files below `path` and validate them
    pub async fn validate_path(
        &self,
        path: &Path,
        discovery: &FileDiscovery,
    ) -> Result<ValidationResults> {
        self.validate_path_with_progress(path, discovery, None).await
    }

    pub async fn validate_path_with_progress(
        &self,
        path: &Path,
        discovery: &FileDiscovery,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<ValidationResults> {
        let workflow_start = Instant::now();
        let notify = |completed, total, phase| {
            if let Some(callback) = &progress_callback {
                callback(ValidationProgress {
                    current_file: None,
                    completed,
                    total,
                    phase,
                });
            }
        };
        let mut metrics = PerformanceMetrics {
            concurrent_validations: self.batch_concurrency(),
            ..PerformanceMetrics::default()
        };

        notify(0, 0, ValidationPhase::Discovery);
        let discovery_start = Instant::now();
        let files = discovery.discover_files(path).await?;
        metrics.discovery_duration = discovery_start.elapsed();

        let validation_start = Instant::now();
        let results = self
            .validate_files_with_progress(files, progress_callback.clone())
            .await?;
        metrics.validation_duration = validation_start.elapsed();

        notify(results.len(), results.len(), ValidationPhase::Aggregation);

        metrics.configuration_cache = self.instance.cache_stats().await;
        metrics.total_duration = workflow_start.elapsed();
        metrics.average_time_per_file = if results.is_empty() {
            Duration::ZERO
        } else {
            metrics.validation_duration / results.len() as u32
        };
        metrics.throughput_files_per_second = throughput(results.len(), metrics.total_duration);

        let results = ValidationResults::with_metrics(results, metrics);
        notify(results.total_files, results.total_files, ValidationPhase::Complete);

        Ok(results)
    }
}
