//! # docvalidate
//!
//! Validation dispatch for business documents. Rule packages are shipped in
//! signed ASiC-E containers; each incoming document is identified by the
//! installed plugins, mapped to a normalized configuration, and run through the
//! configuration's checkers. Checker and presenter instances are pooled per
//! artifact path and never block a caller when a pool is exhausted.

pub mod cache;
pub mod cli;
pub mod config;
pub mod configuration;
pub mod container;
pub mod declaration;
pub mod document;
pub mod error;
pub mod file_discovery;
pub mod filesystem;
pub mod instance;
pub mod output;
pub mod plugin;
pub mod pool;
pub mod report;
pub mod source;
pub mod validator;

pub use cache::{ConfigurationCache, ConfigurationCacheStats};
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager};
pub use configuration::{
    Configuration, ConfigurationLoader, FileType, FilesystemConfigurationLoader,
    RawConfiguration, StaticConfigurationLoader, StylesheetType,
};
pub use container::{AsicReader, Certificate, ContainerIngestor, ContainerReader, IngestedContainer};
pub use declaration::{DeclarationResolver, Resolution};
pub use document::{Document, DocumentDeclaration};
pub use error::{BoxError, ConfigurationError, ContainerError, StartupError, ValidatorError};
pub use file_discovery::FileDiscovery;
pub use filesystem::VirtualFilesystem;
pub use instance::ValidatorInstance;
pub use output::Output;
pub use plugin::{
    Checker, CheckerType, Declaration, EngineContext, PatternDeclaration, PluginRegistry,
    Presenter, RendererType, SbdhPlugin, ValidatorPlugin, XmlPlugin,
};
pub use pool::{KeyedPool, PoolConfig, PoolStats, Pooled};
pub use report::{Assertion, Report, Section, Severity};
pub use source::SourceInstance;
pub use validator::{
    FileValidationResult, PerformanceMetrics, ProgressCallback, ValidationOutcome,
    ValidationPhase, ValidationProgress, ValidationResults, ValidationStatus, Validator,
    ValidatorBuilder,
};
