use thiserror::Error;

/// Boxed error returned by plugin-supplied checkers, presenters and factories
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main engine error type that encompasses all possible failure modes
#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Startup failed: {0}")]
    Startup(#[from] StartupError),

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Pool exhausted: {pool} pool has {capacity} active instance(s) for {key}")]
    PoolExhausted {
        pool: &'static str,
        key: String,
        capacity: usize,
    },

    #[error("No {kind} registered for {key}")]
    Unsupported { kind: &'static str, key: String },

    #[error("Failed to create {kind} for {key}: {source}")]
    Instantiation {
        kind: &'static str,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Checker failed for {key}: {source}")]
    Checker {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Presenter failed for {key}: {source}")]
    Presenter {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Document matches no registered declaration")]
    UnrecognizedDocument,

    #[error("Stylesheet not found: {identifier}")]
    StylesheetNotFound { identifier: String },

    #[error("Invalid file pattern: {details}")]
    Pattern { details: String },

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },
}

/// Engine construction failures, fatal for the engine being built
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Plugin construction failed: {source}")]
    Plugin {
        #[source]
        source: BoxError,
    },

    #[error("Source storage not defined")]
    SourceStorage,

    #[error("Failed to index configuration artifacts: {0}")]
    Artifacts(ConfigurationError),
}

/// Container ingestion failures
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Malformed container {container}: {details}")]
    Format { container: String, details: String },

    #[error("IO error while unpacking {container}: {source}")]
    Io {
        container: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid entry path in {container}: {path}")]
    InvalidPath { container: String, path: String },
}

/// Configuration resolution failures
///
/// Cloneable so that the configuration cache can hand the same failure to
/// every caller that raced on a miss.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("No configuration found for {identifier}")]
    NotFound { identifier: String },

    #[error("Unresolvable {kind} reference in {identifier}: {path}")]
    Unresolvable {
        identifier: String,
        kind: &'static str,
        path: String,
    },

    #[error("Inheritance cycle detected at {identifier}")]
    InheritanceCycle { identifier: String },

    #[error("Malformed configuration artifact {artifact}: {details}")]
    Malformed { artifact: String, details: String },
}

impl ContainerError {
    pub fn container(&self) -> &str {
        match self {
            ContainerError::Format { container, .. }
            | ContainerError::Io { container, .. }
            | ContainerError::InvalidPath { container, .. } => container,
        }
    }
}

impl ValidatorError {
    /// Whether the failure is transient and the caller may retry later
    pub fn is_transient(&self) -> bool {
        matches!(self, ValidatorError::PoolExhausted { .. })
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidatorError>;

/// Configuration result type alias
pub type ConfigurationResult<T> = std::result::Result<T, ConfigurationError>;

/// Container result type alias
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;
