use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show failures
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show every assertion
    Verbose,
}

impl VerbosityLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            VerbosityLevel::Quiet
        } else if verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Default tracing filter directive for this verbosity
    pub fn log_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "docvalidate=debug,info",
        }
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Summary,
}

/// Validate business documents against the rule packages of signed containers
#[derive(Parser, Debug, Clone)]
#[command(name = "docvalidate")]
#[command(about = "Validate business documents against declaration-specific rule packages")]
#[command(version)]
pub struct Cli {
    /// Directory or file to validate
    #[arg(required_unless_present = "list_packages")]
    pub path: Option<PathBuf>,

    /// Directory holding the rule containers (*.asice)
    #[arg(short = 's', long = "source")]
    pub source: Option<PathBuf>,

    /// Settings file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// File extensions to process (comma-separated)
    #[arg(
        short = 'e',
        long = "extensions",
        help = "File extensions to process (e.g., 'xml,sbd')"
    )]
    pub extensions: Option<String>,

    /// Number of documents validated concurrently
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet mode (failures only)
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Stop validating a document after its first failing check
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,

    /// Output format
    #[arg(long = "format", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Maximum number of pooled instances per checker or stylesheet
    #[arg(long = "pool-size")]
    pub pool_size: Option<usize>,

    /// Include file patterns (glob syntax)
    #[arg(long = "include", action = clap::ArgAction::Append)]
    pub include_patterns: Vec<String>,

    /// Exclude file patterns (glob syntax)
    #[arg(long = "exclude", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Print the available packages and exit
    #[arg(long = "list-packages")]
    pub list_packages: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn get_extensions(&self) -> Option<Vec<String>> {
        self.extensions.as_ref().map(|extensions| {
            extensions
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        VerbosityLevel::from_flags(self.verbose, self.quiet)
    }

    /// Whether progress may be reported on an interactive terminal
    pub fn interactive(&self) -> bool {
        atty::is(atty::Stream::Stderr) && !self.quiet
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(path) = &self.path
            && !path.exists()
        {
            return Err(format!("Path does not exist: {}", path.display()));
        }
        if let Some(source) = &self.source
            && !source.is_dir()
        {
            return Err(format!("Source is not a directory: {}", source.display()));
        }
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        if let Some(pool_size) = self.pool_size
            && pool_size == 0
        {
            return Err("Pool size must be greater than 0".to_string());
        }
        Ok(())
    }
}
