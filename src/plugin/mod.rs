//! Plugin contracts: document declarations, checker and renderer types.
//!
//! A [`ValidatorPlugin`] contributes four ordered sequences that the
//! [`PluginRegistry`] concatenates at engine construction. Checker and renderer
//! types are factories; the instances they create are pooled by the engine and
//! used by one caller at a time.

mod registry;
pub mod sbdh;
pub mod xml;

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use regex::Regex;

use crate::config::Config;
use crate::configuration::Configuration;
use crate::document::Document;
use crate::error::BoxError;
use crate::filesystem::VirtualFilesystem;
use crate::report::Section;

pub use registry::PluginRegistry;
pub use sbdh::SbdhPlugin;
pub use xml::XmlPlugin;

/// Detects one kind of document
pub trait Declaration: Send + Sync {
    /// Stable name of the declaration
    fn name(&self) -> &str;

    fn matches(&self, document: &Document) -> bool;

    /// Document-specific identifier used to select its configuration
    fn identify(&self, document: &Document) -> String {
        let _ = document;
        self.name().to_string()
    }
}

/// A validation step; one instance is never used by two callers at once
pub trait Checker: Send {
    fn check(&mut self, document: &Document, configuration: &Configuration)
    -> Result<Section, BoxError>;
}

/// Renders a document into the caller's sink
pub trait Presenter: Send {
    fn present(&mut self, document: &Document, output: &mut dyn Write) -> Result<(), BoxError>;
}

/// Everything a checker or presenter needs at construction
#[derive(Clone)]
pub struct EngineContext {
    pub filesystem: Arc<VirtualFilesystem>,
    pub config: Arc<Config>,
}

impl EngineContext {
    pub fn new(filesystem: Arc<VirtualFilesystem>, config: Arc<Config>) -> Self {
        Self { filesystem, config }
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(
            Arc::new(VirtualFilesystem::new()),
            Arc::new(Config::default()),
        )
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("files", &self.filesystem.file_count())
            .field("config", &self.config)
            .finish()
    }
}

/// Extension of the last path component, without the dot
pub fn path_extension(path: &str) -> Option<&str> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension)
        .filter(|extension| !extension.is_empty())
}

fn supports_extension(extensions: &[&str], path: &str) -> bool {
    path_extension(path)
        .map(|extension| extensions.iter().any(|e| e.eq_ignore_ascii_case(extension)))
        .unwrap_or(false)
}

/// Factory of checkers for the file-type paths it supports
pub trait CheckerType: Send + Sync {
    fn name(&self) -> &str;

    /// Path extensions handled by this type
    fn extensions(&self) -> &[&str] {
        &[]
    }

    fn supports(&self, path: &str) -> bool {
        supports_extension(self.extensions(), path)
    }

    fn create(&self, context: &EngineContext, path: &str) -> Result<Box<dyn Checker>, BoxError>;
}

/// Factory of presenters for the stylesheet paths it supports
pub trait RendererType: Send + Sync {
    fn name(&self) -> &str;

    /// Path extensions handled by this type
    fn extensions(&self) -> &[&str] {
        &[]
    }

    fn supports(&self, path: &str) -> bool {
        supports_extension(self.extensions(), path)
    }

    fn create(&self, context: &EngineContext, path: &str)
    -> Result<Box<dyn Presenter>, BoxError>;
}

/// A bundle of declarations, checker types and renderer types
///
/// Each accessor is called once, when the engine is built.
pub trait ValidatorPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    fn checkers(&self) -> Vec<Arc<dyn CheckerType>> {
        Vec::new()
    }

    fn declarations(&self) -> Vec<Arc<dyn Declaration>> {
        Vec::new()
    }

    fn renderers(&self) -> Vec<Arc<dyn RendererType>> {
        Vec::new()
    }
}

/// Declaration matching documents whose text matches a regular expression
///
/// When the expression has a capture group named `identifier`, its first match
/// becomes the document identifier.
#[derive(Debug, Clone)]
pub struct PatternDeclaration {
    name: String,
    pattern: Regex,
}

impl PatternDeclaration {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
        })
    }
}

impl Declaration for PatternDeclaration {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, document: &Document) -> bool {
        self.pattern.is_match(&document.as_text())
    }

    fn identify(&self, document: &Document) -> String {
        self.pattern
            .captures(&document.as_text())
            .and_then(|captures| captures.name("identifier"))
            .map(|identifier| identifier.as_str().to_string())
            .unwrap_or_else(|| self.name.clone())
    }
}
