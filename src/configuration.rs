//! Per-declaration configurations: which checks run and which stylesheets apply.
//!
//! Loaders return [`RawConfiguration`]s as written in the rule artifacts;
//! [`normalize`] flattens inheritance, removes duplicates and verifies that
//! every reference resolves to a registered checker or renderer type.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigurationError, ConfigurationResult};
use crate::filesystem::VirtualFilesystem;
use crate::plugin::PluginRegistry;

/// A check to run, keyed by the checker path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub path: String,
}

impl FileType {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            name: None,
            path: path.into(),
        }
    }

    pub fn named(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            path: path.into(),
        }
    }

    /// Name for display, falling back to the path
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.path)
    }
}

/// A presentation, keyed by the stylesheet path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StylesheetType {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub path: String,
}

impl StylesheetType {
    pub fn new(identifier: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: None,
            path: path.into(),
        }
    }
}

/// Configuration as declared, before inheritance is applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConfiguration {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Identifiers of parent configurations, applied first
    #[serde(default)]
    pub inherit: Vec<String>,
    #[serde(default, rename = "file")]
    pub files: Vec<FileType>,
    #[serde(default, rename = "stylesheet")]
    pub stylesheets: Vec<StylesheetType>,
}

impl RawConfiguration {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn inherit(mut self, parent: impl Into<String>) -> Self {
        self.inherit.push(parent.into());
        self
    }

    pub fn file(mut self, file: FileType) -> Self {
        self.files.push(file);
        self
    }

    pub fn stylesheet(mut self, stylesheet: StylesheetType) -> Self {
        self.stylesheets.push(stylesheet);
        self
    }
}

/// Normalized, immutable configuration of one declaration identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    identifier: String,
    title: Option<String>,
    files: Vec<FileType>,
    stylesheets: Vec<StylesheetType>,
}

impl Configuration {
    /// Configuration without checks or stylesheets
    pub fn empty(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: None,
            files: Vec::new(),
            stylesheets: Vec::new(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// File types in execution order
    pub fn files(&self) -> &[FileType] {
        &self.files
    }

    pub fn stylesheets(&self) -> &[StylesheetType] {
        &self.stylesheets
    }

    pub fn stylesheet(&self, identifier: &str) -> Option<&StylesheetType> {
        self.stylesheets
            .iter()
            .find(|stylesheet| stylesheet.identifier == identifier)
    }
}

/// Source of raw configurations
#[async_trait]
pub trait ConfigurationLoader: Send + Sync {
    async fn load(&self, identifier: &str) -> ConfigurationResult<RawConfiguration>;

    /// Names of the rule packages this loader serves
    fn packages(&self) -> Vec<String> {
        Vec::new()
    }
}

fn collect_chain<'a>(
    raw: RawConfiguration,
    loader: &'a dyn ConfigurationLoader,
    visiting: &'a mut Vec<String>,
    ordered: &'a mut Vec<RawConfiguration>,
) -> BoxFuture<'a, ConfigurationResult<()>> {
    Box::pin(async move {
        if visiting.contains(&raw.identifier) {
            return Err(ConfigurationError::InheritanceCycle {
                identifier: raw.identifier,
            });
        }
        visiting.push(raw.identifier.clone());

        for parent in &raw.inherit {
            let parent = loader.load(parent).await?;
            collect_chain(parent, loader, &mut *visiting, &mut *ordered).await?;
        }

        visiting.pop();
        ordered.push(raw);
        Ok(())
    })
}

/// Resolve inheritance, deduplicate by path and verify every reference
///
/// Parents are applied depth-first before the configuration itself; the first
/// occurrence of a path wins and keeps its position.
pub async fn normalize(
    raw: RawConfiguration,
    loader: &dyn ConfigurationLoader,
    registry: &PluginRegistry,
) -> ConfigurationResult<Configuration> {
    let identifier = raw.identifier.clone();
    let title = raw.title.clone();

    let mut ordered = Vec::new();
    collect_chain(raw, loader, &mut Vec::new(), &mut ordered).await?;

    let mut seen_files = HashSet::new();
    let mut seen_stylesheets = HashSet::new();
    let mut files = Vec::new();
    let mut stylesheets = Vec::new();

    for raw in ordered {
        for file in raw.files {
            if seen_files.insert(file.path.clone()) {
                files.push(file);
            }
        }
        for stylesheet in raw.stylesheets {
            if seen_stylesheets.insert(stylesheet.path.clone()) {
                stylesheets.push(stylesheet);
            }
        }
    }

    if let Some(file) = files
        .iter()
        .find(|file| registry.checker_type(&file.path).is_none())
    {
        return Err(ConfigurationError::Unresolvable {
            identifier,
            kind: "file",
            path: file.path.clone(),
        });
    }

    if let Some(stylesheet) = stylesheets
        .iter()
        .find(|stylesheet| registry.renderer_type(&stylesheet.path).is_none())
    {
        return Err(ConfigurationError::Unresolvable {
            identifier,
            kind: "stylesheet",
            path: stylesheet.path.clone(),
        });
    }

    debug!(
        identifier = %identifier,
        files = files.len(),
        stylesheets = stylesheets.len(),
        "Configuration normalized"
    );

    Ok(Configuration {
        identifier,
        title,
        files,
        stylesheets,
    })
}

/// Loader over configurations supplied up front
#[derive(Debug, Clone, Default)]
pub struct StaticConfigurationLoader {
    configurations: HashMap<String, RawConfiguration>,
    packages: Vec<String>,
}

impl StaticConfigurationLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, raw: RawConfiguration) -> Self {
        self.insert(raw);
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.packages.push(package.into());
        self
    }

    /// Add a configuration, replacing one with the same identifier
    pub fn insert(&mut self, raw: RawConfiguration) {
        self.configurations.insert(raw.identifier.clone(), raw);
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }
}

#[async_trait]
impl ConfigurationLoader for StaticConfigurationLoader {
    async fn load(&self, identifier: &str) -> ConfigurationResult<RawConfiguration> {
        self.configurations
            .get(identifier)
            .cloned()
            .ok_or_else(|| ConfigurationError::NotFound {
                identifier: identifier.to_string(),
            })
    }

    fn packages(&self) -> Vec<String> {
        self.packages.clone()
    }
}

#[derive(Debug, Deserialize)]
struct PackageInfo {
    name: String,
}

/// One TOML rule artifact: an optional package and its configurations
#[derive(Debug, Deserialize)]
struct Artifact {
    #[serde(default)]
    package: Option<PackageInfo>,
    #[serde(default, rename = "configuration")]
    configurations: Vec<RawConfiguration>,
}

/// Loader indexing the TOML artifacts of a source filesystem
///
/// Every `*.toml` file is parsed once at construction. When two artifacts
/// declare the same identifier, the one with the first path wins.
#[derive(Debug, Clone, Default)]
pub struct FilesystemConfigurationLoader {
    inner: StaticConfigurationLoader,
}

impl FilesystemConfigurationLoader {
    pub fn from_filesystem(filesystem: &VirtualFilesystem) -> ConfigurationResult<Self> {
        let mut inner = StaticConfigurationLoader::new();
        let mut packages: Vec<String> = Vec::new();

        for (path, content) in filesystem.files() {
            if !path.ends_with(".toml") {
                continue;
            }

            let text = std::str::from_utf8(content).map_err(|e| ConfigurationError::Malformed {
                artifact: path.to_string(),
                details: e.to_string(),
            })?;
            let artifact: Artifact =
                toml::from_str(text).map_err(|e| ConfigurationError::Malformed {
                    artifact: path.to_string(),
                    details: e.to_string(),
                })?;

            if let Some(package) = artifact.package
                && !packages.contains(&package.name)
            {
                packages.push(package.name);
            }

            for raw in artifact.configurations {
                if inner.configurations.contains_key(&raw.identifier) {
                    warn!(
                        artifact = path,
                        identifier = %raw.identifier,
                        "Duplicate configuration ignored"
                    );
                    continue;
                }
                inner.insert(raw);
            }

            debug!(artifact = path, "Indexed configuration artifact");
        }

        inner.packages = packages;
        Ok(Self { inner })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl ConfigurationLoader for FilesystemConfigurationLoader {
    async fn load(&self, identifier: &str) -> ConfigurationResult<RawConfiguration> {
        self.inner.load(identifier).await
    }

    fn packages(&self) -> Vec<String> {
        self.inner.packages()
    }
}
