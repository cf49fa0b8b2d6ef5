use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tokio::fs;
use tracing::{debug, warn};

use crate::config::FileConfig;
use crate::error::{Result, ValidatorError};

/// Finds the documents to validate below a path
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// Lowercase extensions, without the dot
    extensions: Vec<String>,
    include_set: Option<GlobSet>,
    exclude_set: Option<GlobSet>,
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_set: None,
            exclude_set: None,
        }
    }

    /// Discovery configured from the `[files]` settings
    pub fn from_settings(settings: &FileConfig) -> Result<Self> {
        Self::new()
            .with_extensions(settings.extensions.clone())
            .with_include_patterns(&settings.include_patterns)?
            .with_exclude_patterns(&settings.exclude_patterns)
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Only paths matching at least one of `patterns` are kept
    pub fn with_include_patterns(mut self, patterns: &[String]) -> Result<Self> {
        self.include_set = glob_set(patterns)?;
        Ok(self)
    }

    /// Paths matching any of `patterns` are dropped
    pub fn with_exclude_patterns(mut self, patterns: &[String]) -> Result<Self> {
        self.exclude_set = glob_set(patterns)?;
        Ok(self)
    }

    /// Every matching file below `path`, sorted; `path` itself when it is a file
    ///
    /// Unreadable subdirectories are skipped with a warning.
    pub async fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let metadata = fs::metadata(path).await?;
        if metadata.is_file() {
            return Ok(if self.should_process(path) {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            });
        }

        let mut files = Vec::new();
        let mut pending = vec![path.to_path_buf()];
        let mut root = true;

        while let Some(directory) = pending.pop() {
            let mut entries = match fs::read_dir(&directory).await {
                Ok(entries) => entries,
                // The root must be readable
                Err(e) if root => return Err(e.into()),
                Err(e) => {
                    warn!(path = %directory.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
            };
            root = false;

            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let entry_path = entry.path();
                if file_type.is_dir() {
                    pending.push(entry_path);
                } else if file_type.is_file() && self.should_process(&entry_path) {
                    files.push(entry_path);
                }
            }
        }

        files.sort();
        debug!(path = %path.display(), files = files.len(), "Discovery finished");
        Ok(files)
    }

    /// Whether `path` passes the extension, exclude and include filters
    pub fn should_process(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        if !self.extensions.contains(&extension.to_lowercase()) {
            return false;
        }

        if let Some(exclude_set) = &self.exclude_set
            && exclude_set.is_match(path)
        {
            return false;
        }

        self.include_set
            .as_ref()
            .map(|include_set| include_set.is_match(path))
            .unwrap_or(true)
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

fn glob_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| ValidatorError::Pattern {
                details: format!("'{}': {}", pattern, e),
            })?;
        builder.add(glob);
    }

    let set = builder.build().map_err(|e| ValidatorError::Pattern {
        details: e.to_string(),
    })?;
    Ok(Some(set))
}
