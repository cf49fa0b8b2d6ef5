use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::SourceSettings;
use crate::container::{Certificate, ContainerIngestor};
use crate::error::{ContainerError, Result, StartupError, ValidatorError};
use crate::filesystem::VirtualFilesystem;

/// File extension of signed rule containers
pub const CONTAINER_EXTENSION: &str = "asice";

/// Owner of the virtual filesystem the rule containers are staged into
///
/// Each container is unpacked under a directory named after it; the resulting
/// filesystem is read-only once the source is built.
#[derive(Debug, Clone)]
pub struct SourceInstance {
    filesystem: Arc<VirtualFilesystem>,
    certificates: Vec<Certificate>,
}

impl SourceInstance {
    /// Source without any container
    pub fn empty(settings: &SourceSettings) -> Result<Self> {
        Self::check_storage(settings)?;
        Ok(Self::from_filesystem(VirtualFilesystem::new()))
    }

    /// Wrap an already populated filesystem
    pub fn from_filesystem(filesystem: VirtualFilesystem) -> Self {
        Self {
            filesystem: Arc::new(filesystem),
            certificates: Vec::new(),
        }
    }

    fn check_storage(settings: &SourceSettings) -> Result<()> {
        if settings.in_memory {
            Ok(())
        } else {
            Err(StartupError::SourceStorage.into())
        }
    }

    /// Unpack every `(name, reader)` container, each under its own name
    pub fn from_containers<R, I>(settings: &SourceSettings, containers: I) -> Result<Self>
    where
        R: Read + Seek,
        I: IntoIterator<Item = (String, R)>,
    {
        Self::check_storage(settings)?;

        let mut filesystem = VirtualFilesystem::new();
        let mut certificates = Vec::new();

        for (name, reader) in containers {
            let target = container_directory(&name);
            let ingested = ContainerIngestor::unpack(reader, &name, &target)?;

            info!(
                container = %name,
                files = ingested.filesystem.file_count(),
                bytes = ingested.filesystem.total_size(),
                "Container loaded"
            );

            filesystem
                .merge(ingested.filesystem)
                .map_err(|source| ContainerError::Io {
                    container: name.clone(),
                    source,
                })?;
            certificates.extend(ingested.certificates);
        }

        Ok(Self {
            filesystem: Arc::new(filesystem),
            certificates,
        })
    }

    /// Load every container found directly in `directory`, in name order
    pub async fn from_directory(settings: &SourceSettings, directory: &Path) -> Result<Self> {
        Self::check_storage(settings)?;

        let mut paths: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_container = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(CONTAINER_EXTENSION))
                .unwrap_or(false);
            if is_container && entry.file_type().await?.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        debug!(directory = %directory.display(), containers = paths.len(), "Loading containers");

        let settings = settings.clone();
        tokio::task::spawn_blocking(move || {
            let mut containers = Vec::with_capacity(paths.len());
            for path in paths {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let file = File::open(&path)?;
                containers.push((name, BufReader::new(file)));
            }
            Self::from_containers(&settings, containers)
        })
        .await
        .map_err(|e| ValidatorError::Concurrency {
            details: format!("container loading task failed: {}", e),
        })?
    }

    pub fn filesystem(&self) -> &Arc<VirtualFilesystem> {
        &self.filesystem
    }

    /// Signing certificates of every loaded container
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }
}

/// Directory a container is unpacked into: its file name without extension
pub fn container_directory(name: &str) -> String {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}
