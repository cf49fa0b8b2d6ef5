//! In-memory staging filesystem for unpacked containers.
//!
//! Paths are `/`-separated and relative to the filesystem root; a leading `/`
//! is accepted and ignored. Components `..` are rejected so that nothing can be
//! addressed outside the root.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
pub struct VirtualFilesystem {
    files: BTreeMap<String, Arc<[u8]>>,
    directories: BTreeSet<String>,
}

impl VirtualFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a path into its canonical form (`a/b/c`)
    pub fn normalize(path: &str) -> io::Result<String> {
        let mut components = Vec::new();
        for component in path.split(['/', '\\']) {
            match component {
                "" | "." => continue,
                ".." => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("path escapes filesystem root: {}", path),
                    ));
                }
                other => components.push(other),
            }
        }
        Ok(components.join("/"))
    }

    /// Join a directory and a relative path, then normalize
    pub fn join(base: &str, path: &str) -> io::Result<String> {
        Self::normalize(&format!("{}/{}", base, path))
    }

    fn parent_of(path: &str) -> &str {
        path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
    }

    /// Create a directory and all missing parents
    pub fn create_dir_all(&mut self, path: &str) -> io::Result<()> {
        let normalized = Self::normalize(path)?;
        if normalized.is_empty() {
            return Ok(());
        }

        let mut current = String::new();
        for component in normalized.split('/') {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(component);

            if self.files.contains_key(&current) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("not a directory: {}", current),
                ));
            }
            self.directories.insert(current.clone());
        }
        Ok(())
    }

    /// Write a file; its parent directory must already exist
    pub fn write(&mut self, path: &str, content: impl Into<Vec<u8>>) -> io::Result<()> {
        let normalized = Self::normalize(path)?;
        if normalized.is_empty() || self.directories.contains(&normalized) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("is a directory: {}", path),
            ));
        }
        if !self.is_dir(Self::parent_of(&normalized)) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("parent directory missing: {}", path),
            ));
        }

        self.files
            .insert(normalized, Arc::from(content.into()));
        Ok(())
    }

    pub fn read(&self, path: &str) -> io::Result<Arc<[u8]>> {
        let normalized = Self::normalize(path)?;
        self.files.get(&normalized).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {}", path))
        })
    }

    pub fn read_to_string(&self, path: &str) -> io::Result<String> {
        let content = self.read(path)?;
        String::from_utf8(content.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn is_file(&self, path: &str) -> bool {
        Self::normalize(path)
            .map(|p| self.files.contains_key(&p))
            .unwrap_or(false)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        match Self::normalize(path) {
            Ok(p) => p.is_empty() || self.directories.contains(&p),
            Err(_) => false,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    /// Names of the direct children of a directory, sorted
    pub fn list(&self, path: &str) -> io::Result<Vec<String>> {
        let normalized = Self::normalize(path)?;
        if !self.is_dir(&normalized) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {}", path),
            ));
        }

        let prefix = if normalized.is_empty() {
            String::new()
        } else {
            format!("{}/", normalized)
        };

        let children = self
            .directories
            .iter()
            .chain(self.files.keys())
            .filter_map(|entry| entry.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect::<BTreeSet<_>>();

        Ok(children.into_iter().collect())
    }

    /// All files with their content, in path order
    pub fn files(&self) -> impl Iterator<Item = (&str, &Arc<[u8]>)> {
        self.files.iter().map(|(path, content)| (path.as_str(), content))
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn total_size(&self) -> u64 {
        self.files.values().map(|c| c.len() as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }

    /// Move every entry of `other` into this filesystem
    ///
    /// Fails without modifying `self` if any file of `other` already exists here.
    pub fn merge(&mut self, other: VirtualFilesystem) -> io::Result<()> {
        if let Some(conflict) = other
            .files
            .keys()
            .find(|path| self.files.contains_key(*path) || self.directories.contains(*path))
        {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("file already exists: {}", conflict),
            ));
        }

        self.directories.extend(other.directories);
        self.files.extend(other.files);
        Ok(())
    }
}
