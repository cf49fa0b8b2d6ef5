//! Signed container ingestion.
//!
//! Containers are ASiC-E packages: ZIP archives whose data entries are staged
//! into a [`VirtualFilesystem`], and whose `META-INF/` directory carries the
//! signatures and a manifest listing the signing certificates. Certificates
//! are only reported for provenance; signature validity is not verified here.

use std::io::{self, Read, Seek, Write};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{ContainerError, ContainerResult};
use crate::filesystem::VirtualFilesystem;

pub const ASIC_MIMETYPE: &str = "application/vnd.etsi.asic-e+zip";
pub const MANIFEST_PATH: &str = "META-INF/asicmanifest.xml";

/// Signing certificate listed in a container manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub subject: String,
    /// Signature entry the certificate belongs to
    pub signature: Option<String>,
}

/// Pull-based access to the entries of a signed container
pub trait ContainerReader {
    /// Name used in errors and log output
    fn name(&self) -> &str;

    /// Advance to the next data entry, returning its name
    fn next_file(&mut self) -> ContainerResult<Option<String>>;

    /// Copy the content of the current entry into `sink`
    fn write_file(&mut self, sink: &mut dyn Write) -> ContainerResult<u64>;

    /// Certificates found in the container, complete once `next_file` returned `None`
    fn certificates(&self) -> &[Certificate];
}

/// ZIP-backed ASiC-E reader; entries are decompressed one at a time
pub struct AsicReader<R: Read + Seek> {
    name: String,
    archive: ZipArchive<R>,
    next_index: usize,
    current: Option<usize>,
    certificates: Vec<Certificate>,
}

impl<R: Read + Seek> AsicReader<R> {
    pub fn new(name: impl Into<String>, container: R) -> ContainerResult<Self> {
        let name = name.into();
        let archive = ZipArchive::new(container).map_err(|e| zip_error(&name, e))?;

        Ok(Self {
            name,
            archive,
            next_index: 0,
            current: None,
            certificates: Vec::new(),
        })
    }

    fn read_entry(&mut self, index: usize) -> ContainerResult<Vec<u8>> {
        let mut entry = self
            .archive
            .by_index(index)
            .map_err(|e| zip_error(&self.name, e))?;
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|source| ContainerError::Io {
                container: self.name.clone(),
                source,
            })?;
        Ok(content)
    }

    fn handle_metadata(&mut self, index: usize, entry_name: &str) -> ContainerResult<()> {
        if entry_name == "mimetype" {
            let content = self.read_entry(index)?;
            if content.trim_ascii() != ASIC_MIMETYPE.as_bytes() {
                return Err(ContainerError::Format {
                    container: self.name.clone(),
                    details: format!(
                        "unexpected mimetype '{}'",
                        String::from_utf8_lossy(&content)
                    ),
                });
            }
        } else if entry_name == MANIFEST_PATH {
            let content = self.read_entry(index)?;
            self.certificates = parse_manifest(&self.name, &content)?;
        } else {
            debug!(container = %self.name, entry = entry_name, "Skipping container metadata");
        }
        Ok(())
    }
}

impl<R: Read + Seek> ContainerReader for AsicReader<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_file(&mut self) -> ContainerResult<Option<String>> {
        self.current = None;

        while self.next_index < self.archive.len() {
            let index = self.next_index;
            self.next_index += 1;

            let (entry_name, is_dir) = {
                let entry = self
                    .archive
                    .by_index(index)
                    .map_err(|e| zip_error(&self.name, e))?;
                (entry.name().to_string(), entry.is_dir())
            };

            if is_dir {
                continue;
            }
            if entry_name == "mimetype" || entry_name.starts_with("META-INF/") {
                self.handle_metadata(index, &entry_name)?;
                continue;
            }

            self.current = Some(index);
            return Ok(Some(entry_name));
        }

        Ok(None)
    }

    fn write_file(&mut self, sink: &mut dyn Write) -> ContainerResult<u64> {
        let index = self.current.ok_or_else(|| ContainerError::Format {
            container: self.name.clone(),
            details: "no current entry to write".to_string(),
        })?;

        let mut entry = self
            .archive
            .by_index(index)
            .map_err(|e| zip_error(&self.name, e))?;
        io::copy(&mut entry, sink).map_err(|source| ContainerError::Io {
            container: self.name.clone(),
            source,
        })
    }

    fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }
}

fn zip_error(container: &str, error: ZipError) -> ContainerError {
    match error {
        ZipError::Io(source) => ContainerError::Io {
            container: container.to_string(),
            source,
        },
        other => ContainerError::Format {
            container: container.to_string(),
            details: other.to_string(),
        },
    }
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Extract the certificate list of an ASiC manifest
///
/// The manifest nests the encoded certificate in a `certificate` child of the
/// outer `certificate` element, so the depth of same-named elements is tracked.
fn parse_manifest(container: &str, xml: &[u8]) -> ContainerResult<Vec<Certificate>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut certificates = Vec::new();
    let mut current: Option<Certificate> = None;
    let mut nested = 0usize;
    let mut in_subject = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"certificate" if current.is_none() => {
                    current = Some(Certificate {
                        subject: String::new(),
                        signature: attribute(&e, b"cert"),
                    });
                }
                b"certificate" => nested += 1,
                b"subject" if current.is_some() => in_subject = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if current.is_none() && e.local_name().as_ref() == b"certificate" => {
                certificates.push(Certificate {
                    subject: String::new(),
                    signature: attribute(&e, b"cert"),
                });
            }
            Ok(Event::Text(text)) if in_subject => {
                let subject = text.unescape().map_err(|e| ContainerError::Format {
                    container: container.to_string(),
                    details: format!("invalid manifest text: {}", e),
                })?;
                if let Some(certificate) = current.as_mut() {
                    certificate.subject.push_str(&subject);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"subject" => in_subject = false,
                b"certificate" if nested > 0 => nested -= 1,
                b"certificate" => {
                    if let Some(certificate) = current.take() {
                        certificates.push(certificate);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ContainerError::Format {
                    container: container.to_string(),
                    details: format!(
                        "manifest parsing error at position {}: {}",
                        reader.error_position(),
                        e
                    ),
                });
            }
            _ => {}
        }
    }

    Ok(certificates)
}

/// Filesystem staged from one container, with its provenance
#[derive(Debug, Clone)]
pub struct IngestedContainer {
    pub filesystem: VirtualFilesystem,
    pub certificates: Vec<Certificate>,
}

/// Stages container entries into a fresh virtual filesystem
pub struct ContainerIngestor;

impl ContainerIngestor {
    /// Unpack an ASiC-E container into `target`
    pub fn unpack<R: Read + Seek>(
        container: R,
        name: &str,
        target: &str,
    ) -> ContainerResult<IngestedContainer> {
        let mut reader = AsicReader::new(name, container)?;
        Self::unpack_from(&mut reader, target)
    }

    /// Unpack every data entry of `reader` into `target`
    ///
    /// Entries are staged in a private filesystem that is only handed out when
    /// the whole container was read successfully.
    pub fn unpack_from(
        reader: &mut dyn ContainerReader,
        target: &str,
    ) -> ContainerResult<IngestedContainer> {
        let container = reader.name().to_string();
        let invalid_path = |path: &str| ContainerError::InvalidPath {
            container: container.clone(),
            path: path.to_string(),
        };
        let io_error = |source: io::Error| ContainerError::Io {
            container: container.clone(),
            source,
        };

        let target_directory = VirtualFilesystem::normalize(target).map_err(|_| invalid_path(target))?;
        let mut filesystem = VirtualFilesystem::new();
        filesystem
            .create_dir_all(&target_directory)
            .map_err(io_error)?;

        while let Some(filename) = reader.next_file()? {
            let output_path = VirtualFilesystem::join(&target_directory, &filename)
                .map_err(|_| invalid_path(&filename))?;
            if output_path == target_directory {
                return Err(invalid_path(&filename));
            }

            if let Some((parent, _)) = output_path.rsplit_once('/') {
                filesystem.create_dir_all(parent).map_err(io_error)?;
            }

            let mut content = Vec::new();
            reader.write_file(&mut content)?;
            debug!(path = %output_path, bytes = content.len(), "Unpacked container entry");

            filesystem.write(&output_path, content).map_err(io_error)?;
        }

        let certificates = reader.certificates().to_vec();
        if certificates.is_empty() {
            warn!(container = %container, "Container lists no signing certificates");
        }
        for certificate in &certificates {
            info!(container = %container, "Signature: {}", certificate.subject);
        }

        Ok(IngestedContainer {
            filesystem,
            certificates,
        })
    }
}
