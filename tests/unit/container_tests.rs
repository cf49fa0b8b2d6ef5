use std::io::Cursor;

use tempfile::TempDir;

use docvalidate::config::SourceSettings;
use docvalidate::{
    AsicReader, ContainerError, ContainerIngestor, ContainerReader, SourceInstance,
    ValidatorError,
};

use crate::common::test_helpers::{AsicBuilder, INVOICE_SCHEMA, envelope_container};

#[test]
fn test_unpack_stages_data_entries_only() {
    let bytes = envelope_container().build();
    let ingested = ContainerIngestor::unpack(Cursor::new(bytes), "envelope.asice", "envelope").unwrap();
    let fs = &ingested.filesystem;

    assert_eq!(fs.file_count(), 3);
    assert_eq!(fs.read_to_string("envelope/rules/invoice.schema").unwrap(), INVOICE_SCHEMA);
    assert!(fs.is_dir("envelope/views"));
    assert!(!fs.exists("envelope/mimetype"));
    assert!(!fs.exists("envelope/META-INF"));

    let subjects: Vec<_> = ingested
        .certificates
        .iter()
        .map(|certificate| certificate.subject.as_str())
        .collect();
    assert_eq!(
        subjects,
        vec!["CN=Rules Authority, O=Example", "CN=Backup Signer, O=Example"]
    );
    assert_eq!(
        ingested.certificates[0].signature.as_deref(),
        Some("META-INF/signature-0.p7s")
    );
}

#[test]
fn test_reader_reports_certificates_after_last_entry() {
    let bytes = envelope_container().build();
    let mut reader = AsicReader::new("envelope.asice", Cursor::new(bytes)).unwrap();

    let mut names = Vec::new();
    while let Some(name) = reader.next_file().unwrap() {
        let mut content = Vec::new();
        reader.write_file(&mut content).unwrap();
        assert!(!content.is_empty());
        names.push(name);
    }

    assert_eq!(
        names,
        vec!["config/rules.toml", "rules/invoice.schema", "views/invoice.tmpl"]
    );
    assert_eq!(reader.certificates().len(), 2);
}

#[test]
fn test_unsigned_container_is_accepted() {
    let bytes = AsicBuilder::new().file("a.toml", "").build();
    let ingested = ContainerIngestor::unpack(Cursor::new(bytes), "plain.asice", "plain").unwrap();

    assert!(ingested.certificates.is_empty());
    assert!(ingested.filesystem.is_file("plain/a.toml"));
}

#[test]
fn test_wrong_mimetype_is_a_format_error() {
    let bytes = AsicBuilder::new()
        .mimetype(Some("application/zip"))
        .file("a.toml", "")
        .build();

    let error = ContainerIngestor::unpack(Cursor::new(bytes), "odd.asice", "odd").unwrap_err();
    assert!(matches!(&error, ContainerError::Format { container, .. } if container == "odd.asice"));
    assert_eq!(error.container(), "odd.asice");
}

#[test]
fn test_escaping_entry_is_rejected() {
    let bytes = AsicBuilder::new()
        .file("rules/ok.schema", "Tag")
        .file("../outside.schema", "Tag")
        .build();

    let error = ContainerIngestor::unpack(Cursor::new(bytes), "evil.asice", "evil").unwrap_err();
    assert!(matches!(error, ContainerError::InvalidPath { path, .. } if path == "../outside.schema"));
}

#[test]
fn test_not_a_zip() {
    let error =
        ContainerIngestor::unpack(Cursor::new(b"plain text".to_vec()), "bad.asice", "bad").unwrap_err();
    assert!(matches!(error, ContainerError::Format { .. }));
}

#[tokio::test]
async fn test_source_directory_collects_certificates() {
    let temp_dir = TempDir::new().unwrap();
    envelope_container().write_to(temp_dir.path(), "envelope.asice");
    AsicBuilder::new()
        .file("extra.toml", "")
        .certificate("CN=Extra")
        .write_to(temp_dir.path(), "extra.asice");

    let source = SourceInstance::from_directory(&SourceSettings::default(), temp_dir.path())
        .await
        .unwrap();

    assert_eq!(source.certificates().len(), 3);
    assert!(source.filesystem().is_file("envelope/config/rules.toml"));
    assert!(source.filesystem().is_file("extra/extra.toml"));
}

#[tokio::test]
async fn test_broken_container_fails_the_whole_source() {
    let temp_dir = TempDir::new().unwrap();
    envelope_container().write_to(temp_dir.path(), "a.asice");
    std::fs::write(temp_dir.path().join("b.asice"), b"not a container").unwrap();

    let result = SourceInstance::from_directory(&SourceSettings::default(), temp_dir.path()).await;
    assert!(matches!(
        result,
        Err(ValidatorError::Container(ContainerError::Format { container, .. })) if container == "b.asice"
    ));
}
