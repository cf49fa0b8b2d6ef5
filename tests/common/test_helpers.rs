use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::CompressionMethod;
use zip::write::FileOptions;

use docvalidate::container::{ASIC_MIMETYPE, MANIFEST_PATH};

/// Builds ASiC-E containers in memory
#[derive(Debug, Clone, Default)]
pub struct AsicBuilder {
    entries: Vec<(String, Vec<u8>)>,
    certificates: Vec<String>,
    mimetype: Option<String>,
}

impl AsicBuilder {
    pub fn new() -> Self {
        Self {
            mimetype: Some(ASIC_MIMETYPE.to_string()),
            ..Self::default()
        }
    }

    pub fn file(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.entries.push((name.to_string(), content.into()));
        self
    }

    pub fn certificate(mut self, subject: &str) -> Self {
        self.certificates.push(subject.to_string());
        self
    }

    pub fn mimetype(mut self, mimetype: Option<&str>) -> Self {
        self.mimetype = mimetype.map(str::to_string);
        self
    }

    fn manifest(&self) -> String {
        let mut manifest = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<asicManifest xmlns=\"urn:etsi.org:specification:02918:v1.2.1\">\n",
        );
        for (index, subject) in self.certificates.iter().enumerate() {
            manifest.push_str(&format!(
                "  <certificate cert=\"META-INF/signature-{index}.p7s\">\n    <certificate>MIIB{index}</certificate>\n    <subject>{subject}</subject>\n  </certificate>\n"
            ));
        }
        manifest.push_str("</asicManifest>\n");
        manifest
    }

    pub fn build(&self) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = FileOptions::default();

        if let Some(mimetype) = &self.mimetype {
            writer.start_file("mimetype", stored).unwrap();
            writer.write_all(mimetype.as_bytes()).unwrap();
        }
        for (name, content) in &self.entries {
            writer.start_file(name.as_str(), deflated).unwrap();
            writer.write_all(content).unwrap();
        }
        if !self.certificates.is_empty() {
            writer.start_file(MANIFEST_PATH, deflated).unwrap();
            writer.write_all(self.manifest().as_bytes()).unwrap();
            for index in 0..self.certificates.len() {
                writer
                    .start_file(format!("META-INF/signature-{index}.p7s"), deflated)
                    .unwrap();
                writer.write_all(b"signature").unwrap();
            }
        }

        writer.finish().unwrap().into_inner()
    }

    /// Write the container as `<directory>/<name>`
    pub fn write_to(&self, directory: &Path, name: &str) -> PathBuf {
        let path = directory.join(name);
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

/// Rule artifact for the envelope documents used across the tests
pub const ENVELOPE_RULES: &str = r#"
[package]
name = "Envelope rules 1.0"

[[configuration]]
identifier = "base"
title = "Common checks"

[[configuration.file]]
name = "Well-formedness"
path = "xml:well-formed"

[[configuration]]
identifier = "invoice"
title = "Envelope invoice"
inherit = ["base"]

[[configuration.file]]
path = "envelope/rules/invoice.schema"

[[configuration.stylesheet]]
identifier = "html"
title = "Invoice as HTML"
path = "envelope/views/invoice.tmpl"
"#;

/// Required element names, one per line
pub const INVOICE_SCHEMA: &str = "Tag\nAmount\n";

pub const INVOICE_TEMPLATE: &str = "<html>{{document}}</html>";

/// Rule container holding the envelope rules, signed by two certificates
pub fn envelope_container() -> AsicBuilder {
    AsicBuilder::new()
        .file("config/rules.toml", ENVELOPE_RULES)
        .file("rules/invoice.schema", INVOICE_SCHEMA)
        .file("views/invoice.tmpl", INVOICE_TEMPLATE)
        .certificate("CN=Rules Authority, O=Example")
        .certificate("CN=Backup Signer, O=Example")
}

pub fn envelope(tag: Option<&str>, body: &str) -> String {
    match tag {
        Some(tag) => format!("<Envelope><Tag>{tag}</Tag>{body}</Envelope>"),
        None => format!("<Envelope>{body}</Envelope>"),
    }
}
