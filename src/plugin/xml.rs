//! Generic XML support: root-element declaration and a well-formedness checker.

use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Checker, CheckerType, Declaration, EngineContext, ValidatorPlugin};
use crate::configuration::Configuration;
use crate::document::Document;
use crate::error::BoxError;
use crate::report::{Assertion, Section, Severity};

/// Checker path of the built-in well-formedness check
pub const WELL_FORMED_PATH: &str = "xml:well-formed";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Qualified name of a document's root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootElement {
    pub namespace: Option<String>,
    pub local_name: String,
}

impl RootElement {
    /// `<namespace>::<local-name>`, or the local name alone
    pub fn identifier(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}::{}", namespace, self.local_name),
            None => self.local_name.clone(),
        }
    }

    fn from_start(element: &BytesStart<'_>) -> Self {
        let prefix = element.name().prefix().map(|p| p.as_ref().to_vec());

        // The root has no ancestors, so its namespace is bound on itself
        let namespace = element
            .attributes()
            .flatten()
            .find(|attribute| {
                let key = attribute.key.as_ref();
                match &prefix {
                    None => key == b"xmlns",
                    Some(prefix) => key.strip_prefix(b"xmlns:") == Some(prefix.as_slice()),
                }
            })
            .map(|attribute| String::from_utf8_lossy(&attribute.value).into_owned())
            .filter(|namespace| !namespace.is_empty());

        Self {
            namespace,
            local_name: String::from_utf8_lossy(element.local_name().as_ref()).into_owned(),
        }
    }
}

fn without_bom(content: &[u8]) -> &[u8] {
    content.strip_prefix(UTF8_BOM).unwrap_or(content)
}

/// Root element of an XML document, `None` when the content is not XML
pub fn root_element(content: &[u8]) -> Option<RootElement> {
    let mut reader = Reader::from_reader(without_bom(content));
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => return Some(RootElement::from_start(&e)),
            Ok(Event::Decl(_))
            | Ok(Event::Comment(_))
            | Ok(Event::PI(_))
            | Ok(Event::DocType(_)) => continue,
            _ => return None,
        }
    }
}

/// Matches any XML document; identifies it by its root element
pub struct XmlDeclaration;

impl Declaration for XmlDeclaration {
    fn name(&self) -> &str {
        "xml"
    }

    fn matches(&self, document: &Document) -> bool {
        root_element(document.as_bytes()).is_some()
    }

    fn identify(&self, document: &Document) -> String {
        root_element(document.as_bytes())
            .map(|root| root.identifier())
            .unwrap_or_else(|| self.name().to_string())
    }
}

/// Reports the first syntax error of a document as a fatal assertion
pub struct WellFormednessChecker;

impl WellFormednessChecker {
    fn first_error(content: &[u8]) -> Option<(u64, String)> {
        let mut reader = Reader::from_reader(without_bom(content));
        reader.config_mut().trim_text(true);

        let mut depth = 0usize;
        let mut seen_root = false;

        loop {
            let position = reader.buffer_position() as u64;
            match reader.read_event() {
                Ok(Event::Start(_)) => {
                    if depth == 0 && seen_root {
                        return Some((position, "multiple root elements".to_string()));
                    }
                    seen_root = true;
                    depth += 1;
                }
                Ok(Event::Empty(_)) => {
                    if depth == 0 && seen_root {
                        return Some((position, "multiple root elements".to_string()));
                    }
                    seen_root = true;
                }
                Ok(Event::End(_)) => depth = depth.saturating_sub(1),
                Ok(Event::Text(_)) | Ok(Event::CData(_)) if depth == 0 => {
                    return Some((position, "content outside of the root element".to_string()));
                }
                Ok(Event::Eof) => {
                    return if !seen_root {
                        Some((position, "no root element".to_string()))
                    } else if depth > 0 {
                        Some((position, format!("{} unclosed element(s)", depth)))
                    } else {
                        None
                    };
                }
                Ok(_) => {}
                Err(e) => return Some((reader.error_position() as u64, e.to_string())),
            }
        }
    }
}

impl Checker for WellFormednessChecker {
    fn check(
        &mut self,
        document: &Document,
        _configuration: &Configuration,
    ) -> Result<Section, BoxError> {
        let mut section = Section::titled("Well-formedness");

        if let Some((position, message)) = Self::first_error(document.as_bytes()) {
            section.add_assertion(
                Assertion::new("XML-WELLFORMED", Severity::Fatal, message)
                    .with_location(format!("byte {}", position)),
            );
        }

        Ok(section)
    }
}

pub struct WellFormednessCheckerType;

impl CheckerType for WellFormednessCheckerType {
    fn name(&self) -> &str {
        "well-formed"
    }

    fn supports(&self, path: &str) -> bool {
        path == WELL_FORMED_PATH
    }

    fn create(&self, _context: &EngineContext, _path: &str) -> Result<Box<dyn Checker>, BoxError> {
        Ok(Box::new(WellFormednessChecker))
    }
}

/// Plugin contributing generic XML detection and the well-formedness check
#[derive(Debug, Default)]
pub struct XmlPlugin;

impl ValidatorPlugin for XmlPlugin {
    fn name(&self) -> &str {
        "xml"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["xml".to_string()]
    }

    fn checkers(&self) -> Vec<Arc<dyn CheckerType>> {
        vec![Arc::new(WellFormednessCheckerType)]
    }

    fn declarations(&self) -> Vec<Arc<dyn Declaration>> {
        vec![Arc::new(XmlDeclaration)]
    }
}
