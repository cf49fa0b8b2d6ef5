//! Standard Business Document Header (SBDH) envelopes.

use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::events::Event;

use super::xml::root_element;
use super::{Checker, CheckerType, Declaration, EngineContext, ValidatorPlugin};
use crate::configuration::Configuration;
use crate::document::Document;
use crate::error::BoxError;
use crate::report::{Assertion, Section, Severity};

pub const SBDH_NAMESPACE: &str =
    "http://www.unece.org/cefact/namespaces/StandardBusinessDocumentHeader";

/// Checker path of the built-in header completeness check
pub const HEADER_CHECK_PATH: &str = "sbdh:header";

const DEFAULT_HEADER_VERSION: &str = "1.0";
const REQUIRED_HEADER_ELEMENTS: [&str; 4] =
    ["HeaderVersion", "Sender", "Receiver", "DocumentIdentification"];

/// Direct children of the envelope header
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct HeaderSummary {
    version: Option<String>,
    elements: Vec<String>,
}

fn scan_header(content: &[u8]) -> Option<HeaderSummary> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut summary: Option<HeaderSummary> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if path.len() == 1 && name == "StandardBusinessDocumentHeader" {
                    summary = Some(HeaderSummary::default());
                } else if path.len() == 2
                    && path[1] == "StandardBusinessDocumentHeader"
                    && let Some(summary) = summary.as_mut()
                {
                    summary.elements.push(name.clone());
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                if path.len() == 2
                    && path[1] == "StandardBusinessDocumentHeader"
                    && let Some(summary) = summary.as_mut()
                {
                    summary
                        .elements
                        .push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
            }
            Ok(Event::Text(text)) => {
                if path.len() == 3
                    && path[2] == "HeaderVersion"
                    && let Some(summary) = summary.as_mut()
                    && summary.version.is_none()
                    && let Ok(version) = text.unescape()
                {
                    summary.version = Some(version.trim().to_string());
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
                if path.len() == 1 && summary.is_some() {
                    // Header done; the payload is not needed
                    return summary;
                }
            }
            Ok(Event::Eof) | Err(_) => return summary,
            Ok(_) => {}
        }
    }
}

/// Matches documents wrapped in an SBDH envelope
pub struct SbdhDeclaration;

impl Declaration for SbdhDeclaration {
    fn name(&self) -> &str {
        "SBDH"
    }

    fn matches(&self, document: &Document) -> bool {
        root_element(document.as_bytes())
            .map(|root| {
                root.local_name == "StandardBusinessDocument"
                    && root.namespace.as_deref() == Some(SBDH_NAMESPACE)
            })
            .unwrap_or(false)
    }

    /// `SBDH:<HeaderVersion>`
    fn identify(&self, document: &Document) -> String {
        let version = scan_header(document.as_bytes())
            .and_then(|summary| summary.version)
            .filter(|version| !version.is_empty())
            .unwrap_or_else(|| DEFAULT_HEADER_VERSION.to_string());
        format!("{}:{}", self.name(), version)
    }
}

/// Asserts that the envelope header carries its mandatory parts
pub struct HeaderChecker;

impl Checker for HeaderChecker {
    fn check(
        &mut self,
        document: &Document,
        _configuration: &Configuration,
    ) -> Result<Section, BoxError> {
        let mut section = Section::titled("SBDH header");

        let Some(summary) = scan_header(document.as_bytes()) else {
            section.add_assertion(Assertion::new(
                "SBDH-HEADER",
                Severity::Error,
                "StandardBusinessDocumentHeader is missing",
            ));
            return Ok(section);
        };

        for element in REQUIRED_HEADER_ELEMENTS {
            if !summary.elements.iter().any(|e| e == element) {
                section.add_assertion(
                    Assertion::new(
                        format!("SBDH-{}", element.to_uppercase()),
                        Severity::Error,
                        format!("{} is missing from the header", element),
                    )
                    .with_location("/StandardBusinessDocument/StandardBusinessDocumentHeader"),
                );
            }
        }

        Ok(section)
    }
}

pub struct HeaderCheckerType;

impl CheckerType for HeaderCheckerType {
    fn name(&self) -> &str {
        "sbdh-header"
    }

    fn supports(&self, path: &str) -> bool {
        path == HEADER_CHECK_PATH
    }

    fn create(&self, _context: &EngineContext, _path: &str) -> Result<Box<dyn Checker>, BoxError> {
        Ok(Box::new(HeaderChecker))
    }
}

#[derive(Debug, Default)]
pub struct SbdhPlugin;

impl ValidatorPlugin for SbdhPlugin {
    fn name(&self) -> &str {
        "sbdh"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["sbdh".to_string()]
    }

    fn checkers(&self) -> Vec<Arc<dyn CheckerType>> {
        vec![Arc::new(HeaderCheckerType)]
    }

    fn declarations(&self) -> Vec<Arc<dyn Declaration>> {
        vec![Arc::new(SbdhDeclaration)]
    }
}
