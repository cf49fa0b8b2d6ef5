//! Validation results: assertions grouped into sections, and per-document reports.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::DocumentDeclaration;

/// Severity of an assertion, ordered from harmless to fatal
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Ok,
    Warning,
    Error,
    /// Further checks of the document are pointless
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        };
        f.write_str(label)
    }
}

/// A single finding produced by a checker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub identifier: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Assertion {
    pub fn new(
        identifier: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            severity,
            message: message.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Hierarchical result node: nested sections plus the assertions of this level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

impl Section {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn add_assertion(&mut self, assertion: Assertion) {
        self.assertions.push(assertion);
    }

    pub fn add_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Worst severity found anywhere in this subtree
    pub fn flag(&self) -> Severity {
        let own = self
            .assertions
            .iter()
            .map(|a| a.severity)
            .max()
            .unwrap_or_default();
        self.sections
            .iter()
            .map(Section::flag)
            .fold(own, std::cmp::Ord::max)
    }

    /// Number of assertions with exactly the given severity in this subtree
    pub fn count(&self, severity: Severity) -> usize {
        let own = self
            .assertions
            .iter()
            .filter(|a| a.severity == severity)
            .count();
        own + self
            .sections
            .iter()
            .map(|s| s.count(severity))
            .sum::<usize>()
    }

    /// All assertions of this subtree, depth-first
    pub fn all_assertions(&self) -> Vec<&Assertion> {
        let mut collected: Vec<&Assertion> = self.assertions.iter().collect();
        for section in &self.sections {
            collected.extend(section.all_assertions());
        }
        collected
    }
}

/// Result of validating one document against its configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub uuid: Uuid,
    pub declaration: DocumentDeclaration,
    pub created_at: DateTime<Utc>,
    pub duration: Duration,
    /// One section per executed file type, in configuration order
    pub sections: Vec<Section>,
}

impl Report {
    pub fn new(declaration: DocumentDeclaration) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            declaration,
            created_at: Utc::now(),
            duration: Duration::ZERO,
            sections: Vec::new(),
        }
    }

    pub fn flag(&self) -> Severity {
        self.sections
            .iter()
            .map(Section::flag)
            .max()
            .unwrap_or_default()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.sections.iter().map(|s| s.count(severity)).sum()
    }

    /// A report is valid when nothing worse than a warning was asserted
    pub fn is_valid(&self) -> bool {
        self.flag() <= Severity::Warning
    }
}
