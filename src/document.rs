use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Raw document content, cheap to clone and share between concurrent checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    content: Arc<[u8]>,
}

impl Document {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Arc::from(content.into()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    /// Content decoded as UTF-8, replacing invalid sequences
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl From<&str> for Document {
    fn from(content: &str) -> Self {
        Self::new(content.as_bytes())
    }
}

impl From<String> for Document {
    fn from(content: String) -> Self {
        Self::new(content.into_bytes())
    }
}

impl From<Vec<u8>> for Document {
    fn from(content: Vec<u8>) -> Self {
        Self::new(content)
    }
}

/// A document resolved to a registered declaration
///
/// `kind` names the declaration that matched; `identifier` is the
/// document-specific identity used to look up (and cache) its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentDeclaration {
    pub kind: String,
    pub identifier: String,
}

impl DocumentDeclaration {
    pub fn new(kind: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            identifier: identifier.into(),
        }
    }

    pub fn cache_key(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for DocumentDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}
