use std::sync::Arc;

use tracing::debug;

use crate::document::{Document, DocumentDeclaration};
use crate::plugin::{Declaration, PluginRegistry};

/// Outcome of matching a document against the registered declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Recognized(DocumentDeclaration),
    Unrecognized,
}

impl Resolution {
    pub fn declaration(&self) -> Option<&DocumentDeclaration> {
        match self {
            Resolution::Recognized(declaration) => Some(declaration),
            Resolution::Unrecognized => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, Resolution::Recognized(_))
    }
}

/// Maps documents to the first matching declaration, in registration order
#[derive(Clone, Default)]
pub struct DeclarationResolver {
    declarations: Vec<Arc<dyn Declaration>>,
}

impl DeclarationResolver {
    pub fn new(registry: &PluginRegistry) -> Self {
        Self {
            declarations: registry.declarations().to_vec(),
        }
    }

    pub fn resolve(&self, document: &Document) -> Resolution {
        match self
            .declarations
            .iter()
            .find(|declaration| declaration.matches(document))
        {
            Some(declaration) => {
                let resolved =
                    DocumentDeclaration::new(declaration.name(), declaration.identify(document));
                debug!(kind = %resolved.kind, identifier = %resolved.identifier, "Document recognized");
                Resolution::Recognized(resolved)
            }
            None => Resolution::Unrecognized,
        }
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}
