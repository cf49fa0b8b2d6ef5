use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::{CheckerType, Declaration, RendererType, ValidatorPlugin};

/// Merged view of every installed plugin, in registration order
///
/// Sequences are concatenated as-is: duplicates are kept and lookups return
/// the first registered entry.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    capabilities: Vec<String>,
    checkers: Vec<Arc<dyn CheckerType>>,
    declarations: Vec<Arc<dyn Declaration>>,
    renderers: Vec<Arc<dyn RendererType>>,
}

impl PluginRegistry {
    pub fn register_all(plugins: &[Arc<dyn ValidatorPlugin>]) -> Self {
        let mut registry = Self::default();

        for plugin in plugins {
            let capabilities = plugin.capabilities();
            let checkers = plugin.checkers();
            let declarations = plugin.declarations();
            let renderers = plugin.renderers();

            debug!(
                plugin = plugin.name(),
                capabilities = ?capabilities,
                checkers = checkers.len(),
                declarations = declarations.len(),
                renderers = renderers.len(),
                "Registering plugin"
            );

            registry.capabilities.extend(capabilities);
            registry.checkers.extend(checkers);
            registry.declarations.extend(declarations);
            registry.renderers.extend(renderers);
        }

        info!(
            plugins = plugins.len(),
            declarations = registry.declarations.len(),
            checkers = registry.checkers.len(),
            renderers = registry.renderers.len(),
            "Plugin registry ready"
        );

        registry
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn checkers(&self) -> &[Arc<dyn CheckerType>] {
        &self.checkers
    }

    pub fn declarations(&self) -> &[Arc<dyn Declaration>] {
        &self.declarations
    }

    pub fn renderers(&self) -> &[Arc<dyn RendererType>] {
        &self.renderers
    }

    /// First checker type supporting `path`
    pub fn checker_type(&self, path: &str) -> Option<&Arc<dyn CheckerType>> {
        self.checkers.iter().find(|checker| checker.supports(path))
    }

    /// First renderer type supporting `path`
    pub fn renderer_type(&self, path: &str) -> Option<&Arc<dyn RendererType>> {
        self.renderers.iter().find(|renderer| renderer.supports(path))
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("capabilities", &self.capabilities)
            .field(
                "checkers",
                &self.checkers.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field(
                "declarations",
                &self.declarations.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .field(
                "renderers",
                &self.renderers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
