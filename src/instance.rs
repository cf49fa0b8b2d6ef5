//! The validation engine: configuration lookup and pooled check/present dispatch.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{ConfigurationCache, ConfigurationCacheStats};
use crate::configuration::{Configuration, ConfigurationLoader, FileType, StylesheetType, normalize};
use crate::declaration::{DeclarationResolver, Resolution};
use crate::document::{Document, DocumentDeclaration};
use crate::error::{Result, ValidatorError};
use crate::plugin::{EngineContext, PluginRegistry};
use crate::pool::{CheckerFactory, CheckerPool, KeyedPool, PoolConfig, PresenterFactory, PresenterPool};
use crate::report::Section;

/// Shared engine state; every operation takes `&self` and may run concurrently
pub struct ValidatorInstance {
    registry: Arc<PluginRegistry>,
    loader: Arc<dyn ConfigurationLoader>,
    resolver: DeclarationResolver,
    configurations: ConfigurationCache,
    checkers: CheckerPool,
    presenters: PresenterPool,
}

impl ValidatorInstance {
    pub fn new(
        registry: Arc<PluginRegistry>,
        loader: Arc<dyn ConfigurationLoader>,
        context: EngineContext,
        pool_config: PoolConfig,
    ) -> Self {
        let checkers = KeyedPool::new(
            "checker",
            CheckerFactory::new(registry.clone(), context.clone()),
            pool_config,
        );
        let presenters = KeyedPool::new(
            "presenter",
            PresenterFactory::new(registry.clone(), context),
            pool_config,
        );

        Self {
            resolver: DeclarationResolver::new(&registry),
            registry,
            loader,
            configurations: ConfigurationCache::new(),
            checkers,
            presenters,
        }
    }

    /// Capability tags of the installed plugins, then the loader's packages
    pub fn packages(&self) -> Vec<String> {
        let mut packages = self.registry.capabilities().to_vec();
        packages.extend(self.loader.packages());
        packages
    }

    pub fn resolve(&self, document: &Document) -> Resolution {
        self.resolver.resolve(document)
    }

    /// Normalized configuration of a declaration, loaded once and then cached
    pub async fn configuration(
        &self,
        declaration: &DocumentDeclaration,
    ) -> Result<Arc<Configuration>> {
        let key = declaration.cache_key();
        let configuration = self
            .configurations
            .get_or_load(key, || async move {
                let raw = self.loader.load(key).await?;
                normalize(raw, self.loader.as_ref(), &self.registry).await
            })
            .await?;
        Ok(configuration)
    }

    /// Run the checker of `file_type` on `document`
    ///
    /// The checker goes back to its pool before the result, or the checker's
    /// error, is returned.
    pub fn check(
        &self,
        file_type: &FileType,
        document: &Document,
        configuration: &Configuration,
    ) -> Result<Section> {
        let mut checker = self.checkers.borrow(&file_type.path)?;
        let result = checker.check(document, configuration);
        drop(checker);

        debug!(path = %file_type.path, ok = result.is_ok(), "Checker finished");

        result.map_err(|source| ValidatorError::Checker {
            key: file_type.path.clone(),
            source,
        })
    }

    /// Render `document` through `stylesheet` into `output`
    pub fn present(
        &self,
        stylesheet: &StylesheetType,
        document: &Document,
        output: &mut dyn Write,
    ) -> Result<()> {
        let mut presenter = self.presenters.borrow(&stylesheet.path)?;
        let result = presenter.present(document, output);
        drop(presenter);

        result.map_err(|source| ValidatorError::Presenter {
            key: stylesheet.path.clone(),
            source,
        })
    }

    /// Evict expired idle instances from both pools
    pub fn evict_idle(&self) -> usize {
        self.checkers.evict_idle() + self.presenters.evict_idle()
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn checker_pool(&self) -> &CheckerPool {
        &self.checkers
    }

    pub fn presenter_pool(&self) -> &PresenterPool {
        &self.presenters
    }

    pub async fn cache_stats(&self) -> ConfigurationCacheStats {
        self.configurations.stats().await
    }
}

impl fmt::Debug for ValidatorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorInstance")
            .field("registry", &self.registry)
            .field("checkers", &self.checkers)
            .field("presenters", &self.presenters)
            .finish()
    }
}
