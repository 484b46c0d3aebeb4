//! Builder for configuring engine instances.

use std::sync::Arc;

use super::ModelEngine;
use crate::cache::{CapabilityCache, CapabilityCacheConfig, CatalogCache, CatalogCacheConfig};
use crate::install::{InstallConfig, InstallManager};
use crate::ollama::OllamaClient;
use crate::remote::RemoteCatalog;
use crate::router::Router;
use crate::traits::{CatalogSource, InstallTransport, ModelRegistry};
use crate::{MuninnError, Result};

/// Main entry point for creating engine instances.
pub struct Muninn;

impl Muninn {
    /// Create a new builder for configuring the engine.
    pub fn builder() -> MuninnBuilder {
        MuninnBuilder::new()
    }
}

/// Builder for configuring engine instances.
///
/// Collaborators are injected explicitly; there is no ambient global
/// state. `ollama()` wires a single [`OllamaClient`] as both the model
/// registry and the install transport. The catalog source is optional;
/// without one, `search_catalog` reports `NotImplemented`.
pub struct MuninnBuilder {
    registry: Option<Arc<dyn ModelRegistry>>,
    transport: Option<Arc<dyn InstallTransport>>,
    catalog: Option<Arc<dyn CatalogSource>>,
    capability_config: CapabilityCacheConfig,
    catalog_config: CatalogCacheConfig,
    install_config: InstallConfig,
}

impl MuninnBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            transport: None,
            catalog: None,
            capability_config: CapabilityCacheConfig::default(),
            catalog_config: CatalogCacheConfig::default(),
            install_config: InstallConfig::default(),
        }
    }

    /// Wire an Ollama endpoint as both model registry and install
    /// transport.
    pub fn ollama(mut self, base_url: impl Into<String>) -> Self {
        let client = Arc::new(OllamaClient::new(base_url));
        self.registry = Some(Arc::clone(&client) as Arc<dyn ModelRegistry>);
        self.transport = Some(client as Arc<dyn InstallTransport>);
        self
    }

    /// Set a custom model registry.
    pub fn registry(mut self, registry: Arc<dyn ModelRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set a custom install transport.
    pub fn install_transport(mut self, transport: Arc<dyn InstallTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set a custom catalog source.
    pub fn catalog_source(mut self, catalog: Arc<dyn CatalogSource>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Fetch the catalog from a JSON endpoint.
    pub fn catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog = Some(Arc::new(RemoteCatalog::new(url)));
        self
    }

    /// Override the capability cache configuration.
    pub fn capability_cache(mut self, config: CapabilityCacheConfig) -> Self {
        self.capability_config = config;
        self
    }

    /// Override the catalog cache configuration.
    pub fn catalog_cache(mut self, config: CatalogCacheConfig) -> Self {
        self.catalog_config = config;
        self
    }

    /// Override the install manager configuration.
    pub fn installs(mut self, config: InstallConfig) -> Self {
        self.install_config = config;
        self
    }

    /// Build the engine.
    ///
    /// Fails when no model registry or install transport is configured.
    pub fn build(self) -> Result<ModelEngine> {
        let registry = self
            .registry
            .ok_or_else(|| MuninnError::Configuration("no model registry configured".into()))?;
        let transport = self
            .transport
            .ok_or_else(|| MuninnError::Configuration("no install transport configured".into()))?;

        let capabilities = Arc::new(CapabilityCache::new(
            Arc::clone(&registry),
            &self.capability_config,
        ));
        let router = Router::new(Arc::clone(&capabilities));
        let installs = InstallManager::new(transport, &self.install_config);
        let catalog = self
            .catalog
            .map(|source| CatalogCache::new(source, &self.catalog_config));

        Ok(ModelEngine::new(
            registry,
            capabilities,
            router,
            installs,
            catalog,
        ))
    }
}

impl Default for MuninnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
