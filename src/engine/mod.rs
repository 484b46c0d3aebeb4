//! Engine facade tying routing, caching, and install management together.

mod builder;

pub use builder::{Muninn, MuninnBuilder};

use std::sync::Arc;

use crate::cache::{CapabilityCache, CatalogCache};
use crate::install::{Admission, InstallEventStream, InstallManager, JobHandle};
use crate::router::Router;
use crate::traits::ModelRegistry;
use crate::types::{CatalogPage, ModelDescriptor, RequestContext, RoutingDecision, TaskCategory};
use crate::{MuninnError, Result};

/// One engine instance per model runtime endpoint.
///
/// Owns all mutable state (caches, active-job map) explicitly; callers
/// share the instance rather than reaching for globals.
pub struct ModelEngine {
    registry: Arc<dyn ModelRegistry>,
    capabilities: Arc<CapabilityCache>,
    router: Router,
    installs: InstallManager,
    catalog: Option<CatalogCache>,
}

impl ModelEngine {
    pub(crate) fn new(
        registry: Arc<dyn ModelRegistry>,
        capabilities: Arc<CapabilityCache>,
        router: Router,
        installs: InstallManager,
        catalog: Option<CatalogCache>,
    ) -> Self {
        Self {
            registry,
            capabilities,
            router,
            installs,
            catalog,
        }
    }

    // ========================================================================
    // Routing
    // ========================================================================

    /// Classify a request and select the model to serve it.
    ///
    /// Never fails; every branch resolves to a usable decision.
    pub async fn route(
        &self,
        scope: &str,
        preferred: &str,
        request: &RequestContext<'_>,
    ) -> RoutingDecision {
        self.router.route(scope, preferred, request).await
    }

    /// Select a model for an already-classified request.
    pub async fn select(
        &self,
        scope: &str,
        preferred: &str,
        category: TaskCategory,
    ) -> RoutingDecision {
        self.router.select(scope, preferred, category).await
    }

    // ========================================================================
    // Installed models
    // ========================================================================

    /// The installed-model set (cached; see
    /// [`CapabilityCache::installed_models`]).
    pub async fn installed_models(&self) -> Result<Arc<Vec<ModelDescriptor>>> {
        self.capabilities.installed_models().await
    }

    /// Remove an installed model and invalidate the caches that refer
    /// to it.
    pub async fn uninstall_model(&self, model: &str) -> Result<()> {
        self.registry.remove(model).await?;
        self.capabilities.invalidate_installed().await;
        self.capabilities.invalidate_model_verdicts(model);
        Ok(())
    }

    /// Forget one memoized vision verdict.
    pub async fn invalidate_vision(&self, scope: &str, model: &str) {
        self.capabilities.invalidate_vision(scope, model).await;
    }

    // ========================================================================
    // Installs
    // ========================================================================

    /// Admit an install request; returns immediately.
    pub async fn request_install(&self, model: &str) -> Admission {
        self.installs.request_install(model).await
    }

    /// Subscribe to an install job's notifications.
    pub fn subscribe(&self, handle: &JobHandle) -> InstallEventStream {
        self.installs.subscribe(handle)
    }

    /// Request cancellation through a handle. Best-effort, idempotent.
    pub fn cancel(&self, handle: &JobHandle) {
        self.installs.cancel(handle);
    }

    /// Request cancellation of the live job for `model`, if any.
    pub async fn cancel_install(&self, model: &str) -> bool {
        self.installs.cancel_model(model).await
    }

    /// Names with a live install job.
    pub async fn active_installs(&self) -> Vec<String> {
        self.installs.active_models().await
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    /// Search the remote catalog (cached; 1-based `page`).
    pub async fn search_catalog(&self, query: &str, page: usize) -> Result<CatalogPage> {
        match &self.catalog {
            Some(catalog) => catalog.search(query, page).await,
            None => Err(MuninnError::NotImplemented("search_catalog")),
        }
    }

    /// Search the remote catalog after forcing a refetch.
    pub async fn search_catalog_refreshed(&self, query: &str, page: usize) -> Result<CatalogPage> {
        match &self.catalog {
            Some(catalog) => catalog.search_refreshed(query, page).await,
            None => Err(MuninnError::NotImplemented("search_catalog")),
        }
    }
}
