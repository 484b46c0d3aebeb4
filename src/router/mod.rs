//! Task-aware model selection.
//!
//! The router combines classifier output, the capability cache, and the
//! user's stored preference into a [`RoutingDecision`]. Every branch has
//! a defined fallback; routing never fails and never propagates transport
//! errors up the request path. Cache refresh errors degrade to stale (or
//! empty) data per the cache's own policy.

mod classifier;

pub use classifier::TaskClassifier;
pub(crate) use classifier::is_code_model;

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::cache::{CapabilityCache, VisionVerdict};
use crate::telemetry;
use crate::types::{ModelCapability, ModelDescriptor, RequestContext, RoutingDecision, TaskCategory};

/// Selects the model that should serve each request.
pub struct Router {
    capabilities: Arc<CapabilityCache>,
    classifier: TaskClassifier,
}

impl Router {
    /// Create a router over the given capability cache.
    pub fn new(capabilities: Arc<CapabilityCache>) -> Self {
        Self {
            capabilities,
            classifier: TaskClassifier::new(),
        }
    }

    /// Classify a request and select the model to serve it.
    ///
    /// `scope` identifies the user/session for vision-verdict memoization;
    /// `preferred` is the user's stored model preference.
    pub async fn route(
        &self,
        scope: &str,
        preferred: &str,
        request: &RequestContext<'_>,
    ) -> RoutingDecision {
        let category = self.classifier.classify(request);
        self.select(scope, preferred, category).await
    }

    /// Select a model for an already-classified request.
    ///
    /// Tie-break when multiple candidates qualify: first match in
    /// registry-reported order, no secondary ranking.
    #[instrument(skip(self, category), fields(category = category.as_str()))]
    pub async fn select(
        &self,
        scope: &str,
        preferred: &str,
        category: TaskCategory,
    ) -> RoutingDecision {
        let decision = match category {
            TaskCategory::General => RoutingDecision::keep(category, preferred),
            TaskCategory::Code => self.select_code(preferred).await,
            TaskCategory::Vision => self.select_vision(scope, preferred).await,
        };
        metrics::counter!(telemetry::ROUTES_TOTAL,
            "category" => category.as_str(),
            "outcome" => decision.outcome(),
        )
        .increment(1);
        decision
    }

    async fn select_code(&self, preferred: &str) -> RoutingDecision {
        if classifier::is_code_model(preferred) {
            debug!(preferred, "preferred model already code-specialised");
            return RoutingDecision::keep(TaskCategory::Code, preferred);
        }

        let models = self.installed_or_empty().await;
        for model in models.iter() {
            if classifier::is_code_model(&model.name) {
                debug!(selected = %model.name, preferred, "switching to code model");
                return RoutingDecision::switch(
                    TaskCategory::Code,
                    &model.name,
                    format!("routed to {} for this coding request", model.name),
                );
            }
        }

        // No dedicated code model installed; fall back silently.
        RoutingDecision::keep(TaskCategory::Code, preferred)
    }

    async fn select_vision(&self, scope: &str, preferred: &str) -> RoutingDecision {
        if self.capabilities.vision_verdict(scope, preferred).await == VisionVerdict::Capable {
            debug!(preferred, "preferred model already supports vision");
            return RoutingDecision::keep(TaskCategory::Vision, preferred);
        }

        let models = self.installed_or_empty().await;
        for model in models
            .iter()
            .filter(|m| m.name != preferred && m.has_capability(ModelCapability::Vision))
        {
            debug!(selected = %model.name, preferred, "switching to vision model");
            return RoutingDecision::switch(
                TaskCategory::Vision,
                &model.name,
                format!("routed image input to {}", model.name),
            );
        }

        warn!(
            preferred,
            available = models.len(),
            "no vision-capable model installed"
        );
        RoutingDecision::unserviceable(TaskCategory::Vision, preferred)
    }

    /// The installed set, or empty when the cache has nothing to give.
    ///
    /// A hard cache failure (no set ever fetched) degrades to an empty
    /// scan so routing still resolves to the preferred model.
    async fn installed_or_empty(&self) -> Arc<Vec<ModelDescriptor>> {
        match self.capabilities.installed_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!(error = %e, "installed model set unavailable, routing on empty set");
                Arc::new(Vec::new())
            }
        }
    }
}
