//! Installed-model and vision-capability caches.
//!
//! Two cache classes with deliberately different lifetimes:
//!
//! - The **installed-model set** has a short TTL (default 60 seconds).
//!   Local state changes rarely but should stay fresh. The whole set is
//!   replaced atomically on refresh, never merged. A failed refresh
//!   degrades to the last known-good set (stale-but-available) and only
//!   fails hard when no set ever existed.
//! - **Vision verdicts** are memoized per `(scope, model)` key with no
//!   TTL. A verdict is cheap to invalidate explicitly but not time-bound:
//!   model capability does not change during a session. A probe failure
//!   is "unknown" and is re-attempted on the next call, never cached as
//!   a negative.
//!
//! Concurrent refreshes for the same cache collapse into a single
//! in-flight fetch: the installed set uses double-checked locking around
//! an async refresh mutex, vision probes use moka's coalescing
//! `try_get_with`.
//!
//! # Known limitation
//!
//! A cached verdict only ever downgrades within a session. If a model is
//! made vision-capable externally (e.g. via reinstall), the stale verdict
//! persists until [`CapabilityCache::invalidate_vision`] or
//! [`CapabilityCache::invalidate_model_verdicts`] is called.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::telemetry;
use crate::traits::ModelRegistry;
use crate::types::ModelDescriptor;
use crate::{MuninnError, Result};

/// Configuration for the capability cache.
///
/// ```rust
/// # use muninn::CapabilityCacheConfig;
/// # use std::time::Duration;
/// let config = CapabilityCacheConfig::new().installed_ttl(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct CapabilityCacheConfig {
    /// Time-to-live for the installed-model set. Default: 60 seconds.
    pub installed_ttl: Duration,
    /// Maximum memoized vision verdicts. Default: 4,096.
    pub max_vision_entries: u64,
}

impl Default for CapabilityCacheConfig {
    fn default() -> Self {
        Self {
            installed_ttl: Duration::from_secs(60),
            max_vision_entries: 4_096,
        }
    }
}

impl CapabilityCacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the installed-model set TTL.
    pub fn installed_ttl(mut self, ttl: Duration) -> Self {
        self.installed_ttl = ttl;
        self
    }

    /// Set the maximum number of memoized vision verdicts.
    pub fn max_vision_entries(mut self, n: u64) -> Self {
        self.max_vision_entries = n;
        self
    }
}

/// Three-valued vision-capability verdict.
///
/// `Unknown` means the probe failed; it is never memoized, so the next
/// lookup probes again. Routing treats `Unknown` like `NotCapable` for
/// the current decision without blacklisting the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionVerdict {
    /// The model accepts image input.
    Capable,
    /// The model does not accept image input.
    NotCapable,
    /// The probe was inconclusive; retried on the next lookup.
    Unknown,
}

/// The installed set plus its fetch timestamp.
#[derive(Clone)]
struct InstalledSet {
    models: Arc<Vec<ModelDescriptor>>,
    fetched_at: Instant,
}

/// Memoizes per-model capability metadata on behalf of the router.
pub struct CapabilityCache {
    registry: Arc<dyn ModelRegistry>,
    ttl: Duration,
    installed: RwLock<Option<InstalledSet>>,
    // Serialises refreshes; waiters re-check freshness after acquiring.
    refresh: Mutex<()>,
    vision: moka::future::Cache<(String, String), bool>,
}

impl CapabilityCache {
    /// Create a cache over the given registry.
    pub fn new(registry: Arc<dyn ModelRegistry>, config: &CapabilityCacheConfig) -> Self {
        let vision = moka::future::Cache::builder()
            .max_capacity(config.max_vision_entries)
            .support_invalidation_closures()
            .build();
        Self {
            registry,
            ttl: config.installed_ttl,
            installed: RwLock::new(None),
            refresh: Mutex::new(()),
            vision,
        }
    }

    /// The installed-model set, refreshed from the registry when the TTL
    /// has expired.
    ///
    /// On refresh failure the last known-good set is returned; the call
    /// only fails when no set has ever been fetched. Concurrent callers
    /// observing an expired entry collapse into a single registry fetch.
    pub async fn installed_models(&self) -> Result<Arc<Vec<ModelDescriptor>>> {
        if let Some(models) = self.fresh_set().await {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => "installed").increment(1);
            return Ok(models);
        }
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => "installed").increment(1);

        let _guard = self.refresh.lock().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(models) = self.fresh_set().await {
            return Ok(models);
        }

        match self.registry.list().await {
            Ok(list) => {
                let models = Arc::new(list);
                debug!(count = models.len(), "installed model set refreshed");
                *self.installed.write().await = Some(InstalledSet {
                    models: Arc::clone(&models),
                    fetched_at: Instant::now(),
                });
                Ok(models)
            }
            Err(e) => {
                warn!(error = %e, "installed model refresh failed");
                let stale = self
                    .installed
                    .read()
                    .await
                    .as_ref()
                    .map(|set| Arc::clone(&set.models));
                match stale {
                    Some(models) => {
                        metrics::counter!(telemetry::STALE_SERVES_TOTAL, "cache" => "installed")
                            .increment(1);
                        Ok(models)
                    }
                    None => Err(MuninnError::RegistryFetch(e.to_string())),
                }
            }
        }
    }

    /// Drop the installed set so the next lookup refetches.
    ///
    /// Called after installs and removals change local state.
    pub async fn invalidate_installed(&self) {
        *self.installed.write().await = None;
    }

    /// The vision verdict for `model` within `scope` (a user or session
    /// identifier).
    ///
    /// Memoized indefinitely per `(scope, model)` on the first conclusive
    /// probe. Concurrent lookups for the same key issue one probe.
    pub async fn vision_verdict(&self, scope: &str, model: &str) -> VisionVerdict {
        let key = (scope.to_string(), model.to_string());
        if self.vision.contains_key(&key) {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => "vision").increment(1);
        } else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => "vision").increment(1);
        }

        let registry = Arc::clone(&self.registry);
        let probe_model = model.to_string();
        let probed = self
            .vision
            .try_get_with(key, async move {
                let verdict = registry.probe_vision(&probe_model).await;
                let outcome = match &verdict {
                    Ok(true) => "capable",
                    Ok(false) => "not_capable",
                    Err(_) => "unknown",
                };
                metrics::counter!(telemetry::PROBES_TOTAL, "outcome" => outcome).increment(1);
                verdict
            })
            .await;

        match probed {
            Ok(true) => VisionVerdict::Capable,
            Ok(false) => VisionVerdict::NotCapable,
            Err(e) => {
                warn!(model, error = %e, "vision probe failed");
                VisionVerdict::Unknown
            }
        }
    }

    /// Forget one memoized verdict.
    pub async fn invalidate_vision(&self, scope: &str, model: &str) {
        self.vision
            .invalidate(&(scope.to_string(), model.to_string()))
            .await;
    }

    /// Forget every memoized verdict for `model` across all scopes.
    ///
    /// Used after a model is removed or reinstalled.
    pub fn invalidate_model_verdicts(&self, model: &str) {
        let model = model.to_string();
        let _ = self
            .vision
            .invalidate_entries_if(move |key, _| key.1 == model);
    }

    async fn fresh_set(&self) -> Option<Arc<Vec<ModelDescriptor>>> {
        let guard = self.installed.read().await;
        guard
            .as_ref()
            .filter(|set| set.fetched_at.elapsed() < self.ttl)
            .map(|set| Arc::clone(&set.models))
    }
}
