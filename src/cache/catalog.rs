//! Short-TTL cache of the searchable remote model catalog.
//!
//! The cache holds only the unfiltered entry set and its fetch timestamp;
//! filter and page number are supplied by the caller on every search, so
//! pagination is stateless from the cache's perspective. On expiry the
//! whole set is discarded and refetched; entries are never patched in
//! place. A failed refetch degrades to the last known-good set.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::telemetry;
use crate::traits::CatalogSource;
use crate::types::{CatalogEntry, CatalogPage};
use crate::{MuninnError, Result};

/// Configuration for the catalog cache.
///
/// ```rust
/// # use muninn::CatalogCacheConfig;
/// # use std::time::Duration;
/// let config = CatalogCacheConfig::new()
///     .ttl(Duration::from_secs(600))
///     .page_size(10);
/// ```
#[derive(Debug, Clone)]
pub struct CatalogCacheConfig {
    /// Time-to-live for the cached entry set. Default: 5 minutes.
    pub ttl: Duration,
    /// Entries per result page. Default: 8.
    pub page_size: usize,
}

impl Default for CatalogCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            page_size: 8,
        }
    }
}

impl CatalogCacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache TTL.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the page size.
    pub fn page_size(mut self, n: usize) -> Self {
        self.page_size = n.max(1);
        self
    }
}

/// The entry set plus its fetch timestamp.
#[derive(Clone)]
struct CatalogSet {
    entries: Arc<Vec<CatalogEntry>>,
    fetched_at: Instant,
}

/// Caches the remote catalog and serves filtered, paginated views of it.
pub struct CatalogCache {
    source: Arc<dyn CatalogSource>,
    ttl: Duration,
    page_size: usize,
    catalog: RwLock<Option<CatalogSet>>,
    // Serialises refetches; waiters re-check freshness after acquiring.
    refresh: Mutex<()>,
}

impl CatalogCache {
    /// Create a cache over the given catalog source.
    pub fn new(source: Arc<dyn CatalogSource>, config: &CatalogCacheConfig) -> Self {
        Self {
            source,
            ttl: config.ttl,
            page_size: config.page_size.max(1),
            catalog: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Search the catalog, refetching first when the cached set is older
    /// than the TTL.
    ///
    /// `query` filters by case-insensitive substring across name,
    /// description, capability badges, and size variants; an empty query
    /// matches everything. `page` is 1-based and clamped into the valid
    /// range for the filtered result.
    pub async fn search(&self, query: &str, page: usize) -> Result<CatalogPage> {
        let entries = self.current_entries(false).await?;
        Ok(self.paginate(&entries, query, page))
    }

    /// Search after forcing a refetch, regardless of the TTL.
    pub async fn search_refreshed(&self, query: &str, page: usize) -> Result<CatalogPage> {
        let entries = self.current_entries(true).await?;
        Ok(self.paginate(&entries, query, page))
    }

    async fn current_entries(&self, force: bool) -> Result<Arc<Vec<CatalogEntry>>> {
        if !force {
            if let Some(entries) = self.fresh_set().await {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => "catalog").increment(1);
                return Ok(entries);
            }
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => "catalog").increment(1);
        }

        let _guard = self.refresh.lock().await;
        if !force {
            // Another caller may have refetched while we waited.
            if let Some(entries) = self.fresh_set().await {
                return Ok(entries);
            }
        }

        match self.source.fetch_all().await {
            Ok(list) => {
                let entries = Arc::new(list);
                debug!(count = entries.len(), "catalog refreshed");
                *self.catalog.write().await = Some(CatalogSet {
                    entries: Arc::clone(&entries),
                    fetched_at: Instant::now(),
                });
                Ok(entries)
            }
            Err(e) => {
                warn!(error = %e, "catalog refresh failed");
                let stale = self
                    .catalog
                    .read()
                    .await
                    .as_ref()
                    .map(|set| Arc::clone(&set.entries));
                match stale {
                    Some(entries) => {
                        metrics::counter!(telemetry::STALE_SERVES_TOTAL, "cache" => "catalog")
                            .increment(1);
                        Ok(entries)
                    }
                    None => Err(MuninnError::CatalogFetch(e.to_string())),
                }
            }
        }
    }

    fn paginate(&self, entries: &[CatalogEntry], query: &str, page: usize) -> CatalogPage {
        let needle = query.trim().to_lowercase();
        let matching: Vec<&CatalogEntry> = if needle.is_empty() {
            entries.iter().collect()
        } else {
            entries.iter().filter(|e| e.matches(&needle)).collect()
        };

        let total_matches = matching.len();
        let total_pages = total_matches.div_ceil(self.page_size).max(1);
        let page = page.clamp(1, total_pages);
        let start = (page - 1) * self.page_size;
        let page_entries = matching
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect();

        CatalogPage {
            entries: page_entries,
            page,
            total_pages,
            total_matches,
        }
    }

    async fn fresh_set(&self) -> Option<Arc<Vec<CatalogEntry>>> {
        let guard = self.catalog.read().await;
        guard
            .as_ref()
            .filter(|set| set.fetched_at.elapsed() < self.ttl)
            .map(|set| Arc::clone(&set.entries))
    }
}
