//! Caching subsystem.
//!
//! Two independent caches with different lifetimes:
//!
//! - [`capability::CapabilityCache`] — the installed-model set (short TTL,
//!   refreshed from the [`ModelRegistry`](crate::traits::ModelRegistry))
//!   plus session-scoped vision verdicts (no TTL, explicitly
//!   invalidatable). Consulted by the router on every non-general request.
//!
//! - [`catalog::CatalogCache`] — the remote model catalog (5-minute TTL,
//!   refetched wholesale on expiry), filtered and paginated per search
//!   call.
//!
//! Both degrade to their last known-good data when a refresh fails, and
//! collapse concurrent refreshes for the same key into a single fetch.

pub mod capability;
pub mod catalog;

pub use capability::{CapabilityCache, CapabilityCacheConfig, VisionVerdict};
pub use catalog::{CatalogCache, CatalogCacheConfig};
