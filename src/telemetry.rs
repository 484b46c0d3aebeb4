//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `category` — task category ("vision" | "code" | "general")
//! - `outcome` — operation result, values per metric
//! - `cache` — cache identity ("installed" | "catalog" | "vision")

/// Total routing decisions produced.
///
/// Labels: `category`, `outcome` ("kept" | "switched" | "unserviceable").
pub const ROUTES_TOTAL: &str = "muninn_routes_total";

/// Total cache hits.
///
/// Labels: `cache` ("installed" | "catalog" | "vision").
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total cache misses (absent or expired entry).
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Total times a stale entry set was served because a refresh failed.
///
/// Labels: `cache` ("installed" | "catalog").
pub const STALE_SERVES_TOTAL: &str = "muninn_stale_serves_total";

/// Total capability probes issued against the model registry.
///
/// Labels: `outcome` ("capable" | "not_capable" | "unknown").
pub const PROBES_TOTAL: &str = "muninn_probes_total";

/// Total install admissions.
///
/// Labels: `outcome` ("started" | "duplicate").
pub const INSTALL_ADMISSIONS_TOTAL: &str = "muninn_install_admissions_total";

/// Total install jobs reaching a terminal state.
///
/// Labels: `outcome` ("completed" | "failed" | "cancelled").
pub const INSTALLS_TOTAL: &str = "muninn_installs_total";
