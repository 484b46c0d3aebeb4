//! Remote catalog entry and search-page types.

use serde::{Deserialize, Serialize};

/// Metadata for one model in the remote catalog.
///
/// Fetched in bulk and cached wholesale; never partially updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Catalog model name (e.g. `"llava"`).
    pub name: String,
    /// Short description from the catalog.
    #[serde(default)]
    pub description: String,
    /// Capability badge strings (e.g. `"vision"`, `"tools"`).
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Available size variants (e.g. `"7b"`, `"13b"`).
    #[serde(default)]
    pub sizes: Vec<String>,
    /// Popularity: total pulls, if the catalog reports it.
    #[serde(default)]
    pub pulls: Option<u64>,
    /// Number of published tags, if reported.
    #[serde(default)]
    pub tags_count: Option<u32>,
    /// Human-readable last-updated marker (e.g. `"3 weeks ago"`).
    #[serde(default)]
    pub updated: Option<String>,
}

impl CatalogEntry {
    /// Create an entry with just a name; remaining fields default empty.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            capabilities: Vec::new(),
            sizes: Vec::new(),
            pulls: None,
            tags_count: None,
            updated: None,
        }
    }

    /// Case-insensitive substring match across name, description,
    /// capability badges, and size variants.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self
                .capabilities
                .iter()
                .any(|cap| cap.to_lowercase().contains(needle))
            || self
                .sizes
                .iter()
                .any(|size| size.to_lowercase().contains(needle))
    }
}

/// One page of catalog search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPage {
    /// Entries on this page, in catalog order.
    pub entries: Vec<CatalogEntry>,
    /// 1-based page number, clamped into the valid range.
    pub page: usize,
    /// Total pages for the current filter (at least 1).
    pub total_pages: usize,
    /// Total entries matching the filter across all pages.
    pub total_matches: usize,
}
