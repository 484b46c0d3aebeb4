//! Remote model catalog source.
//!
//! Fetches the searchable catalog as JSON from a configurable URL. The
//! endpoint serves either a versioned payload
//! (`{ "version": 1, "entries": [...] }`) or a bare entry array; both are
//! accepted. HTML catalog pages are out of scope; whatever produces the
//! JSON lives outside this crate.
//!
//! In-memory caching, TTL, and stale-but-available degrade are handled by
//! [`CatalogCache`](crate::cache::CatalogCache); this type only performs
//! the fetch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::CatalogSource;
use crate::types::CatalogEntry;
use crate::{MuninnError, Result};

/// Maximum supported catalog payload version.
const MAX_SUPPORTED_VERSION: u32 = 1;

/// Versioned payload wrapper for the catalog format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPayload {
    /// Format version (currently 1).
    pub version: u32,
    /// Catalog entries.
    pub entries: Vec<CatalogEntry>,
}

/// Accept both versioned and bare-array formats.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPayload {
    Versioned(CatalogPayload),
    Legacy(Vec<CatalogEntry>),
}

/// Parse a catalog payload, accepting both versioned and legacy formats.
///
/// Returns an error if the version is unsupported.
fn parse_payload(json: &str) -> Result<Vec<CatalogEntry>> {
    let payload: RawPayload = serde_json::from_str(json)
        .map_err(|e| MuninnError::CatalogFetch(format!("failed to parse catalog JSON: {e}")))?;
    match payload {
        RawPayload::Versioned(catalog) => {
            if catalog.version > MAX_SUPPORTED_VERSION {
                return Err(MuninnError::CatalogFetch(format!(
                    "unsupported catalog version {} (max supported: {MAX_SUPPORTED_VERSION})",
                    catalog.version
                )));
            }
            Ok(catalog.entries)
        }
        RawPayload::Legacy(entries) => Ok(entries),
    }
}

/// JSON catalog endpoint client.
#[derive(Clone)]
pub struct RemoteCatalog {
    http: Client,
    url: String,
}

impl RemoteCatalog {
    /// Create a source fetching from the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            url: url.into(),
        }
    }

    /// The configured catalog URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CatalogSource for RemoteCatalog {
    async fn fetch_all(&self) -> Result<Vec<CatalogEntry>> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| MuninnError::CatalogFetch(format!("{}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MuninnError::CatalogFetch(format!(
                "catalog fetch returned HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MuninnError::CatalogFetch(e.to_string()))?;

        let entries = parse_payload(&body)?;
        debug!(count = entries.len(), url = %self.url, "catalog fetched");
        Ok(entries)
    }
}
