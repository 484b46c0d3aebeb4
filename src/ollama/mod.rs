//! Ollama HTTP API client.
//!
//! Implements the [`ModelRegistry`] and [`InstallTransport`] collaborator
//! traits against a local Ollama endpoint:
//!
//! - `GET /api/tags` — installed models; vision/embedding flags are
//!   inferred from the reported model families.
//! - `POST /api/show` — capability probe for one model.
//! - `POST /api/pull` — streaming install; newline-delimited JSON status
//!   lines are folded into cumulative progress events.
//! - `DELETE /api/delete` — model removal.
//!
//! One engine instance talks to one endpoint; the client is cheap to
//! clone and shares its connection pool.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::router::is_code_model;
use crate::traits::{InstallTransport, ModelRegistry, ProgressStream};
use crate::types::{ModelCapability, ModelDescriptor, ProgressEvent};
use crate::{MuninnError, Result};

/// Default Ollama endpoint.
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Model families that indicate image input support.
const VISION_FAMILIES: &[&str] = &["clip", "mllama"];

/// Model families that indicate an embedding model.
const EMBEDDING_FAMILIES: &[&str] = &["bert", "nomic-bert"];

/// Configuration for the Ollama client.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Endpoint base URL. Default: `http://localhost:11434`.
    pub base_url: String,
    /// Request timeout for non-streaming calls. Default: 120 seconds.
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl OllamaConfig {
    /// Create a config for the given endpoint.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for one Ollama endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
}

impl OllamaClient {
    /// Create a client for the given endpoint.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(&OllamaConfig::new(base_url))
    }

    /// Create a client from a full configuration.
    pub fn with_config(config: &OllamaConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The configured endpoint base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    details: Option<ModelDetails>,
}

#[derive(Deserialize, Default)]
struct ModelDetails {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    families: Option<Vec<String>>,
}

impl ModelDetails {
    fn all_families(&self) -> Vec<String> {
        let mut families: Vec<String> = self
            .families
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|f| f.to_lowercase())
            .collect();
        if let Some(family) = &self.family {
            let family = family.to_lowercase();
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }
}

#[derive(Serialize)]
struct ShowRequest<'a> {
    model: &'a str,
}

#[derive(Deserialize)]
struct ShowResponse {
    #[serde(default)]
    capabilities: Option<Vec<String>>,
    #[serde(default)]
    details: Option<ModelDetails>,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct PullLine {
    #[serde(default)]
    status: String,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    model: &'a str,
}

/// Derive capability flags for an installed model from its name and
/// reported families. `/api/tags` does not expose tool or thinking
/// support, so those flags stay unset here.
fn descriptor_from_tag(tag: TagModel) -> ModelDescriptor {
    let families = tag
        .details
        .as_ref()
        .map(ModelDetails::all_families)
        .unwrap_or_default();

    let mut descriptor = ModelDescriptor::new(tag.name, tag.size);
    if families.iter().any(|f| VISION_FAMILIES.contains(&f.as_str())) {
        descriptor = descriptor.with_capability(ModelCapability::Vision);
    }
    if families
        .iter()
        .any(|f| EMBEDDING_FAMILIES.contains(&f.as_str()))
    {
        descriptor = descriptor.with_capability(ModelCapability::Embedding);
    }
    if is_code_model(&descriptor.name) {
        descriptor = descriptor.with_capability(ModelCapability::Code);
    }
    descriptor
}

// ============================================================================
// Collaborator trait implementations
// ============================================================================

#[async_trait]
impl ModelRegistry for OllamaClient {
    async fn list(&self) -> Result<Vec<ModelDescriptor>> {
        let response = self
            .http
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| MuninnError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MuninnError::Api {
                status: status.as_u16(),
                message: truncate(&message, 300),
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| MuninnError::Http(e.to_string()))?;

        Ok(tags.models.into_iter().map(descriptor_from_tag).collect())
    }

    async fn probe_vision(&self, model: &str) -> Result<bool> {
        let response = self
            .http
            .post(self.url("/api/show"))
            .json(&ShowRequest { model })
            .send()
            .await
            .map_err(|e| MuninnError::Http(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(MuninnError::ModelNotFound(model.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MuninnError::Api {
                status: status.as_u16(),
                message: truncate(&message, 300),
            });
        }

        let show: ShowResponse = response
            .json()
            .await
            .map_err(|e| MuninnError::Http(e.to_string()))?;

        if let Some(capabilities) = &show.capabilities {
            return Ok(capabilities.iter().any(|c| c.eq_ignore_ascii_case("vision")));
        }
        // Older servers omit the capabilities list; fall back to families.
        let families = show
            .details
            .as_ref()
            .map(ModelDetails::all_families)
            .unwrap_or_default();
        Ok(families.iter().any(|f| VISION_FAMILIES.contains(&f.as_str())))
    }

    async fn remove(&self, model: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url("/api/delete"))
            .json(&DeleteRequest { model })
            .send()
            .await
            .map_err(|e| MuninnError::Http(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(MuninnError::ModelNotFound(model.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MuninnError::Api {
                status: status.as_u16(),
                message: truncate(&message, 300),
            });
        }
        debug!(model, "model removed");
        Ok(())
    }
}

#[async_trait]
impl InstallTransport for OllamaClient {
    async fn start(&self, model: &str) -> Result<ProgressStream> {
        // No client-side timeout here: pulls legitimately run for minutes.
        let response = self
            .http
            .post(self.url("/api/pull"))
            .timeout(Duration::from_secs(24 * 3600))
            .json(&PullRequest {
                model,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| MuninnError::Http(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(MuninnError::ModelNotFound(model.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MuninnError::Api {
                status: status.as_u16(),
                message: truncate(&message, 300),
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(32);
        tokio::spawn(pump_pull_stream(response, tx));
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Fold Ollama's newline-delimited pull status lines into cumulative
/// progress events.
///
/// Ollama reports per-layer progress keyed by digest; summing across the
/// layers seen so far keeps `bytes_completed` non-decreasing for the
/// whole transfer. The `success` status closes the channel (the success
/// marker); an `error` line or transport fault sends the failure marker.
async fn pump_pull_stream(
    response: reqwest::Response,
    tx: tokio::sync::mpsc::Sender<Result<ProgressEvent>>,
) {
    let mut body = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    let mut layers: HashMap<String, (u64, u64)> = HashMap::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(Err(MuninnError::Http(e.to_string()))).await;
                return;
            }
        };
        buffer.extend_from_slice(&chunk);

        while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=newline).collect();
            let line = &line[..line.len() - 1];
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let parsed: PullLine = match serde_json::from_slice(line) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(error = %e, "skipping malformed pull status line");
                    continue;
                }
            };

            if let Some(error) = parsed.error {
                let _ = tx.send(Err(MuninnError::Stream(error))).await;
                return;
            }
            if parsed.status == "success" {
                return;
            }

            if let Some(digest) = parsed.digest {
                let entry = layers.entry(digest).or_insert((0, 0));
                entry.0 = entry.0.max(parsed.completed.unwrap_or(0));
                entry.1 = entry.1.max(parsed.total.unwrap_or(0));
            }
            let bytes_completed: u64 = layers.values().map(|(completed, _)| completed).sum();
            let total: u64 = layers.values().map(|(_, total)| total).sum();

            let event = ProgressEvent {
                bytes_completed,
                bytes_total: (total > 0).then_some(total),
                phase: parsed.status,
            };
            if tx.send(Ok(event)).await.is_err() {
                // Consumer dropped the stream: best-effort abort.
                return;
            }
        }
    }

    // The server closed the connection without a success marker.
    let _ = tx
        .send(Err(MuninnError::Stream(
            "pull stream ended before completion".to_string(),
        )))
        .await;
}

fn truncate(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).collect();
    if out.len() < text.len() {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str, families: &[&str]) -> TagModel {
        TagModel {
            name: name.to_string(),
            size: 4_000_000_000,
            details: Some(ModelDetails {
                family: None,
                families: Some(families.iter().map(|f| f.to_string()).collect()),
            }),
        }
    }

    #[test]
    fn vision_family_maps_to_capability() {
        let descriptor = descriptor_from_tag(tag("llava:13b", &["llama", "clip"]));
        assert!(descriptor.has_capability(ModelCapability::Vision));
    }

    #[test]
    fn plain_model_has_no_flags() {
        let descriptor = descriptor_from_tag(tag("llama3:8b", &["llama"]));
        assert!(descriptor.capabilities.is_empty());
    }

    #[test]
    fn code_model_detected_by_name() {
        let descriptor = descriptor_from_tag(tag("deepseek-coder:6.7b", &["llama"]));
        assert!(descriptor.has_capability(ModelCapability::Code));
    }

    #[test]
    fn embedding_family_maps_to_capability() {
        let descriptor = descriptor_from_tag(tag("nomic-embed-text", &["nomic-bert"]));
        assert!(descriptor.has_capability(ModelCapability::Embedding));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn truncate_caps_length() {
        assert_eq!(truncate("short", 300), "short");
        let long = "x".repeat(400);
        let out = truncate(&long, 300);
        assert!(out.chars().count() <= 301);
        assert!(out.ends_with('…'));
    }
}
