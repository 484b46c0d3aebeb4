//! Collaborator traits consumed by the engine.
//!
//! The engine is a pure in-process orchestration layer; everything that
//! touches the network sits behind one of these traits. [`crate::ollama`]
//! provides the stock implementations against a local Ollama endpoint,
//! and tests substitute small mock structs.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::types::{CatalogEntry, ModelDescriptor, ProgressEvent};
use crate::{MuninnError, Result};

/// Stream of install progress reports.
///
/// `Ok` items carry cumulative progress. An `Err` item is the failure
/// marker; clean end-of-stream is the success marker. Dropping the stream
/// is the best-effort abort signal to the transport.
pub type ProgressStream = Pin<Box<dyn Stream<Item = Result<ProgressEvent>> + Send>>;

/// Source of truth for locally installed models.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// List currently installed models.
    ///
    /// May fail with a transport error; callers degrade to their last
    /// known-good set.
    async fn list(&self) -> Result<Vec<ModelDescriptor>>;

    /// Probe whether a model can accept image input.
    ///
    /// A failure is treated as "unknown" by callers and re-attempted on
    /// the next lookup, never cached as a negative.
    async fn probe_vision(&self, model: &str) -> Result<bool>;

    /// Remove an installed model.
    ///
    /// Optional operation; registries that cannot remove models keep the
    /// default stub.
    async fn remove(&self, _model: &str) -> Result<()> {
        Err(MuninnError::NotImplemented("remove"))
    }
}

/// Transport that performs the long-running model install.
#[async_trait]
pub trait InstallTransport: Send + Sync {
    /// Begin installing `model`, yielding a progress stream.
    ///
    /// The returned stream follows the [`ProgressStream`] contract:
    /// `Err` item = failure marker, end-of-stream = success marker,
    /// drop = best-effort abort.
    async fn start(&self, model: &str) -> Result<ProgressStream>;
}

/// Source of the searchable remote model catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the full catalog entry list.
    ///
    /// May fail; the catalog cache keeps serving its last known-good set.
    async fn fetch_all(&self) -> Result<Vec<CatalogEntry>>;
}
