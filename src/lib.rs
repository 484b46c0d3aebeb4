//! Muninn - model lifecycle and routing engine for local LLM runtimes
//!
//! This crate decides which installed model should serve each request,
//! given capability constraints (vision, code-specialisation, general
//! chat) and the user's stored preference. It also manages the
//! asynchronous, cancellable process of installing new models from a
//! remote catalog, with throttled progress reporting and
//! one-job-per-model admission.
//!
//! Everything network-facing sits behind collaborator traits
//! ([`ModelRegistry`], [`InstallTransport`], [`CatalogSource`]); the
//! stock implementations target a local Ollama endpoint.
//!
//! # Routing Example
//!
//! ```rust,no_run
//! use muninn::{Muninn, RequestContext};
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let engine = Muninn::builder()
//!         .ollama("http://localhost:11434")
//!         .build()?;
//!
//!     let decision = engine
//!         .route("user-42", "llama3:8b", &RequestContext::with_images("what is this?"))
//!         .await;
//!
//!     if !decision.serviceable {
//!         eprintln!("no vision-capable model installed");
//!     }
//!     println!("serving with {}", decision.model);
//!     Ok(())
//! }
//! ```
//!
//! # Install Example
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use muninn::{Admission, InstallEvent, Muninn};
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let engine = Muninn::builder()
//!         .ollama("http://localhost:11434")
//!         .build()?;
//!
//!     match engine.request_install("llava:13b").await {
//!         Admission::Started(handle) => {
//!             let mut events = engine.subscribe(&handle);
//!             while let Some(event) = events.next().await {
//!                 match event {
//!                     InstallEvent::Progress { bytes_completed, .. } => {
//!                         println!("{bytes_completed} bytes");
//!                     }
//!                     terminal => {
//!                         println!("{terminal:?}");
//!                         break;
//!                     }
//!                 }
//!             }
//!         }
//!         Admission::Duplicate(handle) => {
//!             println!("already installing: {:?}", handle.snapshot());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod install;
pub mod ollama;
pub mod remote;
pub mod router;
pub mod telemetry;
pub mod traits;
pub mod types;

// Re-export main types at crate root
pub use engine::{ModelEngine, Muninn, MuninnBuilder};
pub use error::{MuninnError, Result};
pub use traits::{CatalogSource, InstallTransport, ModelRegistry, ProgressStream};

pub use cache::{
    CapabilityCache, CapabilityCacheConfig, CatalogCache, CatalogCacheConfig, VisionVerdict,
};
pub use install::{Admission, InstallConfig, InstallEventStream, InstallManager, JobHandle};
pub use ollama::{OllamaClient, OllamaConfig};
pub use remote::RemoteCatalog;
pub use router::{Router, TaskClassifier};

// Re-export all types
pub use types::{
    CatalogEntry, CatalogPage, InstallEvent, JobSnapshot, JobState, ModelCapability,
    ModelDescriptor, ProgressEvent, RequestContext, RoutingDecision, TaskCategory,
};
