//! Tests for the engine facade and builder wiring.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use muninn::{
    CatalogEntry, CatalogSource, InstallEvent, InstallTransport, ModelCapability, ModelDescriptor,
    ModelRegistry, Muninn, MuninnError, ProgressStream, RequestContext, Result, TaskCategory,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

// ============================================================================
// Mock collaborators
// ============================================================================

struct MockRegistry {
    models: Vec<ModelDescriptor>,
    list_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    removed: Mutex<Vec<String>>,
}

impl MockRegistry {
    fn new(models: Vec<ModelDescriptor>) -> Self {
        Self {
            models,
            list_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            removed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ModelRegistry for MockRegistry {
    async fn list(&self) -> Result<Vec<ModelDescriptor>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.models.clone())
    }

    async fn probe_vision(&self, model: &str) -> Result<bool> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .models
            .iter()
            .any(|m| m.name == model && m.has_capability(ModelCapability::Vision)))
    }

    async fn remove(&self, model: &str) -> Result<()> {
        self.removed.lock().unwrap().push(model.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedTransport {
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<Result<muninn::ProgressEvent>>>>,
}

impl ScriptedTransport {
    fn push_stream(&self) -> mpsc::UnboundedSender<Result<muninn::ProgressEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push_back(rx);
        tx
    }
}

#[async_trait]
impl InstallTransport for ScriptedTransport {
    async fn start(&self, _model: &str) -> Result<ProgressStream> {
        match self.streams.lock().unwrap().pop_front() {
            Some(rx) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            None => Err(MuninnError::Http("connection refused".into())),
        }
    }
}

struct MockCatalog;

#[async_trait]
impl CatalogSource for MockCatalog {
    async fn fetch_all(&self) -> Result<Vec<CatalogEntry>> {
        Ok(vec![CatalogEntry::new("llava"), CatalogEntry::new("llama3")])
    }
}

fn sample_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::new("llama3", 4_000_000_000),
        ModelDescriptor::new("llava", 8_000_000_000).with_capability(ModelCapability::Vision),
    ]
}

// ============================================================================
// Builder
// ============================================================================

#[test]
fn builder_requires_registry() {
    let result = Muninn::builder()
        .install_transport(Arc::new(ScriptedTransport::default()))
        .build();
    assert!(matches!(result, Err(MuninnError::Configuration(_))));
}

#[test]
fn builder_requires_transport() {
    let result = Muninn::builder()
        .registry(Arc::new(MockRegistry::new(sample_models())))
        .build();
    assert!(matches!(result, Err(MuninnError::Configuration(_))));
}

#[test]
fn ollama_wires_registry_and_transport() {
    let engine = Muninn::builder().ollama("http://localhost:11434").build();
    assert!(engine.is_ok());
}

// ============================================================================
// Facade behaviour
// ============================================================================

#[tokio::test]
async fn engine_routes_end_to_end() {
    let engine = Muninn::builder()
        .registry(Arc::new(MockRegistry::new(sample_models())))
        .install_transport(Arc::new(ScriptedTransport::default()))
        .build()
        .unwrap();

    let decision = engine
        .route("u1", "llama3", &RequestContext::with_images("what is this?"))
        .await;

    assert_eq!(decision.category, TaskCategory::Vision);
    assert_eq!(decision.model, "llava");
    assert!(decision.switched);
}

#[tokio::test]
async fn engine_runs_install_to_completion() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let engine = Muninn::builder()
        .registry(Arc::new(MockRegistry::new(sample_models())))
        .install_transport(Arc::clone(&transport) as Arc<dyn InstallTransport>)
        .build()
        .unwrap();

    let admission = engine.request_install("qwen2.5").await;
    assert!(!admission.is_duplicate());

    let mut events = engine.subscribe(admission.handle());
    drop(tx);
    assert_eq!(events.next().await, Some(InstallEvent::Completed));
}

#[tokio::test]
async fn uninstall_invalidates_caches() {
    let registry = Arc::new(MockRegistry::new(sample_models()));
    let engine = Muninn::builder()
        .registry(Arc::clone(&registry) as Arc<dyn ModelRegistry>)
        .install_transport(Arc::new(ScriptedTransport::default()))
        .build()
        .unwrap();

    // Populate both cache classes.
    engine.installed_models().await.unwrap();
    engine
        .select("u1", "llava", TaskCategory::Vision)
        .await;
    assert_eq!(registry.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(registry.probe_calls.load(Ordering::SeqCst), 1);

    engine.uninstall_model("llava").await.unwrap();
    assert_eq!(registry.removed.lock().unwrap().as_slice(), ["llava"]);

    // Installed set was dropped and the verdict forgotten.
    engine.installed_models().await.unwrap();
    assert_eq!(registry.list_calls.load(Ordering::SeqCst), 2);
    engine.select("u1", "llava", TaskCategory::Vision).await;
    assert_eq!(registry.probe_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn catalog_search_without_source_is_not_implemented() {
    let engine = Muninn::builder()
        .registry(Arc::new(MockRegistry::new(sample_models())))
        .install_transport(Arc::new(ScriptedTransport::default()))
        .build()
        .unwrap();

    assert!(matches!(
        engine.search_catalog("llava", 1).await,
        Err(MuninnError::NotImplemented(_))
    ));
}

#[tokio::test]
async fn catalog_search_with_source() {
    let engine = Muninn::builder()
        .registry(Arc::new(MockRegistry::new(sample_models())))
        .install_transport(Arc::new(ScriptedTransport::default()))
        .catalog_source(Arc::new(MockCatalog))
        .build()
        .unwrap();

    let page = engine.search_catalog("llava", 1).await.unwrap();
    assert_eq!(page.total_matches, 1);
    assert_eq!(page.entries[0].name, "llava");
}

#[tokio::test]
async fn cancel_install_unknown_model_is_noop() {
    let engine = Muninn::builder()
        .registry(Arc::new(MockRegistry::new(sample_models())))
        .install_transport(Arc::new(ScriptedTransport::default()))
        .build()
        .unwrap();

    assert!(!engine.cancel_install("ghost").await);
}
