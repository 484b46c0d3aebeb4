//! Installed-model descriptors and capability flags.

use serde::{Deserialize, Serialize};

/// A discrete functional trait of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCapability {
    /// Image understanding.
    Vision,
    /// Tool/function calling.
    Tools,
    /// Extended reasoning ("thinking") output.
    Thinking,
    /// Text embeddings.
    Embedding,
    /// Code-specialised generation.
    Code,
}

/// Metadata for one installed model.
///
/// Immutable once fetched; the installed set is replaced wholesale on
/// cache refresh, never merged entry by entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier, unique per installation (e.g. `"llama3:8b"`).
    pub name: String,
    /// Model size in bytes as reported by the runtime.
    pub size_bytes: u64,
    /// Capabilities this model supports.
    pub capabilities: Vec<ModelCapability>,
}

impl ModelDescriptor {
    /// Create a new descriptor with no capabilities.
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            capabilities: Vec::new(),
        }
    }

    /// Add a capability to this descriptor.
    pub fn with_capability(mut self, cap: ModelCapability) -> Self {
        if !self.capabilities.contains(&cap) {
            self.capabilities.push(cap);
        }
        self
    }

    /// Check whether the model carries a capability flag.
    pub fn has_capability(&self, cap: ModelCapability) -> bool {
        self.capabilities.contains(&cap)
    }
}
