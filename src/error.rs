//! Muninn error types

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    // Transport/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Installed-model registry unreachable or failed mid-request.
    ///
    /// Callers degrade to the last known-good set where one exists; the
    /// fetch is retried on the next call.
    #[error("registry fetch failed: {0}")]
    RegistryFetch(String),

    /// Remote catalog unreachable or failed mid-request.
    ///
    /// The catalog cache keeps serving its last known-good entry set.
    #[error("catalog fetch failed: {0}")]
    CatalogFetch(String),

    /// Capability probe returned no usable verdict.
    ///
    /// Never cached as a negative; the probe is re-attempted on the next
    /// lookup for the same model.
    #[error("capability probe inconclusive for model '{0}'")]
    CapabilityUnknown(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    // Streaming errors
    #[error("install stream error: {0}")]
    Stream(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("operation not implemented: {0}")]
    NotImplemented(&'static str),
}

impl MuninnError {
    /// Whether the error is transient and worth retrying on the next call.
    ///
    /// Transient errors degrade to stale cached data where available; they
    /// never mark a model or catalog entry as permanently unusable.
    pub fn is_transient(&self) -> bool {
        match self {
            MuninnError::Http(_)
            | MuninnError::RegistryFetch(_)
            | MuninnError::CatalogFetch(_)
            | MuninnError::CapabilityUnknown(_)
            | MuninnError::Stream(_) => true,
            MuninnError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
