//! Routing request/decision types.

use serde::{Deserialize, Serialize};

/// Task category inferred from an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    /// Request carries image content.
    Vision,
    /// Request looks like a programming task.
    Code,
    /// Everything else.
    General,
}

impl TaskCategory {
    /// Stable label for logging and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Vision => "vision",
            TaskCategory::Code => "code",
            TaskCategory::General => "general",
        }
    }
}

/// The parts of an inbound request the router inspects.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// Message text (may be empty).
    pub text: &'a str,
    /// Whether the request carries attached images.
    pub has_images: bool,
}

impl<'a> RequestContext<'a> {
    /// Build a context for a text-only request.
    pub fn text(text: &'a str) -> Self {
        Self {
            text,
            has_images: false,
        }
    }

    /// Build a context for a request with attached images.
    pub fn with_images(text: &'a str) -> Self {
        Self {
            text,
            has_images: true,
        }
    }
}

/// Outcome of one routing pass. Produced fresh per request; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// The task category the request was classified as.
    pub category: TaskCategory,
    /// The model that should serve the request. Never empty.
    pub model: String,
    /// Whether `model` differs from the user's stored preference.
    pub switched: bool,
    /// Human-readable reason when the preference was overridden.
    pub note: Option<String>,
    /// False only when no installed model can satisfy the task (vision
    /// request with no vision-capable model). The caller should warn the
    /// user instead of forwarding image content to an incapable model.
    pub serviceable: bool,
}

impl RoutingDecision {
    /// Keep the preferred model unchanged.
    pub(crate) fn keep(category: TaskCategory, model: impl Into<String>) -> Self {
        Self {
            category,
            model: model.into(),
            switched: false,
            note: None,
            serviceable: true,
        }
    }

    /// Switch away from the preferred model, with a reason.
    pub(crate) fn switch(
        category: TaskCategory,
        model: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            category,
            model: model.into(),
            switched: true,
            note: Some(note.into()),
            serviceable: true,
        }
    }

    /// Keep the preferred model but flag that no installed model fits.
    pub(crate) fn unserviceable(category: TaskCategory, model: impl Into<String>) -> Self {
        Self {
            category,
            model: model.into(),
            switched: false,
            note: None,
            serviceable: false,
        }
    }

    /// Label for the `outcome` metric dimension.
    pub(crate) fn outcome(&self) -> &'static str {
        if !self.serviceable {
            "unserviceable"
        } else if self.switched {
            "switched"
        } else {
            "kept"
        }
    }
}
