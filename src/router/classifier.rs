//! Task classification from request content.
//!
//! A pure, infallible heuristic: image attachments win outright, then a
//! curated set of programming-context signals, then the general bucket.

use crate::types::{RequestContext, TaskCategory};

/// Substrings that, when found in the lowercased text, signal a coding
/// request. Covers generic programming terms, error-trace markers,
/// keyword-like tokens, language/ecosystem names, and the non-English
/// terms the gateway's user base actually sends.
const CODE_SIGNALS: &[&str] = &[
    // Generic programming terms
    "function",
    "class",
    "method",
    "variable",
    "loop",
    "algorithm",
    "compile",
    "syntax",
    "runtime",
    "debug",
    "refactor",
    "optimize",
    "def ",
    "import ",
    "return ",
    "if ",
    "else ",
    "for ",
    "while ",
    "error",
    "exception",
    "traceback",
    "stack trace",
    "null pointer",
    // Languages / ecosystems
    "python",
    "javascript",
    "typescript",
    "java",
    "kotlin",
    "swift",
    "rust",
    "golang",
    "go ",
    "c++",
    "c#",
    "php",
    "ruby",
    "bash",
    "sql",
    "html",
    "css",
    "json",
    "yaml",
    "xml",
    // Spanish
    "función",
    "clase",
    "código",
    "programa",
    "depurar",
    "depuración",
    "excepción",
    // German
    "funktion",
    "klasse",
    "fehler",
    "programm",
    // French
    "fonction",
    "classe",
    "erreur",
    "programme",
    // Italian
    "funzione",
    "codice",
    "programma",
];

/// Name fragments that identify a model as code-specialised.
const CODE_MODEL_PATTERNS: &[&str] = &[
    "code",
    "coder",
    "codegen",
    "codellama",
    "starcoder",
    "deepseek-coder",
    "qwen-coder",
    "wizard-coder",
    "phind",
    "magicoder",
    "codegemma",
    "codestral",
    "devstral",
];

/// Whether a model name matches a known code-specialised family.
pub(crate) fn is_code_model(name: &str) -> bool {
    let lower = name.to_lowercase();
    CODE_MODEL_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Labels an inbound request with exactly one [`TaskCategory`].
///
/// First match wins: attached images mean `Vision`; programming signals
/// in the text mean `Code`; everything else (including empty input) is
/// `General`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskClassifier;

impl TaskClassifier {
    /// Create a classifier.
    pub fn new() -> Self {
        Self
    }

    /// Classify a request.
    pub fn classify(&self, request: &RequestContext<'_>) -> TaskCategory {
        if request.has_images {
            return TaskCategory::Vision;
        }
        let text = request.text.to_lowercase();
        if text.contains("```") || CODE_SIGNALS.iter().any(|kw| text.contains(kw)) {
            return TaskCategory::Code;
        }
        TaskCategory::General
    }
}
