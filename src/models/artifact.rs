use serde::{Deserialize, Serialize};

/// A language/path/content triple extracted from model output, destined for
/// the file store. Derived, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeArtifact {
    pub language: String,
    pub path: String,
    pub content: String,
}

impl CodeArtifact {
    pub fn new(
        language: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into(),
            path: path.into(),
            content: content.into(),
        }
    }
}
