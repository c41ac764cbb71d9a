use serde::{Deserialize, Serialize};

/// Generated component source plus its stylesheet.
///
/// Artifacts are never edited in place; a new prompt produces a new artifact
/// that replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentArtifact {
    #[serde(alias = "jsx")]
    pub code: String,
    #[serde(default, alias = "css")]
    pub stylesheet: String,
}

impl ComponentArtifact {
    pub fn new(code: impl Into<String>, stylesheet: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            stylesheet: stylesheet.into(),
        }
    }

    pub fn from_code(code: impl Into<String>) -> Self {
        Self::new(code, String::new())
    }
}
