//! Preview Pipeline
//!
//! Runs one artifact through sanitize → synthesize → resolve → guard. The
//! boundary is a `Result`: synthesis and resolution failures reject the
//! artifact as a whole, while render failures are kept inside the returned
//! [`ComponentHandle`].

use serde::Serialize;
use thiserror::Error;

use crate::artifact::ComponentArtifact;
use crate::config::PreviewConfig;
use crate::error::{PipelineError, PipelineErrorKind, SynthesisError};
use crate::guard::ComponentHandle;
use crate::resolve::ComponentResolver;
use crate::sanitize::sanitize;
use crate::synthesize::ComponentSynthesizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStage {
    Sanitization,
    Synthesis,
    Resolution,
}

/// Developer-facing facts about an artifact. Never used for control flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub original_length: usize,
    pub sanitized_length: usize,
    pub has_element_constructor: bool,
    pub has_state_hook: bool,
    pub has_function: bool,
    pub code_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<PipelineErrorKind>,
}

impl Diagnostics {
    pub fn collect(original: &str, sanitized: &str, preview_chars: usize) -> Self {
        let mut code_preview: String = sanitized.chars().take(preview_chars).collect();
        if sanitized.chars().count() > preview_chars {
            code_preview.push_str("...");
        }
        Self {
            original_length: original.len(),
            sanitized_length: sanitized.len(),
            has_element_constructor: sanitized.contains("createElement")
                || sanitized.contains("elem(")
                || sanitized.contains("h("),
            has_state_hook: sanitized.contains("useState"),
            has_function: sanitized.contains("function") || sanitized.contains("=>"),
            code_preview,
            stage: None,
            error_kind: None,
        }
    }

    fn failed(mut self, stage: PipelineStage, error: &PipelineError) -> Self {
        self.stage = Some(stage);
        self.error_kind = Some(error.kind());
        self
    }
}

#[derive(Error, Debug)]
#[error("{error}")]
pub struct PipelineFailure {
    pub error: PipelineError,
    pub diagnostics: Diagnostics,
}

/// What the preview pane shows for the current artifact.
#[derive(Debug, Default)]
pub enum RenderOutcome {
    #[default]
    Idle,
    Loading,
    Loaded(Box<ComponentHandle>),
    Error {
        message: String,
        diagnostics: Diagnostics,
    },
}

impl RenderOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, RenderOutcome::Loaded(_))
    }

    pub fn handle(&self) -> Option<&ComponentHandle> {
        match self {
            RenderOutcome::Loaded(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn handle_mut(&mut self) -> Option<&mut ComponentHandle> {
        match self {
            RenderOutcome::Loaded(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RenderOutcome::Idle => "idle",
            RenderOutcome::Loading => "loading",
            RenderOutcome::Loaded(_) => "loaded",
            RenderOutcome::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreviewPipeline {
    config: PreviewConfig,
}

impl PreviewPipeline {
    pub fn new(config: PreviewConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Turn an artifact into a guarded component, without rendering it.
    pub fn prepare(&self, artifact: &ComponentArtifact) -> Result<ComponentHandle, PipelineFailure> {
        let sanitized = sanitize(&artifact.code);
        let diagnostics = Diagnostics::collect(&artifact.code, &sanitized, self.config.preview_chars);
        tracing::debug!(
            original_length = diagnostics.original_length,
            sanitized_length = diagnostics.sanitized_length,
            "Artifact sanitized"
        );

        if sanitized.is_empty() {
            let error = PipelineError::Synthesis(SynthesisError::Parse {
                message: "No code left after sanitizing".to_string(),
            });
            return Err(PipelineFailure {
                diagnostics: diagnostics.failed(PipelineStage::Sanitization, &error),
                error,
            });
        }

        let limits = self.config.synthesis_limits();
        let mut module = match ComponentSynthesizer::new(limits).synthesize(&sanitized) {
            Ok(module) => module,
            Err(err) => {
                let error = PipelineError::from(err);
                return Err(PipelineFailure {
                    diagnostics: diagnostics.failed(PipelineStage::Synthesis, &error),
                    error,
                });
            }
        };

        let resolved = match ComponentResolver::new().resolve(&mut module) {
            Ok(resolved) => resolved,
            Err(error) => {
                let stage = match error {
                    PipelineError::Synthesis(_) => PipelineStage::Synthesis,
                    _ => PipelineStage::Resolution,
                };
                return Err(PipelineFailure {
                    diagnostics: diagnostics.failed(stage, &error),
                    error,
                });
            }
        };

        Ok(ComponentHandle::new(
            resolved.name,
            resolved.component,
            module.into_scope(),
            artifact.stylesheet.clone(),
            &self.config,
        ))
    }

    /// Prepare and render. A render failure leaves the handle loaded in its
    /// failed state; only a `PipelineError` produces `Error`.
    pub fn load(&self, artifact: &ComponentArtifact) -> RenderOutcome {
        match self.prepare(artifact) {
            Ok(mut handle) => {
                let name = handle.name().to_string();
                match handle.render() {
                    Ok(tree) => {
                        tracing::debug!(component = %name, elements = tree.elements().len(), "Component rendered")
                    }
                    Err(failure) => {
                        tracing::warn!(component = %name, error = %failure.message, "Component failed to render")
                    }
                }
                RenderOutcome::Loaded(Box::new(handle))
            }
            Err(failure) => {
                tracing::warn!(
                    error = %failure.error,
                    stage = ?failure.diagnostics.stage,
                    preview = %failure.diagnostics.code_preview,
                    "Artifact rejected"
                );
                RenderOutcome::Error {
                    message: failure.error.to_string(),
                    diagnostics: failure.diagnostics,
                }
            }
        }
    }
}
