//! Preview sessions.
//!
//! A [`Session`] owns the preview state for one user: the artifact on display,
//! its render outcome, and the request currently in flight. Requests are
//! numbered; only the latest number may update the display, and starting a new
//! request cancels the previous one.

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::artifact::ComponentArtifact;
use crate::generate::{generate_with, GenerationService};
use crate::guard::{EventPayload, RenderFailure};
use crate::pipeline::{Diagnostics, PreviewPipeline, RenderOutcome};
use crate::render::NodeId;
use crate::store::{ArtifactStore, StoreError};
use crate::validate::{fallback_artifact, ValidatedResponse};

/// Who is asking, as established by the surrounding auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Authorized { user_id: String },
    Anonymous,
}

impl Identity {
    pub fn authorized(user_id: impl Into<String>) -> Self {
        Identity::Authorized {
            user_id: user_id.into(),
        }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, Identity::Authorized { .. })
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::Authorized { user_id } => Some(user_id),
            Identity::Anonymous => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not authorized to generate components")]
    Unauthorized,

    #[error("Prompt is required")]
    EmptyPrompt,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Handle for one in-flight request.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    pub seq: u64,
    pub prompt: String,
    pub cancel: CancellationToken,
}

/// A rejected artifact, kept for inspection after its fallback replaced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactFailure {
    pub message: String,
    pub diagnostics: Diagnostics,
}

pub struct Session<S: ArtifactStore> {
    id: String,
    identity: Identity,
    pipeline: PreviewPipeline,
    store: S,
    seq: u64,
    in_flight: Option<CancellationToken>,
    artifact: Option<ComponentArtifact>,
    outcome: RenderOutcome,
    last_failure: Option<ArtifactFailure>,
}

impl<S: ArtifactStore> Session<S> {
    pub fn new(id: impl Into<String>, identity: Identity, pipeline: PreviewPipeline, store: S) -> Self {
        Self {
            id: id.into(),
            identity,
            pipeline,
            store,
            seq: 0,
            in_flight: None,
            artifact: None,
            outcome: RenderOutcome::Idle,
            last_failure: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn pipeline(&self) -> &PreviewPipeline {
        &self.pipeline
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Sequence number of the latest request.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The artifact currently displayed.
    pub fn artifact(&self) -> Option<&ComponentArtifact> {
        self.artifact.as_ref()
    }

    pub fn outcome(&self) -> &RenderOutcome {
        &self.outcome
    }

    pub fn outcome_mut(&mut self) -> &mut RenderOutcome {
        &mut self.outcome
    }

    /// The last artifact rejected by the pipeline, if the current display is
    /// its fallback.
    pub fn last_failure(&self) -> Option<&ArtifactFailure> {
        self.last_failure.as_ref()
    }

    /// Start a request for `prompt`, superseding any request in flight.
    pub fn begin(&mut self, prompt: &str) -> Result<GenerationTicket, SessionError> {
        if !self.identity.is_authorized() {
            tracing::warn!(session = %self.id, "Refusing unauthorized generation request");
            return Err(SessionError::Unauthorized);
        }
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }

        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
            tracing::debug!(session = %self.id, seq = self.seq, "Cancelled superseded request");
        }
        self.seq += 1;
        let cancel = CancellationToken::new();
        self.in_flight = Some(cancel.clone());
        self.outcome = RenderOutcome::Loading;
        tracing::info!(session = %self.id, seq = self.seq, "Generation started");

        Ok(GenerationTicket {
            seq: self.seq,
            prompt: prompt.to_string(),
            cancel,
        })
    }

    /// Apply a finished request. Returns `Ok(false)` when the ticket has been
    /// superseded and the response was discarded.
    pub fn complete(&mut self, ticket: &GenerationTicket, response: ValidatedResponse) -> Result<bool, SessionError> {
        if ticket.seq != self.seq {
            tracing::warn!(
                session = %self.id,
                seq = ticket.seq,
                latest = self.seq,
                "Discarding stale generation result"
            );
            return Ok(false);
        }
        self.in_flight = None;

        if let Some(reason) = &response.fallback {
            tracing::warn!(session = %self.id, reason = %reason, "Displaying fallback artifact");
        }
        let shown = self.display(response.artifact, &ticket.prompt);
        self.store.save_artifact(&self.id, &shown)?;
        tracing::info!(session = %self.id, seq = ticket.seq, outcome = self.outcome.label(), "Generation applied");
        Ok(true)
    }

    /// Generate for `prompt` and apply the result. Returns `Ok(false)` if the
    /// request was cancelled or superseded.
    pub async fn submit<G>(&mut self, service: &G, prompt: &str) -> Result<bool, SessionError>
    where
        G: GenerationService + ?Sized,
    {
        let ticket = self.begin(prompt)?;
        let timeout = self.pipeline.config().generation.timeout();
        match generate_with(service, &ticket.prompt, &ticket.cancel, timeout).await {
            Some(response) => self.complete(&ticket, response),
            None => Ok(false),
        }
    }

    /// Reload the stored artifact, superseding any request in flight.
    pub fn restore(&mut self) -> Result<bool, SessionError> {
        let Some(artifact) = self.store.load_artifact(&self.id)? else {
            return Ok(false);
        };
        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
        }
        self.seq += 1;
        self.outcome = RenderOutcome::Loading;
        self.display(artifact, "");
        tracing::info!(session = %self.id, outcome = self.outcome.label(), "Session restored");
        Ok(true)
    }

    /// Forward an interaction to the displayed component.
    pub fn dispatch(&mut self, node: NodeId, event: &str, payload: EventPayload) -> Result<bool, RenderFailure> {
        match self.outcome.handle_mut() {
            Some(handle) => handle.dispatch(node, event, payload),
            None => Ok(false),
        }
    }

    /// HTML for whatever the preview currently shows.
    pub fn to_html(&self) -> String {
        match &self.outcome {
            RenderOutcome::Loaded(handle) => handle.to_html(),
            _ => String::new(),
        }
    }

    /// Load `artifact`; if the pipeline rejects it, record the failure and load
    /// the prompt's fallback instead. Returns the artifact actually shown.
    fn display(&mut self, artifact: ComponentArtifact, prompt: &str) -> ComponentArtifact {
        match self.pipeline.load(&artifact) {
            RenderOutcome::Error { message, diagnostics } => {
                tracing::warn!(session = %self.id, error = %message, "Artifact rejected, loading fallback");
                self.outcome = RenderOutcome::Error {
                    message: message.clone(),
                    diagnostics: diagnostics.clone(),
                };
                self.last_failure = Some(ArtifactFailure { message, diagnostics });

                let fallback = fallback_artifact(prompt);
                self.outcome = RenderOutcome::Loading;
                let outcome = self.pipeline.load(&fallback);
                if let RenderOutcome::Error { message, .. } = &outcome {
                    tracing::error!(session = %self.id, error = %message, "Fallback artifact failed");
                }
                self.outcome = outcome;
                self.artifact = Some(fallback.clone());
                fallback
            }
            outcome => {
                self.last_failure = None;
                self.outcome = outcome;
                self.artifact = Some(artifact.clone());
                artifact
            }
        }
    }
}

impl<S: ArtifactStore> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("seq", &self.seq)
            .field("outcome", &self.outcome.label())
            .finish()
    }
}
