//! # Preview Native
//!
//! Ingests UI component code produced by a generative model and renders it
//! live inside a sandbox.
//!
//! ## Pipeline
//!
//! 1. **Validate**: the model's reply is parsed into a [`ComponentArtifact`]
//!    (`code` + `stylesheet`). Malformed replies never error; they are
//!    replaced by a fallback component named after the prompt.
//! 2. **Sanitize**: imports, exports and whole-line comments are stripped.
//! 3. **Synthesize**: the code is lowered from the oxc AST into a small IR and
//!    evaluated in a fresh [`ExecutionScope`] that exposes only rendering
//!    primitives and pure intrinsics. Evaluation is bounded by a step, time,
//!    depth and size budget.
//! 4. **Resolve**: capitalized top-level declarations are probed in source
//!    order; the first that renders to an element is the component.
//! 5. **Render**: a [`ComponentHandle`] renders the component to a
//!    [`RenderTree`], dispatches events and catches render failures.
//!
//! A [`Session`] drives the pipeline for one user. Requests are sequenced and
//! only the latest may update the display; shown artifacts are persisted
//! through an [`ArtifactStore`].

pub mod artifact;
mod ast;
mod builtins;
pub mod config;
mod element;
pub mod error;
pub mod generate;
pub mod guard;
mod hooks;
pub mod interp;
mod lower;
pub mod pipeline;
pub mod render;
pub mod resolve;
pub mod sanitize;
pub mod scope;
pub mod session;
pub mod store;
pub mod synthesize;
pub mod validate;
pub mod value;

#[cfg(test)]
mod component_tests;
#[cfg(test)]
mod expression_tests;
#[cfg(test)]
mod safety_tests;

pub use artifact::ComponentArtifact;
pub use config::{ExecutionLimits, GenerationConfig, PreviewConfig};
pub use error::{PipelineError, PipelineErrorKind, SynthesisError, ValidationError};
pub use generate::{generate_with, ChatCompletionsClient, GenerationError, GenerationService};
pub use guard::{ComponentHandle, EventPayload, RenderFailure};
pub use pipeline::{Diagnostics, PipelineFailure, PipelineStage, PreviewPipeline, RenderOutcome};
pub use render::{NodeId, RenderTree};
pub use resolve::{ComponentResolver, ResolvedComponent};
pub use sanitize::sanitize;
pub use scope::ExecutionScope;
pub use session::{Identity, Session, SessionError};
pub use store::{ArtifactStore, FileArtifactStore, MemoryArtifactStore, StoreError};
pub use synthesize::{ComponentSynthesizer, SynthesizedModule};
pub use validate::{fallback_artifact, validate_response, ValidatedResponse};
