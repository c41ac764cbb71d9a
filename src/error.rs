use serde::Serialize;
use thiserror::Error;

/// Generator output rejected before it reached the sandbox.
///
/// Never shown to the user as a failure: the validator always substitutes a
/// fallback artifact and records one of these as the reason.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Response is not a JSON object: {0}")]
    NotJson(String),

    #[error("Response has no 'code' field")]
    MissingCode,

    #[error("Response field 'code' is not a string")]
    CodeNotString,

    #[error("Response field 'code' is empty")]
    EmptyCode,

    #[error("No component declaration found")]
    NoDeclaration,

    #[error("No return statement found")]
    NoReturn,

    #[error("Generation failed: {0}")]
    Generation(String),
}

/// Generated code could not be turned into an executed module.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("Syntax error: {message}")]
    Parse { message: String },

    #[error("Unsupported syntax at line {line}: {construct}")]
    Unsupported { line: u32, construct: String },

    #[error("Execution failed: {0}")]
    Runtime(String),

    #[error("Execution budget exceeded: {0}")]
    Budget(String),
}

/// Failure that rejects an artifact as a whole. Validation problems never get
/// this far (the validator substitutes a fallback), and render failures stay
/// inside the component handle as a `RenderFailure`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Resolution error: {0}")]
    Resolution(String),
}

impl PipelineError {
    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            PipelineError::Synthesis(_) => PipelineErrorKind::Synthesis,
            PipelineError::Resolution(_) => PipelineErrorKind::Resolution,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineErrorKind {
    Synthesis,
    Resolution,
}
