//! Error types for the WoodVision generation studio.

use crate::pipeline::IllegalTransition;
use crate::types::{ArtifactId, RecordHandle};
use thiserror::Error;

/// Failures of the external generation capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generation capability not configured: {0}")]
    NotConfigured(String),

    #[error("Generation request failed: {0}")]
    RequestFailed(String),

    #[error("Generation authentication failed: {0}")]
    AuthFailed(String),

    #[error("Generation rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Generation model not found: {0}")]
    ModelNotFound(String),

    #[error("Generation returned no image payload")]
    NoImagePayload,

    #[error("Invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("Invalid image returned by generation: {0}")]
    InvalidImage(String),
}

impl GenerationError {
    /// Whether a repeat of the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::NotConfigured(_) => false,
            GenerationError::AuthFailed(_) => false,
            GenerationError::ModelNotFound(_) => false,
            GenerationError::InvalidImage(_) => false,
            GenerationError::RateLimit(_) => true,
            GenerationError::RequestFailed(_) => true,
            GenerationError::NoImagePayload => true,
            GenerationError::InvalidResponse(_) => true,
        }
    }
}

/// Failures of the remote persistence gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),

    #[error("Gateway rejected request: {message}")]
    Rejected { message: String },
}

/// Failure taxonomy of a pipeline run.
///
/// Only analysis and master generation failures abort a run; every other
/// variant is absorbed at its own step.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Product analysis failed: {0}")]
    AnalysisFailed(GenerationError),

    #[error("Master design generation failed: {0}")]
    MasterGenerationFailed(GenerationError),

    #[error("Scene {index} generation failed after {attempts} attempt(s): {source}")]
    FanOutStepFailed {
        index: usize,
        attempts: usize,
        source: GenerationError,
    },

    #[error("Listing metadata unavailable")]
    MetadataFailed,

    #[error("Run could not be persisted: {0}")]
    PersistenceFailed(GatewayError),

    #[error("Refinement of {artifact} failed: {source}")]
    RefinementFailed {
        artifact: ArtifactId,
        source: GenerationError,
    },
}

impl PipelineError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::AnalysisFailed(_) | PipelineError::MasterGenerationFailed(_)
        )
    }
}

/// Facade-level errors surfaced to the embedding application.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(ArtifactId),

    #[error("Run has not been persisted; no record handle available")]
    NotPersisted,

    #[error("Record not found in history: {0}")]
    RecordNotFound(RecordHandle),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Account pending approval: {0}")]
    PendingApproval(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
