//! Generation Capability Abstraction
//!
//! The external image/text generation service is treated as one polymorphic
//! capability: a request is either an analysis, a scene generation or a
//! schema-constrained metadata generation, and the response carries whatever
//! text and image parts the service produced. The Generation Client composes
//! instructions on top of this boundary; test doubles substitute it directly.

use crate::config::GenerationSettings;
use crate::error::GenerationError;
use crate::types::ImagePayload;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

pub mod gemini;

pub use gemini::GeminiCapability;

/// One invocation of the generation capability.
#[derive(Debug, Clone)]
pub enum CapabilityRequest {
    /// Describe an image in text
    Analyze {
        image: ImagePayload,
        instruction: String,
    },
    /// Produce a new image from a reference image and an instruction
    GenerateScene {
        reference: ImagePayload,
        instruction: String,
    },
    /// Produce JSON text conforming to `schema`
    GenerateMetadata {
        instruction: String,
        schema: serde_json::Value,
    },
}

impl CapabilityRequest {
    pub fn capability_name(&self) -> &'static str {
        match self {
            CapabilityRequest::Analyze { .. } => "analyze",
            CapabilityRequest::GenerateScene { .. } => "generate_scene",
            CapabilityRequest::GenerateMetadata { .. } => "generate_metadata",
        }
    }

    pub fn instruction(&self) -> &str {
        match self {
            CapabilityRequest::Analyze { instruction, .. }
            | CapabilityRequest::GenerateScene { instruction, .. }
            | CapabilityRequest::GenerateMetadata { instruction, .. } => instruction,
        }
    }

    /// Input image, if the capability takes one.
    pub fn image(&self) -> Option<&ImagePayload> {
        match self {
            CapabilityRequest::Analyze { image, .. } => Some(image),
            CapabilityRequest::GenerateScene { reference, .. } => Some(reference),
            CapabilityRequest::GenerateMetadata { .. } => None,
        }
    }
}

/// Parts returned by the capability.
#[derive(Debug, Clone, Default)]
pub struct CapabilityResponse {
    pub text: Option<String>,
    pub image: Option<ImagePayload>,
}

impl CapabilityResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn image(image: ImagePayload) -> Self {
        Self {
            text: None,
            image: Some(image),
        }
    }
}

/// Generation capability trait
#[async_trait]
pub trait GenerationCapability: Send + Sync {
    /// Invoke the capability once; no retries are performed here.
    async fn invoke(&self, request: CapabilityRequest)
        -> Result<CapabilityResponse, GenerationError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

// Helper function to map HTTP errors to GenerationError
pub(crate) fn map_http_error(error: reqwest::Error) -> GenerationError {
    if let Some(status) = error.status() {
        map_status(status.as_u16(), &error.to_string())
    } else if error.is_timeout() {
        GenerationError::RequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        GenerationError::RequestFailed(format!("Connection error: {}", error))
    } else {
        GenerationError::RequestFailed(format!("HTTP error: {}", error))
    }
}

pub(crate) fn map_status(status: u16, detail: &str) -> GenerationError {
    match status {
        401 | 403 => GenerationError::AuthFailed(format!("Authentication failed: {}", detail)),
        429 => GenerationError::RateLimit(format!("Rate limit exceeded: {}", detail)),
        404 => GenerationError::ModelNotFound(format!("Model not found: {}", detail)),
        _ => GenerationError::RequestFailed(format!(
            "Request failed with status {}: {}",
            status, detail
        )),
    }
}

pub(crate) fn build_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Client, GenerationError> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
        .map_err(|e| GenerationError::NotConfigured(format!("Failed to create HTTP client: {}", e)))
}

/// Provider factory for building capabilities from explicit configuration.
///
/// The capability key is passed in by the caller (usually from the login
/// response) rather than read from process-wide state.
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_capability(
        settings: &GenerationSettings,
        capability_key: &str,
    ) -> Result<Arc<dyn GenerationCapability>, GenerationError> {
        let key = capability_key.trim();
        if key.is_empty() {
            return Err(GenerationError::NotConfigured(
                "capability key is empty".to_string(),
            ));
        }
        Ok(Arc::new(GeminiCapability::new(settings.clone(), key.to_string())?))
    }
}
