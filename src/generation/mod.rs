//! Generation Client
//!
//! Wraps the generation capability with the studio's three high-level
//! operations: analyze a product image, generate a scene from a reference
//! image, and produce listing metadata. Each operation issues exactly one
//! capability invocation; retries are the pipeline's concern.

pub mod prompt;

use crate::error::GenerationError;
use crate::provider::{CapabilityRequest, GenerationCapability};
use crate::types::{Environment, ImagePayload, ListingMetadata, SceneKind};
use std::sync::Arc;
use tracing::{debug, warn};

pub use prompt::{
    compose_scene_instruction, lighting, metadata_instruction, metadata_schema, ScenePass,
    ScenePrompt, ANALYSIS_INSTRUCTION,
};

/// Description used when analysis succeeds but returns no text.
pub const FALLBACK_DESCRIPTION: &str = "Premium Wood Project";

pub const DEFAULT_SOUL_PERCENT: u8 = 40;

/// Inputs for one scene generation.
#[derive(Debug, Clone, Copy)]
pub struct SceneRequest<'a> {
    /// Source image on the master pass, master image on derivatives
    pub reference: &'a ImagePayload,
    pub description: &'a str,
    pub kind: SceneKind,
    pub context: &'a str,
    pub environment: Environment,
    pub pass: ScenePass,
    pub refinement_note: Option<&'a str>,
}

impl<'a> SceneRequest<'a> {
    pub fn prompt(&self) -> ScenePrompt<'a> {
        ScenePrompt {
            description: self.description,
            kind: self.kind,
            context: self.context,
            environment: self.environment,
            pass: self.pass,
            refinement_note: self.refinement_note,
        }
    }
}

/// High-level client over a generation capability.
#[derive(Clone)]
pub struct GenerationClient {
    capability: Arc<dyn GenerationCapability>,
    soul_percent: u8,
}

impl GenerationClient {
    pub fn new(capability: Arc<dyn GenerationCapability>) -> Self {
        Self {
            capability,
            soul_percent: DEFAULT_SOUL_PERCENT,
        }
    }

    /// Share of the source structure kept by the master redesign.
    pub fn with_soul_percent(mut self, soul_percent: u8) -> Self {
        self.soul_percent = soul_percent;
        self
    }

    pub fn soul_percent(&self) -> u8 {
        self.soul_percent
    }

    pub fn provider_name(&self) -> &str {
        self.capability.provider_name()
    }

    /// Describe the product in the image.
    ///
    /// An empty textual answer is not an error; the fallback description is
    /// returned instead.
    pub async fn analyze(&self, image: &ImagePayload) -> Result<String, GenerationError> {
        let response = self
            .capability
            .invoke(CapabilityRequest::Analyze {
                image: image.clone(),
                instruction: ANALYSIS_INSTRUCTION.to_string(),
            })
            .await?;

        match response.text.map(|t| t.trim().to_string()) {
            Some(text) if !text.is_empty() => Ok(text),
            _ => {
                debug!("Analysis returned no text; using fallback description");
                Ok(FALLBACK_DESCRIPTION.to_string())
            }
        }
    }

    /// Generate one image from a reference image.
    pub async fn generate_scene(
        &self,
        request: &SceneRequest<'_>,
    ) -> Result<ImagePayload, GenerationError> {
        let instruction = compose_scene_instruction(&request.prompt(), self.soul_percent);
        debug!(
            kind = %request.kind,
            pass = ?request.pass,
            reference = %request.reference.digest(),
            "Requesting scene generation"
        );
        let response = self
            .capability
            .invoke(CapabilityRequest::GenerateScene {
                reference: request.reference.clone(),
                instruction,
            })
            .await?;
        response.image.ok_or(GenerationError::NoImagePayload)
    }

    /// Produce listing metadata; any failure degrades to `None`.
    pub async fn generate_metadata(&self, description: &str) -> Option<ListingMetadata> {
        let response = self
            .capability
            .invoke(CapabilityRequest::GenerateMetadata {
                instruction: metadata_instruction(description),
                schema: metadata_schema(),
            })
            .await;

        let text = match response {
            Ok(response) => response.text,
            Err(err) => {
                warn!(error = %err, "Metadata generation failed");
                return None;
            }
        };

        let Some(text) = text else {
            warn!("Metadata generation returned no text");
            return None;
        };

        match parse_metadata(&text) {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                warn!(error = %err, "Metadata response did not match the listing schema");
                None
            }
        }
    }
}

/// Parse metadata JSON, tolerating a fenced code block around it.
fn parse_metadata(text: &str) -> Result<ListingMetadata, serde_json::Error> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim())
}
