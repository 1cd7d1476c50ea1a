//! Gemini `generateContent` capability over HTTP.

use super::{build_http_client, map_http_error, map_status};
use super::{CapabilityRequest, CapabilityResponse, GenerationCapability};
use crate::config::GenerationSettings;
use crate::error::GenerationError;
use crate::types::ImagePayload;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Gemini generation capability
pub struct GeminiCapability {
    client: Client,
    settings: GenerationSettings,
    api_key: String,
}

impl GeminiCapability {
    pub fn new(settings: GenerationSettings, api_key: String) -> Result<Self, GenerationError> {
        let client = build_http_client(
            Duration::from_secs(settings.connect_timeout_secs),
            Duration::from_secs(settings.request_timeout_secs),
        )?;
        Ok(Self {
            client,
            settings,
            api_key,
        })
    }

    fn model_for(&self, request: &CapabilityRequest) -> &str {
        match request {
            CapabilityRequest::Analyze { .. } => &self.settings.analysis_model,
            CapabilityRequest::GenerateScene { .. } => &self.settings.image_model,
            CapabilityRequest::GenerateMetadata { .. } => &self.settings.metadata_model,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            model
        )
    }

    fn build_body(&self, request: CapabilityRequest) -> GenerateContentRequest {
        let (parts, generation_config) = match request {
            CapabilityRequest::Analyze { image, instruction } => {
                (vec![image_part(&image), text_part(instruction)], None)
            }
            CapabilityRequest::GenerateScene {
                reference,
                instruction,
            } => (
                vec![image_part(&reference), text_part(instruction)],
                Some(GenerationConfig {
                    image_config: Some(ImageConfig {
                        aspect_ratio: self.settings.aspect_ratio.clone(),
                    }),
                    ..Default::default()
                }),
            ),
            CapabilityRequest::GenerateMetadata {
                instruction,
                schema,
            } => (
                vec![text_part(instruction)],
                Some(GenerationConfig {
                    response_mime_type: Some("application/json".to_string()),
                    response_schema: Some(schema),
                    ..Default::default()
                }),
            ),
        };
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config,
        }
    }
}

fn image_part(image: &ImagePayload) -> Part {
    Part {
        text: None,
        inline_data: Some(InlineData {
            mime_type: image.mime_type().to_string(),
            data: image.to_base64(),
        }),
    }
}

fn text_part(text: String) -> Part {
    Part {
        text: Some(text),
        inline_data: None,
    }
}

fn collect_response(response: GenerateContentResponse) -> Result<CapabilityResponse, GenerationError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(GenerationError::InvalidResponse(format!(
            "No candidates in response: {}",
            reason
        )));
    };

    let mut text: Option<String> = None;
    let mut image: Option<ImagePayload> = None;
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(chunk) = part.text {
            text.get_or_insert_with(String::new).push_str(&chunk);
        }
        if image.is_none() {
            if let Some(inline) = part.inline_data {
                let decoded = ImagePayload::from_base64(inline.mime_type, &inline.data)
                    .map_err(|e| GenerationError::InvalidImage(e.to_string()))?;
                image = Some(decoded);
            }
        }
    }

    if text.is_none() && image.is_none() {
        debug!(
            finish_reason = ?candidate.finish_reason,
            "Gemini candidate carried no usable parts"
        );
    }
    Ok(CapabilityResponse { text, image })
}

#[async_trait]
impl GenerationCapability for GeminiCapability {
    async fn invoke(
        &self,
        request: CapabilityRequest,
    ) -> Result<CapabilityResponse, GenerationError> {
        let model = self.model_for(&request).to_string();
        let capability = request.capability_name();
        let url = self.endpoint(&model);
        let body = self.build_body(request);

        debug!(capability, model = %model, "Invoking Gemini generateContent");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let detail = serde_json::from_str::<ErrorEnvelope>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(map_status(status.as_u16(), &detail));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(format!("Failed to parse response: {}", e)))?;
        collect_response(parsed)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}
