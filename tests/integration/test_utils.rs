//! Shared fakes for integration tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use woodvision::catalog::{MASTER_INSTRUCTION, SCENE_CATALOG};
use woodvision::config::StudioConfig;
use woodvision::gateway::InMemoryGateway;
use woodvision::generation::GenerationClient;
use woodvision::pipeline::{PipelineOrchestrator, RetryPolicy, RunState, RunView};
use woodvision::provider::{CapabilityRequest, CapabilityResponse, GenerationCapability};
use woodvision::types::{ArtifactId, ImagePayload};
use woodvision::GenerationError;

pub const LISTING_JSON: &str = r#"{"title":"Handcrafted Oak Pergola","description":"🌲 MATERIAL DETAILS: oak","tags":"pergola,oak,garden","materials":"White oak"}"#;

/// One captured capability invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub capability: &'static str,
    pub instruction: String,
    pub image_digest: Option<String>,
}

/// What a watcher of the run could see when a scene call went out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedView {
    pub state: RunState,
    pub artifacts: Vec<ArtifactId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Fails every attempt with a permanent error
    Always,
    /// Fails the first attempt with a transient error
    Once,
}

#[derive(Default)]
struct Script {
    fail_analysis: bool,
    fail_master: bool,
    fail_metadata: bool,
    analysis_text: Option<String>,
    scene_failures: HashMap<usize, Failure>,
    scene_attempts: HashMap<usize, usize>,
    images_issued: u8,
}

/// Deterministic generation capability that records every request.
///
/// Scene failures are keyed by 1-based catalog position and matched on the
/// task's context text inside the instruction.
#[derive(Default)]
pub struct ScriptedCapability {
    script: Mutex<Script>,
    calls: Mutex<Vec<RecordedCall>>,
    watcher: Option<watch::Receiver<RunView>>,
    observed: Mutex<Vec<ObservedView>>,
}

impl ScriptedCapability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_analysis(self) -> Self {
        self.script.lock().fail_analysis = true;
        self
    }

    pub fn failing_master(self) -> Self {
        self.script.lock().fail_master = true;
        self
    }

    pub fn failing_metadata(self) -> Self {
        self.script.lock().fail_metadata = true;
        self
    }

    pub fn with_analysis_text(self, text: &str) -> Self {
        self.script.lock().analysis_text = Some(text.to_string());
        self
    }

    /// Snapshot the published run view on every scene call.
    pub fn watching(mut self, views: watch::Receiver<RunView>) -> Self {
        self.watcher = Some(views);
        self
    }

    pub fn observed_views(&self) -> Vec<ObservedView> {
        self.observed.lock().clone()
    }

    pub fn failing_scene(self, position: usize, failure: Failure) -> Self {
        self.script.lock().scene_failures.insert(position, failure);
        self
    }

    /// Start failing a catalog position on every later call.
    pub fn break_scene(&self, position: usize) {
        self.script
            .lock()
            .scene_failures
            .insert(position, Failure::Always);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, capability: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.capability == capability)
            .collect()
    }

    fn scene_position(instruction: &str) -> Option<usize> {
        SCENE_CATALOG
            .iter()
            .position(|task| instruction.contains(task.instruction))
            .map(|index| index + 1)
    }
}

#[async_trait]
impl GenerationCapability for ScriptedCapability {
    async fn invoke(
        &self,
        request: CapabilityRequest,
    ) -> Result<CapabilityResponse, GenerationError> {
        self.calls.lock().push(RecordedCall {
            capability: request.capability_name(),
            instruction: request.instruction().to_string(),
            image_digest: request.image().map(ImagePayload::digest),
        });

        if let (CapabilityRequest::GenerateScene { .. }, Some(watcher)) = (&request, &self.watcher) {
            let view = watcher.borrow();
            self.observed.lock().push(ObservedView {
                state: view.state,
                artifacts: view.artifacts.iter().map(|a| a.id).collect(),
            });
        }

        let mut script = self.script.lock();
        match &request {
            CapabilityRequest::Analyze { .. } => {
                if script.fail_analysis {
                    return Err(GenerationError::RequestFailed("analysis offline".into()));
                }
                Ok(CapabilityResponse::text(
                    script
                        .analysis_text
                        .clone()
                        .unwrap_or_else(|| "Solid oak garden pergola with mortise joints".into()),
                ))
            }
            CapabilityRequest::GenerateScene { instruction, .. } => {
                if instruction.contains(MASTER_INSTRUCTION) && script.fail_master {
                    return Err(GenerationError::NoImagePayload);
                }
                if let Some(position) = Self::scene_position(instruction) {
                    let attempt = {
                        let count = script.scene_attempts.entry(position).or_insert(0);
                        *count += 1;
                        *count
                    };
                    match script.scene_failures.get(&position) {
                        Some(Failure::Always) => {
                            return Err(GenerationError::AuthFailed("scene refused".into()))
                        }
                        Some(Failure::Once) if attempt == 1 => {
                            return Err(GenerationError::RateLimit("slow down".into()))
                        }
                        _ => {}
                    }
                }
                script.images_issued = script.images_issued.wrapping_add(1);
                let image = ImagePayload::new("image/png", vec![0x89, script.images_issued])
                    .map_err(|e| GenerationError::InvalidImage(e.to_string()))?;
                Ok(CapabilityResponse::image(image))
            }
            CapabilityRequest::GenerateMetadata { .. } => {
                if script.fail_metadata {
                    return Err(GenerationError::RateLimit("quota".into()));
                }
                Ok(CapabilityResponse::text(LISTING_JSON))
            }
        }
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

pub fn source_image() -> ImagePayload {
    ImagePayload::new("image/jpeg", vec![0xff, 0xd8, 0xff, 0xe0, 0x01]).unwrap()
}

/// Orchestrator over the fake capability and gateway, without retry delay.
pub fn orchestrator(
    capability: Arc<ScriptedCapability>,
    gateway: Arc<InMemoryGateway>,
) -> PipelineOrchestrator {
    PipelineOrchestrator::new(GenerationClient::new(capability), gateway).with_retry_policy(
        RetryPolicy {
            max_retries: 1,
            delay: std::time::Duration::ZERO,
        },
    )
}

pub fn fast_config() -> StudioConfig {
    let mut config = StudioConfig::default();
    config.pipeline.retry_delay_ms = 0;
    config
}
