//! Run aggregate and its observable view.

use super::state::{validate_transition, IllegalTransition, RunState};
use crate::error::{ApiError, PipelineError};
use crate::types::{
    ArtifactId, Environment, GeneratedArtifact, ImagePayload, ListingMetadata, RecordHandle,
};

/// A pipeline step whose outcome is recorded on the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStep {
    Analysis,
    Master,
    Scene(usize),
    Metadata,
    Persistence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded { attempts: usize },
    Failed { attempts: usize, error: PipelineError },
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: RunStep,
    pub outcome: StepOutcome,
}

/// One invocation of the pipeline and everything it produced.
#[derive(Debug, Clone)]
pub struct Run {
    id: String,
    username: String,
    source_image: ImagePayload,
    environment: Environment,
    description: Option<String>,
    artifacts: Vec<GeneratedArtifact>,
    metadata: Option<ListingMetadata>,
    sku: Option<String>,
    state: RunState,
    error: Option<PipelineError>,
    warnings: Vec<PipelineError>,
    steps: Vec<StepRecord>,
    record_handle: Option<RecordHandle>,
}

impl Run {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        source_image: ImagePayload,
        environment: Environment,
        sku: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            source_image,
            environment,
            description: None,
            artifacts: Vec::new(),
            metadata: None,
            sku: sku.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            state: RunState::Idle,
            error: None,
            warnings: Vec::new(),
            steps: Vec::new(),
            record_handle: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn source_image(&self) -> &ImagePayload {
        &self.source_image
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Result sequence: master first, then successful scenes in catalog order.
    pub fn artifacts(&self) -> &[GeneratedArtifact] {
        &self.artifacts
    }

    pub fn artifact(&self, id: ArtifactId) -> Option<&GeneratedArtifact> {
        self.artifacts.iter().find(|a| a.id == id)
    }

    pub fn master(&self) -> Option<&GeneratedArtifact> {
        self.artifacts.first().filter(|a| a.id.is_master())
    }

    pub fn metadata(&self) -> Option<&ListingMetadata> {
        self.metadata.as_ref()
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// The fatal error of an aborted run.
    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    /// Recovered failures, in the order they happened.
    pub fn warnings(&self) -> &[PipelineError] {
        &self.warnings
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn record_handle(&self) -> Option<RecordHandle> {
        self.record_handle
    }

    pub fn is_complete(&self) -> bool {
        self.state == RunState::Complete
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.state, RunState::Aborted(_))
    }

    /// Catalog positions whose generation failed.
    pub fn failed_scenes(&self) -> Vec<usize> {
        self.steps
            .iter()
            .filter_map(|record| match (record.step, &record.outcome) {
                (RunStep::Scene(index), StepOutcome::Failed { .. }) => Some(index),
                _ => None,
            })
            .collect()
    }

    pub fn view(&self) -> RunView {
        RunView {
            run_id: self.id.clone(),
            state: self.state,
            description: self.description.clone(),
            artifacts: self.artifacts.clone(),
            metadata: self.metadata.clone(),
        }
    }

    pub(crate) fn transition(&mut self, next: RunState) -> Result<RunState, IllegalTransition> {
        validate_transition(self.state, next)?;
        let previous = self.state;
        self.state = next;
        Ok(previous)
    }

    pub(crate) fn set_description(&mut self, description: String) {
        self.description = Some(description);
    }

    pub(crate) fn push_artifact(&mut self, artifact: GeneratedArtifact) {
        self.artifacts.push(artifact);
    }

    pub(crate) fn set_metadata(&mut self, metadata: Option<ListingMetadata>) {
        self.metadata = metadata;
    }

    pub(crate) fn set_record_handle(&mut self, handle: Option<RecordHandle>) {
        self.record_handle = handle;
    }

    pub(crate) fn set_error(&mut self, error: PipelineError) {
        self.error = Some(error);
    }

    pub(crate) fn record_step(&mut self, step: RunStep, outcome: StepOutcome) {
        if let StepOutcome::Failed { error, .. } = &outcome {
            if !error.is_fatal() {
                self.warnings.push(error.clone());
            }
        }
        self.steps.push(StepRecord { step, outcome });
    }

    /// Change the SKU label kept on the in-memory run.
    pub fn set_sku(&mut self, sku: impl Into<String>) {
        self.sku = Some(sku.into());
    }

    /// Swap one artifact's image in place, keeping its identity and position.
    pub fn replace_artifact_image(
        &mut self,
        id: ArtifactId,
        image: ImagePayload,
        note: Option<String>,
    ) -> Result<&GeneratedArtifact, ApiError> {
        let artifact = self
            .artifacts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(ApiError::ArtifactNotFound(id))?;
        artifact.image = image;
        artifact.refinement_note = note;
        Ok(&*artifact)
    }
}

/// Snapshot of a run published while it is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunView {
    pub run_id: String,
    pub state: RunState,
    pub description: Option<String>,
    pub artifacts: Vec<GeneratedArtifact>,
    pub metadata: Option<ListingMetadata>,
}

impl RunView {
    pub fn idle(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            state: RunState::Idle,
            description: None,
            artifacts: Vec::new(),
            metadata: None,
        }
    }
}
