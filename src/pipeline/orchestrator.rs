//! Run execution.

use super::retry::RetryPolicy;
use super::run::{Run, RunStep, RunView, StepOutcome};
use super::state::{AbortReason, RunState};
use crate::catalog::{scene_tasks, SceneTask, MASTER_INSTRUCTION, MASTER_LABEL};
use crate::config::PipelineSettings;
use crate::error::{ApiError, GenerationError, PipelineError};
use crate::gateway::{PersistenceGateway, RunRecord};
use crate::generation::{GenerationClient, ScenePass, SceneRequest};
use crate::progress::{
    new_session_id, ArtifactEventData, ProgressRuntime, RunStartedData, RunSummaryData,
    StateChangedData, StepFailedData,
};
use crate::types::{ArtifactId, Environment, GeneratedArtifact, ImagePayload, SceneKind};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Start request for one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub username: String,
    pub source_image: ImagePayload,
    pub environment: Environment,
    /// Optional SKU label, editable after persistence
    pub sku: Option<String>,
}

pub struct PipelineOrchestrator {
    client: GenerationClient,
    gateway: Arc<dyn PersistenceGateway>,
    progress: ProgressRuntime,
    retry: RetryPolicy,
    fallback_title: String,
}

impl PipelineOrchestrator {
    pub fn new(client: GenerationClient, gateway: Arc<dyn PersistenceGateway>) -> Self {
        let settings = PipelineSettings::default();
        Self {
            client,
            gateway,
            progress: ProgressRuntime::new(),
            retry: RetryPolicy::from_settings(&settings),
            fallback_title: settings.fallback_title,
        }
    }

    /// Apply soul percent, retry policy and fallback title from settings.
    pub fn with_settings(mut self, settings: &PipelineSettings) -> Self {
        self.client = self.client.with_soul_percent(settings.soul_percent);
        self.retry = RetryPolicy::from_settings(settings);
        self.fallback_title = settings.fallback_title.clone();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress(mut self, progress: ProgressRuntime) -> Self {
        self.progress = progress;
        self
    }

    pub fn progress(&self) -> &ProgressRuntime {
        &self.progress
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// Execute one run to a terminal state.
    ///
    /// An aborted run is still returned as `Ok`; inspect `Run::state` and
    /// `Run::error`. `Err` means the request itself was rejected. When
    /// `updates` is given, a fresh `RunView` is published after every change.
    pub async fn execute(
        &self,
        request: RunRequest,
        updates: Option<&watch::Sender<RunView>>,
    ) -> Result<Run, ApiError> {
        if request.source_image.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Source image must not be empty".to_string(),
            ));
        }

        let run_id = new_session_id();
        let source = request.source_image.clone();
        let environment = request.environment;
        let mut run = Run::new(
            run_id.clone(),
            request.username,
            request.source_image,
            environment,
            request.sku,
        );

        info!(run_id = %run_id, environment = %environment, "Starting generation run");
        self.emit(
            &run_id,
            "run_started",
            &RunStartedData {
                username: run.username().to_string(),
                environment: environment.to_string(),
                source_digest: source.digest(),
                provider_name: self.client.provider_name().to_string(),
            },
        );
        self.publish(&run, updates);

        // Analysis
        self.advance(&mut run, RunState::Analyzing, updates)?;
        let description = match self.client.analyze(&source).await {
            Ok(description) => description,
            Err(err) => {
                return self.abort(
                    run,
                    RunStep::Analysis,
                    AbortReason::AnalysisFailed,
                    PipelineError::AnalysisFailed(err),
                    updates,
                );
            }
        };
        run.set_description(description.clone());
        run.record_step(RunStep::Analysis, StepOutcome::Succeeded { attempts: 1 });
        self.progress.emit_event_best_effort(
            &run_id,
            "analysis_completed",
            json!({ "description_len": description.len() }),
        );

        // Master design, generated from the source image
        self.advance(&mut run, RunState::MasterGenerating, updates)?;
        let master_request = SceneRequest {
            reference: &source,
            description: &description,
            kind: SceneKind::Wide,
            context: MASTER_INSTRUCTION,
            environment,
            pass: ScenePass::Master,
            refinement_note: None,
        };
        let master_image = match self.client.generate_scene(&master_request).await {
            Ok(image) => image,
            Err(err) => {
                return self.abort(
                    run,
                    RunStep::Master,
                    AbortReason::MasterGenerationFailed,
                    PipelineError::MasterGenerationFailed(err),
                    updates,
                );
            }
        };
        let master = GeneratedArtifact {
            id: ArtifactId::Master,
            image: master_image.clone(),
            kind: SceneKind::Wide,
            label: MASTER_LABEL.to_string(),
            context: MASTER_INSTRUCTION.to_string(),
            refinement_note: None,
        };
        self.append(&mut run, master, RunStep::Master, 1, updates);

        // Fan-out over the catalog, always from the master image
        self.advance(&mut run, RunState::FanOutGenerating, updates)?;
        for (id, task) in scene_tasks() {
            let ArtifactId::Scene(index) = id else {
                continue;
            };
            match self
                .generate_with_retry(&run_id, index, task, &master_image, &description, environment)
                .await
            {
                Ok((image, attempts)) => {
                    let artifact = GeneratedArtifact {
                        id,
                        image,
                        kind: task.kind,
                        label: task.label.to_string(),
                        context: task.instruction.to_string(),
                        refinement_note: None,
                    };
                    self.append(&mut run, artifact, RunStep::Scene(index), attempts, updates);
                }
                Err((failure, attempts)) => {
                    warn!(
                        run_id = %run_id,
                        index,
                        kind = %task.kind,
                        attempts,
                        error = %failure,
                        "Scene generation failed; continuing with next scene"
                    );
                    self.emit(
                        &run_id,
                        "scene_failed",
                        &StepFailedData {
                            artifact: id.to_string(),
                            error: failure.to_string(),
                            attempt: Some(attempts),
                        },
                    );
                    run.record_step(
                        RunStep::Scene(index),
                        StepOutcome::Failed {
                            attempts,
                            error: PipelineError::FanOutStepFailed {
                                index,
                                attempts,
                                source: failure,
                            },
                        },
                    );
                }
            }
        }

        // Listing metadata
        self.advance(&mut run, RunState::MetadataGenerating, updates)?;
        let metadata = self.client.generate_metadata(&description).await;
        match &metadata {
            Some(_) => {
                run.record_step(RunStep::Metadata, StepOutcome::Succeeded { attempts: 1 });
            }
            None => {
                warn!(run_id = %run_id, "Listing metadata unavailable; placeholders will be stored");
                self.progress
                    .emit_event_best_effort(&run_id, "metadata_missing", json!({}));
                run.record_step(
                    RunStep::Metadata,
                    StepOutcome::Failed {
                        attempts: 1,
                        error: PipelineError::MetadataFailed,
                    },
                );
            }
        }
        run.set_metadata(metadata);

        // Persistence
        self.advance(&mut run, RunState::Persisting, updates)?;
        self.persist(&mut run).await;

        self.advance(&mut run, RunState::Complete, updates)?;
        info!(
            run_id = %run_id,
            artifacts = run.artifacts().len(),
            failed_scenes = run.failed_scenes().len(),
            record = ?run.record_handle(),
            "Generation run complete"
        );
        self.emit(
            &run_id,
            "run_completed",
            &RunSummaryData {
                state: run.state().to_string(),
                artifacts: run.artifacts().len(),
                failed_scenes: run.failed_scenes().len(),
                record: run.record_handle().map(|h| h.0),
                error: None,
            },
        );
        Ok(run)
    }

    async fn generate_with_retry(
        &self,
        run_id: &str,
        index: usize,
        task: &SceneTask,
        master: &ImagePayload,
        description: &str,
        environment: Environment,
    ) -> Result<(ImagePayload, usize), (GenerationError, usize)> {
        let request = SceneRequest {
            reference: master,
            description,
            kind: task.kind,
            context: task.instruction,
            environment,
            pass: ScenePass::Derivative,
            refinement_note: None,
        };

        let mut attempt = 1;
        loop {
            match self.client.generate_scene(&request).await {
                Ok(image) => return Ok((image, attempt)),
                Err(err) if self.retry.should_retry(attempt, &err) => {
                    debug!(run_id, index, attempt, error = %err, "Retrying scene generation");
                    self.emit(
                        run_id,
                        "scene_retrying",
                        &StepFailedData {
                            artifact: ArtifactId::Scene(index).to_string(),
                            error: err.to_string(),
                            attempt: Some(attempt),
                        },
                    );
                    if !self.retry.delay.is_zero() {
                        sleep(self.retry.delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => return Err((err, attempt)),
            }
        }
    }

    async fn persist(&self, run: &mut Run) {
        let description = run.description().unwrap_or_default().to_string();
        let record = RunRecord::new(
            run.username(),
            run.source_image(),
            &description,
            run.artifacts(),
            run.sku(),
            run.metadata(),
            &self.fallback_title,
        );

        match self.gateway.save_run(&record).await {
            Ok(handle) => {
                if handle.is_none() {
                    warn!(run_id = %run.id(), "Gateway stored the run without returning a record handle");
                }
                run.set_record_handle(handle);
                run.record_step(RunStep::Persistence, StepOutcome::Succeeded { attempts: 1 });
                self.progress.emit_event_best_effort(
                    run.id(),
                    "run_persisted",
                    json!({ "record": handle.map(|h| h.0), "gateway": self.gateway.gateway_name() }),
                );
            }
            Err(err) => {
                warn!(run_id = %run.id(), error = %err, "Run could not be persisted");
                self.progress.emit_event_best_effort(
                    run.id(),
                    "persistence_failed",
                    json!({ "error": err.to_string() }),
                );
                run.record_step(
                    RunStep::Persistence,
                    StepOutcome::Failed {
                        attempts: 1,
                        error: PipelineError::PersistenceFailed(err),
                    },
                );
            }
        }
    }

    fn append(
        &self,
        run: &mut Run,
        artifact: GeneratedArtifact,
        step: RunStep,
        attempts: usize,
        updates: Option<&watch::Sender<RunView>>,
    ) {
        self.emit(
            run.id(),
            "artifact_appended",
            &ArtifactEventData {
                artifact: artifact.id.to_string(),
                kind: artifact.kind.to_string(),
                label: artifact.label.clone(),
                digest: artifact.image.digest(),
                refinement_note: None,
            },
        );
        debug!(run_id = %run.id(), artifact = %artifact.id, attempts, "Artifact appended");
        run.push_artifact(artifact);
        run.record_step(step, StepOutcome::Succeeded { attempts });
        self.publish(run, updates);
    }

    fn advance(
        &self,
        run: &mut Run,
        next: RunState,
        updates: Option<&watch::Sender<RunView>>,
    ) -> Result<(), ApiError> {
        let previous = run.transition(next)?;
        info!(run_id = %run.id(), from = %previous, to = %next, "Run state changed");
        self.emit(
            run.id(),
            "state_changed",
            &StateChangedData {
                from: previous.to_string(),
                to: next.to_string(),
            },
        );
        self.publish(run, updates);
        Ok(())
    }

    fn abort(
        &self,
        mut run: Run,
        step: RunStep,
        reason: AbortReason,
        failure: PipelineError,
        updates: Option<&watch::Sender<RunView>>,
    ) -> Result<Run, ApiError> {
        error!(run_id = %run.id(), reason = reason.as_str(), error = %failure, "Generation run aborted");
        run.record_step(
            step,
            StepOutcome::Failed {
                attempts: 1,
                error: failure.clone(),
            },
        );
        run.set_error(failure.clone());
        self.advance(&mut run, RunState::Aborted(reason), updates)?;
        self.emit(
            run.id(),
            "run_aborted",
            &RunSummaryData {
                state: run.state().to_string(),
                artifacts: run.artifacts().len(),
                failed_scenes: 0,
                record: None,
                error: Some(failure.to_string()),
            },
        );
        Ok(run)
    }

    fn publish(&self, run: &Run, updates: Option<&watch::Sender<RunView>>) {
        if let Some(sender) = updates {
            sender.send_replace(run.view());
        }
    }

    fn emit<T: Serialize>(&self, run_id: &str, event_type: &str, data: &T) {
        match serde_json::to_value(data) {
            Ok(value) => self.progress.emit_event_best_effort(run_id, event_type, value),
            Err(err) => warn!(run_id, event_type, error = %err, "Failed to encode progress event"),
        }
    }
}
