//! Single-artifact refinement.
//!
//! Regenerates one artifact from its current image with the caller's note
//! appended, so repeated refinements accumulate. Nothing else in the run is
//! touched, and a failed refinement leaves the artifact as it was.

use crate::error::{ApiError, PipelineError};
use crate::generation::{GenerationClient, ScenePass, SceneRequest, FALLBACK_DESCRIPTION};
use crate::pipeline::Run;
use crate::progress::{ArtifactEventData, ProgressRuntime, StepFailedData};
use crate::types::{ArtifactId, GeneratedArtifact};
use tracing::{info, warn};

pub struct Refiner {
    client: GenerationClient,
    progress: ProgressRuntime,
}

impl Refiner {
    pub fn new(client: GenerationClient, progress: ProgressRuntime) -> Self {
        Self { client, progress }
    }

    /// Refine `id` within `run` and return the updated artifact.
    ///
    /// A blank note performs a plain regeneration with the original context.
    pub async fn refine(
        &self,
        run: &mut Run,
        id: ArtifactId,
        note: &str,
    ) -> Result<GeneratedArtifact, ApiError> {
        let current = run
            .artifact(id)
            .cloned()
            .ok_or(ApiError::ArtifactNotFound(id))?;
        let description = run.description().unwrap_or(FALLBACK_DESCRIPTION).to_string();
        let note = Some(note.trim()).filter(|n| !n.is_empty());

        let request = SceneRequest {
            reference: &current.image,
            description: &description,
            kind: current.kind,
            context: &current.context,
            environment: run.environment(),
            pass: ScenePass::Derivative,
            refinement_note: note,
        };

        match self.client.generate_scene(&request).await {
            Ok(image) => {
                let updated = run
                    .replace_artifact_image(id, image, note.map(str::to_string))?
                    .clone();
                info!(run_id = %run.id(), artifact = %id, "Artifact refined");
                self.emit(
                    run.id(),
                    "artifact_refined",
                    serde_json::to_value(ArtifactEventData {
                        artifact: id.to_string(),
                        kind: updated.kind.to_string(),
                        label: updated.label.clone(),
                        digest: updated.image.digest(),
                        refinement_note: updated.refinement_note.clone(),
                    }),
                );
                Ok(updated)
            }
            Err(source) => {
                warn!(run_id = %run.id(), artifact = %id, error = %source, "Refinement failed");
                self.emit(
                    run.id(),
                    "refinement_failed",
                    serde_json::to_value(StepFailedData {
                        artifact: id.to_string(),
                        error: source.to_string(),
                        attempt: None,
                    }),
                );
                Err(PipelineError::RefinementFailed {
                    artifact: id,
                    source,
                }
                .into())
            }
        }
    }

    fn emit(
        &self,
        run_id: &str,
        event_type: &str,
        data: Result<serde_json::Value, serde_json::Error>,
    ) {
        match data {
            Ok(value) => self.progress.emit_event_best_effort(run_id, event_type, value),
            Err(err) => warn!(run_id, event_type, error = %err, "Failed to encode progress event"),
        }
    }
}
