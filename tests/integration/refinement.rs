use super::test_utils::{fast_config, source_image, Failure, ScriptedCapability};
use std::sync::Arc;
use woodvision::gateway::InMemoryGateway;
use woodvision::types::{ArtifactId, Environment};
use woodvision::{ApiError, PipelineError, Studio};

async fn session_with_run(
    capability: Arc<ScriptedCapability>,
) -> woodvision::StudioSession {
    let gateway = Arc::new(
        InMemoryGateway::new()
            .with_admin("admin", "root")
            .with_capability_keys(["k"]),
    );
    let studio = Studio::new(fast_config(), gateway).with_capability(capability);
    let mut session = studio.login("admin", "root").await.unwrap();
    session
        .start_run(source_image(), Environment::Outdoor, None, None)
        .await
        .unwrap();
    session
}

#[tokio::test]
async fn refinement_replaces_only_its_target() {
    let capability = Arc::new(ScriptedCapability::new());
    let mut session = session_with_run(capability.clone()).await;
    let before = session.current_run().unwrap().artifacts().to_vec();

    let target = ArtifactId::Scene(3);
    let updated = session.refine(target, "Add warm evening lights").await.unwrap();

    let after = session.current_run().unwrap().artifacts().to_vec();
    assert_eq!(after.len(), before.len());
    for (old, new) in before.iter().zip(after.iter()) {
        assert_eq!(old.id, new.id);
        if old.id == target {
            assert_ne!(old.image, new.image);
            assert_eq!(new.refinement_note.as_deref(), Some("Add warm evening lights"));
        } else {
            assert_eq!(old.image.bytes(), new.image.bytes());
        }
    }
    assert_eq!(updated.id, target);
    assert_eq!(after[3], updated);

    // the reference is the artifact's own image and the note closes the instruction
    let last_call = capability.calls().pop().unwrap();
    let target_digest = before[3].image.digest();
    assert_eq!(last_call.image_digest.as_deref(), Some(target_digest.as_str()));
    assert!(last_call
        .instruction
        .ends_with("IMPORTANT ADJUSTMENT: Add warm evening lights"));
}

#[tokio::test]
async fn repeated_refinement_builds_on_the_previous_result() {
    let capability = Arc::new(ScriptedCapability::new());
    let mut session = session_with_run(capability.clone()).await;

    let first = session.refine(ArtifactId::Master, "taller").await.unwrap();
    session.refine(ArtifactId::Master, "darker").await.unwrap();

    let last_call = capability.calls().pop().unwrap();
    let first_digest = first.image.digest();
    assert_eq!(last_call.image_digest.as_deref(), Some(first_digest.as_str()));
}

#[tokio::test]
async fn failed_refinement_keeps_the_run_intact() {
    let capability = Arc::new(ScriptedCapability::new());
    let mut session = session_with_run(capability.clone()).await;
    let before = session.current_run().unwrap().artifacts().to_vec();
    assert_eq!(before.len(), 9);

    capability.break_scene(3);
    let err = session
        .refine(ArtifactId::Scene(3), "more rustic")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Pipeline(PipelineError::RefinementFailed {
            artifact: ArtifactId::Scene(3),
            ..
        })
    ));
    assert_eq!(session.current_run().unwrap().artifacts(), before.as_slice());

    let events: Vec<String> = session
        .progress()
        .all_events()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(events.last().map(String::as_str), Some("refinement_failed"));
}

#[tokio::test]
async fn refining_a_failed_scene_reports_missing_artifact() {
    let capability = Arc::new(ScriptedCapability::new().failing_scene(5, Failure::Always));
    let mut session = session_with_run(capability).await;
    let before = session.current_run().unwrap().artifacts().to_vec();

    assert!(matches!(
        session.refine(ArtifactId::Scene(5), "x").await,
        Err(ApiError::ArtifactNotFound(ArtifactId::Scene(5)))
    ));
    assert_eq!(session.current_run().unwrap().artifacts(), before.as_slice());
}

#[tokio::test]
async fn blank_note_regenerates_with_original_context() {
    let capability = Arc::new(ScriptedCapability::new());
    let mut session = session_with_run(capability.clone()).await;

    let updated = session.refine(ArtifactId::Scene(6), "  ").await.unwrap();
    assert!(updated.refinement_note.is_none());

    let last_call = capability.calls().pop().unwrap();
    assert!(last_call.instruction.contains(&updated.context));
    assert!(!last_call.instruction.contains("IMPORTANT ADJUSTMENT"));
}
