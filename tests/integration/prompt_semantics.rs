use super::test_utils::{orchestrator, source_image, ScriptedCapability};
use std::sync::Arc;
use woodvision::catalog::MASTER_INSTRUCTION;
use woodvision::config::PipelineSettings;
use woodvision::gateway::InMemoryGateway;
use woodvision::pipeline::RunRequest;
use woodvision::types::Environment;

async fn master_instruction(environment: Environment) -> (String, Vec<String>) {
    let capability = Arc::new(ScriptedCapability::new());
    let gateway = Arc::new(InMemoryGateway::new());
    orchestrator(capability.clone(), gateway)
        .execute(
            RunRequest {
                username: "alice".to_string(),
                source_image: source_image(),
                environment,
                sku: None,
            },
            None,
        )
        .await
        .unwrap();

    let scenes: Vec<String> = capability
        .calls_to("generate_scene")
        .into_iter()
        .map(|c| c.instruction)
        .collect();
    (scenes[0].clone(), scenes[1..].to_vec())
}

#[tokio::test]
async fn outdoor_master_encodes_daylight() {
    let (master, derivatives) = master_instruction(Environment::Outdoor).await;
    assert!(master.contains(MASTER_INSTRUCTION));
    assert!(master.contains("outdoor sunlight"));
    assert!(master.contains("daylight"));
    assert!(!master.contains("indoor"));
    assert!(derivatives.iter().all(|d| d.contains("daylight")));
}

#[tokio::test]
async fn indoor_master_encodes_ambient_light() {
    let (master, derivatives) = master_instruction(Environment::Indoor).await;
    assert!(master.contains("indoor ambient light"));
    assert!(!master.contains("daylight"));
    assert!(derivatives.iter().all(|d| d.contains("indoor ambient light")));
}

#[tokio::test]
async fn master_redesigns_while_derivatives_preserve() {
    let (master, derivatives) = master_instruction(Environment::Outdoor).await;
    assert!(master.contains("REDESIGN"));
    assert!(master.contains("Keep only 40%"));
    for derivative in &derivatives {
        assert!(derivative.contains("THIS EXACT"));
        assert!(!derivative.contains("REDESIGN"));
    }
}

#[tokio::test]
async fn soul_percent_comes_from_settings() {
    let capability = Arc::new(ScriptedCapability::new());
    let gateway = Arc::new(InMemoryGateway::new());
    let settings = PipelineSettings {
        soul_percent: 25,
        retry_delay_ms: 0,
        ..Default::default()
    };
    orchestrator(capability.clone(), gateway)
        .with_settings(&settings)
        .execute(
            RunRequest {
                username: "alice".to_string(),
                source_image: source_image(),
                environment: Environment::Indoor,
                sku: None,
            },
            None,
        )
        .await
        .unwrap();
    let master = &capability.calls_to("generate_scene")[0];
    assert!(master.instruction.contains("Keep only 25%"));
}

#[tokio::test]
async fn metadata_prompt_asks_for_thirteen_tags() {
    let capability = Arc::new(ScriptedCapability::new());
    let gateway = Arc::new(InMemoryGateway::new());
    let run = orchestrator(capability.clone(), gateway)
        .execute(
            RunRequest {
                username: "alice".to_string(),
                source_image: source_image(),
                environment: Environment::Outdoor,
                sku: None,
            },
            None,
        )
        .await
        .unwrap();
    let metadata_calls = capability.calls_to("generate_metadata");
    assert_eq!(metadata_calls.len(), 1);
    assert!(metadata_calls[0].instruction.contains("13 comma-separated tags"));
    assert!(metadata_calls[0].image_digest.is_none());
    assert_eq!(
        run.metadata().map(|m| m.title.as_str()),
        Some("Handcrafted Oak Pergola")
    );
}
