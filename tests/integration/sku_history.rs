use super::test_utils::{fast_config, source_image, ScriptedCapability};
use std::sync::Arc;
use woodvision::gateway::{InMemoryGateway, PersistenceGateway};
use woodvision::types::{Environment, RecordHandle};
use woodvision::{ApiError, Studio};

fn studio(gateway: Arc<InMemoryGateway>) -> Studio {
    Studio::new(fast_config(), gateway).with_capability(Arc::new(ScriptedCapability::new()))
}

fn gateway() -> Arc<InMemoryGateway> {
    Arc::new(
        InMemoryGateway::new()
            .with_admin("admin", "root")
            .with_capability_keys(["key-a", "key-b"]),
    )
}

#[tokio::test]
async fn sku_correction_shows_up_in_history() {
    let gateway = gateway();
    let studio = studio(gateway.clone());
    let mut session = studio.login("admin", "root").await.unwrap();

    let run = session
        .start_run(
            source_image(),
            Environment::Outdoor,
            Some("WOOD-77".to_string()),
            None,
        )
        .await
        .unwrap();
    let handle = run.record_handle().unwrap();
    assert_eq!(session.history()[0].sku, "WOOD-77");

    session.update_sku("WOOD-78").await.unwrap();
    assert_eq!(session.current_run().unwrap().sku(), Some("WOOD-78"));

    let history = gateway.fetch_history("admin").await.unwrap();
    let record = history.iter().find(|item| item.handle == handle).unwrap();
    assert_eq!(record.sku, "WOOD-78");
    assert_eq!(session.history()[0].sku, "WOOD-78");
}

#[tokio::test]
async fn history_sku_update_targets_existing_records_only() {
    let gateway = gateway();
    let studio = studio(gateway.clone());
    let mut session = studio.login("admin", "root").await.unwrap();
    session
        .start_run(source_image(), Environment::Indoor, Some("OAK-1".into()), None)
        .await
        .unwrap();
    session
        .start_run(source_image(), Environment::Indoor, Some("OAK-2".into()), None)
        .await
        .unwrap();

    session
        .update_history_sku(RecordHandle(2), "OAK-1B")
        .await
        .unwrap();
    let history = gateway.fetch_history("admin").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sku, "OAK-2");
    assert_eq!(history[1].sku, "OAK-1B");

    assert!(matches!(
        session.update_history_sku(RecordHandle(40), "X").await,
        Err(ApiError::RecordNotFound(RecordHandle(40)))
    ));
}

#[tokio::test]
async fn history_search_is_case_insensitive() {
    let gateway = gateway();
    let studio = studio(gateway);
    let mut session = studio.login("admin", "root").await.unwrap();
    for sku in ["WOOD-77", "wood-12", "PINE-3"] {
        session
            .start_run(source_image(), Environment::Outdoor, Some(sku.into()), None)
            .await
            .unwrap();
    }

    let hits: Vec<&str> = session
        .search_history("Wood")
        .into_iter()
        .map(|item| item.sku.as_str())
        .collect();
    assert_eq!(hits, vec!["wood-12", "WOOD-77"]);
    assert_eq!(session.search_history("").len(), 3);
}

#[tokio::test]
async fn users_only_see_their_own_history() {
    let gateway = gateway();
    let studio = studio(gateway.clone());
    studio.register("carol", "pw").await.unwrap();
    assert!(matches!(
        studio.login("carol", "pw").await,
        Err(ApiError::PendingApproval(_))
    ));
    assert!(gateway.approve_user("carol"));

    let mut admin = studio.login("admin", "root").await.unwrap();
    admin
        .start_run(source_image(), Environment::Outdoor, Some("ADM-1".into()), None)
        .await
        .unwrap();

    let mut carol = studio.login("carol", "pw").await.unwrap();
    carol
        .start_run(source_image(), Environment::Outdoor, Some("CAR-1".into()), None)
        .await
        .unwrap();

    let carol_skus: Vec<String> = carol
        .load_history()
        .await
        .unwrap()
        .iter()
        .map(|i| i.sku.clone())
        .collect();
    assert_eq!(carol_skus, vec!["CAR-1".to_string()]);
    assert_eq!(admin.load_history().await.unwrap().len(), 2);
}

#[tokio::test]
async fn unpersisted_run_cannot_change_sku() {
    let gateway = gateway();
    let studio = studio(gateway.clone());
    let mut session = studio.login("admin", "root").await.unwrap();
    gateway.set_offline(true);
    let run = session
        .start_run(source_image(), Environment::Outdoor, Some("WOOD-1".into()), None)
        .await
        .unwrap();
    assert!(run.is_complete());
    assert!(run.record_handle().is_none());

    assert!(matches!(
        session.update_sku("WOOD-2").await,
        Err(ApiError::NotPersisted)
    ));
}
