//! Engine runs against the mock manager over HTTP, with the state document on disk.

mod common;

use std::time::Duration;

use common::{TestManager, tag};
use nsxt_mock::ManagerState;
use nsxt_provider::{
    Action, Configuration, DesiredState, Engine, ProviderError, ReconciliationResult,
    RetryPolicy, StateDocument, Value,
};
use serde_json::json;

fn two_services() -> Configuration {
    Configuration::new()
        .resource(
            "nsxt_ip_protocol_ns_service",
            "gre",
            json!({"display_name": "gre", "protocol": 47, "tag": tag("env", "lab")}),
        )
        .resource(
            "nsxt_icmp_type_ns_service",
            "ping",
            json!({"display_name": "ping", "protocol": "ICMPv4", "icmp_type": 8}),
        )
}

#[tokio::test]
async fn test_apply_persists_state_across_runs() {
    let manager = TestManager::spawn().await;
    let provider = manager.provider();
    let engine = Engine::new(&provider);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("terraform.tfstate.json");

    let mut state = StateDocument::load(&path).await.unwrap();
    let applied = engine.apply(&two_services(), &mut state).await.unwrap();
    assert_eq!(applied.len(), 2);
    assert!(
        applied
            .iter()
            .all(|a| matches!(a.result, ReconciliationResult::Created(_)))
    );
    state.save(&path).await.unwrap();

    let mut reloaded = StateDocument::load(&path).await.unwrap();
    assert_eq!(reloaded.serial, 1);
    assert_eq!(reloaded.lineage, state.lineage);

    let plan = engine.plan(&two_services(), &reloaded).await.unwrap();
    assert!(plan.is_empty(), "unexpected plan {:?}", plan);

    let applied = engine.apply(&two_services(), &mut reloaded).await.unwrap();
    assert!(
        applied
            .iter()
            .all(|a| a.result == ReconciliationResult::NoChange)
    );
    assert_eq!(reloaded.serial, 1);
    assert_eq!(manager.service_count().await, 2);

    engine.destroy(&mut reloaded).await.unwrap();
    assert!(reloaded.resources.is_empty());
    assert_eq!(manager.service_count().await, 0);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_removed_block_is_destroyed() {
    let manager = TestManager::spawn().await;
    let provider = manager.provider();
    let engine = Engine::new(&provider);
    let mut state = StateDocument::new();

    engine.apply(&two_services(), &mut state).await.unwrap();

    let only_gre = Configuration::new().resource(
        "nsxt_ip_protocol_ns_service",
        "gre",
        json!({"display_name": "gre", "protocol": 47, "tag": tag("env", "lab")}),
    );
    let plan = engine.plan(&only_gre, &state).await.unwrap();
    assert_eq!(plan.count(Action::Delete), 1);
    assert_eq!(plan.count(Action::NoOp), 1);

    engine.apply(&only_gre, &mut state).await.unwrap();
    assert_eq!(state.addresses(), vec!["nsxt_ip_protocol_ns_service.gre"]);
    assert_eq!(manager.service_count().await, 1);

    engine.destroy(&mut state).await.unwrap();
    manager.shutdown().await;
}

#[tokio::test]
async fn test_refresh_drops_objects_deleted_out_of_band() {
    let manager = TestManager::spawn().await;
    let provider = manager.provider();
    let engine = Engine::new(&provider);
    let mut state = StateDocument::new();

    engine.apply(&two_services(), &mut state).await.unwrap();
    let ping = state.get("nsxt_icmp_type_ns_service.ping").unwrap().id.clone();
    manager.state.write().await.delete_ns_service(&ping).unwrap();

    engine.refresh(&mut state).await.unwrap();
    assert!(state.get("nsxt_icmp_type_ns_service.ping").is_none());
    assert!(state.get("nsxt_ip_protocol_ns_service.gre").is_some());

    // The next apply recreates it.
    let plan = engine.plan(&two_services(), &state).await.unwrap();
    assert_eq!(plan.count(Action::Create), 1);

    engine.destroy(&mut state).await.unwrap();
    manager.shutdown().await;
}

#[tokio::test]
async fn test_import_then_plan_is_empty() {
    let manager = TestManager::spawn().await;
    let provider = manager.provider();
    let engine = Engine::new(&provider);

    let mut seeded = StateDocument::new();
    engine.apply(&two_services(), &mut seeded).await.unwrap();
    let gre = seeded.get("nsxt_ip_protocol_ns_service.gre").unwrap().id.clone();

    let mut state = StateDocument::new();
    let desired = engine
        .import(&mut state, "nsxt_ip_protocol_ns_service.gre", &gre)
        .await
        .unwrap();
    assert_eq!(desired.to_json()["protocol"], 47);

    let config = Configuration::new().resource(
        "nsxt_ip_protocol_ns_service",
        "gre",
        json!({"display_name": "gre", "protocol": 47, "tag": tag("env", "lab")}),
    );
    let plan = engine.plan(&config, &state).await.unwrap();
    assert!(plan.is_empty(), "unexpected plan {:?}", plan);

    let err = engine
        .import(&mut state, "nsxt_ip_protocol_ns_service.gre", &gre)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Config(_)), "got {:?}", err);

    engine.destroy(&mut seeded).await.unwrap();
    manager.shutdown().await;
}

#[tokio::test]
async fn test_consistency_wait_over_http() {
    let manager = TestManager::spawn_with_state(ManagerState::with_visibility_lag(2)).await;
    let provider = manager.provider_with_retry(RetryPolicy::exponential(
        5,
        Duration::from_millis(1),
        Duration::from_millis(5),
    ));
    let engine = Engine::new(&provider);
    let mut state = StateDocument::new();

    let applied = engine.apply(&two_services(), &mut state).await.unwrap();
    assert_eq!(applied.len(), 2);
    assert_eq!(state.resources.len(), 2);

    engine.destroy(&mut state).await.unwrap();
    assert_eq!(manager.service_count().await, 0);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_lagging_manager_without_retry_fails() {
    let manager = TestManager::spawn_with_state(ManagerState::with_visibility_lag(2)).await;
    let provider = manager.provider_with_retry(RetryPolicy::none());
    let reconciler = provider.reconciler();
    let adapter = provider.resource("nsxt_igmp_type_ns_service").unwrap();

    let desired = DesiredState::new().with("display_name", Value::String("igmp".to_string()));
    let id = reconciler.create(adapter, &desired).await.unwrap().id;

    let err = reconciler.read(adapter, &id).await.unwrap_err();
    assert!(err.is_not_found(), "got {:?}", err);

    manager.shutdown().await;
}
