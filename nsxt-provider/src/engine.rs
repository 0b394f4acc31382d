//! Plan/apply driver over a configuration and a state document.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{info, warn};

use crate::configuration::{Configuration, parse_address};
use crate::error::{ProviderError, Result};
use crate::import::import_by_id;
use crate::model::{DesiredState, Diff, ReconciliationResult};
use crate::provider::{Provider, ResourceRegistry};
use crate::schema::validate;
use crate::tfstate::{ResourceState, StateDocument};

/// Planned action for one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NoOp,
    Create,
    Update,
    Replace,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::NoOp => "no-op",
            Action::Create => "create",
            Action::Update => "update",
            Action::Replace => "replace",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    pub address: String,
    pub action: Action,
    /// Tracked id, if any.
    pub id: Option<String>,
    pub changed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub changes: Vec<PlannedChange>,
}

impl Plan {
    /// True when every change is a no-op.
    pub fn is_empty(&self) -> bool {
        self.changes.iter().all(|c| c.action == Action::NoOp)
    }

    pub fn count(&self, action: Action) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }
}

/// Result of applying one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub address: String,
    pub result: ReconciliationResult,
}

/// A configured resource block that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedResource {
    pub resource_type: String,
    pub name: String,
    pub desired: DesiredState,
}

impl ValidatedResource {
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

/// Validate every resource block of `config` against its schema.
pub fn validate_configuration(
    registry: &ResourceRegistry,
    config: &Configuration,
) -> Result<Vec<ValidatedResource>> {
    config
        .resources
        .iter()
        .map(|block| {
            let adapter = registry.get(&block.resource_type)?;
            let raw = block.body.as_object().ok_or_else(|| {
                ProviderError::Config(format!(
                    "resource block {} must be an object",
                    block.address()
                ))
            })?;
            Ok(ValidatedResource {
                resource_type: block.resource_type.clone(),
                name: block.name.clone(),
                desired: validate(raw, adapter.spec())?,
            })
        })
        .collect()
}

pub struct Engine<'a> {
    provider: &'a Provider,
}

impl<'a> Engine<'a> {
    pub fn new(provider: &'a Provider) -> Self {
        Self { provider }
    }

    /// Validate every resource block without contacting the manager.
    pub fn validate(&self, config: &Configuration) -> Result<Vec<ValidatedResource>> {
        validate_configuration(self.provider.registry(), config)
    }

    /// Validate, refresh and diff; sends no mutations.
    pub async fn plan(&self, config: &Configuration, state: &StateDocument) -> Result<Plan> {
        let resources = self.validate(config)?;
        let mut changes = Vec::new();

        for resource in &resources {
            let address = resource.address();
            let adapter = self.provider.resource(&resource.resource_type)?;
            let prior = state.get(&address);

            let current = match prior {
                Some(prior) => self.provider.reconciler().refresh(adapter, &prior.id).await?,
                None => None,
            };

            let (action, changed) = match &current {
                None => (Action::Create, Vec::new()),
                Some(record) => {
                    let diff = Diff::compute(adapter.spec(), &resource.desired, record);
                    let changed = diff
                        .changed_attributes()
                        .into_iter()
                        .map(str::to_string)
                        .collect();
                    if diff.is_empty() {
                        (Action::NoOp, changed)
                    } else if diff.requires_replace() {
                        (Action::Replace, changed)
                    } else {
                        (Action::Update, changed)
                    }
                }
            };

            changes.push(PlannedChange {
                address,
                action,
                id: prior.map(|p| p.id.clone()),
                changed,
            });
        }

        for orphan in orphans(&resources, state) {
            changes.push(PlannedChange {
                address: orphan.address(),
                action: Action::Delete,
                id: Some(orphan.id.clone()),
                changed: Vec::new(),
            });
        }

        Ok(Plan { changes })
    }

    /// Converge the manager to `config`, recording progress in `state`.
    ///
    /// Validation failures abort before any remote call. On a remote failure
    /// `state` still reflects every step that completed, including objects
    /// created but not yet readable.
    pub async fn apply(
        &self,
        config: &Configuration,
        state: &mut StateDocument,
    ) -> Result<Vec<Applied>> {
        let resources = self.validate(config)?;
        let mut applied = Vec::new();
        let mut mutated = false;

        for resource in &resources {
            let address = resource.address();
            let adapter = self.provider.resource(&resource.resource_type)?;
            let prior_id = state.get(&address).map(|r| r.id.clone());

            let reconciled = self
                .provider
                .reconciler()
                .reconcile(adapter, &resource.desired, prior_id.as_deref())
                .await;
            let reconciled = match reconciled {
                Ok(reconciled) => reconciled,
                Err(e) => {
                    if let Some(record) = e.created_record() {
                        warn!(address = %address, id = %record.id, "Tracking object that is not yet visible");
                        state.upsert(ResourceState::from_record(
                            &resource.resource_type,
                            &resource.name,
                            record,
                            adapter.spec(),
                        ));
                        mutated = true;
                    }
                    if mutated {
                        state.bump_serial();
                    }
                    return Err(e);
                }
            };

            if let Some(record) = &reconciled.record {
                state.upsert(ResourceState::from_record(
                    &resource.resource_type,
                    &resource.name,
                    record,
                    adapter.spec(),
                ));
            }
            mutated |= reconciled.result != ReconciliationResult::NoChange;
            applied.push(Applied {
                address,
                result: reconciled.result,
            });
        }

        let orphans: Vec<ResourceState> = orphans(&resources, state).cloned().collect();
        for orphan in orphans {
            let result = self.destroy_tracked(&orphan).await;
            let result = match result {
                Ok(result) => result,
                Err(e) => {
                    if mutated {
                        state.bump_serial();
                    }
                    return Err(e);
                }
            };
            state.remove(&orphan.address());
            mutated = true;
            applied.push(Applied {
                address: orphan.address(),
                result,
            });
        }

        if mutated {
            state.bump_serial();
        }
        Ok(applied)
    }

    /// Re-read every tracked object, dropping the ones that vanished.
    pub async fn refresh(&self, state: &mut StateDocument) -> Result<Vec<Applied>> {
        let mut refreshed = Vec::new();
        let mut mutated = false;

        for tracked in state.resources.clone() {
            let address = tracked.address();
            let adapter = self.provider.resource(&tracked.resource_type)?;

            let result = match self.provider.reconciler().refresh(adapter, &tracked.id).await? {
                Some(record) => {
                    let current = ResourceState::from_record(
                        &tracked.resource_type,
                        &tracked.name,
                        &record,
                        adapter.spec(),
                    );
                    if current.attributes != tracked.attributes {
                        warn!(address = %address, id = %tracked.id, "Remote object drifted");
                        state.upsert(current);
                        mutated = true;
                        ReconciliationResult::Updated
                    } else {
                        ReconciliationResult::NoChange
                    }
                }
                None => {
                    warn!(address = %address, id = %tracked.id, "Remote object vanished, dropping from state");
                    state.remove(&address);
                    mutated = true;
                    ReconciliationResult::NotFound
                }
            };
            refreshed.push(Applied { address, result });
        }

        if mutated {
            state.bump_serial();
        }
        Ok(refreshed)
    }

    /// Start tracking an existing object under `address`.
    pub async fn import(
        &self,
        state: &mut StateDocument,
        address: &str,
        id: &str,
    ) -> Result<DesiredState> {
        let (resource_type, name) = parse_address(address)?;
        if state.get(address).is_some() {
            return Err(ProviderError::Config(format!(
                "{} is already managed; remove it from state first",
                address
            )));
        }

        let adapter = self.provider.resource(resource_type)?;
        let desired = import_by_id(self.provider.reconciler(), adapter, id).await?;
        state.upsert(ResourceState {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            id: id.to_string(),
            attributes: desired.to_json(),
            updated_at: chrono::Utc::now(),
        });
        state.bump_serial();
        info!(address = %address, id = %id, "Import complete");
        Ok(desired)
    }

    /// Destroy every tracked object.
    pub async fn destroy(&self, state: &mut StateDocument) -> Result<Vec<Applied>> {
        let mut destroyed = Vec::new();
        let tracked: Vec<ResourceState> = state.resources.iter().rev().cloned().collect();

        for resource in tracked {
            let result = match self.destroy_tracked(&resource).await {
                Ok(result) => result,
                Err(e) => {
                    if !destroyed.is_empty() {
                        state.bump_serial();
                    }
                    return Err(e);
                }
            };
            state.remove(&resource.address());
            destroyed.push(Applied {
                address: resource.address(),
                result,
            });
        }

        if !destroyed.is_empty() {
            state.bump_serial();
        }
        Ok(destroyed)
    }

    async fn destroy_tracked(&self, tracked: &ResourceState) -> Result<ReconciliationResult> {
        let adapter = self.provider.resource(&tracked.resource_type)?;
        self.provider
            .reconciler()
            .destroy(adapter, &tracked.id)
            .await
    }
}

fn orphans<'s>(
    resources: &[ValidatedResource],
    state: &'s StateDocument,
) -> impl Iterator<Item = &'s ResourceState> {
    let configured: BTreeSet<String> = resources.iter().map(|r| r.address()).collect();
    state
        .resources
        .iter()
        .filter(move |r| !configured.contains(&r.address()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use nsxt_mock::{InMemoryApi, ManagerState, Operation};
    use nsxt_sdk::ManagerApi;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::RwLock;

    fn provider() -> (Arc<InMemoryApi>, Provider) {
        let api = Arc::new(InMemoryApi::new());
        let provider = Provider::new(api.clone(), RetryPolicy::none());
        (api, provider)
    }

    fn config(protocol: i64) -> Configuration {
        Configuration::new()
            .resource(
                "nsxt_ip_protocol_ns_service",
                "test",
                json!({"display_name": "proto", "protocol": protocol}),
            )
            .resource(
                "nsxt_igmp_type_ns_service",
                "igmp",
                json!({"display_name": "igmp", "tag": {"scope": "s", "tag": "t"}}),
            )
    }

    #[tokio::test]
    async fn test_apply_then_plan_is_empty() {
        let (api, provider) = provider();
        let engine = Engine::new(&provider);
        let mut state = StateDocument::new();

        let plan = engine.plan(&config(6), &state).await.unwrap();
        assert_eq!(plan.count(Action::Create), 2);

        let applied = engine.apply(&config(6), &mut state).await.unwrap();
        assert!(
            applied
                .iter()
                .all(|a| matches!(a.result, ReconciliationResult::Created(_)))
        );
        assert_eq!(state.serial, 1);
        assert_eq!(api.calls(Operation::Create).await, 2);

        assert!(engine.plan(&config(6), &state).await.unwrap().is_empty());

        // A no-op apply leaves the serial alone
        engine.apply(&config(6), &mut state).await.unwrap();
        assert_eq!(state.serial, 1);
    }

    #[tokio::test]
    async fn test_update_keeps_address_and_id() {
        let (_api, provider) = provider();
        let engine = Engine::new(&provider);
        let mut state = StateDocument::new();
        engine.apply(&config(6), &mut state).await.unwrap();
        let id = state.get("nsxt_ip_protocol_ns_service.test").unwrap().id.clone();

        let plan = engine.plan(&config(17), &state).await.unwrap();
        let change = plan
            .changes
            .iter()
            .find(|c| c.address == "nsxt_ip_protocol_ns_service.test")
            .unwrap();
        assert_eq!(change.action, Action::Update);
        assert_eq!(change.changed, vec!["protocol".to_string()]);

        engine.apply(&config(17), &mut state).await.unwrap();
        let tracked = state.get("nsxt_ip_protocol_ns_service.test").unwrap();
        assert_eq!(tracked.id, id);
        assert_eq!(tracked.attributes["protocol"], json!(17));
        assert_eq!(state.serial, 2);
    }

    #[tokio::test]
    async fn test_removed_block_is_destroyed() {
        let (api, provider) = provider();
        let engine = Engine::new(&provider);
        let mut state = StateDocument::new();
        engine.apply(&config(6), &mut state).await.unwrap();
        let igmp_id = state.get("nsxt_igmp_type_ns_service.igmp").unwrap().id.clone();

        let reduced = Configuration::new().resource(
            "nsxt_ip_protocol_ns_service",
            "test",
            json!({"display_name": "proto", "protocol": 6}),
        );
        let plan = engine.plan(&reduced, &state).await.unwrap();
        assert_eq!(plan.count(Action::Delete), 1);

        let applied = engine.apply(&reduced, &mut state).await.unwrap();
        assert!(applied.contains(&Applied {
            address: "nsxt_igmp_type_ns_service.igmp".to_string(),
            result: ReconciliationResult::Destroyed,
        }));
        assert!(state.get("nsxt_igmp_type_ns_service.igmp").is_none());
        assert!(api.read_ns_service(&igmp_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_drift_is_recreated() {
        let (api, provider) = provider();
        let engine = Engine::new(&provider);
        let mut state = StateDocument::new();
        engine.apply(&config(6), &mut state).await.unwrap();
        let id = state.get("nsxt_ip_protocol_ns_service.test").unwrap().id.clone();

        api.delete_ns_service(&id).await.unwrap();

        let plan = engine.plan(&config(6), &state).await.unwrap();
        assert_eq!(plan.count(Action::Create), 1);

        engine.apply(&config(6), &mut state).await.unwrap();
        let tracked = state.get("nsxt_ip_protocol_ns_service.test").unwrap();
        assert_ne!(tracked.id, id);
    }

    #[tokio::test]
    async fn test_refresh_drops_vanished_objects() {
        let (api, provider) = provider();
        let engine = Engine::new(&provider);
        let mut state = StateDocument::new();
        engine.apply(&config(6), &mut state).await.unwrap();
        let id = state.get("nsxt_igmp_type_ns_service.igmp").unwrap().id.clone();
        api.delete_ns_service(&id).await.unwrap();

        let refreshed = engine.refresh(&mut state).await.unwrap();
        assert!(refreshed.contains(&Applied {
            address: "nsxt_igmp_type_ns_service.igmp".to_string(),
            result: ReconciliationResult::NotFound,
        }));
        assert_eq!(state.addresses(), vec!["nsxt_ip_protocol_ns_service.test"]);
    }

    #[tokio::test]
    async fn test_validation_error_sends_nothing() {
        let (api, provider) = provider();
        let engine = Engine::new(&provider);
        let mut state = StateDocument::new();
        let invalid = config(6).resource(
            "nsxt_icmp_type_ns_service",
            "bad",
            json!({"display_name": "bad", "protocol": "ICMPv4", "icmp_type": 300}),
        );

        let err = engine.apply(&invalid, &mut state).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)), "got {:?}", err);
        assert_eq!(api.calls(Operation::Create).await, 0);
        assert_eq!(state.serial, 0);
    }

    #[tokio::test]
    async fn test_unknown_type_rejected() {
        let (_api, provider) = provider();
        let engine = Engine::new(&provider);
        let config = Configuration::new().resource("nsxt_vm_tags", "x", json!({}));
        assert!(matches!(
            engine.validate(&config),
            Err(ProviderError::UnknownResourceType(_))
        ));
    }

    #[tokio::test]
    async fn test_import_then_plan_is_empty() {
        let (api, provider) = provider();
        let engine = Engine::new(&provider);
        let mut applied_state = StateDocument::new();
        engine.apply(&config(6), &mut applied_state).await.unwrap();
        let id = applied_state
            .get("nsxt_ip_protocol_ns_service.test")
            .unwrap()
            .id
            .clone();

        let mut imported_state = StateDocument::new();
        let desired = engine
            .import(&mut imported_state, "nsxt_ip_protocol_ns_service.test", &id)
            .await
            .unwrap();
        assert_eq!(desired.int("protocol"), Some(6));
        assert_eq!(
            imported_state
                .get("nsxt_ip_protocol_ns_service.test")
                .unwrap()
                .flatten(),
            applied_state
                .get("nsxt_ip_protocol_ns_service.test")
                .unwrap()
                .flatten()
        );

        let err = engine
            .import(&mut imported_state, "nsxt_ip_protocol_ns_service.test", &id)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
        assert_eq!(api.calls(Operation::Create).await, 2);
    }

    #[tokio::test]
    async fn test_destroy_everything() {
        let (api, provider) = provider();
        let engine = Engine::new(&provider);
        let mut state = StateDocument::new();
        engine.apply(&config(6), &mut state).await.unwrap();

        let destroyed = engine.destroy(&mut state).await.unwrap();
        assert_eq!(destroyed.len(), 2);
        assert!(state.resources.is_empty());
        assert_eq!(api.state().read().await.ns_service_count(), 0);
        assert_eq!(state.serial, 2);
    }

    #[tokio::test]
    async fn test_unconfirmed_create_stays_tracked() {
        let manager = Arc::new(RwLock::new(ManagerState::with_visibility_lag(3)));
        let api = Arc::new(InMemoryApi::with_state(manager.clone()));
        let provider = Provider::new(
            api.clone(),
            RetryPolicy::exponential(2, Duration::from_millis(1), Duration::from_millis(1)),
        );
        let engine = Engine::new(&provider);
        let mut state = StateDocument::new();
        let config = Configuration::new().resource(
            "nsxt_igmp_type_ns_service",
            "igmp",
            json!({"display_name": "igmp"}),
        );

        let err = engine.apply(&config, &mut state).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotVisible { .. }), "got {:?}", err);
        let tracked = state.get("nsxt_igmp_type_ns_service.igmp").unwrap();
        assert_eq!(Some(&tracked.id), err.created_record().map(|r| &r.id));
        assert_eq!(state.serial, 1);

        // Once visible, a second apply adopts it instead of creating another
        let applied = engine.apply(&config, &mut state).await.unwrap();
        assert_eq!(applied[0].result, ReconciliationResult::NoChange);
        assert_eq!(manager.read().await.ns_service_count(), 1);
        assert_eq!(api.calls(Operation::Create).await, 1);

        manager.write().await.set_visibility_lag(0);
        engine.destroy(&mut state).await.unwrap();
        assert!(state.resources.is_empty());
        assert_eq!(manager.read().await.ns_service_count(), 0);
    }

    #[tokio::test]
    async fn test_unconfirmed_replace_tracks_new_id() {
        let manager = Arc::new(RwLock::new(ManagerState::new()));
        let api = Arc::new(InMemoryApi::with_state(manager.clone()));
        let provider = Provider::new(
            api.clone(),
            RetryPolicy::exponential(2, Duration::from_millis(1), Duration::from_millis(1)),
        );
        let engine = Engine::new(&provider);
        let mut state = StateDocument::new();
        let l4 = |protocol: &str| {
            Configuration::new().resource(
                "nsxt_l4_port_set_ns_service",
                "web",
                json!({"display_name": "web", "protocol": protocol, "destination_ports": ["443"]}),
            )
        };
        engine.apply(&l4("TCP"), &mut state).await.unwrap();
        let old_id = state.get("nsxt_l4_port_set_ns_service.web").unwrap().id.clone();

        manager.write().await.set_create_lag(3);
        let err = engine.apply(&l4("UDP"), &mut state).await.unwrap_err();
        assert!(err.is_consistency(), "got {:?}", err);

        let tracked = state.get("nsxt_l4_port_set_ns_service.web").unwrap();
        assert_ne!(tracked.id, old_id);
        assert_eq!(tracked.attributes["protocol"], json!("UDP"));
        assert_eq!(manager.read().await.ns_service_count(), 1);
    }
}
