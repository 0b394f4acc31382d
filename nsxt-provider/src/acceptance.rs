//! Acceptance test harness.
//!
//! A [`TestCase`] applies a sequence of configurations against an explicitly
//! passed [`Provider`], checks the resulting state after each step, and
//! always destroys what it created, verifying afterwards that every object
//! is really gone.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::info;

use crate::configuration::Configuration;
use crate::engine::{Action, Engine};
use crate::error::ProviderError;
use crate::provider::Provider;
use crate::tfstate::{ResourceState, StateDocument};

#[derive(Debug, Error)]
pub enum AcceptanceError {
    #[error("pre-check failed: {0}")]
    PreCheck(String),

    #[error("step {step}: {source}")]
    Step {
        step: usize,
        #[source]
        source: ProviderError,
    },

    #[error("step {step}: check failed: {message}")]
    Check { step: usize, message: String },

    #[error("step {step}: plan after apply is not empty: {changes:?}")]
    NonEmptyPlan { step: usize, changes: Vec<String> },

    #[error("step {step}: imported state differs: {message}")]
    ImportVerify { step: usize, message: String },

    #[error("destroy failed: {0}")]
    Destroy(#[source] ProviderError),

    #[error("destroy check failed: {0}")]
    DestroyCheck(String),
}

/// Assertion on the state after an apply step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// Flattened attribute equals a value (`tag.#`, `tag.0.scope`, ...).
    Attr {
        address: String,
        key: String,
        value: String,
    },
    /// Flattened attribute is absent.
    NoAttr { address: String, key: String },
    /// The tracked object exists remotely with the tracked display name.
    Exists { address: String },
}

impl Check {
    pub fn attr(address: impl Into<String>, key: impl Into<String>, value: impl ToString) -> Self {
        Check::Attr {
            address: address.into(),
            key: key.into(),
            value: value.to_string(),
        }
    }

    pub fn no_attr(address: impl Into<String>, key: impl Into<String>) -> Self {
        Check::NoAttr {
            address: address.into(),
            key: key.into(),
        }
    }

    pub fn exists(address: impl Into<String>) -> Self {
        Check::Exists {
            address: address.into(),
        }
    }
}

pub enum TestStep {
    Apply {
        config: Configuration,
        checks: Vec<Check>,
    },
    /// Import the object tracked at `address` into scratch state; with
    /// `verify`, require it to match the applied state.
    Import { address: String, verify: bool },
}

impl TestStep {
    pub fn apply(config: Configuration, checks: Vec<Check>) -> Self {
        TestStep::Apply { config, checks }
    }

    pub fn import(address: impl Into<String>, verify: bool) -> Self {
        TestStep::Import {
            address: address.into(),
            verify,
        }
    }
}

type PreCheck = Box<dyn Fn() -> Result<(), String> + Send + Sync>;

#[derive(Default)]
pub struct TestCase {
    pre_check: Option<PreCheck>,
    steps: Vec<TestStep>,
    /// `(resource type, display name)` pairs that must be gone afterwards.
    destroy_checks: Vec<(String, String)>,
}

impl TestCase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_check(mut self, check: impl Fn() -> Result<(), String> + Send + Sync + 'static) -> Self {
        self.pre_check = Some(Box::new(check));
        self
    }

    pub fn step(mut self, step: TestStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn check_destroy(
        mut self,
        resource_type: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        self.destroy_checks
            .push((resource_type.into(), display_name.into()));
        self
    }

    pub async fn run(self, provider: &Provider) -> Result<(), AcceptanceError> {
        if let Some(pre_check) = &self.pre_check {
            pre_check().map_err(AcceptanceError::PreCheck)?;
        }

        let engine = Engine::new(provider);
        let mut state = StateDocument::new();
        let outcome = self.run_steps(provider, &engine, &mut state).await;

        let tracked = state.resources.clone();
        let destroyed = engine.destroy(&mut state).await;

        outcome?;
        destroyed.map_err(AcceptanceError::Destroy)?;
        self.verify_destroyed(provider, &tracked).await
    }

    async fn run_steps(
        &self,
        provider: &Provider,
        engine: &Engine<'_>,
        state: &mut StateDocument,
    ) -> Result<(), AcceptanceError> {
        for (index, step) in self.steps.iter().enumerate() {
            let step_no = index + 1;
            match step {
                TestStep::Apply { config, checks } => {
                    info!(step = step_no, "Applying configuration");
                    engine
                        .apply(config, state)
                        .await
                        .map_err(|source| AcceptanceError::Step { step: step_no, source })?;

                    for check in checks {
                        run_check(provider, state, check)
                            .await
                            .map_err(|message| AcceptanceError::Check { step: step_no, message })?;
                    }

                    let plan = engine
                        .plan(config, state)
                        .await
                        .map_err(|source| AcceptanceError::Step { step: step_no, source })?;
                    if !plan.is_empty() {
                        return Err(AcceptanceError::NonEmptyPlan {
                            step: step_no,
                            changes: plan
                                .changes
                                .iter()
                                .filter(|c| c.action != Action::NoOp)
                                .map(|c| format!("{} {}", c.action, c.address))
                                .collect(),
                        });
                    }
                }
                TestStep::Import { address, verify } => {
                    info!(step = step_no, address = %address, "Importing");
                    let applied = state.get(address).ok_or_else(|| AcceptanceError::Check {
                        step: step_no,
                        message: format!("{} is not in state", address),
                    })?;

                    let mut scratch = StateDocument::new();
                    engine
                        .import(&mut scratch, address, &applied.id)
                        .await
                        .map_err(|source| AcceptanceError::Step { step: step_no, source })?;

                    if *verify {
                        let imported = scratch.get(address).ok_or_else(|| {
                            AcceptanceError::ImportVerify {
                                step: step_no,
                                message: format!("{} missing after import", address),
                            }
                        })?;
                        compare_imported(applied, imported).map_err(|message| {
                            AcceptanceError::ImportVerify { step: step_no, message }
                        })?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn verify_destroyed(
        &self,
        provider: &Provider,
        tracked: &[ResourceState],
    ) -> Result<(), AcceptanceError> {
        for (resource_type, display_name) in &self.destroy_checks {
            let adapter = provider
                .resource(resource_type)
                .map_err(|e| AcceptanceError::DestroyCheck(e.to_string()))?;

            for resource in tracked.iter().filter(|r| &r.resource_type == resource_type) {
                provider
                    .prober()
                    .verify_destroyed(adapter, &resource.id, display_name)
                    .await
                    .map_err(|e| AcceptanceError::DestroyCheck(e.to_string()))?;
            }
        }
        Ok(())
    }
}

async fn run_check(
    provider: &Provider,
    state: &StateDocument,
    check: &Check,
) -> Result<(), String> {
    match check {
        Check::Attr {
            address,
            key,
            value,
        } => {
            let flat = tracked(state, address)?.flatten();
            match flat.get(key) {
                Some(actual) if actual == value => Ok(()),
                Some(actual) => Err(format!(
                    "{}: attribute \"{}\" expected {:?}, got {:?}",
                    address, key, value, actual
                )),
                None => Err(format!(
                    "{}: attribute \"{}\" expected {:?}, not set",
                    address, key, value
                )),
            }
        }
        Check::NoAttr { address, key } => {
            match tracked(state, address)?.flatten().get(key) {
                None => Ok(()),
                Some(actual) => Err(format!(
                    "{}: attribute \"{}\" expected unset, got {:?}",
                    address, key, actual
                )),
            }
        }
        Check::Exists { address } => {
            let resource = tracked(state, address)?;
            let display_name = resource
                .attributes
                .get("display_name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| format!("{}: no display_name in state", address))?;
            let adapter = provider
                .resource(&resource.resource_type)
                .map_err(|e| e.to_string())?;

            let exists = provider
                .prober()
                .exists(adapter, &resource.id, display_name)
                .await
                .map_err(|e| format!("{}: {}", address, e))?;
            if exists {
                Ok(())
            } else {
                Err(format!(
                    "{}: {} ({}) does not exist",
                    address, resource.id, display_name
                ))
            }
        }
    }
}

fn tracked<'s>(state: &'s StateDocument, address: &str) -> Result<&'s ResourceState, String> {
    state
        .get(address)
        .ok_or_else(|| format!("{} is not in state", address))
}

fn compare_imported(applied: &ResourceState, imported: &ResourceState) -> Result<(), String> {
    let applied = applied.flatten();
    let imported = imported.flatten();
    let keys: BTreeSet<&String> = applied.keys().chain(imported.keys()).collect();

    let differing: Vec<String> = keys
        .into_iter()
        .filter(|k| applied.get(*k) != imported.get(*k))
        .map(|k| {
            format!(
                "{}: applied {:?}, imported {:?}",
                k,
                applied.get(k),
                imported.get(k)
            )
        })
        .collect();

    if differing.is_empty() {
        Ok(())
    } else {
        Err(differing.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use nsxt_mock::{InMemoryApi, Operation};
    use nsxt_sdk::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    const IGMP: &str = "nsxt_igmp_type_ns_service";

    fn igmp_config(name: &str) -> Configuration {
        Configuration::new().resource(IGMP, "test", json!({"display_name": name}))
    }

    #[tokio::test]
    async fn test_passing_case_cleans_up() {
        let api = Arc::new(InMemoryApi::new());
        let provider = Provider::new(api.clone(), RetryPolicy::none());

        TestCase::new()
            .step(TestStep::apply(
                igmp_config("igmp"),
                vec![
                    Check::exists("nsxt_igmp_type_ns_service.test"),
                    Check::attr("nsxt_igmp_type_ns_service.test", "display_name", "igmp"),
                    Check::attr("nsxt_igmp_type_ns_service.test", "tag.#", 0),
                    Check::no_attr("nsxt_igmp_type_ns_service.test", "description"),
                ],
            ))
            .step(TestStep::import("nsxt_igmp_type_ns_service.test", true))
            .check_destroy(IGMP, "igmp")
            .run(&provider)
            .await
            .unwrap();

        assert_eq!(api.state().read().await.ns_service_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_check_still_destroys() {
        let api = Arc::new(InMemoryApi::new());
        let provider = Provider::new(api.clone(), RetryPolicy::none());

        let err = TestCase::new()
            .step(TestStep::apply(
                igmp_config("igmp"),
                vec![Check::attr("nsxt_igmp_type_ns_service.test", "display_name", "other")],
            ))
            .run(&provider)
            .await
            .unwrap_err();

        assert!(matches!(err, AcceptanceError::Check { step: 1, .. }), "got {:?}", err);
        assert_eq!(api.state().read().await.ns_service_count(), 0);
    }

    #[tokio::test]
    async fn test_pre_check_stops_before_any_call() {
        let api = Arc::new(InMemoryApi::new());
        let provider = Provider::new(api.clone(), RetryPolicy::none());

        let err = TestCase::new()
            .pre_check(|| Err("NSXT_MANAGER_HOST must be set".to_string()))
            .step(TestStep::apply(igmp_config("igmp"), Vec::new()))
            .run(&provider)
            .await
            .unwrap_err();

        assert!(matches!(err, AcceptanceError::PreCheck(_)));
        assert_eq!(api.calls(Operation::Create).await, 0);
    }

    #[tokio::test]
    async fn test_failed_destroy_is_reported() {
        let api = Arc::new(InMemoryApi::new());
        let provider = Provider::new(api.clone(), RetryPolicy::none());
        api.fail_next(Operation::Delete, StatusCode::INTERNAL_SERVER_ERROR)
            .await;

        let err = TestCase::new()
            .step(TestStep::apply(igmp_config("igmp"), Vec::new()))
            .check_destroy(IGMP, "igmp")
            .run(&provider)
            .await
            .unwrap_err();
        assert!(matches!(err, AcceptanceError::Destroy(_)), "got {:?}", err);
    }
}
