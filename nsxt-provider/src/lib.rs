//! Declarative reconciliation of NSX-T NS services.
//!
//! Configuration blocks are validated against a per-type [`ResourceSpec`],
//! diffed against what the manager holds, and converged by the
//! [`StateReconciler`]. The [`Engine`] drives whole configurations against a
//! local state document; the [`acceptance`] harness runs create, update and
//! import cycles against a [`Provider`].

pub mod acceptance;
pub mod config;
pub mod configuration;
pub mod engine;
pub mod error;
pub mod import;
pub mod model;
pub mod prober;
pub mod provider;
pub mod reconciler;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod tfstate;

pub use config::{ProviderArgs, ProviderConfig};
pub use configuration::{Configuration, ResourceBlock};
pub use engine::{Action, Applied, Engine, Plan, PlannedChange, validate_configuration};
pub use error::{ProviderError, Result, ValidationError};
pub use import::import_by_id;
pub use model::{DesiredState, Diff, ReconciliationResult, RemoteRecord, Value};
pub use prober::ExistenceProber;
pub use provider::{Provider, ResourceRegistry};
pub use reconciler::{Reconciled, StateReconciler};
pub use resource::{NsServiceKind, NsServiceResource, ResourceAdapter};
pub use retry::RetryPolicy;
pub use schema::{AttributeSpec, AttributeType, ResourceSpec, UpdatePolicy, validate};
pub use tfstate::{ResourceState, StateDocument};
