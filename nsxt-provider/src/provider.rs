//! Provider: the manager handle plus the registry of resource types.

use std::collections::BTreeMap;
use std::sync::Arc;

use nsxt_sdk::{HttpClient, ManagerApi, TransportZoneStatus};
use tracing::info;

use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::prober::ExistenceProber;
use crate::reconciler::StateReconciler;
use crate::resource::{self, ResourceAdapter};
use crate::retry::RetryPolicy;

/// Resource adapters keyed by type name. Built once, never mutated.
pub struct ResourceRegistry {
    resources: BTreeMap<&'static str, Box<dyn ResourceAdapter>>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        let resources = resource::all()
            .into_iter()
            .map(|adapter| (adapter.type_name(), adapter))
            .collect();
        Self { resources }
    }

    pub fn get(&self, type_name: &str) -> Result<&dyn ResourceAdapter> {
        self.resources
            .get(type_name)
            .map(|adapter| adapter.as_ref())
            .ok_or_else(|| ProviderError::UnknownResourceType(type_name.to_string()))
    }

    pub fn types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }
}

/// A configured provider instance. Pass it explicitly to whatever needs it.
pub struct Provider {
    api: Arc<dyn ManagerApi>,
    reconciler: StateReconciler,
    prober: ExistenceProber,
    registry: ResourceRegistry,
}

impl Provider {
    pub fn new(api: Arc<dyn ManagerApi>, retry: RetryPolicy) -> Self {
        Self {
            reconciler: StateReconciler::new(Arc::clone(&api), retry),
            prober: ExistenceProber::new(Arc::clone(&api), retry),
            api,
            registry: ResourceRegistry::new(),
        }
    }

    /// Provider talking to a real manager over HTTPS.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let client_config = config.client_config()?;
        info!(host = %client_config.host, user = %client_config.username, "Configuring NSX-T provider");
        let client =
            HttpClient::new(client_config).map_err(|e| ProviderError::Config(e.to_string()))?;
        Ok(Self::new(Arc::new(client), config.retry_policy()))
    }

    pub fn resource(&self, type_name: &str) -> Result<&dyn ResourceAdapter> {
        self.registry.get(type_name)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.registry.types()
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn reconciler(&self) -> &StateReconciler {
        &self.reconciler
    }

    pub fn prober(&self) -> &ExistenceProber {
        &self.prober
    }

    pub fn api(&self) -> Arc<dyn ManagerApi> {
        Arc::clone(&self.api)
    }

    /// Tunnel and BFD status counters of a transport zone.
    pub async fn transport_zone_status(&self, zone_id: &str) -> Result<TransportZoneStatus> {
        let response = self
            .api
            .read_transport_zone_status(zone_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    ProviderError::not_found("transport_zone", zone_id)
                } else {
                    ProviderError::transport("read transport zone status", e)
                }
            })?;
        Ok(response.body)
    }
}
