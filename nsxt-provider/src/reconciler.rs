//! State reconciler.
//!
//! Compares desired state with the last-read remote record and converges the
//! remote object by creating, updating, replacing or destroying it. Objects are
//! always addressed by their manager-assigned id.

use std::sync::Arc;

use nsxt_sdk::ManagerApi;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, Result};
use crate::model::{DesiredState, Diff, ReconciliationResult, RemoteRecord};
use crate::resource::ResourceAdapter;
use crate::retry::RetryPolicy;

/// Outcome of a reconciliation step together with the resulting record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub result: ReconciliationResult,
    /// `None` after a destroy.
    pub record: Option<RemoteRecord>,
}

pub struct StateReconciler {
    api: Arc<dyn ManagerApi>,
    retry: RetryPolicy,
}

impl StateReconciler {
    pub fn new(api: Arc<dyn ManagerApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    pub fn api(&self) -> &dyn ManagerApi {
        self.api.as_ref()
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    // =========================================================================
    // Primitive operations
    // =========================================================================

    /// Create a remote object. Non-success statuses fail the call and are not
    /// retried. An object that never becomes readable is returned inside
    /// [`ProviderError::NotVisible`].
    pub async fn create(
        &self,
        adapter: &dyn ResourceAdapter,
        desired: &DesiredState,
    ) -> Result<RemoteRecord> {
        let created = adapter.create(self.api(), desired).await?;
        info!(
            resource_type = adapter.type_name(),
            id = %created.id,
            display_name = %created.display_name,
            "Created remote object"
        );

        if !self.retry.is_enabled() {
            return Ok(created);
        }
        self.wait_visible(adapter, created).await
    }

    pub async fn read(&self, adapter: &dyn ResourceAdapter, id: &str) -> Result<RemoteRecord> {
        adapter.read(self.api(), id).await
    }

    /// Read an object, mapping `NotFound` to `None`.
    pub async fn refresh(
        &self,
        adapter: &dyn ResourceAdapter,
        id: &str,
    ) -> Result<Option<RemoteRecord>> {
        match adapter.read(self.api(), id).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => {
                debug!(resource_type = adapter.type_name(), id = %id, "Remote object is gone");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Converge `current` towards `desired`.
    ///
    /// Without a diff nothing is sent. A change to a replace-on-change
    /// attribute destroys and recreates the object; any other change is sent
    /// as a single update carrying the full desired state.
    pub async fn update(
        &self,
        adapter: &dyn ResourceAdapter,
        current: &RemoteRecord,
        desired: &DesiredState,
    ) -> Result<Reconciled> {
        let diff = Diff::compute(adapter.spec(), desired, current);
        if diff.is_empty() {
            return Ok(Reconciled {
                result: ReconciliationResult::NoChange,
                record: Some(current.clone()),
            });
        }

        if diff.requires_replace() {
            info!(
                resource_type = adapter.type_name(),
                id = %current.id,
                changed = ?diff.changed_attributes(),
                "Immutable attribute changed, replacing"
            );
            return self.replace(adapter, &current.id, desired).await;
        }

        let updated = adapter.update(self.api(), current, desired).await?;
        info!(
            resource_type = adapter.type_name(),
            id = %updated.id,
            revision = updated.revision,
            changed = ?diff.changed_attributes(),
            "Updated remote object"
        );
        Ok(Reconciled {
            result: ReconciliationResult::Updated,
            record: Some(updated),
        })
    }

    /// Destroy `id`, then create `desired` under a new identifier.
    pub async fn replace(
        &self,
        adapter: &dyn ResourceAdapter,
        id: &str,
        desired: &DesiredState,
    ) -> Result<Reconciled> {
        self.destroy(adapter, id).await?;
        let created = self.create(adapter, desired).await?;
        Ok(Reconciled {
            result: ReconciliationResult::Replaced {
                previous: id.to_string(),
                id: created.id.clone(),
            },
            record: Some(created),
        })
    }

    /// Destroy a remote object. An object that is already gone is reported as
    /// `NotFound`, not as an error.
    pub async fn destroy(
        &self,
        adapter: &dyn ResourceAdapter,
        id: &str,
    ) -> Result<ReconciliationResult> {
        match adapter.delete(self.api(), id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(resource_type = adapter.type_name(), id = %id, "Already destroyed");
                return Ok(ReconciliationResult::NotFound);
            }
            Err(e) => return Err(e),
        }
        info!(resource_type = adapter.type_name(), id = %id, "Destroyed remote object");

        if self.retry.is_enabled() {
            self.wait_gone(adapter, id).await?;
        }
        Ok(ReconciliationResult::Destroyed)
    }

    /// Reconcile one resource.
    ///
    /// With no prior id the object is created. A prior id that no longer
    /// resolves is treated as drift and recreated.
    pub async fn reconcile(
        &self,
        adapter: &dyn ResourceAdapter,
        desired: &DesiredState,
        prior_id: Option<&str>,
    ) -> Result<Reconciled> {
        let current = match prior_id {
            Some(id) => {
                let current = self.refresh(adapter, id).await?;
                if current.is_none() {
                    warn!(
                        resource_type = adapter.type_name(),
                        id = %id,
                        "Tracked object vanished, recreating"
                    );
                }
                current
            }
            None => None,
        };

        match current {
            Some(current) => self.update(adapter, &current, desired).await,
            None => {
                let created = self.create(adapter, desired).await?;
                Ok(Reconciled {
                    result: ReconciliationResult::Created(created.id.clone()),
                    record: Some(created),
                })
            }
        }
    }

    // =========================================================================
    // Consistency waits
    // =========================================================================

    /// Wait for a created object to become readable. On exhaustion the error
    /// carries `created`.
    async fn wait_visible(
        &self,
        adapter: &dyn ResourceAdapter,
        created: RemoteRecord,
    ) -> Result<RemoteRecord> {
        let id = created.id.as_str();
        let visible = self
            .retry
            .poll("create", move || self.refresh(adapter, id))
            .await?;
        if let Some(visible) = visible {
            return Ok(visible);
        }

        let attempts = self.retry.max_attempts + 1;
        warn!(
            resource_type = adapter.type_name(),
            id = %id,
            attempts = attempts,
            "Created object never became visible"
        );
        Err(ProviderError::NotVisible {
            resource_type: adapter.type_name().to_string(),
            attempts,
            record: Box::new(created),
        })
    }

    async fn wait_gone(&self, adapter: &dyn ResourceAdapter, id: &str) -> Result<()> {
        let gone = self
            .retry
            .poll("destroy", move || async move {
                Ok(self.refresh(adapter, id).await?.is_none().then_some(()))
            })
            .await?;

        if gone.is_some() {
            return Ok(());
        }
        warn!(
            resource_type = adapter.type_name(),
            id = %id,
            attempts = self.retry.max_attempts + 1,
            "Destroyed object is still readable"
        );
        Err(ProviderError::Consistency(format!(
            "{} {} was destroyed but is still readable after {} attempts",
            adapter.type_name(),
            id,
            self.retry.max_attempts + 1
        )))
    }
}
