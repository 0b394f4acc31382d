//! Existence checks used by refresh and destroy verification.

use std::sync::Arc;

use nsxt_sdk::ManagerApi;
use tracing::debug;

use crate::error::{ProviderError, Result};
use crate::resource::ResourceAdapter;
use crate::retry::RetryPolicy;

pub struct ExistenceProber {
    api: Arc<dyn ManagerApi>,
    retry: RetryPolicy,
}

impl ExistenceProber {
    pub fn new(api: Arc<dyn ManagerApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    /// Whether `id` resolves to an object still named `expected_display_name`.
    ///
    /// A clean 404 and a renamed object both answer `false`. Any other failure
    /// is returned as an error.
    pub async fn exists(
        &self,
        adapter: &dyn ResourceAdapter,
        id: &str,
        expected_display_name: &str,
    ) -> Result<bool> {
        match adapter.read(self.api.as_ref(), id).await {
            Ok(record) => {
                let matches = record.display_name == expected_display_name;
                debug!(
                    resource_type = adapter.type_name(),
                    id = %id,
                    display_name = %record.display_name,
                    matches = matches,
                    "Probed remote object"
                );
                Ok(matches)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fail unless `id` is gone or no longer carries `display_name`.
    ///
    /// With the default policy this is a single check.
    pub async fn verify_destroyed(
        &self,
        adapter: &dyn ResourceAdapter,
        id: &str,
        display_name: &str,
    ) -> Result<()> {
        let gone = self
            .retry
            .poll("verify destroyed", move || async move {
                Ok((!self.exists(adapter, id, display_name).await?).then_some(()))
            })
            .await?;

        match gone {
            Some(()) => Ok(()),
            None => Err(ProviderError::Consistency(format!(
                "{} {} ({}) still exists",
                adapter.type_name(),
                id,
                display_name
            ))),
        }
    }
}
