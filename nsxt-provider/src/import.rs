//! Import of existing remote objects.

use tracing::info;

use crate::error::Result;
use crate::model::DesiredState;
use crate::reconciler::StateReconciler;
use crate::resource::ResourceAdapter;

/// Reconstruct a configuration block from a remote identifier.
///
/// Reads the object and projects it onto the adapter's schema; fails with
/// `NotFound` when the id does not resolve.
pub async fn import_by_id(
    reconciler: &StateReconciler,
    adapter: &dyn ResourceAdapter,
    id: &str,
) -> Result<DesiredState> {
    let record = reconciler.read(adapter, id).await?;
    info!(
        resource_type = adapter.type_name(),
        id = %id,
        display_name = %record.display_name,
        "Imported remote object"
    );
    Ok(record.project(adapter.spec()))
}
