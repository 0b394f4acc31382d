use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use nsxt_sdk::{ApiErrorBody, NsService, NsServiceListResult, TransportZoneStatus};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::StoreError;
use crate::state::ManagerState;

/// Shared application state
pub struct AppState {
    pub state: Arc<RwLock<ManagerState>>,
}

/// API error response, in the manager's error body format
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError {
            status: e.status(),
            body: e.to_body(),
        }
    }
}

/// Create an NS service
pub async fn create_ns_service(
    State(app): State<Arc<AppState>>,
    Json(req): Json<NsService>,
) -> Result<(StatusCode, Json<NsService>), ApiError> {
    let created = app.state.write().await.create_ns_service(req)?;
    info!(
        id = created.id.as_deref().unwrap_or_default(),
        element = created.nsservice_element.resource_type(),
        "NS service created"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// List NS services
pub async fn list_ns_services(State(app): State<Arc<AppState>>) -> Json<NsServiceListResult> {
    let results = app.state.read().await.list_ns_services();
    Json(NsServiceListResult {
        result_count: results.len() as i64,
        results,
        cursor: None,
    })
}

/// Get an NS service by ID
pub async fn get_ns_service(
    State(app): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<NsService>, ApiError> {
    let service = app.state.write().await.get_ns_service(&id)?;
    Ok(Json(service))
}

/// Replace an NS service
pub async fn update_ns_service(
    State(app): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<NsService>,
) -> Result<Json<NsService>, ApiError> {
    let updated = app.state.write().await.update_ns_service(&id, req)?;
    info!(id = %id, revision = updated.revision, "NS service updated");
    Ok(Json(updated))
}

/// Delete an NS service
pub async fn delete_ns_service(
    State(app): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    app.state.write().await.delete_ns_service(&id)?;
    info!(id = %id, "NS service deleted");
    Ok(StatusCode::OK)
}

/// Get the tunnel status summary of a transport zone
pub async fn get_transport_zone_status(
    State(app): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TransportZoneStatus>, ApiError> {
    let status = app.state.read().await.get_transport_zone_status(&id)?;
    Ok(Json(status))
}
