use axum::{
    Router,
    routing::get,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};

/// Build the manager API router, rooted at `/api/v1`.
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/ns-services",
            get(handlers::list_ns_services).post(handlers::create_ns_service),
        )
        .route(
            "/ns-services/{id}",
            get(handlers::get_ns_service)
                .put(handlers::update_ns_service)
                .delete(handlers::delete_ns_service),
        )
        .route(
            "/transport-zones/{id}/status",
            get(handlers::get_transport_zone_status),
        );

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
