//! Shared test utilities for nsxt-provider integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use nsxt_mock::{AppState, ManagerState, create_router};
use nsxt_provider::{Provider, ProviderConfig, RetryPolicy};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::RwLock;

/// Mock NSX-T manager served over HTTP on an OS-assigned port.
pub struct TestManager {
    pub addr: SocketAddr,
    pub state: Arc<RwLock<ManagerState>>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestManager {
    pub async fn spawn() -> Self {
        Self::spawn_with_state(ManagerState::new()).await
    }

    pub async fn spawn_with_state(state: ManagerState) -> Self {
        let state = Arc::new(RwLock::new(state));
        let router = create_router(Arc::new(AppState {
            state: state.clone(),
        }));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            state,
            shutdown_tx,
        }
    }

    /// Provider block pointing at this manager.
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            host: Some(format!("http://{}", self.addr)),
            username: Some("admin".to_string()),
            password: Some("default".to_string()),
            request_timeout: Some(5),
            max_retries: Some(0),
            ..Default::default()
        }
    }

    /// Provider talking HTTP to this manager, without consistency waits.
    pub fn provider(&self) -> Provider {
        Provider::from_config(&self.provider_config()).expect("Failed to configure provider")
    }

    /// Provider talking HTTP to this manager with the given retry policy.
    pub fn provider_with_retry(&self, retry: RetryPolicy) -> Provider {
        Provider::new(self.provider().api(), retry)
    }

    pub async fn service_count(&self) -> usize {
        self.state.read().await.ns_service_count()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// A single `tag { scope, tag }` block.
pub fn tag(scope: &str, tag: &str) -> Value {
    json!({"scope": scope, "tag": tag})
}
