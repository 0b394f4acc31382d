//! In-process [`ManagerApi`] over [`ManagerState`], with fault injection.
//!
//! Used where spinning up the REST router is unnecessary. Faults are one-shot
//! per operation, except the read overrides installed with
//! [`InMemoryApi::answer_reads_with`], [`InMemoryApi::answer_reads_with_id`]
//! and [`InMemoryApi::fail_reads_with`], which stay until cleared.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use nsxt_sdk::{
    ApiErrorBody, ApiResponse, ClientError, ManagerApi, NsService, NsServiceListResult,
    StatusCode, TransportZoneStatus,
};
use tokio::sync::{Mutex, RwLock};

use crate::error::StoreError;
use crate::state::ManagerState;

/// Manager operation, for fault injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
    ZoneStatus,
}

#[derive(Default)]
struct Faults {
    fail_next: HashMap<Operation, ClientError>,
    read_status: Option<StatusCode>,
    read_id: Option<String>,
    read_failure: Option<StatusCode>,
}

/// Manager API backed directly by an in-memory store.
pub struct InMemoryApi {
    state: Arc<RwLock<ManagerState>>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<Operation>>,
    updates: Mutex<Vec<NsService>>,
}

impl Default for InMemoryApi {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryApi {
    pub fn new() -> Self {
        Self::with_state(Arc::new(RwLock::new(ManagerState::new())))
    }

    pub fn with_state(state: Arc<RwLock<ManagerState>>) -> Self {
        Self {
            state,
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> Arc<RwLock<ManagerState>> {
        Arc::clone(&self.state)
    }

    /// Make the next call of `op` fail with `status`.
    pub async fn fail_next(&self, op: Operation, status: StatusCode) {
        self.faults
            .lock()
            .await
            .fail_next
            .insert(op, injected(status));
    }

    /// Make the next call of `op` fail without a response.
    pub async fn disconnect_next(&self, op: Operation) {
        self.faults.lock().await.fail_next.insert(
            op,
            ClientError::Transport("connection reset by peer".to_string()),
        );
    }

    /// Answer every successful read with `status` instead of 200.
    pub async fn answer_reads_with(&self, status: Option<StatusCode>) {
        self.faults.lock().await.read_status = status;
    }

    /// Answer every successful read with `id` in the body, whatever was asked for.
    pub async fn answer_reads_with_id(&self, id: Option<String>) {
        self.faults.lock().await.read_id = id;
    }

    /// Fail every read with `status` until cleared.
    pub async fn fail_reads_with(&self, status: Option<StatusCode>) {
        self.faults.lock().await.read_failure = status;
    }

    /// Number of calls made for `op`.
    pub async fn calls(&self, op: Operation) -> usize {
        self.calls.lock().await.iter().filter(|c| **c == op).count()
    }

    /// Payloads of all update calls, in order.
    pub async fn updates(&self) -> Vec<NsService> {
        self.updates.lock().await.clone()
    }

    async fn enter(&self, op: Operation) -> nsxt_sdk::Result<()> {
        self.calls.lock().await.push(op);
        match self.faults.lock().await.fail_next.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn injected(status: StatusCode) -> ClientError {
    ClientError::Status {
        status,
        body: Some(ApiErrorBody {
            error_message: format!("injected {}", status),
            ..Default::default()
        }),
    }
}

fn to_client_error(e: StoreError) -> ClientError {
    ClientError::Status {
        status: e.status(),
        body: Some(e.to_body()),
    }
}

#[async_trait]
impl ManagerApi for InMemoryApi {
    async fn create_ns_service(
        &self,
        service: &NsService,
    ) -> nsxt_sdk::Result<ApiResponse<NsService>> {
        self.enter(Operation::Create).await?;
        let created = self
            .state
            .write()
            .await
            .create_ns_service(service.clone())
            .map_err(to_client_error)?;
        Ok(ApiResponse {
            status: StatusCode::CREATED,
            body: created,
        })
    }

    async fn read_ns_service(&self, id: &str) -> nsxt_sdk::Result<ApiResponse<NsService>> {
        self.enter(Operation::Read).await?;
        if let Some(status) = self.faults.lock().await.read_failure {
            return Err(injected(status));
        }
        let mut service = self
            .state
            .write()
            .await
            .get_ns_service(id)
            .map_err(to_client_error)?;

        let faults = self.faults.lock().await;
        if let Some(other) = &faults.read_id {
            service.id = Some(other.clone());
        }
        Ok(ApiResponse {
            status: faults.read_status.unwrap_or(StatusCode::OK),
            body: service,
        })
    }

    async fn update_ns_service(
        &self,
        id: &str,
        service: &NsService,
    ) -> nsxt_sdk::Result<ApiResponse<NsService>> {
        self.enter(Operation::Update).await?;
        self.updates.lock().await.push(service.clone());
        let updated = self
            .state
            .write()
            .await
            .update_ns_service(id, service.clone())
            .map_err(to_client_error)?;
        Ok(ApiResponse::ok(updated))
    }

    async fn delete_ns_service(&self, id: &str) -> nsxt_sdk::Result<ApiResponse<()>> {
        self.enter(Operation::Delete).await?;
        self.state
            .write()
            .await
            .delete_ns_service(id)
            .map_err(to_client_error)?;
        Ok(ApiResponse::ok(()))
    }

    async fn list_ns_services(&self) -> nsxt_sdk::Result<ApiResponse<NsServiceListResult>> {
        self.enter(Operation::List).await?;
        let results = self.state.read().await.list_ns_services();
        Ok(ApiResponse::ok(NsServiceListResult {
            result_count: results.len() as i64,
            results,
            cursor: None,
        }))
    }

    async fn read_transport_zone_status(
        &self,
        zone_id: &str,
    ) -> nsxt_sdk::Result<ApiResponse<TransportZoneStatus>> {
        self.enter(Operation::ZoneStatus).await?;
        let status = self
            .state
            .read()
            .await
            .get_transport_zone_status(zone_id)
            .map_err(to_client_error)?;
        Ok(ApiResponse::ok(status))
    }
}
