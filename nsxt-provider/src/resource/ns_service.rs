//! Shared NS service adapter, parameterised by element kind.

use std::marker::PhantomData;

use async_trait::async_trait;
use nsxt_sdk::{ClientError, ManagerApi, NsService, StatusCode};
use tracing::debug;

use super::{NsServiceKind, ResourceAdapter};
use crate::error::{ProviderError, Result, ValidationError};
use crate::model::{DesiredState, RemoteRecord, Value};
use crate::schema::ResourceSpec;

pub struct NsServiceResource<K: NsServiceKind> {
    spec: ResourceSpec,
    _kind: PhantomData<K>,
}

impl<K: NsServiceKind> Default for NsServiceResource<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: NsServiceKind> NsServiceResource<K> {
    pub fn new() -> Self {
        Self {
            spec: K::spec(),
            _kind: PhantomData,
        }
    }

    /// Full manager payload for `desired`.
    pub fn payload(&self, desired: &DesiredState) -> Result<NsService> {
        let mut service = NsService::new(K::element(desired)?);
        service.display_name = Some(required_string(K::TYPE_NAME, desired, "display_name")?);
        service.description = desired.string("description").map(str::to_string);
        service.tags = desired.tags();
        Ok(service)
    }

    /// Build a record from a manager answer, checking it describes the object
    /// that was asked for.
    pub fn record_from(&self, requested: Option<&str>, service: NsService) -> Result<RemoteRecord> {
        let id = service.id.clone().ok_or_else(|| {
            ProviderError::Consistency(format!("{} answer carries no id", K::TYPE_NAME))
        })?;

        if let Some(requested) = requested {
            if requested != id {
                return Err(ProviderError::Consistency(format!(
                    "requested {} {} but the manager answered with {}",
                    K::TYPE_NAME,
                    requested,
                    id
                )));
            }
        }

        let mut attributes = K::attributes(&service.nsservice_element).ok_or_else(|| {
            ProviderError::Consistency(format!(
                "{} is a {}, expected {}",
                id,
                service.nsservice_element.resource_type(),
                K::ELEMENT
            ))
        })?;
        if let Some(description) = service.description {
            attributes.insert("description".to_string(), Value::String(description));
        }

        Ok(RemoteRecord {
            display_name: service.display_name.unwrap_or_else(|| id.clone()),
            id,
            revision: service.revision,
            tags: service.tags.into_iter().collect(),
            attributes,
        })
    }
}

/// Map a failed call: 404 becomes `NotFound`, anything else is a transport error.
fn classify<K: NsServiceKind>(verb: &str, id: &str, error: ClientError) -> ProviderError {
    if error.is_not_found() {
        ProviderError::not_found(K::TYPE_NAME, id)
    } else {
        ProviderError::transport(format!("{} {}", verb, K::TYPE_NAME), error)
    }
}

pub(super) fn required_string(
    resource_type: &str,
    desired: &DesiredState,
    name: &str,
) -> Result<String> {
    desired.string(name).map(str::to_string).ok_or_else(|| {
        ValidationError::MissingAttribute {
            resource_type: resource_type.to_string(),
            attribute: name.to_string(),
        }
        .into()
    })
}

pub(super) fn required_int(resource_type: &str, desired: &DesiredState, name: &str) -> Result<i64> {
    desired.int(name).ok_or_else(|| {
        ValidationError::MissingAttribute {
            resource_type: resource_type.to_string(),
            attribute: name.to_string(),
        }
        .into()
    })
}

#[async_trait]
impl<K: NsServiceKind> ResourceAdapter for NsServiceResource<K> {
    fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    async fn create(&self, api: &dyn ManagerApi, desired: &DesiredState) -> Result<RemoteRecord> {
        let payload = self.payload(desired)?;
        let response = api
            .create_ns_service(&payload)
            .await
            .map_err(|e| ProviderError::transport(format!("create {}", K::TYPE_NAME), e))?;
        self.record_from(None, response.body)
    }

    async fn read(&self, api: &dyn ManagerApi, id: &str) -> Result<RemoteRecord> {
        let response = api
            .read_ns_service(id)
            .await
            .map_err(|e| classify::<K>("read", id, e))?;

        if response.status != StatusCode::OK {
            return Err(ProviderError::Consistency(format!(
                "read of {} {} answered {} instead of 200",
                K::TYPE_NAME,
                id,
                response.status
            )));
        }

        debug!(resource_type = K::TYPE_NAME, id = %id, revision = response.body.revision, "Read NS service");
        self.record_from(Some(id), response.body)
    }

    async fn update(
        &self,
        api: &dyn ManagerApi,
        current: &RemoteRecord,
        desired: &DesiredState,
    ) -> Result<RemoteRecord> {
        let mut payload = self.payload(desired)?;
        payload.id = Some(current.id.clone());
        payload.revision = current.revision;
        let response = api
            .update_ns_service(&current.id, &payload)
            .await
            .map_err(|e| classify::<K>("update", &current.id, e))?;
        self.record_from(Some(&current.id), response.body)
    }

    async fn delete(&self, api: &dyn ManagerApi, id: &str) -> Result<()> {
        api.delete_ns_service(id)
            .await
            .map_err(|e| classify::<K>("delete", id, e))?;
        Ok(())
    }
}
