//! Resource adapters: the per-type bridge between schema values and the
//! manager's payloads.

mod ether_type_ns_service;
mod icmp_type_ns_service;
mod igmp_type_ns_service;
mod ip_protocol_ns_service;
mod l4_port_set_ns_service;
mod ns_service;

use std::collections::BTreeMap;

use async_trait::async_trait;
use nsxt_sdk::{ManagerApi, NsServiceElement};

use crate::error::Result;
use crate::model::{DesiredState, RemoteRecord, Value};
use crate::schema::ResourceSpec;

pub use ether_type_ns_service::EtherType;
pub use icmp_type_ns_service::IcmpType;
pub use igmp_type_ns_service::IgmpType;
pub use ip_protocol_ns_service::IpProtocol;
pub use l4_port_set_ns_service::L4PortSet;
pub use ns_service::NsServiceResource;

/// CRUD operations for one resource type.
///
/// Adapters translate between [`DesiredState`] and the manager's wire format.
/// They make exactly one remote call per operation; waiting and replace
/// decisions belong to the reconciler.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    fn spec(&self) -> &ResourceSpec;

    fn type_name(&self) -> &'static str {
        self.spec().type_name()
    }

    async fn create(&self, api: &dyn ManagerApi, desired: &DesiredState) -> Result<RemoteRecord>;

    /// Fails with `NotFound` when the identifier does not resolve.
    async fn read(&self, api: &dyn ManagerApi, id: &str) -> Result<RemoteRecord>;

    /// Send the full desired state, echoing `current.revision`.
    async fn update(
        &self,
        api: &dyn ManagerApi,
        current: &RemoteRecord,
        desired: &DesiredState,
    ) -> Result<RemoteRecord>;

    /// Fails with `NotFound` when the object is already gone.
    async fn delete(&self, api: &dyn ManagerApi, id: &str) -> Result<()>;
}

/// One kind of NS service element.
pub trait NsServiceKind: Send + Sync + 'static {
    const TYPE_NAME: &'static str;

    /// `resource_type` discriminator of the element on the wire.
    const ELEMENT: &'static str;

    fn spec() -> ResourceSpec;

    fn element(desired: &DesiredState) -> Result<NsServiceElement>;

    /// Schema attributes carried by `element`, or `None` when it belongs to
    /// another kind.
    fn attributes(element: &NsServiceElement) -> Option<BTreeMap<String, Value>>;
}

/// Adapters for every supported resource type.
pub fn all() -> Vec<Box<dyn ResourceAdapter>> {
    vec![
        Box::new(NsServiceResource::<EtherType>::new()),
        Box::new(NsServiceResource::<IcmpType>::new()),
        Box::new(NsServiceResource::<IgmpType>::new()),
        Box::new(NsServiceResource::<IpProtocol>::new()),
        Box::new(NsServiceResource::<L4PortSet>::new()),
    ]
}
