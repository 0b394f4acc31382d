//! Client SDK for the VMware NSX-T manager API.
//!
//! [`ManagerApi`] is the seam the provider talks through; [`HttpClient`] is the
//! production implementation over HTTPS.

pub mod client;
pub mod error;
pub mod models;

pub use client::{ApiResponse, ClientConfig, HttpClient, ManagerApi};
pub use error::{ClientError, Result};
pub use models::{
    ApiErrorBody, BfdStatusCount, EtherTypeNsServiceEntry, IcmpTypeNsServiceEntry,
    IpProtocolNsServiceEntry, L4PortSetNsServiceEntry, NsService, NsServiceElement,
    NsServiceListResult, Tag, TransportZoneStatus, TunnelStatusCount,
};
pub use reqwest::StatusCode;
