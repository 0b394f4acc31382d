//! Manager object store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use nsxt_sdk::{NsService, NsServiceElement, TransportZoneStatus};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Deleted objects kept for lingering reads. The oldest are dropped first.
const MAX_TOMBSTONES: usize = 256;

#[derive(Debug, Clone)]
struct StoredService {
    service: NsService,
    created_at: DateTime<Utc>,
    /// Reads that still answer 404 after creation.
    hidden_reads: u32,
}

#[derive(Debug, Clone)]
struct Tombstone {
    service: NsService,
    /// Deletion order, for eviction.
    sequence: u64,
    /// Reads that still return the object after deletion.
    lingering_reads: u32,
}

/// State of the simulated manager.
///
/// Visibility lag simulates an eventually consistent management plane: a
/// newly created object stays invisible for `create_lag` reads, and a deleted
/// object stays readable for `delete_lag` reads.
#[derive(Debug, Default)]
pub struct ManagerState {
    services: HashMap<String, StoredService>,
    tombstones: HashMap<String, Tombstone>,
    deletions: u64,
    transport_zones: HashMap<String, TransportZoneStatus>,
    create_lag: u32,
    delete_lag: u32,
}

impl ManagerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visibility_lag(visibility_lag: u32) -> Self {
        Self {
            create_lag: visibility_lag,
            delete_lag: visibility_lag,
            ..Self::default()
        }
    }

    /// Set the lag for both creates and deletes.
    pub fn set_visibility_lag(&mut self, visibility_lag: u32) {
        self.create_lag = visibility_lag;
        self.delete_lag = visibility_lag;
    }

    /// Set the lag for creates only; deletes keep theirs.
    pub fn set_create_lag(&mut self, create_lag: u32) {
        self.create_lag = create_lag;
    }

    // =========================================================================
    // NS service queries
    // =========================================================================

    /// Get an NS service by ID, honouring visibility lag.
    pub fn get_ns_service(&mut self, id: &str) -> Result<NsService> {
        if let Some(tombstone) = self.tombstones.get_mut(id) {
            tombstone.lingering_reads = tombstone.lingering_reads.saturating_sub(1);
            let service = tombstone.service.clone();
            if tombstone.lingering_reads == 0 {
                self.tombstones.remove(id);
            }
            return Ok(service);
        }

        match self.services.get_mut(id) {
            Some(stored) if stored.hidden_reads > 0 => {
                stored.hidden_reads -= 1;
                Err(StoreError::NotFound(id.to_string()))
            }
            Some(stored) => Ok(stored.service.clone()),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    /// List all visible NS services, oldest first.
    pub fn list_ns_services(&self) -> Vec<NsService> {
        let mut stored: Vec<&StoredService> = self
            .services
            .values()
            .filter(|s| s.hidden_reads == 0)
            .collect();
        stored.sort_by_key(|s| s.created_at);
        stored.into_iter().map(|s| s.service.clone()).collect()
    }

    /// Number of stored NS services, including ones not yet visible.
    pub fn ns_service_count(&self) -> usize {
        self.services.len()
    }

    /// Number of deleted NS services that are still readable.
    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    // =========================================================================
    // NS service mutations
    // =========================================================================

    /// Create an NS service, assigning a fresh identifier.
    pub fn create_ns_service(&mut self, mut service: NsService) -> Result<NsService> {
        validate_element(&service.nsservice_element)?;

        let id = Uuid::new_v4().to_string();
        service.id = Some(id.clone());
        service.revision = 0;
        service.default_service = false;
        if service.display_name.is_none() {
            service.display_name = Some(id.clone());
        }

        self.services.insert(
            id,
            StoredService {
                service: service.clone(),
                created_at: Utc::now(),
                hidden_reads: self.create_lag,
            },
        );
        Ok(service)
    }

    /// Replace an NS service. The caller must echo the current revision.
    pub fn update_ns_service(&mut self, id: &str, mut service: NsService) -> Result<NsService> {
        validate_element(&service.nsservice_element)?;

        let stored = self
            .services
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if stored.service.revision != service.revision {
            return Err(StoreError::RevisionMismatch {
                expected: stored.service.revision,
                actual: service.revision,
            });
        }

        service.id = Some(id.to_string());
        service.revision = stored.service.revision + 1;
        service.default_service = stored.service.default_service;
        if service.display_name.is_none() {
            service.display_name = Some(id.to_string());
        }
        stored.service = service.clone();
        Ok(service)
    }

    /// Delete an NS service.
    pub fn delete_ns_service(&mut self, id: &str) -> Result<()> {
        let stored = self
            .services
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if self.delete_lag > 0 {
            self.tombstones.insert(
                id.to_string(),
                Tombstone {
                    service: stored.service,
                    sequence: self.deletions,
                    lingering_reads: self.delete_lag,
                },
            );
            self.deletions += 1;
            self.evict_tombstones();
        }
        Ok(())
    }

    fn evict_tombstones(&mut self) {
        while self.tombstones.len() > MAX_TOMBSTONES {
            let oldest = self
                .tombstones
                .iter()
                .min_by_key(|(_, t)| t.sequence)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => self.tombstones.remove(&id),
                None => break,
            };
        }
    }

    // =========================================================================
    // Transport zones
    // =========================================================================

    pub fn put_transport_zone_status(&mut self, status: TransportZoneStatus) {
        self.transport_zones
            .insert(status.transport_zone_id.clone(), status);
    }

    pub fn get_transport_zone_status(&self, zone_id: &str) -> Result<TransportZoneStatus> {
        self.transport_zones
            .get(zone_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(zone_id.to_string()))
    }
}

/// Reject element payloads the real manager would refuse.
fn validate_element(element: &NsServiceElement) -> Result<()> {
    match element {
        NsServiceElement::IcmpType(entry) => {
            if entry.protocol != "ICMPv4" && entry.protocol != "ICMPv6" {
                return Err(StoreError::Invalid(format!(
                    "unsupported ICMP protocol {}",
                    entry.protocol
                )));
            }
            for value in [entry.icmp_type, entry.icmp_code].into_iter().flatten() {
                if !(0..=255).contains(&value) {
                    return Err(StoreError::Invalid(format!("ICMP value {} out of range", value)));
                }
            }
        }
        NsServiceElement::IpProtocol(entry) => {
            if !(0..=255).contains(&entry.protocol_number) {
                return Err(StoreError::Invalid(format!(
                    "protocol number {} out of range",
                    entry.protocol_number
                )));
            }
        }
        NsServiceElement::L4PortSet(entry) => {
            if entry.l4_protocol != "TCP" && entry.l4_protocol != "UDP" {
                return Err(StoreError::Invalid(format!(
                    "unsupported L4 protocol {}",
                    entry.l4_protocol
                )));
            }
        }
        NsServiceElement::EtherType(entry) => {
            if !(0..=0xffff).contains(&entry.ether_type) {
                return Err(StoreError::Invalid(format!(
                    "ether type {} out of range",
                    entry.ether_type
                )));
            }
        }
        NsServiceElement::IgmpType => {}
    }
    Ok(())
}
