//! Data-transfer objects for the NSX-T manager API.
//!
//! Field names follow the manager's JSON wire format. Optional members are
//! omitted on the wire when unset, which the manager treats as "keep default".

use serde::{Deserialize, Serialize};

fn is_zero(value: &i32) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

// =============================================================================
// Common
// =============================================================================

/// Arbitrary `{scope, tag}` label attached to a managed object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub tag: String,
}

impl Tag {
    pub fn new(scope: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            tag: tag.into(),
        }
    }
}

/// Error payload returned by the manager alongside non-2xx statuses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "httpStatus", default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default)]
    pub error_message: String,
}

// =============================================================================
// NS services
// =============================================================================

/// ICMP type/code match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmpTypeNsServiceEntry {
    /// `ICMPv4` or `ICMPv6`
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmp_code: Option<i64>,
}

/// Raw IP protocol number match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpProtocolNsServiceEntry {
    pub protocol_number: i64,
}

/// TCP/UDP port set match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L4PortSetNsServiceEntry {
    /// `TCP` or `UDP`
    pub l4_protocol: String,
    #[serde(default)]
    pub source_ports: Vec<String>,
    #[serde(default)]
    pub destination_ports: Vec<String>,
}

/// Layer 2 ether type match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtherTypeNsServiceEntry {
    pub ether_type: i64,
}

/// The concrete service definition carried by an [`NsService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resource_type")]
pub enum NsServiceElement {
    #[serde(rename = "ICMPTypeNSService")]
    IcmpType(IcmpTypeNsServiceEntry),
    #[serde(rename = "IPProtocolNSService")]
    IpProtocol(IpProtocolNsServiceEntry),
    #[serde(rename = "L4PortSetNSService")]
    L4PortSet(L4PortSetNsServiceEntry),
    #[serde(rename = "IGMPTypeNSService")]
    IgmpType,
    #[serde(rename = "EtherTypeNSService")]
    EtherType(EtherTypeNsServiceEntry),
}

impl NsServiceElement {
    /// Wire discriminator of this element.
    pub fn resource_type(&self) -> &'static str {
        match self {
            NsServiceElement::IcmpType(_) => "ICMPTypeNSService",
            NsServiceElement::IpProtocol(_) => "IPProtocolNSService",
            NsServiceElement::L4PortSet(_) => "L4PortSetNSService",
            NsServiceElement::IgmpType => "IGMPTypeNSService",
            NsServiceElement::EtherType(_) => "EtherTypeNSService",
        }
    }
}

/// A networking service definition (`/api/v1/ns-services`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsService {
    /// Assigned by the manager on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// Optimistic concurrency counter; updates must echo the current value.
    #[serde(rename = "_revision", default)]
    pub revision: i64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub default_service: bool,
    pub nsservice_element: NsServiceElement,
}

impl NsService {
    pub fn new(element: NsServiceElement) -> Self {
        Self {
            id: None,
            display_name: None,
            description: None,
            tags: Vec::new(),
            revision: 0,
            default_service: false,
            nsservice_element: element,
        }
    }
}

/// Paged listing of NS services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsServiceListResult {
    #[serde(default)]
    pub results: Vec<NsService>,
    #[serde(default)]
    pub result_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

// =============================================================================
// Transport zone status
// =============================================================================

/// Tunnel counts per BFD session state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BfdStatusCount {
    /// Number of tunnels in BFD admin down state
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bfd_admin_down_count: i32,

    /// Number of tunnels in BFD down state
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bfd_down_count: i32,

    /// Number of tunnels in BFD init state
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bfd_init_count: i32,

    /// Number of tunnels in BFD up state
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bfd_up_count: i32,
}

impl BfdStatusCount {
    /// Sum of all counters. Widened so counters near `i32::MAX` cannot overflow.
    pub fn total(&self) -> i64 {
        [
            self.bfd_admin_down_count,
            self.bfd_down_count,
            self.bfd_init_count,
            self.bfd_up_count,
        ]
        .into_iter()
        .map(i64::from)
        .sum()
    }
}

/// Aggregate tunnel health of a transport zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelStatusCount {
    #[serde(default)]
    pub bfd_status: BfdStatusCount,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub up_count: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub down_count: i32,
    /// `UP`, `DOWN`, `DEGRADED` or `UNKNOWN`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Status summary of a transport zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportZoneStatus {
    pub transport_zone_id: String,
    #[serde(default)]
    pub num_transport_nodes: i64,
    #[serde(default)]
    pub tunnel_status: TunnelStatusCount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_icmp_element_wire_format() {
        let mut service = NsService::new(NsServiceElement::IcmpType(IcmpTypeNsServiceEntry {
            protocol: "ICMPv4".to_string(),
            icmp_type: Some(5),
            icmp_code: None,
        }));
        service.display_name = Some("svc".to_string());

        let value = serde_json::to_value(&service).unwrap();
        assert_eq!(
            value,
            json!({
                "display_name": "svc",
                "_revision": 0,
                "nsservice_element": {
                    "resource_type": "ICMPTypeNSService",
                    "protocol": "ICMPv4",
                    "icmp_type": 5
                }
            })
        );
    }

    #[test]
    fn test_decode_manager_payload() {
        let payload = json!({
            "resource_type": "NSService",
            "id": "a1b2",
            "display_name": "http",
            "_revision": 3,
            "_create_user": "admin",
            "tags": [{"scope": "env", "tag": "prod"}],
            "nsservice_element": {
                "resource_type": "L4PortSetNSService",
                "l4_protocol": "TCP",
                "destination_ports": ["80", "8080-8090"]
            }
        });

        let service: NsService = serde_json::from_value(payload).unwrap();
        assert_eq!(service.id.as_deref(), Some("a1b2"));
        assert_eq!(service.revision, 3);
        assert_eq!(service.tags, vec![Tag::new("env", "prod")]);
        match service.nsservice_element {
            NsServiceElement::L4PortSet(entry) => {
                assert_eq!(entry.l4_protocol, "TCP");
                assert!(entry.source_ports.is_empty());
                assert_eq!(entry.destination_ports, vec!["80", "8080-8090"]);
            }
            other => panic!("Unexpected element: {:?}", other),
        }
    }

    #[test]
    fn test_igmp_element_has_no_fields() {
        let value = serde_json::to_value(NsServiceElement::IgmpType).unwrap();
        assert_eq!(value, json!({"resource_type": "IGMPTypeNSService"}));

        let decoded: NsServiceElement =
            serde_json::from_value(json!({"resource_type": "IGMPTypeNSService"})).unwrap();
        assert_eq!(decoded, NsServiceElement::IgmpType);
    }

    #[test]
    fn test_bfd_status_count_omits_zero_counters() {
        let counts = BfdStatusCount {
            bfd_up_count: 4,
            bfd_down_count: 1,
            ..Default::default()
        };
        let value = serde_json::to_value(counts).unwrap();
        assert_eq!(value, json!({"bfd_down_count": 1, "bfd_up_count": 4}));

        let decoded: BfdStatusCount = serde_json::from_value(json!({})).unwrap();
        assert_eq!(decoded, BfdStatusCount::default());
        assert_eq!(counts.total(), 5);
    }

    #[test]
    fn test_bfd_total_does_not_overflow() {
        let counts: BfdStatusCount =
            serde_json::from_value(json!({"bfd_up_count": 2147483647, "bfd_down_count": 1}))
                .unwrap();
        assert_eq!(counts.total(), i64::from(i32::MAX) + 1);

        let saturated = BfdStatusCount {
            bfd_admin_down_count: i32::MAX,
            bfd_down_count: i32::MAX,
            bfd_init_count: i32::MAX,
            bfd_up_count: i32::MAX,
        };
        assert_eq!(saturated.total(), 4 * i64::from(i32::MAX));
    }

    #[test]
    fn test_error_body_decoding() {
        let body: ApiErrorBody = serde_json::from_value(json!({
            "httpStatus": "NOT_FOUND",
            "error_code": 600,
            "module_name": "common-services",
            "error_message": "The requested object : x could not be found."
        }))
        .unwrap();
        assert_eq!(body.http_status.as_deref(), Some("NOT_FOUND"));
        assert_eq!(body.error_code, Some(600));
    }
}
