//! `nsxt_icmp_type_ns_service`

use std::collections::BTreeMap;

use nsxt_sdk::{IcmpTypeNsServiceEntry, NsServiceElement};

use super::NsServiceKind;
use super::ns_service::required_string;
use crate::error::Result;
use crate::model::{DesiredState, Value};
use crate::schema::{AttributeSpec, AttributeType, ResourceSpec};

pub struct IcmpType;

impl NsServiceKind for IcmpType {
    const TYPE_NAME: &'static str = "nsxt_icmp_type_ns_service";
    const ELEMENT: &'static str = "ICMPTypeNSService";

    fn spec() -> ResourceSpec {
        ResourceSpec::ns_service(Self::TYPE_NAME, "NS service matching ICMP type and code")
            .attribute(
                AttributeSpec::required("protocol", AttributeType::String)
                    .one_of(&["ICMPv4", "ICMPv6"])
                    .describe("Version of ICMP protocol (ICMPv4/ICMPv6)"),
            )
            .attribute(
                AttributeSpec::optional("icmp_type", AttributeType::Int)
                    .int_range(0, 255)
                    .describe("ICMP message type"),
            )
            .attribute(
                AttributeSpec::optional("icmp_code", AttributeType::Int)
                    .int_range(0, 255)
                    .describe("ICMP message code"),
            )
    }

    fn element(desired: &DesiredState) -> Result<NsServiceElement> {
        Ok(NsServiceElement::IcmpType(IcmpTypeNsServiceEntry {
            protocol: required_string(Self::TYPE_NAME, desired, "protocol")?,
            icmp_type: desired.int("icmp_type"),
            icmp_code: desired.int("icmp_code"),
        }))
    }

    fn attributes(element: &NsServiceElement) -> Option<BTreeMap<String, Value>> {
        let NsServiceElement::IcmpType(entry) = element else {
            return None;
        };
        let mut attributes = BTreeMap::new();
        attributes.insert("protocol".to_string(), Value::String(entry.protocol.clone()));
        if let Some(icmp_type) = entry.icmp_type {
            attributes.insert("icmp_type".to_string(), Value::Int(icmp_type));
        }
        if let Some(icmp_code) = entry.icmp_code {
            attributes.insert("icmp_code".to_string(), Value::Int(icmp_code));
        }
        Some(attributes)
    }
}
