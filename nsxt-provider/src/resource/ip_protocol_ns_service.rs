//! `nsxt_ip_protocol_ns_service`

use std::collections::BTreeMap;

use nsxt_sdk::{IpProtocolNsServiceEntry, NsServiceElement};

use super::NsServiceKind;
use super::ns_service::required_int;
use crate::error::Result;
use crate::model::{DesiredState, Value};
use crate::schema::{AttributeSpec, AttributeType, ResourceSpec};

pub struct IpProtocol;

impl NsServiceKind for IpProtocol {
    const TYPE_NAME: &'static str = "nsxt_ip_protocol_ns_service";
    const ELEMENT: &'static str = "IPProtocolNSService";

    fn spec() -> ResourceSpec {
        ResourceSpec::ns_service(Self::TYPE_NAME, "NS service matching an IP protocol number")
            .attribute(
                AttributeSpec::required("protocol", AttributeType::Int)
                    .int_range(0, 255)
                    .describe("IP protocol number"),
            )
    }

    fn element(desired: &DesiredState) -> Result<NsServiceElement> {
        Ok(NsServiceElement::IpProtocol(IpProtocolNsServiceEntry {
            protocol_number: required_int(Self::TYPE_NAME, desired, "protocol")?,
        }))
    }

    fn attributes(element: &NsServiceElement) -> Option<BTreeMap<String, Value>> {
        match element {
            NsServiceElement::IpProtocol(entry) => Some(BTreeMap::from([(
                "protocol".to_string(),
                Value::Int(entry.protocol_number),
            )])),
            _ => None,
        }
    }
}
