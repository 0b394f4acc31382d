//! `nsxt_ether_type_ns_service`

use std::collections::BTreeMap;

use nsxt_sdk::{EtherTypeNsServiceEntry, NsServiceElement};

use super::NsServiceKind;
use super::ns_service::required_int;
use crate::error::Result;
use crate::model::{DesiredState, Value};
use crate::schema::{AttributeSpec, AttributeType, ResourceSpec};

pub struct EtherType;

impl NsServiceKind for EtherType {
    const TYPE_NAME: &'static str = "nsxt_ether_type_ns_service";
    const ELEMENT: &'static str = "EtherTypeNSService";

    fn spec() -> ResourceSpec {
        ResourceSpec::ns_service(Self::TYPE_NAME, "NS service matching a layer 2 ether type")
            .attribute(
                AttributeSpec::required("ether_type", AttributeType::Int)
                    .int_range(0, 0xffff)
                    .force_new()
                    .describe("Type of the encapsulated protocol"),
            )
    }

    fn element(desired: &DesiredState) -> Result<NsServiceElement> {
        Ok(NsServiceElement::EtherType(EtherTypeNsServiceEntry {
            ether_type: required_int(Self::TYPE_NAME, desired, "ether_type")?,
        }))
    }

    fn attributes(element: &NsServiceElement) -> Option<BTreeMap<String, Value>> {
        match element {
            NsServiceElement::EtherType(entry) => Some(BTreeMap::from([(
                "ether_type".to_string(),
                Value::Int(entry.ether_type),
            )])),
            _ => None,
        }
    }
}
