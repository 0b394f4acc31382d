//! `nsxt_l4_port_set_ns_service`

use std::collections::{BTreeMap, BTreeSet};

use nsxt_sdk::{L4PortSetNsServiceEntry, NsServiceElement};

use super::NsServiceKind;
use super::ns_service::required_string;
use crate::error::Result;
use crate::model::{DesiredState, Value};
use crate::schema::{AttributeSpec, AttributeType, ResourceSpec};

pub struct L4PortSet;

fn port_set(name: &'static str, description: &'static str) -> AttributeSpec {
    AttributeSpec::optional(name, AttributeType::StringSet)
        .with_default(Value::StringSet(BTreeSet::new()))
        .ports()
        .describe(description)
}

impl NsServiceKind for L4PortSet {
    const TYPE_NAME: &'static str = "nsxt_l4_port_set_ns_service";
    const ELEMENT: &'static str = "L4PortSetNSService";

    fn spec() -> ResourceSpec {
        ResourceSpec::ns_service(Self::TYPE_NAME, "NS service matching TCP or UDP ports")
            .attribute(
                AttributeSpec::required("protocol", AttributeType::String)
                    .one_of(&["TCP", "UDP"])
                    .force_new()
                    .describe("L4 protocol"),
            )
            .attribute(port_set("destination_ports", "Set of destination ports"))
            .attribute(port_set("source_ports", "Set of source ports"))
    }

    fn element(desired: &DesiredState) -> Result<NsServiceElement> {
        Ok(NsServiceElement::L4PortSet(L4PortSetNsServiceEntry {
            l4_protocol: required_string(Self::TYPE_NAME, desired, "protocol")?,
            source_ports: desired.string_set("source_ports"),
            destination_ports: desired.string_set("destination_ports"),
        }))
    }

    fn attributes(element: &NsServiceElement) -> Option<BTreeMap<String, Value>> {
        let NsServiceElement::L4PortSet(entry) = element else {
            return None;
        };
        let ports = |list: &[String]| Value::StringSet(list.iter().cloned().collect());
        Some(BTreeMap::from([
            ("protocol".to_string(), Value::String(entry.l4_protocol.clone())),
            ("destination_ports".to_string(), ports(&entry.destination_ports)),
            ("source_ports".to_string(), ports(&entry.source_ports)),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::UpdatePolicy;

    #[test]
    fn test_protocol_forces_replacement() {
        let spec = L4PortSet::spec();
        assert_eq!(spec.get("protocol").unwrap().update, UpdatePolicy::Replace);
        assert_eq!(
            spec.get("destination_ports").unwrap().update,
            UpdatePolicy::InPlace
        );
    }

    #[test]
    fn test_ports_compare_as_sets() {
        let element = NsServiceElement::L4PortSet(L4PortSetNsServiceEntry {
            l4_protocol: "TCP".to_string(),
            source_ports: Vec::new(),
            destination_ports: vec!["443".to_string(), "80".to_string(), "80".to_string()],
        });
        let attributes = L4PortSet::attributes(&element).unwrap();
        assert_eq!(
            attributes.get("destination_ports"),
            Some(&Value::StringSet(
                ["80".to_string(), "443".to_string()].into_iter().collect()
            ))
        );
    }
}
