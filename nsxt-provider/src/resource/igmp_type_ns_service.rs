//! `nsxt_igmp_type_ns_service`

use std::collections::BTreeMap;

use nsxt_sdk::NsServiceElement;

use super::NsServiceKind;
use crate::error::Result;
use crate::model::{DesiredState, Value};
use crate::schema::ResourceSpec;

pub struct IgmpType;

impl NsServiceKind for IgmpType {
    const TYPE_NAME: &'static str = "nsxt_igmp_type_ns_service";
    const ELEMENT: &'static str = "IGMPTypeNSService";

    fn spec() -> ResourceSpec {
        ResourceSpec::ns_service(Self::TYPE_NAME, "NS service matching IGMP traffic")
    }

    fn element(_desired: &DesiredState) -> Result<NsServiceElement> {
        Ok(NsServiceElement::IgmpType)
    }

    fn attributes(element: &NsServiceElement) -> Option<BTreeMap<String, Value>> {
        matches!(element, NsServiceElement::IgmpType).then(BTreeMap::new)
    }
}
