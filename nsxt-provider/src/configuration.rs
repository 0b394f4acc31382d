//! Configuration documents in Terraform JSON syntax.
//!
//! ```json
//! {
//!   "provider": { "nsxt": { "host": "nsx.example.com" } },
//!   "resource": {
//!     "nsxt_icmp_type_ns_service": {
//!       "ping": { "display_name": "ping", "protocol": "ICMPv4", "icmp_type": 8 }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value as Json;

use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};

/// One `resource "<type>" "<name>"` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBlock {
    pub resource_type: String,
    pub name: String,
    pub body: Json,
}

impl ResourceBlock {
    /// `<type>.<name>`
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

/// A parsed configuration document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    pub provider: ProviderConfig,
    /// Ordered by type, then name.
    pub resources: Vec<ResourceBlock>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    #[serde(default)]
    provider: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    resource: BTreeMap<String, BTreeMap<String, Json>>,
    #[serde(default)]
    #[allow(dead_code)]
    terraform: Option<Json>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    pub fn resource(
        mut self,
        resource_type: impl Into<String>,
        name: impl Into<String>,
        body: Json,
    ) -> Self {
        self.resources.push(ResourceBlock {
            resource_type: resource_type.into(),
            name: name.into(),
            body,
        });
        self
    }

    pub fn from_value(value: Json) -> Result<Self> {
        let document: Document = serde_json::from_value(value)
            .map_err(|e| ProviderError::Config(format!("invalid configuration: {}", e)))?;
        Self::from_document(document)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let document: Document = serde_json::from_str(text)
            .map_err(|e| ProviderError::Config(format!("invalid configuration: {}", e)))?;
        Self::from_document(document)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            ProviderError::Config(format!("reading {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    fn from_document(mut document: Document) -> Result<Self> {
        let provider = document.provider.remove("nsxt").unwrap_or_default();
        if let Some(other) = document.provider.keys().next() {
            return Err(ProviderError::Config(format!(
                "provider \"{}\" is not supported",
                other
            )));
        }

        let resources = document
            .resource
            .into_iter()
            .flat_map(|(resource_type, blocks)| {
                blocks.into_iter().map(move |(name, body)| ResourceBlock {
                    resource_type: resource_type.clone(),
                    name,
                    body,
                })
            })
            .collect();

        Ok(Self {
            provider,
            resources,
        })
    }

    pub fn get(&self, address: &str) -> Option<&ResourceBlock> {
        self.resources.iter().find(|r| r.address() == address)
    }
}

/// Split `<type>.<name>`.
pub fn parse_address(address: &str) -> Result<(&str, &str)> {
    match address.split_once('.') {
        Some((resource_type, name)) if !resource_type.is_empty() && !name.is_empty() => {
            Ok((resource_type, name))
        }
        _ => Err(ProviderError::Config(format!(
            "invalid resource address \"{}\", expected <type>.<name>",
            address
        ))),
    }
}
