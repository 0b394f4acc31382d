//! Local state document.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use uuid::Uuid;

use crate::error::{ProviderError, Result};
use crate::model::RemoteRecord;
use crate::schema::ResourceSpec;

pub const STATE_VERSION: u32 = 4;

/// Tracked state of one configured resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub id: String,
    pub attributes: Map<String, Json>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn from_record(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        record: &RemoteRecord,
        spec: &ResourceSpec,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            id: record.id.clone(),
            attributes: record.project(spec).to_json(),
            updated_at: Utc::now(),
        }
    }

    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }

    /// Flat `key -> string` view: sets become `name.#` plus indexed members,
    /// blocks become `name.<i>.<field>`.
    pub fn flatten(&self) -> BTreeMap<String, String> {
        let mut flat = BTreeMap::new();
        flat.insert("id".to_string(), self.id.clone());
        for (key, value) in &self.attributes {
            flatten_into(&mut flat, key, value);
        }
        flat
    }
}

fn flatten_into(flat: &mut BTreeMap<String, String>, key: &str, value: &Json) {
    match value {
        Json::Null => {}
        Json::String(s) => {
            flat.insert(key.to_string(), s.clone());
        }
        Json::Array(items) => {
            flat.insert(format!("{}.#", key), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten_into(flat, &format!("{}.{}", key, i), item);
            }
        }
        Json::Object(fields) => {
            for (field, item) in fields {
                flatten_into(flat, &format!("{}.{}", key, field), item);
            }
        }
        other => {
            flat.insert(key.to_string(), other.to_string());
        }
    }
}

/// The state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub version: u32,
    /// Incremented on every run that changes the document.
    pub serial: u64,
    /// Fixed when the document is first created.
    pub lineage: String,
    #[serde(default)]
    pub resources: Vec<ResourceState>,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl StateDocument {
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            lineage: Uuid::new_v4().to_string(),
            resources: Vec::new(),
        }
    }

    /// Load `path`; a missing file yields an empty document.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => {
                return Err(ProviderError::State(format!(
                    "reading {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let document: StateDocument = serde_json::from_str(&text)
            .map_err(|e| ProviderError::State(format!("parsing {}: {}", path.display(), e)))?;
        if document.version != STATE_VERSION {
            return Err(ProviderError::State(format!(
                "{} has unsupported version {}",
                path.display(),
                document.version
            )));
        }
        Ok(document)
    }

    /// Write the document. A reader sees either the old or the new file,
    /// never a partial one.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| ProviderError::State(e.to_string()))?
            + "\n";
        tokio::task::spawn_blocking(move || write_atomically(&path, text.as_bytes()))
            .await
            .map_err(|e| ProviderError::State(format!("state writer failed: {}", e)))?
    }

    pub fn get(&self, address: &str) -> Option<&ResourceState> {
        self.resources.iter().find(|r| r.address() == address)
    }

    /// Insert or replace the entry at the same address, keeping the list
    /// ordered by address.
    pub fn upsert(&mut self, resource: ResourceState) {
        let address = resource.address();
        self.resources.retain(|r| r.address() != address);
        self.resources.push(resource);
        self.resources.sort_by_key(|r| r.address());
    }

    pub fn remove(&mut self, address: &str) -> Option<ResourceState> {
        let index = self.resources.iter().position(|r| r.address() == address)?;
        Some(self.resources.remove(index))
    }

    pub fn addresses(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.address()).collect()
    }

    pub fn bump_serial(&mut self) {
        self.serial += 1;
    }
}

/// Write to a temporary file next to `path`, then rename it into place.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let failed =
        |e: std::io::Error| ProviderError::State(format!("writing {}: {}", path.display(), e));

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(failed)?;
    file.write_all(contents).map_err(failed)?;
    file.as_file().sync_all().map_err(failed)?;
    file.persist(path).map_err(|e| failed(e.error))?;
    Ok(())
}
