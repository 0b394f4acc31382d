//! Desired state, remote records, and the diff between them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use nsxt_sdk::Tag;
use serde_json::json;

use crate::schema::{AttributeType, ResourceSpec, UpdatePolicy};

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    StringSet(BTreeSet<String>),
    TagSet(BTreeSet<Tag>),
}

impl Value {
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Value::String(_) => AttributeType::String,
            Value::Int(_) => AttributeType::Int,
            Value::Bool(_) => AttributeType::Bool,
            Value::StringSet(_) => AttributeType::StringSet,
            Value::TagSet(_) => AttributeType::TagSet,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// JSON form used in configuration and state documents. Tag sets are
    /// written as a list of `tag` blocks.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => json!(s),
            Value::Int(i) => json!(i),
            Value::Bool(b) => json!(b),
            Value::StringSet(set) => json!(set),
            Value::TagSet(tags) => serde_json::Value::Array(
                tags.iter()
                    .map(|t| json!({"scope": t.scope, "tag": t.tag}))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", b),
            Value::StringSet(set) => {
                let items: Vec<String> = set.iter().map(|s| format!("{:?}", s)).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::TagSet(tags) => {
                let items: Vec<String> = tags
                    .iter()
                    .map(|t| format!("{}={}", t.scope, t.tag))
                    .collect();
                write!(f, "{{{}}}", items.join(", "))
            }
        }
    }
}

/// Validated configuration for one resource. Omitted optional attributes
/// without a default are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    attributes: BTreeMap<String, Value>,
}

impl DesiredState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes.iter()
    }

    pub fn display_name(&self) -> &str {
        self.string("display_name").unwrap_or_default()
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    /// Members of a string set attribute; empty when absent.
    pub fn string_set(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            Some(Value::StringSet(set)) => set.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Members of the `tag` attribute; empty when absent.
    pub fn tags(&self) -> Vec<Tag> {
        match self.get("tag") {
            Some(Value::TagSet(tags)) => tags.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

/// Last-fetched representation of a remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    /// Assigned by the manager at creation; never changes.
    pub id: String,
    pub display_name: String,
    pub revision: i64,
    pub tags: BTreeSet<Tag>,
    /// Schema-mapped attributes other than `display_name` and `tag`.
    pub attributes: BTreeMap<String, Value>,
}

impl RemoteRecord {
    /// Value of a schema attribute as held remotely.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "display_name" => Some(Value::String(self.display_name.clone())),
            "tag" => Some(Value::TagSet(self.tags.clone())),
            _ => self.attributes.get(name).cloned(),
        }
    }

    /// Project onto the attributes `spec` defines, dropping remote-only metadata.
    pub fn project(&self, spec: &ResourceSpec) -> DesiredState {
        let mut desired = DesiredState::new();
        for attr in spec.attributes() {
            if let Some(value) = self.attribute(attr.name) {
                desired.insert(attr.name, value);
            }
        }
        desired
    }
}

/// One differing attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    pub name: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
    pub forces_replacement: bool,
}

/// Attribute-by-attribute difference between desired and remote state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub changes: Vec<AttributeChange>,
}

impl Diff {
    /// Compare every schema attribute. Sets compare by membership.
    pub fn compute(spec: &ResourceSpec, desired: &DesiredState, record: &RemoteRecord) -> Self {
        let changes = spec
            .attributes()
            .iter()
            .filter_map(|attr| {
                let old = record.attribute(attr.name);
                let new = desired.get(attr.name).cloned();
                (old != new).then(|| AttributeChange {
                    name: attr.name.to_string(),
                    old,
                    new,
                    forces_replacement: attr.update == UpdatePolicy::Replace,
                })
            })
            .collect();
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn requires_replace(&self) -> bool {
        self.changes.iter().any(|c| c.forces_replacement)
    }

    pub fn changed_attributes(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Outcome of a reconciliation step. Transport failures are returned as
/// errors rather than outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationResult {
    NoChange,
    Created(String),
    Updated,
    /// An immutable attribute changed; the object was destroyed and recreated.
    Replaced { previous: String, id: String },
    Destroyed,
    NotFound,
}

impl fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationResult::NoChange => write!(f, "no change"),
            ReconciliationResult::Created(id) => write!(f, "created {}", id),
            ReconciliationResult::Updated => write!(f, "updated"),
            ReconciliationResult::Replaced { previous, id } => {
                write!(f, "replaced {} with {}", previous, id)
            }
            ReconciliationResult::Destroyed => write!(f, "destroyed"),
            ReconciliationResult::NotFound => write!(f, "not found"),
        }
    }
}
