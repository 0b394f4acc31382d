//! Resource schemas and configuration validation.
//!
//! A [`ResourceSpec`] is built once when a resource type is registered and is
//! never mutated afterwards. [`validate`] turns a raw configuration block into
//! a [`DesiredState`] without touching the manager.

use std::collections::BTreeSet;
use std::fmt;

use nsxt_sdk::Tag;
use serde_json::{Map, Value as Json};

use crate::error::ValidationError;
use crate::model::{DesiredState, Value};

/// Attribute value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Int,
    Bool,
    StringSet,
    /// Repeatable `tag { scope, tag }` block.
    TagSet,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::String => "string",
            AttributeType::Int => "number",
            AttributeType::Bool => "bool",
            AttributeType::StringSet => "set of string",
            AttributeType::TagSet => "tag blocks",
        };
        f.write_str(name)
    }
}

/// What changing an attribute does to an existing object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    InPlace,
    /// Destroy and recreate under a new identifier.
    Replace,
}

/// Value constraint checked after type coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    OneOf(&'static [&'static str]),
    IntRange { min: i64, max: i64 },
    /// Every member is a port (`443`) or an inclusive port range (`8000-8080`).
    Ports,
}

/// Schema of a single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub ty: AttributeType,
    pub required: bool,
    pub default: Option<Value>,
    pub constraint: Option<Constraint>,
    pub update: UpdatePolicy,
    pub description: &'static str,
}

impl AttributeSpec {
    pub fn required(name: &'static str, ty: AttributeType) -> Self {
        Self {
            name,
            ty,
            required: true,
            default: None,
            constraint: None,
            update: UpdatePolicy::InPlace,
            description: "",
        }
    }

    pub fn optional(name: &'static str, ty: AttributeType) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty)
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.constraint = Some(Constraint::OneOf(allowed));
        self
    }

    pub fn int_range(mut self, min: i64, max: i64) -> Self {
        self.constraint = Some(Constraint::IntRange { min, max });
        self
    }

    pub fn ports(mut self) -> Self {
        self.constraint = Some(Constraint::Ports);
        self
    }

    pub fn force_new(mut self) -> Self {
        self.update = UpdatePolicy::Replace;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}

/// Immutable schema of one resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    type_name: &'static str,
    description: &'static str,
    attributes: Vec<AttributeSpec>,
}

impl ResourceSpec {
    pub fn new(type_name: &'static str, description: &'static str) -> Self {
        Self {
            type_name,
            description,
            attributes: Vec::new(),
        }
    }

    /// Schema with the attributes every NS service carries.
    pub fn ns_service(type_name: &'static str, description: &'static str) -> Self {
        Self::new(type_name, description)
            .attribute(
                AttributeSpec::required("display_name", AttributeType::String)
                    .describe("The display name of this resource"),
            )
            .attribute(
                AttributeSpec::optional("description", AttributeType::String)
                    .describe("Description of this resource"),
            )
            .attribute(
                AttributeSpec::optional("tag", AttributeType::TagSet)
                    .with_default(Value::TagSet(BTreeSet::new()))
                    .describe("Set of opaque identifiers meaningful to the user"),
            )
    }

    pub fn attribute(mut self, attribute: AttributeSpec) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn get(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Validate a raw configuration block against `spec`.
///
/// Rejects unknown attributes, missing required attributes and type
/// mismatches, then applies defaults. `null` counts as omitted. Numbers given
/// as decimal strings are accepted for int attributes.
pub fn validate(
    raw: &Map<String, Json>,
    spec: &ResourceSpec,
) -> Result<DesiredState, ValidationError> {
    if let Some(unknown) = raw.keys().find(|k| spec.get(k).is_none()) {
        return Err(ValidationError::UnknownAttribute {
            resource_type: spec.type_name.to_string(),
            attribute: unknown.clone(),
        });
    }

    let mut desired = DesiredState::new();
    for attr in spec.attributes() {
        match raw.get(attr.name).filter(|v| !v.is_null()) {
            Some(raw_value) => {
                let value = coerce(spec, attr, raw_value)?;
                check_constraint(spec, attr, &value)?;
                desired.insert(attr.name, value);
            }
            None if attr.required => {
                return Err(ValidationError::MissingAttribute {
                    resource_type: spec.type_name.to_string(),
                    attribute: attr.name.to_string(),
                });
            }
            None => {
                if let Some(default) = &attr.default {
                    desired.insert(attr.name, default.clone());
                }
            }
        }
    }
    Ok(desired)
}

fn json_kind(value: &Json) -> String {
    match value {
        Json::Null => "null".to_string(),
        Json::Bool(_) => "bool".to_string(),
        Json::Number(n) => format!("number {}", n),
        Json::String(s) => format!("string {:?}", s),
        Json::Array(_) => "list".to_string(),
        Json::Object(_) => "object".to_string(),
    }
}

fn coerce(spec: &ResourceSpec, attr: &AttributeSpec, raw: &Json) -> Result<Value, ValidationError> {
    let mismatch = |found: &Json| ValidationError::TypeMismatch {
        resource_type: spec.type_name.to_string(),
        attribute: attr.name.to_string(),
        expected: attr.ty,
        found: json_kind(found),
    };

    match attr.ty {
        AttributeType::String => coerce_string(raw)
            .map(Value::String)
            .ok_or_else(|| mismatch(raw)),
        AttributeType::Int => match raw {
            Json::Number(n) => n.as_i64().map(Value::Int).ok_or_else(|| mismatch(raw)),
            Json::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| mismatch(raw)),
            _ => Err(mismatch(raw)),
        },
        AttributeType::Bool => match raw {
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::String(s) if s == "true" => Ok(Value::Bool(true)),
            Json::String(s) if s == "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch(raw)),
        },
        AttributeType::StringSet => match raw {
            Json::Array(items) => items
                .iter()
                .map(|item| coerce_string(item).ok_or_else(|| mismatch(item)))
                .collect::<Result<BTreeSet<_>, _>>()
                .map(Value::StringSet),
            _ => Err(mismatch(raw)),
        },
        AttributeType::TagSet => {
            let blocks: Vec<&Json> = match raw {
                Json::Array(items) => items.iter().collect(),
                Json::Object(_) => vec![raw],
                _ => return Err(mismatch(raw)),
            };
            blocks
                .into_iter()
                .map(|block| coerce_tag(spec, attr, block).ok_or_else(|| mismatch(block)))
                .collect::<Result<BTreeSet<_>, _>>()
                .map(Value::TagSet)
        }
    }
}

fn coerce_string(raw: &Json) -> Option<String> {
    match raw {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_tag(spec: &ResourceSpec, attr: &AttributeSpec, block: &Json) -> Option<Tag> {
    let fields = block.as_object()?;
    if fields.keys().any(|k| k != "scope" && k != "tag") {
        tracing::debug!(
            resource_type = spec.type_name,
            attribute = attr.name,
            "Tag block has unexpected keys"
        );
        return None;
    }
    let field = |name: &str| match fields.get(name) {
        None | Some(Json::Null) => Some(String::new()),
        Some(value) => coerce_string(value),
    };
    Some(Tag::new(field("scope")?, field("tag")?))
}

fn check_constraint(
    spec: &ResourceSpec,
    attr: &AttributeSpec,
    value: &Value,
) -> Result<(), ValidationError> {
    let invalid = |message: String| ValidationError::InvalidValue {
        resource_type: spec.type_name.to_string(),
        attribute: attr.name.to_string(),
        message,
    };

    match (&attr.constraint, value) {
        (Some(Constraint::OneOf(allowed)), Value::String(s)) => {
            if !allowed.contains(&s.as_str()) {
                return Err(invalid(format!(
                    "expected one of [{}], got {:?}",
                    allowed.join(", "),
                    s
                )));
            }
        }
        (Some(Constraint::IntRange { min, max }), Value::Int(i)) => {
            if i < min || i > max {
                return Err(invalid(format!(
                    "expected to be in the range ({} - {}), got {}",
                    min, max, i
                )));
            }
        }
        (Some(Constraint::Ports), Value::StringSet(ports)) => {
            if let Some(bad) = ports.iter().find(|p| !is_port_or_range(p)) {
                return Err(invalid(format!("{:?} is not a port or port range", bad)));
            }
        }
        _ => {}
    }
    Ok(())
}

fn parse_port(s: &str) -> Option<u16> {
    s.trim().parse::<u16>().ok().filter(|p| *p > 0)
}

/// `443` or `8000-8080`, ports in 1..=65535, range bounds ascending.
pub fn is_port_or_range(s: &str) -> bool {
    match s.split_once('-') {
        Some((low, high)) => match (parse_port(low), parse_port(high)) {
            (Some(low), Some(high)) => low <= high,
            _ => false,
        },
        None => parse_port(s).is_some(),
    }
}
