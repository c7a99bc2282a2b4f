//! Delta update payloads.

use crate::error::{ProtocolError, ProtocolResult};
use crate::record::is_system_key;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

const ATTRIBUTES: &str = "__attributes";
const ADD_TAGS: &str = "__addtags";
const REMOVE_TAGS: &str = "__removetags";

/// Minimal update sent for an existing entity.
///
/// Changed properties sit at the top level. A `None` value clears the
/// property on the server. Attribute removals are encoded as null.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatchRecord {
    /// Changed properties.
    pub properties: BTreeMap<String, Option<String>>,
    /// Changed attributes. `None` removes the attribute.
    pub attributes: BTreeMap<String, Option<String>>,
    /// Tags to add.
    pub add_tags: BTreeSet<String>,
    /// Tags to remove.
    pub remove_tags: BTreeSet<String>,
}

impl PatchRecord {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the patch carries no change.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
            && self.attributes.is_empty()
            && self.add_tags.is_empty()
            && self.remove_tags.is_empty()
    }

    /// Encodes to a JSON object. Empty sections are omitted.
    pub fn encode(&self) -> Value {
        let mut map = Map::new();
        for (name, value) in &self.properties {
            map.insert(name.clone(), opt_to_value(value));
        }
        if !self.attributes.is_empty() {
            let attrs = self
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), opt_to_value(v)))
                .collect();
            map.insert(ATTRIBUTES.into(), Value::Object(attrs));
        }
        if !self.add_tags.is_empty() {
            map.insert(ADD_TAGS.into(), tags_to_value(&self.add_tags));
        }
        if !self.remove_tags.is_empty() {
            map.insert(REMOVE_TAGS.into(), tags_to_value(&self.remove_tags));
        }
        Value::Object(map)
    }

    /// Decodes from a JSON object. Unknown system keys are ignored.
    pub fn decode(value: &Value) -> ProtocolResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| ProtocolError::invalid_structure("expected object for patch"))?;

        let mut patch = Self::new();
        for (key, value) in map {
            if is_system_key(key) {
                continue;
            }
            patch.properties.insert(key.clone(), value_to_opt(value)?);
        }

        match map.get(ATTRIBUTES) {
            None | Some(Value::Null) => {}
            Some(Value::Object(attrs)) => {
                for (key, value) in attrs {
                    patch.attributes.insert(key.clone(), value_to_opt(value)?);
                }
            }
            Some(_) => {
                return Err(ProtocolError::invalid_structure(
                    "expected object for __attributes",
                ))
            }
        }

        patch.add_tags = decode_tags(map.get(ADD_TAGS), ADD_TAGS)?;
        patch.remove_tags = decode_tags(map.get(REMOVE_TAGS), REMOVE_TAGS)?;
        Ok(patch)
    }
}

fn opt_to_value(value: &Option<String>) -> Value {
    match value {
        Some(v) => Value::String(v.clone()),
        None => Value::Null,
    }
}

fn value_to_opt(value: &Value) -> ProtocolResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(ProtocolError::invalid_structure(
            "patch values must be scalars",
        )),
    }
}

fn tags_to_value(tags: &BTreeSet<String>) -> Value {
    Value::Array(tags.iter().cloned().map(Value::String).collect())
}

fn decode_tags(value: Option<&Value>, field: &str) -> ProtocolResult<BTreeSet<String>> {
    match value {
        None | Some(Value::Null) => Ok(BTreeSet::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|t| {
                t.as_str().map(str::to_string).ok_or_else(|| {
                    ProtocolError::invalid_structure(format!("{field} must hold strings"))
                })
            })
            .collect(),
        Some(_) => Err(ProtocolError::invalid_structure(format!(
            "expected array for {field}"
        ))),
    }
}
