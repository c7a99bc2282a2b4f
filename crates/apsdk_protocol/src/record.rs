//! Entity payloads.
//!
//! Every entity travels as a flat JSON object. User properties sit at the top
//! level next to system fields, which are prefixed with a double underscore.
//! The `__type` field is the discriminator that selects the entity variant on
//! the client side.

use crate::error::{ProtocolError, ProtocolResult};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

const ID: &str = "__id";
const TYPE: &str = "__type";
const REVISION: &str = "__revision";
const SCHEMA_ID: &str = "__schemaid";
const RELATION_ID: &str = "__relationid";
const CREATED_BY: &str = "__createdby";
const LAST_MODIFIED_BY: &str = "__lastmodifiedby";
const CREATED_AT: &str = "__utcdatecreated";
const UPDATED_AT: &str = "__utclastupdateddate";
const ATTRIBUTES: &str = "__attributes";
const TAGS: &str = "__tags";
const ENDPOINT_A: &str = "__endpointa";
const ENDPOINT_B: &str = "__endpointb";

/// Returns true for keys reserved by the platform.
pub fn is_system_key(key: &str) -> bool {
    key.starts_with("__")
}

/// Wire form of an entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityRecord {
    /// Server-assigned id. `None` for records that were never created.
    pub id: Option<String>,
    /// Schema or relation name (`__type`).
    pub kind: String,
    /// Server revision counter.
    pub revision: u64,
    /// Schema id, when the server reports one.
    pub schema_id: Option<String>,
    /// Relation id, for connections.
    pub relation_id: Option<String>,
    /// Creator.
    pub created_by: Option<String>,
    /// Last modifier.
    pub last_modified_by: Option<String>,
    /// Creation timestamp as sent by the server.
    pub created_at: Option<String>,
    /// Last update timestamp as sent by the server.
    pub updated_at: Option<String>,
    /// User properties. `None` is an explicit null.
    pub properties: BTreeMap<String, Option<String>>,
    /// Attributes.
    pub attributes: BTreeMap<String, String>,
    /// Tags.
    pub tags: BTreeSet<String>,
    /// Connection endpoints (A, B). Present only for connections.
    pub endpoints: Option<(EndpointRecord, EndpointRecord)>,
}

impl EntityRecord {
    /// Creates an empty record of the given kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Sets the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the revision.
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Adds a property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), Some(value.into()));
        self
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Adds a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Sets both connection endpoints.
    pub fn with_endpoints(mut self, a: EndpointRecord, b: EndpointRecord) -> Self {
        self.endpoints = Some((a, b));
        self
    }

    /// Encodes to a JSON object.
    pub fn encode(&self) -> Value {
        let mut map = Map::new();
        map.insert(TYPE.into(), Value::String(self.kind.clone()));
        if let Some(id) = &self.id {
            map.insert(ID.into(), Value::String(id.clone()));
            map.insert(REVISION.into(), Value::String(self.revision.to_string()));
        }
        insert_opt(&mut map, SCHEMA_ID, &self.schema_id);
        insert_opt(&mut map, RELATION_ID, &self.relation_id);
        insert_opt(&mut map, CREATED_BY, &self.created_by);
        insert_opt(&mut map, LAST_MODIFIED_BY, &self.last_modified_by);
        insert_opt(&mut map, CREATED_AT, &self.created_at);
        insert_opt(&mut map, UPDATED_AT, &self.updated_at);

        for (name, value) in &self.properties {
            let value = value.clone().map(Value::String).unwrap_or(Value::Null);
            map.insert(name.clone(), value);
        }

        let attributes: Map<String, Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        map.insert(ATTRIBUTES.into(), Value::Object(attributes));
        map.insert(
            TAGS.into(),
            Value::Array(self.tags.iter().cloned().map(Value::String).collect()),
        );

        if let Some((a, b)) = &self.endpoints {
            map.insert(ENDPOINT_A.into(), a.encode());
            map.insert(ENDPOINT_B.into(), b.encode());
        }

        Value::Object(map)
    }

    /// Decodes from a JSON object.
    ///
    /// Fails with [`ProtocolError::Schema`] when `__type` is missing or null.
    pub fn decode(value: &Value) -> ProtocolResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| ProtocolError::invalid_structure("expected object for entity"))?;

        let kind = match map.get(TYPE) {
            Some(Value::String(kind)) if !kind.trim().is_empty() => kind.clone(),
            _ => return Err(ProtocolError::schema("schema type missing")),
        };

        let revision = match map.get(REVISION) {
            None | Some(Value::Null) => 0,
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| ProtocolError::invalid_structure(format!("invalid revision: {n}")))?,
            Some(Value::String(s)) => s
                .parse()
                .map_err(|_| ProtocolError::invalid_structure(format!("invalid revision: {s}")))?,
            Some(other) => {
                return Err(ProtocolError::invalid_structure(format!(
                    "invalid revision: {other}"
                )))
            }
        };

        let attributes = match map.get(ATTRIBUTES) {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(attrs)) => attrs
                .iter()
                .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
                .collect(),
            Some(_) => {
                return Err(ProtocolError::invalid_structure(
                    "expected object for __attributes",
                ))
            }
        };

        let tags = match map.get(TAGS) {
            None | Some(Value::Null) => BTreeSet::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|t| {
                    t.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| ProtocolError::invalid_structure("tags must be strings"))
                })
                .collect::<ProtocolResult<_>>()?,
            Some(_) => return Err(ProtocolError::invalid_structure("expected array for __tags")),
        };

        let properties = map
            .iter()
            .filter(|(k, _)| !is_system_key(k))
            .map(|(k, v)| (k.clone(), scalar_to_string(v)))
            .collect();

        let endpoints = match (non_null(map.get(ENDPOINT_A)), non_null(map.get(ENDPOINT_B))) {
            (Some(a), Some(b)) => Some((EndpointRecord::decode(a)?, EndpointRecord::decode(b)?)),
            (None, None) => None,
            _ => {
                return Err(ProtocolError::invalid_structure(
                    "connection requires both endpoints",
                ))
            }
        };

        let get_text = |name: &str| map.get(name).and_then(scalar_to_string);

        Ok(Self {
            id: get_text(ID).filter(|id| !id.trim().is_empty()),
            kind,
            revision,
            schema_id: get_text(SCHEMA_ID),
            relation_id: get_text(RELATION_ID),
            created_by: get_text(CREATED_BY),
            last_modified_by: get_text(LAST_MODIFIED_BY),
            created_at: get_text(CREATED_AT),
            updated_at: get_text(UPDATED_AT),
            properties,
            attributes,
            tags,
            endpoints,
        })
    }
}

/// Wire form of one side of a connection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EndpointRecord {
    /// Caller-chosen endpoint label.
    pub label: String,
    /// Id of the referenced record, if it exists.
    pub object_id: Option<String>,
    /// Schema of the referenced record.
    pub kind: Option<String>,
    /// Inline record, sent when the record is created with the connection.
    pub object: Option<Box<EntityRecord>>,
}

impl EndpointRecord {
    /// Creates an endpoint that references an existing record.
    pub fn existing(label: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            object_id: Some(object_id.into()),
            kind: None,
            object: None,
        }
    }

    /// Creates an endpoint that carries a record to be created.
    pub fn inline(label: impl Into<String>, object: EntityRecord) -> Self {
        Self {
            label: label.into(),
            object_id: None,
            kind: Some(object.kind.clone()),
            object: Some(Box::new(object)),
        }
    }

    /// Encodes to a JSON object.
    pub fn encode(&self) -> Value {
        let mut map = Map::new();
        map.insert("label".into(), Value::String(self.label.clone()));
        insert_opt(&mut map, "objectid", &self.object_id);
        insert_opt(&mut map, "type", &self.kind);
        if let Some(object) = &self.object {
            map.insert("object".into(), object.encode());
        }
        Value::Object(map)
    }

    /// Decodes from a JSON object.
    pub fn decode(value: &Value) -> ProtocolResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| ProtocolError::invalid_structure("expected object for endpoint"))?;

        let label = map
            .get("label")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::missing_field("label"))?
            .to_string();

        let object = match non_null(map.get("object")) {
            Some(obj) => Some(Box::new(EntityRecord::decode(obj)?)),
            None => None,
        };

        Ok(Self {
            label,
            object_id: map.get("objectid").and_then(scalar_to_string),
            kind: map.get("type").and_then(scalar_to_string),
            object,
        })
    }
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        map.insert(key.to_string(), Value::String(v.clone()));
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Properties are strings on the wire; other scalars are tolerated.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_flat_object() {
        let value = json!({
            "__id": "1234",
            "__type": "player",
            "__revision": "3",
            "__createdby": "admin",
            "__attributes": {"team": "red"},
            "__tags": ["mvp", "rookie"],
            "name": "jo",
            "score": 42,
            "nickname": null
        });

        let record = EntityRecord::decode(&value).unwrap();
        assert_eq!(record.id.as_deref(), Some("1234"));
        assert_eq!(record.kind, "player");
        assert_eq!(record.revision, 3);
        assert_eq!(record.created_by.as_deref(), Some("admin"));
        assert_eq!(record.attributes.get("team").map(String::as_str), Some("red"));
        assert!(record.tags.contains("mvp"));
        assert_eq!(record.properties.get("name"), Some(&Some("jo".to_string())));
        assert_eq!(record.properties.get("score"), Some(&Some("42".to_string())));
        assert_eq!(record.properties.get("nickname"), Some(&None));
        assert!(!record.properties.contains_key("__createdby"));
    }

    #[test]
    fn numeric_id_and_revision() {
        let record = EntityRecord::decode(&json!({"__id": 77, "__type": "a", "__revision": 5}))
            .unwrap();
        assert_eq!(record.id.as_deref(), Some("77"));
        assert_eq!(record.revision, 5);
    }

    #[test]
    fn missing_type_is_schema_error() {
        let err = EntityRecord::decode(&json!({"__id": "1", "name": "x"})).unwrap_err();
        assert!(matches!(err, ProtocolError::Schema { .. }));

        let err = EntityRecord::decode(&json!({"__type": null})).unwrap_err();
        assert!(matches!(err, ProtocolError::Schema { .. }));
    }

    #[test]
    fn invalid_revision_rejected() {
        let err = EntityRecord::decode(&json!({"__type": "a", "__revision": "x"})).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidStructure { .. }));
    }

    #[test]
    fn new_record_omits_id_and_revision() {
        let value = EntityRecord::new("player").with_property("name", "jo").encode();
        assert!(value.get("__id").is_none());
        assert!(value.get("__revision").is_none());
        assert_eq!(value["name"], "jo");
        assert_eq!(value["__type"], "player");
    }

    #[test]
    fn connection_endpoints() {
        let record = EntityRecord::new("friend").with_endpoints(
            EndpointRecord::existing("me", "1"),
            EndpointRecord::inline("you", EntityRecord::new("person").with_property("n", "b")),
        );
        let decoded = EntityRecord::decode(&record.encode()).unwrap();
        let (a, b) = decoded.endpoints.unwrap();
        assert_eq!(a.object_id.as_deref(), Some("1"));
        assert_eq!(b.kind.as_deref(), Some("person"));
        assert_eq!(b.object.unwrap().properties.get("n"), Some(&Some("b".into())));
    }

    #[test]
    fn single_endpoint_rejected() {
        let value = json!({"__type": "friend", "__endpointa": {"label": "me", "objectid": "1"}});
        assert!(EntityRecord::decode(&value).is_err());
    }

    #[test]
    fn endpoint_requires_label() {
        let err = EndpointRecord::decode(&json!({"objectid": "1"})).unwrap_err();
        assert_eq!(err, ProtocolError::missing_field("label"));
    }
}
