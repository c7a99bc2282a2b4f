//! Response envelopes.

use crate::error::{ProtocolError, ProtocolResult};
use crate::record::EntityRecord;
use crate::status::{PagingInfo, Status};
use serde_json::{Map, Value};

/// Payload keys that carry a single entity.
const RECORD_FIELDS: [&str; 5] = ["object", "connection", "article", "device", "user"];

/// Payload keys that carry a list of entities.
const LIST_FIELDS: [&str; 5] = ["objects", "connections", "articles", "devices", "users"];

const NODES: &str = "nodes";
const PAGING: &str = "paginginfo";
const EDGE: &str = "__edge";

/// Every platform response: a status block plus an optional payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    status: Status,
    record: Option<(String, EntityRecord)>,
    records: Option<(String, Vec<EntityRecord>)>,
    nodes: Vec<GraphNode>,
    paging: Option<PagingInfo>,
}

impl ResponseEnvelope {
    /// Creates an envelope with the given status and no payload.
    pub fn new(status: Status) -> Self {
        Self {
            status,
            record: None,
            records: None,
            nodes: Vec::new(),
            paging: None,
        }
    }

    /// Creates a successful envelope with no payload.
    pub fn success() -> Self {
        Self::new(Status::success())
    }

    /// Attaches a single entity under `field` (e.g. `"object"`).
    pub fn with_record(mut self, field: impl Into<String>, record: EntityRecord) -> Self {
        self.record = Some((field.into(), record));
        self
    }

    /// Attaches an entity list under `field` (e.g. `"objects"`).
    pub fn with_records(mut self, field: impl Into<String>, records: Vec<EntityRecord>) -> Self {
        self.records = Some((field.into(), records));
        self
    }

    /// Attaches graph nodes.
    pub fn with_nodes(mut self, nodes: Vec<GraphNode>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Attaches paging metadata.
    pub fn with_paging(mut self, paging: PagingInfo) -> Self {
        self.paging = Some(paging);
        self
    }

    /// Returns the status block.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Returns the single entity payload, if any.
    pub fn record(&self) -> Option<&EntityRecord> {
        self.record.as_ref().map(|(_, r)| r)
    }

    /// Takes the single entity payload.
    pub fn into_record(self) -> Option<EntityRecord> {
        self.record.map(|(_, r)| r)
    }

    /// Returns the entity list payload. Empty when absent.
    pub fn records(&self) -> &[EntityRecord] {
        self.records.as_ref().map(|(_, r)| r.as_slice()).unwrap_or(&[])
    }

    /// Takes the entity list payload.
    pub fn into_records(self) -> Vec<EntityRecord> {
        self.records.map(|(_, r)| r).unwrap_or_default()
    }

    /// Returns graph nodes.
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Takes graph nodes.
    pub fn into_nodes(self) -> Vec<GraphNode> {
        self.nodes
    }

    /// Returns paging metadata.
    pub fn paging(&self) -> Option<PagingInfo> {
        self.paging
    }

    /// Encodes to a JSON object.
    pub fn encode(&self) -> ProtocolResult<Value> {
        let mut map = Map::new();
        let status = serde_json::to_value(&self.status)
            .map_err(|e| ProtocolError::encoding(e.to_string()))?;
        map.insert("status".into(), status);

        if let Some((field, record)) = &self.record {
            map.insert(field.clone(), record.encode());
        }
        if let Some((field, records)) = &self.records {
            map.insert(
                field.clone(),
                Value::Array(records.iter().map(EntityRecord::encode).collect()),
            );
        }
        if !self.nodes.is_empty() {
            map.insert(
                NODES.into(),
                Value::Array(self.nodes.iter().map(GraphNode::encode).collect()),
            );
        }
        if let Some(paging) = &self.paging {
            let paging =
                serde_json::to_value(paging).map_err(|e| ProtocolError::encoding(e.to_string()))?;
            map.insert(PAGING.into(), paging);
        }
        Ok(Value::Object(map))
    }

    /// Decodes from a JSON object. The status block is required.
    pub fn decode(value: &Value) -> ProtocolResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| ProtocolError::invalid_structure("expected object for response"))?;

        let status = map
            .get("status")
            .filter(|v| !v.is_null())
            .ok_or_else(|| ProtocolError::missing_field("status"))?;
        let status: Status = serde_json::from_value(status.clone())?;

        let record = match RECORD_FIELDS
            .iter()
            .find_map(|f| map.get(*f).filter(|v| !v.is_null()).map(|v| (*f, v)))
        {
            Some((field, value)) => Some((field.to_string(), EntityRecord::decode(value)?)),
            None => None,
        };

        let records = match LIST_FIELDS
            .iter()
            .find_map(|f| map.get(*f).filter(|v| !v.is_null()).map(|v| (*f, v)))
        {
            Some((field, value)) => {
                let items = value.as_array().ok_or_else(|| {
                    ProtocolError::invalid_structure(format!("expected array for {field}"))
                })?;
                let decoded = items
                    .iter()
                    .map(EntityRecord::decode)
                    .collect::<ProtocolResult<Vec<_>>>()?;
                Some((field.to_string(), decoded))
            }
            None => None,
        };

        let nodes = match map.get(NODES) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(GraphNode::decode)
                .collect::<ProtocolResult<Vec<_>>>()?,
            Some(_) => return Err(ProtocolError::invalid_structure("expected array for nodes")),
        };

        let paging = match map.get(PAGING) {
            None | Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value(value.clone())?),
        };

        Ok(Self {
            status,
            record,
            records,
            nodes,
            paging,
        })
    }
}

/// An article reached by a graph query, with the connection that led to it.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// The connected article.
    pub article: EntityRecord,
    /// The connection between the queried article and this one.
    pub edge: Option<EntityRecord>,
}

impl GraphNode {
    /// Encodes to a JSON object with the edge under `__edge`.
    pub fn encode(&self) -> Value {
        let mut value = self.article.encode();
        if let (Some(edge), Value::Object(map)) = (&self.edge, &mut value) {
            map.insert(EDGE.into(), edge.encode());
        }
        value
    }

    /// Decodes from a JSON object.
    pub fn decode(value: &Value) -> ProtocolResult<Self> {
        let article = EntityRecord::decode(value)?;
        let edge = match value.get(EDGE).filter(|v| !v.is_null()) {
            Some(edge) => Some(EntityRecord::decode(edge)?),
            None => None,
        };
        Ok(Self { article, edge })
    }
}
