//! Serialization boundary.
//!
//! The core never touches bytes directly. Requests and responses pass through
//! a [`Serializer`] so the wire encoding can be swapped in tests.

use crate::envelope::ResponseEnvelope;
use crate::error::{ProtocolError, ProtocolResult};
use serde_json::Value;

/// Converts between JSON values and wire bytes.
pub trait Serializer: Send + Sync {
    /// Serializes a value.
    fn serialize(&self, value: &Value) -> ProtocolResult<Vec<u8>>;

    /// Deserializes bytes.
    fn deserialize(&self, bytes: &[u8]) -> ProtocolResult<Value>;

    /// MIME type of the produced bytes.
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    /// Deserializes a response envelope.
    fn decode_envelope(&self, bytes: &[u8]) -> ProtocolResult<ResponseEnvelope> {
        ResponseEnvelope::decode(&self.deserialize(bytes)?)
    }

    /// Serializes a response envelope.
    fn encode_envelope(&self, envelope: &ResponseEnvelope) -> ProtocolResult<Vec<u8>> {
        self.serialize(&envelope.encode()?)
    }
}

/// JSON serializer backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    /// Creates a JSON serializer.
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| ProtocolError::encoding(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> ProtocolResult<Value> {
        if bytes.is_empty() {
            return Err(ProtocolError::decoding("empty payload"));
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EntityRecord;
    use serde_json::json;

    #[test]
    fn json_bytes() {
        let serializer = JsonSerializer::new();
        let bytes = serializer.serialize(&json!({"a": 1})).unwrap();
        assert_eq!(serializer.deserialize(&bytes).unwrap(), json!({"a": 1}));
        assert_eq!(serializer.content_type(), "application/json");
    }

    #[test]
    fn empty_payload_rejected() {
        let err = JsonSerializer.deserialize(&[]).unwrap_err();
        assert!(matches!(err, ProtocolError::Decoding { .. }));
    }

    #[test]
    fn envelope_through_bytes() {
        let serializer = JsonSerializer;
        let envelope = ResponseEnvelope::success()
            .with_record("object", EntityRecord::new("player").with_id("3").with_revision(2));
        let bytes = serializer.encode_envelope(&envelope).unwrap();
        let decoded = serializer.decode_envelope(&bytes).unwrap();
        assert_eq!(decoded.record().unwrap().revision, 2);
    }
}
