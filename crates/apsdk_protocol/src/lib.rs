//! # apsdk Protocol
//!
//! Wire-level types for the apsdk client.
//!
//! This crate provides:
//! - `EntityRecord` and `EndpointRecord`, the JSON shape of every entity
//! - `PatchRecord` for delta updates
//! - `Status`, `PagingInfo` and `ResponseEnvelope` for responses
//! - The `Serializer` boundary and its JSON implementation
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
mod error;
mod patch;
mod record;
mod serializer;
mod status;

pub use envelope::{GraphNode, ResponseEnvelope};
pub use error::{ProtocolError, ProtocolResult};
pub use patch::PatchRecord;
pub use record::{is_system_key, EndpointRecord, EntityRecord};
pub use serializer::{JsonSerializer, Serializer};
pub use status::{PagingInfo, Status};
