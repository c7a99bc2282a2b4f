//! Entity type resolution.
//!
//! Payloads carry their type in `__type`. The registry maps that name to a
//! decoder producing one of the closed set of [`AnyEntity`] variants. Names
//! are matched case-insensitively.

use crate::article::Article;
use crate::connection::Connection;
use crate::device::Device;
use crate::entity::EntityCore;
use crate::error::{SdkError, SdkResult};
use crate::object::Object;
use crate::user::User;
use apsdk_protocol::EntityRecord;
use serde_json::Value;
use std::collections::HashMap;

/// Decodes a record into an entity.
pub type Decoder = fn(EntityRecord) -> SdkResult<AnyEntity>;

/// Builds a typed entity from a server record.
pub trait FromRecord: Sized + Send + 'static {
    /// Converts a record, using `registry` when the target is polymorphic.
    fn from_record(record: EntityRecord, registry: &EntityRegistry) -> SdkResult<Self>;
}

/// Any entity the platform can return.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyEntity {
    /// Generic object.
    Object(Object),
    /// Schema-typed article.
    Article(Article),
    /// Connection.
    Connection(Connection),
    /// Device.
    Device(Device),
    /// User.
    User(User),
}

impl AnyEntity {
    /// Shared state of the wrapped entity.
    pub fn core(&self) -> &EntityCore {
        use crate::entity::Entity;
        match self {
            AnyEntity::Object(e) => e.core(),
            AnyEntity::Article(e) => e.core(),
            AnyEntity::Connection(e) => e.core(),
            AnyEntity::Device(e) => e.core(),
            AnyEntity::User(e) => e.core(),
        }
    }

    /// Type name.
    pub fn kind(&self) -> &str {
        self.core().kind()
    }

    /// Server id.
    pub fn id(&self) -> Option<&str> {
        self.core().id()
    }

    fn variant(&self) -> &'static str {
        match self {
            AnyEntity::Object(_) => "object",
            AnyEntity::Article(_) => "article",
            AnyEntity::Connection(_) => "connection",
            AnyEntity::Device(_) => "device",
            AnyEntity::User(_) => "user",
        }
    }
}

impl FromRecord for AnyEntity {
    fn from_record(record: EntityRecord, registry: &EntityRegistry) -> SdkResult<Self> {
        registry.decode(record)
    }
}

macro_rules! any_entity_conversions {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for AnyEntity {
                fn from(entity: $variant) -> Self {
                    AnyEntity::$variant(entity)
                }
            }

            impl TryFrom<AnyEntity> for $variant {
                type Error = SdkError;

                fn try_from(entity: AnyEntity) -> Result<Self, Self::Error> {
                    match entity {
                        AnyEntity::$variant(e) => Ok(e),
                        other => Err(SdkError::Schema(format!(
                            "expected {} but found {} of type {}",
                            stringify!($variant).to_ascii_lowercase(),
                            other.variant(),
                            other.kind()
                        ))),
                    }
                }
            }
        )*
    };
}

any_entity_conversions!(Object, Article, Connection, Device, User);

/// Maps `__type` names to decoders.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    decoders: HashMap<String, Decoder>,
    fallback: bool,
}

impl EntityRegistry {
    /// Creates the default registry.
    ///
    /// `user` and `device` decode to their own types. Other names decode to a
    /// [`Connection`] when the payload has endpoints and to an [`Object`]
    /// otherwise.
    pub fn new() -> Self {
        Self::empty()
            .with_fallback(true)
            .with("user", |r| Ok(AnyEntity::User(User::from_core(EntityCore::from_record(r)))))
            .with("device", |r| {
                Ok(AnyEntity::Device(Device::from_core(EntityCore::from_record(r))))
            })
    }

    /// Creates a registry with no decoders. Every name is rejected until
    /// registered.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
            fallback: false,
        }
    }

    /// Enables or disables decoding of unregistered names.
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    /// Registers a decoder.
    pub fn with(mut self, kind: &str, decoder: Decoder) -> Self {
        self.register(kind, decoder);
        self
    }

    /// Registers a decoder, replacing any previous one for the name.
    pub fn register(&mut self, kind: &str, decoder: Decoder) {
        self.decoders.insert(kind.to_ascii_lowercase(), decoder);
    }

    /// Returns true if a decoder is registered for the name.
    pub fn contains(&self, kind: &str) -> bool {
        self.decoders.contains_key(&kind.to_ascii_lowercase())
    }

    /// Decodes a record by its type name.
    pub fn decode(&self, record: EntityRecord) -> SdkResult<AnyEntity> {
        if let Some(decoder) = self.decoders.get(&record.kind.to_ascii_lowercase()) {
            return decoder(record);
        }
        if !self.fallback {
            return Err(SdkError::Schema(format!(
                "unknown entity type: {}",
                record.kind
            )));
        }
        if record.endpoints.is_some() {
            Ok(AnyEntity::Connection(Connection::from_wire(record)))
        } else {
            Ok(AnyEntity::Object(Object::from_core(EntityCore::from_record(record))))
        }
    }

    /// Decodes a JSON payload.
    pub fn decode_value(&self, value: &Value) -> SdkResult<AnyEntity> {
        self.decode(EntityRecord::decode(value)?)
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
