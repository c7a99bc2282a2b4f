//! Property-based test generators using proptest.
//!
//! Names are drawn from small pools so that generated operation sequences
//! hit the same property, attribute or tag repeatedly.

use apsdk_core::PropertyStore;
use apsdk_protocol::EntityRecord;
use proptest::prelude::*;

const PROPERTY_NAMES: [&str; 4] = ["name", "score", "level", "title"];
const ATTRIBUTE_NAMES: [&str; 3] = ["team", "region", "tier"];
const TAGS: [&str; 4] = ["red", "blue", "mvp", "rookie"];

/// One mutation of a property store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// `set(name, value)`.
    Set(String, String),
    /// `remove(name)`.
    Remove(String),
    /// `set_attribute(name, value)`.
    SetAttribute(String, String),
    /// `remove_attribute(name)`.
    RemoveAttribute(String),
    /// `tag(name)`.
    Tag(String),
    /// `untag(name)`.
    Untag(String),
}

impl StoreOp {
    /// Applies the operation.
    pub fn apply(&self, store: &mut PropertyStore) {
        match self {
            StoreOp::Set(name, value) => store.set(name.as_str(), value),
            StoreOp::Remove(name) => store.remove(name),
            StoreOp::SetAttribute(name, value) => store.set_attribute(name.as_str(), value.as_str()),
            StoreOp::RemoveAttribute(name) => store.remove_attribute(name),
            StoreOp::Tag(tag) => store.tag(tag.as_str()),
            StoreOp::Untag(tag) => store.untag(tag),
        }
    }
}

/// Strategy for property names.
pub fn property_name_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(PROPERTY_NAMES.to_vec()).prop_map(str::to_string)
}

/// Strategy for attribute names.
pub fn attribute_name_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(ATTRIBUTE_NAMES.to_vec()).prop_map(str::to_string)
}

/// Strategy for tag names.
pub fn tag_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(TAGS.to_vec()).prop_map(str::to_string)
}

/// Strategy for property values.
pub fn property_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]{0,6}").expect("Invalid regex")
}

/// Strategy for a single store operation.
pub fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        3 => (property_name_strategy(), property_value_strategy())
            .prop_map(|(n, v)| StoreOp::Set(n, v)),
        1 => property_name_strategy().prop_map(StoreOp::Remove),
        2 => (attribute_name_strategy(), property_value_strategy())
            .prop_map(|(n, v)| StoreOp::SetAttribute(n, v)),
        1 => attribute_name_strategy().prop_map(StoreOp::RemoveAttribute),
        2 => tag_strategy().prop_map(StoreOp::Tag),
        2 => tag_strategy().prop_map(StoreOp::Untag),
    ]
}

/// Strategy for operation sequences of up to `max_len` steps.
pub fn store_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<StoreOp>> {
    prop::collection::vec(store_op_strategy(), 0..=max_len)
}

/// Strategy for a synced record of `kind` with a random property, attribute
/// and tag baseline.
pub fn synced_record_strategy(kind: &'static str) -> impl Strategy<Value = EntityRecord> {
    (
        prop::collection::btree_map(property_name_strategy(), property_value_strategy(), 0..4),
        prop::collection::btree_map(attribute_name_strategy(), property_value_strategy(), 0..3),
        prop::collection::btree_set(tag_strategy(), 0..4),
        1u64..50,
    )
        .prop_map(move |(properties, attributes, tags, revision)| {
            let mut record = EntityRecord::new(kind)
                .with_id(uuid::Uuid::new_v4().to_string())
                .with_revision(revision);
            record.properties = properties.into_iter().map(|(k, v)| (k, Some(v))).collect();
            record.attributes = attributes;
            record.tags = tags;
            record
        })
}
