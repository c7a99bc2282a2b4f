//! Property store with change tracking.
//!
//! A [`PropertyStore`] holds the current properties, attributes and tags of
//! one entity together with four change logs: changed properties, changed
//! attributes, added tags and removed tags. The logs always describe the net
//! effect of the setters called since the last commit:
//!
//! - repeated writes to a property or attribute collapse to the last value
//! - a removal followed by a write is a single update
//! - tagging a name queued for removal cancels the removal, and untagging a
//!   name queued for addition cancels the addition
//!
//! The store is owned by a single entity and is not synchronized.

use crate::error::{SdkError, SdkResult};
use apsdk_protocol::PatchRecord;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Current state plus change logs for one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyStore {
    properties: BTreeMap<String, Option<String>>,
    attributes: BTreeMap<String, String>,
    tags: BTreeSet<String>,
    changed_properties: BTreeMap<String, Option<String>>,
    changed_attributes: BTreeMap<String, Option<String>>,
    added_tags: BTreeSet<String>,
    removed_tags: BTreeSet<String>,
}

impl PropertyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clean store from server state.
    pub fn from_parts(
        properties: BTreeMap<String, Option<String>>,
        attributes: BTreeMap<String, String>,
        tags: BTreeSet<String>,
    ) -> Self {
        Self {
            properties,
            attributes,
            tags,
            ..Default::default()
        }
    }

    /// Reads a property and parses it.
    ///
    /// Returns `Ok(None)` when the property is absent or null, and
    /// [`SdkError::InvalidFormat`] when the stored text does not parse.
    pub fn get<T: FromStr>(&self, name: &str) -> SdkResult<Option<T>> {
        match self.raw(name) {
            None => Ok(None),
            Some(value) => value.parse::<T>().map(Some).map_err(|_| {
                SdkError::invalid_format(name, value, std::any::type_name::<T>())
            }),
        }
    }

    /// Returns the stored text of a property.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|v| v.as_deref())
    }

    /// Returns true if the property is present, even if null.
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Writes a property.
    pub fn set(&mut self, name: impl Into<String>, value: impl ToString) {
        self.set_raw(name, Some(value.to_string()));
    }

    /// Writes a property, where `None` stores an explicit null.
    pub fn set_raw(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        self.properties.insert(name.clone(), value.clone());
        self.changed_properties.insert(name, value);
    }

    /// Clears a property on the server by writing null.
    pub fn remove(&mut self, name: &str) {
        self.set_raw(name, None);
    }

    /// Iterates over properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Returns an attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Writes an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        self.attributes.insert(name.clone(), value.clone());
        self.changed_attributes.insert(name, Some(value));
    }

    /// Removes an attribute.
    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.remove(name);
        self.changed_attributes.insert(name.to_string(), None);
    }

    /// Returns all attributes.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Returns true if the tag is set.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Returns all tags.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Adds a tag.
    pub fn tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if self.removed_tags.remove(&tag) {
            self.tags.insert(tag);
            return;
        }
        if self.tags.insert(tag.clone()) {
            self.added_tags.insert(tag);
        }
    }

    /// Removes a tag.
    ///
    /// A tag not known locally is still queued for removal, since a stub
    /// entity does not hold the server's tags.
    pub fn untag(&mut self, tag: &str) {
        self.tags.remove(tag);
        if !self.added_tags.remove(tag) {
            self.removed_tags.insert(tag.to_string());
        }
    }

    /// Returns true if any change log is non-empty.
    pub fn is_dirty(&self) -> bool {
        !(self.changed_properties.is_empty()
            && self.changed_attributes.is_empty()
            && self.added_tags.is_empty()
            && self.removed_tags.is_empty())
    }

    /// Copies the change logs without clearing them.
    pub fn snapshot_delta(&self) -> Delta {
        Delta {
            properties: self.changed_properties.clone(),
            attributes: self.changed_attributes.clone(),
            added_tags: self.added_tags.clone(),
            removed_tags: self.removed_tags.clone(),
        }
    }

    /// Clears the change logs.
    pub fn commit(&mut self) {
        self.changed_properties.clear();
        self.changed_attributes.clear();
        self.added_tags.clear();
        self.removed_tags.clear();
    }
}

/// Immutable snapshot of a store's change logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    properties: BTreeMap<String, Option<String>>,
    attributes: BTreeMap<String, Option<String>>,
    added_tags: BTreeSet<String>,
    removed_tags: BTreeSet<String>,
}

impl Delta {
    /// Returns true if the delta carries no change.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
            && self.attributes.is_empty()
            && self.added_tags.is_empty()
            && self.removed_tags.is_empty()
    }

    /// Changed properties. `None` clears the property.
    pub fn properties(&self) -> &BTreeMap<String, Option<String>> {
        &self.properties
    }

    /// Changed attributes. `None` removes the attribute.
    pub fn attributes(&self) -> &BTreeMap<String, Option<String>> {
        &self.attributes
    }

    /// Tags to add.
    pub fn added_tags(&self) -> &BTreeSet<String> {
        &self.added_tags
    }

    /// Tags to remove.
    pub fn removed_tags(&self) -> &BTreeSet<String> {
        &self.removed_tags
    }

    /// Builds the wire patch.
    pub fn to_patch(&self) -> PatchRecord {
        PatchRecord {
            properties: self.properties.clone(),
            attributes: self.attributes.clone(),
            add_tags: self.added_tags.clone(),
            remove_tags: self.removed_tags.clone(),
        }
    }
}
