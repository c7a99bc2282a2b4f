//! Entity core and the save/fetch protocol.
//!
//! Every entity type wraps an [`EntityCore`] and implements [`Entity`]. The
//! trait supplies `save` and `fetch` on top of four hooks that a type can
//! override: `create_new`, `update_existing`, `fetch_existing` and
//! `apply_record`.
//!
//! Save rules:
//! - a new entity (no id, blank id or `"0"`) is created
//! - an existing entity sends its delta as a patch
//! - an empty delta without `force` returns without a network call
//! - on success the entity takes the server's record and its logs are cleared
//! - on failure nothing local changes, so a retry resends the same delta
//!
//! An expected revision of `0` skips the server's revision check.

use crate::config::RequestOptions;
use crate::error::{SdkError, SdkResult};
use crate::platform::Platform;
use crate::request::{Action, Resource};
use crate::store::{Delta, PropertyStore};
use apsdk_protocol::EntityRecord;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{debug, info};

/// Returns true if `id` marks an entity that was never created.
pub fn is_new_id(id: Option<&str>) -> bool {
    match id {
        None => true,
        Some(id) => id.trim().is_empty() || id == "0",
    }
}

/// Identity, revision, system fields and property store of an entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityCore {
    id: Option<String>,
    kind: String,
    revision: u64,
    schema_id: Option<String>,
    created_by: Option<String>,
    last_modified_by: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
    store: PropertyStore,
}

impl EntityCore {
    /// Creates a new, unsaved entity of the given type.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Creates a stub that references an existing record by id.
    pub fn stub(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Creates a synced entity from a server record.
    pub fn from_record(record: EntityRecord) -> Self {
        let mut core = Self::new(record.kind.clone());
        core.replace_with(record);
        core
    }

    /// Replaces all state with a server record. The change logs end up empty.
    pub fn replace_with(&mut self, record: EntityRecord) {
        self.id = record.id;
        self.kind = record.kind;
        self.revision = record.revision;
        self.schema_id = record.schema_id;
        self.created_by = record.created_by;
        self.last_modified_by = record.last_modified_by;
        self.created_at = record.created_at;
        self.updated_at = record.updated_at;
        self.store = PropertyStore::from_parts(record.properties, record.attributes, record.tags);
    }

    /// Builds the full record sent on create.
    pub fn to_record(&self) -> EntityRecord {
        EntityRecord {
            id: self.id.clone().filter(|id| !is_new_id(Some(id))),
            kind: self.kind.clone(),
            revision: self.revision,
            schema_id: self.schema_id.clone(),
            properties: self
                .store
                .properties()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect(),
            attributes: self.store.attributes().clone(),
            tags: self.store.tags().clone(),
            ..Default::default()
        }
    }

    /// Server id.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Server id, or a validation error for unsaved entities.
    pub fn require_id(&self) -> SdkResult<&str> {
        match self.id.as_deref() {
            Some(id) if !is_new_id(Some(id)) => Ok(id),
            _ => Err(SdkError::validation(format!(
                "{} has not been created yet",
                self.kind
            ))),
        }
    }

    /// Schema or relation name.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Server revision.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns true if the entity was never created.
    pub fn is_new(&self) -> bool {
        is_new_id(self.id.as_deref())
    }

    /// Schema id reported by the server.
    pub fn schema_id(&self) -> Option<&str> {
        self.schema_id.as_deref()
    }

    /// Creator.
    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    /// Last modifier.
    pub fn last_modified_by(&self) -> Option<&str> {
        self.last_modified_by.as_deref()
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }

    /// Last update timestamp.
    pub fn updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }

    /// Property store.
    pub fn store(&self) -> &PropertyStore {
        &self.store
    }

    /// Mutable property store.
    pub fn store_mut(&mut self) -> &mut PropertyStore {
        &mut self.store
    }

    pub(crate) fn assign_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
        self.store.commit();
    }
}

/// A change-tracked record on the platform.
#[async_trait]
pub trait Entity: Send + Sync {
    /// Resource family used for requests.
    fn resource(&self) -> Resource;

    /// Shared state.
    fn core(&self) -> &EntityCore;

    /// Mutable shared state.
    fn core_mut(&mut self) -> &mut EntityCore;

    /// Checks local state before a save. Runs before any network call.
    fn validate(&self) -> SdkResult<()> {
        Ok(())
    }

    /// Creates the record on the server and returns the canonical record.
    async fn create_new(
        &self,
        platform: &Platform,
        options: &RequestOptions,
    ) -> SdkResult<EntityRecord> {
        platform
            .create_record(self.resource(), Action::Create, &self.core().to_record(), options)
            .await
    }

    /// Sends a delta and returns the canonical record.
    async fn update_existing(
        &self,
        platform: &Platform,
        delta: &Delta,
        expected_revision: u64,
        options: &RequestOptions,
    ) -> SdkResult<EntityRecord> {
        let core = self.core();
        platform
            .update_record(
                self.resource(),
                core.kind(),
                core.require_id()?,
                &delta.to_patch(),
                expected_revision,
                options,
            )
            .await
    }

    /// Reads the canonical record by id.
    async fn fetch_existing(
        &self,
        platform: &Platform,
        options: &RequestOptions,
    ) -> SdkResult<EntityRecord> {
        let core = self.core();
        platform
            .get_record(self.resource(), core.kind(), core.require_id()?, options)
            .await
    }

    /// Replaces local state with a canonical record.
    fn apply_record(&mut self, record: EntityRecord) -> SdkResult<()> {
        self.core_mut().replace_with(record);
        Ok(())
    }

    /// Creates or updates the entity.
    ///
    /// `expected_revision` of `0` skips the revision check. With `force`
    /// an empty delta is still sent.
    async fn save(
        &mut self,
        platform: &Platform,
        expected_revision: u64,
        force: bool,
        options: &RequestOptions,
    ) -> SdkResult<()> {
        self.validate()?;

        let created = self.core().is_new();
        let record = if created {
            self.create_new(platform, options).await?
        } else {
            let delta = self.core().store().snapshot_delta();
            if delta.is_empty() && !force {
                debug!(kind = %self.core().kind(), id = ?self.core().id(), "nothing to save");
                return Ok(());
            }
            self.update_existing(platform, &delta, expected_revision, options)
                .await?
        };

        self.apply_record(record)?;
        if created {
            info!(kind = %self.core().kind(), id = ?self.core().id(), "created entity");
        }
        Ok(())
    }

    /// Replaces local state with the server's current record.
    async fn fetch(&mut self, platform: &Platform, options: &RequestOptions) -> SdkResult<()> {
        let record = self.fetch_existing(platform, options).await?;
        self.apply_record(record)
    }

    /// Server id.
    fn id(&self) -> Option<&str> {
        self.core().id()
    }

    /// Schema or relation name.
    fn kind(&self) -> &str {
        self.core().kind()
    }

    /// Server revision.
    fn revision(&self) -> u64 {
        self.core().revision()
    }

    /// Returns true if the entity was never created.
    fn is_new(&self) -> bool {
        self.core().is_new()
    }

    /// Returns true if there are unsaved changes.
    fn is_dirty(&self) -> bool {
        self.core().store().is_dirty()
    }

    /// Reads and parses a property.
    fn get<T: FromStr>(&self, name: &str) -> SdkResult<Option<T>>
    where
        Self: Sized,
    {
        self.core().store().get(name)
    }

    /// Writes a property.
    fn set(&mut self, name: &str, value: impl ToString)
    where
        Self: Sized,
    {
        self.core_mut().store_mut().set(name, value);
    }

    /// Clears a property.
    fn remove(&mut self, name: &str) {
        self.core_mut().store_mut().remove(name);
    }

    /// Returns an attribute.
    fn attribute(&self, name: &str) -> Option<&str> {
        self.core().store().attribute(name)
    }

    /// Writes an attribute.
    fn set_attribute(&mut self, name: &str, value: &str) {
        self.core_mut().store_mut().set_attribute(name, value);
    }

    /// Removes an attribute.
    fn remove_attribute(&mut self, name: &str) {
        self.core_mut().store_mut().remove_attribute(name);
    }

    /// Returns the tags.
    fn tags(&self) -> &BTreeSet<String> {
        self.core().store().tags()
    }

    /// Adds a tag.
    fn tag(&mut self, tag: &str) {
        self.core_mut().store_mut().tag(tag);
    }

    /// Removes a tag.
    fn untag(&mut self, tag: &str) {
        self.core_mut().store_mut().untag(tag);
    }
}
