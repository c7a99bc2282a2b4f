//! Generic objects.

use crate::config::RequestOptions;
use crate::entity::{Entity, EntityCore};
use crate::error::SdkResult;
use crate::paging::PagedList;
use crate::platform::{decode_records, Platform};
use crate::registry::{EntityRegistry, FromRecord};
use crate::request::{Action, ApiRequest, Query, Resource};
use apsdk_protocol::EntityRecord;
use async_trait::async_trait;

/// A record of any schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    core: EntityCore,
}

impl Object {
    /// Creates a new, unsaved object.
    pub fn new(kind: impl Into<String>) -> Self {
        Self::from_core(EntityCore::new(kind))
    }

    /// Creates a stub for an existing object. Nothing is fetched.
    pub fn stub(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::from_core(EntityCore::stub(kind, id))
    }

    pub(crate) fn from_core(core: EntityCore) -> Self {
        Self { core }
    }

    /// Reads an object by id.
    pub async fn get(
        platform: &Platform,
        kind: &str,
        id: &str,
        options: &RequestOptions,
    ) -> SdkResult<Self> {
        let record = platform
            .get_record(Resource::Object, kind, id, options)
            .await?;
        Self::from_record(record, platform.registry())
    }

    /// Deletes an object by id.
    pub async fn delete(
        platform: &Platform,
        kind: &str,
        id: &str,
        options: &RequestOptions,
    ) -> SdkResult<()> {
        platform
            .delete_record(Resource::Object, kind, id, options)
            .await
    }

    /// Deletes several objects of one schema.
    pub async fn bulk_delete(
        platform: &Platform,
        kind: &str,
        ids: &[String],
        options: &RequestOptions,
    ) -> SdkResult<()> {
        platform
            .bulk_delete(Resource::Object, kind, ids, options)
            .await
    }

    /// Lists objects matching a query.
    pub async fn find_all(
        platform: &Platform,
        kind: &str,
        query: Query,
        options: &RequestOptions,
    ) -> SdkResult<PagedList<Self>> {
        let request = ApiRequest::new(Resource::Object, Action::Find, kind)
            .with_query(query)
            .with_options(options);
        platform.paged(request, decode_records::<Self>).await
    }
}

impl FromRecord for Object {
    fn from_record(record: EntityRecord, _registry: &EntityRegistry) -> SdkResult<Self> {
        Ok(Self::from_core(EntityCore::from_record(record)))
    }
}

#[async_trait]
impl Entity for Object {
    fn resource(&self) -> Resource {
        Resource::Object
    }

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }
}
