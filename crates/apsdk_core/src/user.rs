//! Platform users.

use crate::config::RequestOptions;
use crate::entity::{Entity, EntityCore};
use crate::error::{SdkError, SdkResult};
use crate::paging::PagedList;
use crate::platform::{decode_records, Platform};
use crate::registry::{EntityRegistry, FromRecord};
use crate::request::{Action, ApiRequest, Query, Resource};
use apsdk_protocol::EntityRecord;
use async_trait::async_trait;

const KIND: &str = "user";

/// A user record. The schema is always `user`.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    core: EntityCore,
}

impl User {
    /// Creates a new, unsaved user.
    pub fn new() -> Self {
        Self::from_core(EntityCore::new(KIND))
    }

    /// Creates a stub for an existing user. Nothing is fetched.
    pub fn stub(id: impl Into<String>) -> Self {
        Self::from_core(EntityCore::stub(KIND, id))
    }

    pub(crate) fn from_core(core: EntityCore) -> Self {
        Self { core }
    }

    /// Login name.
    pub fn username(&self) -> Option<&str> {
        self.core.store().raw("username")
    }

    /// Sets the login name.
    pub fn set_username(&mut self, username: &str) {
        self.core.store_mut().set("username", username);
    }

    /// Email address.
    pub fn email(&self) -> Option<&str> {
        self.core.store().raw("email")
    }

    /// Sets the email address.
    pub fn set_email(&mut self, email: &str) {
        self.core.store_mut().set("email", email);
    }

    /// First name.
    pub fn first_name(&self) -> Option<&str> {
        self.core.store().raw("firstname")
    }

    /// Sets the first name.
    pub fn set_first_name(&mut self, name: &str) {
        self.core.store_mut().set("firstname", name);
    }

    /// Last name.
    pub fn last_name(&self) -> Option<&str> {
        self.core.store().raw("lastname")
    }

    /// Sets the last name.
    pub fn set_last_name(&mut self, name: &str) {
        self.core.store_mut().set("lastname", name);
    }

    /// Sets the password. The platform never returns it, so there is no
    /// getter.
    pub fn set_password(&mut self, password: &str) {
        self.core.store_mut().set("password", password);
    }

    /// Reads a user by id.
    pub async fn get(platform: &Platform, id: &str, options: &RequestOptions) -> SdkResult<Self> {
        let record = platform
            .get_record(Resource::User, KIND, id, options)
            .await?;
        Self::from_record(record, platform.registry())
    }

    /// Deletes a user by id.
    pub async fn delete(platform: &Platform, id: &str, options: &RequestOptions) -> SdkResult<()> {
        platform
            .delete_record(Resource::User, KIND, id, options)
            .await
    }

    /// Lists users matching a query.
    pub async fn find_all(
        platform: &Platform,
        query: Query,
        options: &RequestOptions,
    ) -> SdkResult<PagedList<Self>> {
        let request = ApiRequest::new(Resource::User, Action::Find, KIND)
            .with_query(query)
            .with_options(options);
        platform.paged(request, decode_records::<Self>).await
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new()
    }
}

impl FromRecord for User {
    fn from_record(record: EntityRecord, _registry: &EntityRegistry) -> SdkResult<Self> {
        if !record.kind.eq_ignore_ascii_case(KIND) {
            return Err(SdkError::Schema(format!(
                "expected user but found {}",
                record.kind
            )));
        }
        Ok(Self::from_core(EntityCore::from_record(record)))
    }
}

#[async_trait]
impl Entity for User {
    fn resource(&self) -> Resource {
        Resource::User
    }

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }
}
