//! Request model.
//!
//! An [`ApiRequest`] names an operation on the platform without saying how it
//! travels. Transports turn it into a concrete call.

use crate::config::{RequestOptions, Verbosity};
use std::collections::BTreeMap;
use std::fmt;

/// Platform resource family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Generic objects.
    Object,
    /// Schema-typed articles.
    Article,
    /// Connections between articles.
    Connection,
    /// Registered devices.
    Device,
    /// Users.
    User,
}

impl Resource {
    /// Returns the URL segment for this resource.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Object => "object",
            Resource::Article => "article",
            Resource::Connection => "connection",
            Resource::Device => "device",
            Resource::User => "user",
        }
    }

    /// Returns the envelope key that carries a single record.
    pub fn record_field(&self) -> &'static str {
        self.as_str()
    }

    /// Returns the envelope key that carries a record list.
    pub fn list_field(&self) -> &'static str {
        match self {
            Resource::Object => "objects",
            Resource::Article => "articles",
            Resource::Connection => "connections",
            Resource::Device => "devices",
            Resource::User => "users",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// PUT
    Put,
    /// POST
    Post,
    /// DELETE
    Delete,
}

impl Method {
    /// Returns the verb.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation performed by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Create a record.
    Create,
    /// Create a device.
    Register,
    /// Read a record by id.
    Get,
    /// Apply a patch to a record.
    Update,
    /// Delete a record by id.
    Delete,
    /// Delete several records of one type.
    BulkDelete,
    /// List records matching a query.
    Find,
    /// List articles connected to an article.
    FindConnected,
    /// Read the connection between two articles.
    FindByEndpoints,
}

impl Action {
    /// Returns the verb used for this action.
    pub fn method(&self) -> Method {
        match self {
            Action::Create | Action::Register => Method::Put,
            Action::Update | Action::BulkDelete => Method::Post,
            Action::Delete => Method::Delete,
            Action::Get | Action::Find | Action::FindConnected | Action::FindByEndpoints => {
                Method::Get
            }
        }
    }
}

/// Sort direction for find queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    #[default]
    Descending,
}

/// Query parameters for list, find and graph calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Free-text filter expression.
    pub filter: Option<String>,
    /// 1-based page number.
    pub page_number: u32,
    /// Page size. `None` uses the configured default.
    pub page_size: Option<u32>,
    /// Property to sort by.
    pub order_by: Option<String>,
    /// Sort direction.
    pub sort_order: SortOrder,
    /// Endpoint label, for graph queries.
    pub label: Option<String>,
}

impl Query {
    /// Creates a query for the first page.
    pub fn new() -> Self {
        Self {
            filter: None,
            page_number: 1,
            page_size: None,
            order_by: None,
            sort_order: SortOrder::Descending,
            label: None,
        }
    }

    /// Sets the filter expression.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the page number. Zero is treated as the first page.
    pub fn with_page(mut self, page_number: u32) -> Self {
        self.page_number = page_number.max(1);
        self
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Sets the sort property and direction.
    pub fn order_by(mut self, property: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some(property.into());
        self.sort_order = order;
        self
    }

    /// Sets the endpoint label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns the same query positioned at another page.
    pub fn at_page(&self, page_number: u32) -> Self {
        let mut query = self.clone();
        query.page_number = page_number.max(1);
        query
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

/// A named operation on the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Resource family.
    pub resource: Resource,
    /// Operation.
    pub action: Action,
    /// Schema or relation name.
    pub kind: String,
    /// Target record id.
    pub id: Option<String>,
    /// Second article id, for endpoint lookups.
    pub other_id: Option<String>,
    /// Revision the update must match. `None` skips the check.
    pub revision: Option<u64>,
    /// Query parameters.
    pub query: Option<Query>,
    /// Return connections instead of articles for graph queries.
    pub return_edge: bool,
    /// Fields to return.
    pub fields: Vec<String>,
    /// Ask the server for debug output.
    pub debug: Option<bool>,
    /// Server output verbosity.
    pub verbosity: Option<Verbosity>,
    /// User session token.
    pub user_token: Option<String>,
    /// Extra headers.
    pub headers: BTreeMap<String, String>,
    /// Serialized body.
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    /// Creates a request.
    pub fn new(resource: Resource, action: Action, kind: impl Into<String>) -> Self {
        Self {
            resource,
            action,
            kind: kind.into(),
            id: None,
            other_id: None,
            revision: None,
            query: None,
            return_edge: false,
            fields: Vec::new(),
            debug: None,
            verbosity: None,
            user_token: None,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Sets the target id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the second article id.
    pub fn with_other_id(mut self, id: impl Into<String>) -> Self {
        self.other_id = Some(id.into());
        self
    }

    /// Sets the expected revision. Zero disables the check.
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = (revision != 0).then_some(revision);
        self
    }

    /// Sets query parameters.
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    /// Requests connections rather than articles from a graph query.
    pub fn with_return_edge(mut self, return_edge: bool) -> Self {
        self.return_edge = return_edge;
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Applies per-call options.
    pub fn with_options(mut self, options: &RequestOptions) -> Self {
        if !options.fields.is_empty() {
            self.fields = options.fields.clone();
        }
        if options.debug.is_some() {
            self.debug = options.debug;
        }
        if options.verbosity.is_some() {
            self.verbosity = options.verbosity;
        }
        if options.user_token.is_some() {
            self.user_token = options.user_token.clone();
        }
        self
    }

    /// Returns the verb.
    pub fn method(&self) -> Method {
        self.action.method()
    }
}
