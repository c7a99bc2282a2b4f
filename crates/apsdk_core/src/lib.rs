//! # apsdk Core
//!
//! Client-side entity model for the apsdk platform.
//!
//! This crate provides:
//! - Change-tracked entities (objects, articles, connections, devices, users)
//!   that send only their net delta on save
//! - Optimistic concurrency through expected revisions
//! - Lazily advancing paged cursors over list and graph queries
//! - Connection creation with inline articles and endpoint id backfill
//! - A request pipeline over a pluggable [`Transport`], with an HTTP
//!   implementation over any [`HttpClient`]
//! - Ambient per-operation context carried across `.await` points
//!
//! ## Usage
//!
//! ```rust,ignore
//! use apsdk_core::prelude::*;
//!
//! let platform = Platform::new(config, transport);
//! let mut player = Object::new("player");
//! player.set("name", "jo");
//! player.save(&platform, 0, false, &RequestOptions::new()).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod article;
mod config;
mod connection;
mod context;
mod device;
mod entity;
mod error;
mod http;
mod object;
mod paging;
mod platform;
mod registry;
mod request;
mod store;
mod transport;
mod user;

pub use article::Article;
pub use config::{
    ClientConfig, Environment, RequestOptions, Verbosity, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE,
};
pub use connection::{Connect, Connection, Endpoint};
pub use context::{current, ContextPreserver, OperationContext, Preserved, ScopeGuard};
pub use device::{Device, DeviceType, Geocode};
pub use entity::{is_new_id, Entity, EntityCore};
pub use error::{SdkError, SdkResult};
pub use http::{
    HttpClient, HttpRequest, HttpTransport, RestUrls, UrlBuilder, API_KEY_HEADER,
    ENVIRONMENT_HEADER, USER_TOKEN_HEADER,
};
pub use object::Object;
pub use paging::{Continuation, PageSource, PagedCursor, PagedList};
pub use platform::{decode_records, PageDecoder, Platform};
pub use registry::{AnyEntity, Decoder, EntityRegistry, FromRecord};
pub use request::{Action, ApiRequest, Method, Query, Resource, SortOrder};
pub use store::{Delta, PropertyStore};
pub use transport::{MockTransport, Transport};
pub use user::User;

pub use apsdk_protocol as protocol;

/// Common imports.
pub mod prelude {
    pub use crate::{
        Article, ClientConfig, Connection, Device, DeviceType, Entity, Environment, Object,
        PagedList, Platform, Query, RequestOptions, SdkError, SdkResult, SortOrder, Transport,
        User,
    };
}
