//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via a trait so any library (reqwest,
//! hyper, ureq) can be plugged in. This module decides the URL, verb and
//! headers for each [`ApiRequest`].

use crate::config::ClientConfig;
use crate::error::{SdkError, SdkResult};
use crate::request::{Action, ApiRequest, Method, SortOrder};
use crate::transport::Transport;
use async_trait::async_trait;
use parking_lot::RwLock;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "Appacitive-Apikey";
/// Header carrying the environment.
pub const ENVIRONMENT_HEADER: &str = "Appacitive-Environment";
/// Header carrying the user session token.
pub const USER_TOKEN_HEADER: &str = "Appacitive-User-Auth";

/// A fully resolved HTTP call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Verb.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Headers in send order.
    pub headers: Vec<(String, String)>,
    /// Body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Returns the first header with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response body.
    async fn send(&self, request: HttpRequest) -> Result<Vec<u8>, String>;
}

/// Produces the URL for a request.
pub trait UrlBuilder: Send + Sync {
    /// Returns the absolute URL for `request` under `base_url`.
    fn url(&self, base_url: &str, request: &ApiRequest) -> String;
}

/// URL layout of the platform's REST API.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestUrls;

impl RestUrls {
    fn path(request: &ApiRequest) -> String {
        let resource = request.resource.as_str();
        let kind = urlencoding::encode(&request.kind);
        let id = request
            .id
            .as_deref()
            .map(|id| urlencoding::encode(id).into_owned())
            .unwrap_or_default();

        match request.action {
            Action::Create => format!("{resource}/{kind}"),
            Action::Register => format!("{resource}/register"),
            Action::Get | Action::Update | Action::Delete => format!("{resource}/{kind}/{id}"),
            Action::BulkDelete => format!("{resource}/{kind}/bulkdelete"),
            Action::Find => format!("{resource}/{kind}/find/all"),
            Action::FindConnected => format!("connection/{kind}/{id}/find"),
            Action::FindByEndpoints => {
                let other = request
                    .other_id
                    .as_deref()
                    .map(|id| urlencoding::encode(id).into_owned())
                    .unwrap_or_default();
                format!("connection/{kind}/find/{id}/{other}")
            }
        }
    }

    fn params(request: &ApiRequest) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(revision) = request.revision {
            params.push(("revision", revision.to_string()));
        }
        if !request.fields.is_empty() {
            params.push(("fields", request.fields.join(",")));
        }
        if request.debug == Some(true) {
            params.push(("debug", "true".to_string()));
        }
        if let Some(verbosity) = request.verbosity {
            params.push(("verbosity", verbosity.as_str().to_string()));
        }
        if request.action == Action::FindConnected {
            params.push(("returnedge", request.return_edge.to_string()));
        }
        if let Some(query) = &request.query {
            if let Some(filter) = &query.filter {
                params.push(("query", filter.clone()));
            }
            params.push(("pnum", query.page_number.to_string()));
            if let Some(size) = query.page_size {
                params.push(("psize", size.to_string()));
            }
            if let Some(order_by) = &query.order_by {
                params.push(("orderBy", order_by.clone()));
                let ascending = query.sort_order == SortOrder::Ascending;
                params.push(("isAsc", ascending.to_string()));
            }
            if let Some(label) = &query.label {
                params.push(("label", label.clone()));
            }
        }
        params
    }
}

impl UrlBuilder for RestUrls {
    fn url(&self, base_url: &str, request: &ApiRequest) -> String {
        let mut url = format!("{}/{}", base_url.trim_end_matches('/'), Self::path(request));
        let params = Self::params(request);
        if !params.is_empty() {
            let query = params
                .iter()
                .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push('?');
            url.push_str(&query);
        }
        url
    }
}

/// HTTP-based transport.
pub struct HttpTransport<C: HttpClient, U: UrlBuilder = RestUrls> {
    config: ClientConfig,
    client: C,
    urls: U,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C, RestUrls> {
    /// Creates an HTTP transport with the default URL layout.
    pub fn new(config: ClientConfig, client: C) -> Self {
        Self::with_urls(config, client, RestUrls)
    }
}

impl<C: HttpClient, U: UrlBuilder> HttpTransport<C, U> {
    /// Creates an HTTP transport with a custom URL layout.
    pub fn with_urls(config: ClientConfig, client: C, urls: U) -> Self {
        Self {
            config,
            client,
            urls,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Resolves the HTTP call for a request.
    pub fn build(&self, request: &ApiRequest) -> HttpRequest {
        let mut headers = vec![
            (API_KEY_HEADER.to_string(), self.config.api_key.clone()),
            (
                ENVIRONMENT_HEADER.to_string(),
                self.config.environment.as_str().to_string(),
            ),
        ];
        let token = request
            .user_token
            .as_ref()
            .or(self.config.user_token.as_ref());
        if let Some(token) = token {
            headers.push((USER_TOKEN_HEADER.to_string(), token.clone()));
        }
        if request.body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers.extend(
            request
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        HttpRequest {
            method: request.method(),
            url: self.urls.url(&self.config.base_url, request),
            headers,
            body: request.body.clone(),
        }
    }
}

#[async_trait]
impl<C: HttpClient, U: UrlBuilder> Transport for HttpTransport<C, U> {
    async fn send(&self, request: &ApiRequest) -> SdkResult<Vec<u8>> {
        let http = self.build(request);
        let timeout = self.config.timeout;

        let result = match tokio::time::timeout(timeout, self.client.send(http)).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(format!("request timed out after {timeout:?}")),
        };

        match result {
            Ok(body) => {
                *self.last_error.write() = None;
                Ok(body)
            }
            Err(e) => {
                *self.last_error.write() = Some(e.clone());
                Err(SdkError::transport_retryable(e))
            }
        }
    }
}
