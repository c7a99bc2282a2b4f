//! Request execution pipeline.
//!
//! [`Platform`] is the execution context every entity operation runs
//! through. It owns the configuration, transport, serializer and registry,
//! all passed in explicitly. `execute` is the single place where a platform
//! status turns into an error.

use crate::config::{ClientConfig, RequestOptions, Verbosity};
use crate::context;
use crate::error::{SdkError, SdkResult};
use crate::paging::{Continuation, PageSource, PagedList};
use crate::registry::{EntityRegistry, FromRecord};
use crate::request::{Action, ApiRequest, Resource};
use crate::transport::Transport;
use apsdk_protocol::{
    EntityRecord, JsonSerializer, PatchRecord, ResponseEnvelope, Serializer,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Extracts the items of one page from a response.
pub type PageDecoder<T> = fn(&EntityRegistry, ResponseEnvelope) -> SdkResult<Vec<T>>;

/// Execution context for entity operations.
#[derive(Clone)]
pub struct Platform {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    serializer: Arc<dyn Serializer>,
    registry: Arc<EntityRegistry>,
}

impl Platform {
    /// Creates a platform with the JSON serializer and default registry.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            serializer: Arc::new(JsonSerializer),
            registry: Arc::new(EntityRegistry::new()),
        }
    }

    /// Replaces the serializer.
    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Replaces the registry.
    pub fn with_registry(mut self, registry: EntityRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the registry.
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Returns the serializer.
    pub fn serializer(&self) -> &dyn Serializer {
        self.serializer.as_ref()
    }

    /// Sends a request and returns the successful envelope.
    ///
    /// `payload` is serialized into the request body. A status other than
    /// success becomes an error via [`SdkError::from_status`].
    pub async fn execute(
        &self,
        mut request: ApiRequest,
        payload: Option<&Value>,
    ) -> SdkResult<ResponseEnvelope> {
        self.apply_defaults(&mut request);
        if let Some(payload) = payload {
            request.body = Some(self.serializer.serialize(payload)?);
        }

        debug!(
            method = %request.method(),
            resource = %request.resource,
            kind = %request.kind,
            id = ?request.id,
            "sending request"
        );

        let bytes = self.transport.send(&request).await?;
        let envelope = self.serializer.decode_envelope(&bytes)?;
        let status = envelope.status();

        debug!(
            resource = %request.resource,
            kind = %request.kind,
            code = %status.code,
            reference_id = ?status.reference_id,
            "received response"
        );

        if !status.is_successful() {
            return Err(SdkError::from_status(status));
        }
        Ok(envelope)
    }

    fn apply_defaults(&self, request: &mut ApiRequest) {
        if request.debug.is_none() && self.config.debug {
            request.debug = Some(true);
        }
        if request.verbosity.is_none() && self.config.verbosity != Verbosity::Info {
            request.verbosity = Some(self.config.verbosity);
        }
        let ambient = context::current();
        if let Some(ambient) = &ambient {
            for (name, value) in &ambient.headers {
                request
                    .headers
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        if request.user_token.is_none() {
            request.user_token = ambient
                .and_then(|c| c.user_token.clone())
                .or_else(|| self.config.user_token.clone());
        }
    }

    /// Creates a record and returns the canonical record.
    pub async fn create_record(
        &self,
        resource: Resource,
        action: Action,
        record: &EntityRecord,
        options: &RequestOptions,
    ) -> SdkResult<EntityRecord> {
        let request = ApiRequest::new(resource, action, record.kind.clone()).with_options(options);
        let envelope = self.execute(request, Some(&record.encode())).await?;
        require_record(envelope, resource, "create")
    }

    /// Applies a patch and returns the canonical record.
    pub async fn update_record(
        &self,
        resource: Resource,
        kind: &str,
        id: &str,
        patch: &PatchRecord,
        expected_revision: u64,
        options: &RequestOptions,
    ) -> SdkResult<EntityRecord> {
        let request = ApiRequest::new(resource, Action::Update, kind)
            .with_id(id)
            .with_revision(expected_revision)
            .with_options(options);
        let envelope = self.execute(request, Some(&patch.encode())).await?;
        require_record(envelope, resource, "update")
    }

    /// Reads a record by id.
    pub async fn get_record(
        &self,
        resource: Resource,
        kind: &str,
        id: &str,
        options: &RequestOptions,
    ) -> SdkResult<EntityRecord> {
        let request = ApiRequest::new(resource, Action::Get, kind)
            .with_id(id)
            .with_options(options);
        let envelope = self.execute(request, None).await?;
        require_record(envelope, resource, "get")
    }

    /// Deletes a record by id.
    pub async fn delete_record(
        &self,
        resource: Resource,
        kind: &str,
        id: &str,
        options: &RequestOptions,
    ) -> SdkResult<()> {
        let request = ApiRequest::new(resource, Action::Delete, kind)
            .with_id(id)
            .with_options(options);
        self.execute(request, None).await.map(|_| ())
    }

    /// Deletes several records of one type.
    pub async fn bulk_delete(
        &self,
        resource: Resource,
        kind: &str,
        ids: &[String],
        options: &RequestOptions,
    ) -> SdkResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let request = ApiRequest::new(resource, Action::BulkDelete, kind).with_options(options);
        self.execute(request, Some(&json!({ "idlist": ids })))
            .await
            .map(|_| ())
    }

    /// Runs a paged request and returns its first page.
    ///
    /// The returned list carries a continuation that reruns the same request
    /// for later pages.
    pub async fn paged<T: Send + 'static>(
        &self,
        request: ApiRequest,
        decode: PageDecoder<T>,
    ) -> SdkResult<PagedList<T>> {
        let page_number = request.query.as_ref().map_or(1, |q| q.page_number);
        let source = RequestSource {
            platform: self.clone(),
            request,
            decode,
        };
        source.load(page_number).await
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

fn require_record(
    envelope: ResponseEnvelope,
    resource: Resource,
    operation: &str,
) -> SdkResult<EntityRecord> {
    envelope.into_record().ok_or_else(|| {
        error!(%resource, operation, "successful response without a record");
        SdkError::internal(format!(
            "{operation} on {resource} succeeded without returning a record"
        ))
    })
}

/// Decodes the record list of a response.
pub fn decode_records<T: FromRecord>(
    registry: &EntityRegistry,
    envelope: ResponseEnvelope,
) -> SdkResult<Vec<T>> {
    envelope
        .into_records()
        .into_iter()
        .map(|record| T::from_record(record, registry))
        .collect()
}

/// Reruns one request at different page numbers.
struct RequestSource<T> {
    platform: Platform,
    request: ApiRequest,
    decode: PageDecoder<T>,
}

impl<T> Clone for RequestSource<T> {
    fn clone(&self) -> Self {
        Self {
            platform: self.platform.clone(),
            request: self.request.clone(),
            decode: self.decode,
        }
    }
}

impl<T: Send + 'static> RequestSource<T> {
    async fn load(&self, page_number: u32) -> SdkResult<PagedList<T>> {
        let mut request = self.request.clone();
        let mut query = request.query.take().unwrap_or_default().at_page(page_number);
        if query.page_size.is_none() {
            query.page_size = Some(self.platform.config.page_size);
        }
        request.query = Some(query);

        let envelope = self.platform.execute(request, None).await?;
        let paging = envelope.paging().ok_or_else(|| {
            error!(kind = %self.request.kind, "paged response without paging info");
            SdkError::internal("paged response without paging info")
        })?;
        let items = (self.decode)(self.platform.registry(), envelope)?;

        let source: Arc<dyn PageSource<T>> = Arc::new(self.clone());
        Ok(PagedList::new(items, paging).with_continuation(Continuation::new(source, page_number)))
    }
}

#[async_trait]
impl<T: Send + 'static> PageSource<T> for RequestSource<T> {
    async fn fetch_page(&self, page_number: u32) -> SdkResult<PagedList<T>> {
        self.load(page_number).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::context::{ContextPreserver, OperationContext};
    use crate::object::Object;
    use crate::request::Query;
    use crate::transport::MockTransport;
    use apsdk_protocol::{PagingInfo, Status};

    fn platform(transport: Arc<MockTransport>) -> Platform {
        Platform::new(ClientConfig::new("key", Environment::Sandbox), transport)
    }

    #[tokio::test]
    async fn failed_status_becomes_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_envelope(&ResponseEnvelope::new(Status::error("404", "no such object")));
        let platform = platform(transport.clone());

        let err = platform
            .get_record(Resource::Object, "player", "1", &RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::NotFound { .. }));
    }

    #[tokio::test]
    async fn missing_record_is_internal_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_envelope(&ResponseEnvelope::success());
        let platform = platform(transport);

        let err = platform
            .get_record(Resource::Object, "player", "1", &RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::InternalConsistency { .. }));
    }

    #[tokio::test]
    async fn garbage_response_is_protocol_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_bytes(b"<html>".to_vec());
        let platform = platform(transport);

        let err = platform
            .execute(ApiRequest::new(Resource::Object, Action::Get, "p"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::Protocol(_)));
    }

    #[tokio::test]
    async fn update_sends_patch_and_revision() {
        let transport = Arc::new(MockTransport::new());
        transport.push_envelope(
            &ResponseEnvelope::success()
                .with_record("object", EntityRecord::new("player").with_id("1").with_revision(4)),
        );
        let platform = platform(transport.clone());

        let mut patch = PatchRecord::new();
        patch.properties.insert("score".into(), Some("3".into()));
        let record = platform
            .update_record(Resource::Object, "player", "1", &patch, 3, &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(record.revision, 4);

        let sent = &transport.requests()[0];
        assert_eq!(sent.revision, Some(3));
        let body: Value = serde_json::from_slice(sent.body.as_ref().unwrap()).unwrap();
        assert_eq!(body["score"], "3");
    }

    #[tokio::test]
    async fn ambient_context_merged() {
        let transport = Arc::new(MockTransport::new());
        transport.push_envelope(&ResponseEnvelope::success());
        let platform = platform(transport.clone());

        let preserver = ContextPreserver::new(
            OperationContext::new()
                .with_user_token("ambient")
                .with_header("X-Request-Source", "tests"),
        );
        preserver
            .preserve(platform.delete_record(
                Resource::Object,
                "player",
                "1",
                &RequestOptions::new(),
            ))
            .await
            .unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.user_token.as_deref(), Some("ambient"));
        assert_eq!(
            sent.headers.get("X-Request-Source").map(String::as_str),
            Some("tests")
        );
    }

    #[tokio::test]
    async fn explicit_token_wins_over_context() {
        let transport = Arc::new(MockTransport::new());
        transport.push_envelope(&ResponseEnvelope::success());
        let platform = platform(transport.clone());

        let preserver = ContextPreserver::new(OperationContext::new().with_user_token("ambient"));
        let options = RequestOptions::new().with_user_token("explicit");
        preserver
            .preserve(platform.delete_record(Resource::Object, "player", "1", &options))
            .await
            .unwrap();
        assert_eq!(transport.requests()[0].user_token.as_deref(), Some("explicit"));
    }

    #[tokio::test]
    async fn empty_bulk_delete_skips_network() {
        let transport = Arc::new(MockTransport::new());
        let platform = platform(transport.clone());
        platform
            .bulk_delete(Resource::Object, "player", &[], &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn paged_fills_default_page_size() {
        let transport = Arc::new(MockTransport::new());
        transport.push_envelope(
            &ResponseEnvelope::success()
                .with_records("objects", vec![EntityRecord::new("player").with_id("1")])
                .with_paging(PagingInfo::new(2, 20, 21)),
        );
        let platform = platform(transport.clone());

        let request = ApiRequest::new(Resource::Object, Action::Find, "player")
            .with_query(Query::new().with_page(2));
        let page = platform
            .paged(request, decode_records::<Object>)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page.continuation().unwrap().page_number(), 2);

        let sent = transport.requests()[0].query.clone().unwrap();
        assert_eq!(sent.page_size, Some(20));
        assert_eq!(sent.page_number, 2);
    }

    #[tokio::test]
    async fn paged_requires_paging_info() {
        let transport = Arc::new(MockTransport::new());
        transport.push_envelope(&ResponseEnvelope::success().with_records("objects", vec![]));
        let platform = platform(transport);

        let request = ApiRequest::new(Resource::Object, Action::Find, "player");
        let err = platform
            .paged(request, decode_records::<Object>)
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::InternalConsistency { .. }));
    }
}
