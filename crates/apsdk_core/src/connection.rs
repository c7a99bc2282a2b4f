//! Connections between articles.
//!
//! A connection has two endpoints, A and B. Each endpoint has a label and
//! either references an existing article by id or carries an unsaved
//! [`Article`] that the platform creates together with the connection.
//!
//! After a create, locally held articles receive the ids the server
//! assigned. With distinct labels each endpoint is matched by label. With
//! identical labels the response cannot tell the endpoints apart, so A takes
//! the response's endpoint A and B takes endpoint B. Callers creating two new
//! articles under one label should not rely on that pairing.

use crate::article::Article;
use crate::config::RequestOptions;
use crate::entity::{is_new_id, Entity, EntityCore};
use crate::error::{SdkError, SdkResult};
use crate::paging::PagedList;
use crate::platform::{decode_records, Platform};
use crate::registry::{EntityRegistry, FromRecord};
use crate::request::{Action, ApiRequest, Query, Resource};
use apsdk_protocol::{EndpointRecord, EntityRecord};
use async_trait::async_trait;
use tracing::warn;

/// One side of a connection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Endpoint {
    label: String,
    article_id: Option<String>,
    article: Option<Article>,
}

impl Endpoint {
    /// References an existing article.
    pub fn existing(label: impl Into<String>, article_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            article_id: Some(article_id.into()),
            article: None,
        }
    }

    /// Uses an article. An unsaved article is created with the connection;
    /// one that already has an id is referenced by that id.
    pub fn with_article(label: impl Into<String>, article: Article) -> Self {
        let article_id = (!article.is_new())
            .then(|| article.id().map(str::to_string))
            .flatten();
        Self {
            label: label.into(),
            article_id,
            article: Some(article),
        }
    }

    /// Endpoint label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Id of the referenced article.
    pub fn article_id(&self) -> Option<&str> {
        self.article_id.as_deref()
    }

    /// The locally held article, if any.
    pub fn article(&self) -> Option<&Article> {
        self.article.as_ref()
    }

    /// Returns true if the write creates the article.
    pub fn creates_article(&self) -> bool {
        self.article.is_some() && is_new_id(self.article_id.as_deref())
    }

    fn to_record(&self) -> EndpointRecord {
        match (&self.article, self.creates_article()) {
            (Some(article), true) => EndpointRecord::inline(&self.label, article.core().to_record()),
            _ => EndpointRecord {
                label: self.label.clone(),
                object_id: self.article_id.clone(),
                kind: self.article.as_ref().map(|a| a.kind().to_string()),
                object: None,
            },
        }
    }

    fn from_wire(record: EndpointRecord) -> Self {
        Self {
            label: record.label,
            article_id: record.object_id,
            article: record
                .object
                .map(|object| Article::from_core(EntityCore::from_record(*object))),
        }
    }

    fn validate(&self, side: &str) -> SdkResult<()> {
        if self.label.trim().is_empty() {
            return Err(SdkError::validation(format!("endpoint {side} has no label")));
        }
        if self.article.is_none() && is_new_id(self.article_id.as_deref()) {
            return Err(SdkError::validation(format!(
                "endpoint {side} has neither an article nor an article id"
            )));
        }
        Ok(())
    }
}

/// Builder returned by [`Connection::builder`].
#[derive(Debug, Clone)]
pub struct Connect {
    relation: String,
    endpoint_a: Endpoint,
}

impl Connect {
    /// Sets endpoint A to an article created with the connection.
    pub fn from_new_article(mut self, label: impl Into<String>, article: Article) -> Self {
        self.endpoint_a = Endpoint::with_article(label, article);
        self
    }

    /// Sets endpoint A to an existing article.
    pub fn from_existing_article(
        mut self,
        label: impl Into<String>,
        article_id: impl Into<String>,
    ) -> Self {
        self.endpoint_a = Endpoint::existing(label, article_id);
        self
    }

    /// Sets endpoint B to an article created with the connection.
    pub fn to_new_article(self, label: impl Into<String>, article: Article) -> Connection {
        Connection::new(self.relation, self.endpoint_a, Endpoint::with_article(label, article))
    }

    /// Sets endpoint B to an existing article.
    pub fn to_existing_article(
        self,
        label: impl Into<String>,
        article_id: impl Into<String>,
    ) -> Connection {
        Connection::new(
            self.relation,
            self.endpoint_a,
            Endpoint::existing(label, article_id),
        )
    }
}

/// An edge between two articles.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    core: EntityCore,
    relation_id: Option<String>,
    endpoint_a: Endpoint,
    endpoint_b: Endpoint,
}

impl Connection {
    /// Creates a new, unsaved connection.
    pub fn new(relation: impl Into<String>, endpoint_a: Endpoint, endpoint_b: Endpoint) -> Self {
        Self {
            core: EntityCore::new(relation),
            relation_id: None,
            endpoint_a,
            endpoint_b,
        }
    }

    /// Starts building a connection of `relation`.
    pub fn builder(relation: impl Into<String>) -> Connect {
        Connect {
            relation: relation.into(),
            endpoint_a: Endpoint::default(),
        }
    }

    /// Creates a stub for an existing connection. Endpoints are filled in by
    /// a fetch.
    pub fn stub(relation: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            core: EntityCore::stub(relation, id),
            relation_id: None,
            endpoint_a: Endpoint::default(),
            endpoint_b: Endpoint::default(),
        }
    }

    pub(crate) fn from_wire(mut record: EntityRecord) -> Self {
        let endpoints = record.endpoints.take();
        let relation_id = record.relation_id.clone();
        let (endpoint_a, endpoint_b) = match endpoints {
            Some((a, b)) => (Endpoint::from_wire(a), Endpoint::from_wire(b)),
            None => (Endpoint::default(), Endpoint::default()),
        };
        Self {
            core: EntityCore::from_record(record),
            relation_id,
            endpoint_a,
            endpoint_b,
        }
    }

    /// Relation name.
    pub fn relation(&self) -> &str {
        self.core.kind()
    }

    /// Relation id reported by the server.
    pub fn relation_id(&self) -> Option<&str> {
        self.relation_id.as_deref()
    }

    /// Endpoint A.
    pub fn endpoint_a(&self) -> &Endpoint {
        &self.endpoint_a
    }

    /// Endpoint B.
    pub fn endpoint_b(&self) -> &Endpoint {
        &self.endpoint_b
    }

    /// Returns the endpoint with the given label. A wins a tie.
    pub fn endpoint(&self, label: &str) -> Option<&Endpoint> {
        [&self.endpoint_a, &self.endpoint_b]
            .into_iter()
            .find(|e| e.label == label)
    }

    /// Reads a connection by id.
    pub async fn get(
        platform: &Platform,
        relation: &str,
        id: &str,
        options: &RequestOptions,
    ) -> SdkResult<Self> {
        let record = platform
            .get_record(Resource::Connection, relation, id, options)
            .await?;
        Self::from_record(record, platform.registry())
    }

    /// Reads the connection of `relation` between two articles, if any.
    pub async fn get_by_endpoints(
        platform: &Platform,
        relation: &str,
        article_a: &str,
        article_b: &str,
        options: &RequestOptions,
    ) -> SdkResult<Option<Self>> {
        let request = ApiRequest::new(Resource::Connection, Action::FindByEndpoints, relation)
            .with_id(article_a)
            .with_other_id(article_b)
            .with_options(options);
        let envelope = platform.execute(request, None).await?;
        let mut records = envelope.into_records();
        if records.len() > 1 {
            return Err(SdkError::internal(format!(
                "{} connections of {relation} between {article_a} and {article_b}",
                records.len()
            )));
        }
        records
            .pop()
            .map(|record| Self::from_record(record, platform.registry()))
            .transpose()
    }

    /// Deletes a connection by id.
    pub async fn delete(
        platform: &Platform,
        relation: &str,
        id: &str,
        options: &RequestOptions,
    ) -> SdkResult<()> {
        platform
            .delete_record(Resource::Connection, relation, id, options)
            .await
    }

    /// Deletes several connections of one relation.
    pub async fn bulk_delete(
        platform: &Platform,
        relation: &str,
        ids: &[String],
        options: &RequestOptions,
    ) -> SdkResult<()> {
        platform
            .bulk_delete(Resource::Connection, relation, ids, options)
            .await
    }

    /// Lists connections matching a query.
    pub async fn find_all(
        platform: &Platform,
        relation: &str,
        query: Query,
        options: &RequestOptions,
    ) -> SdkResult<PagedList<Self>> {
        let request = ApiRequest::new(Resource::Connection, Action::Find, relation)
            .with_query(query)
            .with_options(options);
        platform.paged(request, decode_records::<Self>).await
    }

    fn resolve(
        &self,
        endpoints: (EndpointRecord, EndpointRecord),
    ) -> SdkResult<(Endpoint, Endpoint)> {
        let (response_a, response_b) = endpoints;
        let same_label = self.endpoint_a.label == self.endpoint_b.label;
        if same_label && self.endpoint_a.creates_article() && self.endpoint_b.creates_article() {
            warn!(
                relation = %self.relation(),
                label = %self.endpoint_a.label,
                "both endpoints create articles under the same label, pairing by position"
            );
        }

        let pick = |local: &Endpoint, positional: &EndpointRecord| -> SdkResult<EndpointRecord> {
            if same_label || local.label.is_empty() {
                return Ok(positional.clone());
            }
            match [&response_a, &response_b]
                .into_iter()
                .find(|r| r.label == local.label)
            {
                Some(found) => Ok(found.clone()),
                None if local.creates_article() => Err(SdkError::internal(format!(
                    "response has no endpoint labelled {}",
                    local.label
                ))),
                None => Ok(positional.clone()),
            }
        };

        let matched_a = pick(&self.endpoint_a, &response_a)?;
        let matched_b = pick(&self.endpoint_b, &response_b)?;
        Ok((
            merge_endpoint(&self.endpoint_a, matched_a)?,
            merge_endpoint(&self.endpoint_b, matched_b)?,
        ))
    }
}

/// Combines a local endpoint with its response counterpart. A created article
/// takes the server's id, or the full record when the server returned one.
fn merge_endpoint(local: &Endpoint, response: EndpointRecord) -> SdkResult<Endpoint> {
    if !local.creates_article() {
        let mut endpoint = Endpoint::from_wire(response);
        if endpoint.article.is_none() {
            endpoint.article = local.article.clone();
        }
        return Ok(endpoint);
    }

    let id = response
        .object_id
        .clone()
        .or_else(|| response.object.as_ref().and_then(|o| o.id.clone()))
        .filter(|id| !is_new_id(Some(id)))
        .ok_or_else(|| {
            SdkError::internal(format!(
                "created endpoint {} returned without an id",
                local.label
            ))
        })?;

    let mut article = local.article.clone().unwrap_or_else(|| Article::new(""));
    match response.object {
        Some(object) => article.core_mut().replace_with(*object),
        None => article.core_mut().assign_id(id.clone()),
    }
    if article.id() != Some(id.as_str()) {
        article.core_mut().assign_id(id.clone());
    }

    Ok(Endpoint {
        label: response.label,
        article_id: Some(id),
        article: Some(article),
    })
}

impl FromRecord for Connection {
    fn from_record(record: EntityRecord, _registry: &EntityRegistry) -> SdkResult<Self> {
        Ok(Self::from_wire(record))
    }
}

#[async_trait]
impl Entity for Connection {
    fn resource(&self) -> Resource {
        Resource::Connection
    }

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn validate(&self) -> SdkResult<()> {
        if self.core.is_new() {
            self.endpoint_a.validate("A")?;
            self.endpoint_b.validate("B")?;
        }
        Ok(())
    }

    async fn create_new(
        &self,
        platform: &Platform,
        options: &RequestOptions,
    ) -> SdkResult<EntityRecord> {
        let record = self
            .core
            .to_record()
            .with_endpoints(self.endpoint_a.to_record(), self.endpoint_b.to_record());
        platform
            .create_record(Resource::Connection, Action::Create, &record, options)
            .await
    }

    fn apply_record(&mut self, mut record: EntityRecord) -> SdkResult<()> {
        let endpoints = match record.endpoints.take() {
            Some(endpoints) => Some(self.resolve(endpoints)?),
            None if self.core.is_new() => {
                return Err(SdkError::internal("created connection has no endpoints"))
            }
            None => None,
        };

        self.relation_id = record.relation_id.clone().or(self.relation_id.take());
        self.core.replace_with(record);
        if let Some((a, b)) = endpoints {
            self.endpoint_a = a;
            self.endpoint_b = b;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, Environment};
    use crate::transport::MockTransport;
    use apsdk_protocol::ResponseEnvelope;
    use std::sync::Arc;

    fn setup() -> (Arc<MockTransport>, Platform) {
        let transport = Arc::new(MockTransport::new());
        let platform = Platform::new(ClientConfig::new("k", Environment::Sandbox), transport.clone());
        (transport, platform)
    }

    fn response(a: EndpointRecord, b: EndpointRecord) -> ResponseEnvelope {
        ResponseEnvelope::success().with_record(
            "connection",
            EntityRecord::new("friend")
                .with_id("c1")
                .with_revision(1)
                .with_endpoints(a, b),
        )
    }

    #[test]
    fn existing_article_referenced_by_id() {
        let endpoint = Endpoint::with_article("me", Article::stub("person", "7"));
        assert!(!endpoint.creates_article());
        assert_eq!(endpoint.article_id(), Some("7"));
        assert_eq!(endpoint.to_record().object_id.as_deref(), Some("7"));
        assert!(endpoint.to_record().object.is_none());
    }

    #[test]
    fn builder_sets_both_sides() {
        let conn = Connection::builder("friend")
            .from_existing_article("me", "1")
            .to_new_article("you", Article::new("person"));
        assert_eq!(conn.relation(), "friend");
        assert_eq!(conn.endpoint_a().article_id(), Some("1"));
        assert!(conn.endpoint_b().creates_article());
        assert_eq!(conn.endpoint("you").map(|e| e.label()), Some("you"));
    }

    #[tokio::test]
    async fn missing_endpoint_fails_validation() {
        let (transport, platform) = setup();
        let mut conn = Connection::builder("friend").to_existing_article("you", "2");
        let err = conn
            .save(&platform, 0, false, &RequestOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn distinct_labels_matched_by_label() {
        let (transport, platform) = setup();
        // Server lists the endpoints in the opposite order.
        transport.push_envelope(&response(
            EndpointRecord::existing("you", "20"),
            EndpointRecord::existing("me", "10"),
        ));

        let mut conn = Connection::builder("friend")
            .from_new_article("me", Article::new("person"))
            .to_new_article("you", Article::new("person"));
        conn.save(&platform, 0, false, &RequestOptions::new()).await.unwrap();

        assert_eq!(conn.id(), Some("c1"));
        assert_eq!(conn.endpoint_a().label(), "me");
        assert_eq!(conn.endpoint_a().article().unwrap().id(), Some("10"));
        assert_eq!(conn.endpoint_b().article().unwrap().id(), Some("20"));
        assert!(!conn.endpoint_a().article().unwrap().is_dirty());
    }

    #[tokio::test]
    async fn identical_labels_pair_by_position() {
        let (transport, platform) = setup();
        transport.push_envelope(&response(
            EndpointRecord::existing("node", "n1"),
            EndpointRecord::existing("node", "n2"),
        ));

        let mut conn = Connection::builder("link")
            .from_new_article("node", Article::new("item"))
            .to_new_article("node", Article::new("item"));
        conn.save(&platform, 0, false, &RequestOptions::new()).await.unwrap();

        assert_eq!(conn.endpoint_a().article_id(), Some("n1"));
        assert_eq!(conn.endpoint_a().article().unwrap().id(), Some("n1"));
        assert_eq!(conn.endpoint_b().article().unwrap().id(), Some("n2"));
    }

    #[tokio::test]
    async fn inline_response_object_replaces_article() {
        let (transport, platform) = setup();
        let created = EntityRecord::new("person")
            .with_id("30")
            .with_revision(1)
            .with_property("name", "bo");
        transport.push_envelope(&response(
            EndpointRecord::existing("me", "1"),
            EndpointRecord {
                label: "you".into(),
                object_id: Some("30".into()),
                kind: Some("person".into()),
                object: Some(Box::new(created)),
            },
        ));

        let mut bo = Article::new("person");
        bo.set("name", "bo");
        let mut conn = Connection::builder("friend")
            .from_existing_article("me", "1")
            .to_new_article("you", bo);
        conn.save(&platform, 0, false, &RequestOptions::new()).await.unwrap();

        let article = conn.endpoint_b().article().unwrap();
        assert_eq!(article.revision(), 1);
        assert_eq!(article.get::<String>("name").unwrap().as_deref(), Some("bo"));
        assert_eq!(conn.endpoint_a().article_id(), Some("1"));
    }

    #[tokio::test]
    async fn missing_label_in_response_is_internal_error() {
        let (transport, platform) = setup();
        transport.push_envelope(&response(
            EndpointRecord::existing("x", "1"),
            EndpointRecord::existing("y", "2"),
        ));

        let mut conn = Connection::builder("friend")
            .from_new_article("me", Article::new("person"))
            .to_existing_article("you", "2");
        let before = conn.clone();
        let err = conn
            .save(&platform, 0, false, &RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::InternalConsistency { .. }));
        assert_eq!(conn, before);
    }

    #[tokio::test]
    async fn fetch_fills_stub_endpoints() {
        let (transport, platform) = setup();
        transport.push_envelope(&response(
            EndpointRecord::existing("me", "1"),
            EndpointRecord::existing("you", "2"),
        ));

        let mut conn = Connection::stub("friend", "c1");
        conn.fetch(&platform, &RequestOptions::new()).await.unwrap();
        assert_eq!(conn.endpoint_a().label(), "me");
        assert_eq!(conn.endpoint_b().article_id(), Some("2"));
    }

    #[tokio::test]
    async fn get_by_endpoints_none() {
        let (transport, platform) = setup();
        transport.push_envelope(&ResponseEnvelope::success().with_records("connections", vec![]));
        let found = Connection::get_by_endpoints(&platform, "friend", "1", "2", &RequestOptions::new())
            .await
            .unwrap();
        assert!(found.is_none());
        let sent = &transport.requests()[0];
        assert_eq!(sent.other_id.as_deref(), Some("2"));
    }
}
