//! Schema-typed articles and graph queries.

use crate::config::RequestOptions;
use crate::connection::Connection;
use crate::entity::{Entity, EntityCore};
use crate::error::{SdkError, SdkResult};
use crate::paging::PagedList;
use crate::platform::{decode_records, Platform};
use crate::registry::{EntityRegistry, FromRecord};
use crate::request::{Action, ApiRequest, Query, Resource};
use apsdk_protocol::{EntityRecord, ResponseEnvelope};
use async_trait::async_trait;

/// A record of a user-defined schema. Articles are what connections join.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    core: EntityCore,
}

impl Article {
    /// Creates a new, unsaved article.
    pub fn new(kind: impl Into<String>) -> Self {
        Self::from_core(EntityCore::new(kind))
    }

    /// Creates a stub for an existing article. Nothing is fetched.
    pub fn stub(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::from_core(EntityCore::stub(kind, id))
    }

    pub(crate) fn from_core(core: EntityCore) -> Self {
        Self { core }
    }

    /// Reads an article by id.
    pub async fn get(
        platform: &Platform,
        kind: &str,
        id: &str,
        options: &RequestOptions,
    ) -> SdkResult<Self> {
        let record = platform
            .get_record(Resource::Article, kind, id, options)
            .await?;
        Self::from_record(record, platform.registry())
    }

    /// Deletes an article by id.
    pub async fn delete(
        platform: &Platform,
        kind: &str,
        id: &str,
        options: &RequestOptions,
    ) -> SdkResult<()> {
        platform
            .delete_record(Resource::Article, kind, id, options)
            .await
    }

    /// Lists articles matching a query.
    pub async fn find_all(
        platform: &Platform,
        kind: &str,
        query: Query,
        options: &RequestOptions,
    ) -> SdkResult<PagedList<Self>> {
        let request = ApiRequest::new(Resource::Article, Action::Find, kind)
            .with_query(query)
            .with_options(options);
        platform.paged(request, decode_records::<Self>).await
    }

    /// Lists articles connected to this one through `relation`.
    ///
    /// `query.label` restricts the endpoint label of this article.
    pub async fn connected_articles(
        &self,
        platform: &Platform,
        relation: &str,
        query: Query,
        options: &RequestOptions,
    ) -> SdkResult<PagedList<Article>> {
        let request = self.graph_request(relation, query, false, options)?;
        platform.paged(request, decode_node_articles).await
    }

    /// Lists connections of `relation` that touch this article.
    pub async fn connections(
        &self,
        platform: &Platform,
        relation: &str,
        query: Query,
        options: &RequestOptions,
    ) -> SdkResult<PagedList<Connection>> {
        let request = self.graph_request(relation, query, true, options)?;
        platform.paged(request, decode_node_edges).await
    }

    fn graph_request(
        &self,
        relation: &str,
        query: Query,
        return_edge: bool,
        options: &RequestOptions,
    ) -> SdkResult<ApiRequest> {
        let id = self.core.require_id()?;
        Ok(ApiRequest::new(Resource::Article, Action::FindConnected, relation)
            .with_id(id)
            .with_return_edge(return_edge)
            .with_query(query)
            .with_options(options))
    }
}

fn decode_node_articles(
    _registry: &EntityRegistry,
    envelope: ResponseEnvelope,
) -> SdkResult<Vec<Article>> {
    Ok(envelope
        .into_nodes()
        .into_iter()
        .map(|node| Article::from_core(EntityCore::from_record(node.article)))
        .collect())
}

fn decode_node_edges(
    _registry: &EntityRegistry,
    envelope: ResponseEnvelope,
) -> SdkResult<Vec<Connection>> {
    envelope
        .into_nodes()
        .into_iter()
        .map(|node| {
            node.edge
                .map(Connection::from_wire)
                .ok_or_else(|| SdkError::internal("graph node without a connection"))
        })
        .collect()
}

impl FromRecord for Article {
    fn from_record(record: EntityRecord, _registry: &EntityRegistry) -> SdkResult<Self> {
        Ok(Self::from_core(EntityCore::from_record(record)))
    }
}

#[async_trait]
impl Entity for Article {
    fn resource(&self) -> Resource {
        Resource::Article
    }

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, Environment};
    use crate::transport::MockTransport;
    use apsdk_protocol::{EndpointRecord, GraphNode, PagingInfo};
    use std::sync::Arc;

    fn setup() -> (Arc<MockTransport>, Platform) {
        let transport = Arc::new(MockTransport::new());
        let platform = Platform::new(ClientConfig::new("k", Environment::Sandbox), transport.clone());
        (transport, platform)
    }

    fn node(id: &str) -> GraphNode {
        GraphNode {
            article: EntityRecord::new("person").with_id(id),
            edge: Some(
                EntityRecord::new("friend")
                    .with_id(format!("c{id}"))
                    .with_endpoints(
                        EndpointRecord::existing("me", "1"),
                        EndpointRecord::existing("you", id),
                    ),
            ),
        }
    }

    #[tokio::test]
    async fn connected_articles_from_nodes() {
        let (transport, platform) = setup();
        transport.push_envelope(
            &ResponseEnvelope::success()
                .with_nodes(vec![node("2"), node("3")])
                .with_paging(PagingInfo::new(1, 20, 2)),
        );

        let me = Article::stub("person", "1");
        let friends = me
            .connected_articles(&platform, "friend", Query::new().with_label("me"), &RequestOptions::new())
            .await
            .unwrap();
        let ids: Vec<_> = friends.items().iter().map(|a| a.id().unwrap().to_string()).collect();
        assert_eq!(ids, vec!["2", "3"]);

        let sent = &transport.requests()[0];
        assert_eq!(sent.action, Action::FindConnected);
        assert!(!sent.return_edge);
        assert_eq!(sent.id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn connections_from_edges() {
        let (transport, platform) = setup();
        transport.push_envelope(
            &ResponseEnvelope::success()
                .with_nodes(vec![node("2")])
                .with_paging(PagingInfo::new(1, 20, 1)),
        );

        let me = Article::stub("person", "1");
        let edges = me
            .connections(&platform, "friend", Query::new(), &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(edges.items()[0].id(), Some("c2"));
        assert_eq!(edges.items()[0].endpoint_b().article_id(), Some("2"));
        assert!(transport.requests()[0].return_edge);
    }

    #[tokio::test]
    async fn graph_query_needs_id() {
        let (transport, platform) = setup();
        let err = Article::new("person")
            .connections(&platform, "friend", Query::new(), &RequestOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(transport.request_count(), 0);
    }
}
