//! Integration tests for paged queries and cursors.

use apsdk_core::{Action, Article, Connection, Entity, Object, Query, RequestOptions};
use apsdk_protocol::{EndpointRecord, EntityRecord};
use apsdk_testkit::prelude::*;

fn seed(mock: &MockPlatform, kind: &str, count: usize) {
    for i in 0..count {
        mock.insert(EntityRecord::new(kind).with_property("n", i.to_string()));
    }
}

#[tokio::test]
async fn cursor_walks_all_pages() {
    init_tracing();
    let (mock, platform) = mock_platform();
    seed(&mock, "player", 45);

    let first = Object::find_all(&platform, "player", Query::new(), &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(first.len(), 20);
    assert_eq!(first.total_records(), 45);
    assert!(!first.is_last_page());

    let items = first.into_cursor().collect_all().await.unwrap();
    assert_eq!(items.len(), 45);

    let pages: Vec<u32> = mock
        .requests()
        .iter()
        .filter(|r| r.action == Action::Find)
        .map(|r| r.query.as_ref().unwrap().page_number)
        .collect();
    assert_eq!(pages, vec![1, 2, 3]);

    let numbers: Vec<String> = items
        .iter()
        .map(|o| o.get::<String>("n").unwrap().unwrap())
        .collect();
    assert_eq!(numbers.first().map(String::as_str), Some("0"));
    assert_eq!(numbers.last().map(String::as_str), Some("44"));
}

#[tokio::test]
async fn cursor_counts_pages() {
    let (mock, platform) = mock_platform();
    seed(&mock, "player", 45);

    let first = Object::find_all(&platform, "player", Query::new(), &RequestOptions::new())
        .await
        .unwrap();
    let mut cursor = first.into_cursor();
    let mut seen = 0;
    while cursor.next().await.unwrap().is_some() {
        seen += 1;
    }
    assert_eq!(seen, 45);
    assert_eq!(cursor.pages_fetched(), 2);
    assert_eq!(cursor.yielded(), 45);
    assert_eq!(mock.count_of(Action::Find), 3);
}

#[tokio::test]
async fn next_page_and_last_page() {
    let (mock, platform) = mock_platform();
    seed(&mock, "player", 25);

    let query = Query::new().with_page_size(10).with_page(2);
    let second = Object::find_all(&platform, "player", query, &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(second.page_number(), 2);

    let third = second.next_page().await.unwrap().unwrap();
    assert_eq!(third.page_number(), 3);
    assert_eq!(third.len(), 5);
    assert!(third.is_last_page());
    assert!(third.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn empty_result() {
    let (mock, platform) = mock_platform();
    let first = Object::find_all(&platform, "player", Query::new(), &RequestOptions::new())
        .await
        .unwrap();
    assert!(first.is_empty());
    assert!(first.is_last_page());
    assert!(first.into_cursor().collect_all().await.unwrap().is_empty());
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn configured_page_size_applies() {
    let config = test_config().with_page_size(7);
    let (mock, platform) = platform_with_config(MockPlatform::new(), config);
    seed(&mock, "player", 10);

    let first = Object::find_all(&platform, "player", Query::new(), &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(first.len(), 7);
    assert_eq!(first.page_size(), 7);
}

#[tokio::test]
async fn graph_queries_page_too() {
    let (mock, platform) = mock_platform();
    let hub = mock.insert(EntityRecord::new("person"));
    for _ in 0..25 {
        let spoke = mock.insert(EntityRecord::new("person"));
        mock.insert(EntityRecord::new("friend").with_endpoints(
            EndpointRecord::existing("me", hub.clone()),
            EndpointRecord::existing("you", spoke),
        ));
    }

    let me = Article::stub("person", hub.clone());
    let friends = me
        .connected_articles(&platform, "friend", Query::new().with_label("me"), &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(friends.total_records(), 25);
    let all = friends.into_cursor().collect_all().await.unwrap();
    assert_eq!(all.len(), 25);
    assert!(all.iter().all(|a| a.id() != Some(hub.as_str())));

    let edges = me
        .connections(&platform, "friend", Query::new().with_label("you"), &RequestOptions::new())
        .await
        .unwrap();
    assert!(edges.is_empty());

    let edges = me
        .connections(&platform, "friend", Query::new(), &RequestOptions::new())
        .await
        .unwrap();
    let first: &Connection = &edges.items()[0];
    assert_eq!(first.endpoint_a().article_id(), Some(hub.as_str()));
}
