//! Integration tests for connections and their endpoints.

use apsdk_core::{Action, Article, Connection, Entity, RequestOptions, SdkError};
use apsdk_protocol::EntityRecord;
use apsdk_testkit::prelude::*;

fn opts() -> RequestOptions {
    RequestOptions::new()
}

#[tokio::test]
async fn creates_both_articles_with_connection() {
    init_tracing();
    let (mock, platform) = mock_platform();

    let mut alice = Article::new("person");
    alice.set("name", "alice");
    let mut bob = Article::new("person");
    bob.set("name", "bob");

    let mut friendship = Connection::builder("friend")
        .from_new_article("me", alice)
        .to_new_article("you", bob);
    friendship.save(&platform, 0, false, &opts()).await.unwrap();

    assert_eq!(mock.count_of(Action::Create), 1);
    assert_eq!(mock.len(), 3);
    assert!(friendship.relation_id().is_some());

    let a = friendship.endpoint_a().article().unwrap();
    let b = friendship.endpoint_b().article().unwrap();
    assert_eq!(a.get::<String>("name").unwrap().as_deref(), Some("alice"));
    assert_eq!(b.get::<String>("name").unwrap().as_deref(), Some("bob"));
    assert!(!a.is_new() && !b.is_new());
    assert!(!a.is_dirty());
    assert_eq!(
        mock.record(a.id().unwrap()).unwrap().properties.get("name"),
        Some(&Some("alice".into()))
    );
}

#[tokio::test]
async fn labels_match_when_server_reorders() {
    let (mock, platform) = platform_over(
        MockPlatform::new()
            .with_reversed_endpoints(true)
            .with_endpoint_objects(false),
    );

    let mut alice = Article::new("person");
    alice.set("name", "alice");
    let mut friendship = Connection::builder("friend")
        .from_new_article("me", alice)
        .to_new_article("you", Article::new("person"));
    friendship.save(&platform, 0, false, &opts()).await.unwrap();

    let a_id = friendship.endpoint_a().article_id().unwrap().to_string();
    assert_eq!(friendship.endpoint_a().label(), "me");
    assert_eq!(
        mock.record(&a_id).unwrap().properties.get("name"),
        Some(&Some("alice".into()))
    );
    assert_eq!(
        friendship.endpoint_a().article().unwrap().id(),
        Some(a_id.as_str())
    );
}

#[tokio::test]
async fn same_labels_resolve_by_position() {
    let (mock, platform) = mock_platform();

    let mut first = Article::new("node");
    first.set("pos", "a");
    let mut second = Article::new("node");
    second.set("pos", "b");
    let mut link = Connection::builder("link")
        .from_new_article("node", first)
        .to_new_article("node", second);
    link.save(&platform, 0, false, &opts()).await.unwrap();

    let stored = mock.record(link.id().unwrap()).unwrap();
    let (sa, sb) = stored.endpoints.unwrap();
    assert_eq!(link.endpoint_a().article_id(), sa.object_id.as_deref());
    assert_eq!(link.endpoint_b().article_id(), sb.object_id.as_deref());
    assert_eq!(
        link.endpoint_a()
            .article()
            .unwrap()
            .get::<String>("pos")
            .unwrap()
            .as_deref(),
        Some("a")
    );
}

#[tokio::test]
async fn existing_articles_by_id() {
    let (mock, platform) = mock_platform();
    let a = mock.insert(EntityRecord::new("person"));
    let b = mock.insert(EntityRecord::new("person"));

    let saved_b = Article::get(&platform, "person", &b, &opts()).await.unwrap();
    let mut conn = Connection::builder("friend")
        .from_existing_article("me", a.clone())
        .to_new_article("you", saved_b);
    assert!(!conn.endpoint_b().creates_article());
    conn.save(&platform, 0, false, &opts()).await.unwrap();
    assert_eq!(mock.len(), 3);

    let found = Connection::get_by_endpoints(&platform, "friend", &b, &a, &opts())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id(), conn.id());

    let none = Connection::get_by_endpoints(&platform, "enemy", &a, &b, &opts())
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn unknown_endpoint_article_is_not_found() {
    let (_mock, platform) = mock_platform();
    let mut conn = Connection::builder("friend")
        .from_existing_article("me", "missing")
        .to_new_article("you", Article::new("person"));
    let err = conn.save(&platform, 0, false, &opts()).await.unwrap_err();
    assert!(matches!(err, SdkError::NotFound { .. }));
    assert!(conn.is_new());
    assert!(conn.endpoint_b().creates_article());
}

#[tokio::test]
async fn connection_properties_update_as_delta() {
    let (mock, platform) = mock_platform();
    let a = mock.insert(EntityRecord::new("person"));
    let b = mock.insert(EntityRecord::new("person"));

    let mut conn = Connection::builder("friend")
        .from_existing_article("me", a)
        .to_existing_article("you", b);
    conn.set("since", 2020);
    conn.save(&platform, 0, false, &opts()).await.unwrap();

    conn.set("since", 2021);
    conn.save(&platform, conn.revision(), false, &opts()).await.unwrap();
    assert_eq!(conn.revision(), 2);
    assert_eq!(conn.get::<i32>("since").unwrap(), Some(2021));
    assert_eq!(conn.endpoint_a().label(), "me");

    let fetched = Connection::get(&platform, "friend", conn.id().unwrap(), &opts())
        .await
        .unwrap();
    assert_eq!(fetched.endpoint_b().label(), "you");
}

#[tokio::test]
async fn delete_connections() {
    let (mock, platform) = mock_platform();
    let a = mock.insert(EntityRecord::new("person"));
    let b = mock.insert(EntityRecord::new("person"));
    let mut conn = Connection::builder("friend")
        .from_existing_article("me", a)
        .to_existing_article("you", b);
    conn.save(&platform, 0, false, &opts()).await.unwrap();

    let id = conn.id().unwrap().to_string();
    Connection::bulk_delete(&platform, "friend", &[id.clone()], &opts())
        .await
        .unwrap();
    assert!(mock.record(&id).is_none());
    let err = Connection::delete(&platform, "friend", &id, &opts()).await.unwrap_err();
    assert!(matches!(err, SdkError::NotFound { .. }));
}
