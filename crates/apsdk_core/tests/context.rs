//! Integration tests for ambient operation context and request options.

use apsdk_core::{
    ContextPreserver, Device, DeviceType, Entity, Object, OperationContext, RequestOptions,
    SdkError, User, Verbosity,
};
use apsdk_protocol::EntityRecord;
use apsdk_testkit::prelude::*;

#[tokio::test]
async fn ambient_context_reaches_requests() {
    let (mock, platform) = mock_platform();
    let id = mock.insert(EntityRecord::new("player"));

    let preserver = ContextPreserver::new(
        OperationContext::new()
            .with_user_token("session-1")
            .with_header("X-Trace", "t-1"),
    );
    let p = platform.clone();
    let id2 = id.clone();
    preserver
        .preserve(async move { Object::get(&p, "player", &id2, &RequestOptions::new()).await })
        .await
        .unwrap();

    let sent = mock.requests().pop().unwrap();
    assert_eq!(sent.user_token.as_deref(), Some("session-1"));
    assert_eq!(sent.headers.get("X-Trace").map(String::as_str), Some("t-1"));

    Object::get(&platform, "player", &id, &RequestOptions::new())
        .await
        .unwrap();
    let sent = mock.requests().pop().unwrap();
    assert!(sent.user_token.is_none());
    assert!(sent.headers.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn context_survives_spawned_tasks() {
    let (mock, platform) = mock_platform();
    let id = mock.insert(EntityRecord::new("player"));

    let preserver = ContextPreserver::new(OperationContext::new().with_user_token("spawned"));
    let task = tokio::spawn(preserver.preserve(async move {
        tokio::task::yield_now().await;
        Object::get(&platform, "player", &id, &RequestOptions::new()).await
    }));
    task.await.unwrap().unwrap();

    assert_eq!(
        mock.requests().pop().unwrap().user_token.as_deref(),
        Some("spawned")
    );
}

#[tokio::test]
async fn token_precedence() {
    let config = test_config().with_user_token("from-config");
    let (mock, platform) = platform_with_config(MockPlatform::new(), config);
    let id = mock.insert(EntityRecord::new("player"));

    Object::get(&platform, "player", &id, &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(
        mock.requests().pop().unwrap().user_token.as_deref(),
        Some("from-config")
    );

    let preserver = ContextPreserver::new(OperationContext::new().with_user_token("ambient"));
    let p = platform.clone();
    let id2 = id.clone();
    preserver
        .preserve(async move {
            Object::get(
                &p,
                "player",
                &id2,
                &RequestOptions::new().with_user_token("explicit"),
            )
            .await
        })
        .await
        .unwrap();
    assert_eq!(
        mock.requests().pop().unwrap().user_token.as_deref(),
        Some("explicit")
    );
}

#[tokio::test]
async fn request_options_applied() {
    let (mock, platform) = mock_platform();
    let id = mock.insert(EntityRecord::new("player"));

    let options = RequestOptions::new()
        .with_fields(["name", "score"])
        .with_debug(true)
        .with_verbosity(Verbosity::Verbose);
    Object::get(&platform, "player", &id, &options).await.unwrap();

    let sent = mock.requests().pop().unwrap();
    assert_eq!(sent.fields, vec!["name".to_string(), "score".to_string()]);
    assert_eq!(sent.debug, Some(true));
    assert_eq!(sent.verbosity, Some(Verbosity::Verbose));
}

#[tokio::test]
async fn device_registers_and_validates_badge() {
    let (mock, platform) = mock_platform();

    let mut device = Device::new(DeviceType::Android);
    device.set_device_token("token-1");
    device.save(&platform, 0, false, &RequestOptions::new()).await.unwrap();
    assert_eq!(mock.count_of(apsdk_core::Action::Register), 1);

    let err = device.set_badge(-3).unwrap_err();
    assert!(matches!(err, SdkError::Validation { .. }));
    let before = mock.request_count();
    device.save(&platform, 0, false, &RequestOptions::new()).await.unwrap();
    assert_eq!(mock.request_count(), before);

    device.set_badge(4).unwrap();
    device.save(&platform, 0, false, &RequestOptions::new()).await.unwrap();
    let stored = Device::get(&platform, device.id().unwrap(), &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(stored.badge().unwrap(), 4);
    assert_eq!(stored.device_type().unwrap(), DeviceType::Android);
}

#[tokio::test]
async fn users_round_trip() {
    let (_mock, platform) = mock_platform();

    let mut user = User::new();
    user.set_username("jo");
    user.set_email("jo@example.com");
    user.set_password("secret");
    user.save(&platform, 0, false, &RequestOptions::new()).await.unwrap();

    let found = User::find_all(&platform, apsdk_core::Query::new(), &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found.items()[0].username(), Some("jo"));
}
