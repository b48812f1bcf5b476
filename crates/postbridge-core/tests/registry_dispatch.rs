//! Integration tests for the account registry and post dispatcher.


use fixtures::{account, can_bind_localhost, client_for, post};
use postbridge_core::ApiErrorKind;
use postbridge_core::dispatcher::{NewPost, PostDispatcher, Schedule};
use postbridge_core::registry::AccountRegistry;
use postbridge_types::{ConnectionStatus, Platform, PostTime};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_accounts(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/oauth/social/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// The cached set mirrors the backend sequence, duplicates included.
#[tokio::test]
async fn test_refresh_then_list_matches_backend() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    mount_accounts(
        &server,
        json!([account(2, "instagram"), account(1, "facebook"), account(2, "instagram")]),
    )
    .await;

    let (_home, client) = client_for(&server.uri());
    let mut registry = AccountRegistry::new(client);
    registry.refresh().await.unwrap();

    let ids: Vec<&str> = registry.list().iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "1", "2"]);

    let facebook = registry.find_by_platform("facebook").unwrap();
    assert_eq!(facebook.platform_user_id, "facebook-user-1");
    assert_eq!(facebook.pages.len(), 1);
    assert_eq!(facebook.pages[0].name.as_deref(), Some("Shop"));
    assert_eq!(facebook.connection_status, ConnectionStatus::Active);
}

#[tokio::test]
async fn test_failed_refresh_keeps_snapshot() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/oauth/social/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([account(1, "facebook")])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/oauth/social/accounts"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (_home, client) = client_for(&server.uri());
    let mut registry = AccountRegistry::new(client);
    registry.refresh().await.unwrap();

    let err = registry.refresh().await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 503");
    assert_eq!(registry.list().len(), 1);
}

#[tokio::test]
async fn test_unlink_leaves_cache_until_refresh() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/oauth/social/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([account(1, "facebook")])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/oauth/social/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/oauth/social/accounts/facebook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "unlinked"})))
        .expect(1)
        .mount(&server)
        .await;

    let (_home, client) = client_for(&server.uri());
    let mut registry = AccountRegistry::new(client);
    registry.refresh().await.unwrap();

    registry.unlink(Platform::Facebook).await.unwrap();
    assert_eq!(registry.list().len(), 1);

    registry.refresh().await.unwrap();
    assert!(registry.list().is_empty());
}

#[tokio::test]
async fn test_create_with_empty_registry_makes_no_request() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    mount_accounts(&server, json!([])).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_home, client) = client_for(&server.uri());
    let mut registry = AccountRegistry::new(client.clone());
    registry.refresh().await.unwrap();
    let mut dispatcher = PostDispatcher::new(client);

    let new_post = NewPost {
        content: "Hello".to_string(),
        platform: "facebook".to_string(),
        schedule: Schedule::Now,
    };
    let err = dispatcher.create(&registry, &new_post).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Validation);
    assert_eq!(err.to_string(), "no connected accounts");
}

#[tokio::test]
async fn test_create_rejects_blank_content_and_unlinked_platform() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    mount_accounts(&server, json!([account(1, "facebook")])).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_home, client) = client_for(&server.uri());
    let mut registry = AccountRegistry::new(client.clone());
    registry.refresh().await.unwrap();
    let mut dispatcher = PostDispatcher::new(client);

    let blank = NewPost {
        content: "  \n\t".to_string(),
        platform: "facebook".to_string(),
        schedule: Schedule::Now,
    };
    let err = dispatcher.create(&registry, &blank).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Validation);

    let unlinked = NewPost {
        content: "Hello".to_string(),
        platform: "instagram".to_string(),
        schedule: Schedule::Now,
    };
    let err = dispatcher.create(&registry, &unlinked).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Validation);

    let err = dispatcher.post_instant("facebook", "").await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Validation);
}

#[tokio::test]
async fn test_instant_with_blank_content_makes_no_request() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/posts/instant"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_home, client) = client_for(&server.uri());
    let mut dispatcher = PostDispatcher::new(client);

    let err = dispatcher
        .post_instant("facebook", " \n\t ")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Validation);
    assert_eq!(err.to_string(), "Post content cannot be empty");
}

#[tokio::test]
async fn test_create_now_sends_null_schedule_and_refreshes() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    mount_accounts(&server, json!([account(1, "facebook"), account(2, "instagram")])).await;
    Mock::given(method("POST"))
        .and(path("/api/posts/create"))
        .and(body_json(json!({
            "content": "Launch day!",
            "platform": "facebook",
            "schedule_time": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 11})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            post(11, "facebook", "published"),
            post(10, "instagram", "scheduled"),
            post(9, "facebook", "failed"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let (_home, client) = client_for(&server.uri());
    let mut registry = AccountRegistry::new(client.clone());
    registry.refresh().await.unwrap();
    let mut dispatcher = PostDispatcher::new(client);

    let new_post = NewPost {
        content: "Launch day!".to_string(),
        platform: "facebook".to_string(),
        schedule: Schedule::parse(" now "),
    };
    let receipt = dispatcher.create(&registry, &new_post).await.unwrap();

    assert!(receipt.refreshed);
    assert_eq!(receipt.response["id"], 11);
    assert_eq!(dispatcher.posts().len(), 3);

    let stats = dispatcher.stats();
    assert_eq!(stats.total_posts, 3);
    assert_eq!(stats.count_for("facebook"), 2);
    assert_eq!(stats.count_for("instagram"), 1);
    assert_eq!(stats.scheduled_count, 1);
}

#[tokio::test]
async fn test_scheduled_time_passed_verbatim() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    mount_accounts(&server, json!([account(2, "instagram")])).await;
    Mock::given(method("POST"))
        .and(path("/api/posts/create"))
        .and(body_json(json!({
            "content": "Later",
            "platform": "instagram",
            "schedule_time": "2024-06-01T09:30"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 12})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let (_home, client) = client_for(&server.uri());
    let mut registry = AccountRegistry::new(client.clone());
    registry.refresh().await.unwrap();
    let mut dispatcher = PostDispatcher::new(client);

    let new_post = NewPost {
        content: "Later".to_string(),
        platform: "instagram".to_string(),
        schedule: Schedule::parse("2024-06-01T09:30"),
    };
    dispatcher.create(&registry, &new_post).await.unwrap();
}

/// The dispatch stands even when the follow-up history fetch fails.
#[tokio::test]
async fn test_refetch_failure_still_reports_dispatch() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/posts/instant"))
        .and(body_json(json!({"content": "Now!", "platform": "instagram"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "published"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (_home, client) = client_for(&server.uri());
    let mut dispatcher = PostDispatcher::new(client);

    let receipt = dispatcher.post_instant("instagram", "Now!").await.unwrap();
    assert!(!receipt.refreshed);
    assert!(dispatcher.posts().is_empty());
}

#[tokio::test]
async fn test_create_surfaces_validation_detail() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    mount_accounts(&server, json!([account(1, "facebook")])).await;
    Mock::given(method("POST"))
        .and(path("/api/posts/create"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [{"loc": ["body", "schedule_time"], "msg": "invalid datetime format"}]
        })))
        .mount(&server)
        .await;

    let (_home, client) = client_for(&server.uri());
    let mut registry = AccountRegistry::new(client.clone());
    registry.refresh().await.unwrap();
    let mut dispatcher = PostDispatcher::new(client);

    let new_post = NewPost {
        content: "Hi".to_string(),
        platform: "facebook".to_string(),
        schedule: Schedule::parse("tomorrow"),
    };
    let err = dispatcher.create(&registry, &new_post).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Backend);
    assert_eq!(err.status, Some(422));
    assert_eq!(err.to_string(), "invalid datetime format");
}

#[tokio::test]
async fn test_unknown_post_status_is_kept() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            post(1, "whatsapp", "queued"),
        ])))
        .mount(&server)
        .await;

    let (_home, client) = client_for(&server.uri());
    let mut dispatcher = PostDispatcher::new(client);
    let posts = dispatcher.refresh().await.unwrap();

    assert_eq!(posts[0].status.as_str(), "queued");
    assert_eq!(dispatcher.stats().count_for("whatsapp"), 1);
    assert_eq!(dispatcher.stats().scheduled_count, 0);
}

/// Plain-text acknowledgements still count as accepted dispatches.
#[tokio::test]
async fn test_plain_text_dispatch_response_is_accepted() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    mount_accounts(&server, json!([account(1, "facebook")])).await;
    Mock::given(method("POST"))
        .and(path("/api/posts/instant"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Posted"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/posts/create"))
        .respond_with(ResponseTemplate::new(201).set_body_string("Created"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            post(1, "facebook", "published"),
        ])))
        .expect(2)
        .mount(&server)
        .await;

    let (_home, client) = client_for(&server.uri());
    let mut registry = AccountRegistry::new(client.clone());
    registry.refresh().await.unwrap();
    let mut dispatcher = PostDispatcher::new(client);

    let receipt = dispatcher.post_instant("facebook", "Now!").await.unwrap();
    assert_eq!(receipt.response, json!("Posted"));
    assert!(receipt.refreshed);

    let new_post = NewPost {
        content: "Soon".to_string(),
        platform: "facebook".to_string(),
        schedule: Schedule::Now,
    };
    let receipt = dispatcher.create(&registry, &new_post).await.unwrap();
    assert_eq!(receipt.response, json!("Created"));
    assert!(receipt.refreshed);
}

/// A minute-precision directive echoed back by the backend keeps the
/// history readable.
#[tokio::test]
async fn test_echoed_schedule_directive_survives_refresh() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    mount_accounts(&server, json!([account(1, "facebook")])).await;
    Mock::given(method("POST"))
        .and(path("/api/posts/create"))
        .and(body_json(json!({
            "content": "Weekend sale",
            "platform": "facebook",
            "schedule_time": "2024-06-01T09:00"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 21})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 21,
                "content": "Weekend sale",
                "platform": "facebook",
                "status": "scheduled",
                "scheduled_time": "2024-06-01T09:00",
                "created_at": "2024-05-30T12:00:00"
            },
            {
                "id": 20,
                "content": "Someday",
                "platform": "facebook",
                "status": "scheduled",
                "scheduled_time": "whenever",
                "created_at": "2024-05-29T12:00:00"
            }
        ])))
        .mount(&server)
        .await;

    let (_home, client) = client_for(&server.uri());
    let mut registry = AccountRegistry::new(client.clone());
    registry.refresh().await.unwrap();
    let mut dispatcher = PostDispatcher::new(client);

    let new_post = NewPost {
        content: "Weekend sale".to_string(),
        platform: "facebook".to_string(),
        schedule: Schedule::parse("2024-06-01T09:00"),
    };
    let receipt = dispatcher.create(&registry, &new_post).await.unwrap();

    assert!(receipt.refreshed);
    assert_eq!(dispatcher.stats().total_posts, 2);
    assert_eq!(dispatcher.stats().scheduled_count, 2);

    let posts = dispatcher.posts();
    let echoed = posts[0].scheduled_time.as_ref().unwrap();
    assert!(echoed.timestamp().is_some());
    assert_eq!(
        posts[1].scheduled_time,
        Some(PostTime::Raw("whenever".to_string()))
    );
}
