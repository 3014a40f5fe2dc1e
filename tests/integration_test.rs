//! Integration tests for IssueChat
//!
//! These tests drive the GitHub transport against a local mock server and
//! verify the full workflow from config loading through sync and send.

use issuechat::config::{validate_config, ChatConfig};
use issuechat::events::ChatEvent;
use issuechat::query::{self, FilterSpec, SortMode};
use issuechat::supervisor::ConnectionState;
use issuechat::transport::{
    GitHubTransport, IssueTransport, ListOptions, NewItem, TransportError,
};
use issuechat::ChatClient;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to build a GitHub issue payload
fn issue(id: u64, login: &str, created_at: &str, comments: u32, labels: &[&str]) -> Value {
    json!({
        "id": id,
        "number": id,
        "title": format!("message {}", id),
        "body": format!("body of {}", id),
        "user": { "login": login, "avatar_url": format!("https://avatars/{}", login) },
        "created_at": created_at,
        "updated_at": created_at,
        "comments": comments,
        "labels": labels
            .iter()
            .map(|name| json!({ "name": name, "color": "ededed" }))
            .collect::<Vec<_>>(),
    })
}

fn repository(push: bool) -> Value {
    json!({
        "full_name": "octo/chat",
        "permissions": { "admin": false, "push": push, "pull": true }
    })
}

fn transport_for(server: &MockServer) -> GitHubTransport {
    GitHubTransport::with_base_url(server.uri())
        .unwrap()
        .with_token("ghp_test")
}

mod transport_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_items_skips_pull_requests() {
        let server = MockServer::start().await;

        let mut pr = issue(3, "carol", "2026-03-01T12:03:00Z", 0, &[]);
        pr["pull_request"] = json!({ "url": "https://example/pr/3" });

        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues"))
            .and(query_param("state", "open"))
            .and(query_param("per_page", "50"))
            .and(query_param("sort", "created"))
            .and(query_param("direction", "desc"))
            .and(header("authorization", "Bearer ghp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                issue(2, "bob", "2026-03-01T12:02:00Z", 1, &["chat"]),
                pr,
                issue(1, "alice", "2026-03-01T12:01:00Z", 0, &["chat", "urgent"]),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let records = transport
            .list_items("octo", "chat", &ListOptions::default())
            .await
            .unwrap();

        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(records[0].author.name, "bob");
        assert_eq!(records[1].labels.len(), 2);
    }

    #[tokio::test]
    async fn test_create_item_posts_labels() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/octo/chat/issues"))
            .and(body_partial_json(json!({
                "title": "Hello",
                "labels": ["chat"]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(issue(
                77,
                "alice",
                "2026-03-01T12:00:00Z",
                0,
                &["chat"],
            )))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let record = transport
            .create_item(
                "octo",
                "chat",
                &NewItem {
                    title: "Hello".to_string(),
                    body: "first".to_string(),
                    labels: vec!["chat".to_string()],
                },
            )
            .await
            .unwrap();

        assert_eq!(record.id, 77);
    }

    #[tokio::test]
    async fn test_error_statuses_are_classified() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/octo/secret/issues"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/busy/issues"))
            .respond_with(
                ResponseTemplate::new(403).set_body_string("API rate limit exceeded for user"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/gone/issues"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/broken/issues"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let options = ListOptions::default();

        let err = transport.list_items("octo", "secret", &options).await.unwrap_err();
        assert!(err.is_auth());

        let err = transport.list_items("octo", "busy", &options).await.unwrap_err();
        assert!(matches!(err, TransportError::RateLimited));

        let err = transport.list_items("octo", "gone", &options).await.unwrap_err();
        assert!(matches!(err, TransportError::NotFound(_)));

        let err = transport.list_items("octo", "broken", &options).await.unwrap_err();
        assert!(matches!(err, TransportError::Api { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_validate_access_reads_permissions() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/octo/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repository(true)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues"))
            .and(query_param("per_page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let report = transport.validate_access("octo", "chat").await;

        assert!(report.is_usable());
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_validate_access_read_only() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/octo/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repository(false)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let report = transport.validate_access("octo", "chat").await;

        assert!(report.accessible);
        assert!(report.can_read);
        assert!(!report.can_write);
        assert!(!report.is_usable());
    }

    #[tokio::test]
    async fn test_validate_access_unreachable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/octo/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let report = transport.validate_access("octo", "missing").await;

        assert!(!report.accessible);
        assert!(report.error.is_some());
    }
}

mod client_tests {
    use super::*;

    fn config_for(server: &MockServer) -> ChatConfig {
        let mut config = ChatConfig::new().with_repository("octo/chat");
        config.api_url = server.uri();
        config.api_key = Some("ghp_test".to_string());
        config.auto_sync = false;
        config
    }

    async fn mount_listing(server: &MockServer, issues: Value) {
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issues))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_start_sync_and_query() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            json!([
                issue(3, "bob", "2026-03-01T12:03:00Z", 0, &["urgent"]),
                issue(2, "alice", "2026-03-01T12:02:00Z", 4, &["chat"]),
                issue(1, "alice", "2026-03-01T12:01:00Z", 1, &["urgent"]),
            ]),
        )
        .await;

        let client = ChatClient::from_config(config_for(&server)).unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let _sub = client.subscribe(move |event| sink.lock().unwrap().push(event.event_type()));

        let snapshot = client.start().await.unwrap();

        assert_eq!(snapshot.ids(), vec![3, 2, 1]);
        assert_eq!(client.messages().ids(), vec![3, 2, 1]);
        assert_eq!(client.supervisor().state(), ConnectionState::Connected);
        assert_eq!(*events.lock().unwrap(), vec!["sync_completed"]);

        let alice_urgent = query::filter(&snapshot, &FilterSpec::new().author("alice").tag("urgent"));
        assert_eq!(alice_urgent.ids(), vec![1]);

        let popular = query::sort(&snapshot, SortMode::Popular);
        assert_eq!(popular.ids(), vec![2, 1, 3]);

        client.shutdown();
    }

    #[tokio::test]
    async fn test_send_message_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/chat/issues"))
            .and(body_partial_json(json!({
                "title": "Anyone around?",
                "body": "Looking for a review on the parser change",
                "labels": ["question", "chat"]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(issue(
                10,
                "alice",
                "2026-03-01T12:00:00Z",
                0,
                &["question", "chat"],
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::from_config(config_for(&server)).unwrap();
        let (_sub, mut events) = client.bus().subscribe_channel();

        let message = client
            .send_message(
                "  Anyone around?  ",
                "Looking for a review on the parser change",
                &["question".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(message.id, 10);

        match events.recv().await {
            Some(ChatEvent::MessageAdded { message, .. }) => assert_eq!(message.id, 10),
            other => panic!("expected MessageAdded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_sync_keeps_last_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([issue(
                1,
                "alice",
                "2026-03-01T12:00:00Z",
                0,
                &[]
            )])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = ChatClient::from_config(config_for(&server)).unwrap();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let _sub = client.subscribe(move |event| {
            if let ChatEvent::Error { cause, .. } = event {
                sink.lock().unwrap().push(cause.clone());
            }
        });

        client.sync_now().await.unwrap();
        assert!(client.sync_now().await.is_err());

        assert_eq!(client.messages().ids(), vec![1]);
        assert!(!client.engine().is_syncing());
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("500"));
    }

    #[tokio::test]
    async fn test_reconfigure_persists_settings() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let client = ChatClient::from_config(config_for(&server))
            .unwrap()
            .with_config_path(config_path.clone());
        client.update_sync_settings(90, false).unwrap();

        let saved = ChatConfig::load(&config_path).unwrap();
        assert_eq!(saved.sync_interval_seconds, 90);
        assert!(!saved.auto_sync);
        assert_eq!(saved.repository.as_deref(), Some("octo/chat"));
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.yaml");

        let mut config = ChatConfig::new().with_repository("octo/chat");
        config.sync_interval_seconds = 15;
        config.labels.urgent = "p0".to_string();

        config.save(&config_path).unwrap();
        let loaded = ChatConfig::load(&config_path).unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.repository_config().unwrap().labels.urgent, "p0");
        assert!(validate_config(&loaded).is_ok());
    }

    #[test]
    fn test_config_yaml_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            "repository: octo/chat\nsync_interval_seconds: 0\nlabels:\n  chat: talk\n",
        )
        .unwrap();

        let config = ChatConfig::load(&config_path).unwrap();
        assert_eq!(config.labels.chat, "talk");
        assert!(config.auto_sync);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "sync_interval_seconds");
    }
}
