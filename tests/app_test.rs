mod common;

use common::{WRITE_KEY, event_numbers, received_events};
use rask_analytics::pipeline::FlushOutcome;
use rask_analytics::{App, Config};
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INPUT: &str = r#"{"type":"track","userId":"u1","event":"Signed Up","properties":{"n":0}}

not json at all
{"type":"track","userId":"u1"}
{"type":"screen","anonymousId":"a1","name":"Home","properties":{"n":1}}
"#;

fn config(temp_dir: &TempDir, api_host: &str) -> Config {
    let input = temp_dir.path().join("events.ndjson");
    fs::write(&input, INPUT).unwrap();

    Config {
        write_key: WRITE_KEY.to_string(),
        api_host: api_host.to_string(),
        storage_dir: temp_dir.path().join("queue"),
        input: Some(input),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_run_uploads_valid_lines() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/batch"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    let temp_dir = TempDir::new().unwrap();

    let app = App::from_config(config(&temp_dir, &mock_server.uri()))
        .await
        .unwrap();
    let summary = app.run().await.unwrap();

    assert_eq!(summary.accepted, 2);
    assert_eq!(summary.invalid, 2);
    assert_eq!(summary.flush.outcome, FlushOutcome::Drained);
    assert_eq!(summary.flush.records_uploaded, 2);
    assert_eq!(event_numbers(&received_events(&mock_server).await), vec![0, 1]);
    assert!(temp_dir.path().join("queue").join(WRITE_KEY).exists());
}

#[tokio::test]
async fn test_remote_settings_override_collector_host() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/projects/{WRITE_KEY}/settings")))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"{{"integrations":{{"Rask Analytics":{{"apiHost":"{}/eu"}}}}}}"#,
            mock_server.uri()
        )))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/eu/batch"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    let temp_dir = TempDir::new().unwrap();

    let config = Config {
        cdn_host: Some(mock_server.uri()),
        ..config(&temp_dir, "http://127.0.0.1:1")
    };
    let app = App::from_config(config).await.unwrap();
    assert_eq!(app.coordinator().config().api_host, format!("{}/eu", mock_server.uri()));

    let summary = app.run().await.unwrap();
    assert_eq!(summary.flush.records_uploaded, 2);
}

#[tokio::test]
async fn test_settings_failure_keeps_configured_host() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    let temp_dir = TempDir::new().unwrap();

    let config = Config {
        cdn_host: Some(mock_server.uri()),
        ..config(&temp_dir, "api.example.com/v1")
    };
    let app = App::from_config(config).await.unwrap();
    assert_eq!(app.coordinator().config().api_host, "api.example.com/v1");
    app.coordinator().shutdown().await.unwrap();
}

#[tokio::test]
async fn test_events_stay_queued_when_collector_is_down() {
    let temp_dir = TempDir::new().unwrap();

    let app = App::from_config(config(&temp_dir, "http://127.0.0.1:1"))
        .await
        .unwrap();
    let summary = app.run().await.unwrap();
    assert_eq!(summary.flush.outcome, FlushOutcome::Failed);
    assert_eq!(summary.flush.remaining, 2);

    let store = rask_analytics::storage::open_store(&temp_dir.path().join("queue"), WRITE_KEY);
    assert_eq!(store.size(), 2);
}
