//! Failure tests: remote errors never stop initialization or check-ins
//!
//! - Tagging endpoint failing
//! - Ingestion endpoint unreachable
//! - Ingestion endpoint rejecting payloads

use std::collections::HashSet;

use bigdog::fleet::RegistrationSummary;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_tagging_errors_do_not_block_metrics() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path_regex(r"^/api/v1/tags/hosts/.+$"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/api/v1/tags/hosts/.+$"))
        .respond_with(ResponseTemplate::new(500).set_body_string("tagging is down"))
        .mount(&mock_server)
        .await;

    mount_series_ok(&mock_server).await;

    let mut config = create_test_config(&mock_server.uri(), 3);
    config.vocabulary = scenario_vocabulary();

    let system = initialize(&config).await;
    assert_eq!(system.fleet.len(), 3);
    let fleet = system.fleet.clone();

    let (handle, registration) = system.spawn_check_in(&config);

    let summary = registration.wait().await;
    assert_eq!(
        summary,
        RegistrationSummary {
            attempted: 3,
            succeeded: 0
        }
    );
    // Attempted counts as registered
    assert_eq!(fleet.registered(), 3);

    let report = handle.check_in_now().await.unwrap();
    assert_eq!(report.dispatched, 3);
    handle.shutdown().await.unwrap();

    let hosts: HashSet<_> = requests_to(&mock_server, "POST", SERIES_PATH)
        .await
        .iter()
        .map(|request| body_json(request)["series"][0]["host"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(hosts.len(), 3);
}

#[tokio::test]
async fn test_unreachable_endpoints_are_survived() {
    // Nothing listens on the discard port
    let config = create_test_config("http://127.0.0.1:9", 5);

    let system = initialize(&config).await;
    assert_eq!(system.fleet.len(), 5);

    let (handle, registration) = system.spawn_check_in(&config);
    let summary = registration.wait().await;
    assert_eq!(summary.succeeded, 0);

    // Every cycle still dispatches one task per host
    for _ in 0..3 {
        let report = handle.check_in_now().await.unwrap();
        assert_eq!(report.dispatched, 5);
    }

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rejected_payloads_do_not_stop_the_scheduler() {
    let mock_server = MockServer::start().await;
    mount_tags_ok(&mock_server).await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/api/v1/series$"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"errors":["bad"]}"#))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), 4);
    let system = initialize(&config).await;
    let (handle, registration) = system.spawn_check_in(&config);
    registration.wait().await;

    let first = handle.check_in_now().await.unwrap();
    let second = handle.check_in_now().await.unwrap();
    assert_eq!(first.dispatched, 4);
    assert_eq!(second.dispatched, 4);

    handle.shutdown().await.unwrap();

    let submissions = requests_to(&mock_server, "POST", SERIES_PATH).await;
    assert!(submissions.len() >= 8, "got {}", submissions.len());
}
