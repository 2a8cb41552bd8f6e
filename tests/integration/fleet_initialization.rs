//! Fleet initialization against a mock tagging endpoint

use std::collections::HashSet;

use bigdog::fleet::RegistrationSummary;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_every_host_gets_its_tags_replaced() {
    let mock_server = MockServer::start().await;
    mount_tags_ok(&mock_server).await;

    let mut config = create_test_config(&mock_server.uri(), 3);
    config.vocabulary = scenario_vocabulary();

    let system = initialize(&config).await;
    assert_eq!(system.fleet.len(), 3);

    let fleet = system.fleet.clone();
    let summary = system.registration.wait().await;
    assert_eq!(
        summary,
        RegistrationSummary {
            attempted: 3,
            succeeded: 3
        }
    );
    assert_eq!(fleet.registered(), 3);

    for host in fleet.hosts() {
        assert_eq!(host.rendered_tags(), vec!["role:redis", "cloud_provider:aws"]);
    }

    let deletes = requests_to(&mock_server, "DELETE", TAGS_PATH).await;
    let posts = requests_to(&mock_server, "POST", TAGS_PATH).await;
    assert_eq!(deletes.len(), 3);
    assert_eq!(posts.len(), 3);

    let tagged: HashSet<_> = posts.iter().map(|r| r.url.path().to_string()).collect();
    let expected: HashSet<_> = (0..3)
        .map(|i| format!("{TAGS_PATH}/bigdog_{i}"))
        .collect();
    assert_eq!(tagged, expected);

    for post in &posts {
        assert_eq!(
            body_json(post),
            serde_json::json!({"tags": ["role:redis", "cloud_provider:aws"]})
        );
        let query = post.url.query().unwrap_or_default();
        assert!(query.contains("api_key=test-api-key"));
        assert!(query.contains("application_key=test-app-key"));
    }
}

#[tokio::test]
async fn test_sizing_collaborator_offsets_host_numbers() {
    let mock_server = MockServer::start().await;
    mount_tags_ok(&mock_server).await;

    Mock::given(method("GET"))
        .and(path(SIZING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"count": 2})))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), 5);
    config.endpoints.sizing = Some(format!("{}{SIZING_PATH}", mock_server.uri()));

    let system = initialize(&config).await;
    let names: Vec<_> = system
        .fleet
        .hosts()
        .iter()
        .map(|host| host.name().to_string())
        .collect();

    assert_eq!(
        names,
        vec!["bigdog_10", "bigdog_11", "bigdog_12", "bigdog_13", "bigdog_14"]
    );
    system.registration.wait().await;
}

#[tokio::test]
async fn test_malformed_sizing_response_numbers_from_zero() {
    let mock_server = MockServer::start().await;
    mount_tags_ok(&mock_server).await;

    Mock::given(method("GET"))
        .and(path(SIZING_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream unavailable"))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), 2);
    config.endpoints.sizing = Some(format!("{}{SIZING_PATH}", mock_server.uri()));

    let system = initialize(&config).await;
    assert!(system.fleet.get("bigdog_0").is_some());
    assert!(system.fleet.get("bigdog_1").is_some());
    system.registration.wait().await;
}

#[tokio::test]
async fn test_zero_hosts_is_a_no_op() {
    let mock_server = MockServer::start().await;

    let config = create_test_config(&mock_server.uri(), 0);
    let system = initialize(&config).await;

    assert!(system.fleet.is_empty());
    assert!(system.registration.is_empty());
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_host_tags_never_change_after_creation() {
    let mock_server = MockServer::start().await;
    mount_tags_ok(&mock_server).await;
    mount_series_ok(&mock_server).await;

    let config = create_test_config(&mock_server.uri(), 20);
    let system = initialize(&config).await;

    let before: Vec<_> = system
        .fleet
        .hosts()
        .iter()
        .map(|host| host.rendered_tags())
        .collect();
    let fleet = system.fleet.clone();

    let (handle, registration) = system.spawn_check_in(&config);
    handle.check_in_now().await.unwrap();
    handle.shutdown().await.unwrap();
    registration.wait().await;

    let after: Vec<_> = fleet.hosts().iter().map(|host| host.rendered_tags()).collect();
    assert_eq!(before, after);
    assert!(before.iter().all(|tags| tags.len() == 3));
}
