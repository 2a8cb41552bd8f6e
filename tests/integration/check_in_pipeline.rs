//! End-to-end check-in cycles against a mock ingestion endpoint

use std::collections::HashSet;

use bigdog::config::GaugeBounds;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_cycle_submits_one_payload_per_host() {
    let mock_server = MockServer::start().await;
    mount_tags_ok(&mock_server).await;
    mount_series_ok(&mock_server).await;

    let mut config = create_test_config(&mock_server.uri(), 3);
    config.vocabulary = scenario_vocabulary();

    let system = initialize(&config).await;
    let (handle, registration) = system.spawn_check_in(&config);

    let report = handle.check_in_now().await.unwrap();
    assert_eq!(report.dispatched, 3);
    assert_eq!(report.hosts, 3);

    handle.shutdown().await.unwrap();
    registration.wait().await;

    let submissions: Vec<_> = requests_to(&mock_server, "POST", SERIES_PATH)
        .await
        .iter()
        .map(body_json)
        .filter(|body| body["series"][0]["points"][0][0] == report.timestamp)
        .collect();

    let hosts: HashSet<_> = submissions
        .iter()
        .map(|body| body["series"][0]["host"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        hosts,
        HashSet::from([
            "bigdog_0".to_string(),
            "bigdog_1".to_string(),
            "bigdog_2".to_string()
        ])
    );

    let bounds = GaugeBounds::default();
    for body in &submissions {
        let series = body["series"].as_array().unwrap();
        assert_eq!(series.len(), 4);

        assert_eq!(series[0]["metric"], "system.cpu.stolen");
        assert_eq!(
            series[0]["points"],
            serde_json::json!([[report.timestamp, 0]])
        );

        for (entry, (name, range)) in series[1..].iter().zip([
            ("system.cpu.user", bounds.cpu_user),
            ("system.disk.used", bounds.disk_used),
            ("system.mem.used", bounds.mem_used),
        ]) {
            assert_eq!(entry["metric"], name);
            let value = entry["points"][0][1].as_i64().unwrap();
            assert!(range.contains(value), "{name} = {value} outside {range:?}");
        }

        for entry in series {
            assert_eq!(entry["type"], "gauge");
            assert_eq!(
                entry["tags"],
                serde_json::json!(["role:redis", "cloud_provider:aws"])
            );
        }
    }
}

#[tokio::test]
async fn test_series_requests_carry_credentials() {
    let mock_server = MockServer::start().await;
    mount_tags_ok(&mock_server).await;
    mount_series_ok(&mock_server).await;

    let config = create_test_config(&mock_server.uri(), 2);
    let system = initialize(&config).await;
    let (handle, registration) = system.spawn_check_in(&config);

    handle.check_in_now().await.unwrap();
    handle.shutdown().await.unwrap();
    registration.wait().await;

    let submissions = requests_to(&mock_server, "POST", SERIES_PATH).await;
    assert!(!submissions.is_empty());
    for request in &submissions {
        let query = request.url.query().unwrap_or_default();
        assert!(query.contains("api_key=test-api-key"));
        assert!(query.contains("application_key=test-app-key"));
    }
}

#[tokio::test]
async fn test_service_checks_are_submitted_when_enabled() {
    let mock_server = MockServer::start().await;
    mount_tags_ok(&mock_server).await;
    mount_series_ok(&mock_server).await;

    Mock::given(method("POST"))
        .and(path(CHECK_RUN_PATH))
        .respond_with(ResponseTemplate::new(202))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), 4);
    config.check_in.service_checks = true;

    let system = initialize(&config).await;
    let (handle, registration) = system.spawn_check_in(&config);

    let report = handle.check_in_now().await.unwrap();
    handle.shutdown().await.unwrap();
    registration.wait().await;

    let checks: Vec<_> = requests_to(&mock_server, "POST", CHECK_RUN_PATH)
        .await
        .iter()
        .map(body_json)
        .filter(|body| body["timestamp"] == report.timestamp)
        .collect();
    let hosts: HashSet<_> = checks
        .iter()
        .map(|check| check["host_name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(hosts.len(), 4);
    for check in &checks {
        assert_eq!(check["check"], "bigdog.is_ok");
        assert_eq!(check["status"], 0);
    }
}

#[tokio::test]
async fn test_in_flight_requests_are_bounded() {
    let mock_server = MockServer::start().await;
    mount_tags_ok(&mock_server).await;

    Mock::given(method("POST"))
        .and(path(SERIES_PATH))
        .respond_with(ResponseTemplate::new(202).set_delay(std::time::Duration::from_millis(200)))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), 6);
    config.throttle.max_in_flight = 2;

    let system = initialize(&config).await;
    let (handle, registration) = system.spawn_check_in(&config);
    registration.wait().await;

    // Six submissions through two slots: the last ones wait for two rounds
    let start = std::time::Instant::now();
    let report = handle.check_in_now().await.unwrap();
    assert_eq!(report.dispatched, 6);
    assert!(
        start.elapsed() >= std::time::Duration::from_millis(400),
        "fan-out finished too quickly: {:?}",
        start.elapsed()
    );

    handle.shutdown().await.unwrap();
}
