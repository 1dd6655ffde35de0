//! End-to-end import tests using wiremock.
//!
//! These drive the fetch → store pipeline against a mock metrics API and
//! an in-memory SQLite store with real migrations.

use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param, query_param_is_missing},
};

use crate::{
    config::GithubConfig,
    db::{DbPool, SnapshotRepo, tests::harness::migrated_pool},
    github::{FetchError, MetricsClient},
    ingest::{self, ImportError},
    secrets::{MemorySecretManager, SecretManager},
};

const TOKEN_KEY: &str = "TEST_GHCP_TOKEN";
const TOKEN: &str = "ghp_e2e_token";

fn test_config(server: &MockServer, orgs: &[&str]) -> GithubConfig {
    GithubConfig {
        api_base: server.uri(),
        orgs: orgs.iter().map(|s| s.to_string()).collect(),
        token_secret: TOKEN_KEY.to_string(),
        ..GithubConfig::default()
    }
}

async fn seeded_secrets() -> MemorySecretManager {
    let secrets = MemorySecretManager::new();
    secrets.set(TOKEN_KEY, TOKEN).await.expect("seed token");
    secrets
}

fn snapshot(date: &str, active: i64) -> serde_json::Value {
    json!({
        "date": date,
        "total_active_users": active,
        "total_engaged_users": active / 2,
        "copilot_ide_code_completions": {
            "editors": [{
                "name": "vscode",
                "models": [{
                    "name": "default",
                    "languages": [{
                        "name": "rust",
                        "total_code_lines_suggested": 100,
                        "total_code_lines_accepted": 60
                    }]
                }]
            }]
        }
    })
}

/// Mount a single-page metrics endpoint for one organization.
async fn mount_single_page(server: &MockServer, org: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/orgs/{org}/copilot/metrics")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn pagination_follows_next_links_in_order() {
    let server = MockServer::start().await;
    let metrics_path = "/orgs/acme/copilot/metrics";

    let page = |n: u32| format!("{}{metrics_path}?page={n}", server.uri());

    Mock::given(method("GET"))
        .and(path(metrics_path))
        .and(query_param_is_missing("page"))
        .and(header("Authorization", format!("Bearer {TOKEN}")))
        .and(header("X-GitHub-Api-Version", "2022-11-28"))
        .and(header("Accept", "application/vnd.github+json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", format!(r#"<{}>; rel="next""#, page(2)).as_str())
                .set_body_json(json!([snapshot("2025-06-02", 1)])),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(metrics_path))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "Link",
                    format!(r#"<{}>; rel="next", <{}>; rel="prev""#, page(3), page(1)).as_str(),
                )
                .set_body_json(json!([snapshot("2025-06-03", 2)])),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(metrics_path))
        .and(query_param("page", "3"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", format!(r#"<{}>; rel="prev""#, page(2)).as_str())
                .set_body_json(json!([snapshot("2025-06-04", 3)])),
        )
        .mount(&server)
        .await;

    let config = test_config(&server, &["acme"]);
    let client = MetricsClient::from_config(&config);

    let batch = client.fetch_org_metrics("acme", TOKEN).await.unwrap();

    let dates: Vec<&str> = batch
        .iter()
        .map(|s| s.get("date").and_then(|d| d.as_str()).unwrap())
        .collect();
    assert_eq!(dates, vec!["2025-06-02", "2025-06-03", "2025-06-04"]);
}

#[tokio::test]
async fn fetch_fails_atomically_on_mid_chain_error() {
    let server = MockServer::start().await;
    let metrics_path = "/orgs/acme/copilot/metrics";

    Mock::given(method("GET"))
        .and(path(metrics_path))
        .and(query_param_is_missing("page"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "Link",
                    format!(r#"<{}{metrics_path}?page=2>; rel="next""#, server.uri()).as_str(),
                )
                .set_body_json(json!([snapshot("2025-06-02", 1)])),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(metrics_path))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let config = test_config(&server, &["acme"]);
    let client = MetricsClient::from_config(&config);

    let err = client.fetch_org_metrics("acme", TOKEN).await.unwrap_err();
    assert!(matches!(
        err,
        FetchError::Status { ref org, status } if org == "acme" && status.as_u16() == 502
    ));
}

#[tokio::test]
async fn import_stores_snapshots_once() {
    let server = MockServer::start().await;
    mount_single_page(
        &server,
        "acme",
        json!([snapshot("2025-06-02", 10), snapshot("2025-06-03", 12)]),
    )
    .await;

    let config = test_config(&server, &["acme"]);
    let client = MetricsClient::from_config(&config);
    let secrets = seeded_secrets().await;
    let db = DbPool::from_sqlite(migrated_pool().await);
    let snapshots = db.snapshots();

    let report = ingest::run_import(&config, &secrets, &client, snapshots.as_ref())
        .await
        .unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 0);
    assert!(report.is_clean());

    // Re-running over identical data inserts nothing new
    let report = ingest::run_import(&config, &secrets, &client, snapshots.as_ref())
        .await
        .unwrap();
    assert_eq!(report.inserted, 0);
    assert_eq!(report.skipped, 2);

    assert_eq!(snapshots.count().await.unwrap(), 2);
}

#[tokio::test]
async fn failed_org_is_skipped_without_aborting_the_batch() {
    let server = MockServer::start().await;
    mount_single_page(&server, "alpha", json!([snapshot("2025-06-02", 1)])).await;
    Mock::given(method("GET"))
        .and(path("/orgs/bravo/copilot/metrics"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    mount_single_page(&server, "charlie", json!([snapshot("2025-06-02", 3)])).await;

    let config = test_config(&server, &["alpha", "bravo", "charlie"]);
    let client = MetricsClient::from_config(&config);
    let secrets = seeded_secrets().await;
    let db = DbPool::from_sqlite(migrated_pool().await);
    let snapshots = db.snapshots();

    let report = ingest::run_import(&config, &secrets, &client, snapshots.as_ref())
        .await
        .unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].org, "bravo");

    // bravo contributed zero rows; alpha and charlie are stored
    assert_eq!(
        snapshots.distinct_orgs().await.unwrap(),
        vec!["alpha", "charlie"]
    );
}

#[tokio::test]
async fn missing_token_fails_before_any_fetch() {
    let server = MockServer::start().await;
    // Expect zero requests: the run must fail before any I/O
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let config = test_config(&server, &["acme"]);
    let client = MetricsClient::from_config(&config);
    let secrets = MemorySecretManager::new();
    let db = DbPool::from_sqlite(migrated_pool().await);
    let snapshots = db.snapshots();

    let err = ingest::run_import(&config, &secrets, &client, snapshots.as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::MissingToken(ref key) if key == TOKEN_KEY));
}

#[tokio::test]
async fn empty_org_list_is_a_configuration_error() {
    let server = MockServer::start().await;
    let config = test_config(&server, &[]);
    let client = MetricsClient::from_config(&config);
    let secrets = seeded_secrets().await;
    let db = DbPool::from_sqlite(migrated_pool().await);
    let snapshots = db.snapshots();

    let err = ingest::run_import(&config, &secrets, &client, snapshots.as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::NoOrganizations));
}

#[tokio::test]
async fn snapshots_without_dates_are_skipped() {
    let server = MockServer::start().await;
    mount_single_page(
        &server,
        "acme",
        json!([snapshot("2025-06-02", 10), {"total_active_users": 5}]),
    )
    .await;

    let config = test_config(&server, &["acme"]);
    let client = MetricsClient::from_config(&config);
    let secrets = seeded_secrets().await;
    let db = DbPool::from_sqlite(migrated_pool().await);
    let snapshots = db.snapshots();

    let report = ingest::run_import(&config, &secrets, &client, snapshots.as_ref())
        .await
        .unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);
}
