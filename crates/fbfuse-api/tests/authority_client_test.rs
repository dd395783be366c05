#![allow(clippy::unwrap_used)]
// Integration tests for `AuthorityClient` and `TargetFeed` using wiremock.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fbfuse_api::{AuthorityClient, BackoffConfig, Error, TargetConfig, TargetFeed, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, AuthorityClient) {
    let server = MockServer::start().await;
    let client = AuthorityClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        TransportConfig::default(),
    );
    (server, client)
}

async fn mount_latest(server: &MockServer, beams: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/target-config/latest"))
        .and(query_param("proxy", "FBFUSE_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "beams": beams })))
        .mount(server)
        .await;
}

// ── One-shot fetches ────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_subarray_config() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/sb-config"))
        .and(query_param("proxy", "FBFUSE_test"))
        .and(query_param("sb_id", "default_subarray"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "coherent-beams-nbeams": 100,
            "coherent-beams-tscrunch": 22,
            "coherent-beams-fscrunch": 2,
            "coherent-beams-antennas": "m007",
            "coherent-beams-granularity": 6
        })))
        .mount(&server)
        .await;

    let cfg = client
        .fetch_subarray_config("FBFUSE_test", "default_subarray")
        .await
        .unwrap();

    assert_eq!(cfg.coherent_beams_nbeams, Some(100));
    assert_eq!(cfg.coherent_beams_tscrunch, Some(22));
    assert_eq!(cfg.coherent_beams_antennas.as_deref(), Some("m007"));
    assert_eq!(cfg.incoherent_beam_fscrunch, None);
}

#[tokio::test]
async fn test_fetch_target_config_encodes_descriptor() {
    let (server, client) = setup().await;
    let target = "test_target0,radec,12:00:00,01:00:00";

    Mock::given(method("GET"))
        .and(path("/target-config"))
        .and(query_param("proxy", "FBFUSE_test"))
        .and(query_param("target", target))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "beams": [target, "test_target1,radec,13:00:00,02:00:00"]
        })))
        .mount(&server)
        .await;

    let cfg = client.fetch_target_config("FBFUSE_test", target).await.unwrap();
    assert_eq!(cfg.beams.len(), 2);
    assert_eq!(cfg.beams[0], target);
}

// ── Error paths ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_not_found_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/sb-config"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such proxy"))
        .mount(&server)
        .await;

    let err = client
        .fetch_subarray_config("FBFUSE_missing", "default_subarray")
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "expected 404, got: {err:?}");
}

#[tokio::test]
async fn test_malformed_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/target-config"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = client.fetch_target_config("FBFUSE_test", "x").await;
    assert!(
        matches!(result, Err(Error::Deserialization { ref body, .. }) if body == "not json"),
        "expected Deserialization error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_slow_authority_times_out() {
    let server = MockServer::start().await;
    let transport = TransportConfig::with_timeout(Duration::from_millis(200));
    let client = AuthorityClient::with_client(
        transport.build_client().unwrap(),
        Url::parse(&server.uri()).unwrap(),
        transport,
    );

    Mock::given(method("GET"))
        .and(path("/sb-config"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client
        .fetch_subarray_config("FBFUSE_test", "default_subarray")
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got: {err:?}");
}

// ── Live feed ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_feed_delivers_only_changes() {
    let (server, client) = setup().await;
    let initial = vec!["a,radec,1:00:00,1:00:00".to_string()];
    mount_latest(&server, &["a,radec,1:00:00,1:00:00"]).await;

    let cancel = CancellationToken::new();
    let mut feed = TargetFeed::spawn(
        Arc::new(client),
        "FBFUSE_test".into(),
        TargetConfig { beams: initial },
        Duration::from_millis(20),
        BackoffConfig::default(),
        cancel.clone(),
    );

    // Same payload as the baseline: nothing is delivered.
    let quiet = tokio::time::timeout(Duration::from_millis(150), feed.next()).await;
    assert!(quiet.is_err(), "unchanged payload must not be delivered");

    server.reset().await;
    mount_latest(&server, &["b,radec,2:00:00,2:00:00", "c,radec,3:00:00,3:00:00"]).await;

    let update = tokio::time::timeout(Duration::from_secs(2), feed.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(update.beams.len(), 2);
    assert_eq!(update.beams[0], "b,radec,2:00:00,2:00:00");

    feed.shutdown();
    assert!(feed.next().await.is_none());
}

#[tokio::test]
async fn test_feed_keeps_polling_through_not_found() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/target-config/latest"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_latest(&server, &["b,radec,2:00:00,2:00:00"]).await;

    // A backoff this long would outlast the timeout below.
    let backoff = BackoffConfig {
        initial_delay: Duration::from_secs(30),
        max_delay: Duration::from_secs(30),
    };
    let cancel = CancellationToken::new();
    let mut feed = TargetFeed::spawn(
        Arc::new(client),
        "FBFUSE_test".into(),
        TargetConfig { beams: Vec::new() },
        Duration::from_millis(20),
        backoff,
        cancel.clone(),
    );

    let update = tokio::time::timeout(Duration::from_secs(2), feed.next())
        .await
        .expect("404 responses must not trigger backoff")
        .unwrap();
    assert_eq!(update.beams, vec!["b,radec,2:00:00,2:00:00".to_string()]);
    cancel.cancel();
}
