//! Tests for the remote connector, against a wiremock server

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use wiremock::matchers::{any, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use stride_protocol::{ErrorCode, RemoteConnectorInfo};

use crate::error::ConnectorError;
use crate::remote::RemoteConnector;
use crate::resilience::ResilienceConfig;
use crate::traits::{Connector, ConnectorEvent, EventSink, SyncOutcome, SyncRequest};

// =============================================================================
// Helpers
// =============================================================================

fn api_activity(id: u64, day: u32) -> Value {
    json!({
        "id": id,
        "name": format!("Ride {id}"),
        "type": "Ride",
        "start_date": format!("2024-04-{day:02}T08:00:00Z"),
        "elapsed_time": 3600,
        "moving_time": 3500,
        "distance": 25000.0,
        "average_heartrate": 140.0
    })
}

fn streams_body() -> Value {
    json!({
        "time": {"data": [0, 1, 2]},
        "heartrate": {"data": [120, 130, 140]}
    })
}

fn linked_info(base_url: &str) -> RemoteConnectorInfo {
    RemoteConnectorInfo {
        access_token: Some("token-1".into()),
        api_url: base_url.to_string(),
        per_page: 2,
        fetch_streams: false,
        ..Default::default()
    }
}

fn test_resilience() -> ResilienceConfig {
    ResilienceConfig {
        timeout_secs: 5,
        max_retries: 0,
        retry_base_delay_ms: 1,
        max_rate_limit_wait_secs: 0,
    }
}

/// Serve `pages` of the activity listing, then empty pages
async fn mount_listing(server: &MockServer, pages: Vec<Vec<Value>>) {
    let count = pages.len();
    for (i, items) in pages.into_iter().enumerate() {
        Mock::given(method("GET"))
            .and(path("/athlete/activities"))
            .and(query_param("page", (i + 1).to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(items)))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/athlete/activities"))
        .and(query_param("page", (count + 1).to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

async fn received(server: &MockServer) -> Vec<Request> {
    server.received_requests().await.unwrap_or_default()
}

async fn listing_requests(server: &MockServer) -> Vec<Request> {
    received(server)
        .await
        .into_iter()
        .filter(|r| r.url.path() == "/athlete/activities")
        .collect()
}

fn query(request: &Request, name: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn authorization(request: &Request) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

async fn run(
    connector: &RemoteConnector,
    request: SyncRequest,
) -> (Result<SyncOutcome, ConnectorError>, Vec<ConnectorEvent>) {
    let (sink, mut receiver) = EventSink::channel(256);
    let outcome = connector.sync(request, sink).await;

    let mut events = Vec::new();
    while let Some(event) = receiver.recv().await {
        events.push(event);
    }
    (outcome, events)
}

fn candidate_ids(events: &[ConnectorEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ConnectorEvent::Candidate(c) => Some(c.activity.key.source_id.clone()),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_sync_pages_until_empty() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        vec![
            vec![api_activity(1, 1), api_activity(2, 2)],
            vec![api_activity(3, 3), json!({"id": 99, "name": "broken"})],
        ],
    )
    .await;
    Mock::given(path("/activities/2/streams"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(path_regex(r"^/activities/\d+/streams$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(streams_body()))
        .mount(&server)
        .await;

    let info = RemoteConnectorInfo {
        fetch_streams: true,
        ..linked_info(&server.uri())
    };
    let connector = RemoteConnector::new(info, test_resilience()).unwrap();
    let (outcome, events) = run(&connector, SyncRequest::full()).await;

    assert_eq!(outcome.unwrap(), SyncOutcome::Completed);
    assert_eq!(candidate_ids(&events), vec!["1", "2", "3"]);

    let streams: Vec<bool> = events
        .iter()
        .filter_map(|e| match e {
            ConnectorEvent::Candidate(c) => Some(c.streams.is_some()),
            _ => None,
        })
        .collect();
    assert_eq!(streams, vec![true, false, true]);

    let item_errors: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ConnectorEvent::ItemError(info) => Some(info.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(item_errors.len(), 2);
    assert_eq!(item_errors[0].code, ErrorCode::SourceUnreachable);
    assert_eq!(item_errors[0].source_id.as_deref(), Some("2"));
    assert_eq!(item_errors[1].code, ErrorCode::ParseFailed);
    assert_eq!(item_errors[1].source_id.as_deref(), Some("99"));

    let watermarks: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ConnectorEvent::BatchCompleted { watermark } => Some(*watermark),
            _ => None,
        })
        .collect();
    // one second short of the newest start, the next page may share it
    assert_eq!(
        watermarks,
        vec![
            Utc.with_ymd_and_hms(2024, 4, 2, 7, 59, 59).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 3, 7, 59, 59).unwrap(),
        ]
    );

    let listing = listing_requests(&server).await;
    assert_eq!(listing.len(), 3);
    assert!(listing.iter().all(|r| query(r, "after").as_deref() == Some("0")));
    assert!(
        received(&server)
            .await
            .iter()
            .all(|r| authorization(r).as_deref() == Some("Bearer token-1"))
    );
}

#[tokio::test]
async fn test_fast_sync_sends_after() {
    let server = MockServer::start().await;
    mount_listing(&server, vec![]).await;

    let connector = RemoteConnector::new(linked_info(&server.uri()), test_resilience()).unwrap();
    let last_sync = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
    let request = SyncRequest {
        fast_sync: true,
        force_sync: false,
        last_sync,
    };

    let (outcome, _) = run(&connector, request).await;
    assert_eq!(outcome.unwrap(), SyncOutcome::Completed);

    let listing = listing_requests(&server).await;
    assert_eq!(listing.len(), 1);
    assert_eq!(
        query(&listing[0], "after"),
        Some(last_sync.timestamp().to_string())
    );
}

#[tokio::test]
async fn test_force_sync_lists_from_epoch() {
    let server = MockServer::start().await;
    mount_listing(&server, vec![]).await;

    let connector = RemoteConnector::new(linked_info(&server.uri()), test_resilience()).unwrap();
    let request = SyncRequest {
        fast_sync: true,
        force_sync: true,
        last_sync: Utc::now(),
    };

    run(&connector, request).await.0.unwrap();
    assert_eq!(
        query(&listing_requests(&server).await[0], "after").as_deref(),
        Some("0")
    );
}

#[tokio::test]
async fn test_unordered_listing_reports_no_watermarks() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        vec![
            vec![api_activity(5, 5), api_activity(6, 6)],
            vec![api_activity(2, 2)],
        ],
    )
    .await;

    let connector = RemoteConnector::new(linked_info(&server.uri()), test_resilience()).unwrap();
    let (outcome, events) = run(&connector, SyncRequest::full()).await;
    assert_eq!(outcome.unwrap(), SyncOutcome::Completed);
    assert_eq!(candidate_ids(&events), vec!["5", "6", "2"]);

    let watermarks: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ConnectorEvent::BatchCompleted { watermark } => Some(*watermark),
            _ => None,
        })
        .collect();
    assert_eq!(
        watermarks,
        vec![Utc.with_ymd_and_hms(2024, 4, 6, 7, 59, 59).unwrap()]
    );
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_unauthorized_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let connector = RemoteConnector::new(linked_info(&server.uri()), test_resilience()).unwrap();
    let (outcome, events) = run(&connector, SyncRequest::full()).await;

    assert!(matches!(outcome, Err(ConnectorError::AuthFailed(_))));
    assert!(candidate_ids(&events).is_empty());
}

#[tokio::test]
async fn test_not_linked_is_fatal_without_requests() {
    let server = MockServer::start().await;

    let info = RemoteConnectorInfo {
        access_token: None,
        ..linked_info(&server.uri())
    };
    let connector = RemoteConnector::new(info, test_resilience()).unwrap();
    let (outcome, _) = run(&connector, SyncRequest::full()).await;

    assert!(matches!(outcome, Err(ConnectorError::AuthFailed(_))));
    assert!(received(&server).await.is_empty());
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let resilience = ResilienceConfig {
        max_retries: 1,
        ..test_resilience()
    };
    let connector = RemoteConnector::new(linked_info(&server.uri()), resilience).unwrap();
    let (outcome, _) = run(&connector, SyncRequest::full()).await;

    let err = outcome.unwrap_err();
    assert!(matches!(err, ConnectorError::RetriesExhausted { attempts: 2, .. }));
    assert_eq!(err.code(), ErrorCode::SourceUnreachable);
    assert_eq!(listing_requests(&server).await.len(), 2);
}

#[tokio::test]
async fn test_rate_limit_pauses_then_resumes_same_page() {
    let server = MockServer::start().await;
    Mock::given(path("/athlete/activities"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_listing(&server, vec![vec![api_activity(7, 7)]]).await;

    let connector = RemoteConnector::new(linked_info(&server.uri()), test_resilience()).unwrap();
    let (outcome, events) = run(&connector, SyncRequest::full()).await;

    assert_eq!(outcome.unwrap(), SyncOutcome::Completed);
    assert_eq!(candidate_ids(&events), vec!["7"]);
    assert!(events.iter().any(
        |e| matches!(e, ConnectorEvent::Progress(p) if p.starts_with("Rate limited"))
    ));

    let pages: Vec<_> = listing_requests(&server)
        .await
        .iter()
        .map(|r| query(r, "page").unwrap_or_default())
        .collect();
    assert_eq!(pages, vec!["1", "1", "2"]);
}

fn rate_limit_errors(events: &[ConnectorEvent]) -> Vec<Option<String>> {
    events
        .iter()
        .filter_map(|e| match e {
            ConnectorEvent::ItemError(info) if info.code == ErrorCode::RateLimited => {
                Some(info.source_id.clone())
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_repeated_rate_limits_do_not_end_pass() {
    let server = MockServer::start().await;
    Mock::given(path("/athlete/activities"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(8)
        .mount(&server)
        .await;
    mount_listing(&server, vec![vec![api_activity(1, 1)]]).await;

    let connector = RemoteConnector::new(linked_info(&server.uri()), test_resilience()).unwrap();
    let (outcome, events) = run(&connector, SyncRequest::full()).await;

    assert_eq!(outcome.unwrap(), SyncOutcome::Completed);
    assert_eq!(candidate_ids(&events), vec!["1"]);
    assert_eq!(rate_limit_errors(&events), vec![None; 8]);
    assert_eq!(listing_requests(&server).await.len(), 10);
}

#[tokio::test]
async fn test_rate_limited_streams_reported_per_activity() {
    let server = MockServer::start().await;
    mount_listing(&server, vec![vec![api_activity(4, 4)]]).await;
    Mock::given(path("/activities/4/streams"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(path("/activities/4/streams"))
        .respond_with(ResponseTemplate::new(200).set_body_json(streams_body()))
        .mount(&server)
        .await;

    let info = RemoteConnectorInfo {
        fetch_streams: true,
        ..linked_info(&server.uri())
    };
    let connector = RemoteConnector::new(info, test_resilience()).unwrap();
    let (outcome, events) = run(&connector, SyncRequest::full()).await;

    assert_eq!(outcome.unwrap(), SyncOutcome::Completed);
    assert_eq!(
        rate_limit_errors(&events),
        vec![Some("4".to_string()), Some("4".to_string())]
    );
    let candidate = events
        .iter()
        .find_map(|e| match e {
            ConnectorEvent::Candidate(c) => Some(c.clone()),
            _ => None,
        })
        .expect("candidate");
    assert!(candidate.streams.is_some());
}

#[tokio::test]
async fn test_stop_before_sync() {
    let server = MockServer::start().await;
    mount_listing(&server, vec![vec![api_activity(1, 1)]]).await;

    let connector = RemoteConnector::new(linked_info(&server.uri()), test_resilience()).unwrap();
    connector.stop();

    let (outcome, events) = run(&connector, SyncRequest::full()).await;
    assert_eq!(outcome.unwrap(), SyncOutcome::Stopped);
    assert!(candidate_ids(&events).is_empty());
    assert!(listing_requests(&server).await.is_empty());
}

// =============================================================================
// Token refresh
// =============================================================================

fn expired_info(base_url: &str) -> RemoteConnectorInfo {
    RemoteConnectorInfo {
        client_id: Some("client".into()),
        client_secret: Some("secret".into()),
        refresh_token: Some("refresh-1".into()),
        expires_at: Some(Utc::now().timestamp() - 60),
        ..linked_info(base_url)
    }
}

#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-2",
            "refresh_token": "refresh-2",
            "expires_at": 4102444800i64
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_listing(&server, vec![]).await;

    let connector = RemoteConnector::new(expired_info(&server.uri()), test_resilience()).unwrap();
    let (outcome, events) = run(&connector, SyncRequest::full()).await;
    assert_eq!(outcome.unwrap(), SyncOutcome::Completed);

    let refreshed = events
        .iter()
        .find_map(|e| match e {
            ConnectorEvent::CredentialsRefreshed(info) => Some(info.clone()),
            _ => None,
        })
        .expect("credentials refreshed event");
    assert_eq!(refreshed.access_token.as_deref(), Some("token-2"));
    assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-2"));
    assert_eq!(refreshed.expires_at, Some(4102444800));
    assert_eq!(connector.info(), refreshed);

    let requests = received(&server).await;
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("grant_type=refresh_token"));
    assert!(body.contains("refresh_token=refresh-1"));
    assert_eq!(
        authorization(&listing_requests(&server).await[0]).as_deref(),
        Some("Bearer token-2")
    );
}

#[tokio::test]
async fn test_rejected_refresh_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let connector = RemoteConnector::new(expired_info(&server.uri()), test_resilience()).unwrap();
    let (outcome, _) = run(&connector, SyncRequest::full()).await;

    assert!(matches!(outcome, Err(ConnectorError::AuthFailed(_))));
    assert!(listing_requests(&server).await.is_empty());
}

#[tokio::test]
async fn test_expired_without_refresh_credentials_is_fatal() {
    let info = RemoteConnectorInfo {
        expires_at: Some(Utc::now().timestamp() - 60),
        ..linked_info("http://127.0.0.1:9")
    };
    let connector = RemoteConnector::new(info, test_resilience()).unwrap();
    let (outcome, _) = run(&connector, SyncRequest::full()).await;

    assert!(matches!(outcome, Err(ConnectorError::AuthFailed(_))));
}
