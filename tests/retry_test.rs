//! Retry loop tests over a mocked transport with a paused clock

mod common;

use common::{failure, network_always, network_sequence, response, test_config, MockNetwork};
use deepeye::http::{HttpClient, PreparedRequest, RequestOptions, RequestOutcome, TransportErrorKind};
use deepeye::models::ScanResultSet;
use reqwest::{Method, StatusCode};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn client_over(network: MockNetwork, max_retries: u32) -> HttpClient {
    HttpClient::with_transport(test_config(max_retries), Arc::new(network))
        .expect("Failed to create client")
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_exhaust_retries() {
    for max_retries in [0u32, 1, 3] {
        let attempts = (max_retries + 1) as usize;
        let client = client_over(
            network_always(failure(TransportErrorKind::Timeout), attempts),
            max_retries,
        );

        let outcome = client.get("http://target.test/", RequestOptions::new()).await;

        match outcome {
            RequestOutcome::NoResponse(missing) => {
                assert_eq!(missing.attempts, max_retries + 1);
                assert_eq!(missing.kind(), TransportErrorKind::Timeout);
            }
            RequestOutcome::Response(r) => panic!("Expected no response, got {}", r.status),
        }
        assert_eq!(client.request_count(), u64::from(max_retries + 1));
    }
}

#[tokio::test(start_paused = true)]
async fn test_backoff_waits_between_attempts() {
    let client = client_over(network_always(failure(TransportErrorKind::Connect), 4), 3);

    let started = Instant::now();
    let outcome = client.get("http://target.test/", RequestOptions::new()).await;

    assert!(outcome.is_no_response());
    // 0s before the first retry, then 2s and 4s
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(6), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(7), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_method_sent_once() {
    for method in [Method::PUT, Method::DELETE, Method::PATCH] {
        let client = client_over(network_always(failure(TransportErrorKind::Timeout), 1), 3);

        let outcome = client
            .request(method.clone(), "http://target.test/", RequestOptions::new())
            .await;

        match outcome {
            RequestOutcome::NoResponse(missing) => assert_eq!(missing.attempts, 1, "{method}"),
            RequestOutcome::Response(_) => panic!("Expected no response for {method}"),
        }
        assert_eq!(client.request_count(), 1, "{method}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_retryable_status_returns_final_response() {
    let client = client_over(network_always(Ok(response(502)), 3), 2);

    let outcome = client.post("http://target.test/form", RequestOptions::new()).await;

    assert_eq!(outcome.status(), Some(StatusCode::BAD_GATEWAY));
    assert_eq!(client.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_transient_failures() {
    let client = client_over(
        network_sequence(vec![
            failure(TransportErrorKind::Connect),
            Ok(response(500)),
            Ok(response(200).with_body("welcome")),
        ]),
        3,
    );

    let outcome = client.get("http://target.test/", RequestOptions::new()).await;

    let response = outcome.into_response().expect("Expected a response");
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "welcome");
    assert_eq!(client.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_header_is_honoured() {
    let client = client_over(
        network_sequence(vec![
            Ok(response(429).with_header("Retry-After", "7")),
            Ok(response(200)),
        ]),
        3,
    );

    let started = Instant::now();
    let outcome = client.get("http://target.test/", RequestOptions::new()).await;

    assert_eq!(outcome.status(), Some(StatusCode::OK));
    assert!(started.elapsed() >= Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_failure_stops_immediately() {
    let client = client_over(network_always(failure(TransportErrorKind::Redirect), 1), 3);

    let outcome = client.get("http://target.test/loop", RequestOptions::new()).await;

    match outcome {
        RequestOutcome::NoResponse(missing) => {
            assert_eq!(missing.attempts, 1);
            assert_eq!(missing.kind(), TransportErrorKind::Redirect);
        }
        RequestOutcome::Response(_) => panic!("Expected no response"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unsendable_requests_make_no_attempts() {
    let mut network = MockNetwork::new();
    network.expect_send().never();
    let client = client_over(network, 3);

    let empty = client.get("   ", RequestOptions::new()).await;
    let bad_header = client
        .get(
            "http://target.test/",
            RequestOptions::new().header("Bad Header", "x"),
        )
        .await;

    for outcome in [empty, bad_header] {
        match outcome {
            RequestOutcome::NoResponse(missing) => {
                assert_eq!(missing.attempts, 0);
                assert_eq!(missing.kind(), TransportErrorKind::InvalidRequest);
            }
            RequestOutcome::Response(_) => panic!("Expected no response"),
        }
    }
    assert_eq!(client.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_prepared_request_carries_session_state() {
    let sent: Arc<Mutex<Vec<PreparedRequest>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = sent.clone();
    let mut network = MockNetwork::new();
    network.expect_send().times(2).returning(move |request| {
        sink.lock().unwrap().push(request.clone());
        Ok(response(200))
    });

    let config = test_config(0)
        .with_header("X-Scanner", "deepeye")
        .with_cookie("sid", "abc");
    let client = HttpClient::with_transport(config, Arc::new(network)).expect("client");

    client.head("http://target.test/", RequestOptions::new()).await;
    client
        .get(
            " http://target.test/search ",
            RequestOptions::new().query("q", "test").header("X-Scanner", "probe"),
        )
        .await;

    let requests = sent.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);

    let head = &requests[0];
    assert_eq!(head.method, Method::HEAD);
    assert!(!head.follow_redirects);
    assert_eq!(head.headers.get("cookie").and_then(|v| v.to_str().ok()), Some("sid=abc"));
    assert_eq!(head.headers.get("x-scanner").and_then(|v| v.to_str().ok()), Some("deepeye"));

    let get = &requests[1];
    assert!(get.follow_redirects);
    assert_eq!(get.url, "http://target.test/search");
    assert_eq!(get.query, vec![("q".to_string(), "test".to_string())]);
    assert_eq!(get.headers.get("x-scanner").and_then(|v| v.to_str().ok()), Some("probe"));
    assert_eq!(get.headers.get_all("x-scanner").iter().count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_clones_share_policy_and_counter() {
    let client = client_over(network_always(failure(TransportErrorKind::Timeout), 6), 2);
    let first = client.clone();
    let second = client.clone();

    let (a, b) = tokio::join!(
        first.get("http://target.test/a", RequestOptions::new()),
        second.get("http://target.test/b", RequestOptions::new()),
    );

    assert!(a.is_no_response());
    assert!(b.is_no_response());
    assert_eq!(client.request_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_target_recorded_as_untested() {
    let client = client_over(network_always(failure(TransportErrorKind::Timeout), 3), 2);
    let mut results = ScanResultSet::new("http://target.test");
    let started = Instant::now();

    let outcome = client
        .get(
            "http://target.test/item",
            RequestOptions::new().query("id", "1'"),
        )
        .await;
    let response = results.record_probe("http://target.test/item", Some("id"), outcome);
    results.finish(started.elapsed());

    assert!(response.is_none());
    assert_eq!(results.untested.len(), 1);

    let untested = &results.untested[0];
    assert_eq!(untested.parameter.as_deref(), Some("id"));
    assert_eq!(untested.attempts, 3);
    assert!(untested.reason.starts_with("timeout"));
    assert!(results.vulnerabilities.is_empty());
    // one immediate retry, then a 2s backoff
    assert!(results.duration >= 2.0, "duration {}", results.duration);
}
