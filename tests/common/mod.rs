//! Common test utilities
#![allow(dead_code)]

use async_trait::async_trait;
use deepeye::config::ClientConfig;
use deepeye::http::{HttpResponse, PreparedRequest, Transport, TransportError, TransportErrorKind};
use deepeye::models::{ScanResultSet, Severity, Vulnerability};
use mockall::{mock, Sequence};
use reqwest::StatusCode;
use url::Url;

/// Creates a client config suited to a local wiremock server
pub fn test_config(max_retries: u32) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.timeout_secs = 5;
    config.max_retries = max_retries;
    config.user_agent = "DeepEye-Test/0.1.0".to_string();
    config
}

// Network stand-in for the retry loop; each expectation is one attempt
mock! {
    pub Network {}

    #[async_trait]
    impl Transport for Network {
        async fn send(&self, request: &PreparedRequest) -> Result<HttpResponse, TransportError>;
    }
}

/// A transport failure of the given kind
pub fn failure(kind: TransportErrorKind) -> Result<HttpResponse, TransportError> {
    Err(TransportError::new(kind, "simulated failure"))
}

/// Expects exactly `times` attempts, each answered with `result`
pub fn network_always(result: Result<HttpResponse, TransportError>, times: usize) -> MockNetwork {
    let mut network = MockNetwork::new();
    network
        .expect_send()
        .times(times)
        .returning(move |_| result.clone());
    network
}

/// Expects one attempt per entry, answered in order
pub fn network_sequence(results: Vec<Result<HttpResponse, TransportError>>) -> MockNetwork {
    let mut network = MockNetwork::new();
    let mut seq = Sequence::new();
    for result in results {
        network
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(move |_| result);
    }
    network
}

/// A bare response with the given status
pub fn response(status: u16) -> HttpResponse {
    HttpResponse::new(
        StatusCode::from_u16(status).unwrap(),
        Url::parse("http://target.test/").unwrap(),
    )
}

/// A result set covering every severity, a tie on high and one
/// unrecognised severity, deliberately out of order
pub fn sample_results() -> ScanResultSet {
    let mut results = ScanResultSet::new("http://target.test");
    results.add_vulnerability(
        Vulnerability::new("Missing Security Header", Severity::Low, "http://target.test/")
            .with_description("X-Frame-Options is not set")
            .with_remediation("Send X-Frame-Options: DENY"),
    );
    results.add_vulnerability(
        Vulnerability::new("SQL Injection", Severity::Critical, "http://target.test/item")
            .with_parameter("id")
            .with_payload("' OR '1'='1")
            .with_evidence("You have an error in your SQL syntax"),
    );
    results.add_vulnerability(
        Vulnerability::new("Reflected XSS", Severity::High, "http://target.test/search")
            .with_parameter("q")
            .with_payload("<script>alert(1)</script>"),
    );
    results.add_vulnerability(Vulnerability::new(
        "Server Banner",
        Severity::Info,
        "http://target.test/",
    ));
    results.add_vulnerability(Vulnerability::new(
        "Open Redirect",
        Severity::Medium,
        "http://target.test/login",
    ));
    results.add_vulnerability(
        Vulnerability::new("Stored XSS", Severity::High, "http://target.test/comments")
            .with_parameter("body"),
    );
    results.add_vulnerability(Vulnerability::new(
        "Custom Check",
        Severity::from("Urgent"),
        "http://target.test/",
    ));
    results.urls_crawled = 12;
    results.duration = 42.5;
    results
}
