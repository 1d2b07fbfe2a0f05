//! Resilient HTTP client: one pooled session, one policy, no failing calls

use super::outcome::{HttpResponse, NoResponse, RequestOutcome};
use super::retry::{Attempt, RetryDecision, RetryPolicy};
use super::transport::{
    PreparedRequest, ReqwestTransport, RequestBody, Transport, TransportError, TransportErrorKind,
};
use crate::config::ClientConfig;
use crate::error::{DeepEyeError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Per-call additions: query string, header overrides, body, redirects
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// `None` means the method default: HEAD does not follow, others do
    pub follow_redirects: Option<bool>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a query parameter
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Overrides a session header for this call only
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sends the pairs as a urlencoded form
    pub fn form<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.body = Some(RequestBody::Form(
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ));
        self
    }

    /// Sends a JSON body
    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(value));
        self
    }

    /// Sends a raw text body
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = Some(follow);
        self
    }
}

/// HTTP client shared by every scanning module.
///
/// Construction is the only fallible step. Each call returns a
/// [`RequestOutcome`]: any response (including 4xx/5xx) is a `Response`;
/// exhausted retries and non-retryable transport failures are
/// `NoResponse`. Clones share the connection pool, config and counter.
#[derive(Clone)]
pub struct HttpClient {
    config: Arc<ClientConfig>,
    policy: RetryPolicy,
    session_headers: HeaderMap,
    transport: Arc<dyn Transport>,
    request_count: Arc<AtomicU64>,
}

impl HttpClient {
    /// Creates a client backed by a pooled reqwest session
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::from_config(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a client over any transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let session_headers = session_headers(&config)?;
        let policy = RetryPolicy::from_config(&config);

        debug!(
            "HTTP client ready: timeout={}s verify_tls={} max_retries={} proxy={}",
            config.timeout_secs,
            config.verify_tls,
            config.max_retries,
            config.proxy_url.as_deref().unwrap_or("none")
        );

        Ok(Self {
            config: Arc::new(config),
            policy,
            session_headers,
            transport,
            request_count: Arc::new(AtomicU64::new(0)),
        })
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Headers attached to every request before per-call overrides
    pub fn session_headers(&self) -> &HeaderMap {
        &self.session_headers
    }

    /// Total attempts sent by this client and its clones
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Sends a GET request; follows redirects unless told otherwise
    pub async fn get(&self, url: &str, options: RequestOptions) -> RequestOutcome {
        self.request(Method::GET, url, options).await
    }

    /// Sends a POST request
    pub async fn post(&self, url: &str, options: RequestOptions) -> RequestOutcome {
        self.request(Method::POST, url, options).await
    }

    /// Sends a HEAD request; does not follow redirects unless told to
    pub async fn head(&self, url: &str, options: RequestOptions) -> RequestOutcome {
        self.request(Method::HEAD, url, options).await
    }

    /// Sends an OPTIONS request
    pub async fn options(&self, url: &str, options: RequestOptions) -> RequestOutcome {
        self.request(Method::OPTIONS, url, options).await
    }

    /// Sends a request with any method. Methods outside the retry policy
    /// are attempted exactly once.
    pub async fn request(&self, method: Method, url: &str, options: RequestOptions) -> RequestOutcome {
        match self.prepare(method.clone(), url, options) {
            Ok(request) => self.execute(&request).await,
            Err(error) => {
                debug!("{method} request to '{url}' not sent: {error}");
                RequestOutcome::NoResponse(NoResponse { attempts: 0, error })
            }
        }
    }

    /// Merges session headers with per-call overrides
    fn prepare(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> std::result::Result<PreparedRequest, TransportError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(TransportError::new(
                TransportErrorKind::InvalidRequest,
                "target URL is empty",
            ));
        }

        let mut headers = self.session_headers.clone();
        for (name, value) in &options.headers {
            let (name, value) = header_pair(name, value)
                .map_err(|e| TransportError::new(TransportErrorKind::InvalidRequest, e.to_string()))?;
            headers.insert(name, value);
        }

        let follow_redirects = options
            .follow_redirects
            .unwrap_or(method != Method::HEAD);

        Ok(PreparedRequest {
            method,
            url: url.to_string(),
            query: options.query,
            headers,
            body: options.body,
            follow_redirects,
        })
    }

    /// Runs the retry loop for one prepared request
    async fn execute(&self, request: &PreparedRequest) -> RequestOutcome {
        let method = &request.method;
        let max_attempts = self.policy.max_attempts(method);
        let mut retries_done = 0u32;

        loop {
            let attempt = retries_done + 1;
            self.request_count.fetch_add(1, Ordering::Relaxed);
            let result = self.transport.send(request).await;

            let decision = match &result {
                Ok(response) => self.policy.decide(method, retries_done, Attempt::Response(response)),
                Err(error) => self.policy.decide(method, retries_done, Attempt::Failed(error)),
            };

            let after = match decision {
                RetryDecision::Stop => return finish(request, attempt, result),
                RetryDecision::Retry { after } => after,
            };

            match &result {
                Ok(response) if response.status == StatusCode::TOO_MANY_REQUESTS => {
                    warn!(
                        "Rate limited by {} (attempt {attempt}/{max_attempts}), backing off {after:?}",
                        request.url
                    );
                }
                Ok(response) => debug!(
                    "{method} {} returned {} (attempt {attempt}/{max_attempts}), retrying in {after:?}",
                    request.url, response.status
                ),
                Err(error) => debug!(
                    "{method} {} failed (attempt {attempt}/{max_attempts}): {error}, retrying in {after:?}",
                    request.url
                ),
            }

            if !after.is_zero() {
                sleep(after).await;
            }
            retries_done += 1;
        }
    }
}

fn finish(
    request: &PreparedRequest,
    attempts: u32,
    result: std::result::Result<HttpResponse, TransportError>,
) -> RequestOutcome {
    match result {
        Ok(response) => {
            debug!(
                "{} {} -> {} ({} bytes, {attempts} attempt(s))",
                request.method,
                response.final_url,
                response.status,
                response.body.len()
            );
            RequestOutcome::Response(response)
        }
        Err(error) => {
            debug!(
                "{} request failed for {} after {attempts} attempt(s): {error}",
                request.method, request.url
            );
            RequestOutcome::NoResponse(NoResponse { attempts, error })
        }
    }
}

/// Default headers, then session cookies, then custom headers; later
/// entries replace earlier ones with the same (case-insensitive) name.
fn session_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let defaults = [
        ("User-Agent", config.user_agent.as_str()),
        ("Accept", "*/*"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Accept-Encoding", "gzip, deflate"),
        ("Connection", "keep-alive"),
    ];

    let mut headers = HeaderMap::new();
    for (name, value) in defaults {
        let (name, value) = header_pair(name, value)?;
        headers.insert(name, value);
    }

    if let Some(cookie) = config.cookie_header() {
        let (name, value) = header_pair("Cookie", &cookie)?;
        headers.insert(name, value);
    }

    for (name, value) in &config.custom_headers {
        let (name, value) = header_pair(name, value)?;
        headers.insert(name, value);
    }

    Ok(headers)
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| DeepEyeError::InvalidHeader(format!("'{name}': {e}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| DeepEyeError::InvalidHeader(format!("value of '{name}': {e}")))?;
    Ok((header_name, header_value))
}
