//! Transport seam between the retry loop and the network
//!
//! [`HttpClient`](super::HttpClient) owns policy; a [`Transport`] only sends
//! one fully prepared request and reports what happened. The production
//! implementation wraps a pooled `reqwest::Client`; tests substitute a
//! mock.

use super::outcome::HttpResponse;
use crate::config::ClientConfig;
use crate::error::{DeepEyeError, Result};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, Method};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 10;

/// Class of a transport-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connection refused, reset or dropped
    Connect,
    /// Host name did not resolve
    Dns,
    Timeout,
    /// Handshake or certificate failure
    Tls,
    /// Response body could not be read or decoded
    Body,
    /// Redirect loop or too many hops
    Redirect,
    /// The request could not be built (bad URL, bad header)
    InvalidRequest,
    Other,
}

impl TransportErrorKind {
    /// Whether the failure is worth another attempt
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            TransportErrorKind::Connect
                | TransportErrorKind::Dns
                | TransportErrorKind::Timeout
                | TransportErrorKind::Tls
                | TransportErrorKind::Body
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Connect => "connection error",
            TransportErrorKind::Dns => "DNS failure",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Tls => "TLS failure",
            TransportErrorKind::Body => "body read error",
            TransportErrorKind::Redirect => "redirect error",
            TransportErrorKind::InvalidRequest => "invalid request",
            TransportErrorKind::Other => "transport error",
        };
        write!(f, "{name}")
    }
}

/// A failed attempt, classified
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let message = error_chain(&error);
        Self {
            kind: classify(&error, &message),
            message,
        }
    }
}

/// Flattens an error and its sources into one line
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn classify(error: &reqwest::Error, chain: &str) -> TransportErrorKind {
    if error.is_builder() {
        return TransportErrorKind::InvalidRequest;
    }
    if error.is_redirect() {
        return TransportErrorKind::Redirect;
    }
    if error.is_timeout() {
        return TransportErrorKind::Timeout;
    }
    if error.is_connect() {
        let lower = chain.to_lowercase();
        if lower.contains("dns") || lower.contains("lookup") || lower.contains("resolve") {
            return TransportErrorKind::Dns;
        }
        if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl") || lower.contains("handshake") {
            return TransportErrorKind::Tls;
        }
        return TransportErrorKind::Connect;
    }
    if error.is_body() || error.is_decode() {
        return TransportErrorKind::Body;
    }
    // Failures while sending on an established connection
    if error.is_request() {
        return TransportErrorKind::Connect;
    }
    TransportErrorKind::Other
}

/// Request body variants
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
    Text(String),
}

/// A request with session defaults and per-call overrides already merged
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub follow_redirects: bool,
}

/// Sends one prepared request. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &PreparedRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// Pooled reqwest transport.
///
/// Timeout, TLS verification and proxy are fixed when the transport is
/// built. Two clients share those settings and differ only in redirect
/// handling, since reqwest binds the redirect policy to the client. Both
/// store cookies the server sets in one shared jar.
pub struct ReqwestTransport {
    following: Client,
    non_following: Client,
    jar: Arc<Jar>,
}

impl ReqwestTransport {
    /// Builds the transport from a validated client config
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        Ok(Self {
            following: build_client(
                config,
                reqwest::redirect::Policy::limited(MAX_REDIRECTS),
                jar.clone(),
            )?,
            non_following: build_client(config, reqwest::redirect::Policy::none(), jar.clone())?,
            jar,
        })
    }

    /// Request headers with stored cookies folded into an explicit
    /// `Cookie` header; reqwest only consults the jar when none is set.
    fn request_headers(&self, request: &PreparedRequest) -> HeaderMap {
        let mut headers = request.headers.clone();
        let Some(explicit) = headers.get(COOKIE).and_then(|v| v.to_str().ok()) else {
            return headers;
        };

        let stored = Url::parse(&request.url)
            .ok()
            .and_then(|url| self.jar.cookies(&url));
        if let Some(stored) = stored.as_ref().and_then(|v| v.to_str().ok()) {
            if let Ok(value) = HeaderValue::from_str(&merge_cookies(explicit, stored)) {
                headers.insert(COOKIE, value);
            }
        }
        headers
    }
}

/// Appends stored `name=value` pairs whose names the explicit header does not set
fn merge_cookies(explicit: &str, stored: &str) -> String {
    let cookie_name = |pair: &str| pair.split('=').next().unwrap_or(pair).trim().to_string();
    let explicit_names: Vec<String> = explicit.split(';').map(cookie_name).collect();

    let mut merged = explicit.trim().to_string();
    for pair in stored.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        if !explicit_names.contains(&cookie_name(pair)) {
            merged.push_str("; ");
            merged.push_str(pair);
        }
    }
    merged
}

fn build_client(
    config: &ClientConfig,
    redirect: reqwest::redirect::Policy,
    jar: Arc<Jar>,
) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.timeout())
        .pool_idle_timeout(Duration::from_secs(90))
        .redirect(redirect)
        .cookie_provider(jar)
        .danger_accept_invalid_certs(!config.verify_tls);

    if let Some(ref proxy_url) = config.proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| DeepEyeError::ConfigError(format!("Invalid proxy URL: {e}")))?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> std::result::Result<HttpResponse, TransportError> {
        let client = if request.follow_redirects {
            &self.following
        } else {
            &self.non_following
        };

        let mut builder = client
            .request(request.method.clone(), &request.url)
            .headers(self.request_headers(request));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            Some(RequestBody::Form(pairs)) => builder.form(pairs),
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().clone();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
            final_url,
        })
    }
}
