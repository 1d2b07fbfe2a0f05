//! Normalized result of one logical HTTP call

use super::transport::{TransportError, TransportErrorKind};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// URL after redirects were followed
    pub final_url: Url,
}

impl HttpResponse {
    /// Creates an empty response with the given status
    pub fn new(status: StatusCode, final_url: Url) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
            final_url,
        }
    }

    /// Sets the body
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds a header; silently skips names or values that are not valid HTTP
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Returns the first value of a header as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Diagnostics for a call that produced nothing usable
#[derive(Debug, Clone)]
pub struct NoResponse {
    /// Attempts actually sent; zero when the request could not be built
    pub attempts: u32,
    pub error: TransportError,
}

impl NoResponse {
    pub fn kind(&self) -> TransportErrorKind {
        self.error.kind
    }
}

/// Either a response (whatever its status) or an explicit absence of one.
///
/// A 404 or a 500 is a `Response`. `NoResponse` means the target could not
/// be reached for this probe and the caller should move on.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    Response(HttpResponse),
    NoResponse(NoResponse),
}

impl RequestOutcome {
    pub fn is_response(&self) -> bool {
        matches!(self, RequestOutcome::Response(_))
    }

    pub fn is_no_response(&self) -> bool {
        matches!(self, RequestOutcome::NoResponse(_))
    }

    /// Borrows the response, if any
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            RequestOutcome::Response(response) => Some(response),
            RequestOutcome::NoResponse(_) => None,
        }
    }

    /// Takes the response, if any
    pub fn into_response(self) -> Option<HttpResponse> {
        match self {
            RequestOutcome::Response(response) => Some(response),
            RequestOutcome::NoResponse(_) => None,
        }
    }

    /// Status code of the response, if any
    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|r| r.status)
    }
}
