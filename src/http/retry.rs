//! Retry policy: which attempts are repeated and how long to wait between them
//!
//! The policy is a plain value with no I/O, so every decision can be checked
//! without a network. Decisions depend on the method, the retry count, and
//! either the status code or the transport error kind; never on a body.

use super::outcome::HttpResponse;
use super::transport::TransportError;
use crate::config::ClientConfig;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use std::time::Duration;

/// Upper bound for any single wait between attempts
pub const BACKOFF_MAX: Duration = Duration::from_secs(120);

/// Exponential base applied to the backoff schedule
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.0;

/// Statuses that mean "try again later"
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Statuses for which a `Retry-After` header replaces the computed backoff
pub const RETRY_AFTER_STATUS_CODES: [u16; 3] = [413, 429, 503];

/// What happened on one attempt
#[derive(Debug, Clone, Copy)]
pub enum Attempt<'a> {
    Response(&'a HttpResponse),
    Failed(&'a TransportError),
}

/// What the client should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { after: Duration },
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_factor: f64,
    retryable_status_codes: Vec<StatusCode>,
    retryable_methods: Vec<Method>,
}

impl RetryPolicy {
    /// Policy with the standard status and method sets
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retryable_status_codes: RETRYABLE_STATUS_CODES
                .iter()
                .filter_map(|code| StatusCode::from_u16(*code).ok())
                .collect(),
            retryable_methods: vec![Method::HEAD, Method::GET, Method::OPTIONS, Method::POST],
        }
    }

    /// Policy derived from a client config
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.max_retries)
    }

    /// Overrides the backoff factor; negative or NaN values mean "no wait"
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = if factor.is_nan() { 0.0 } else { factor.max(0.0) };
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn retryable_status_codes(&self) -> &[StatusCode] {
        &self.retryable_status_codes
    }

    pub fn retryable_methods(&self) -> &[Method] {
        &self.retryable_methods
    }

    pub fn is_retryable_method(&self, method: &Method) -> bool {
        self.retryable_methods.contains(method)
    }

    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Most attempts a call with this method can make
    pub fn max_attempts(&self, method: &Method) -> u32 {
        if self.is_retryable_method(method) {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }

    /// Wait before the given retry (1-based).
    ///
    /// The first retry goes out immediately; later ones wait
    /// `factor * 2^(retry - 1)` seconds, capped at [`BACKOFF_MAX`].
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry <= 1 || self.backoff_factor <= 0.0 {
            return Duration::ZERO;
        }
        let exponent = (retry - 1).min(32) as i32;
        let secs = self.backoff_factor * 2f64.powi(exponent);
        Duration::from_secs_f64(secs.min(BACKOFF_MAX.as_secs_f64()))
    }

    /// Decides whether to retry after an attempt, given how many retries
    /// have already been made for this call.
    pub fn decide(&self, method: &Method, retries_done: u32, attempt: Attempt<'_>) -> RetryDecision {
        if retries_done >= self.max_retries || !self.is_retryable_method(method) {
            return RetryDecision::Stop;
        }

        let retry = retries_done + 1;
        match attempt {
            Attempt::Failed(error) if error.kind.is_retryable() => RetryDecision::Retry {
                after: self.backoff(retry),
            },
            Attempt::Response(response) if self.is_retryable_status(response.status) => {
                let after = retry_after(response).unwrap_or_else(|| self.backoff(retry));
                RetryDecision::Retry { after }
            }
            _ => RetryDecision::Stop,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_RETRIES)
    }
}

/// Server-requested wait, honoured only for statuses that define it
fn retry_after(response: &HttpResponse) -> Option<Duration> {
    if !RETRY_AFTER_STATUS_CODES.contains(&response.status.as_u16()) {
        return None;
    }
    response
        .header("retry-after")
        .and_then(parse_retry_after)
        .map(|wait| wait.min(BACKOFF_MAX))
}

/// Parses a `Retry-After` value: delta-seconds or an HTTP date.
/// Dates in the past yield a zero wait.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}
