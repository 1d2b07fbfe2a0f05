//! Outbound HTTP layer: resilient client, retry policy, transport seam

pub mod client;
pub mod outcome;
pub mod retry;
pub mod transport;

pub use client::{HttpClient, RequestOptions};
pub use outcome::{HttpResponse, NoResponse, RequestOutcome};
pub use retry::{Attempt, RetryDecision, RetryPolicy};
pub use transport::{
    PreparedRequest, ReqwestTransport, RequestBody, Transport, TransportError, TransportErrorKind,
};
