//! Deep Eye - outbound request layer and report synthesizer
//!
//! Every probe a scanning module sends goes through [`http::HttpClient`],
//! which applies one timeout, TLS, proxy, identity and retry policy and
//! never fails a call: the caller gets a response or an explicit
//! "no response". Aggregated findings are rendered by [`report`].

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod report;
