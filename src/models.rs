//! Scan result data consumed by the report synthesizer

use crate::http::{HttpResponse, RequestOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Severity level for a vulnerability.
///
/// Parsed case-insensitively; anything outside the fixed set is kept
/// verbatim as `Other` and sorts last.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
    Other(String),
}

impl Severity {
    /// Sort rank: critical 0 .. info 4, anything else 5
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
            Severity::Other(_) => 5,
        }
    }

    /// Lowercase name used in JSON and as the HTML class
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
            Severity::Other(raw) => raw,
        }
    }
}

/// Records that carry no severity are treated as informational
impl Default for Severity {
    fn default() -> Self {
        Severity::Info
    }
}

impl From<&str> for Severity {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            "info" => Severity::Info,
            _ => Severity::Other(raw.to_string()),
        }
    }
}

impl From<String> for Severity {
    fn from(raw: String) -> Self {
        Severity::from(raw.as_str())
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// A vulnerability record produced by a scanning module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    /// Kind of issue (e.g. "SQL Injection")
    #[serde(rename = "type")]
    pub vuln_type: String,
    #[serde(default)]
    pub severity: Severity,
    pub url: String,
    /// Injectable parameter, when the issue is parameter-bound
    #[serde(default)]
    pub parameter: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub remediation: String,
}

impl Vulnerability {
    pub fn new(vuln_type: impl Into<String>, severity: Severity, url: impl Into<String>) -> Self {
        Self {
            vuln_type: vuln_type.into(),
            severity,
            url: url.into(),
            parameter: None,
            description: String::new(),
            payload: None,
            evidence: String::new(),
            remediation: String::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = remediation.into();
        self
    }
}

/// Number of vulnerabilities per known severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    /// Counts the given vulnerabilities; unrecognized severities are not counted
    pub fn tally<'a>(vulnerabilities: impl IntoIterator<Item = &'a Vulnerability>) -> Self {
        let mut counts = Self::default();
        for vuln in vulnerabilities {
            counts.add(&vuln.severity);
        }
        counts
    }

    pub fn add(&mut self, severity: &Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
            Severity::Other(_) => {}
        }
    }

    pub fn get(&self, severity: &Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
            Severity::Other(_) => 0,
        }
    }
}

/// A probe that got no response, so its target/parameter stays untested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UntestedProbe {
    pub url: String,
    #[serde(default)]
    pub parameter: Option<String>,
    pub attempts: u32,
    pub reason: String,
}

/// Aggregated output of a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResultSet {
    pub target: String,
    /// Wall-clock scan duration in seconds
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
    #[serde(default)]
    pub severity_summary: SeverityCounts,
    #[serde(default)]
    pub urls_crawled: usize,
    /// Free-form reconnaissance data (DNS, WHOIS, technologies, ...)
    #[serde(default)]
    pub reconnaissance: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub untested: Vec<UntestedProbe>,
}

impl ScanResultSet {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            duration: 0.0,
            vulnerabilities: Vec::new(),
            severity_summary: SeverityCounts::default(),
            urls_crawled: 0,
            reconnaissance: BTreeMap::new(),
            untested: Vec::new(),
        }
    }

    /// Records a vulnerability and keeps the summary in step
    pub fn add_vulnerability(&mut self, vuln: Vulnerability) {
        self.severity_summary.add(&vuln.severity);
        self.vulnerabilities.push(vuln);
    }

    /// Recomputes `severity_summary` from the vulnerability list, e.g. after
    /// loading a file whose summary was missing or stale
    pub fn recount(&mut self) {
        self.severity_summary = SeverityCounts::tally(&self.vulnerabilities);
    }

    /// Folds one probe outcome into the result set.
    ///
    /// Returns the response for the caller to analyse, or records the
    /// probe as untested and returns `None` so the scan can move on.
    pub fn record_probe(
        &mut self,
        url: &str,
        parameter: Option<&str>,
        outcome: RequestOutcome,
    ) -> Option<HttpResponse> {
        match outcome {
            RequestOutcome::Response(response) => Some(response),
            RequestOutcome::NoResponse(missing) => {
                self.untested.push(UntestedProbe {
                    url: url.to_string(),
                    parameter: parameter.map(String::from),
                    attempts: missing.attempts,
                    reason: missing.error.to_string(),
                });
                None
            }
        }
    }

    /// Stamps the scan duration
    pub fn finish(&mut self, duration: std::time::Duration) {
        self.duration = duration.as_secs_f64();
    }

    /// Vulnerabilities ordered by severity rank; equal ranks keep input order
    pub fn sorted_vulnerabilities(&self) -> Vec<&Vulnerability> {
        let mut sorted: Vec<&Vulnerability> = self.vulnerabilities.iter().collect();
        sorted.sort_by_key(|v| v.severity.rank());
        sorted
    }
}
