//! HTML report generation using Tera templates

use crate::error::Result;
use crate::models::{ScanResultSet, Severity, Vulnerability};
use chrono::Local;
use serde::Serialize;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{info, warn};

pub const REPORT_TITLE: &str = "Deep Eye Security Assessment Report";

/// Template-facing view of one vulnerability
#[derive(Debug, Serialize)]
struct VulnerabilityView<'a> {
    kind: &'a str,
    /// Lowercase name, used as CSS class
    severity: &'a str,
    severity_label: String,
    url: &'a str,
    parameter: Option<&'a str>,
    description: &'a str,
    payload: Option<&'a str>,
    evidence: &'a str,
    remediation: &'a str,
}

impl<'a> From<&'a Vulnerability> for VulnerabilityView<'a> {
    fn from(vuln: &'a Vulnerability) -> Self {
        let severity = match vuln.severity {
            Severity::Other(_) => "unknown",
            ref known => known.as_str(),
        };
        Self {
            kind: &vuln.vuln_type,
            severity,
            severity_label: vuln.severity.to_string(),
            url: &vuln.url,
            parameter: vuln.parameter.as_deref(),
            description: &vuln.description,
            payload: vuln.payload.as_deref(),
            evidence: &vuln.evidence,
            remediation: &vuln.remediation,
        }
    }
}

/// Renders the report document
pub fn render(results: &ScanResultSet, template_path: Option<&Path>) -> Result<String> {
    let template_content = match template_path {
        Some(path) => std::fs::read_to_string(path).unwrap_or_else(|e| {
            warn!(
                "Could not read report template {}: {e}, using built-in template",
                path.display()
            );
            default_template().to_string()
        }),
        None => default_template().to_string(),
    };

    let mut tera = Tera::default();
    tera.add_raw_template("report.html", &template_content)?;

    let vulnerabilities: Vec<VulnerabilityView> = results
        .sorted_vulnerabilities()
        .into_iter()
        .map(VulnerabilityView::from)
        .collect();

    let mut context = Context::new();
    context.insert("title", REPORT_TITLE);
    context.insert(
        "generated_date",
        &Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    context.insert("target", &results.target);
    context.insert("scan_duration", &format_duration(results.duration));
    context.insert("urls_scanned", &results.urls_crawled);
    context.insert("severity_counts", &results.severity_summary);
    context.insert("summary", &executive_summary(results));
    context.insert("vulnerabilities", &vulnerabilities);
    context.insert("untested", &results.untested);
    context.insert("version", env!("CARGO_PKG_VERSION"));

    Ok(tera.render("report.html", &context)?)
}

/// Renders the report and writes it to `output_path`
pub fn generate(results: &ScanResultSet, output_path: &Path, template_path: Option<&Path>) -> Result<()> {
    let rendered = render(results, template_path)?;
    std::fs::write(output_path, rendered)?;
    info!("HTML report generated: {}", output_path.display());
    Ok(())
}

/// Executive summary paragraph, computed from the severity counts
pub fn executive_summary(results: &ScanResultSet) -> String {
    let counts = &results.severity_summary;
    format!(
        "This security assessment identified {} potential security issues on the target system.\n\n\
         Critical vulnerabilities require immediate attention as they pose significant risk to the organization.\n\
         High and medium severity issues should be addressed in order of priority.\n\n\
         Risk Distribution:\n\
         - Critical: {} issues\n\
         - High: {} issues\n\
         - Medium: {} issues\n\
         - Low: {} issues",
        results.vulnerabilities.len(),
        counts.critical,
        counts.high,
        counts.medium,
        counts.low,
    )
}

/// Human-readable duration: `42.50s` under a minute, `1h 02m 03s` above
pub fn format_duration(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "N/A".to_string();
    }
    if secs < 60.0 {
        return format!("{secs:.2}s");
    }
    let total = secs.round() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else {
        format!("{minutes}m {seconds:02}s")
    }
}

fn default_template() -> &'static str {
    r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{ title }}</title>
    <style>
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; background: #f5f5f5; color: #333; line-height: 1.6; }
        .container { max-width: 1200px; margin: 0 auto; padding: 20px; }
        .header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 40px; border-radius: 10px; margin-bottom: 30px; box-shadow: 0 4px 6px rgba(0,0,0,0.1); }
        .header h1 { font-size: 2.2em; margin-bottom: 10px; }
        .metadata { display: grid; grid-template-columns: repeat(auto-fit, minmax(250px, 1fr)); gap: 20px; margin-bottom: 30px; }
        .metadata-card { background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); word-break: break-all; }
        .metadata-card h3 { color: #667eea; margin-bottom: 10px; }
        .severity-grid { display: grid; grid-template-columns: repeat(4, 1fr); gap: 15px; margin-bottom: 30px; }
        @media (max-width: 768px) { .severity-grid { grid-template-columns: repeat(2, 1fr); } }
        .severity-card { padding: 20px; border-radius: 8px; color: white; text-align: center; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        .severity-card h3 { font-size: 2em; margin-bottom: 5px; }
        .severity-critical { background: #8b0000; }
        .severity-high { background: #ff4500; }
        .severity-medium { background: #ffa500; }
        .severity-low { background: #ffd700; color: #333; }
        .section { background: white; padding: 30px; border-radius: 8px; margin-bottom: 30px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        .section h2 { color: #667eea; margin-bottom: 20px; border-bottom: 2px solid #667eea; padding-bottom: 10px; }
        .summary { white-space: pre-line; }
        .vulnerability { border-left: 4px solid #ddd; padding: 20px; margin-bottom: 20px; background: #f9f9f9; border-radius: 4px; }
        .vulnerability.critical { border-left-color: #8b0000; }
        .vulnerability.high { border-left-color: #ff4500; }
        .vulnerability.medium { border-left-color: #ffa500; }
        .vulnerability.low { border-left-color: #ffd700; }
        .vulnerability.info { border-left-color: #87ceeb; }
        .vulnerability h3 { margin-bottom: 10px; }
        .vulnerability p { margin: 8px 0; }
        .vulnerability-meta { display: flex; gap: 20px; margin: 10px 0; flex-wrap: wrap; }
        .vulnerability-meta span { background: white; padding: 5px 10px; border-radius: 4px; font-size: 0.9em; word-break: break-all; }
        .code { background: #2d2d2d; color: #f8f8f2; padding: 15px; border-radius: 4px; overflow-x: auto; font-family: 'Courier New', monospace; margin: 10px 0; white-space: pre-wrap; word-wrap: break-word; }
        .untested li { margin-left: 20px; font-size: 0.9em; color: #666; word-break: break-all; }
        .footer { text-align: center; padding: 20px; color: #666; margin-top: 30px; font-size: 0.9em; }
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>{{ title }}</h1>
            <p>Generated: {{ generated_date }}</p>
        </div>

        <div class="metadata">
            <div class="metadata-card"><h3>Target</h3><p>{{ target }}</p></div>
            <div class="metadata-card"><h3>Scan Duration</h3><p>{{ scan_duration }}</p></div>
            <div class="metadata-card"><h3>URLs Scanned</h3><p>{{ urls_scanned }}</p></div>
        </div>

        <div class="severity-grid">
            <div class="severity-card severity-critical"><h3>{{ severity_counts.critical }}</h3><p>Critical</p></div>
            <div class="severity-card severity-high"><h3>{{ severity_counts.high }}</h3><p>High</p></div>
            <div class="severity-card severity-medium"><h3>{{ severity_counts.medium }}</h3><p>Medium</p></div>
            <div class="severity-card severity-low"><h3>{{ severity_counts.low }}</h3><p>Low</p></div>
        </div>

        <div class="section">
            <h2>Executive Summary</h2>
            <p class="summary">{{ summary }}</p>
        </div>

        <div class="section">
            <h2>Vulnerabilities</h2>
            {% if vulnerabilities | length > 0 %}
            {% for vuln in vulnerabilities %}
            <div class="vulnerability {{ vuln.severity }}">
                <h3>{{ vuln.kind }}</h3>
                <div class="vulnerability-meta">
                    <span><strong>Severity:</strong> {{ vuln.severity_label }}</span>
                    <span><strong>URL:</strong> {{ vuln.url }}</span>
                    {% if vuln.parameter %}<span><strong>Parameter:</strong> {{ vuln.parameter }}</span>{% endif %}
                </div>
                <p><strong>Description:</strong> {{ vuln.description }}</p>
                {% if vuln.payload %}<p><strong>Payload:</strong></p><div class="code">{{ vuln.payload }}</div>{% endif %}
                <p><strong>Evidence:</strong> {{ vuln.evidence }}</p>
                <p><strong>Remediation:</strong> {{ vuln.remediation }}</p>
            </div>
            {% endfor %}
            {% else %}
            <p>No vulnerabilities detected.</p>
            {% endif %}
        </div>

        {% if untested | length > 0 %}
        <div class="section untested">
            <h2>Untested Probes ({{ untested | length }})</h2>
            <ul>
            {% for probe in untested %}
                <li>{{ probe.url }}{% if probe.parameter %} [{{ probe.parameter }}]{% endif %}: {{ probe.reason }}</li>
            {% endfor %}
            </ul>
        </div>
        {% endif %}

        <div class="footer">
            <p>Generated by Deep Eye v{{ version }}</p>
            <p>This report contains sensitive security information. Handle with care.</p>
        </div>
    </div>
</body>
</html>"#
}
