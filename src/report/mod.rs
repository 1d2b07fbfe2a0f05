//! Report synthesis: JSON, HTML and PDF renderings of a scan result set
//!
//! Only format validation is an error. Once the format is known a file is
//! always attempted, and write or conversion problems are logged and
//! described by the returned [`ReportOutcome`].

pub mod html;
pub mod json;
pub mod pdf;

use crate::config::ReportingSettings;
use crate::error::{DeepEyeError, Result};
use crate::models::ScanResultSet;
use pdf::{CommandConverter, PdfConverter};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info, warn};

/// Output formats the synthesizer can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Html,
    Pdf,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Html => "html",
            ReportFormat::Pdf => "pdf",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = DeepEyeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "html" => Ok(ReportFormat::Html),
            "pdf" => Ok(ReportFormat::Pdf),
            _ => Err(DeepEyeError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// What ended up on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The requested artifact was written
    Written(PathBuf),
    /// PDF conversion failed; the intermediate HTML was kept instead
    HtmlFallback { html_path: PathBuf, reason: String },
    /// Nothing usable could be written
    Failed { path: PathBuf, reason: String },
}

impl ReportOutcome {
    /// Path of the usable artifact, if any
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            ReportOutcome::Written(path) => Some(path),
            ReportOutcome::HtmlFallback { html_path, .. } => Some(html_path),
            ReportOutcome::Failed { .. } => None,
        }
    }
}

/// Renders result sets to files
pub struct ReportGenerator {
    template: Option<PathBuf>,
    converter: Box<dyn PdfConverter>,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportGenerator {
    /// Generator with the built-in template and the default PDF converter
    pub fn new() -> Self {
        Self {
            template: None,
            converter: Box::new(CommandConverter::default()),
        }
    }

    /// Generator configured from the `reporting` section
    pub fn from_settings(settings: &ReportingSettings) -> Self {
        let mut generator = Self::new()
            .with_converter(CommandConverter::new(settings.pdf_converter.clone()));
        if let Some(ref template) = settings.template {
            generator = generator.with_template(template);
        }
        generator
    }

    /// Uses a template file instead of the built-in one
    pub fn with_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.template = Some(path.into());
        self
    }

    pub fn with_converter(mut self, converter: impl PdfConverter + 'static) -> Self {
        self.converter = Box::new(converter);
        self
    }

    /// Validates `format` and renders the report.
    ///
    /// Fails only with [`DeepEyeError::UnsupportedFormat`], before any
    /// file is touched.
    pub fn generate(
        &self,
        results: &ScanResultSet,
        output_path: &Path,
        format: &str,
    ) -> Result<ReportOutcome> {
        let format = ReportFormat::from_str(format)?;
        Ok(self.render(results, output_path, format))
    }

    /// Renders the report in an already validated format
    pub fn render(
        &self,
        results: &ScanResultSet,
        output_path: &Path,
        format: ReportFormat,
    ) -> ReportOutcome {
        match format {
            ReportFormat::Json => settle(output_path, json::export(results, output_path)),
            ReportFormat::Html => settle(
                output_path,
                html::generate(results, output_path, self.template.as_deref()),
            ),
            ReportFormat::Pdf => self.render_pdf(results, output_path),
        }
    }

    fn render_pdf(&self, results: &ScanResultSet, output_path: &Path) -> ReportOutcome {
        let html_path = pdf::intermediate_html_path(output_path);

        if let Err(e) = html::generate(results, &html_path, self.template.as_deref()) {
            error!("Error generating HTML for PDF report: {e}");
            return ReportOutcome::Failed {
                path: html_path,
                reason: e.to_string(),
            };
        }

        match self.converter.convert(&html_path, output_path) {
            Ok(()) => {
                info!("PDF report generated: {}", output_path.display());
                if let Err(e) = std::fs::remove_file(&html_path) {
                    warn!(
                        "Could not remove intermediate HTML {}: {e}",
                        html_path.display()
                    );
                }
                ReportOutcome::Written(output_path.to_path_buf())
            }
            Err(e) => {
                error!("Error generating PDF: {e}");
                info!("HTML report available at: {}", html_path.display());
                ReportOutcome::HtmlFallback {
                    html_path,
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn settle(path: &Path, result: Result<()>) -> ReportOutcome {
    match result {
        Ok(()) => ReportOutcome::Written(path.to_path_buf()),
        Err(e) => {
            error!("Failed to write report {}: {e}", path.display());
            ReportOutcome::Failed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        }
    }
}

/// Renders `results` to `output_path` with the default generator
pub fn generate(results: &ScanResultSet, output_path: &Path, format: &str) -> Result<ReportOutcome> {
    ReportGenerator::new().generate(results, output_path, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<ReportFormat>().expect("json"), ReportFormat::Json);
        assert_eq!(" HTML ".parse::<ReportFormat>().expect("html"), ReportFormat::Html);
        assert_eq!("Pdf".parse::<ReportFormat>().expect("pdf"), ReportFormat::Pdf);
        assert!(matches!(
            "bogus".parse::<ReportFormat>(),
            Err(DeepEyeError::UnsupportedFormat(f)) if f == "bogus"
        ));
        assert!("".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_artifact() {
        let written = ReportOutcome::Written(PathBuf::from("r.json"));
        assert_eq!(written.artifact(), Some(Path::new("r.json")));

        let failed = ReportOutcome::Failed {
            path: PathBuf::from("r.json"),
            reason: "denied".to_string(),
        };
        assert!(failed.artifact().is_none());
    }
}
