//! HTML to PDF conversion through an external tool

use crate::config::DEFAULT_PDF_CONVERTER;
use crate::error::{DeepEyeError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Turns a rendered HTML file into a PDF
pub trait PdfConverter: Send + Sync {
    fn convert(&self, html_path: &Path, pdf_path: &Path) -> Result<()>;
}

/// Runs `<program> [args] <html> <pdf>`, e.g. `wkhtmltopdf --quiet in.html out.pdf`
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["--quiet".to_string()],
        }
    }
}

impl Default for CommandConverter {
    fn default() -> Self {
        Self::new(DEFAULT_PDF_CONVERTER)
    }
}

impl PdfConverter for CommandConverter {
    fn convert(&self, html_path: &Path, pdf_path: &Path) -> Result<()> {
        debug!(
            "Converting {} to {} with {}",
            html_path.display(),
            pdf_path.display(),
            self.program
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(html_path)
            .arg(pdf_path)
            .output()
            .map_err(|e| DeepEyeError::PdfConversion(format!("could not run '{}': {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeepEyeError::PdfConversion(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        if !pdf_path.exists() {
            return Err(DeepEyeError::PdfConversion(format!(
                "'{}' reported success but wrote no {}",
                self.program,
                pdf_path.display()
            )));
        }

        Ok(())
    }
}

/// Where the HTML rendered for a PDF report goes: next to the output with
/// an `.html` extension, or `<output>.html` if that would be the output.
pub fn intermediate_html_path(output_path: &Path) -> PathBuf {
    let candidate = output_path.with_extension("html");
    if candidate == output_path {
        let mut raw = output_path.as_os_str().to_owned();
        raw.push(".html");
        PathBuf::from(raw)
    } else {
        candidate
    }
}
