//! Error types for the Deep Eye request layer

use thiserror::Error;

/// Main error type for Deep Eye operations.
///
/// Request execution never surfaces this type: calls on
/// [`HttpClient`](crate::http::HttpClient) fold transport failures into
/// [`RequestOutcome::NoResponse`](crate::http::RequestOutcome). It is
/// returned from construction, configuration loading, and report format
/// validation.
#[derive(Debug, Error)]
pub enum DeepEyeError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Unsupported report format: '{0}' (expected json, html or pdf)")]
    UnsupportedFormat(String),

    #[error("PDF conversion failed: {0}")]
    PdfConversion(String),
}

/// Result type alias for Deep Eye operations
pub type Result<T> = std::result::Result<T, DeepEyeError>;
