//! Configuration management for Deep Eye

use crate::error::{DeepEyeError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_PDF_CONVERTER: &str = "wkhtmltopdf";

/// User-Agent sent when the configuration does not name one
pub fn default_user_agent() -> String {
    format!("DeepEye/{}", env!("CARGO_PKG_VERSION"))
}

/// File-based configuration structure. Unknown sections are ignored so a
/// full scanner config file can be pointed at directly.
#[derive(Debug, Deserialize)]
struct FileConfig {
    scanner: Option<ScannerSection>,
    reporting: Option<ReportingSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Deserialize)]
struct ScannerSection {
    timeout: Option<u64>,
    verify_ssl: Option<bool>,
    max_retries: Option<u32>,
    user_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReportingSection {
    default_format: Option<String>,
    template: Option<String>,
    pdf_converter: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoggingSection {
    level: Option<String>,
}

/// The `scanner` section: transport policy shared by every request
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerSettings {
    /// Per-attempt timeout in seconds
    pub timeout: u64,
    /// Verify TLS certificates
    pub verify_ssl: bool,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
            verify_ssl: true,
            max_retries: DEFAULT_MAX_RETRIES,
            user_agent: default_user_agent(),
        }
    }
}

/// The `reporting` section
#[derive(Debug, Clone, PartialEq)]
pub struct ReportingSettings {
    pub default_format: String,
    /// Optional path to a tera template replacing the built-in one
    pub template: Option<String>,
    /// Program used to turn the HTML report into a PDF
    pub pdf_converter: String,
}

impl Default for ReportingSettings {
    fn default() -> Self {
        Self {
            default_format: "html".to_string(),
            template: None,
            pdf_converter: DEFAULT_PDF_CONVERTER.to_string(),
        }
    }
}

/// The `logging` section
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
        }
    }
}

/// Fully resolved application configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub scanner: ScannerSettings,
    pub reporting: ReportingSettings,
    pub logging: LoggingSettings,
}

/// Syntax of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSyntax {
    Toml,
    Yaml,
}

impl ConfigSyntax {
    /// `.yaml`/`.yml` files are YAML, everything else is TOML
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => ConfigSyntax::Yaml,
            _ => ConfigSyntax::Toml,
        }
    }
}

/// Loads configuration from a file and merges it over the defaults.
///
/// A missing file is not an error: a warning is logged and the defaults
/// are returned. A file that exists but does not parse is an error.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    match read_config(path)? {
        Some(config) => Ok(config),
        None => {
            warn!(
                "Config file not found: {}, using defaults",
                path.display()
            );
            Ok(AppConfig::default())
        }
    }
}

/// Reads and parses a config file; `None` when the file does not exist.
/// Logs nothing about a missing file, for callers that set up logging
/// from the result.
pub fn read_config(path: &Path) -> Result<Option<AppConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content, ConfigSyntax::from_path(path))?;
    info!("Configuration loaded from {}", path.display());
    Ok(Some(config))
}

/// Parses configuration text and merges it over the defaults
pub fn parse_config(content: &str, syntax: ConfigSyntax) -> Result<AppConfig> {
    let file_config: FileConfig = match syntax {
        ConfigSyntax::Toml => toml::from_str(content)?,
        ConfigSyntax::Yaml => {
            // An empty YAML document deserializes to unit, not a mapping
            if content.trim().is_empty() {
                return Ok(AppConfig::default());
            }
            serde_yaml::from_str(content)?
        }
    };

    let mut config = AppConfig::default();

    if let Some(scanner) = file_config.scanner {
        if let Some(timeout) = scanner.timeout {
            config.scanner.timeout = timeout;
        }
        if let Some(verify) = scanner.verify_ssl {
            config.scanner.verify_ssl = verify;
        }
        if let Some(retries) = scanner.max_retries {
            config.scanner.max_retries = retries;
        }
        if let Some(ua) = scanner.user_agent {
            config.scanner.user_agent = ua;
        }
    }

    if let Some(reporting) = file_config.reporting {
        if let Some(format) = reporting.default_format {
            config.reporting.default_format = format;
        }
        config.reporting.template = reporting.template;
        if let Some(converter) = reporting.pdf_converter {
            config.reporting.pdf_converter = converter;
        }
    }

    if let Some(level) = file_config.logging.and_then(|l| l.level) {
        config.logging.level = level;
    }

    Ok(config)
}

/// Everything a [`HttpClient`](crate::http::HttpClient) is built from.
///
/// Once handed to the client the config is frozen behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub timeout_secs: u64,
    pub verify_tls: bool,
    pub max_retries: u32,
    pub user_agent: String,
    /// `scheme://host:port`, applied to both http and https
    pub proxy_url: Option<String>,
    /// Merged over the default headers; names are unique ignoring case
    pub custom_headers: HashMap<String, String>,
    /// Sent with every request as a single `Cookie` header
    pub cookies: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(&ScannerSettings::default())
    }
}

impl ClientConfig {
    /// Creates a client config from the `scanner` settings
    pub fn new(settings: &ScannerSettings) -> Self {
        Self {
            timeout_secs: settings.timeout,
            verify_tls: settings.verify_ssl,
            max_retries: settings.max_retries,
            user_agent: settings.user_agent.clone(),
            proxy_url: None,
            custom_headers: HashMap::new(),
            cookies: HashMap::new(),
        }
    }

    /// Routes all traffic through the given proxy
    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    /// Adds a custom header, replacing any existing one with the same name
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.custom_headers
            .retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.custom_headers.insert(name, value.into());
        self
    }

    /// Adds several custom headers
    pub fn with_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(self, |config, (name, value)| config.with_header(name, value))
    }

    /// Adds a session cookie
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Adds several session cookies
    pub fn with_cookies<I, K, V>(self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        cookies
            .into_iter()
            .fold(self, |config, (name, value)| config.with_cookie(name, value))
    }

    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The `Cookie` header value for the session cookies, sorted by name
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let mut pairs: Vec<(&String, &String)> = self.cookies.iter().collect();
        pairs.sort();
        Some(
            pairs
                .into_iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Checks the invariants a client relies on
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(DeepEyeError::ConfigError(
                "scanner.timeout must be greater than zero".to_string(),
            ));
        }

        if let Some(ref proxy) = self.proxy_url {
            let url = Url::parse(proxy)
                .map_err(|e| DeepEyeError::ConfigError(format!("Invalid proxy URL '{proxy}': {e}")))?;
            if url.host_str().is_none() {
                return Err(DeepEyeError::ConfigError(format!(
                    "Proxy URL '{proxy}' has no host"
                )));
            }
        }

        Ok(())
    }
}

/// Parses a `"Key: Value"` header argument
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(DeepEyeError::InvalidHeader(format!(
            "expected 'Key: Value', got '{raw}'"
        ))),
    }
}

/// Parses a `"name=value"` cookie argument
pub fn parse_cookie(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(DeepEyeError::ConfigError(format!(
            "expected cookie as 'name=value', got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.scanner.timeout, 10);
        assert!(config.scanner.verify_ssl);
        assert_eq!(config.scanner.max_retries, 3);
        assert!(config.scanner.user_agent.starts_with("DeepEye/"));
        assert_eq!(config.reporting.default_format, "html");
        assert_eq!(config.logging.level, "INFO");
    }

    #[test]
    fn test_parse_yaml_partial() {
        let yaml = r#"
scanner:
  timeout: 5
  verify_ssl: false
  default_threads: 8
ai_providers:
  openai:
    enabled: false
"#;
        let config = parse_config(yaml, ConfigSyntax::Yaml).expect("valid yaml");
        assert_eq!(config.scanner.timeout, 5);
        assert!(!config.scanner.verify_ssl);
        assert_eq!(config.scanner.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[scanner]
max_retries = 1
user_agent = "Probe/2.0"

[reporting]
default_format = "pdf"
pdf_converter = "/usr/local/bin/wkhtmltopdf"

[logging]
level = "DEBUG"
"#;
        let config = parse_config(toml, ConfigSyntax::Toml).expect("valid toml");
        assert_eq!(config.scanner.max_retries, 1);
        assert_eq!(config.scanner.user_agent, "Probe/2.0");
        assert_eq!(config.reporting.default_format, "pdf");
        assert_eq!(config.reporting.pdf_converter, "/usr/local/bin/wkhtmltopdf");
        assert_eq!(config.logging.level, "DEBUG");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = parse_config("", ConfigSyntax::Yaml).expect("empty is fine");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_malformed_config_is_error() {
        assert!(parse_config("scanner: [unterminated", ConfigSyntax::Yaml).is_err());
        assert!(parse_config("[scanner\ntimeout = ", ConfigSyntax::Toml).is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/deepeye/config.yaml"))
            .expect("missing file falls back to defaults");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_read_config_reports_missing_file() {
        let missing = read_config(Path::new("/nonexistent/deepeye/config.yaml")).expect("not an error");
        assert!(missing.is_none());

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"WARN\"\n").expect("write config");
        let found = read_config(&path).expect("valid toml").expect("file exists");
        assert_eq!(found.logging.level, "WARN");
    }

    #[test]
    fn test_syntax_from_path() {
        assert_eq!(ConfigSyntax::from_path(Path::new("a.yaml")), ConfigSyntax::Yaml);
        assert_eq!(ConfigSyntax::from_path(Path::new("a.YML")), ConfigSyntax::Yaml);
        assert_eq!(ConfigSyntax::from_path(Path::new("a.toml")), ConfigSyntax::Toml);
        assert_eq!(ConfigSyntax::from_path(Path::new("config")), ConfigSyntax::Toml);
    }

    #[test]
    fn test_with_header_replaces_case_insensitively() {
        let config = ClientConfig::default()
            .with_header("X-Token", "a")
            .with_header("x-token", "b");
        assert_eq!(config.custom_headers.len(), 1);
        assert_eq!(config.custom_headers.get("x-token").map(String::as_str), Some("b"));
    }

    #[test]
    fn test_cookie_header_sorted() {
        let config = ClientConfig::default()
            .with_cookie("session", "abc")
            .with_cookie("lang", "en");
        assert_eq!(config.cookie_header().as_deref(), Some("lang=en; session=abc"));
        assert!(ClientConfig::default().cookie_header().is_none());
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::default().validate().is_ok());

        let mut zero = ClientConfig::default();
        zero.timeout_secs = 0;
        assert!(matches!(zero.validate(), Err(DeepEyeError::ConfigError(_))));

        let proxied = ClientConfig::default().with_proxy("http://127.0.0.1:8080");
        assert!(proxied.validate().is_ok());

        let bad = ClientConfig::default().with_proxy("not a proxy");
        assert!(matches!(bad.validate(), Err(DeepEyeError::ConfigError(_))));
    }

    #[test]
    fn test_parse_header_and_cookie() {
        assert_eq!(
            parse_header("Authorization: Bearer x:y").expect("valid"),
            ("Authorization".to_string(), "Bearer x:y".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert_eq!(
            parse_cookie("sid=abc=def").expect("valid"),
            ("sid".to_string(), "abc=def".to_string())
        );
        assert!(parse_cookie("=value").is_err());
    }
}
