//! Deep Eye - CLI for single probes and report generation

use clap::{Parser, Subcommand};
use colored::Colorize;
use reqwest::Method;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use deepeye::config::{self, AppConfig, ClientConfig};
use deepeye::http::{HttpClient, RequestOptions, RequestOutcome};
use deepeye::models::ScanResultSet;
use deepeye::report::{self, ReportGenerator, ReportOutcome};

/// Deep Eye - resilient probing and security report synthesis
#[derive(Parser)]
#[command(name = "deepeye", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML or TOML)
    #[arg(short, long, global = true, default_value = "config/config.yaml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request through the resilient client
    Probe {
        /// Target URL
        #[arg(short, long)]
        url: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// HTTP/HTTPS proxy URL (e.g. http://127.0.0.1:8080)
        #[arg(long)]
        proxy: Option<String>,

        /// Custom headers (format: "Key: Value")
        #[arg(short = 'H', long)]
        header: Vec<String>,

        /// Session cookies (format: "name=value")
        #[arg(long)]
        cookie: Vec<String>,

        /// Form fields for the body (format: "name=value")
        #[arg(short, long)]
        data: Vec<String>,

        /// Do not follow redirects
        #[arg(long)]
        no_redirects: bool,
    },

    /// Render a saved JSON result set as json, html or pdf
    Report {
        /// Path to the JSON results file
        #[arg(short, long)]
        input: PathBuf,

        /// Output format (json, html or pdf); defaults to reporting.default_format
        #[arg(short, long)]
        format: Option<String>,

        /// Output file path (default: deepeye_report.<format>)
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn init_tracing(verbose: bool, level: &str) {
    let fallback = if verbose {
        "deepeye=debug".to_string()
    } else {
        format!("deepeye={}", level.to_lowercase())
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_target(false)
        .init();
}

fn print_banner() {
    let banner = r#"
    ╔═══════════════════════════════════════╗
    ║  DEEP EYE                             ║
    ║  Web Security Scanner                 ║
    ║  Use only on authorized targets       ║
    ╚═══════════════════════════════════════╝
    "#;
    println!("{}", banner.cyan());
}

fn print_outcome(outcome: &RequestOutcome, attempts: u64, elapsed_ms: u128) {
    match outcome {
        RequestOutcome::Response(response) => {
            let status = response.status.to_string();
            let status = if response.status.is_success() {
                status.green()
            } else if response.status.is_server_error() {
                status.red()
            } else {
                status.yellow()
            };

            let mut builder = Builder::default();
            builder.push_record(["Field", "Value"]);
            builder.push_record(["Status".to_string(), response.status.to_string()]);
            builder.push_record(["Final URL".to_string(), response.final_url.to_string()]);
            builder.push_record(["Body size".to_string(), format!("{} bytes", response.body.len())]);
            builder.push_record(["Attempts".to_string(), attempts.to_string()]);
            builder.push_record(["Elapsed".to_string(), format!("{elapsed_ms} ms")]);
            for (name, value) in &response.headers {
                builder.push_record([
                    name.to_string(),
                    value.to_str().unwrap_or("<binary>").to_string(),
                ]);
            }

            let mut table = builder.build();
            table.with(Style::rounded());
            println!("\n  {} {}", "Response:".bold(), status);
            println!("{table}");
        }
        RequestOutcome::NoResponse(missing) => {
            println!(
                "\n  {} {} after {} attempt(s)",
                "No response:".red().bold(),
                missing.error,
                missing.attempts
            );
        }
    }
}

fn print_summary(results: &ScanResultSet) {
    let counts = &results.severity_summary;

    let mut builder = Builder::default();
    builder.push_record(["Severity", "Count"]);
    builder.push_record(["Critical".to_string(), counts.critical.to_string()]);
    builder.push_record(["High".to_string(), counts.high.to_string()]);
    builder.push_record(["Medium".to_string(), counts.medium.to_string()]);
    builder.push_record(["Low".to_string(), counts.low.to_string()]);
    builder.push_record(["Info".to_string(), counts.info.to_string()]);
    builder.push_record(["Total".to_string(), results.vulnerabilities.len().to_string()]);

    let mut table = builder.build();
    table.with(Style::rounded());

    println!("\n{}", "  Scan Summary".bold());
    println!("{table}");
    println!(
        "\n  {} {} {} {}",
        format!("{} Critical", counts.critical).red().bold(),
        format!("{} High", counts.high).bright_red(),
        format!("{} Medium", counts.medium).yellow(),
        format!("{} Low", counts.low).blue(),
    );
    if !results.untested.is_empty() {
        println!(
            "  {} {} probe(s) got no response",
            "Untested:".bold(),
            results.untested.len()
        );
    }
}

fn client_config(
    app: &AppConfig,
    proxy: Option<String>,
    headers: &[String],
    cookies: &[String],
) -> deepeye::error::Result<ClientConfig> {
    let mut client = ClientConfig::new(&app.scanner);
    if let Some(proxy) = proxy {
        client = client.with_proxy(proxy);
    }
    for raw in headers {
        let (name, value) = config::parse_header(raw)?;
        client = client.with_header(name, value);
    }
    for raw in cookies {
        let (name, value) = config::parse_cookie(raw)?;
        client = client.with_cookie(name, value);
    }
    Ok(client)
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The subscriber depends on logging.level, so it is installed after loading
    let loaded = config::read_config(&cli.config)?;
    let config_found = loaded.is_some();
    let app_config = loaded.unwrap_or_default();
    init_tracing(cli.verbose, &app_config.logging.level);
    if !config_found {
        warn!("Config file not found: {}, using defaults", cli.config.display());
    }

    match cli.command {
        Commands::Probe {
            url,
            method,
            proxy,
            header,
            cookie,
            data,
            no_redirects,
        } => {
            print_banner();

            let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
            let client = HttpClient::new(client_config(&app_config, proxy, &header, &cookie)?)?;

            let mut options = RequestOptions::new();
            if !data.is_empty() {
                let mut pairs = Vec::with_capacity(data.len());
                for raw in &data {
                    let (name, value) = raw
                        .split_once('=')
                        .ok_or_else(|| format!("expected form field as 'name=value', got '{raw}'"))?;
                    pairs.push((name.to_string(), value.to_string()));
                }
                options = options.form(pairs);
            }
            if no_redirects {
                options = options.follow_redirects(false);
            }

            println!("  {} {} {}", "Probe:".bold(), method.to_string().cyan(), url.green());

            let started = Instant::now();
            let outcome = client.request(method, &url, options).await;
            print_outcome(&outcome, client.request_count(), started.elapsed().as_millis());

            if outcome.is_no_response() {
                std::process::exit(1);
            }
        }

        Commands::Report {
            input,
            format,
            output,
        } => {
            print_banner();

            let results = report::json::load(&input)?;
            let format = format.unwrap_or_else(|| app_config.reporting.default_format.clone());
            let format_ext: report::ReportFormat = format.parse()?;
            let output = output.unwrap_or_else(|| format!("deepeye_report.{}", format_ext.extension()));

            let generator = ReportGenerator::from_settings(&app_config.reporting);
            let outcome = generator.generate(&results, Path::new(&output), &format)?;

            print_summary(&results);
            match outcome {
                ReportOutcome::Written(path) => {
                    println!("\n  {} {}", "Report saved to:".bold(), path.display().to_string().green());
                }
                ReportOutcome::HtmlFallback { html_path, reason } => {
                    println!("\n  {} {}", "PDF conversion failed:".yellow().bold(), reason);
                    println!("  {} {}", "HTML report available at:".bold(), html_path.display().to_string().green());
                }
                ReportOutcome::Failed { path, reason } => {
                    eprintln!(
                        "\n  {} could not write {}: {}",
                        "Error:".red().bold(),
                        path.display(),
                        reason
                    );
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
