//! Sumi-Sift main entry point
//!
//! Command-line front end: extract contact and company data from a saved
//! HTML page, or validate a configuration file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use sumi_sift::config::{load_config_with_hash, Config};
use sumi_sift::extract::{DataExtractor, ExtractOptions};
use sumi_sift::throttle::CeilingTable;
use tracing_subscriber::EnvFilter;

/// Sumi-Sift: scraping support toolkit
///
/// Rate limiting, error recovery and HTML data extraction for scraping
/// pipelines. The CLI exposes the extractor and configuration checks.
#[derive(Parser, Debug)]
#[command(name = "sumi-sift")]
#[command(version = "1.0.0")]
#[command(about = "Scraping support toolkit", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract data from an HTML file and print it as JSON
    Extract {
        /// HTML file to read
        #[arg(value_name = "HTML")]
        html: PathBuf,

        /// Named CSS selector to extract, as name=css (repeatable)
        #[arg(short, long = "selector", value_name = "NAME=CSS")]
        selectors: Vec<String>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate the configuration and print the effective settings
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load(cli.config.as_deref())?;

    match cli.command {
        Command::Extract {
            html,
            selectors,
            pretty,
        } => handle_extract(&config, &html, &selectors, pretty),
        Command::CheckConfig => handle_check_config(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_sift=info,warn"),
            1 => EnvFilter::new("sumi_sift=debug,info"),
            2 => EnvFilter::new("sumi_sift=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        tracing::debug!("No configuration file given, using defaults");
        return Ok(Config::default());
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok(config)
}

/// Handles `extract`: prints the extracted record as JSON on stdout
fn handle_extract(
    config: &Config,
    path: &Path,
    selectors: &[String],
    pretty: bool,
) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut options = ExtractOptions::new();
    for entry in selectors {
        let (name, css) = entry
            .split_once('=')
            .with_context(|| format!("Selector '{}' is not in name=css form", entry))?;
        options = options.add_selector(name.trim(), css.trim())?;
    }

    let record = DataExtractor::from_config(config).extract_from_html(&html, &options);
    let json = if pretty {
        serde_json::to_string_pretty(&record)?
    } else {
        serde_json::to_string(&record)?
    };
    println!("{}", json);

    Ok(())
}

/// Handles `check-config`: shows the effective settings
fn handle_check_config(config: &Config) -> anyhow::Result<()> {
    println!("=== Sumi-Sift Configuration ===\n");

    let table = CeilingTable::from_config(&config.throttle);
    let global = table.global();
    println!("Throttle:");
    println!(
        "  Global: {} requests / {}s (burst {})",
        global.requests, global.per_seconds, global.burst
    );
    for entry in &config.throttle.domain {
        println!(
            "  Domain {}: {} requests / {}s (burst {})",
            entry.domain, entry.ceiling.requests, entry.ceiling.per_seconds, entry.ceiling.burst
        );
    }
    for (service, ceiling) in table.services() {
        println!(
            "  API {}: {} requests / {}s (burst {})",
            service, ceiling.requests, ceiling.per_seconds, ceiling.burst
        );
    }

    let adaptive = &config.adaptive;
    println!("\nAdaptive:");
    println!("  Enabled: {}", adaptive.enabled);
    println!("  Slow response: {}ms", adaptive.slow_response_ms);
    println!(
        "  Block: {}ms default, {}ms max",
        adaptive.default_block_ms, adaptive.max_block_ms
    );
    println!("  Adjustment interval: {}ms", adaptive.adjustment_interval_ms);

    let retry = &config.retry;
    println!("\nRetry:");
    println!("  Max retries: {}", retry.max_retries);
    println!("  Retry delay: {}ms", retry.retry_delay_ms);
    println!("  Exponential backoff: {}", retry.exponential_backoff);
    println!("  Max backoff delay: {}ms", retry.max_backoff_delay_ms);

    let breaker = &config.circuit_breaker;
    println!("\nCircuit breaker:");
    println!("  Threshold: {}", breaker.threshold);
    println!("  Call timeout: {}ms", breaker.timeout_ms);
    println!("  Reset timeout: {}ms", breaker.reset_timeout_ms);

    let extractor = &config.extractor;
    println!("\nExtractor:");
    println!("  Max emails: {}", limit(extractor.max_emails));
    println!("  Max phones: {}", limit(extractor.max_phones));
    println!(
        "  Max social per platform: {}",
        limit(extractor.max_social_per_platform)
    );
    println!(
        "  Extra placeholder domains: {}",
        extractor.placeholder_domains.len()
    );

    println!("\n✓ Configuration is valid");
    Ok(())
}

fn limit(value: Option<usize>) -> String {
    value.map_or_else(|| "unlimited".to_string(), |v| v.to_string())
}
