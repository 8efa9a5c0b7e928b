//! Trawl main entry point
//!
//! This is the command-line interface for the Trawl extraction engine.

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use trawl::config::{load_config, Config};
use trawl::{build_coordinator, RuleSet, TrawlError};
use tracing_subscriber::EnvFilter;

/// Trawl: declarative, recursive web extraction
///
/// Trawl fetches the URL of a JSON rule set, evaluates its selectors against
/// the response and follows the links they mark, then prints the extracted
/// values as JSON.
#[derive(Parser, Debug)]
#[command(name = "trawl")]
#[command(version)]
#[command(about = "Declarative, recursive web extraction", long_about = None)]
struct Cli {
    /// Path to the JSON rule set
    #[arg(value_name = "RULES")]
    rules: PathBuf,

    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and rule set without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:#}", err);
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so that stdout only carries the extracted JSON.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("trawl=info,warn"),
            1 => EnvFilter::new("trawl=debug,info"),
            2 => EnvFilter::new("trawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?
        }
        None => Config::default(),
    };

    let mut rules = load_rules(&cli.rules)?;
    if rules.url.is_none() {
        bail!("Rule set {} has no URL", cli.rules.display());
    }

    if cli.dry_run {
        handle_dry_run(&config, &rules);
        return Ok(ExitCode::SUCCESS);
    }

    let coordinator = build_coordinator(&config)?;
    tracing::info!(
        url = %rules.url_str(),
        selectors = rules.selectors.len(),
        "Starting extraction"
    );

    let extraction = coordinator.extract(&mut rules).await?;
    println!("{}", serde_json::to_string_pretty(&extraction.output_value())?);

    match &extraction.errors {
        Some(errs) => {
            tracing::warn!("{} selector(s) failed", errs.len());
            eprintln!("{}", serde_json::to_string_pretty(errs)?);
            Ok(ExitCode::FAILURE)
        }
        None => {
            tracing::info!("Extraction completed successfully");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Reads a rule set from a JSON file
fn load_rules(path: &Path) -> anyhow::Result<RuleSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rule set {}", path.display()))?;
    let raw: Map<String, Value> = serde_json::from_str(&content)
        .with_context(|| format!("Rule set {} is not a JSON object", path.display()))?;

    Ok(RuleSet::from_raw(raw)?)
}

/// Handles the --dry-run mode: shows what would be requested
fn handle_dry_run(config: &Config, rules: &RuleSet) {
    println!("=== Trawl Dry Run ===\n");

    println!("Client:");
    println!("  User-Agent: {}", config.client.user_agent);
    println!("  Timeout: {}ms", config.client.timeout_ms);

    println!("\nPoliteness:");
    println!("  Respect robots.txt: {}", config.politeness.respect_robots_txt);
    println!("  Robots TTL: {}h", config.politeness.robots_ttl_hours);
    println!("  Pacing: {}", config.politeness.pacing);

    println!("\nRequest:");
    println!(
        "  {} {}",
        if rules.method.is_empty() { "GET" } else { rules.method.as_str() },
        rules.url_str()
    );

    println!("\nSelectors ({}):", rules.selectors.len());
    for selector in &rules.selectors {
        print_selector(selector, 1);
    }

    println!("\n✓ Rule set is valid");
}

fn print_selector(selector: &trawl::Selector, depth: usize) {
    let mut flags = Vec::new();
    if selector.all {
        flags.push("all");
    }
    if selector.follow {
        flags.push("follow");
    }

    println!(
        "{}- {}: {} [{}]{}",
        "  ".repeat(depth),
        selector.name,
        selector.expr,
        if selector.expr_type.as_str().is_empty() {
            "default"
        } else {
            selector.expr_type.as_str()
        },
        if flags.is_empty() {
            String::new()
        } else {
            format!(" ({})", flags.join(", "))
        }
    );

    for nested in &selector.selectors {
        print_selector(nested, depth + 1);
    }
}

/// Writes aggregated rule errors as JSON on stderr
fn report_error(err: &anyhow::Error) {
    if let Some(errs) = err.downcast_ref::<TrawlError>().and_then(TrawlError::as_aggregate) {
        if let Ok(json) = serde_json::to_string_pretty(errs) {
            eprintln!("{}", json);
        }
    }
}
