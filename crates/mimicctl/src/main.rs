//! Mimic simulation CLI
//!
//! Validates simulation files, shows what the match cache would hold, and
//! resolves single requests against a simulation without running a proxy.
//!
//! Usage:
//!   mimicctl [--config <file>] [--verbose] <command> [OPTIONS]

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use hyper::Uri;
use mimic_core::config::read_simulation;
use mimic_core::{CoreConfig, MatchSource, Mode, RequestDetails, SimulationRegistry};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Mimic simulation tool
#[derive(Parser, Debug)]
#[command(name = "mimicctl")]
#[command(author, version, about = "Validate, inspect and query Mimic simulations")]
struct Cli {
    /// Core configuration file (YAML)
    #[arg(short, long, global = true, env = "MIMIC_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that every matcher in a simulation compiles
    Validate {
        /// Simulation file (JSON, or YAML by extension)
        simulation: PathBuf,
    },

    /// Print the match cache a simulation produces
    Cache {
        /// Simulation file; defaults to the one in the config
        simulation: Option<PathBuf>,

        /// Mode to switch to after import
        #[arg(short, long, default_value = "simulate")]
        mode: Mode,
    },

    /// Resolve one request against a simulation
    Resolve {
        /// Absolute request URL, e.g. http://example.com/path?a=1
        url: String,

        /// Simulation file; defaults to the one in the config
        #[arg(short, long)]
        simulation: Option<PathBuf>,

        /// Request method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(short, long, default_value = "")]
        body: String,
    },

    /// Re-export a simulation in canonical form
    Export {
        /// Simulation file; defaults to the one in the config
        simulation: Option<PathBuf>,

        /// Output file; stdout when omitted. YAML when it ends in .yaml/.yml
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match cli.config {
        Some(ref path) => CoreConfig::from_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => CoreConfig::default(),
    };
    debug!(?config, "Loaded configuration");

    match cli.command {
        Command::Validate { simulation } => cmd_validate(&simulation),
        Command::Cache { simulation, mode } => cmd_cache(config, simulation, mode),
        Command::Resolve {
            url,
            simulation,
            method,
            headers,
            body,
        } => {
            let request = build_request(&url, &method, &headers, body)?;
            cmd_resolve(config, simulation, &request)
        }
        Command::Export { simulation, output } => cmd_export(config, simulation, output),
    }
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_validate(path: &Path) -> anyhow::Result<()> {
    let view = read_simulation(path)?;
    let rules = view.to_rules()?;

    let reducible = rules
        .iter()
        .filter(|r| r.matcher.reduce_to_fingerprint().is_some())
        .count();
    println!(
        "{}: {} pair(s), {} cacheable, {} resolved by scan",
        path.display(),
        rules.len(),
        reducible,
        rules.len() - reducible
    );
    Ok(())
}

fn cmd_cache(config: CoreConfig, simulation: Option<PathBuf>, mode: Mode) -> anyhow::Result<()> {
    let registry = load_registry(config, simulation)?;
    registry.set_mode(mode);
    println!("{}", serde_json::to_string_pretty(&registry.cache_view())?);
    Ok(())
}

fn cmd_resolve(
    config: CoreConfig,
    simulation: Option<PathBuf>,
    request: &RequestDetails,
) -> anyhow::Result<()> {
    let registry = load_registry(config, simulation)?;

    let output = match registry.resolve_match(request) {
        Some(resolution) => json!({
            "matched": true,
            "rule_index": resolution.rule_index,
            "source": match resolution.source {
                MatchSource::Cache => "cache",
                MatchSource::Scan => "scan",
            },
            "response": &*resolution.response,
        }),
        None => json!({ "matched": false }),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn cmd_export(
    config: CoreConfig,
    simulation: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let registry = load_registry(config, simulation)?;
    let view = registry.export();

    match output {
        Some(path) => {
            let contents = if is_yaml(&path) {
                serde_yaml::to_string(&view)?
            } else {
                serde_json::to_string_pretty(&view)?
            };
            std::fs::write(&path, contents)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            println!("Exported {} pair(s) to {}", view.pairs().len(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&view)?),
    }
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

fn load_registry(
    mut config: CoreConfig,
    simulation: Option<PathBuf>,
) -> anyhow::Result<SimulationRegistry> {
    if simulation.is_some() {
        config.simulation = simulation;
        config.validate()?;
    }
    if config.simulation.is_none() {
        bail!("No simulation given and none configured");
    }
    SimulationRegistry::from_config(&config)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

/// Build request details from an absolute URL.
fn build_request(
    url: &str,
    method: &str,
    headers: &[String],
    body: String,
) -> anyhow::Result<RequestDetails> {
    let uri: Uri = url
        .parse()
        .with_context(|| format!("Invalid URL '{url}'"))?;
    let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) else {
        bail!("URL '{url}' must be absolute (scheme and host)");
    };

    let mut request = RequestDetails::new(
        method.to_ascii_uppercase(),
        scheme,
        authority.as_str(),
        uri.path(),
    )
    .with_query(uri.query().unwrap_or_default())
    .with_body(body);

    for header in headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("Header '{header}' must look like 'Name: value'");
        };
        request = request.with_header(name.trim(), value.trim());
    }
    Ok(request)
}
