use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lantern_core::config::Config;
use lantern_core::core_discovery::{
    Classification, Classifier, DirectEndpoint, InfoReport, LivenessProber, TcpProber,
};
use lantern_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "lantern")]
#[command(author, version, about = "Inspect and exercise the Lantern discovery engine", long_about = None)]
struct Args {
    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Configuration file (defaults to ./lantern.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify an announced identifier relative to our own
    Classify {
        /// Candidate identifier, e.g. `alice@example.com/-lan-1` or `10.0.0.5:8080`
        candidate: String,

        /// Our full identifier
        #[arg(long = "self", value_name = "IDENTIFIER")]
        self_identifier: String,
    },

    /// Check whether a direct proxy accepts TCP connections
    Probe {
        /// `host:port` to dial
        address: String,

        /// Connect timeout in seconds (defaults to the configured probe timeout)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Validate the configuration and print it
    Config,

    /// Print an empty status report for the configured country
    Report,
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            let expanded = shellexpand::tilde(path);
            let path = PathBuf::from(expanded.as_ref());
            debug!(path = %path.display(), "Loading configuration file");
            Config::from_file(&path).with_context(|| format!("loading {}", path.display()))
        }
        None => {
            let default = Config::default_path();
            if default.exists() {
                debug!(path = %default.display(), "Loading default configuration file");
                Config::from_file(&default).with_context(|| format!("loading {}", default.display()))
            } else {
                Config::from_env().context("reading configuration from environment")
            }
        }
    }
}

fn classify(config: &Config, self_identifier: &str, candidate: &str) -> serde_json::Value {
    let classifier = Classifier::new(
        self_identifier,
        config.discovery.cloud_markers.clone(),
        config.discovery.server_managed_port,
    );

    match classifier.classify(candidate) {
        Ok(classification) => {
            let kind = classification.kind().as_str();
            match classification {
                Classification::SelfIdentity => json!({ "kind": kind }),
                Classification::ServerManaged(endpoint) | Classification::GeneralDirect(endpoint) => json!({
                    "kind": kind,
                    "host": endpoint.host(),
                    "port": endpoint.port(),
                }),
                Classification::TrustedPeer(peer) | Classification::AnonymousPeer(peer) => json!({
                    "kind": kind,
                    "peer": peer.as_str(),
                }),
            }
        }
        Err(e) => json!({ "kind": "rejected", "reason": e.to_string() }),
    }
}

async fn probe(address: &str, timeout: Duration) -> Result<bool> {
    let endpoint = DirectEndpoint::parse(address).with_context(|| format!("parsing {}", address))?;
    let prober = TcpProber::new(timeout);

    match prober.probe(&endpoint).await {
        Ok(()) => {
            info!(address = %endpoint, "Proxy reachable");
            Ok(true)
        }
        Err(e) => {
            warn!(address = %endpoint, error = %e, "Proxy unreachable");
            Ok(false)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;

    let mut log_config = LogConfig::try_from(&config.logging)?;
    if let Some(level) = &args.log_level {
        log_config = match level.parse::<LogLevel>() {
            Ok(level) => LogConfig { level, ..log_config },
            Err(e) => {
                eprintln!("{}, keeping '{}'", e, log_config.level);
                log_config
            }
        };
    }
    init_logging_with_config(log_config.json_format(args.json_logs || config.logging.json_format))?;

    match args.command {
        Command::Classify {
            candidate,
            self_identifier,
        } => {
            let verdict = classify(&config, &self_identifier, &candidate);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
        Command::Probe { address, timeout } => {
            let timeout = timeout
                .map(Duration::from_secs)
                .unwrap_or(config.discovery.probe_timeout);
            let reachable = probe(&address, timeout).await?;
            println!("{}", json!({ "address": address, "reachable": reachable }));
            if !reachable {
                std::process::exit(1);
            }
        }
        Command::Config => {
            let mut shown = config.clone();
            if !shown.account.password.is_empty() {
                shown.account.password = "********".to_string();
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        Command::Report => {
            let report = InfoReport {
                country_code: config.account.country_code.clone(),
                version: config.discovery.version.clone(),
                ..Default::default()
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
