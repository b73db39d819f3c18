//! Scenario harness
//!
//! Runs the discovery engine against in-memory collaborators and prints what
//! it did as JSON. Handy for checking classification and rotation by hand:
//!
//!   test-harness --peers alice@example.org/-lan-1 \
//!       --servers 10.0.0.5:8080,relay@lantern-proxy.appspot.com \
//!       --reachable 10.0.0.5:8080 --rounds 4

use anyhow::{Context, Result};
use clap::Parser;
use lantern_core::core_discovery::{DirectEndpoint, InboundEvent, MessageType, PresenceEvent};
use lantern_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use lantern_core::test_utils::{hub_event, TestEngineBuilder, SELF_ID};
use serde_json::json;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "test-harness")]
#[command(about = "Lantern discovery scenario harness", long_about = None)]
struct Args {
    /// Our full identifier
    #[arg(long, default_value = SELF_ID)]
    self_id: String,

    /// Peers announcing themselves as available
    #[arg(long, value_delimiter = ',')]
    peers: Vec<String>,

    /// Peers the trust oracle vouches for
    #[arg(long, value_delimiter = ',')]
    trusted: Vec<String>,

    /// Servers list sent by the hub
    #[arg(long, value_delimiter = ',')]
    servers: Vec<String>,

    /// `host:port` addresses that pass the liveness probe
    #[arg(long, value_delimiter = ',')]
    reachable: Vec<String>,

    /// Draws taken from each pool
    #[arg(long, default_value = "3")]
    rounds: usize,

    /// Log to stderr while running
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        init_logging_with_config(LogConfig::new(LogLevel::Debug).with_timestamp(false))?;
    }

    let mut builder = TestEngineBuilder::new().with_self_identifier(args.self_id.as_str());
    for address in &args.reachable {
        let endpoint = DirectEndpoint::parse(address).with_context(|| format!("parsing {}", address))?;
        builder = builder.reachable(endpoint.host(), endpoint.port());
    }
    for peer in &args.trusted {
        builder = builder.trusted(peer);
    }

    let harness = builder.build().await?;
    let engine = &harness.engine;
    engine.start().await?;

    for peer in &args.peers {
        let outcome = engine
            .handle_event(InboundEvent::Presence(PresenceEvent::available(peer.as_str())))
            .await;
        info!(peer = %peer, ?outcome, "Presence handled");
    }

    if !args.servers.is_empty() {
        let servers: Vec<&str> = args.servers.iter().map(String::as_str).collect();
        let outcome = engine.handle_event(hub_event(&servers, None)).await;
        info!(?outcome, "Hub servers handled");
    }

    let mut general = Vec::new();
    let mut server_managed = Vec::new();
    let mut trusted = Vec::new();
    let mut anonymous = Vec::new();
    for _ in 0..args.rounds {
        general.extend(engine.general_proxy().map(|e| e.address()));
        server_managed.extend(engine.server_managed_proxy().map(|e| e.address()));
        trusted.extend(engine.trusted_peer_proxy().map(|p| p.as_str().to_string()));
        anonymous.extend(engine.anonymous_peer_proxy().map(|p| p.as_str().to_string()));
    }

    let channel = &harness.memory.channel;
    let summary = json!({
        "self": engine.self_identifier(),
        "pools": engine.pool_sizes(),
        "draws": {
            "general": general,
            "server_managed": server_managed,
            "trusted": trusted,
            "anonymous": anonymous,
        },
        "sent": {
            "info_requests": channel.sent_of_type(MessageType::InfoRequest).len(),
            "info_responses": channel.sent_of_type(MessageType::InfoResponse).len(),
            "errors": channel.sent_of_type(MessageType::Error).len(),
            "reports": channel.sent_plain().len(),
        },
        "probed": harness.prober.probed(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    engine.shutdown();
    Ok(())
}
