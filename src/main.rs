//! Edge gateway CLI.
//!
//! # Overview
//!
//! ```text
//!   edge-gateway.toml
//!         │
//!         ▼
//!   ┌──────────┐    ┌──────────┐    ┌─────────────┐    ┌──────────────┐
//!   │  config  │───▶│ routing  │───▶│ synthesizer │───▶│ transaction  │───▶ draft version
//!   │ + deploy │    │ weights  │    │ logic units │    │ layered plan │
//!   └──────────┘    └──────────┘    └─────────────┘    └──────────────┘
//! ```
//!
//! - `render` prints the logic units
//! - `simulate` runs random requests through the in-process selection
//! - `deploy` stages everything into a draft, optionally activating it

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::Rng;

use edge_gateway::config::load_config;
use edge_gateway::gateway::{Synthesizer, TransactionalDeployer};
use edge_gateway::observability;
use edge_gateway::platform::FastlyClient;
use edge_gateway::routing::selection::{RequestContext, DRAW_RANGE};

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "Compile weighted backend routing into edge logic and deploy it", long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "edge-gateway.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the synthesized logic units
    Render,
    /// Run random requests through the selection and print the split
    Simulate {
        #[arg(short = 'n', long, default_value_t = 10_000)]
        requests: u32,
        /// Deployer to treat as unhealthy (repeatable)
        #[arg(long)]
        unhealthy: Vec<String>,
        /// Pin every request to this deployer through the override header
        #[arg(long)]
        lock: Option<String>,
    },
    /// Stage the routing set into a draft service version
    Deploy {
        /// Activate the draft once it is ready
        #[arg(long)]
        activate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    observability::init(&config.observability);

    tracing::info!(
        config = %cli.config.display(),
        deployers = config.deployers.len(),
        ready = config.gateway.ready(),
        "Configuration loaded"
    );

    let deployers = config.build_deployers()?;
    let lock_header = config.gateway.version_lock_header.clone();

    match cli.command {
        Commands::Render => {
            let bundle = Synthesizer::vcl(lock_header).synthesize(&deployers, &config.priorities)?;
            for unit in &bundle.units {
                println!("# {} ({})", unit.name, unit.phase);
                println!("{}", unit.content);
            }
        }
        Commands::Simulate {
            requests,
            unhealthy,
            lock,
        } => {
            let bundle = Synthesizer::vcl(lock_header).synthesize(&deployers, &config.priorities)?;
            let health: Vec<bool> = deployers
                .iter()
                .map(|d| !unhealthy.iter().any(|u| u.eq_ignore_ascii_case(d.name())))
                .collect();
            let lock_value = lock.map(|name| format!("env={}", name.to_lowercase()));

            let mut rng = rand::thread_rng();
            let mut counts: BTreeMap<String, u32> = BTreeMap::new();
            let mut fallbacks = 0u32;
            for _ in 0..requests {
                let selection = bundle.selection.select(RequestContext {
                    draw: rng.gen_range(0..DRAW_RANGE),
                    health: &health,
                    version_lock: lock_value.as_deref(),
                });
                if selection.fallback {
                    fallbacks += 1;
                }
                *counts.entry(selection.name).or_default() += 1;
            }

            for candidate in bundle.selection.candidates() {
                let hits = counts.get(&candidate.name).copied().unwrap_or(0);
                let share = if requests == 0 {
                    0.0
                } else {
                    f64::from(hits) * 100.0 / f64::from(requests)
                };
                println!(
                    "{:<16} weight={:<4} threshold={:<4} hits={:<8} share={:.1}%",
                    candidate.name, candidate.weight, candidate.threshold, hits, share
                );
            }
            println!("fallback hits: {fallbacks}");
        }
        Commands::Deploy { activate } => {
            let Some(client) = FastlyClient::from_config(&config.gateway)? else {
                tracing::warn!("Gateway configuration incomplete; nothing deployed");
                return Ok(());
            };
            let check_path = config.gateway.check_path.clone().unwrap_or_default();
            let deployer = TransactionalDeployer::new(&client, check_path, lock_header);

            let report = deployer.deploy(&deployers, &config.priorities).await?;
            println!(
                "draft version {} ready: {} resources written, {} backends updated",
                report.version,
                report.written.len(),
                report.updated_existing.len()
            );

            if activate {
                deployer.activate(&report).await?;
                println!("version {} activated", report.version);
            }
        }
    }

    Ok(())
}
