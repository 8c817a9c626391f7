//! graphsync simulator
//!
//! Runs a scripted editing session across several in-process replicas and
//! prints the graph they converge on.
//!
//! Usage:
//!   graphsync-sim --replicas 3 --nodes 5 --offline

use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use graphsync_sim::{Scenario, run};
use graphsync_sync::SessionConfig;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "graphsync-sim")]
#[command(about = "Simulate replicas editing one shared graph")]
struct Args {
    /// Number of replicas
    #[arg(short, long, default_value = "3")]
    replicas: usize,

    /// Nodes in the initial chain
    #[arg(short, long, default_value = "4")]
    nodes: usize,

    /// Room to join (overrides the config file)
    #[arg(long)]
    room: Option<String>,

    /// Session config as JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Take one replica offline mid-run
    #[arg(long)]
    offline: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => SessionConfig::default(),
    };
    if let Some(room) = args.room {
        config.room = room;
    }

    info!(
        "simulating {} replica(s) in room {}",
        args.replicas, config.room
    );
    let outcome = run(&Scenario {
        replicas: args.replicas,
        nodes: args.nodes,
        offline: args.offline,
        config,
    })?;

    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to encode outcome")?
    );
    if !outcome.converged {
        bail!("replicas did not converge");
    }
    Ok(())
}

fn load_config(path: &PathBuf) -> Result<SessionConfig> {
    info!("Loading session config from {:?}", path);
    let text = fs::read_to_string(path).context("Failed to read config file")?;
    serde_json::from_str(&text).context("Failed to parse config file")
}
