#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that replays a lava stabilization scenario.

mod render;
mod scenario;
mod simulation;

use std::{io, path::PathBuf};

use anyhow::{ensure, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lava_stabilization_system_stabilization::METADATA;

use crate::{
    scenario::{Scenario, DEFAULT_SCENARIO},
    simulation::Simulation,
};

/// Runs lava stabilization against a scripted voxel world.
#[derive(Debug, Parser)]
#[command(name = "lava-stabilization", version, about)]
struct Cli {
    /// Scenario file; the bundled lava lake is used when omitted.
    #[arg(long, value_name = "FILE")]
    scenario: Option<PathBuf>,
    /// Overrides the number of ticks declared by the scenario.
    #[arg(long)]
    ticks: Option<u64>,
    /// Prints a frame every N ticks; zero disables rendering.
    #[arg(long, default_value_t = 0)]
    render_every: u64,
    /// Log filter directive, e.g. `debug` or `lava_stabilization_system_stabilization=trace`.
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,
    /// Prints the ability metadata and exits.
    #[arg(long)]
    describe: bool,
}

/// Entry point for the lava stabilization command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    if cli.describe {
        println!(
            "{} v{} by {}: {}",
            METADATA.name, METADATA.version, METADATA.author, METADATA.description
        );
        println!(
            "cooldown {:?}, harmless {}, sneak {}",
            METADATA.cooldown, METADATA.harmless, METADATA.sneak
        );
        return Ok(());
    }

    let scenario = match &cli.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::parse(DEFAULT_SCENARIO)?,
    };
    let ticks = cli.ticks.unwrap_or(scenario.ticks);
    info!(ticks, actors = scenario.actors.len(), "starting simulation");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = Simulation::new(scenario).run(ticks, cli.render_every, &mut out)?;

    println!(
        "ticks {}, activations {}, denied {}, deactivations {}, magma remaining {}",
        summary.ticks,
        summary.activations,
        summary.denied,
        summary.deactivations.len(),
        summary.magma_remaining
    );
    for entry in &summary.deactivations {
        println!(
            "  actor {} stopped {} ({:?})",
            entry.actor.get(),
            entry.ability,
            entry.reason
        );
    }
    ensure!(
        summary.magma_remaining == 0,
        "{} magma blocks survived shutdown",
        summary.magma_remaining
    );
    Ok(())
}

fn init_tracing(filter: Option<&str>) {
    let filter = filter
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(EnvFilter::from_default_env);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
