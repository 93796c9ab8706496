//! `ridesim`: run one seeded simulation from a config file and write its
//! output CSVs.

use std::process::ExitCode;

use bevy_ecs::prelude::World;
use clap::Parser;
use tracing::{error, info};

use sim_core::config::SimConfig;
use sim_core::runner::{run_to_completion, simulation_schedule};
use sim_core::telemetry::SimTelemetry;
use sim_core::{output, scenario};

#[derive(Debug, Parser)]
#[command(name = "ridesim", about = "Ride-hailing market discrete-event simulator")]
struct Cli {
    /// Path to the scenario's JSON configuration file.
    config: String,

    /// PRNG seed; two runs with the same seed and config produce identical output.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = SimConfig::load(&cli.config)?;
    info!(path = %cli.config, "loaded scenario configuration");

    let mut world = World::new();
    scenario::build_scenario(&mut world, config.clone(), cli.seed)?;
    info!(seed = cli.seed, "scenario built, starting event loop");

    let mut schedule = simulation_schedule();
    run_to_completion(&mut world, &mut schedule);
    info!("event loop drained");

    let telemetry = world.resource::<SimTelemetry>();
    output::write_all(&config, telemetry)?;
    info!(path = %config.data_output_path, "wrote output CSVs");

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "simulation run failed");
            ExitCode::FAILURE
        }
    }
}
