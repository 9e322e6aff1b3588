// Simulator binary - builds the topology from the three startup integers and
// keeps it alive until Ctrl+C, printing a status block at a fixed period.

use anyhow::Result;
use clap::Parser;
use dispatchq::{SimConfig, Topology};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Group-partitioned service facility simulator.
#[derive(Parser, Debug)]
#[command(name = "dispatchq", version)]
struct Cli {
    /// Number of device groups (must be greater than 2)
    #[arg(value_parser = clap::value_parser!(u32).range(3..))]
    groups: u32,
    /// Devices per group (must be greater than 2)
    #[arg(value_parser = clap::value_parser!(u32).range(3..))]
    devices_per_group: u32,
    /// Capacity of the shared dispatch queue (must be greater than 0)
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    queue_capacity: u64,
    /// Device countdown tick in milliseconds
    #[arg(long, default_value_t = 3000, value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,
    /// Seconds between status reports
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u64).range(1..))]
    status_every: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = SimConfig::default();
    config.shape.group_count = cli.groups;
    config.shape.devices_per_group = cli.devices_per_group;
    config.shape.queue_capacity = cli.queue_capacity as usize;
    config.service.tick = Duration::from_millis(cli.tick_ms);

    let mut topology = Topology::new(config)?;
    let shutdown = topology.shutdown_token();
    let handler_token = shutdown.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;

    topology.start();
    info!("simulation running, Ctrl+C to stop");

    let status_every = Duration::from_secs(cli.status_every);
    loop {
        println!("{}", topology.snapshot());
        if shutdown.wait_for(status_every) {
            break;
        }
    }

    topology.stop();
    let summary = topology.metrics_snapshot();
    info!(
        generated = summary.generated,
        skipped_full = summary.skipped_full,
        dispatched = summary.dispatched,
        completed = summary.completed,
        discarded = summary.discarded,
        "simulation finished"
    );
    Ok(())
}
