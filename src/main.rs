use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use vsnet_broker::domain::scheduler::LoggingAllocator;
use vsnet_broker::{build_clock, build_network, build_scheduler, load_config, logger};

/// Virtual network bandwidth broker with a rule-driven transfer scheduler.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Args {
    /// YAML configuration file.
    #[clap(long)]
    config: PathBuf,

    /// Write the connection history as CSV on shutdown.
    #[clap(long)]
    history: Option<PathBuf>,

    /// Stop after this many virtual seconds even if rules are still running.
    #[clap(long)]
    run_for: Option<f64>,
}

const IDLE_POLL: Duration = Duration::from_millis(50);

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init();

    let config = load_config(&args.config).with_context(|| format!("loading configuration '{}'", args.config.display()))?;
    let clock = build_clock(&config.network).context("building the virtual clock")?;
    let network = Arc::new(build_network(&args.config, &config.network, clock.clone()).context("building the network")?);
    let scheduler = build_scheduler(&config.scheduler, network.clone(), Arc::new(LoggingAllocator), clock.clone()).context("building the scheduler")?;

    let started_at = clock.now();
    scheduler.start().context("starting the scheduler threads")?;

    loop {
        if scheduler.is_idle() {
            log::info!("All rules staged and drained.");
            break;
        }
        if args.run_for.is_some_and(|limit| clock.now() - started_at >= limit) {
            log::info!("Run time limit reached.");
            break;
        }
        thread::sleep(IDLE_POLL);
    }

    scheduler.close();
    network.close().context("closing the network")?;

    let statistics = network.statistics();
    log::info!(
        "Connections created: {}, finished: {}, closed: {}; distributions: {} ({} pass-limit hits).",
        statistics.connections_created,
        statistics.connections_finished,
        statistics.connections_closed,
        statistics.distributions,
        statistics.pass_limit_hits
    );

    if let Some(path) = &args.history {
        network.write_history_csv(path).with_context(|| format!("writing history to '{}'", path.display()))?;
    }

    Ok(())
}
