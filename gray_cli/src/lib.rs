//! Shared CLI plumbing for the `gray` demonstration binary: global
//! configuration and the enum-dispatched subcommand trait.
#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]

mod demo_scene;
pub mod subcommand;

use anyhow::Result;
use clap::{Args, Parser, Subcommand as ClapSubcommand, ValueEnum};
use gray::kdtree::KdTreeConfig;

use subcommand::{Overlap, Run};

/// Top-level CLI arguments: global flags plus one subcommand.
#[derive(Parser)]
#[command(name = "gray", about = "Monte Carlo photon-transport demonstration driver", version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every subcommand.
#[derive(Args, Clone)]
pub struct GlobalArgs {
    /// RNG seed.
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
    /// K-d tree SAH per-object traversal cost.
    #[arg(long, default_value_t = 8.0)]
    pub object_cost: f64,
    /// Maximum primitives per k-d tree leaf.
    #[arg(long, default_value_t = 4)]
    pub max_leaf_size: usize,
    /// Overlap self-test failure-rate threshold.
    #[arg(long, default_value_t = 0.001)]
    pub overlap_threshold: f64,
    /// Number of detector blocks in the demo ring.
    #[arg(long, default_value_t = 24)]
    pub n_detectors: usize,
    /// Raises the tracing filter to `debug`.
    #[arg(short, long)]
    pub verbose: bool,
}

impl GlobalArgs {
    #[must_use]
    pub fn kdtree_config(&self) -> KdTreeConfig {
        KdTreeConfig::default()
            .with_object_cost(self.object_cost)
            .with_max_leaf_size(self.max_leaf_size)
    }

    pub fn init_tracing(&self) {
        let filter = if self.verbose { "debug" } else { "info" };
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

/// The demonstration subcommands.
#[derive(ClapSubcommand)]
pub enum Command {
    /// Run decays through transport and the DAQ pipeline, printing statistics.
    Run(Run),
    /// Run the k-d tree overlap self-test on the demo scene.
    Overlap(Overlap),
}

/// How a simulation run's extent is specified, mirrored in `--until`.
#[derive(Clone, Copy, ValueEnum)]
pub enum RunUntil {
    /// Run a fixed number of decays.
    Decays,
    /// Run until a fixed simulated time.
    Time,
}

/// Runs `cli`, returning the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    cli.global.init_tracing();
    subcommand::dispatch(cli.command, &cli.global)
}
