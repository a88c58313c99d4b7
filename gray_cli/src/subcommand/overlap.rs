//! The `overlap` subcommand: a geometric self-check, not a physics run.

use anyhow::Result;
use clap::Args;
use gray::scene::OverlapTestConfig;

use super::Subcommand;
use crate::{demo_scene, GlobalArgs};

/// Builds the demo scene and runs its k-d tree overlap self-test.
#[derive(Args)]
pub struct Overlap {
    /// Probe rays cast per axis direction (6 directions total).
    #[arg(long, default_value_t = 400)]
    pub probes_per_axis: usize,
}

impl Subcommand for Overlap {
    fn execute(&self, global: &GlobalArgs) -> Result<i32> {
        let (scene, _sources, _isotopes) = demo_scene::build(global.n_detectors, &global.kdtree_config());

        let config = OverlapTestConfig::default()
            .with_probes_per_axis(self.probes_per_axis)
            .with_failure_threshold(global.overlap_threshold);

        let result = scene.overlap_self_test(&config);
        println!(
            "overlap self-test: {}/{} probe rays failed ({:.4}% > {:.4}% threshold)",
            result.failed_rays,
            result.total_rays,
            result.failure_rate() * 100.0,
            global.overlap_threshold * 100.0,
        );

        if result.exceeds(&config) {
            tracing::warn!(failure_rate = result.failure_rate(), "scene failed overlap self-test");
            Ok(1)
        } else {
            Ok(0)
        }
    }
}
