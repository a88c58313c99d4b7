//! The `run` subcommand: decays through transport and the DAQ pipeline.

use anyhow::Result;
use clap::Args;

use gray::daq::{BlurEnergy, BlurTime, Coincidence, Deadtime, Filter, Merge, MergeMode, Pipeline, StageEnum};
use gray::rng::Rng;
use gray::scheduler::Scheduler;
use gray::transport::{self, TraceStats, TransportConfig};

use super::Subcommand;
use crate::{demo_scene, GlobalArgs, RunUntil};

/// Runs a configured amount of simulated activity through transport and
/// the DAQ pipeline, printing the resulting statistics.
#[derive(Args)]
pub struct Run {
    /// Whether `--count`/`--seconds` bounds the run.
    #[arg(long, value_enum, default_value = "decays")]
    pub until: RunUntil,
    /// Number of decays to simulate, when `--until decays`.
    #[arg(long, default_value_t = 10_000)]
    pub count: u64,
    /// Simulated seconds to run, when `--until time`.
    #[arg(long, default_value_t = 1.0)]
    pub seconds: f64,
}

impl Subcommand for Run {
    fn execute(&self, global: &GlobalArgs) -> Result<i32> {
        let (scene, sources, isotopes) = demo_scene::build(global.n_detectors, &global.kdtree_config());
        let diameter_cm = (scene.bounds().max() - scene.bounds().min()).length();

        let mut rng = Rng::new(global.seed);
        let mut scheduler = Scheduler::new(&sources, &isotopes, &mut rng);
        let transport_config = TransportConfig::default();
        let mut stats = TraceStats::default();

        let mut pipeline = Pipeline::new(
            diameter_cm,
            vec![
                StageEnum::BlurEnergy(BlurEnergy::new(0.1, 0.511, global.seed.wrapping_add(1))),
                StageEnum::BlurTime(BlurTime::new(300e-12, global.seed.wrapping_add(2))),
                StageEnum::Merge(Merge::new(MergeMode::Max, 10e-9)),
                StageEnum::Deadtime(Deadtime::new(100e-9, true)),
                StageEnum::Filter(Filter::new(0.35, 0.65, true)),
                StageEnum::Coincidence(Coincidence::new(6e-9, 0.0, false, true)),
            ],
        );

        let mut kept_events = 0usize;
        let mut decays_run = 0u64;
        loop {
            let done = match self.until {
                RunUntil::Decays => decays_run >= self.count,
                RunUntil::Time => false,
            };
            if done {
                break;
            }

            let Some(decay) = scheduler.decay(&mut rng) else {
                break;
            };
            if matches!(self.until, RunUntil::Time) && decay.time > self.seconds {
                break;
            }

            let source = &sources[decay.source_id];
            let interactions = transport::trace_decay(&scene, &decay, source, &transport_config, &mut rng, &mut stats);
            let out = pipeline.process(interactions);
            kept_events += out.iter().filter(|e| !e.dropped).count();
            decays_run += 1;
        }
        let tail = pipeline.stop();
        kept_events += tail.iter().filter(|e| !e.dropped).count();

        println!("decays traced:     {}", stats.decays_traced);
        println!("photons traced:    {}", stats.photons_traced);
        println!("compton:           {}", stats.compton);
        println!("photoelectric:     {}", stats.photoelectric);
        println!("rayleigh:          {}", stats.rayleigh);
        println!("no_interaction:    {}", stats.no_interaction);
        println!("errors:            {}", stats.error);
        println!("DAQ events kept:   {kept_events}");
        println!();
        println!("DAQ per-stage statistics:");
        for (i, s) in pipeline.stats().iter().enumerate() {
            println!("  stage {i}: events={} kept={} dropped={}", s.no_events, s.no_kept, s.no_dropped);
        }

        Ok(0)
    }
}
