//! Energy- and timing-resolution blur stages.

use super::{Stage, StageStats};
use crate::isotope::FWHM_TO_SIGMA;
use crate::photon::Interaction;
use crate::rng::Rng;

/// Smears each event's deposited energy by a Gaussian whose width scales
/// with `sqrt(energy)`, the usual scintillator counting-statistics model:
/// a detector specified to have `fwhm_fraction` energy resolution at
/// `reference_energy_mev` has `sigma(E) = FWHM_TO_SIGMA * fwhm_fraction *
/// sqrt(reference_energy_mev * E)`.
pub struct BlurEnergy {
    fwhm_fraction: f64,
    reference_energy_mev: f64,
    rng: Rng,
    stats: StageStats,
}

impl BlurEnergy {
    /// Builds an energy-blur stage, seeded independently of the transport RNG.
    #[must_use]
    pub fn new(fwhm_fraction: f64, reference_energy_mev: f64, seed: u64) -> Self {
        Self {
            fwhm_fraction,
            reference_energy_mev,
            rng: Rng::new(seed),
            stats: StageStats::default(),
        }
    }

    fn sigma_at(&self, energy_mev: f64) -> f64 {
        FWHM_TO_SIGMA * self.fwhm_fraction * (self.reference_energy_mev * energy_mev.max(0.0)).sqrt()
    }
}

impl Stage for BlurEnergy {
    fn process(&mut self, mut events: Vec<Interaction>) -> Vec<Interaction> {
        for e in &mut events {
            self.stats.record(e.dropped);
            if e.dropped {
                continue;
            }
            let sigma = self.sigma_at(e.energy_deposit);
            e.energy_deposit = (e.energy_deposit + self.rng.gaussian_with(0.0, sigma)).max(0.0);
        }
        events
    }

    fn stats(&self) -> StageStats {
        self.stats
    }
}

/// Smears each event's time by a fixed Gaussian, modelling the scanner's
/// coincidence timing resolution. The pipeline builder automatically
/// follows any [`BlurTime`] stage with a compensating sort stage sized to
/// `6 * sigma_t`, since the blur can reorder events the sort stage ahead
/// of it had already settled.
pub struct BlurTime {
    sigma_t_s: f64,
    rng: Rng,
    stats: StageStats,
}

impl BlurTime {
    /// Builds a time-blur stage with standard deviation `sigma_t_s` seconds.
    #[must_use]
    pub fn new(sigma_t_s: f64, seed: u64) -> Self {
        Self {
            sigma_t_s,
            rng: Rng::new(seed),
            stats: StageStats::default(),
        }
    }

    /// The blur's standard deviation, used by the pipeline builder to size
    /// the compensating sort stage's window.
    #[must_use]
    pub const fn sigma_t(&self) -> f64 {
        self.sigma_t_s
    }
}

impl Stage for BlurTime {
    fn process(&mut self, mut events: Vec<Interaction>) -> Vec<Interaction> {
        for e in &mut events {
            self.stats.record(e.dropped);
            if e.dropped {
                continue;
            }
            e.time += self.rng.gaussian_with(0.0, self.sigma_t_s);
        }
        events
    }

    fn stats(&self) -> StageStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photon::{Colour, CoincidenceState, InteractionKind, ScatterCounters};
    use glam::DVec3;

    fn make(energy: f64, time: f64, dropped: bool) -> Interaction {
        Interaction {
            kind: InteractionKind::Compton,
            time,
            position: DVec3::ZERO,
            energy_deposit: energy,
            colour: Colour::Blue,
            decay_id: 0,
            source_id: 0,
            material_id: 0,
            detector_id: Some(0),
            scatter: ScatterCounters::default(),
            coincidence: CoincidenceState::Untouched,
            dropped,
        }
    }

    #[test]
    fn zero_resolution_energy_blur_is_a_no_op() {
        let mut blur = BlurEnergy::new(0.0, 0.511, 1);
        let out = blur.process(vec![make(0.3, 0.0, false)]);
        assert_eq!(out[0].energy_deposit, 0.3);
    }

    #[test]
    fn dropped_events_pass_through_untouched() {
        let mut blur = BlurEnergy::new(0.2, 0.511, 2);
        let out = blur.process(vec![make(0.3, 0.0, true)]);
        assert_eq!(out[0].energy_deposit, 0.3);
        assert_eq!(blur.stats().no_dropped, 1);
    }

    #[test]
    fn time_blur_perturbs_event_time() {
        let mut blur = BlurTime::new(1e-9, 3);
        let out = blur.process(vec![make(0.3, 10.0, false)]);
        assert_ne!(out[0].time, 10.0);
        assert!((out[0].time - 10.0).abs() < 1e-7);
    }
}
