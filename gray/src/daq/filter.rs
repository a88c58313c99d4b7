//! Energy-window and detector-presence gate.

use super::{Stage, StageStats};
use crate::photon::Interaction;

/// Drops events whose deposited energy falls outside `[energy_lo_mev,
/// energy_hi_mev]`, or (if `require_detector` is set) that carry no
/// detector id at all. Already-dropped events pass through unexamined.
pub struct Filter {
    energy_lo_mev: f64,
    energy_hi_mev: f64,
    require_detector: bool,
    stats: StageStats,
}

impl Filter {
    /// Builds an energy-window filter stage.
    #[must_use]
    pub fn new(energy_lo_mev: f64, energy_hi_mev: f64, require_detector: bool) -> Self {
        Self {
            energy_lo_mev,
            energy_hi_mev,
            require_detector,
            stats: StageStats::default(),
        }
    }
}

impl Stage for Filter {
    fn process(&mut self, mut events: Vec<Interaction>) -> Vec<Interaction> {
        for event in &mut events {
            if event.dropped {
                self.stats.record(true);
                continue;
            }
            let out_of_window = event.energy_deposit < self.energy_lo_mev || event.energy_deposit > self.energy_hi_mev;
            let missing_detector = self.require_detector && event.detector_id.is_none();
            if out_of_window || missing_detector {
                event.dropped = true;
            }
            self.stats.record(event.dropped);
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

    fn make(energy: f64, detector_id: Option<usize>) -> Interaction {
        Interaction {
            kind: InteractionKind::Compton,
            time: 0.0,
            position: DVec3::ZERO,
            energy_deposit: energy,
            colour: Colour::Blue,
            decay_id: 0,
            source_id: 0,
            material_id: 0,
            detector_id,
            scatter: ScatterCounters::default(),
            coincidence: CoincidenceState::Untouched,
            dropped: false,
        }
    }

    #[test]
    fn drops_events_outside_energy_window() {
        let mut filter = Filter::new(0.4, 0.6, false);
        let out = filter.process(vec![make(0.1, Some(0)), make(0.5, Some(0))]);
        assert!(out[0].dropped);
        assert!(!out[1].dropped);
    }

    #[test]
    fn requires_detector_when_configured() {
        let mut filter = Filter::new(0.0, 1.0, true);
        let out = filter.process(vec![make(0.5, None)]);
        assert!(out[0].dropped);
    }
}
