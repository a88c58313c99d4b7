//! Per-component dead-time suppression.

use std::collections::HashMap;

use super::{Stage, StageStats};
use crate::photon::Interaction;

/// Models a detector component's electronic dead time after each event.
/// Non-paralyzable dead time only resets on an *accepted* event (so the
/// component's live fraction is deterministic given its true event rate);
/// paralyzable dead time resets on every event that arrives during the
/// dead period too, so a high enough true rate can suppress a component
/// indefinitely.
pub struct Deadtime {
    dead_time_s: f64,
    paralyzable: bool,
    last_event_s: HashMap<usize, f64>,
    stats: StageStats,
}

impl Deadtime {
    /// Builds a dead-time stage.
    #[must_use]
    pub fn new(dead_time_s: f64, paralyzable: bool) -> Self {
        Self {
            dead_time_s,
            paralyzable,
            last_event_s: HashMap::new(),
            stats: StageStats::default(),
        }
    }
}

impl Stage for Deadtime {
    fn process(&mut self, mut events: Vec<Interaction>) -> Vec<Interaction> {
        for event in &mut events {
            let Some(det) = event.detector_id else {
                self.stats.record(event.dropped);
                continue;
            };
            if event.dropped {
                self.stats.record(true);
                continue;
            }

            let blocked = self.last_event_s.get(&det).is_some_and(|&t| event.time - t < self.dead_time_s);

            if self.paralyzable {
                self.last_event_s.insert(det, event.time);
            }
            if blocked {
                event.dropped = true;
            } else if !self.paralyzable {
                self.last_event_s.insert(det, event.time);
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

    fn make(time: f64, det: usize) -> Interaction {
        Interaction {
            kind: InteractionKind::Compton,
            time,
            position: DVec3::ZERO,
            energy_deposit: 0.1,
            colour: Colour::Blue,
            decay_id: 0,
            source_id: 0,
            material_id: 0,
            detector_id: Some(det),
            scatter: ScatterCounters::default(),
            coincidence: CoincidenceState::Untouched,
            dropped: false,
        }
    }

    #[test]
    fn non_paralyzable_recovers_after_fixed_window() {
        let mut dt = Deadtime::new(10e-9, false);
        let out = dt.process(vec![make(0.0, 1), make(5e-9, 1), make(15e-9, 1)]);
        assert!(!out[0].dropped);
        assert!(out[1].dropped);
        assert!(!out[2].dropped);
    }

    #[test]
    fn paralyzable_window_keeps_extending() {
        let mut dt = Deadtime::new(10e-9, true);
        let out = dt.process(vec![make(0.0, 1), make(5e-9, 1), make(12e-9, 1)]);
        assert!(!out[0].dropped);
        assert!(out[1].dropped);
        // 12e-9 is within 10e-9 of the rejected 5e-9 event, so it's still blocked.
        assert!(out[2].dropped);
    }

    #[test]
    fn distinct_components_have_independent_clocks() {
        let mut dt = Deadtime::new(10e-9, false);
        let out = dt.process(vec![make(0.0, 1), make(1e-9, 2)]);
        assert!(!out[0].dropped);
        assert!(!out[1].dropped);
    }
}
