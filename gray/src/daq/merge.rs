//! Same-component event merging (pulse pileup).

use std::collections::BTreeMap;

use glam::DVec3;

use super::{Stage, StageStats};
use crate::photon::{Interaction, ScatterCounters};

/// How a merged event's representative position/time/colour is chosen
/// from the events being combined. In every mode the merged event's
/// deposited energy is the sum of the group's energies and its scatter
/// counters are the field-wise sum across the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Take the earliest event's position, time, and colour.
    First,
    /// Take the highest-energy event's position, time, and colour.
    Max,
    /// Energy-weighted centroid position (an Anger-logic estimate); time
    /// and colour are taken from the earliest event.
    Anger,
}

/// Merges events landing in the same detector component within `window`
/// seconds of each other into a single pileup event, the way a detector's
/// analog front end would integrate closely spaced pulses into one.
/// Events with no detector id, or already dropped, pass through untouched.
pub struct Merge {
    mode: MergeMode,
    window_s: f64,
    open: BTreeMap<usize, Vec<Interaction>>,
    stats: StageStats,
}

impl Merge {
    /// Builds a merge stage with the given mode and coincidence window.
    #[must_use]
    pub fn new(mode: MergeMode, window_s: f64) -> Self {
        Self {
            mode,
            window_s,
            open: BTreeMap::new(),
            stats: StageStats::default(),
        }
    }

    fn merge_group(mode: MergeMode, mut group: Vec<Interaction>) -> Interaction {
        group.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));

        let total_energy: f64 = group.iter().map(|e| e.energy_deposit).sum();
        let scatter = Self::merged_scatter_counters(&group);

        let mut representative = match mode {
            MergeMode::First | MergeMode::Anger => group[0].clone(),
            MergeMode::Max => group
                .iter()
                .max_by(|a, b| a.energy_deposit.partial_cmp(&b.energy_deposit).unwrap_or(std::cmp::Ordering::Equal))
                .expect("group is non-empty")
                .clone(),
        };

        if matches!(mode, MergeMode::Anger) && total_energy > 0.0 {
            let weighted: DVec3 = group.iter().map(|e| e.position * e.energy_deposit).sum();
            representative.position = weighted / total_energy;
        }

        representative.energy_deposit = total_energy;
        representative.scatter = scatter;
        representative
    }

    /// `Interaction::scatter` is a cumulative snapshot of the source
    /// photon's whole track, not a per-event delta. Summing it flat across
    /// a merge group would over-count whenever two events in the group
    /// came from the same photon (e.g. a Compton scatter followed by a
    /// photoelectric absorption of the same photon in one detector
    /// block). Instead, take the field-wise maximum within each
    /// `(decay_id, colour)` sub-group — recovering that photon's final
    /// tally — then sum the per-photon maxima across distinct photons.
    fn merged_scatter_counters(group: &[Interaction]) -> ScatterCounters {
        let mut per_photon: Vec<((u64, crate::photon::Colour), ScatterCounters)> = Vec::new();
        for e in group {
            let key = (e.decay_id, e.colour);
            if let Some((_, acc)) = per_photon.iter_mut().find(|(k, _)| *k == key) {
                *acc = acc.componentwise_max(e.scatter);
            } else {
                per_photon.push((key, e.scatter));
            }
        }
        per_photon
            .into_iter()
            .fold(ScatterCounters::default(), |acc, (_, s)| acc.componentwise_add(s))
    }

    fn flush_component(&mut self, detector_id: usize) -> Option<Interaction> {
        let group = self.open.remove(&detector_id)?;
        if group.is_empty() {
            return None;
        }
        Some(Self::merge_group(self.mode, group))
    }
}

impl Stage for Merge {
    fn process(&mut self, events: Vec<Interaction>) -> Vec<Interaction> {
        let mut out = Vec::new();
        for event in events {
            self.stats.record(event.dropped);
            let Some(det) = event.detector_id else {
                out.push(event);
                continue;
            };
            if event.dropped {
                out.push(event);
                continue;
            }

            let needs_flush = self
                .open
                .get(&det)
                .and_then(|g| g.last())
                .is_some_and(|last| event.time - last.time > self.window_s);
            if needs_flush {
                if let Some(flushed) = self.flush_component(det) {
                    out.push(flushed);
                }
            }
            self.open.entry(det).or_default().push(event);
        }
        out
    }

    fn stop(&mut self) -> Vec<Interaction> {
        let ids: Vec<usize> = self.open.keys().copied().collect();
        ids.into_iter().filter_map(|id| self.flush_component(id)).collect()
    }

    fn stats(&self) -> StageStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photon::{Colour, CoincidenceState, InteractionKind};

    fn make(time: f64, energy: f64, det: usize) -> Interaction {
        Interaction {
            kind: InteractionKind::Compton,
            time,
            position: DVec3::new(time, 0.0, 0.0),
            energy_deposit: energy,
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
    fn merges_pileup_within_window_and_sums_energy() {
        let mut merge = Merge::new(MergeMode::First, 10e-9);
        let mut out = merge.process(vec![make(0.0, 0.1, 7), make(5e-9, 0.2, 7), make(100e-9, 0.3, 7)]);
        out.extend(merge.stop());

        assert_eq!(out.len(), 2);
        assert!((out[0].energy_deposit - 0.3).abs() < 1e-12);
        assert!((out[1].energy_deposit - 0.3).abs() < 1e-12);
    }

    #[test]
    fn distinct_components_never_merge() {
        let mut merge = Merge::new(MergeMode::First, 10e-9);
        let mut out = merge.process(vec![make(0.0, 0.1, 1), make(1e-9, 0.2, 2)]);
        out.extend(merge.stop());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn scatter_counters_take_max_within_a_photon_and_sum_across_photons() {
        let mut same_photon_first = make(0.0, 0.1, 4);
        same_photon_first.scatter = ScatterCounters {
            compton_detector: 1,
            ..ScatterCounters::default()
        };
        let mut same_photon_second = make(1e-9, 0.2, 4);
        same_photon_second.scatter = ScatterCounters {
            compton_detector: 2,
            ..ScatterCounters::default()
        };

        let mut other_photon = make(2e-9, 0.3, 4);
        other_photon.decay_id = 1;
        other_photon.colour = Colour::Red;
        other_photon.scatter = ScatterCounters {
            rayleigh_detector: 1,
            ..ScatterCounters::default()
        };

        let mut merge = Merge::new(MergeMode::First, 10e-9);
        let mut out = merge.process(vec![same_photon_first, same_photon_second, other_photon]);
        out.extend(merge.stop());

        assert_eq!(out.len(), 1);
        // The same photon's two snapshots collapse to its final tally (2),
        // not their sum (3); the other photon's tally adds on top of that.
        assert_eq!(out[0].scatter.compton_detector, 2);
        assert_eq!(out[0].scatter.rayleigh_detector, 1);
    }

    #[test]
    fn anger_mode_weights_position_by_energy() {
        let mut merge = Merge::new(MergeMode::Anger, 10e-9);
        let mut out = merge.process(vec![make(0.0, 1.0, 3), make(1e-9, 3.0, 3)]);
        out.extend(merge.stop());
        assert_eq!(out.len(), 1);
        // weighted toward the higher-energy (later-time) event's x position.
        assert!(out[0].position.x > 0.5e-9);
    }
}
