//! Priority-queue-driven decay scheduler: samples the next decay time from
//! each source's exponential distribution, rejects decays falling inside
//! negative (subtractive) sources, and expands the accepted decay into its
//! emitted photons.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::DVec3;

use crate::isotope::{deflect, Isotope, ANNIHILATION_ENERGY_MEV};
use crate::photon::Colour;
use crate::rng::Rng;
use crate::source::{Sign, Source};

/// A single photon as planned by the scheduler: direction and energy at
/// emission, not yet carrying a material stack (the transport engine
/// attaches that from the source).
#[derive(Debug, Clone, Copy)]
pub struct PlannedPhoton {
    /// Emission position. For the annihilation pair this is the decay
    /// position displaced by the positron range model; for a prompt
    /// gamma it is the undisplaced nuclear position.
    pub position: DVec3,
    /// Emission direction, unit length.
    pub direction: DVec3,
    /// Emission energy, MeV.
    pub energy: f64,
    /// Which of the decay's photons this is.
    pub colour: Colour,
}

/// One accepted nuclear decay and the photons it produced.
#[derive(Debug, Clone)]
pub struct NuclearDecay {
    /// Monotonically increasing id.
    pub id: u64,
    /// Simulation time, s.
    pub time: f64,
    /// Index of the emitting source.
    pub source_id: usize,
    /// Position of the decay (before any positron-range displacement).
    pub position: DVec3,
    /// Photons emitted, 0-3.
    pub photons: Vec<PlannedPhoton>,
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    time: f64,
    source_id: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) pops the earliest time first.
        other.time.partial_cmp(&self.time).unwrap_or(Ordering::Equal)
    }
}

/// Drives the decay scheduler: a min-heap of next-decay times, one per
/// positive source, plus rejection sampling against negative sources.
pub struct Scheduler<'a> {
    sources: &'a [Source],
    isotopes: &'a [Isotope],
    heap: BinaryHeap<HeapEntry>,
    next_decay_id: u64,
    total_positive_activity: f64,
}

impl<'a> Scheduler<'a> {
    /// Builds a scheduler, seeding every positive source's first decay time.
    pub fn new(sources: &'a [Source], isotopes: &'a [Isotope], rng: &mut Rng) -> Self {
        let total_positive_activity: f64 = sources
            .iter()
            .filter(|s| s.sign == Sign::Positive)
            .map(|s| s.activity_bq)
            .sum();

        let mut heap = BinaryHeap::new();
        for (i, source) in sources.iter().enumerate() {
            if source.sign != Sign::Positive {
                continue;
            }
            let isotope = &isotopes[source.isotope_index];
            let dt = rng.exponential(source.activity_bq * isotope.activity_factor(0.0));
            heap.push(HeapEntry { time: dt, source_id: i });
        }

        Self {
            sources,
            isotopes,
            heap,
            next_decay_id: 0,
            total_positive_activity,
        }
    }

    /// Pops the earliest-scheduled source, advances its next decay time,
    /// samples and rejection-tests a candidate position, and on
    /// acceptance expands the decay into photons. Returns `None` once
    /// there are no more positive sources (never otherwise).
    ///
    /// Time always advances, even on rejection, so that rejecting samples
    /// near a negative source does not bias the accepted rate of the
    /// positive source.
    pub fn decay(&mut self, rng: &mut Rng) -> Option<NuclearDecay> {
        loop {
            let entry = self.heap.pop()?;
            let source = &self.sources[entry.source_id];
            let isotope = &self.isotopes[source.isotope_index];

            let dt = rng.exponential(source.activity_bq.max(1e-300) * isotope.activity_factor(entry.time));
            self.heap.push(HeapEntry {
                time: entry.time + dt,
                source_id: entry.source_id,
            });

            let position = source.shape.sample_position(rng);
            if self.rejected_by_negative_sources(position, rng) {
                continue;
            }

            let id = self.next_decay_id;
            self.next_decay_id += 1;
            let photons = expand_decay(isotope, position, rng);
            return Some(NuclearDecay {
                id,
                time: entry.time,
                source_id: entry.source_id,
                position,
                photons,
            });
        }
    }

    fn rejected_by_negative_sources(&self, position: DVec3, rng: &mut Rng) -> bool {
        for source in self.sources {
            if source.sign != Sign::Positive && source.shape.contains(position) {
                let p_reject = source.rejection_probability(self.total_positive_activity);
                if rng.uniform() < p_reject {
                    return true;
                }
            }
        }
        false
    }
}

/// Expands an accepted decay position into its emitted photons: a single
/// directed photon if the isotope is a beam pseudo-source; otherwise a
/// back-to-back annihilation pair (displaced by the positron range model
/// and deflected by acollinearity) if the isotope emits a positron, plus a
/// prompt gamma from the un-displaced decay position if the isotope has one.
fn expand_decay(isotope: &Isotope, position: DVec3, rng: &mut Rng) -> Vec<PlannedPhoton> {
    if let Some(beam) = &isotope.beam {
        return vec![PlannedPhoton {
            position,
            direction: beam.sample_direction(rng),
            energy: beam.energy_mev,
            colour: Colour::Blue,
        }];
    }

    let mut photons = Vec::with_capacity(3);

    if rng.uniform() < isotope.positron_emiss_prob {
        let annihilation_position = position + isotope.model.sample_displacement(rng);
        let blue_dir = rng.uniform_sphere();
        let acollinearity = isotope.sample_acollinearity(rng);
        let azimuth = rng.uniform_range(0.0, std::f64::consts::TAU);
        let red_dir = deflect(-blue_dir, acollinearity, azimuth);

        photons.push(PlannedPhoton {
            position: annihilation_position,
            direction: blue_dir,
            energy: ANNIHILATION_ENERGY_MEV,
            colour: Colour::Blue,
        });
        photons.push(PlannedPhoton {
            position: annihilation_position,
            direction: red_dir,
            energy: ANNIHILATION_ENERGY_MEV,
            colour: Colour::Red,
        });
    }

    if isotope.prompt_gamma_energy_mev > 0.0 {
        photons.push(PlannedPhoton {
            position,
            direction: rng.uniform_sphere(),
            energy: isotope.prompt_gamma_energy_mev,
            colour: Colour::Yellow,
        });
    }

    photons
}

/// Computes `n` simulated-time split points with equal expected total
/// photon counts across all positive sources, by relaxing a candidate time
/// toward the target cumulative expected-photon count.
///
/// This lets an outer runner partition a simulation across independent
/// workers (each covering one `[split[i], split[i+1])` interval) without
/// biasing per-source statistics, since every interval carries the same
/// expected amount of work.
#[must_use]
pub fn equal_photon_time_splits(sources: &[Source], isotopes: &[Isotope], end_time: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![0.0, end_time];
    }

    let total_expected = expected_photons(sources, isotopes, 0.0, end_time);
    let mut splits = vec![0.0];

    for k in 1..n {
        let target = total_expected * k as f64 / n as f64;
        splits.push(search_split_time(sources, isotopes, end_time, target));
    }
    splits.push(end_time);
    splits
}

/// Expected photon count emitted by all positive sources over `[t0, t1)`.
fn expected_photons(sources: &[Source], isotopes: &[Isotope], t0: f64, t1: f64) -> f64 {
    sources
        .iter()
        .filter(|s| s.sign == Sign::Positive)
        .map(|s| {
            let isotope = &isotopes[s.isotope_index];
            let mean_decays = mean_decay_count(s.activity_bq, isotope.half_life_s, t0, t1);
            mean_decays * isotope.expected_photons_per_decay()
        })
        .sum()
}

fn mean_decay_count(activity_bq: f64, half_life_s: f64, t0: f64, t1: f64) -> f64 {
    if half_life_s.is_infinite() {
        return activity_bq * (t1 - t0);
    }
    let lambda = std::f64::consts::LN_2 / half_life_s;
    activity_bq / lambda * ((-lambda * t0).exp() - (-lambda * t1).exp())
}

/// Binary-search-with-relaxation over `[0, end_time]` for the time at
/// which the cumulative expected photon count reaches `target`, damped by
/// `alpha = 0.5` per iteration over 30 iterations, matching the original
/// tool's splitting search.
fn search_split_time(sources: &[Source], isotopes: &[Isotope], end_time: f64, target: f64) -> f64 {
    const ALPHA: f64 = 0.5;
    const ITERATIONS: usize = 30;

    let mut lo = 0.0;
    let mut hi = end_time;
    let mut candidate = end_time * 0.5;

    for _ in 0..ITERATIONS {
        let cumulative = expected_photons(sources, isotopes, 0.0, candidate);
        if cumulative < target {
            lo = candidate;
        } else {
            hi = candidate;
        }
        candidate = candidate + ALPHA * ((lo + hi) / 2.0 - candidate);
    }

    candidate.clamp(0.0, end_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isotope::PositronRangeModel;
    use crate::source::SourceShape;

    fn f18() -> Isotope {
        Isotope {
            half_life_s: 6584.0,
            positron_emiss_prob: 0.967,
            prompt_gamma_energy_mev: 0.0,
            acolinearity_deg_fwhm: 0.5,
            model: PositronRangeModel::None,
            beam: None,
        }
    }

    fn point_source(activity_bq: f64) -> Source {
        Source {
            shape: SourceShape::Point(DVec3::ZERO),
            activity_bq,
            isotope_index: 0,
            sign: Sign::Positive,
            material_stack: vec![0],
        }
    }

    #[test]
    fn decay_times_are_monotonically_non_decreasing() {
        let sources = vec![point_source(100.0), point_source(50.0)];
        let isotopes = vec![f18()];
        let mut rng = Rng::new(1);
        let mut scheduler = Scheduler::new(&sources, &isotopes, &mut rng);

        let mut last_time = 0.0;
        for _ in 0..500 {
            let decay = scheduler.decay(&mut rng).unwrap();
            assert!(decay.time >= last_time);
            last_time = decay.time;
        }
    }

    #[test]
    fn pure_positron_emitter_yields_zero_or_two_photons() {
        let sources = vec![point_source(1000.0)];
        let isotopes = vec![f18()];
        let mut rng = Rng::new(2);
        let mut scheduler = Scheduler::new(&sources, &isotopes, &mut rng);

        for _ in 0..500 {
            let decay = scheduler.decay(&mut rng).unwrap();
            assert!(decay.photons.len() == 0 || decay.photons.len() == 2);
        }
    }

    #[test]
    fn prompt_gamma_isotope_adds_a_third_photon() {
        let mut iso = f18();
        iso.prompt_gamma_energy_mev = 0.909;
        let sources = vec![point_source(1000.0)];
        let isotopes = vec![iso];
        let mut rng = Rng::new(3);
        let mut scheduler = Scheduler::new(&sources, &isotopes, &mut rng);

        for _ in 0..500 {
            let decay = scheduler.decay(&mut rng).unwrap();
            assert!(decay.photons.len() == 1 || decay.photons.len() == 3);
        }
    }

    #[test]
    fn beam_isotope_yields_exactly_one_directed_photon() {
        use crate::isotope::Beam;

        let mut beam_isotope = f18();
        beam_isotope.beam = Some(Beam {
            axis: DVec3::Z,
            half_angle_rad: 0.05,
            energy_mev: 1.0,
        });
        let sources = vec![point_source(1000.0)];
        let isotopes = vec![beam_isotope];
        let mut rng = Rng::new(4);
        let mut scheduler = Scheduler::new(&sources, &isotopes, &mut rng);

        for _ in 0..200 {
            let decay = scheduler.decay(&mut rng).unwrap();
            assert_eq!(decay.photons.len(), 1);
            assert!((decay.photons[0].energy - 1.0).abs() < 1e-12);
            assert!(decay.photons[0].direction.dot(DVec3::Z).acos() <= 0.05 + 1e-9);
        }
    }

    #[test]
    fn equal_photon_splits_cover_full_range_in_order() {
        let sources = vec![point_source(1000.0)];
        let isotopes = vec![f18()];
        let splits = equal_photon_time_splits(&sources, &isotopes, 10.0, 4);
        assert_eq!(splits.first().copied(), Some(0.0));
        assert_eq!(splits.last().copied(), Some(10.0));
        for w in splits.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }
}
