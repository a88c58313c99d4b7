//! The photon and interaction record types that flow through the transport
//! engine.

use arrayvec::ArrayVec;
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Photons carry a material stack no deeper than this; exceeding it is a
/// scene-construction error, not a runtime one (the stack only grows by
/// crossing front faces, and `MAX_TRACE_DEPTH` bounds a track's total steps
/// well below any plausible nesting depth).
pub const MAX_MATERIAL_STACK: usize = 32;

/// Distinguishes the two annihilation photons and any prompt gamma from a
/// single decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Colour {
    /// First annihilation photon.
    Blue,
    /// Second annihilation photon (deflected by acollinearity relative to blue).
    Red,
    /// Prompt gamma from an isotope like Zr-89.
    Yellow,
}

/// Non-negative counters tracking how a photon has scattered so far,
/// split by whether the scattering material is flagged sensitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScatterCounters {
    /// Compton scatters in non-sensitive ("phantom") material.
    pub compton_phantom: u32,
    /// Compton scatters in sensitive ("detector") material.
    pub compton_detector: u32,
    /// Rayleigh scatters in non-sensitive material.
    pub rayleigh_phantom: u32,
    /// Rayleigh scatters in sensitive material.
    pub rayleigh_detector: u32,
    /// Characteristic X-ray fluorescence events.
    pub xray_fluorescence: u32,
}

impl ScatterCounters {
    /// Field-wise maximum. Used to collapse several cumulative snapshots
    /// of the same photon's scatter history (as recorded at different
    /// interactions along its track) back down to that photon's final tally.
    #[must_use]
    pub fn componentwise_max(self, other: Self) -> Self {
        Self {
            compton_phantom: self.compton_phantom.max(other.compton_phantom),
            compton_detector: self.compton_detector.max(other.compton_detector),
            rayleigh_phantom: self.rayleigh_phantom.max(other.rayleigh_phantom),
            rayleigh_detector: self.rayleigh_detector.max(other.rayleigh_detector),
            xray_fluorescence: self.xray_fluorescence.max(other.xray_fluorescence),
        }
    }

    /// Field-wise sum. Used to accumulate distinct photons' final tallies
    /// when several photons contribute to the same merged record.
    #[must_use]
    pub fn componentwise_add(self, other: Self) -> Self {
        Self {
            compton_phantom: self.compton_phantom + other.compton_phantom,
            compton_detector: self.compton_detector + other.compton_detector,
            rayleigh_phantom: self.rayleigh_phantom + other.rayleigh_phantom,
            rayleigh_detector: self.rayleigh_detector + other.rayleigh_detector,
            xray_fluorescence: self.xray_fluorescence + other.xray_fluorescence,
        }
    }
}

/// A photon in flight.
#[derive(Debug, Clone)]
pub struct Photon {
    /// Current position.
    pub position: DVec3,
    /// Current direction, unit length.
    pub direction: DVec3,
    /// Current energy, MeV.
    pub energy: f64,
    /// Time since the start of the simulation, s.
    pub time: f64,
    /// Id of the decay this photon originated from.
    pub decay_id: u64,
    /// Id of the source the originating decay belongs to.
    pub source_id: usize,
    /// Current detector id, or `None` outside any sensitive region.
    pub detector_id: Option<usize>,
    /// Which of the decay's photons this is.
    pub colour: Colour,
    /// Scatter history so far.
    pub scatter: ScatterCounters,
    /// Stack of material indices the photon is nested inside, top of
    /// stack (last element) is the current medium. Non-empty for the
    /// lifetime of a valid photon; the bottom entry is the world's default
    /// material.
    pub material_stack: ArrayVec<usize, MAX_MATERIAL_STACK>,
}

impl Photon {
    /// The material the photon currently occupies, i.e. the top of the stack.
    ///
    /// # Panics
    /// Panics if the material stack is empty; callers must check
    /// [`Photon::material_stack`] emptiness themselves before calling this
    /// in contexts where an empty stack is an expected (not a programmer)
    /// error, e.g. the transport loop, which reports `error_empty` instead
    /// of panicking.
    #[must_use]
    pub fn current_material(&self) -> usize {
        *self.material_stack.last().expect("material stack must not be empty")
    }
}

/// The kind of event an [`Interaction`] record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionKind {
    /// Inelastic Compton scatter.
    Compton,
    /// Photon absorbed.
    Photoelectric,
    /// Characteristic X-ray re-emission following photoelectric absorption.
    XrayEscape,
    /// Elastic Rayleigh scatter.
    Rayleigh,
    /// The decay itself, recorded as a zero-energy marker event.
    NuclearDecay,
    /// The photon left the scene without interacting.
    NoInteraction,
    /// The material stack underflowed.
    ErrorEmpty,
    /// The per-photon step cap was hit, or a back face popped the wrong material.
    ErrorTraceDepth,
}

/// One recorded event in a photon's history, the unit of output from the
/// transport engine and the unit of input to the DAQ pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// What happened.
    pub kind: InteractionKind,
    /// Simulation time, s.
    pub time: f64,
    /// Position of the event.
    pub position: DVec3,
    /// Energy deposited by the event, MeV (0 for non-depositing kinds).
    pub energy_deposit: f64,
    /// Colour of the photon that produced this event.
    pub colour: Colour,
    /// Id of the parent decay.
    pub decay_id: u64,
    /// Id of the source.
    pub source_id: usize,
    /// Id of the material the event occurred in.
    pub material_id: usize,
    /// Detector id, or `None` if the event is outside a sensitive region.
    pub detector_id: Option<usize>,
    /// Scatter history of the photon at the time of this event.
    pub scatter: ScatterCounters,
    /// DAQ coincidence grouping: `None` = untouched, `Some(None)` =
    /// dropped, `Some(Some(g))` = member of group `g`.
    pub coincidence: CoincidenceState,
    /// Whether this event is excluded from further DAQ processing. Hit
    /// logs retain dropped events; downstream stages skip them.
    pub dropped: bool,
}

/// Coincidence-grouping state of an interaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoincidenceState {
    /// Not yet touched by a coincidence stage.
    Untouched,
    /// Touched and dropped (singles, or rejected multiples).
    Dropped,
    /// Member of coincidence group `0`.
    Group(u64),
}

impl Interaction {
    /// True if this kind never deposits energy and always starts out
    /// dropped: nuclear decays, Rayleigh scatters, and anything outside a
    /// sensitive material.
    #[must_use]
    pub fn initially_dropped(kind: InteractionKind, sensitive: bool) -> bool {
        matches!(kind, InteractionKind::NuclearDecay | InteractionKind::Rayleigh) || !sensitive
    }
}
