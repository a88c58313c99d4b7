//! Energy-dependent interaction cross-sections and scattering-angle sampling.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::rng::Rng;

/// Electron rest mass energy, MeV.
pub const ELECTRON_MASS_MEV: f64 = 0.510_998_95;

/// Momentum-transfer constant converting `sin(theta/2) * E_MeV` into the
/// inverse-angstrom `x` argument of the form factor / scattering function
/// tables (`x = E_MeV * sin(theta/2) / 0.012398`).
const MOMENTUM_TRANSFER_CONST: f64 = 1.0 / 0.012_398;

const KLEIN_NISHINA_ENERGIES: [f64; 15] = [
    0.0, 0.010, 0.030, 0.050, 0.100, 0.200, 0.300, 0.400, 0.500, 0.600, 0.700, 0.900, 1.100, 1.300,
    1.500,
];

const N_COS_THETA: usize = 300;

/// The three linear attenuation lengths (cm) at a given energy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    /// Photoelectric linear attenuation length.
    pub photoelectric: f64,
    /// Compton linear attenuation length.
    pub compton: f64,
    /// Rayleigh linear attenuation length.
    pub rayleigh: f64,
}

impl Attenuation {
    /// Sum of the three components.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.photoelectric + self.compton + self.rayleigh
    }
}

/// Which of the three interaction types a sampled free-flight event is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    /// Photon absorbed, track terminates.
    Photoelectric,
    /// Inelastic scatter with energy loss.
    Compton,
    /// Elastic scatter, no energy loss.
    Rayleigh,
}

/// An energy-dependent linear attenuation and scattering model for one
/// material, identified by an integer id (name is metadata only).
#[derive(Debug, Serialize, Deserialize)]
pub struct Material {
    /// Index of this material in the scene's material list.
    pub index: usize,
    /// Display name, not used by the engine.
    pub name: String,
    /// Density in g/cm^3 (used only for documentation; the attenuation
    /// tables below are already density-scaled to linear attenuation).
    pub density: f64,
    /// Whether interactions in this material count as detector hits.
    pub sensitive: bool,
    /// Whether photons can interact in this material at all. The world's
    /// default medium is `false`.
    pub interactive: bool,

    energy: Vec<f64>,
    matten_phot: Vec<f64>,
    matten_comp: Vec<f64>,
    matten_rayl: Vec<f64>,

    x: Vec<f64>,
    form_factor: Vec<f64>,
    scattering_func: Vec<f64>,

    #[serde(skip)]
    log_energy: Vec<f64>,
    #[serde(skip)]
    log_phot: Vec<f64>,
    #[serde(skip)]
    log_comp: Vec<f64>,
    #[serde(skip)]
    log_rayl: Vec<f64>,

    #[serde(skip)]
    cache: Cell<Option<(f64, Attenuation)>>,

    #[serde(skip)]
    compton_cdf: std::sync::OnceLock<ScatterTable>,
    #[serde(skip)]
    rayleigh_cdf: std::sync::OnceLock<ScatterTable>,
}

impl Material {
    /// Builds a material from its aligned attenuation and momentum-transfer
    /// tables. `energy`, `matten_phot`, `matten_comp`, `matten_rayl` must be
    /// the same length and sorted by increasing energy; `x`, `form_factor`,
    /// `scattering_func` must be the same length and sorted by increasing
    /// `x`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        name: impl Into<String>,
        density: f64,
        sensitive: bool,
        interactive: bool,
        energy: Vec<f64>,
        matten_phot: Vec<f64>,
        matten_comp: Vec<f64>,
        matten_rayl: Vec<f64>,
        x: Vec<f64>,
        form_factor: Vec<f64>,
        scattering_func: Vec<f64>,
    ) -> Self {
        let log_energy = energy.iter().map(|v| v.ln()).collect();
        let log_phot = matten_phot.iter().map(|v| v.ln()).collect();
        let log_comp = matten_comp.iter().map(|v| v.ln()).collect();
        let log_rayl = matten_rayl.iter().map(|v| v.ln()).collect();

        Self {
            index,
            name: name.into(),
            density,
            sensitive,
            interactive,
            energy,
            matten_phot,
            matten_comp,
            matten_rayl,
            x,
            form_factor,
            scattering_func,
            log_energy,
            log_phot,
            log_comp,
            log_rayl,
            cache: Cell::new(None),
            compton_cdf: std::sync::OnceLock::new(),
            rayleigh_cdf: std::sync::OnceLock::new(),
        }
    }

    /// Log-log-interpolated attenuation lengths at `energy_mev`, memoised
    /// for the most recently requested energy.
    #[must_use]
    pub fn attenuation_at(&self, energy_mev: f64) -> Attenuation {
        if let Some((cached_e, cached)) = self.cache.get() {
            if cached_e == energy_mev {
                return cached;
            }
        }

        let log_e = energy_mev.ln();
        let result = Attenuation {
            photoelectric: log_log_interpolate(&self.log_energy, &self.log_phot, log_e),
            compton: log_log_interpolate(&self.log_energy, &self.log_comp, log_e),
            rayleigh: log_log_interpolate(&self.log_energy, &self.log_rayl, log_e),
        };
        self.cache.set(Some((energy_mev, result)));
        result
    }

    fn weight_at_x(&self, x: f64, table: &[f64]) -> f64 {
        linear_interpolate(&self.x, table, x)
    }

    fn compton_table(&self) -> &ScatterTable {
        self.compton_cdf
            .get_or_init(|| ScatterTable::build(|x| self.weight_at_x(x, &self.scattering_func)))
    }

    fn rayleigh_table(&self) -> &ScatterTable {
        self.rayleigh_cdf
            .get_or_init(|| ScatterTable::build(|x| self.weight_at_x(x, &self.form_factor)))
    }

    /// Samples a scattering cosine for the given interaction kind and
    /// incident energy, given a uniform sample `u in [0, 1)`.
    #[must_use]
    pub fn sample_cos_theta(&self, kind: InteractionKind, energy_mev: f64, u: f64) -> f64 {
        let table = match kind {
            InteractionKind::Compton => self.compton_table(),
            InteractionKind::Rayleigh => self.rayleigh_table(),
            InteractionKind::Photoelectric => unreachable!("photoelectric does not scatter"),
        };
        table.invert(energy_mev, u)
    }

    /// Chooses which interaction occurred at a free-flight stop, given the
    /// attenuation lengths at the photon's current energy and a uniform
    /// sample `u in [0, mu_total)`.
    #[must_use]
    pub fn select_interaction(atten: Attenuation, u: f64) -> InteractionKind {
        if u < atten.photoelectric {
            InteractionKind::Photoelectric
        } else if u < atten.photoelectric + atten.compton {
            InteractionKind::Compton
        } else {
            InteractionKind::Rayleigh
        }
    }

    /// Draws a free-flight distance given the total attenuation length at
    /// the photon's current energy.
    #[must_use]
    pub fn sample_free_flight(mu_total: f64, rng: &mut Rng) -> f64 {
        -rng.uniform_open().ln() / mu_total
    }

    /// Compton-scattered energy for a given incident energy and cosine of
    /// the scattering angle.
    #[must_use]
    pub fn compton_energy_out(energy_in: f64, cos_theta: f64) -> f64 {
        energy_in / (1.0 + (energy_in / ELECTRON_MASS_MEV) * (1.0 - cos_theta))
    }
}

/// Binary-search-then-linear-interpolate lookup, clamped at the table ends.
/// Operates on whatever units the caller passes (linear or log).
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[xs.len() - 1] {
        return ys[ys.len() - 1];
    }
    let idx = xs.partition_point(|&v| v <= x).max(1) - 1;
    let alpha = (x - xs[idx]) / (xs[idx + 1] - xs[idx]);
    ys[idx] + alpha * (ys[idx + 1] - ys[idx])
}

fn linear_interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    interpolate(xs, ys, x)
}

/// Linear interpolation on pre-logged axes, exponentiated back out: this is
/// what makes `Material::attenuation_at` log-log rather than linear.
fn log_log_interpolate(log_xs: &[f64], log_ys: &[f64], log_x: f64) -> f64 {
    interpolate(log_xs, log_ys, log_x).exp()
}

/// Trapezoidal cumulative integral of `ys` over `xs`.
fn trapezoidal_cumulative(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let mut cum = vec![0.0; xs.len()];
    for i in 1..xs.len() {
        let dx = xs[i] - xs[i - 1];
        cum[i] = cum[i - 1] + 0.5 * (ys[i] + ys[i - 1]) * dx;
    }
    cum
}

/// Normalizes a cumulative (non-decreasing) array to end at 1.0, i.e. turns
/// a PDF's running integral into a CDF.
fn pdf_to_cdf(cumulative: &mut [f64]) {
    let total = *cumulative.last().unwrap_or(&1.0);
    if total > 0.0 {
        for v in cumulative {
            *v /= total;
        }
    }
}

/// Klein-Nishina differential cross section with respect to scattering
/// angle theta (includes the `2 pi sin(theta)` solid-angle jacobian),
/// unnormalized (the leading `r_e^2 / 2` is a constant factor and cancels
/// out of the CDF).
fn klein_nishina_dsigma_dtheta(cos_theta: f64, energy: f64) -> f64 {
    if energy <= 0.0 {
        return (1.0 + cos_theta * cos_theta) * (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    }
    let ratio = 1.0 + (energy / ELECTRON_MASS_MEV) * (1.0 - cos_theta);
    let e_out_over_e_in = 1.0 / ratio;
    let sin_sq = (1.0 - cos_theta * cos_theta).max(0.0);
    let domega = e_out_over_e_in * e_out_over_e_in * (e_out_over_e_in + ratio - sin_sq);
    let sin_theta = sin_sq.sqrt();
    domega * 2.0 * std::f64::consts::PI * sin_theta
}

/// A per-energy grid of cumulative-distribution tables over `cos(theta)`,
/// built once per material and reused for every sample at that energy.
struct ScatterTable {
    /// `cos_theta[i]`, descending from 1.0 to -1.0.
    cos_theta: [f64; N_COS_THETA],
    /// `cdf[e][i]`, one CDF per [`KLEIN_NISHINA_ENERGIES`] entry.
    cdf: Vec<[f64; N_COS_THETA]>,
}

impl ScatterTable {
    fn build(weight_at_x: impl Fn(f64) -> f64) -> Self {
        let mut cos_theta = [0.0; N_COS_THETA];
        for (i, c) in cos_theta.iter_mut().enumerate() {
            *c = 1.0 - i as f64 * (2.0 / (N_COS_THETA - 1) as f64);
        }
        let theta: Vec<f64> = cos_theta.iter().map(|c| c.acos()).collect();

        let cdf = KLEIN_NISHINA_ENERGIES
            .iter()
            .map(|&energy| {
                let mut pdf = [0.0; N_COS_THETA];
                for i in 0..N_COS_THETA {
                    let ct = cos_theta[i];
                    let half_theta = theta[i] / 2.0;
                    let x = energy * half_theta.sin() * MOMENTUM_TRANSFER_CONST;
                    let weight = weight_at_x(x);
                    pdf[i] = klein_nishina_dsigma_dtheta(ct, energy) * weight;
                }
                let mut cum = trapezoidal_cumulative(&theta, &pdf);
                pdf_to_cdf(&mut cum);
                cum.try_into().unwrap_or([0.0; N_COS_THETA])
            })
            .collect();

        Self { cos_theta, cdf }
    }

    /// Inverts the CDF at `energy_mev` for a uniform sample `u`, linearly
    /// interpolating both within a single energy's CDF table (cosine
    /// dimension) and, if `energy_mev` falls between two grid points,
    /// across the energy dimension.
    fn invert(&self, energy_mev: f64, u: f64) -> f64 {
        let idx = KLEIN_NISHINA_ENERGIES
            .partition_point(|&e| e <= energy_mev)
            .clamp(1, KLEIN_NISHINA_ENERGIES.len() - 1)
            - 1;
        let e0 = KLEIN_NISHINA_ENERGIES[idx];
        let e1 = KLEIN_NISHINA_ENERGIES[idx + 1];
        let alpha = if (e1 - e0).abs() < f64::EPSILON {
            0.0
        } else {
            ((energy_mev - e0) / (e1 - e0)).clamp(0.0, 1.0)
        };

        let c0 = invert_single_cdf(&self.cdf[idx], &self.cos_theta, u);
        if idx + 1 >= self.cdf.len() {
            return c0;
        }
        let c1 = invert_single_cdf(&self.cdf[idx + 1], &self.cos_theta, u);
        c0 + alpha * (c1 - c0)
    }
}

fn invert_single_cdf(cdf: &[f64], cos_theta: &[f64], u: f64) -> f64 {
    // `cdf` is ascending (in theta, i.e. descending in cos_theta) so we can
    // binary search it directly.
    interpolate(cdf, cos_theta, u)
}

impl std::fmt::Debug for ScatterTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScatterTable")
            .field("energies", &KLEIN_NISHINA_ENERGIES.len())
            .field("cos_theta_samples", &self.cos_theta.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn water() -> Material {
        Material::new(
            0,
            "water",
            1.0,
            false,
            true,
            vec![0.01, 0.1, 1.0, 10.0],
            vec![100.0, 1.0, 0.01, 0.0001],
            vec![0.1, 0.15, 0.1, 0.05],
            vec![0.05, 0.02, 0.001, 0.00001],
            vec![0.0, 1.0, 2.0, 5.0, 10.0],
            vec![1.0, 0.8, 0.4, 0.1, 0.01],
            vec![0.0, 0.2, 0.6, 0.9, 1.0],
        )
    }

    #[test]
    fn log_log_interpolation_matches_endpoints() {
        let m = water();
        let at_low = m.attenuation_at(0.01);
        assert_approx_eq!(f64, at_low.photoelectric, 100.0, epsilon = 1e-9);
        let at_high = m.attenuation_at(10.0);
        assert_approx_eq!(f64, at_high.photoelectric, 0.0001, epsilon = 1e-12);
    }

    #[test]
    fn log_log_interpolation_is_between_neighbors_at_midpoint() {
        let m = water();
        let mid = m.attenuation_at(0.1);
        assert_approx_eq!(f64, mid.photoelectric, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn compton_energy_conservation_and_bound() {
        let e_in = 1.0;
        for i in 0..=10 {
            let cos_theta = -1.0 + i as f64 * 0.2;
            let e_out = Material::compton_energy_out(e_in, cos_theta);
            assert!(e_out <= e_in);
            let bound = ELECTRON_MASS_MEV * e_in / (ELECTRON_MASS_MEV + 2.0 * e_in);
            assert!(e_out >= bound - 1e-12);
        }
    }

    #[test]
    fn select_interaction_partitions_by_cumulative_weight() {
        let atten = Attenuation {
            photoelectric: 1.0,
            compton: 2.0,
            rayleigh: 3.0,
        };
        assert_eq!(Material::select_interaction(atten, 0.5), InteractionKind::Photoelectric);
        assert_eq!(Material::select_interaction(atten, 2.0), InteractionKind::Compton);
        assert_eq!(Material::select_interaction(atten, 5.0), InteractionKind::Rayleigh);
    }

    #[test]
    fn scatter_table_invert_spans_full_cosine_range() {
        let m = water();
        let low = m.sample_cos_theta(InteractionKind::Compton, 0.511, 0.0);
        let high = m.sample_cos_theta(InteractionKind::Compton, 0.511, 1.0);
        assert!(low <= high);
        assert!((-1.0..=1.0).contains(&low));
        assert!((-1.0..=1.0).contains(&high));
    }
}
