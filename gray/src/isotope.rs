//! Isotope decay kinematics: positron range models and acollinearity.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::rng::Rng;

/// Millimetre-to-scene-unit (cm) conversion used by the positron range
/// models, matching the original tool's constant.
pub const MM_TO_CM: f64 = 0.1;

/// FWHM-to-standard-deviation conversion, `1 / (2 sqrt(2 ln 2))`.
pub const FWHM_TO_SIGMA: f64 = 1.0 / 2.354_820_05;

/// 511 keV, the energy of each annihilation photon.
pub const ANNIHILATION_ENERGY_MEV: f64 = 0.511;

/// How far the positron travels from the decay site before annihilating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PositronRangeModel {
    /// No displacement: annihilation occurs at the decay site.
    None,
    /// Isotropic 3-D Gaussian blur, rejection-sampled against a maximum range.
    Gauss {
        /// FWHM of the Gaussian, mm.
        fwhm_mm: f64,
        /// Maximum allowed range, mm.
        max_range_mm: f64,
    },
    /// Levin & Hoffman's two-component exponential radial profile,
    /// rejection-sampled against a maximum range.
    LevinExp {
        /// Probability of drawing from the first (faster-decaying) exponential.
        prob_c: f64,
        /// Decay rate of the first exponential, 1/mm.
        k1: f64,
        /// Decay rate of the second exponential, 1/mm.
        k2: f64,
        /// Maximum allowed range, mm.
        max_range_mm: f64,
    },
}

impl PositronRangeModel {
    /// Samples a displacement vector (scene units, cm) from the decay
    /// position to the annihilation position.
    pub fn sample_displacement(&self, rng: &mut Rng) -> DVec3 {
        match *self {
            Self::None => DVec3::ZERO,
            Self::Gauss { fwhm_mm, max_range_mm } => {
                let sigma = fwhm_mm * MM_TO_CM * FWHM_TO_SIGMA;
                let max_range = max_range_mm * MM_TO_CM;
                loop {
                    let offset = DVec3::new(
                        rng.gaussian_with(0.0, sigma),
                        rng.gaussian_with(0.0, sigma),
                        rng.gaussian_with(0.0, sigma),
                    );
                    if offset.length() <= max_range {
                        return offset;
                    }
                }
            }
            Self::LevinExp { prob_c, k1, k2, max_range_mm } => {
                let max_range = max_range_mm * MM_TO_CM;
                loop {
                    let rate_mm = if rng.uniform() < prob_c { k1 } else { k2 };
                    let rate_cm = rate_mm / MM_TO_CM;
                    let radius = rng.exponential(rate_cm);
                    if radius > max_range {
                        continue;
                    }
                    return rng.uniform_sphere() * radius;
                }
            }
        }
    }
}

/// A pseudo-isotope that emits a single directed mono-energetic photon
/// along a fixed axis, within a cone, rather than decaying per any real
/// nuclide's kinematics. Used for characterising detectors (e.g. an
/// isotropic beam into a slab, `half_angle_rad = PI`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Beam {
    /// Emission axis, unit length.
    pub axis: DVec3,
    /// Half-angle of the emission cone, radians.
    pub half_angle_rad: f64,
    /// Photon energy, MeV.
    pub energy_mev: f64,
}

impl Beam {
    /// Samples a direction uniform by solid angle within the cone around
    /// `axis`.
    pub fn sample_direction(&self, rng: &mut Rng) -> DVec3 {
        let cos_half = self.half_angle_rad.cos();
        let cos_theta = rng.uniform_range(cos_half, 1.0);
        let phi = rng.uniform_range(0.0, std::f64::consts::TAU);
        deflect(self.axis, cos_theta.acos(), phi)
    }
}

/// A radioactive isotope's decay kinematics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Isotope {
    /// Half-life, seconds. `f64::INFINITY` for a stable-over-the-run source.
    pub half_life_s: f64,
    /// Probability that a decay emits a positron (vs. some other decay mode).
    pub positron_emiss_prob: f64,
    /// Energy of an accompanying prompt gamma, MeV (0.0 if none).
    pub prompt_gamma_energy_mev: f64,
    /// Acollinearity FWHM, degrees.
    pub acolinearity_deg_fwhm: f64,
    /// Positron range model.
    pub model: PositronRangeModel,
    /// When set, this isotope is a beam pseudo-source: every decay emits
    /// exactly the one photon described here instead of an annihilation
    /// pair and/or prompt gamma.
    pub beam: Option<Beam>,
}

impl Isotope {
    /// Decay-rate multiplier at elapsed time `t` since the start of the
    /// simulation, accounting for half-life decay of the source activity.
    #[must_use]
    pub fn activity_factor(&self, t: f64) -> f64 {
        if self.half_life_s.is_infinite() {
            1.0
        } else {
            (-std::f64::consts::LN_2 * t / self.half_life_s).exp()
        }
    }

    /// Mean number of photons a decay from this isotope produces: exactly
    /// 1 for a beam source; otherwise 2 for the positron pair (scaled by
    /// emission probability), plus 1 more if a prompt gamma always
    /// accompanies it.
    #[must_use]
    pub fn expected_photons_per_decay(&self) -> f64 {
        if self.beam.is_some() {
            return 1.0;
        }
        let pair = 2.0 * self.positron_emiss_prob;
        let prompt = if self.prompt_gamma_energy_mev > 0.0 { 1.0 } else { 0.0 };
        pair + prompt
    }

    /// Samples the acollinearity deflection angle (radians) applied to the
    /// red photon relative to exact anti-parallel.
    pub fn sample_acollinearity(&self, rng: &mut Rng) -> f64 {
        let sigma_deg = self.acolinearity_deg_fwhm * FWHM_TO_SIGMA;
        rng.gaussian_with(0.0, sigma_deg.to_radians())
    }
}

/// Rotates `v` by `angle` radians about an axis perpendicular to `v`,
/// constructed from `v x reference` (falling back to any perpendicular
/// axis if `v` is parallel to `reference`), then by `azimuth` about `v`
/// itself. Used both for Compton/Rayleigh scattering and for acollinearity
/// deflection.
#[must_use]
pub fn deflect(v: DVec3, angle: f64, azimuth: f64) -> DVec3 {
    let reference = if v.x.abs() < 0.9 { DVec3::X } else { DVec3::Y };
    let perp = v.cross(reference).normalize();
    let rotated = v * angle.cos() + perp * angle.sin();
    // Rotate `rotated` by `azimuth` about the original axis `v`.
    let k = v;
    rotated * azimuth.cos()
        + k.cross(rotated) * azimuth.sin()
        + k * k.dot(rotated) * (1.0 - azimuth.cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn activity_factor_halves_at_half_life() {
        let iso = Isotope {
            half_life_s: 10.0,
            positron_emiss_prob: 0.97,
            prompt_gamma_energy_mev: 0.0,
            acolinearity_deg_fwhm: 0.5,
            model: PositronRangeModel::None,
            beam: None,
        };
        assert_approx_eq!(f64, iso.activity_factor(10.0), 0.5, epsilon = 1e-9);
        assert_approx_eq!(f64, iso.activity_factor(0.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn expected_photons_accounts_for_prompt_gamma() {
        let no_prompt = Isotope {
            half_life_s: f64::INFINITY,
            positron_emiss_prob: 0.97,
            prompt_gamma_energy_mev: 0.0,
            acolinearity_deg_fwhm: 0.5,
            model: PositronRangeModel::None,
            beam: None,
        };
        assert_approx_eq!(f64, no_prompt.expected_photons_per_decay(), 1.94, epsilon = 1e-9);

        let with_prompt = Isotope {
            prompt_gamma_energy_mev: 0.909,
            ..no_prompt
        };
        assert_approx_eq!(f64, with_prompt.expected_photons_per_decay(), 2.94, epsilon = 1e-9);
    }

    #[test]
    fn beam_isotope_reports_exactly_one_expected_photon() {
        let iso = Isotope {
            half_life_s: f64::INFINITY,
            positron_emiss_prob: 0.0,
            prompt_gamma_energy_mev: 0.0,
            acolinearity_deg_fwhm: 0.0,
            model: PositronRangeModel::None,
            beam: Some(Beam {
                axis: DVec3::X,
                half_angle_rad: 0.1,
                energy_mev: 1.0,
            }),
        };
        assert_approx_eq!(f64, iso.expected_photons_per_decay(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn beam_direction_stays_within_cone_half_angle() {
        let beam = Beam {
            axis: DVec3::X,
            half_angle_rad: 0.2,
            energy_mev: 1.0,
        };
        let mut rng = Rng::new(7);
        for _ in 0..500 {
            let dir = beam.sample_direction(&mut rng);
            assert_approx_eq!(f64, dir.length(), 1.0, epsilon = 1e-9);
            assert!(dir.dot(beam.axis).acos() <= 0.2 + 1e-9);
        }
    }

    #[test]
    fn gauss_range_model_respects_max_range() {
        let model = PositronRangeModel::Gauss {
            fwhm_mm: 1.0,
            max_range_mm: 2.0,
        };
        let mut rng = Rng::new(5);
        for _ in 0..500 {
            let d = model.sample_displacement(&mut rng);
            assert!(d.length() <= 2.0 * MM_TO_CM + 1e-9);
        }
    }

    #[test]
    fn levin_range_model_respects_max_range() {
        let model = PositronRangeModel::LevinExp {
            prob_c: 0.5,
            k1: 10.0,
            k2: 2.0,
            max_range_mm: 3.0,
        };
        let mut rng = Rng::new(6);
        for _ in 0..500 {
            let d = model.sample_displacement(&mut rng);
            assert!(d.length() <= 3.0 * MM_TO_CM + 1e-9);
        }
    }

    #[test]
    fn deflect_preserves_length() {
        let v = DVec3::new(1.0, 0.0, 0.0);
        let d = deflect(v, 0.3, 1.2);
        assert_approx_eq!(f64, d.length(), 1.0, epsilon = 1e-9);
    }
}
