//! Builds a small representative PET-ring scene programmatically, since
//! parsing real scene/material/isotope files is outside this engine's scope.

use gray::geometry::{Cuboid, Cylinder, PrimitiveEnum};
use gray::isotope::{Isotope, PositronRangeModel};
use gray::kdtree::KdTreeConfig;
use gray::material::Material;
use gray::scene::{Scene, ScenePrimitive};
use gray::source::{Sign, Source, SourceShape};
use glam::DVec3;

/// Material index of the non-interactive world medium.
pub const WORLD_MATERIAL: usize = 0;
/// Material index of the water-equivalent phantom.
pub const PHANTOM_MATERIAL: usize = 1;
/// Material index of the dense scintillator detector ring.
pub const DETECTOR_MATERIAL: usize = 2;

fn water() -> Material {
    Material::new(
        PHANTOM_MATERIAL,
        "water",
        1.0,
        false,
        true,
        vec![0.01, 0.1, 0.511, 1.0, 1.5],
        vec![2.0, 0.02, 0.002, 0.0005, 0.0002],
        vec![0.2, 0.17, 0.1, 0.07, 0.06],
        vec![0.05, 0.01, 0.002, 0.0008, 0.0004],
        vec![0.0, 0.5, 1.0, 2.0, 4.0],
        vec![8.0, 4.0, 1.0, 0.2, 0.02],
        vec![0.0, 0.5, 2.0, 5.0, 7.0],
    )
}

fn lso() -> Material {
    Material::new(
        DETECTOR_MATERIAL,
        "lso",
        7.4,
        true,
        true,
        vec![0.01, 0.1, 0.511, 1.0, 1.5],
        vec![40.0, 1.2, 0.09, 0.03, 0.015],
        vec![0.8, 0.4, 0.15, 0.1, 0.08],
        vec![0.3, 0.08, 0.02, 0.006, 0.003],
        vec![0.0, 0.5, 1.0, 2.0, 4.0],
        vec![71.0, 40.0, 10.0, 2.0, 0.2],
        vec![0.0, 0.4, 1.8, 4.5, 6.9],
    )
}

fn world() -> Material {
    Material::new(
        WORLD_MATERIAL,
        "air",
        0.0012,
        false,
        false,
        vec![0.01, 1.5],
        vec![1e-6, 1e-6],
        vec![1e-6, 1e-6],
        vec![1e-6, 1e-6],
        vec![0.0, 10.0],
        vec![1.0, 1.0],
        vec![0.0, 1.0],
    )
}

/// A cylindrical water phantom at the origin surrounded by a ring of
/// `n_detectors` scintillator blocks, with a single F-18-like point source
/// at the centre.
#[must_use]
pub fn build(n_detectors: usize, kdtree_config: &KdTreeConfig) -> (Scene, Vec<Source>, Vec<Isotope>) {
    const PHANTOM_RADIUS: f64 = 10.0;
    const PHANTOM_HALF_HEIGHT: f64 = 10.0;
    const RING_RADIUS: f64 = 40.0;
    const DETECTOR_RADIUS: f64 = 2.0;

    let mut primitives = Vec::new();

    primitives.push(ScenePrimitive {
        shape: PrimitiveEnum::Cylinder(Cylinder::new(
            DVec3::new(0.0, 0.0, -PHANTOM_HALF_HEIGHT),
            DVec3::new(0.0, 0.0, 2.0 * PHANTOM_HALF_HEIGHT),
            PHANTOM_RADIUS,
            true,
        )),
        front_material: PHANTOM_MATERIAL,
        back_material: WORLD_MATERIAL,
        detector_id: None,
    });

    for i in 0..n_detectors {
        let theta = std::f64::consts::TAU * i as f64 / n_detectors as f64;
        let center = DVec3::new(RING_RADIUS * theta.cos(), RING_RADIUS * theta.sin(), 0.0);
        let half_extent = DVec3::splat(DETECTOR_RADIUS);
        primitives.push(ScenePrimitive {
            shape: PrimitiveEnum::Box(Cuboid::new(center - half_extent, center + half_extent)),
            front_material: DETECTOR_MATERIAL,
            back_material: WORLD_MATERIAL,
            detector_id: Some(i),
        });
    }

    let scene = Scene::build(primitives, vec![world(), water(), lso()], WORLD_MATERIAL, kdtree_config)
        .expect("demo scene is internally consistent");

    let sources = vec![Source {
        shape: SourceShape::Sphere {
            center: DVec3::ZERO,
            radius: 1.0,
        },
        activity_bq: 1.0e6,
        isotope_index: 0,
        sign: Sign::Positive,
        material_stack: vec![WORLD_MATERIAL, PHANTOM_MATERIAL],
    }];

    let isotopes = vec![Isotope {
        half_life_s: 6584.0,
        positron_emiss_prob: 0.967,
        prompt_gamma_energy_mev: 0.0,
        acolinearity_deg_fwhm: 0.5,
        model: PositronRangeModel::Gauss {
            fwhm_mm: 1.0,
            max_range_mm: 3.0,
        },
        beam: None,
    }];

    (scene, sources, isotopes)
}
