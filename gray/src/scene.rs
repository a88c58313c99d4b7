//! The immutable scene: primitives, materials, and the k-d tree over them.

use glam::DVec3;

use crate::error::GrayError;
use crate::geometry::{Aabb, Face, Primitive, PrimitiveEnum};
use crate::kdtree::{KdTree, KdTreeConfig};
use crate::material::Material;
use crate::Result;

/// A primitive as it appears in the scene: geometry plus the two materials
/// it separates, which detector it belongs to, and which source (if any)
/// it is associated with.
#[derive(Debug, Clone)]
pub struct ScenePrimitive {
    /// The geometric shape.
    pub shape: PrimitiveEnum,
    /// Material on the side the normal points toward.
    pub front_material: usize,
    /// Material on the side the normal points away from.
    pub back_material: usize,
    /// Detector id if this primitive is sensitive, else `None`.
    pub detector_id: Option<usize>,
}

/// The result of a scene-level ray query: which primitive was hit, at what
/// distance, and the material on the side the ray struck.
#[derive(Debug, Clone, Copy)]
pub struct SceneHit {
    /// Index into [`Scene::primitives`].
    pub primitive_index: usize,
    /// Distance along the ray.
    pub distance: f64,
    /// Which face was hit.
    pub face: Face,
    /// World-space hit position.
    pub position: DVec3,
    /// Material entered ([`Face::Front`]) or expected to be popped ([`Face::Back`]).
    pub material: usize,
    /// Detector id of the primitive hit.
    pub detector_id: Option<usize>,
}

/// Tunable parameters for [`Scene::overlap_self_test`].
#[derive(Debug, Clone, Copy)]
pub struct OverlapTestConfig {
    probes_per_axis: usize,
    failure_threshold: f64,
}

impl OverlapTestConfig {
    /// Number of probe rays cast per axis direction (6 directions total:
    /// +/-x, +/-y, +/-z), arranged on a `probes_per_axis x probes_per_axis`
    /// grid just outside that face of the scene's bounding box.
    #[must_use]
    pub const fn probes_per_axis(&self) -> usize {
        self.probes_per_axis
    }

    /// The fraction of failing rays above which a scene is considered
    /// geometrically unsound.
    #[must_use]
    pub const fn failure_threshold(&self) -> f64 {
        self.failure_threshold
    }

    /// Sets the probe grid resolution.
    #[must_use]
    pub const fn with_probes_per_axis(mut self, n: usize) -> Self {
        self.probes_per_axis = n;
        self
    }

    /// Sets the failure-rate threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: f64) -> Self {
        self.failure_threshold = threshold;
        self
    }
}

impl Default for OverlapTestConfig {
    fn default() -> Self {
        Self {
            probes_per_axis: 400,
            failure_threshold: 0.001,
        }
    }
}

/// The outcome of [`Scene::overlap_self_test`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapTestResult {
    /// Total probe rays cast.
    pub total_rays: usize,
    /// Rays that finished with a non-empty stack or a material mismatch.
    pub failed_rays: usize,
}

impl OverlapTestResult {
    /// Fraction of probe rays that failed.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        if self.total_rays == 0 {
            0.0
        } else {
            self.failed_rays as f64 / self.total_rays as f64
        }
    }

    /// True if the failure rate exceeds `config`'s threshold.
    #[must_use]
    pub fn exceeds(&self, config: &OverlapTestConfig) -> bool {
        self.failure_rate() > config.failure_threshold()
    }
}

/// Scene, materials, and k-d tree, built once and held immutably.
pub struct Scene {
    primitives: Vec<ScenePrimitive>,
    materials: Vec<Material>,
    default_material: usize,
    tree: KdTree,
}

impl Scene {
    /// Builds a scene, validating that every primitive's material indices
    /// are valid and building the k-d tree over the primitive list.
    pub fn build(
        primitives: Vec<ScenePrimitive>,
        materials: Vec<Material>,
        default_material: usize,
        kdtree_config: &KdTreeConfig,
    ) -> Result<Self> {
        for p in &primitives {
            if p.front_material >= materials.len() {
                return Err(GrayError::InvalidMaterialIndex(p.front_material));
            }
            if p.back_material >= materials.len() {
                return Err(GrayError::InvalidMaterialIndex(p.back_material));
            }
        }
        if default_material >= materials.len() {
            return Err(GrayError::InvalidMaterialIndex(default_material));
        }

        let tree = KdTree::build(
            primitives.len(),
            |i| primitives[i].shape.calc_aabb(),
            |i, b| primitives[i].shape.calc_extents_in_box(b),
            kdtree_config,
        )?;

        Ok(Self {
            primitives,
            materials,
            default_material,
            tree,
        })
    }

    /// The scene's primitives, in declaration order.
    #[must_use]
    pub fn primitives(&self) -> &[ScenePrimitive] {
        &self.primitives
    }

    /// The scene's materials, indexed by id.
    #[must_use]
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// The material that fills the unbounded complement of every solid.
    #[must_use]
    pub const fn default_material(&self) -> usize {
        self.default_material
    }

    /// Tight bound over the whole scene.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.tree.bounds()
    }

    /// Finds the nearest intersection along `(origin, dir)` within
    /// `[0, max_dist)`.
    #[must_use]
    pub fn intersect(&self, origin: DVec3, dir: DVec3, max_dist: f64) -> Option<SceneHit> {
        let (idx, t) = self.tree.intersect(origin, dir, max_dist, |i, o, d, max_t| {
            self.primitives[i].shape.find_intersection(o, d, max_t).map(|(t, _)| t)
        })?;

        let prim = &self.primitives[idx];
        let (_, hit) = prim.shape.find_intersection(origin, dir, t + 1e-9)?;
        let material = match hit.face {
            Face::Front => prim.front_material,
            Face::Back => prim.back_material,
        };
        Some(SceneHit {
            primitive_index: idx,
            distance: t,
            face: hit.face,
            position: hit.position,
            material,
            detector_id: (hit.face == Face::Front).then_some(prim.detector_id).flatten(),
        })
    }

    /// Casts a grid of parallel probe rays just outside each of the six
    /// faces of the scene's bounding box, walking each ray's sequence of
    /// intersections while maintaining a material stack: every front face
    /// pushes its material, every back face must pop the same material it
    /// pushed. A ray fails if it ever pops a mismatched material or if the
    /// walk completes with a non-empty stack.
    #[must_use]
    pub fn overlap_self_test(&self, config: &OverlapTestConfig) -> OverlapTestResult {
        let bounds = self.bounds();
        let extent = bounds.max() - bounds.min();
        let margin = extent.max_element().max(1.0) * 0.01;

        let mut total_rays = 0usize;
        let mut failed_rays = 0usize;

        for axis in 0..3 {
            for &sign in &[-1.0, 1.0] {
                let u_axis = (axis + 1) % 3;
                let v_axis = (axis + 2) % 3;
                let mut dir = DVec3::ZERO;
                dir[axis] = -sign;

                for iu in 0..config.probes_per_axis {
                    for iv in 0..config.probes_per_axis {
                        let frac_u = (iu as f64 + 0.5) / config.probes_per_axis as f64;
                        let frac_v = (iv as f64 + 0.5) / config.probes_per_axis as f64;

                        let mut origin = DVec3::ZERO;
                        origin[axis] = if sign > 0.0 {
                            bounds.max_axis(axis) + margin
                        } else {
                            bounds.min_axis(axis) - margin
                        };
                        origin[u_axis] = bounds.min_axis(u_axis) + frac_u * extent[u_axis];
                        origin[v_axis] = bounds.min_axis(v_axis) + frac_v * extent[v_axis];

                        total_rays += 1;
                        if self.walk_overlap_ray(origin, dir).is_err() {
                            failed_rays += 1;
                        }
                    }
                }
            }
        }

        OverlapTestResult { total_rays, failed_rays }
    }

    fn walk_overlap_ray(&self, mut origin: DVec3, dir: DVec3) -> std::result::Result<(), ()> {
        let mut stack: Vec<usize> = Vec::new();
        let mut guard = 0;
        loop {
            guard += 1;
            if guard > 10_000 {
                return Err(());
            }
            let Some(hit) = self.intersect(origin, dir, f64::INFINITY) else {
                break;
            };
            match hit.face {
                Face::Front => stack.push(hit.material),
                Face::Back => {
                    let popped = stack.pop();
                    if popped != Some(hit.material) {
                        return Err(());
                    }
                }
            }
            origin = hit.position + dir * 1e-9;
        }
        if stack.is_empty() {
            Ok(())
        } else {
            Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Sphere;
    use crate::material::Material;

    fn simple_material(index: usize, sensitive: bool) -> Material {
        Material::new(
            index,
            format!("mat{index}"),
            1.0,
            sensitive,
            true,
            vec![0.01, 1.0, 10.0],
            vec![1.0, 0.1, 0.01],
            vec![0.5, 0.2, 0.05],
            vec![0.1, 0.05, 0.01],
            vec![0.0, 5.0, 10.0],
            vec![1.0, 0.5, 0.1],
            vec![0.0, 0.5, 1.0],
        )
    }

    fn single_sphere_scene() -> Scene {
        let world = Material::new(
            0,
            "world",
            0.0,
            false,
            false,
            vec![0.01, 10.0],
            vec![0.0, 0.0],
            vec![0.0, 0.0],
            vec![0.0, 0.0],
            vec![0.0, 10.0],
            vec![0.0, 0.0],
            vec![0.0, 0.0],
        );
        let inside = simple_material(1, true);
        let prim = ScenePrimitive {
            shape: PrimitiveEnum::Sphere(Sphere::new(DVec3::ZERO, 1.0)),
            front_material: 1,
            back_material: 0,
            detector_id: Some(0),
        };
        Scene::build(vec![prim], vec![world, inside], 0, &KdTreeConfig::default()).unwrap()
    }

    #[test]
    fn rejects_invalid_material_index() {
        let world = simple_material(0, false);
        let prim = ScenePrimitive {
            shape: PrimitiveEnum::Sphere(Sphere::new(DVec3::ZERO, 1.0)),
            front_material: 5,
            back_material: 0,
            detector_id: None,
        };
        let result = Scene::build(vec![prim], vec![world], 0, &KdTreeConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn overlap_self_test_passes_on_clean_sphere() {
        let scene = single_sphere_scene();
        let result = scene.overlap_self_test(&OverlapTestConfig::default().with_probes_per_axis(10));
        assert!(result.failure_rate() < 0.01, "failure rate: {}", result.failure_rate());
    }

    #[test]
    fn overlap_self_test_flags_overlapping_geometry() {
        let world = Material::new(
            0,
            "world",
            0.0,
            false,
            false,
            vec![0.01, 10.0],
            vec![0.0, 0.0],
            vec![0.0, 0.0],
            vec![0.0, 0.0],
            vec![0.0, 10.0],
            vec![0.0, 0.0],
            vec![0.0, 0.0],
        );
        let inside_a = simple_material(1, true);
        let inside_b = simple_material(2, true);
        // Two overlapping spheres with distinct interior materials: any
        // ray threading the lens-shaped overlap pushes one material and
        // then is forced to pop a different one, which the self-test
        // must flag as a mismatch.
        let prim_a = ScenePrimitive {
            shape: PrimitiveEnum::Sphere(Sphere::new(DVec3::ZERO, 1.0)),
            front_material: 1,
            back_material: 0,
            detector_id: Some(0),
        };
        let prim_b = ScenePrimitive {
            shape: PrimitiveEnum::Sphere(Sphere::new(DVec3::new(0.6, 0.0, 0.0), 1.0)),
            front_material: 2,
            back_material: 0,
            detector_id: Some(1),
        };
        let scene = Scene::build(
            vec![prim_a, prim_b],
            vec![world, inside_a, inside_b],
            0,
            &KdTreeConfig::default(),
        )
        .unwrap();
        let result = scene.overlap_self_test(&OverlapTestConfig::default().with_probes_per_axis(10));
        assert!(result.failure_rate() > 0.10, "failure rate: {}", result.failure_rate());
    }
}
