//! Source geometries: the spatial distributions nuclear decays are drawn
//! from.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::rng::Rng;

/// A voxelised source, storing per-voxel relative activity on a regular
/// grid. Logical indexing is `[x][y][z]`; the documented on-disk layout
/// (not implemented here, see the binary format in the external
/// interfaces) stores the same data in `[x][z][y]` order, so a loader
/// must permute one axis pair on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoxelSource {
    dims: (usize, usize, usize),
    /// Flattened in `[x][y][z]` order (z fastest-varying).
    weights: Vec<f32>,
}

impl VoxelSource {
    /// Builds a voxel grid from logically `[x][y][z]`-ordered weights.
    #[must_use]
    pub fn new(dims: (usize, usize, usize), weights: Vec<f32>) -> Self {
        assert_eq!(weights.len(), dims.0 * dims.1 * dims.2);
        Self { dims, weights }
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    /// Weight at logical index `(x, y, z)`.
    #[must_use]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.weights[(x * self.dims.1 + y) * self.dims.2 + z]
    }

    /// Serializes to the documented on-disk `[x][z][y]` flat order.
    #[must_use]
    pub fn to_xzy_order(&self) -> Vec<f32> {
        let (nx, ny, nz) = self.dims;
        let mut out = Vec::with_capacity(nx * ny * nz);
        for x in 0..nx {
            for z in 0..nz {
                for y in 0..ny {
                    out.push(self.get(x, y, z));
                }
            }
        }
        out
    }

    /// Reconstructs a [`VoxelSource`] from the on-disk `[x][z][y]` flat
    /// order, permuting back to logical `[x][y][z]`.
    #[must_use]
    pub fn from_xzy_order(dims: (usize, usize, usize), flat: &[f32]) -> Self {
        let (nx, ny, nz) = dims;
        let mut weights = vec![0.0; nx * ny * nz];
        let mut i = 0;
        for x in 0..nx {
            for z in 0..nz {
                for y in 0..ny {
                    weights[(x * ny + y) * nz + z] = flat[i];
                    i += 1;
                }
            }
        }
        Self { dims, weights }
    }

    fn sample_position(&self, rng: &mut Rng) -> DVec3 {
        let total: f64 = self.weights.iter().map(|&w| w as f64).sum();
        let mut target = rng.uniform() * total;
        let (nx, ny, nz) = self.dims;
        for x in 0..nx {
            for y in 0..ny {
                for z in 0..nz {
                    let w = f64::from(self.get(x, y, z));
                    if target < w {
                        return DVec3::new(
                            x as f64 + rng.uniform() - 0.5,
                            y as f64 + rng.uniform() - 0.5,
                            z as f64 + rng.uniform() - 0.5,
                        );
                    }
                    target -= w;
                }
            }
        }
        DVec3::ZERO
    }
}

/// A triangle used only for [`SourceShape::Mesh`] surface sampling, kept
/// independent of `geometry::Triangle` since a source needs area and a
/// surface point, not a ray intersection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeshTriangle {
    /// First vertex.
    pub v0: DVec3,
    /// Second vertex.
    pub v1: DVec3,
    /// Third vertex.
    pub v2: DVec3,
}

impl MeshTriangle {
    fn area(&self) -> f64 {
        (self.v1 - self.v0).cross(self.v2 - self.v0).length() * 0.5
    }

    fn sample_point(&self, rng: &mut Rng) -> DVec3 {
        let mut u = rng.uniform();
        let mut v = rng.uniform();
        if u + v > 1.0 {
            u = 1.0 - u;
            v = 1.0 - v;
        }
        self.v0 + (self.v1 - self.v0) * u + (self.v2 - self.v0) * v
    }
}

/// A parametrised 3-D region a decay position can be sampled from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceShape {
    /// A single point.
    Point(DVec3),
    /// An axis-aligned box, given its center and half-extents.
    Box { center: DVec3, half_extent: DVec3 },
    /// A sphere.
    Sphere { center: DVec3, radius: f64 },
    /// An axis-aligned ellipsoid.
    Ellipsoid { center: DVec3, radii: DVec3 },
    /// A right circular cylinder, axis along z, centered at `center`.
    Cylinder { center: DVec3, radius: f64, half_height: f64 },
    /// A right elliptic cylinder, axis along z.
    EllipticCylinder {
        center: DVec3,
        radius_x: f64,
        radius_y: f64,
        half_height: f64,
    },
    /// An annular (ring) cylinder, axis along z.
    Annulus {
        center: DVec3,
        inner_radius: f64,
        outer_radius: f64,
        half_height: f64,
    },
    /// A voxelised activity grid.
    Voxel(Box<VoxelSource>),
    /// A set of scene triangles; decays are sampled uniformly over the
    /// combined surface area. A surface has no interior, so this variant
    /// is never usable as a negative (subtractive) source.
    Mesh(Vec<MeshTriangle>),
}

impl SourceShape {
    /// Draws a position from this region's spatial distribution.
    pub fn sample_position(&self, rng: &mut Rng) -> DVec3 {
        match self {
            Self::Point(p) => *p,
            Self::Box { center, half_extent } => {
                *center
                    + DVec3::new(
                        rng.uniform_range(-half_extent.x, half_extent.x),
                        rng.uniform_range(-half_extent.y, half_extent.y),
                        rng.uniform_range(-half_extent.z, half_extent.z),
                    )
            }
            Self::Sphere { center, radius } => {
                let r = radius * rng.uniform().cbrt();
                *center + rng.uniform_sphere() * r
            }
            Self::Ellipsoid { center, radii } => {
                let dir = rng.uniform_sphere();
                let r = rng.uniform().cbrt();
                *center + dir * r * *radii
            }
            Self::Cylinder { center, radius, half_height } => {
                *center + Self::sample_disk(rng, *radius) + DVec3::new(0.0, 0.0, rng.uniform_range(-half_height, *half_height))
            }
            Self::EllipticCylinder { center, radius_x, radius_y, half_height } => {
                let theta = rng.uniform_range(0.0, std::f64::consts::TAU);
                let r = rng.uniform().sqrt();
                *center
                    + DVec3::new(radius_x * r * theta.cos(), radius_y * r * theta.sin(), rng.uniform_range(-half_height, *half_height))
            }
            Self::Annulus { center, inner_radius, outer_radius, half_height } => {
                let theta = rng.uniform_range(0.0, std::f64::consts::TAU);
                let r2 = rng.uniform_range(inner_radius * inner_radius, outer_radius * outer_radius);
                let r = r2.sqrt();
                *center + DVec3::new(r * theta.cos(), r * theta.sin(), rng.uniform_range(-half_height, *half_height))
            }
            Self::Voxel(grid) => grid.sample_position(rng),
            Self::Mesh(triangles) => {
                let total_area: f64 = triangles.iter().map(MeshTriangle::area).sum();
                let mut target = rng.uniform() * total_area;
                for tri in triangles {
                    let area = tri.area();
                    if target < area {
                        return tri.sample_point(rng);
                    }
                    target -= area;
                }
                triangles.last().map_or(DVec3::ZERO, |tri| tri.sample_point(rng))
            }
        }
    }

    /// Whether `p` lies inside this region, used by the decay scheduler's
    /// rejection test against negative (subtractive) sources.
    #[must_use]
    pub fn contains(&self, p: DVec3) -> bool {
        match self {
            Self::Point(center) => (p - *center).length_squared() < 1e-18,
            Self::Box { center, half_extent } => {
                let d = (p - *center).abs();
                d.x <= half_extent.x && d.y <= half_extent.y && d.z <= half_extent.z
            }
            Self::Sphere { center, radius } => (p - *center).length_squared() <= radius * radius,
            Self::Ellipsoid { center, radii } => {
                let d = (p - *center) / *radii;
                d.length_squared() <= 1.0
            }
            Self::Cylinder { center, radius, half_height } => {
                let d = p - *center;
                d.z.abs() <= *half_height && d.x * d.x + d.y * d.y <= radius * radius
            }
            Self::EllipticCylinder { center, radius_x, radius_y, half_height } => {
                let d = p - *center;
                d.z.abs() <= *half_height
                    && (d.x / radius_x) * (d.x / radius_x) + (d.y / radius_y) * (d.y / radius_y) <= 1.0
            }
            Self::Annulus { center, inner_radius, outer_radius, half_height } => {
                let d = p - *center;
                let r2 = d.x * d.x + d.y * d.y;
                d.z.abs() <= *half_height && r2 >= inner_radius * inner_radius && r2 <= outer_radius * outer_radius
            }
            Self::Voxel(grid) => {
                let (nx, ny, nz) = grid.dims();
                p.x >= 0.0 && p.y >= 0.0 && p.z >= 0.0 && (p.x as usize) < nx && (p.y as usize) < ny && (p.z as usize) < nz
            }
            // A zero-thickness surface contains no volume to reject against.
            Self::Mesh(_) => false,
        }
    }

    fn sample_disk(rng: &mut Rng, radius: f64) -> DVec3 {
        let theta = rng.uniform_range(0.0, std::f64::consts::TAU);
        let r = radius * rng.uniform().sqrt();
        DVec3::new(r * theta.cos(), r * theta.sin(), 0.0)
    }
}

/// Whether a source adds activity (emits decays) or subtracts it from the
/// union of positive sources via rejection sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sign {
    /// Emits decays.
    Positive,
    /// Subtracts activity from overlapping positive sources.
    Negative,
}

/// A radioactive source: a spatial region, an activity, a reference
/// isotope, and the nested material stack at its centroid.
#[derive(Debug, Clone)]
pub struct Source {
    /// Spatial distribution decay positions are drawn from.
    pub shape: SourceShape,
    /// Activity, becquerels (decays/second at `t = 0`).
    pub activity_bq: f64,
    /// Index into the isotope table.
    pub isotope_index: usize,
    /// Positive (emitting) or negative (subtracting).
    pub sign: Sign,
    /// Material stack at the source's centroid, used to initialise the
    /// transport engine's stack for every decay from this source. Bottom
    /// element is the world's default material.
    pub material_stack: Vec<usize>,
}

impl Source {
    /// Whether a candidate decay position, independently sampled within
    /// this negative source's own region test, should be rejected. The
    /// caller is responsible for first determining that the position lies
    /// inside this source's region; this only applies the activity-ratio
    /// rejection probability.
    #[must_use]
    pub fn rejection_probability(&self, positive_activity: f64) -> f64 {
        (self.activity_bq.abs() / positive_activity).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voxel_source_round_trips_through_xzy_layout() {
        let weights: Vec<f32> = (0..8).map(|i| i as f32 + 0.5).collect();
        let grid = VoxelSource::new((2, 2, 2), weights);
        let on_disk = grid.to_xzy_order();
        let restored = VoxelSource::from_xzy_order((2, 2, 2), &on_disk);

        for x in 0..2 {
            for y in 0..2 {
                for z in 0..2 {
                    assert_eq!(grid.get(x, y, z), restored.get(x, y, z));
                }
            }
        }
    }

    #[test]
    fn sphere_source_samples_stay_within_radius() {
        let shape = SourceShape::Sphere {
            center: DVec3::ZERO,
            radius: 2.0,
        };
        let mut rng = Rng::new(3);
        for _ in 0..500 {
            let p = shape.sample_position(&mut rng);
            assert!(p.length() <= 2.0 + 1e-9);
            assert!(shape.contains(p));
        }
    }

    #[test]
    fn mesh_source_samples_lie_on_the_triangle() {
        let tri = MeshTriangle {
            v0: DVec3::new(0.0, 0.0, 0.0),
            v1: DVec3::new(1.0, 0.0, 0.0),
            v2: DVec3::new(0.0, 1.0, 0.0),
        };
        let shape = SourceShape::Mesh(vec![tri]);
        let mut rng = Rng::new(9);
        for _ in 0..200 {
            let p = shape.sample_position(&mut rng);
            assert!((p.z).abs() < 1e-12);
            assert!(p.x >= -1e-12 && p.y >= -1e-12 && p.x + p.y <= 1.0 + 1e-9);
        }
        assert!(!shape.contains(DVec3::new(0.1, 0.1, 0.0)));
    }

    #[test]
    fn annulus_source_samples_stay_within_ring() {
        let shape = SourceShape::Annulus {
            center: DVec3::ZERO,
            inner_radius: 1.0,
            outer_radius: 2.0,
            half_height: 0.5,
        };
        let mut rng = Rng::new(4);
        for _ in 0..500 {
            let p = shape.sample_position(&mut rng);
            assert!(shape.contains(p));
            let r = (p.x * p.x + p.y * p.y).sqrt();
            assert!((1.0..=2.0).contains(&r));
        }
    }
}
