use enum_dispatch::enum_dispatch;
use glam::DVec3;

use super::Aabb;

/// Which side of a primitive's surface a ray hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    /// The normal points back against the ray (entering the solid).
    Front,
    /// The normal points along the ray (leaving the solid).
    Back,
}

/// Geometric detail of a ray/primitive intersection.
#[derive(Debug, Clone, Copy)]
pub struct HitPoint {
    /// World-space hit position.
    pub position: DVec3,
    /// Outward surface normal at the hit, unit length.
    pub normal: DVec3,
    /// Whether the ray entered ([`Face::Front`]) or left ([`Face::Back`]) the solid.
    pub face: Face,
}

/// The geometric interface every concrete shape implements.
///
/// Shapes that need a tangent-space parameterization (`calc_partials` in
/// the original tool) have no consumer in this engine and are omitted.
#[enum_dispatch]
pub trait Primitive {
    /// Nearest intersection with the ray `(origin, dir)` closer than `max_dist`, if any.
    fn find_intersection(&self, origin: DVec3, dir: DVec3, max_dist: f64) -> Option<(f64, HitPoint)>;

    /// Tight axis-aligned bound of the whole primitive.
    fn calc_aabb(&self) -> Aabb;

    /// Tight axis-aligned bound of the primitive clipped to `clip`, or
    /// `None` if the primitive does not intersect `clip` at all. Used by
    /// the k-d tree builder so a straddling primitive does not inflate the
    /// bounds of every cell it touches.
    fn calc_extents_in_box(&self, clip: Aabb) -> Option<Aabb>;
}

/// Enum-dispatched sum of the concrete shapes this engine implements.
///
/// The interface in [`Primitive`] also describes parallelogram, cone,
/// ellipsoid, torus, and Bezier-patch shapes; their intersection math is
/// out of scope here and they have no variant in this enum.
#[enum_dispatch(Primitive)]
#[derive(Debug, Clone)]
pub enum PrimitiveEnum {
    /// Triangle.
    Triangle(Triangle),
    /// Sphere.
    Sphere(Sphere),
    /// Right circular cylinder, optionally capped.
    Cylinder(Cylinder),
    /// Axis-aligned box.
    Box(Cuboid),
}

/// A triangle with a precomputed normal, plane constant, and
/// barycentric-basis vectors so intersection is a handful of dot products.
#[derive(Debug, Clone)]
pub struct Triangle {
    v0: DVec3,
    e1: DVec3,
    e2: DVec3,
    normal: DVec3,
}

impl Triangle {
    /// Builds a triangle from its three vertices in counter-clockwise winding.
    #[must_use]
    pub fn new(v0: DVec3, v1: DVec3, v2: DVec3) -> Self {
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let normal = e1.cross(e2).normalize();
        Self { v0, e1, e2, normal }
    }
}

impl Primitive for Triangle {
    fn find_intersection(&self, origin: DVec3, dir: DVec3, max_dist: f64) -> Option<(f64, HitPoint)> {
        // Möller-Trumbore.
        const EPS: f64 = 1e-12;
        let pvec = dir.cross(self.e2);
        let det = self.e1.dot(pvec);
        if det.abs() < EPS {
            return None;
        }
        let inv_det = 1.0 / det;
        let tvec = origin - self.v0;
        let u = tvec.dot(pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let qvec = tvec.cross(self.e1);
        let v = dir.dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = self.e2.dot(qvec) * inv_det;
        if t <= EPS || t > max_dist {
            return None;
        }
        let face = if dir.dot(self.normal) < 0.0 {
            Face::Front
        } else {
            Face::Back
        };
        Some((
            t,
            HitPoint {
                position: origin + dir * t,
                normal: self.normal,
                face,
            },
        ))
    }

    fn calc_aabb(&self) -> Aabb {
        let v1 = self.v0 + self.e1;
        let v2 = self.v0 + self.e2;
        let mut b = Aabb::new(self.v0, v1);
        b.enlarge_to_enclose(Aabb::new(v2, v2));
        b
    }

    fn calc_extents_in_box(&self, clip: Aabb) -> Option<Aabb> {
        let b = self.calc_aabb().intersect(clip);
        (!b.is_empty()).then_some(b)
    }
}

/// A sphere.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    center: DVec3,
    radius: f64,
}

impl Sphere {
    /// Builds a sphere from its center and radius.
    #[must_use]
    pub const fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }
}

impl Primitive for Sphere {
    fn find_intersection(&self, origin: DVec3, dir: DVec3, max_dist: f64) -> Option<(f64, HitPoint)> {
        let oc = origin - self.center;
        let b = oc.dot(dir);
        let c = oc.dot(oc) - self.radius * self.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let t_near = -b - sqrt_disc;
        let t_far = -b + sqrt_disc;

        const EPS: f64 = 1e-9;
        let t = if t_near > EPS {
            t_near
        } else if t_far > EPS {
            t_far
        } else {
            return None;
        };
        if t > max_dist {
            return None;
        }

        let position = origin + dir * t;
        let outward_normal = (position - self.center) / self.radius;
        let face = if dir.dot(outward_normal) < 0.0 {
            Face::Front
        } else {
            Face::Back
        };
        Some((
            t,
            HitPoint {
                position,
                normal: outward_normal,
                face,
            },
        ))
    }

    fn calc_aabb(&self) -> Aabb {
        let r = DVec3::splat(self.radius);
        Aabb::new(self.center - r, self.center + r)
    }

    fn calc_extents_in_box(&self, clip: Aabb) -> Option<Aabb> {
        let b = self.calc_aabb().intersect(clip);
        (!b.is_empty()).then_some(b)
    }
}

/// An axis-aligned box, built from the same slab test as [`Aabb`].
#[derive(Debug, Clone, Copy)]
pub struct Cuboid {
    bounds: Aabb,
}

impl Cuboid {
    /// Builds a box from two opposite corners.
    #[must_use]
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self { bounds: Aabb::new(a, b) }
    }

    /// Outward normal of whichever face `p` (assumed to lie on the
    /// boundary) is closest to.
    fn face_normal(&self, p: DVec3) -> DVec3 {
        let min = self.bounds.min();
        let max = self.bounds.max();
        let faces = [
            (p.x - min.x, DVec3::NEG_X),
            (max.x - p.x, DVec3::X),
            (p.y - min.y, DVec3::NEG_Y),
            (max.y - p.y, DVec3::Y),
            (p.z - min.z, DVec3::NEG_Z),
            (max.z - p.z, DVec3::Z),
        ];
        faces
            .into_iter()
            .min_by(|a, b| a.0.abs().partial_cmp(&b.0.abs()).unwrap_or(std::cmp::Ordering::Equal))
            .expect("six faces")
            .1
    }
}

impl Primitive for Cuboid {
    fn find_intersection(&self, origin: DVec3, dir: DVec3, max_dist: f64) -> Option<(f64, HitPoint)> {
        const EPS: f64 = 1e-9;
        let (t_near, t_far) = self.bounds.ray_intersect(origin, dir, EPS, max_dist)?;
        let t = if t_near > EPS { t_near } else { t_far };
        if t <= EPS || t > max_dist {
            return None;
        }

        let position = origin + dir * t;
        let normal = self.face_normal(position);
        let face = if dir.dot(normal) < 0.0 {
            Face::Front
        } else {
            Face::Back
        };
        Some((t, HitPoint { position, normal, face }))
    }

    fn calc_aabb(&self) -> Aabb {
        self.bounds
    }

    fn calc_extents_in_box(&self, clip: Aabb) -> Option<Aabb> {
        let b = self.bounds.intersect(clip);
        (!b.is_empty()).then_some(b)
    }
}

/// A right circular cylinder with its axis along `axis`, optionally capped
/// at both ends.
#[derive(Debug, Clone, Copy)]
pub struct Cylinder {
    base: DVec3,
    axis: DVec3,
    height: f64,
    radius: f64,
    capped: bool,
}

impl Cylinder {
    /// Builds a cylinder from a base point, a (not necessarily unit) axis
    /// vector whose length is the cylinder's height, a radius, and whether
    /// the two end disks are part of the surface.
    #[must_use]
    pub fn new(base: DVec3, axis: DVec3, radius: f64, capped: bool) -> Self {
        let height = axis.length();
        Self {
            base,
            axis: axis / height,
            height,
            radius,
            capped,
        }
    }

    fn cap_hit(&self, origin: DVec3, dir: DVec3, center: DVec3, outward: DVec3, max_dist: f64) -> Option<(f64, HitPoint)> {
        let denom = dir.dot(outward);
        if denom.abs() < 1e-12 {
            return None;
        }
        let t = (center - origin).dot(outward) / denom;
        if t <= 1e-9 || t > max_dist {
            return None;
        }
        let p = origin + dir * t;
        if (p - center).length_squared() > self.radius * self.radius {
            return None;
        }
        let face = if denom < 0.0 { Face::Front } else { Face::Back };
        Some((
            t,
            HitPoint {
                position: p,
                normal: outward,
                face,
            },
        ))
    }
}

impl Primitive for Cylinder {
    fn find_intersection(&self, origin: DVec3, dir: DVec3, max_dist: f64) -> Option<(f64, HitPoint)> {
        let d = origin - self.base;
        let dir_perp = dir - self.axis * dir.dot(self.axis);
        let d_perp = d - self.axis * d.dot(self.axis);

        let a = dir_perp.dot(dir_perp);
        let mut best: Option<(f64, HitPoint)> = None;

        if a > 1e-12 {
            let b = 2.0 * dir_perp.dot(d_perp);
            let c = d_perp.dot(d_perp) - self.radius * self.radius;
            let disc = b * b - 4.0 * a * c;
            if disc >= 0.0 {
                let sqrt_disc = disc.sqrt();
                for t in [(-b - sqrt_disc) / (2.0 * a), (-b + sqrt_disc) / (2.0 * a)] {
                    if t <= 1e-9 || t > max_dist {
                        continue;
                    }
                    let p = origin + dir * t;
                    let h = (p - self.base).dot(self.axis);
                    if h < 0.0 || h > self.height {
                        continue;
                    }
                    let axis_point = self.base + self.axis * h;
                    let outward_normal = (p - axis_point) / self.radius;
                    let face = if dir.dot(outward_normal) < 0.0 {
                        Face::Front
                    } else {
                        Face::Back
                    };
                    let candidate = (
                        t,
                        HitPoint {
                            position: p,
                            normal: outward_normal,
                            face,
                        },
                    );
                    if best.is_none_or(|(bt, _)| t < bt) {
                        best = Some(candidate);
                    }
                }
            }
        }

        if self.capped {
            let top = self.base + self.axis * self.height;
            for (center, outward) in [(self.base, -self.axis), (top, self.axis)] {
                if let Some(candidate) = self.cap_hit(origin, dir, center, outward, max_dist) {
                    if best.is_none_or(|(bt, _)| candidate.0 < bt) {
                        best = Some(candidate);
                    }
                }
            }
        }

        best
    }

    fn calc_aabb(&self) -> Aabb {
        // Conservative bound: the union of bounding spheres at both end caps.
        let top = self.base + self.axis * self.height;
        let r = DVec3::splat(self.radius);
        let mut b = Aabb::new(self.base - r, self.base + r);
        b.enlarge_to_enclose(Aabb::new(top - r, top + r));
        b
    }

    fn calc_extents_in_box(&self, clip: Aabb) -> Option<Aabb> {
        let b = self.calc_aabb().intersect(clip);
        (!b.is_empty()).then_some(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn sphere_hit_from_outside() {
        let s = Sphere::new(DVec3::ZERO, 1.0);
        let (t, hit) = s
            .find_intersection(DVec3::new(-5.0, 0.0, 0.0), DVec3::X, f64::INFINITY)
            .unwrap();
        assert_approx_eq!(f64, t, 4.0);
        assert_eq!(hit.face, Face::Front);
        assert_approx_eq!(f64, hit.normal.x, -1.0);
    }

    #[test]
    fn sphere_hit_from_inside_is_back_face() {
        let s = Sphere::new(DVec3::ZERO, 1.0);
        let (_, hit) = s
            .find_intersection(DVec3::ZERO, DVec3::X, f64::INFINITY)
            .unwrap();
        assert_eq!(hit.face, Face::Back);
    }

    #[test]
    fn triangle_hit_inside_barycentric_range() {
        let tri = Triangle::new(
            DVec3::new(-1.0, -1.0, 0.0),
            DVec3::new(1.0, -1.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        );
        let (t, _) = tri
            .find_intersection(DVec3::new(0.0, 0.0, -5.0), DVec3::Z, f64::INFINITY)
            .unwrap();
        assert_approx_eq!(f64, t, 5.0);
    }

    #[test]
    fn triangle_miss_outside_edges() {
        let tri = Triangle::new(
            DVec3::new(-1.0, -1.0, 0.0),
            DVec3::new(1.0, -1.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        );
        let hit = tri.find_intersection(DVec3::new(5.0, 5.0, -5.0), DVec3::Z, f64::INFINITY);
        assert!(hit.is_none());
    }

    #[test]
    fn capped_cylinder_hits_side_wall() {
        let cyl = Cylinder::new(DVec3::ZERO, DVec3::new(0.0, 0.0, 2.0), 1.0, true);
        let (_, hit) = cyl
            .find_intersection(DVec3::new(-5.0, 0.0, 1.0), DVec3::X, f64::INFINITY)
            .unwrap();
        assert_approx_eq!(f64, hit.normal.length(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn capped_cylinder_hits_end_cap_along_axis() {
        let cyl = Cylinder::new(DVec3::ZERO, DVec3::new(0.0, 0.0, 2.0), 1.0, true);
        let (t, hit) = cyl
            .find_intersection(DVec3::new(0.0, 0.0, -5.0), DVec3::Z, f64::INFINITY)
            .unwrap();
        assert_approx_eq!(f64, t, 5.0);
        assert_approx_eq!(f64, hit.normal.z, -1.0);
    }

    #[test]
    fn box_hit_from_outside_reports_face_normal() {
        let cuboid = Cuboid::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        let (t, hit) = cuboid
            .find_intersection(DVec3::new(-5.0, 0.0, 0.0), DVec3::X, f64::INFINITY)
            .unwrap();
        assert_approx_eq!(f64, t, 4.0);
        assert_eq!(hit.face, Face::Front);
        assert_approx_eq!(f64, hit.normal.x, -1.0);
    }

    #[test]
    fn box_hit_from_inside_is_back_face() {
        let cuboid = Cuboid::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        let (t, hit) = cuboid.find_intersection(DVec3::ZERO, DVec3::X, f64::INFINITY).unwrap();
        assert_approx_eq!(f64, t, 1.0);
        assert_eq!(hit.face, Face::Back);
        assert_approx_eq!(f64, hit.normal.x, 1.0);
    }
}
