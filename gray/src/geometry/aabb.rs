use glam::DVec3;

/// Axis-aligned bounding box, `min.k <= max.k` on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    min: DVec3,
    max: DVec3,
}

impl Aabb {
    /// Constructs a box from two corners, taking the componentwise min/max
    /// so the caller doesn't have to order them.
    #[must_use]
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// The box's lower corner.
    #[must_use]
    pub const fn min(&self) -> DVec3 {
        self.min
    }

    /// The box's upper corner.
    #[must_use]
    pub const fn max(&self) -> DVec3 {
        self.max
    }

    /// Grows the box to additionally contain `other`.
    pub fn enlarge_to_enclose(&mut self, other: Self) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// The set-intersection of two boxes. May come back empty (`min.k >
    /// max.k` on some axis); callers that care should check
    /// [`Self::is_empty`].
    #[must_use]
    pub fn intersect(&self, other: Self) -> Self {
        Self {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }

    /// True if the box has collapsed to nothing on any axis.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Surface area of the box, used by the SAH cost function. Zero for a
    /// degenerate (empty or flat) box.
    #[must_use]
    pub fn surface_area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.max - self.min;
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Component along `axis` (0 = x, 1 = y, 2 = z) of the lower corner.
    #[must_use]
    pub fn min_axis(&self, axis: usize) -> f64 {
        self.min[axis]
    }

    /// Component along `axis` of the upper corner.
    #[must_use]
    pub fn max_axis(&self, axis: usize) -> f64 {
        self.max[axis]
    }

    /// True if `p` lies within the box on every axis (inclusive).
    #[must_use]
    pub fn contains(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Slab-method ray/box intersection clipped to `(t0, t1)`.
    ///
    /// Relies on IEEE-754 division-by-zero semantics: a zero direction
    /// component produces `+inf`/`-inf`, which the `min`/`max` below sort
    /// to the correct slab bound automatically, so no branch is needed
    /// for axis-parallel rays.
    #[must_use]
    pub fn ray_intersect(&self, origin: DVec3, dir: DVec3, t0: f64, t1: f64) -> Option<(f64, f64)> {
        let inv_dir = DVec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);

        let mut t_min = t0;
        let mut t_max = t1;

        for axis in 0..3 {
            let mut t_near = (self.min[axis] - origin[axis]) * inv_dir[axis];
            let mut t_far = (self.max[axis] - origin[axis]) * inv_dir[axis];
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }
            t_min = t_min.max(t_near);
            t_max = t_max.min(t_far);
            if t_min > t_max {
                return None;
            }
        }

        Some((t_min, t_max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn union_is_componentwise_min_max() {
        let a = Aabb::new(DVec3::new(0.0, -1.0, 2.0), DVec3::new(1.0, 1.0, 3.0));
        let b = Aabb::new(DVec3::new(-2.0, 0.0, -5.0), DVec3::new(0.5, 4.0, 1.0));
        let mut u = a;
        u.enlarge_to_enclose(b);
        assert_eq!(u.min(), DVec3::new(-2.0, -1.0, -5.0));
        assert_eq!(u.max(), DVec3::new(1.0, 4.0, 3.0));
    }

    #[test]
    fn intersect_empty_agrees_with_direct_predicate() {
        let a = Aabb::new(DVec3::splat(0.0), DVec3::splat(1.0));
        let b = Aabb::new(DVec3::splat(2.0), DVec3::splat(3.0));
        let i = a.intersect(b);
        assert!(i.is_empty());

        let c = Aabb::new(DVec3::splat(0.5), DVec3::splat(1.5));
        let j = a.intersect(c);
        assert!(!j.is_empty());
        assert_eq!(j.min(), DVec3::splat(0.5));
        assert_eq!(j.max(), DVec3::splat(1.0));
    }

    #[test]
    fn ray_intersect_hits_unit_cube() {
        let b = Aabb::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        let (t_min, t_max) = b
            .ray_intersect(DVec3::new(-5.0, 0.0, 0.0), DVec3::X, 0.0, f64::INFINITY)
            .unwrap();
        assert_approx_eq!(f64, t_min, 4.0);
        assert_approx_eq!(f64, t_max, 6.0);
    }

    #[test]
    fn ray_intersect_handles_zero_direction_component() {
        let b = Aabb::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        // Ray travels parallel to the x=0 plane, offset outside the box on y.
        let hit = b.ray_intersect(DVec3::new(0.0, 5.0, 0.0), DVec3::new(1.0, 0.0, 0.0), 0.0, 100.0);
        assert!(hit.is_none());
    }

    #[test]
    fn ray_intersect_misses_box_behind_origin() {
        let b = Aabb::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        let hit = b.ray_intersect(DVec3::new(5.0, 0.0, 0.0), DVec3::X, 0.0, f64::INFINITY);
        assert!(hit.is_none());
    }

    #[test]
    fn surface_area_of_unit_cube() {
        let b = Aabb::new(DVec3::splat(0.0), DVec3::splat(1.0));
        assert_approx_eq!(f64, b.surface_area(), 6.0);
    }
}
