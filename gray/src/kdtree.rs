//! Spatial acceleration structure: a k-d tree built by Surface-Area-Heuristic
//! cost minimisation, traversed with an explicit stack.

use glam::DVec3;

use crate::geometry::Aabb;

/// Tunable parameters for [`KdTree::build`].
#[derive(Debug, Clone, Copy)]
pub struct KdTreeConfig {
    traversal_cost: f64,
    object_cost: f64,
    max_leaf_size: usize,
}

impl KdTreeConfig {
    /// Cost charged for descending one level of the tree, relative to
    /// `object_cost`.
    #[must_use]
    pub const fn traversal_cost(&self) -> f64 {
        self.traversal_cost
    }

    /// Per-primitive intersection-test cost weight in the SAH formula.
    #[must_use]
    pub const fn object_cost(&self) -> f64 {
        self.object_cost
    }

    /// Leaves at or below this many primitives are never split further.
    #[must_use]
    pub const fn max_leaf_size(&self) -> usize {
        self.max_leaf_size
    }

    /// Sets the traversal cost.
    #[must_use]
    pub const fn with_traversal_cost(mut self, cost: f64) -> Self {
        self.traversal_cost = cost;
        self
    }

    /// Sets the per-object intersection cost.
    #[must_use]
    pub const fn with_object_cost(mut self, cost: f64) -> Self {
        self.object_cost = cost;
        self
    }

    /// Sets the maximum leaf size.
    #[must_use]
    pub const fn with_max_leaf_size(mut self, size: usize) -> Self {
        self.max_leaf_size = size;
        self
    }
}

impl Default for KdTreeConfig {
    fn default() -> Self {
        Self {
            traversal_cost: 1.0,
            object_cost: 8.0,
            max_leaf_size: 4,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        primitives: Vec<usize>,
    },
    Internal {
        axis: usize,
        split: f64,
        left: usize,
        right: usize,
        bounds: Aabb,
    },
}

/// A k-d tree over the axis-aligned bounds of a fixed set of primitives.
/// The tree owns no primitive data; nodes hold indices into whatever
/// primitive list the caller built the tree from.
#[derive(Debug, Clone)]
pub struct KdTree {
    nodes: Vec<Node>,
    root: usize,
    bounds: Aabb,
}

struct BuildEntry {
    index: usize,
    aabb: Aabb,
}

impl KdTree {
    /// Builds a tree over `n` primitives. `extent(i)` returns the tight
    /// bound of primitive `i`; `extent_in_box(i, box)` returns the tight
    /// bound of primitive `i` clipped to `box`, or `None` if it does not
    /// intersect `box` (used to avoid over-estimating a straddling
    /// primitive's extent inside a candidate cell).
    pub fn build(
        n: usize,
        extent: impl Fn(usize) -> Aabb,
        extent_in_box: impl Fn(usize, Aabb) -> Option<Aabb>,
        config: &KdTreeConfig,
    ) -> crate::Result<Self> {
        if n == 0 {
            return Err(crate::GrayError::EmptyScene);
        }

        let mut scene_bounds = extent(0);
        let mut entries: Vec<BuildEntry> = (0..n)
            .map(|i| {
                let aabb = extent(i);
                BuildEntry { index: i, aabb }
            })
            .collect();
        for e in &entries[1..] {
            scene_bounds.enlarge_to_enclose(e.aabb);
        }

        let mut nodes = Vec::new();
        let root = Self::build_recursive(&mut entries, scene_bounds, &extent_in_box, config, &mut nodes);
        Ok(Self {
            nodes,
            root,
            bounds: scene_bounds,
        })
    }

    fn build_recursive(
        entries: &mut Vec<BuildEntry>,
        bounds: Aabb,
        extent_in_box: &impl Fn(usize, Aabb) -> Option<Aabb>,
        config: &KdTreeConfig,
        nodes: &mut Vec<Node>,
    ) -> usize {
        let leaf_cost = config.object_cost * entries.len() as f64;
        if entries.len() <= config.max_leaf_size {
            return Self::push_leaf(entries, nodes);
        }

        let axis = Self::widest_axis(bounds);
        let parent_sa = bounds.surface_area();
        if parent_sa <= 0.0 {
            return Self::push_leaf(entries, nodes);
        }

        let mut candidates: Vec<f64> = entries
            .iter()
            .flat_map(|e| [e.aabb.min_axis(axis), e.aabb.max_axis(axis)])
            .collect();
        candidates.sort_by(f64::total_cmp);
        candidates.dedup_by(|a, b| (*a - *b).abs() < 1e-12);

        let mut best: Option<(f64, f64)> = None; // (split position, cost)
        for &split in &candidates {
            if split <= bounds.min_axis(axis) || split >= bounds.max_axis(axis) {
                continue;
            }
            let mut left_n = 0usize;
            let mut right_n = 0usize;
            let mut left_bounds = None::<Aabb>;
            let mut right_bounds = None::<Aabb>;
            for e in entries.iter() {
                if e.aabb.min_axis(axis) < split {
                    left_n += 1;
                    match &mut left_bounds {
                        Some(b) => b.enlarge_to_enclose(e.aabb),
                        None => left_bounds = Some(e.aabb),
                    }
                }
                if e.aabb.max_axis(axis) > split {
                    right_n += 1;
                    match &mut right_bounds {
                        Some(b) => b.enlarge_to_enclose(e.aabb),
                        None => right_bounds = Some(e.aabb),
                    }
                }
            }
            let sa_l = left_bounds.map_or(0.0, |b| b.surface_area());
            let sa_r = right_bounds.map_or(0.0, |b| b.surface_area());
            let cost = config.traversal_cost
                + config.object_cost * (sa_l * left_n as f64 + sa_r * right_n as f64) / parent_sa;
            if best.is_none_or(|(_, best_cost)| cost < best_cost) {
                best = Some((split, cost));
            }
        }

        let Some((split, cost)) = best else {
            return Self::push_leaf(entries, nodes);
        };
        if cost >= leaf_cost {
            return Self::push_leaf(entries, nodes);
        }

        let mut left_entries = Vec::new();
        let mut right_entries = Vec::new();
        for e in entries.drain(..) {
            let goes_left = e.aabb.min_axis(axis) < split;
            let goes_right = e.aabb.max_axis(axis) > split;
            if goes_left {
                let clipped_box = Self::clip_box(bounds, axis, bounds.min_axis(axis), split);
                let aabb = extent_in_box(e.index, clipped_box).unwrap_or(e.aabb);
                left_entries.push(BuildEntry { index: e.index, aabb });
            }
            if goes_right || !goes_left {
                let clipped_box = Self::clip_box(bounds, axis, split, bounds.max_axis(axis));
                let aabb = extent_in_box(e.index, clipped_box).unwrap_or(e.aabb);
                right_entries.push(BuildEntry { index: e.index, aabb });
            }
        }

        if left_entries.is_empty() || right_entries.is_empty() {
            // Degenerate split (can happen with coincident bounds); fall
            // back to a leaf rather than recursing forever.
            let mut all = left_entries;
            all.append(&mut right_entries);
            return Self::push_leaf(&mut all, nodes);
        }

        let left_bounds = Self::clip_box(bounds, axis, bounds.min_axis(axis), split);
        let right_bounds = Self::clip_box(bounds, axis, split, bounds.max_axis(axis));

        let left = Self::build_recursive(&mut left_entries, left_bounds, extent_in_box, config, nodes);
        let right = Self::build_recursive(&mut right_entries, right_bounds, extent_in_box, config, nodes);

        nodes.push(Node::Internal {
            axis,
            split,
            left,
            right,
            bounds,
        });
        nodes.len() - 1
    }

    fn push_leaf(entries: &mut Vec<BuildEntry>, nodes: &mut Vec<Node>) -> usize {
        let primitives = entries.iter().map(|e| e.index).collect();
        nodes.push(Node::Leaf { primitives });
        nodes.len() - 1
    }

    fn widest_axis(bounds: Aabb) -> usize {
        let d = bounds.max() - bounds.min();
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    fn clip_box(bounds: Aabb, axis: usize, lo: f64, hi: f64) -> Aabb {
        let mut min = bounds.min();
        let mut max = bounds.max();
        min[axis] = lo;
        max[axis] = hi;
        Aabb::new(min, max)
    }

    /// Tight bound over every primitive the tree was built from.
    #[must_use]
    pub const fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Finds the nearest primitive hit along `(origin, dir)` within
    /// `[0, max_dist)`. `test_hit(primitive_index, origin, dir, current_max)`
    /// must return the hit distance if the primitive is intersected closer
    /// than `current_max`, or `None` otherwise. Ties are broken toward the
    /// lower primitive index, matching a linear scan's natural order.
    pub fn intersect(
        &self,
        origin: DVec3,
        dir: DVec3,
        max_dist: f64,
        mut test_hit: impl FnMut(usize, DVec3, DVec3, f64) -> Option<f64>,
    ) -> Option<(usize, f64)> {
        if self.nodes.is_empty() {
            return None;
        }
        let (t0, t1) = self.bounds.ray_intersect(origin, dir, 0.0, max_dist)?;

        let mut stack = vec![(self.root, t0, t1)];
        let mut best: Option<(usize, f64)> = None;
        let mut current_max = max_dist;

        while let Some((node_idx, t_near, t_far)) = stack.pop() {
            if t_near > current_max {
                continue;
            }
            match &self.nodes[node_idx] {
                Node::Leaf { primitives } => {
                    for &prim in primitives {
                        if let Some(t) = test_hit(prim, origin, dir, current_max) {
                            if t > current_max {
                                continue;
                            }
                            let replace = match best {
                                None => true,
                                Some((best_i, best_t)) => {
                                    t < best_t - 1e-12 || ((t - best_t).abs() <= 1e-12 && prim < best_i)
                                }
                            };
                            if replace {
                                best = Some((prim, t));
                                current_max = current_max.min(t);
                            }
                        }
                    }
                }
                Node::Internal { axis, split, left, right, .. } => {
                    let inv_dir = 1.0 / dir[*axis];
                    let t_split = (split - origin[*axis]) * inv_dir;
                    let (near, far) = if dir[*axis] >= 0.0 {
                        (*left, *right)
                    } else {
                        (*right, *left)
                    };
                    if t_split > t_far || t_split.is_nan() {
                        stack.push((near, t_near, t_far));
                    } else if t_split < t_near {
                        stack.push((far, t_near, t_far));
                    } else {
                        stack.push((far, t_split, t_far));
                        stack.push((near, t_near, t_split));
                    }
                }
            }
        }

        best
    }
}
