//! SAH-based BVH builder behind [`HostDevice::build_accel`].
//!
//! Builds a flat node array over primitive bounds. Binned SAH picks the
//! split, an explicit stack replaces recursion.
//!
//! [`HostDevice::build_accel`]: super::HostDevice

use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;

/// Number of SAH bins for split evaluation.
const NUM_BINS: usize = 12;

const TRAVERSAL_COST: f32 = 1.0;
const INTERSECT_COST: f32 = 1.0;

/// Maximum primitives per leaf before forcing a split.
const MAX_LEAF_SIZE: usize = 4;

/// Below this many primitives centroids are computed serially.
const PARALLEL_THRESHOLD: usize = 4096;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: [f32::INFINITY; 3],
        max: [f32::NEG_INFINITY; 3],
    };

    #[inline]
    pub fn grow_point(&mut self, p: [f32; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    #[inline]
    pub fn grow(&mut self, other: &Aabb) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Surface area (for SAH cost).
    #[inline]
    pub fn area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let dx = self.max[0] - self.min[0];
        let dy = self.max[1] - self.min[1];
        let dz = self.max[2] - self.min[2];
        2.0 * (dx * dy + dy * dz + dz * dx)
    }

    #[inline]
    pub fn centroid(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }
}

/// Flat BVH node (32 bytes).
///
/// Internal node: `left_or_first` = left child index, `count` = 0.
/// Leaf node: `left_or_first` = first entry in `prim_indices`, `count` > 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub aabb_min: [f32; 3],
    pub left_or_first: u32,
    pub aabb_max: [f32; 3],
    pub count: u32,
}

impl BvhNode {
    fn leaf(aabb: &Aabb, first: usize, count: usize) -> Self {
        Self {
            aabb_min: aabb.min,
            left_or_first: first as u32,
            aabb_max: aabb.max,
            count: count as u32,
        }
    }

    fn interior(aabb: &Aabb, left: usize) -> Self {
        Self {
            aabb_min: aabb.min,
            left_or_first: left as u32,
            aabb_max: aabb.max,
            count: 0,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

pub struct Bvh {
    /// Index 0 is the root.
    pub nodes: Vec<BvhNode>,
    /// Primitive order referenced by leaves.
    pub prim_indices: Vec<u32>,
}

impl Bvh {
    pub fn bounds(&self) -> Aabb {
        match self.nodes.first() {
            Some(root) if !self.prim_indices.is_empty() => Aabb {
                min: root.aabb_min,
                max: root.aabb_max,
            },
            _ => Aabb::EMPTY,
        }
    }
}

struct Bin {
    bounds: Aabb,
    count: usize,
}

/// Build a BVH over primitive bounds.
#[tracing::instrument(skip_all, fields(prim_count = aabbs.len()))]
pub fn build_bvh(aabbs: &[Aabb]) -> Bvh {
    let n = aabbs.len();
    if n == 0 {
        return Bvh {
            nodes: vec![BvhNode::zeroed()],
            prim_indices: vec![],
        };
    }

    let centroids: Vec<[f32; 3]> = if n >= PARALLEL_THRESHOLD {
        aabbs.par_iter().map(Aabb::centroid).collect()
    } else {
        aabbs.iter().map(Aabb::centroid).collect()
    };

    let mut indices: Vec<usize> = (0..n).collect();
    let mut nodes: Vec<BvhNode> = Vec::with_capacity(2 * n);
    nodes.push(BvhNode::zeroed());

    struct Task {
        node_idx: usize,
        start: usize,
        end: usize, // exclusive
    }

    let mut stack = vec![Task {
        node_idx: 0,
        start: 0,
        end: n,
    }];

    while let Some(task) = stack.pop() {
        let (start, end) = (task.start, task.end);
        let count = end - start;

        let mut node_aabb = Aabb::EMPTY;
        for &idx in &indices[start..end] {
            node_aabb.grow(&aabbs[idx]);
        }

        if count <= MAX_LEAF_SIZE {
            nodes[task.node_idx] = BvhNode::leaf(&node_aabb, start, count);
            continue;
        }

        let mut centroid_bounds = Aabb::EMPTY;
        for &idx in &indices[start..end] {
            centroid_bounds.grow_point(centroids[idx]);
        }

        let (best_axis, best_split_pos, best_cost) =
            find_best_split(&indices[start..end], aabbs, &centroids, &centroid_bounds);

        let leaf_cost = count as f32 * INTERSECT_COST * node_aabb.area();
        if best_axis == usize::MAX || best_cost >= leaf_cost {
            nodes[task.node_idx] = BvhNode::leaf(&node_aabb, start, count);
            continue;
        }

        let mid = partition(&mut indices[start..end], |&idx| centroids[idx][best_axis] < best_split_pos) + start;
        let mid = if mid == start || mid == end { (start + end) / 2 } else { mid };

        let left_idx = nodes.len();
        nodes.push(BvhNode::zeroed());
        nodes.push(BvhNode::zeroed());
        nodes[task.node_idx] = BvhNode::interior(&node_aabb, left_idx);

        // right first so the left subtree is laid out next
        stack.push(Task {
            node_idx: left_idx + 1,
            start: mid,
            end,
        });
        stack.push(Task {
            node_idx: left_idx,
            start,
            end: mid,
        });
    }

    Bvh {
        nodes,
        prim_indices: indices.into_iter().map(|i| i as u32).collect(),
    }
}

/// Binned SAH split search across all 3 axes.
/// Returns (axis, split position, cost); axis is `usize::MAX` if nothing splits.
fn find_best_split(
    indices: &[usize],
    aabbs: &[Aabb],
    centroids: &[[f32; 3]],
    centroid_bounds: &Aabb,
) -> (usize, f32, f32) {
    let mut best_axis = usize::MAX;
    let mut best_pos = 0.0f32;
    let mut best_cost = f32::INFINITY;

    for axis in 0..3 {
        let extent = centroid_bounds.max[axis] - centroid_bounds.min[axis];
        if extent < 1e-8 {
            continue;
        }

        let mut bins: Vec<Bin> = (0..NUM_BINS)
            .map(|_| Bin {
                bounds: Aabb::EMPTY,
                count: 0,
            })
            .collect();
        let inv_extent = NUM_BINS as f32 / extent;

        for &idx in indices {
            let bin_id = ((centroids[idx][axis] - centroid_bounds.min[axis]) * inv_extent) as usize;
            let bin = &mut bins[bin_id.min(NUM_BINS - 1)];
            bin.bounds.grow(&aabbs[idx]);
            bin.count += 1;
        }

        let mut left_area = [0.0f32; NUM_BINS - 1];
        let mut left_count = [0usize; NUM_BINS - 1];
        let mut sweep = Aabb::EMPTY;
        let mut sweep_count = 0;
        for i in 0..NUM_BINS - 1 {
            sweep.grow(&bins[i].bounds);
            sweep_count += bins[i].count;
            left_area[i] = sweep.area();
            left_count[i] = sweep_count;
        }

        sweep = Aabb::EMPTY;
        sweep_count = 0;
        for i in (1..NUM_BINS).rev() {
            sweep.grow(&bins[i].bounds);
            sweep_count += bins[i].count;
            let cost = TRAVERSAL_COST
                + INTERSECT_COST * (left_count[i - 1] as f32 * left_area[i - 1] + sweep_count as f32 * sweep.area());
            if cost < best_cost {
                best_cost = cost;
                best_axis = axis;
                best_pos = centroid_bounds.min[axis] + (i as f32 / NUM_BINS as f32) * extent;
            }
        }
    }

    (best_axis, best_pos, best_cost)
}

/// Partition in place. Returns the number of elements where `pred` holds.
fn partition<T, F>(slice: &mut [T], pred: F) -> usize
where
    F: Fn(&T) -> bool,
{
    let mut left = 0;
    let mut right = slice.len();
    while left < right {
        if pred(&slice[left]) {
            left += 1;
        } else {
            right -= 1;
            slice.swap(left, right);
        }
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(cx: f32) -> Aabb {
        Aabb {
            min: [cx - 0.5, -0.5, -0.5],
            max: [cx + 0.5, 0.5, 0.5],
        }
    }

    #[test]
    fn test_empty_bvh() {
        let bvh = build_bvh(&[]);
        assert_eq!(bvh.nodes.len(), 1);
        assert!(bvh.prim_indices.is_empty());
        assert!(bvh.bounds().is_empty());
    }

    #[test]
    fn test_small_input_is_single_leaf() {
        let boxes: Vec<Aabb> = (0..3).map(|i| unit_box(i as f32)).collect();
        let bvh = build_bvh(&boxes);
        assert_eq!(bvh.nodes.len(), 1);
        assert!(bvh.nodes[0].is_leaf());
        assert_eq!(bvh.nodes[0].count, 3);
    }

    #[test]
    fn test_many_primitives_build_tree() {
        let boxes: Vec<Aabb> = (0..100).map(|i| unit_box(i as f32 * 2.0)).collect();
        let bvh = build_bvh(&boxes);
        assert!(bvh.nodes.len() > 1);

        let mut sorted = bvh.prim_indices.clone();
        sorted.sort();
        assert_eq!(sorted, (0..100).collect::<Vec<u32>>());

        let root = bvh.bounds();
        assert_eq!(root.min[0], -0.5);
        assert_eq!(root.max[0], 198.5);
    }

    #[test]
    fn test_leaves_cover_every_primitive_once() {
        let boxes: Vec<Aabb> = (0..37).map(|i| unit_box((i % 7) as f32 * 3.0 + i as f32 * 0.01)).collect();
        let bvh = build_bvh(&boxes);
        let covered: usize = bvh.nodes.iter().filter(|n| n.is_leaf()).map(|n| n.count as usize).sum();
        assert_eq!(covered, 37);
    }
}
