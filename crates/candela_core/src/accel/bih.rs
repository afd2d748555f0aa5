use std::sync::Arc;

use candela_math::{Aabb, Ray};

use super::AccelerationStructure;
use crate::isect::{IntersectionState, StackFrame, MAX_STACK_SIZE};
use crate::primitive::PrimitiveList;

/// Shrink a node to the tight bound of its contents whenever the tight
/// bound is smaller than the nominal box by more than this factor. The
/// constant is empirical; there is no derivation to repeat.
const CLIP_THRESHOLD: f32 = 1.3;

const MAX_DEPTH: usize = MAX_STACK_SIZE;

/// One node of the interval hierarchy.
///
/// `Split` children are stored consecutively (left at `children`, right at
/// `children + 1`) and carry the clip planes of both sides, so the
/// traversal can order near/far purely from the ray direction sign.
/// `Clip` nodes narrow the valid interval on one axis and forward to a
/// single child; they encode both the empty-space removal and one-sided
/// splits (with an infinite plane on the open side).
#[derive(Debug, Clone, Copy)]
enum BihNode {
    Leaf {
        start: u32,
        count: u32,
    },
    Split {
        axis: u8,
        clip_left: f32,
        clip_right: f32,
        children: u32,
    },
    Clip {
        axis: u8,
        lo: f32,
        hi: f32,
        child: u32,
    },
}

/// Bounding interval hierarchy.
///
/// Built by recursive median splits along the longest axis of a shrinking
/// grid box, with lossless empty-space removal before each split. Falls
/// back to a leaf when a split makes no progress or the depth/leaf-size
/// limits are reached.
pub struct BoundingIntervalHierarchy {
    nodes: Vec<BihNode>,
    objects: Vec<u32>,
    primitives: Option<Arc<dyn PrimitiveList>>,
    bounds: Aabb,
    max_prims: usize,
}

impl BoundingIntervalHierarchy {
    pub fn new() -> Self {
        Self::with_max_prims(2)
    }

    pub fn with_max_prims(max_prims: usize) -> Self {
        Self {
            nodes: Vec::new(),
            objects: Vec::new(),
            primitives: None,
            bounds: Aabb::empty(),
            max_prims,
        }
    }

    /// Reconstruct the primitive set reachable through the leaves.
    #[cfg(test)]
    pub(crate) fn collect_primitives(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for node in &self.nodes {
            if let BihNode::Leaf { start, count } = *node {
                for i in start..start + count {
                    out.push(self.objects[i as usize] as usize);
                }
            }
        }
        out
    }
}

impl Default for BoundingIntervalHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct BuildStats {
    num_nodes: usize,
    num_leaves: usize,
    num_clip: usize,
    sum_objects: usize,
    max_objects: usize,
    max_depth: usize,
    sum_depth: usize,
}

impl BuildStats {
    fn inner(&mut self) {
        self.num_nodes += 1;
    }

    fn clip_node(&mut self) {
        self.num_clip += 1;
    }

    fn leaf(&mut self, depth: usize, n: usize) {
        self.num_leaves += 1;
        self.sum_objects += n;
        self.max_objects = self.max_objects.max(n);
        self.max_depth = self.max_depth.max(depth);
        self.sum_depth += depth;
    }

    fn log(&self) {
        log::debug!("interval hierarchy stats:");
        log::debug!("  * nodes:   {} ({} clip)", self.num_nodes + self.num_clip, self.num_clip);
        log::debug!(
            "  * leaves:  {} (avg {:.2} objects, max {})",
            self.num_leaves,
            self.sum_objects as f64 / self.num_leaves.max(1) as f64,
            self.max_objects
        );
        log::debug!(
            "  * depth:   avg {:.2}, max {}",
            self.sum_depth as f64 / self.num_leaves.max(1) as f64,
            self.max_depth
        );
    }
}

struct Builder<'a> {
    primitives: &'a dyn PrimitiveList,
    objects: &'a mut [u32],
    nodes: &'a mut Vec<BihNode>,
    max_prims: usize,
    stats: BuildStats,
}

impl Builder<'_> {
    fn alloc(&mut self, count: usize) -> usize {
        let first = self.nodes.len();
        for _ in 0..count {
            self.nodes.push(BihNode::Leaf { start: 0, count: 0 });
        }
        first
    }

    fn make_leaf(&mut self, node_index: usize, left: isize, right: isize, depth: usize) {
        self.nodes[node_index] = BihNode::Leaf {
            start: left as u32,
            count: (right - left + 1) as u32,
        };
        self.stats.leaf(depth, (right - left + 1) as usize);
    }

    fn subdivide(
        &mut self,
        left: isize,
        mut right: isize,
        mut grid_box: [f32; 6],
        mut node_box: [f32; 6],
        mut node_index: usize,
        depth: usize,
    ) {
        if right - left + 1 <= self.max_prims as isize || depth >= MAX_DEPTH {
            self.make_leaf(node_index, left, right, depth);
            return;
        }
        let mut axis = 3usize; // no previous axis yet
        let mut split = f32::NAN;
        let mut prev_clip = f32::NAN;
        let mut was_left = true;
        let mut clip_l;
        let mut clip_r;
        let mut right_orig;
        loop {
            let prev_axis = axis;
            let prev_split = split;
            let d = [
                grid_box[1] - grid_box[0],
                grid_box[3] - grid_box[2],
                grid_box[5] - grid_box[4],
            ];
            assert!(
                d[0] >= 0.0 && d[1] >= 0.0 && d[2] >= 0.0,
                "negative node extents"
            );
            for i in 0..3 {
                assert!(
                    node_box[2 * i + 1] >= grid_box[2 * i] && node_box[2 * i] <= grid_box[2 * i + 1],
                    "invalid node overlap"
                );
            }
            axis = if d[0] > d[1] && d[0] > d[2] {
                0
            } else if d[1] > d[2] {
                1
            } else {
                2
            };
            split = 0.5 * (grid_box[2 * axis] + grid_box[2 * axis + 1]);
            // partition into left/right subsets around the split plane
            clip_l = f32::NEG_INFINITY;
            clip_r = f32::INFINITY;
            right_orig = right;
            let mut node_l = f32::INFINITY;
            let mut node_r = f32::NEG_INFINITY;
            let mut i = left;
            while i <= right {
                let obj = self.objects[i as usize] as usize;
                let min_b = self.primitives.primitive_bound(obj, 2 * axis);
                let max_b = self.primitives.primitive_bound(obj, 2 * axis + 1);
                let center = (min_b + max_b) * 0.5;
                if center <= split {
                    // stays left
                    i += 1;
                    if clip_l < max_b {
                        clip_l = max_b;
                    }
                } else {
                    // move to the right end
                    self.objects.swap(i as usize, right as usize);
                    right -= 1;
                    if clip_r > min_b {
                        clip_r = min_b;
                    }
                }
                if node_l > min_b {
                    node_l = min_b;
                }
                if node_r < max_b {
                    node_r = max_b;
                }
            }
            // lossless empty-space removal: the node box is much bigger than
            // the space occupied by the primitives
            if node_l > node_box[2 * axis] && node_r < node_box[2 * axis + 1] {
                let node_box_w = node_box[2 * axis + 1] - node_box[2 * axis];
                let node_new_w = node_r - node_l;
                if CLIP_THRESHOLD * node_new_w < node_box_w {
                    let child = self.alloc(1);
                    self.nodes[node_index] = BihNode::Clip {
                        axis: axis as u8,
                        lo: node_l,
                        hi: node_r,
                        child: child as u32,
                    };
                    self.stats.clip_node();
                    node_box[2 * axis] = node_l;
                    node_box[2 * axis + 1] = node_r;
                    self.subdivide(left, right_orig, grid_box, node_box, child, depth + 1);
                    return;
                }
            }
            // make sure the subdivision is making progress
            if right == right_orig {
                // all objects landed on the left half
                if clip_l <= split {
                    grid_box[2 * axis + 1] = split;
                    prev_clip = clip_l;
                    was_left = true;
                    continue;
                }
                if prev_axis == axis && prev_split == split {
                    // stuck: same axis, same split - give up and emit a leaf
                    self.make_leaf(node_index, left, right, depth);
                    return;
                }
                grid_box[2 * axis + 1] = split;
                prev_clip = f32::NAN;
            } else if left > right {
                // all objects landed on the right half
                right = right_orig;
                if clip_r >= split {
                    grid_box[2 * axis] = split;
                    prev_clip = clip_r;
                    was_left = false;
                    continue;
                }
                if prev_axis == axis && prev_split == split {
                    self.make_leaf(node_index, left, right, depth);
                    return;
                }
                grid_box[2 * axis] = split;
                prev_clip = f32::NAN;
            } else {
                // an actual partition; materialize the empty space the
                // previous iteration discovered before writing the split
                if prev_axis != 3 && !prev_clip.is_nan() {
                    let child = self.alloc(1);
                    self.nodes[node_index] = if was_left {
                        BihNode::Clip {
                            axis: prev_axis as u8,
                            lo: f32::NEG_INFINITY,
                            hi: prev_clip,
                            child: child as u32,
                        }
                    } else {
                        BihNode::Clip {
                            axis: prev_axis as u8,
                            lo: prev_clip,
                            hi: f32::INFINITY,
                            child: child as u32,
                        }
                    };
                    self.stats.clip_node();
                    node_index = child;
                }
                break;
            }
        }
        let nl = right - left + 1;
        let nr = right_orig - right;
        debug_assert!(nl > 0 && nr > 0, "split with an empty side");
        let mut grid_box_l = grid_box;
        let mut grid_box_r = grid_box;
        let mut node_box_l = node_box;
        let mut node_box_r = node_box;
        grid_box_l[2 * axis + 1] = split;
        grid_box_r[2 * axis] = split;
        node_box_l[2 * axis + 1] = clip_l;
        node_box_r[2 * axis] = clip_r;
        let children = self.alloc(2);
        self.nodes[node_index] = BihNode::Split {
            axis: axis as u8,
            clip_left: clip_l,
            clip_right: clip_r,
            children: children as u32,
        };
        self.stats.inner();
        self.subdivide(left, right, grid_box_l, node_box_l, children, depth + 1);
        self.subdivide(right + 1, right_orig, grid_box_r, node_box_r, children + 1, depth + 1);
    }
}

impl AccelerationStructure for BoundingIntervalHierarchy {
    fn build(&mut self, primitives: Arc<dyn PrimitiveList>) {
        let n = primitives.num_primitives();
        self.bounds = primitives.world_bounds(None);
        self.objects = (0..n as u32).collect();
        let mut nodes = vec![BihNode::Leaf { start: 0, count: 0 }];
        if n > 0 {
            let b = &self.bounds;
            let seed = [
                b.x.min, b.x.max, b.y.min, b.y.max, b.z.min, b.z.max,
            ];
            let mut builder = Builder {
                primitives: &*primitives,
                objects: &mut self.objects,
                nodes: &mut nodes,
                max_prims: self.max_prims,
                stats: BuildStats::default(),
            };
            builder.subdivide(0, n as isize - 1, seed, seed, 0, 1);
            builder.stats.log();
        }
        self.nodes = nodes;
        self.primitives = Some(primitives);
    }

    fn intersect(&self, r: &mut Ray, state: &mut IntersectionState) {
        let Some(primitives) = &self.primitives else {
            return;
        };
        if self.objects.is_empty() {
            return;
        }
        let Some((mut interval_min, mut interval_max)) = self.bounds.clip_ray(r) else {
            return;
        };
        let org = r.origin.to_array();
        let inv_dir = [1.0 / r.dir.x, 1.0 / r.dir.y, 1.0 / r.dir.z];
        let dir_neg = [
            r.dir.x.is_sign_negative(),
            r.dir.y.is_sign_negative(),
            r.dir.z.is_sign_negative(),
        ];
        let level = state.stack_level();
        let mut sp = 0usize;
        let mut node = 0usize;
        'traversal: loop {
            // descend until this subtree is exhausted
            loop {
                match self.nodes[node] {
                    BihNode::Leaf { start, count } => {
                        for i in start..start + count {
                            primitives.intersect_primitive(r, self.objects[i as usize] as usize, state);
                        }
                        break;
                    }
                    BihNode::Split {
                        axis,
                        clip_left,
                        clip_right,
                        children,
                    } => {
                        let a = axis as usize;
                        let (front_plane, back_plane, front, back) = if dir_neg[a] {
                            (clip_right, clip_left, children + 1, children)
                        } else {
                            (clip_left, clip_right, children, children + 1)
                        };
                        let tf = (front_plane - org[a]) * inv_dir[a];
                        let tb = (back_plane - org[a]) * inv_dir[a];
                        // ray passes between the clip zones
                        if tf < interval_min && tb > interval_max {
                            break;
                        }
                        // ray passes through the far side only
                        if tf < interval_min {
                            interval_min = tb.max(interval_min);
                            node = back as usize;
                            continue;
                        }
                        // ray passes through the near side only
                        if tb > interval_max {
                            interval_max = tf.min(interval_max);
                            node = front as usize;
                            continue;
                        }
                        // both: visit the near side now, push the far side
                        state.stack_store(
                            level,
                            sp,
                            StackFrame {
                                node: back,
                                near: tb.max(interval_min),
                                far: interval_max,
                            },
                        );
                        sp += 1;
                        interval_max = tf.min(interval_max);
                        node = front as usize;
                    }
                    BihNode::Clip { axis, lo, hi, child } => {
                        let a = axis as usize;
                        let (near_plane, far_plane) = if dir_neg[a] { (hi, lo) } else { (lo, hi) };
                        interval_min = ((near_plane - org[a]) * inv_dir[a]).max(interval_min);
                        interval_max = ((far_plane - org[a]) * inv_dir[a]).min(interval_max);
                        if interval_min > interval_max {
                            break;
                        }
                        node = child as usize;
                    }
                }
            }
            // unwind to the closest suspended subtree still worth visiting
            loop {
                if sp == 0 {
                    return;
                }
                sp -= 1;
                let frame = state.stack_load(level, sp);
                if r.max() < frame.near {
                    continue;
                }
                interval_min = frame.near;
                interval_max = frame.far;
                node = frame.node as usize;
                continue 'traversal;
            }
        }
    }
}
