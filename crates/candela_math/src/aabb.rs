use crate::{Interval, Ray, Vec3};

/// Axis-aligned bounding box, stored as one interval per axis.
///
/// Besides the usual grow/union/query operations, this type exposes the
/// 6-sided `bound(side)` accessor used by primitive aggregates: even sides
/// are minimums, odd sides maximums, paired per axis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Create an empty AABB (contains nothing).
    pub fn empty() -> Self {
        Self::EMPTY
    }

    /// Create an AABB from two corner points.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            x: Interval::new(a.x.min(b.x), a.x.max(b.x)),
            y: Interval::new(a.y.min(b.y), a.y.max(b.y)),
            z: Interval::new(a.z.min(b.z), a.z.max(b.z)),
        }
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&box0.x, &box1.x),
            y: Interval::surrounding(&box0.y, &box1.y),
            z: Interval::surrounding(&box0.z, &box1.z),
        }
    }

    /// Get the interval for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, n: usize) -> Interval {
        match n {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Bound component by side index: side `2*axis + 0` is the axis minimum,
    /// `2*axis + 1` the axis maximum.
    pub fn bound(&self, side: usize) -> f32 {
        let iv = self.axis_interval(side >> 1);
        if side & 1 == 0 {
            iv.min
        } else {
            iv.max
        }
    }

    /// Grow this box to include a point.
    pub fn include_point(&mut self, p: Vec3) {
        self.x.min = self.x.min.min(p.x);
        self.x.max = self.x.max.max(p.x);
        self.y.min = self.y.min.min(p.y);
        self.y.max = self.y.max.max(p.y);
        self.z.min = self.z.min.min(p.z);
        self.z.max = self.z.max.max(p.z);
    }

    /// Grow this box to include another box.
    pub fn include(&mut self, other: &Aabb) {
        *self = Aabb::surrounding(self, other);
    }

    /// Minimum corner.
    pub fn min(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    /// Maximum corner.
    pub fn max(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    /// Returns the center point of the bounding box.
    pub fn center(&self) -> Vec3 {
        (self.min() + self.max()) * 0.5
    }

    /// Extent along each axis.
    pub fn extents(&self) -> Vec3 {
        self.max() - self.min()
    }

    /// True if min > max on any axis.
    pub fn is_empty(&self) -> bool {
        self.x.min > self.x.max || self.y.min > self.y.max || self.z.min > self.z.max
    }

    /// True when every bound is a finite number. Unbounded geometry
    /// reports a non-finite box and is handled outside spatial indices.
    pub fn is_finite(&self) -> bool {
        self.min().is_finite() && self.max().is_finite()
    }

    /// Surface area, or 0 for degenerate boxes.
    pub fn area(&self) -> f32 {
        let d = self.extents();
        if d.x < 0.0 || d.y < 0.0 || d.z < 0.0 {
            0.0
        } else {
            2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
        }
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let d = self.extents();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Nudge every bound outward by one ULP. Keeps primitives that lie
    /// exactly on a face inside the box for voxelization.
    pub fn enlarge_ulps(&mut self) {
        self.x.min = self.x.min.next_down();
        self.x.max = self.x.max.next_up();
        self.y.min = self.y.min.next_down();
        self.y.max = self.y.max.next_up();
        self.z.min = self.z.min.next_down();
        self.z.max = self.z.max.next_up();
    }

    /// Clip the ray's valid interval against this box using the slab method.
    /// Returns the narrowed `[t_near, t_far]`, or `None` when the ray misses.
    pub fn clip_ray(&self, r: &Ray) -> Option<(f32, f32)> {
        let mut t_near = r.min();
        let mut t_far = r.max();
        for axis in 0..3 {
            let iv = self.axis_interval(axis);
            let inv_dir = 1.0 / r.dir[axis];
            let t0 = (iv.min - r.origin[axis]) * inv_dir;
            let t1 = (iv.max - r.origin[axis]) * inv_dir;
            let (t0, t1) = if inv_dir > 0.0 { (t0, t1) } else { (t1, t0) };
            t_near = t_near.max(t0);
            t_far = t_far.min(t1);
            if t_near > t_far {
                return None;
            }
        }
        Some((t_near, t_far))
    }

    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };
}
