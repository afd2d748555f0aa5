use crate::{Mat4, Vec3};

/// An oriented half-line segment with a normalized direction.
///
/// The valid region along the ray is `[t_min, t_max]`; intersection code
/// narrows `t_max` as closer hits are found, so `t_max` only ever shrinks
/// over the lifetime of a traversal.
#[derive(Debug, Copy, Clone)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
    t_min: f32,
    t_max: f32,
}

impl Ray {
    /// Create a ray from `origin` along `dir`, with infinite extent.
    /// The direction is normalized.
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self {
            origin,
            dir: dir.normalize(),
            t_min: 0.0,
            t_max: f32::INFINITY,
        }
    }

    /// Create a ray limited to the segment between `a` and `b`, typically a
    /// shadow ray. `t_max` is set to the distance between the two points.
    pub fn segment(a: Vec3, b: Vec3) -> Self {
        let d = b - a;
        let n = d.length();
        Self {
            origin: a,
            dir: d / n,
            t_min: 0.0,
            t_max: n,
        }
    }

    /// Transform this ray by the given matrix. The direction is *not*
    /// renormalized so that t values remain comparable between the two
    /// spaces; call [`Ray::normalize`] when that is not required.
    pub fn transform(&self, m: &Mat4) -> Ray {
        Ray {
            origin: m.transform_point3(self.origin),
            dir: m.transform_vector3(self.dir),
            t_min: self.t_min,
            t_max: self.t_max,
        }
    }

    /// Renormalize the direction component.
    pub fn normalize(&mut self) {
        self.dir = self.dir.normalize();
    }

    /// Smallest valid distance along the ray, usually 0.
    #[inline]
    pub fn min(&self) -> f32 {
        self.t_min
    }

    /// Largest valid distance along the ray. May be infinite.
    #[inline]
    pub fn max(&self) -> f32 {
        self.t_max
    }

    /// Narrow the valid interval. Callers must only pass distances smaller
    /// than the current maximum (the nearest-hit invariant).
    #[inline]
    pub fn set_max(&mut self, t: f32) {
        self.t_max = t;
    }

    /// Checks whether `t` falls strictly inside the valid interval. Use this
    /// before recording an intersection at distance `t`.
    #[inline]
    pub fn is_inside(&self, t: f32) -> bool {
        self.t_min < t && t < self.t_max
    }

    /// Point along the ray at parameter t.
    #[inline]
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }

    /// The point at the end of the valid interval (`t_max`).
    #[inline]
    pub fn end_point(&self) -> Vec3 {
        self.point_at(self.t_max)
    }

    /// Dot product of an arbitrary vector with the ray direction.
    #[inline]
    pub fn dot(&self, v: Vec3) -> f32 {
        self.dir.dot(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_normalizes_direction() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0));
        assert!((ray.dir.length() - 1.0).abs() < 1e-6);
        assert_eq!(ray.dir, Vec3::Z);
    }

    #[test]
    fn test_ray_max_narrowing() {
        let mut ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert!(ray.max().is_infinite());
        ray.set_max(5.0);
        assert!(ray.is_inside(4.0));
        assert!(!ray.is_inside(5.0));
        assert!(!ray.is_inside(6.0));
        ray.set_max(2.0);
        assert!(!ray.is_inside(4.0));
    }

    #[test]
    fn test_ray_segment() {
        let ray = Ray::segment(Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(ray.dir, Vec3::Y);
        assert!((ray.max() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_ray_transform_keeps_t() {
        // A scale embedded in the transform must not rescale t values.
        let m = Mat4::from_scale(Vec3::splat(2.0));
        let mut ray = Ray::new(Vec3::ZERO, Vec3::X);
        ray.set_max(4.0);
        let local = ray.transform(&m);
        assert_eq!(local.max(), 4.0);
        assert!((local.dir.length() - 2.0).abs() < 1e-5);
    }
}
