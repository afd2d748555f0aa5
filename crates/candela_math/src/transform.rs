// Transform utilities for Mat4
//
// glam::Mat4 already provides transform_point3() / transform_vector3() /
// inverse(); this extends it with the operations ray tracing needs on top.

use crate::Aabb;
use glam::{Mat4, Vec3};

/// Extension trait for Mat4 with renderer-specific transforms.
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box by transforming all 8 corners
    /// and re-bounding the result.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Apply the transpose of this matrix to a direction. Normals transform
    /// by the inverse-transpose, so pass the *inverse* transform here.
    fn transform_normal(&self, n: Vec3) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        let lo = aabb.min();
        let hi = aabb.max();
        let mut out = Aabb::empty();
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            );
            out.include_point(self.transform_point3(corner));
        }
        out
    }

    fn transform_normal(&self, n: Vec3) -> Vec3 {
        self.transpose().transform_vector3(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_aabb_translation() {
        let m = Mat4::from_translation(Vec3::new(5.0, 5.0, 5.0));
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        let t = m.transform_aabb(&aabb);
        assert!((t.min() - Vec3::splat(5.0)).length() < 1e-5);
        assert!((t.max() - Vec3::splat(6.0)).length() < 1e-5);
    }

    #[test]
    fn test_transform_aabb_rotation_bounds() {
        use std::f32::consts::FRAC_PI_4;
        let m = Mat4::from_rotation_z(FRAC_PI_4);
        let aabb = Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0));
        let t = m.transform_aabb(&aabb);
        // The rotated cube's xy footprint widens to sqrt(2).
        let s = 2.0_f32.sqrt();
        assert!((t.max().x - s).abs() < 1e-4);
        assert!((t.min().y + s).abs() < 1e-4);
        assert!((t.max().z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_transform_normal_nonuniform_scale() {
        // Scale a plane by (2, 1, 1): the geometric normal of a slanted
        // surface is not preserved by the plain linear map, but is by the
        // inverse transpose.
        let m = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let inv = m.inverse();
        // Surface direction (1, 1, 0) has normal (1, -1, 0) before scaling.
        let tangent = m.transform_vector3(Vec3::new(1.0, 1.0, 0.0));
        let normal = inv.transform_normal(Vec3::new(1.0, -1.0, 0.0));
        assert!(tangent.dot(normal).abs() < 1e-5);
    }
}
