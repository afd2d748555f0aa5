use std::f32::consts::PI;

use candela_core::{IntersectionState, PrimitiveList, ShadingState};
use candela_math::{Aabb, Mat4, Mat4Ext, OrthoNormalBasis, Ray, Vec3};

/// Unit sphere centered at the origin of object space. Position and size
/// come from the instance transform.
pub struct Sphere;

impl PrimitiveList for Sphere {
    fn world_bounds(&self, o2w: Option<&Mat4>) -> Aabb {
        let bounds = Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0));
        match o2w {
            Some(m) => m.transform_aabb(&bounds),
            None => bounds,
        }
    }

    fn num_primitives(&self) -> usize {
        1
    }

    fn primitive_bound(&self, _prim_id: usize, side: usize) -> f32 {
        if side & 1 == 0 {
            -1.0
        } else {
            1.0
        }
    }

    fn intersect_primitive(&self, r: &mut Ray, prim_id: usize, state: &mut IntersectionState) {
        let a = r.dir.length_squared();
        let b = 2.0 * r.dir.dot(r.origin);
        let c = r.origin.length_squared() - 1.0;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return;
        }
        let root = disc.sqrt();
        let t_near = (-b - root) / (2.0 * a);
        let t_far = (-b + root) / (2.0 * a);
        if r.is_inside(t_near) {
            r.set_max(t_near);
            state.set_intersection(prim_id);
        } else if r.is_inside(t_far) {
            r.set_max(t_far);
            state.set_intersection(prim_id);
        }
    }

    fn prepare_shading_state(&self, state: &mut ShadingState<'_, '_>) {
        let p = state.ray().end_point();
        state.set_point(p);
        let local = state.transform_world_to_object(p);
        let n = state.transform_normal_object_to_world(local).normalize();
        state.set_normal(n);
        state.set_geo_normal(n);
        // spherical texture coordinates
        let phi = local.y.atan2(local.x);
        let theta = local.z.clamp(-1.0, 1.0).acos();
        state.set_uv((phi + PI) / (2.0 * PI), theta / PI);
        state.set_basis(OrthoNormalBasis::from_w(n));
        let instance = state.instance().clone();
        state.set_shader(instance.shader(0));
        state.set_modifier(instance.modifier(0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_hit_at_t4() {
        let sphere = Sphere;
        let mut r = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let mut state = IntersectionState::new();
        sphere.intersect_primitive(&mut r, 0, &mut state);
        // the hit is only recorded into the state through `current`, but
        // the interval must narrow to the entry point
        assert!((r.max() - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_exit_hit_from_inside() {
        let sphere = Sphere;
        let mut r = Ray::new(Vec3::ZERO, Vec3::X);
        let mut state = IntersectionState::new();
        sphere.intersect_primitive(&mut r, 0, &mut state);
        assert!((r.max() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_miss_leaves_ray_untouched() {
        let sphere = Sphere;
        let mut r = Ray::new(Vec3::new(0.0, 2.0, -5.0), Vec3::Z);
        let mut state = IntersectionState::new();
        sphere.intersect_primitive(&mut r, 0, &mut state);
        assert!(r.max().is_infinite());
        assert!(!state.hit());
    }

    #[test]
    fn test_hit_beyond_interval_ignored() {
        let sphere = Sphere;
        let mut r = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        r.set_max(3.5);
        let mut state = IntersectionState::new();
        sphere.intersect_primitive(&mut r, 0, &mut state);
        assert_eq!(r.max(), 3.5);
    }
}
