use candela_core::{IntersectionState, PrimitiveList, ShadingState};
use candela_math::{Aabb, Mat4, OrthoNormalBasis, Ray, Vec3};

/// Indexed triangle mesh in object space.
///
/// Vertex normals and texture coordinates are optional; without normals
/// the flat face normal is used.
pub struct TriangleMesh {
    positions: Vec<Vec3>,
    normals: Option<Vec<Vec3>>,
    uvs: Option<Vec<(f32, f32)>>,
    triangles: Vec<[u32; 3]>,
}

impl TriangleMesh {
    pub fn new(positions: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        assert!(
            triangles
                .iter()
                .flatten()
                .all(|&i| (i as usize) < positions.len()),
            "triangle index out of range"
        );
        Self {
            positions,
            normals: None,
            uvs: None,
            triangles,
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        assert_eq!(normals.len(), self.positions.len());
        self.normals = Some(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<(f32, f32)>) -> Self {
        assert_eq!(uvs.len(), self.positions.len());
        self.uvs = Some(uvs);
        self
    }

    fn vertices(&self, prim_id: usize) -> (Vec3, Vec3, Vec3) {
        let [i, j, k] = self.triangles[prim_id];
        (
            self.positions[i as usize],
            self.positions[j as usize],
            self.positions[k as usize],
        )
    }
}

impl PrimitiveList for TriangleMesh {
    fn world_bounds(&self, o2w: Option<&Mat4>) -> Aabb {
        let mut bounds = Aabb::empty();
        for &p in &self.positions {
            let p = match o2w {
                Some(m) => m.transform_point3(p),
                None => p,
            };
            bounds.include_point(p);
        }
        bounds
    }

    fn num_primitives(&self) -> usize {
        self.triangles.len()
    }

    fn primitive_bound(&self, prim_id: usize, side: usize) -> f32 {
        let (a, b, c) = self.vertices(prim_id);
        let axis = side >> 1;
        if side & 1 == 0 {
            a[axis].min(b[axis]).min(c[axis])
        } else {
            a[axis].max(b[axis]).max(c[axis])
        }
    }

    fn intersect_primitive(&self, r: &mut Ray, prim_id: usize, state: &mut IntersectionState) {
        let (a, b, c) = self.vertices(prim_id);
        let edge1 = b - a;
        let edge2 = c - a;
        let pvec = r.dir.cross(edge2);
        let det = edge1.dot(pvec);
        if det.abs() < 1e-12 {
            return;
        }
        let inv_det = 1.0 / det;
        let tvec = r.origin - a;
        let u = tvec.dot(pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return;
        }
        let qvec = tvec.cross(edge1);
        let v = r.dir.dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return;
        }
        let t = edge2.dot(qvec) * inv_det;
        if r.is_inside(t) {
            r.set_max(t);
            state.set_intersection_uvw(prim_id, u, v, 1.0 - u - v);
        }
    }

    fn prepare_shading_state(&self, state: &mut ShadingState<'_, '_>) {
        let p = state.ray().end_point();
        state.set_point(p);
        let prim_id = state.prim_id();
        let (u, v) = (state.u(), state.v());
        let w = 1.0 - u - v;
        let (a, b, c) = self.vertices(prim_id);
        let flat_normal = (b - a).cross(c - a);
        let local_normal = match &self.normals {
            Some(normals) => {
                let [i, j, k] = self.triangles[prim_id];
                normals[i as usize] * w + normals[j as usize] * u + normals[k as usize] * v
            }
            None => flat_normal,
        };
        let ng = state
            .transform_normal_object_to_world(flat_normal)
            .normalize();
        let n = state
            .transform_normal_object_to_world(local_normal)
            .normalize();
        state.set_geo_normal(ng);
        state.set_normal(n);
        let (tu, tv) = match &self.uvs {
            Some(uvs) => {
                let [i, j, k] = self.triangles[prim_id];
                let (u0, v0) = uvs[i as usize];
                let (u1, v1) = uvs[j as usize];
                let (u2, v2) = uvs[k as usize];
                (
                    u0 * w + u1 * u + u2 * v,
                    v0 * w + v1 * u + v2 * v,
                )
            }
            None => (u, v),
        };
        state.set_uv(tu, tv);
        state.set_basis(OrthoNormalBasis::from_w(n));
        let instance = state.instance().clone();
        state.set_shader(instance.shader(0));
        state.set_modifier(instance.modifier(0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> TriangleMesh {
        TriangleMesh::new(
            vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_triangle_hit_distance() {
        let mesh = quad();
        let mut r = Ray::new(Vec3::new(0.25, 0.25, -3.0), Vec3::Z);
        let mut state = IntersectionState::new();
        for prim in 0..mesh.num_primitives() {
            mesh.intersect_primitive(&mut r, prim, &mut state);
        }
        assert!((r.max() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_triangle_miss_outside_quad() {
        let mesh = quad();
        let mut r = Ray::new(Vec3::new(2.0, 0.0, -3.0), Vec3::Z);
        let mut state = IntersectionState::new();
        for prim in 0..mesh.num_primitives() {
            mesh.intersect_primitive(&mut r, prim, &mut state);
        }
        assert!(r.max().is_infinite());
    }

    #[test]
    fn test_parallel_ray_misses() {
        let mesh = quad();
        let mut r = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::X);
        let mut state = IntersectionState::new();
        mesh.intersect_primitive(&mut r, 0, &mut state);
        assert!(r.max().is_infinite());
    }

    #[test]
    fn test_primitive_bounds_are_flat_in_z() {
        let mesh = quad();
        assert_eq!(mesh.primitive_bound(0, 4), 0.0);
        assert_eq!(mesh.primitive_bound(0, 5), 0.0);
        assert_eq!(mesh.primitive_bound(0, 0), -1.0);
        assert_eq!(mesh.primitive_bound(0, 1), 1.0);
    }
}
