use std::sync::Arc;

use candela_math::{Aabb, Mat4, Ray};

use crate::isect::IntersectionState;
use crate::shading::ShadingState;

/// An object made up of many primitives.
///
/// This is the contract every acceleration structure builds over and every
/// [`crate::Geometry`] wraps. Primitive ids run from 0 to
/// `num_primitives() - 1`.
pub trait PrimitiveList: Send + Sync {
    /// Bounding box of the whole aggregate in world space, transformed by
    /// `o2w` when given. `None` means object space equals world space.
    fn world_bounds(&self, o2w: Option<&Mat4>) -> Aabb;

    /// Number of individual primitives in this aggregate.
    fn num_primitives(&self) -> usize;

    /// Bounding box component of one primitive in object space. Side
    /// `2*axis + 0` is the axis minimum, `2*axis + 1` the maximum.
    fn primitive_bound(&self, prim_id: usize, side: usize) -> f32;

    /// Intersect one primitive with a ray in the object's local space.
    /// Implementations narrow `r` via [`Ray::set_max`] and record the hit
    /// via [`IntersectionState::set_intersection_uv`] only when the
    /// distance passes [`Ray::is_inside`].
    fn intersect_primitive(&self, r: &mut Ray, prim_id: usize, state: &mut IntersectionState);

    /// Fill in the surface description (point, normals, uv, basis, shader)
    /// for the hit recorded in the state.
    fn prepare_shading_state(&self, state: &mut ShadingState<'_, '_>);

    /// A primitive list laid out in unit-square UV space, for lightmap
    /// baking. Aggregates that don't support baking return `None`.
    fn baking_primitives(&self) -> Option<Arc<dyn PrimitiveList>> {
        None
    }
}

/// Deferred mesh generation: produces a [`PrimitiveList`] on demand, so
/// heavy tesselation only runs for geometry that is actually hit by the
/// render.
pub trait Tesselatable: Send + Sync {
    /// Bounds, when they can be computed without tesselating. Returning
    /// `None` forces tesselation when the bounds are first needed.
    fn world_bounds(&self, o2w: Option<&Mat4>) -> Option<Aabb>;

    /// Produce the renderable primitives. `None` signals a tesselation
    /// failure; the geometry is then treated as empty.
    fn tesselate(&self) -> Option<Arc<dyn PrimitiveList>>;
}
