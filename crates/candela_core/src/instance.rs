use std::sync::Arc;

use candela_math::{Aabb, Mat4, MovingMat4, Ray};

use crate::error::RenderError;
use crate::geometry::Geometry;
use crate::isect::IntersectionState;
use crate::primitive::PrimitiveList;
use crate::shader::{Modifier, Shader};
use crate::shading::ShadingState;

/// A placement of a [`Geometry`] into the scene.
///
/// Maps object space to world space (possibly varying over time) and
/// carries the shaders and modifiers bound to the surface. The world-space
/// bounds are computed at construction; instances whose geometry has no
/// finite bound report `None` and are kept off the spatial index.
pub struct Instance {
    o2w: MovingMat4,
    w2o: MovingMat4,
    bounds: Option<Aabb>,
    geometry: Arc<Geometry>,
    shaders: Vec<Arc<dyn Shader>>,
    modifiers: Vec<Arc<dyn Modifier>>,
}

impl Instance {
    pub fn new(
        geometry: Arc<Geometry>,
        transform: MovingMat4,
        shaders: Vec<Arc<dyn Shader>>,
        modifiers: Vec<Arc<dyn Modifier>>,
    ) -> Result<Self, RenderError> {
        let w2o = transform.inverse().ok_or(RenderError::SingularTransform)?;
        let mut instance = Self {
            o2w: transform,
            w2o,
            bounds: None,
            geometry,
            shaders,
            modifiers,
        };
        instance.update_bounds();
        Ok(instance)
    }

    /// Create a short-lived instance wrapping light source geometry. A
    /// non-invertible transform is a configuration error: it is reported
    /// and the instance dropped.
    pub fn create_temporary(
        primitives: Arc<dyn PrimitiveList>,
        transform: Mat4,
        shader: Arc<dyn Shader>,
    ) -> Option<Arc<Instance>> {
        match Instance::new(
            Arc::new(Geometry::from_primitives(primitives)),
            MovingMat4::new(transform),
            vec![shader],
            Vec::new(),
        ) {
            Ok(instance) => Some(Arc::new(instance)),
            Err(e) => {
                log::error!("unable to create temporary instance: {e}");
                None
            }
        }
    }

    /// Recompute the cached world-space bounds, covering every motion
    /// segment of the transform. A geometry reporting no bounds or a
    /// non-finite box marks the instance as unbounded.
    pub fn update_bounds(&mut self) {
        let mut bounds = match self.geometry.world_bounds(Some(self.o2w.data(0))) {
            Some(b) => b,
            None => {
                self.bounds = None;
                return;
            }
        };
        for i in 1..self.o2w.num_segments() {
            match self.geometry.world_bounds(Some(self.o2w.data(i))) {
                Some(b) => bounds.include(&b),
                None => {
                    self.bounds = None;
                    return;
                }
            }
        }
        self.bounds = bounds.is_finite().then_some(bounds);
    }

    /// World-space bounds, or `None` for unbounded instances.
    pub fn bounds(&self) -> Option<&Aabb> {
        self.bounds.as_ref()
    }

    pub fn num_primitives(&self) -> usize {
        self.geometry.num_primitives()
    }

    /// Checks whether this instance places the given geometry.
    pub fn has_geometry(&self, g: &Arc<Geometry>) -> bool {
        Arc::ptr_eq(&self.geometry, g)
    }

    /// Intersect in two levels: map the ray into object space, make this
    /// the current instance, search the geometry's local index, then
    /// transfer the narrowed interval back to the world-space ray.
    pub(crate) fn intersect(this: &Arc<Instance>, r: &mut Ray, state: &mut IntersectionState) {
        let mut local = r.transform(&this.w2o.sample(state.time));
        state.current = Some(this.clone());
        this.geometry.intersect(&mut local, state);
        r.set_max(local.max());
    }

    /// Prepare the shading state for shader invocation. This also runs the
    /// attached surface modifier, if any.
    pub fn prepare_shading_state(&self, state: &mut ShadingState<'_, '_>) {
        self.geometry.prepare_shading_state(state);
        if state.normal().is_some() && state.geo_normal().is_some() {
            state.correct_shading_normal();
        }
        if let Some(modifier) = state.modifier() {
            modifier.modify(state);
        }
    }

    /// Shader by index into this instance's list.
    pub fn shader(&self, i: usize) -> Option<Arc<dyn Shader>> {
        self.shaders.get(i).cloned()
    }

    /// Modifier by index into this instance's list.
    pub fn modifier(&self, i: usize) -> Option<Arc<dyn Modifier>> {
        self.modifiers.get(i).cloned()
    }

    pub fn object_to_world(&self, time: f32) -> Mat4 {
        self.o2w.sample(time)
    }

    pub fn world_to_object(&self, time: f32) -> Mat4 {
        self.w2o.sample(time)
    }

    pub fn geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }

    pub fn baking_primitives(&self) -> Option<Arc<dyn PrimitiveList>> {
        self.geometry.baking_primitives()
    }
}

/// The finite instances of a scene viewed as a primitive aggregate, so the
/// top-level acceleration structure can index them like any other
/// primitive list. Temporary area-light instances are carried in a second
/// list appended behind the regular ones.
pub struct InstanceList {
    instances: Vec<Arc<Instance>>,
    lights: Vec<Arc<Instance>>,
}

impl InstanceList {
    pub fn new(instances: Vec<Arc<Instance>>, lights: Vec<Arc<Instance>>) -> Self {
        Self { instances, lights }
    }

    fn get(&self, prim_id: usize) -> &Arc<Instance> {
        if prim_id < self.instances.len() {
            &self.instances[prim_id]
        } else {
            &self.lights[prim_id - self.instances.len()]
        }
    }

    /// Number of primitives inside the instance at `prim_id`.
    pub fn num_primitives_in(&self, prim_id: usize) -> usize {
        self.get(prim_id).num_primitives()
    }
}

impl PrimitiveList for InstanceList {
    fn world_bounds(&self, _o2w: Option<&Mat4>) -> Aabb {
        let mut bounds = Aabb::empty();
        for instance in self.instances.iter().chain(&self.lights) {
            if let Some(b) = instance.bounds() {
                bounds.include(b);
            }
        }
        bounds
    }

    fn num_primitives(&self) -> usize {
        self.instances.len() + self.lights.len()
    }

    fn primitive_bound(&self, prim_id: usize, side: usize) -> f32 {
        self.get(prim_id)
            .bounds()
            .expect("finite instance")
            .bound(side)
    }

    fn intersect_primitive(&self, r: &mut Ray, prim_id: usize, state: &mut IntersectionState) {
        Instance::intersect(self.get(prim_id), r, state);
    }

    fn prepare_shading_state(&self, state: &mut ShadingState<'_, '_>) {
        let instance = state.instance().clone();
        instance.prepare_shading_state(state);
    }
}
