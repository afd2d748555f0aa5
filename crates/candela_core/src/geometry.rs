use std::sync::{Arc, OnceLock};

use candela_math::{Aabb, Mat4, Ray};

use crate::accel::{AccelType, AccelerationStructure, NullAccelerator};
use crate::isect::IntersectionState;
use crate::primitive::{PrimitiveList, Tesselatable};
use crate::shading::ShadingState;

/// A geometric object in its native object space.
///
/// Geometries are not rendered directly; they are placed into the scene by
/// [`crate::Instance`]s, possibly many times. Tesselation and the local
/// acceleration structure are built on first use and published through
/// [`OnceLock`]: at most one thread runs a build, everyone else blocks on
/// the lock and then reads the immutable result.
pub struct Geometry {
    tesselatable: Option<Arc<dyn Tesselatable>>,
    primitives: Option<Arc<dyn PrimitiveList>>,
    tesselated: OnceLock<Option<Arc<dyn PrimitiveList>>>,
    accel: OnceLock<Box<dyn AccelerationStructure>>,
    accel_type: AccelType,
}

impl Geometry {
    /// Geometry over an existing primitive aggregate. The acceleration
    /// structure is still built on demand.
    pub fn from_primitives(primitives: Arc<dyn PrimitiveList>) -> Self {
        Self {
            tesselatable: None,
            primitives: Some(primitives),
            tesselated: OnceLock::new(),
            accel: OnceLock::new(),
            accel_type: AccelType::Auto,
        }
    }

    /// Geometry whose renderable primitives are generated on demand.
    pub fn from_tesselatable(tesselatable: Arc<dyn Tesselatable>) -> Self {
        Self {
            tesselatable: Some(tesselatable),
            primitives: None,
            tesselated: OnceLock::new(),
            accel: OnceLock::new(),
            accel_type: AccelType::Auto,
        }
    }

    /// Override the local acceleration structure choice.
    pub fn with_accel(mut self, accel_type: AccelType) -> Self {
        self.accel_type = accel_type;
        self
    }

    /// The primitive aggregate, tesselating on first call if needed.
    /// `None` when tesselation failed; the geometry then renders as empty.
    pub fn primitives(&self) -> Option<&Arc<dyn PrimitiveList>> {
        if let Some(primitives) = &self.primitives {
            return Some(primitives);
        }
        let tesselatable = self.tesselatable.as_ref()?;
        self.tesselated
            .get_or_init(|| {
                log::info!("tesselating geometry ...");
                let primitives = tesselatable.tesselate();
                match &primitives {
                    Some(p) => {
                        log::debug!("tesselation produced {} primitives", p.num_primitives())
                    }
                    None => log::error!("tesselation failed - geometry will be discarded"),
                }
                primitives
            })
            .as_ref()
    }

    pub fn num_primitives(&self) -> usize {
        self.primitives().map_or(0, |p| p.num_primitives())
    }

    /// World-space bounds under the given transform. `None` means the
    /// geometry has no finite bound.
    pub fn world_bounds(&self, o2w: Option<&Mat4>) -> Option<Aabb> {
        if self.primitives.is_none() {
            if let Some(t) = &self.tesselatable {
                // some tesselatables can bound themselves without running
                if let Some(b) = t.world_bounds(o2w) {
                    return Some(b);
                }
            }
        }
        self.primitives().map(|p| p.world_bounds(o2w))
    }

    pub(crate) fn intersect(&self, r: &mut Ray, state: &mut IntersectionState) {
        let accel = self.accel.get_or_init(|| match self.primitives() {
            Some(primitives) => {
                let n = primitives.num_primitives();
                if n >= 1000 {
                    log::info!("building acceleration structure for {n} primitives ...");
                }
                let mut accel = self.accel_type.create(n, true);
                accel.build(primitives.clone());
                accel
            }
            // an empty accelerator avoids null checks on the hot path
            None => Box::new(NullAccelerator::new()),
        });
        accel.intersect(r, state);
    }

    pub fn prepare_shading_state(&self, state: &mut ShadingState<'_, '_>) {
        if let Some(primitives) = self.primitives() {
            primitives.prepare_shading_state(state);
        }
    }

    pub fn baking_primitives(&self) -> Option<Arc<dyn PrimitiveList>> {
        self.primitives()?.baking_primitives()
    }

    pub fn primitive_list(&self) -> Option<Arc<dyn PrimitiveList>> {
        self.primitives().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTess {
        tesselations: AtomicUsize,
    }

    struct EmptyList;

    impl PrimitiveList for EmptyList {
        fn world_bounds(&self, _o2w: Option<&Mat4>) -> Aabb {
            Aabb::empty()
        }
        fn num_primitives(&self) -> usize {
            0
        }
        fn primitive_bound(&self, _prim_id: usize, _side: usize) -> f32 {
            0.0
        }
        fn intersect_primitive(&self, _r: &mut Ray, _prim: usize, _state: &mut IntersectionState) {}
        fn prepare_shading_state(&self, _state: &mut ShadingState<'_, '_>) {}
    }

    impl Tesselatable for CountingTess {
        fn world_bounds(&self, _o2w: Option<&Mat4>) -> Option<Aabb> {
            None
        }
        fn tesselate(&self) -> Option<Arc<dyn PrimitiveList>> {
            self.tesselations.fetch_add(1, Ordering::SeqCst);
            Some(Arc::new(EmptyList))
        }
    }

    #[test]
    fn test_tesselation_runs_once_under_concurrency() {
        let tess = Arc::new(CountingTess {
            tesselations: AtomicUsize::new(0),
        });
        let geometry = Arc::new(Geometry::from_tesselatable(tess.clone()));
        std::thread::scope(|s| {
            for _ in 0..8 {
                let g = geometry.clone();
                s.spawn(move || {
                    assert!(g.primitives().is_some());
                });
            }
        });
        assert_eq!(tess.tesselations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_geometry_never_hits() {
        let geometry = Geometry::from_primitives(Arc::new(EmptyList));
        let mut state = IntersectionState::new();
        let mut ray = Ray::new(candela_math::Vec3::ZERO, candela_math::Vec3::Z);
        geometry.intersect(&mut ray, &mut state);
        assert!(!state.hit());
    }
}
