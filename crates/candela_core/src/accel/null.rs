use std::sync::Arc;

use candela_math::Ray;

use super::AccelerationStructure;
use crate::isect::IntersectionState;
use crate::primitive::PrimitiveList;

/// Exhaustive linear scan over all primitives.
///
/// Used for trivial or empty aggregates, so callers never have to
/// special-case the absence of a spatial index.
#[derive(Default)]
pub struct NullAccelerator {
    primitives: Option<Arc<dyn PrimitiveList>>,
    n: usize,
}

impl NullAccelerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccelerationStructure for NullAccelerator {
    fn build(&mut self, primitives: Arc<dyn PrimitiveList>) {
        self.n = primitives.num_primitives();
        self.primitives = Some(primitives);
    }

    fn intersect(&self, r: &mut Ray, state: &mut IntersectionState) {
        if let Some(primitives) = &self.primitives {
            for i in 0..self.n {
                primitives.intersect_primitive(r, i, state);
            }
        }
    }
}
