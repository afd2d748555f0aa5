use std::sync::Arc;

use candela_math::Vec3;

use crate::color::Color;
use crate::instance::Instance;
use crate::shader::Shader;
use crate::shading::ShadingState;

struct CachedSample {
    instance: Arc<Instance>,
    shader: Arc<dyn Shader>,
    dir: Vec3,
    normal: Vec3,
    color: Color,
}

/// Per-worker memoization of shader results.
///
/// A lookup matches when the instance and shader are identical and the
/// ray direction and shading normal agree within tight thresholds; this
/// makes densely supersampled pixels on flat surfaces nearly free. The
/// cache is owned by a single worker and reset per pixel.
#[derive(Default)]
pub struct ShadingCache {
    samples: Vec<CachedSample>,
    pub hits: u64,
    pub misses: u64,
}

impl ShadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached samples, keeping the hit/miss statistics.
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn lookup(&mut self, state: &ShadingState<'_, '_>, shader: &Arc<dyn Shader>) -> Option<Color> {
        let normal = state.normal()?;
        for s in &self.samples {
            if !Arc::ptr_eq(&s.instance, state.instance()) {
                continue;
            }
            if !Arc::ptr_eq(&s.shader, shader) {
                continue;
            }
            if state.ray().dir.dot(s.dir) < 0.999 {
                continue;
            }
            if normal.dot(s.normal) < 0.99 {
                continue;
            }
            self.hits += 1;
            return Some(s.color);
        }
        self.misses += 1;
        None
    }

    pub fn add(&mut self, state: &ShadingState<'_, '_>, shader: &Arc<dyn Shader>, color: Color) {
        let Some(normal) = state.normal() else {
            return;
        };
        self.samples.push(CachedSample {
            instance: state.instance().clone(),
            shader: shader.clone(),
            dir: state.ray().dir,
            normal,
            color,
        });
    }
}
