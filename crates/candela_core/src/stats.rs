use crate::cache::ShadingCache;
use crate::isect::RayCounters;

/// Render-wide ray statistics, merged from the per-worker counters at the
/// end of each unit of work.
#[derive(Debug, Default, Clone, Copy)]
pub struct Statistics {
    pub eye_rays: u64,
    pub shadow_rays: u64,
    pub reflection_rays: u64,
    pub glossy_rays: u64,
    pub refraction_rays: u64,
    pub rays: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pixels: u64,
}

impl Statistics {
    pub fn reset(&mut self) {
        *self = Statistics::default();
    }

    pub fn set_resolution(&mut self, w: u32, h: u32) {
        self.pixels = w as u64 * h as u64;
    }

    pub fn accumulate(&mut self, counters: &RayCounters) {
        self.eye_rays += counters.eye_rays;
        self.shadow_rays += counters.shadow_rays;
        self.reflection_rays += counters.reflection_rays;
        self.glossy_rays += counters.glossy_rays;
        self.refraction_rays += counters.refraction_rays;
        self.rays += counters.rays;
    }

    pub fn accumulate_cache(&mut self, cache: &ShadingCache) {
        self.cache_hits += cache.hits;
        self.cache_misses += cache.misses;
    }

    pub fn log_stats(&self) {
        log::info!("ray statistics:");
        log::info!("  * eye rays:        {}", self.eye_rays);
        log::info!("  * shadow rays:     {}", self.shadow_rays);
        log::info!("  * reflection rays: {}", self.reflection_rays);
        log::info!("  * glossy rays:     {}", self.glossy_rays);
        log::info!("  * refraction rays: {}", self.refraction_rays);
        log::info!("  * total rays:      {}", self.rays);
        if self.pixels > 0 {
            log::info!(
                "  * rays/pixel:      {:.2}",
                self.rays as f64 / self.pixels as f64
            );
        }
        if self.cache_hits + self.cache_misses > 0 {
            log::info!(
                "  * shading cache:   {:.1}% hits",
                100.0 * self.cache_hits as f64 / (self.cache_hits + self.cache_misses) as f64
            );
        }
    }
}
