use candela_core::{
    Color, Display, ImageSampler, IntersectionState, Options, RenderError, Scene, ShadingCache,
    BLACK,
};
use candela_math::qmc;
use rayon::prelude::*;

use crate::bucket::{generate_buckets, Bucket, DEFAULT_BUCKET_SIZE};

/// Bucket-based image sampler.
///
/// The image is split into tiles rendered in parallel; each tile task
/// owns its intersection state and shading cache for its whole lifetime.
/// Pixel samples are jittered with scrambled Halton points so neighboring
/// pixels do not alias against each other.
pub struct BucketSampler {
    bucket_size: u32,
    samples_per_pixel: u32,
    width: u32,
    height: u32,
}

impl BucketSampler {
    pub fn new() -> Self {
        Self {
            bucket_size: DEFAULT_BUCKET_SIZE,
            samples_per_pixel: 4,
            width: 0,
            height: 0,
        }
    }

    pub fn with_samples(mut self, samples_per_pixel: u32) -> Self {
        self.samples_per_pixel = samples_per_pixel.max(1);
        self
    }

    fn render_bucket(
        &self,
        scene: &Scene,
        bucket: &Bucket,
        istate: &mut IntersectionState,
        cache: &mut ShadingCache,
        data: &mut Vec<Color>,
        alpha: &mut Vec<f32>,
    ) {
        data.clear();
        alpha.clear();
        let spp = self.samples_per_pixel;
        let inv = 1.0 / spp as f32;
        for local_y in 0..bucket.height {
            for local_x in 0..bucket.width {
                let px = bucket.x + local_x;
                let py = bucket.y + local_y;
                let pixel_index = py * self.width + px;
                cache.reset();
                let mut c = BLACK;
                let mut a = 0.0;
                for s in 0..spp {
                    // scramble the per-pixel pattern so neighbors decorrelate
                    let jx = qmc::mod1(qmc::halton(0, s) + qmc::halton(5, pixel_index));
                    let jy = qmc::mod1(qmc::halton(1, s) + qmc::halton(6, pixel_index));
                    let lens_u = qmc::halton(2, s);
                    let lens_v = qmc::halton(3, s);
                    let time = qmc::halton(4, s);
                    let instance = pixel_index.wrapping_mul(spp).wrapping_add(s);
                    if let Some(state) = scene.get_radiance(
                        &mut *istate,
                        px as f32 + jx as f32,
                        py as f32 + jy as f32,
                        lens_u,
                        lens_v,
                        time,
                        instance,
                        0,
                        Some(&mut *cache),
                    ) {
                        c += state.result().unwrap_or(BLACK);
                        a += 1.0;
                    }
                }
                data.push(c * inv);
                alpha.push(a * inv);
            }
        }
    }
}

impl Default for BucketSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageSampler for BucketSampler {
    fn prepare(&mut self, options: &Options, w: u32, h: u32) -> Result<(), RenderError> {
        self.width = w;
        self.height = h;
        self.bucket_size = options
            .get_int("bucket.size", self.bucket_size as i32)
            .clamp(8, 256) as u32;
        self.samples_per_pixel = options
            .get_int("aa.samples", self.samples_per_pixel as i32)
            .max(1) as u32;
        log::debug!(
            "bucket sampler: {}x{} pixels, {} px buckets, {} samples/pixel",
            w,
            h,
            self.bucket_size,
            self.samples_per_pixel
        );
        Ok(())
    }

    fn render(&mut self, scene: &Scene, display: &dyn Display) {
        display.image_begin(self.width, self.height, self.bucket_size);
        let buckets = generate_buckets(self.width, self.height, self.bucket_size);
        let cancel = scene.cancel_token();
        buckets.par_iter().for_each(|bucket| {
            // cooperative cancellation between units of work
            if cancel.is_canceled() {
                return;
            }
            display.image_prepare(
                bucket.x,
                bucket.y,
                bucket.width,
                bucket.height,
                rayon::current_thread_index().unwrap_or(0),
            );
            let mut istate = IntersectionState::new();
            let mut cache = ShadingCache::new();
            let mut data = Vec::with_capacity(bucket.pixel_count() as usize);
            let mut alpha = Vec::with_capacity(bucket.pixel_count() as usize);
            self.render_bucket(scene, bucket, &mut istate, &mut cache, &mut data, &mut alpha);
            display.image_update(
                bucket.x,
                bucket.y,
                bucket.width,
                bucket.height,
                &data,
                &alpha,
            );
            scene.accumulate_stats(&istate);
            scene.accumulate_cache_stats(&cache);
        });
        display.image_end();
    }
}
