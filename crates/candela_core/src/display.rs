use crate::color::Color;

/// An image output device.
///
/// The core pushes finished tile buffers here and performs no tone-mapping
/// or file I/O itself. Buckets finish concurrently, so implementations
/// must synchronize internally.
pub trait Display: Send + Sync {
    /// Called once before rendering with the final image dimensions.
    /// `bucket_size` is 0 for non-bucket sources.
    fn image_begin(&self, w: u32, h: u32, bucket_size: u32);

    /// Announce that the given region is about to be rendered by the
    /// worker identified by `id` (e.g. to highlight work in progress).
    fn image_prepare(&self, x: u32, y: u32, w: u32, h: u32, id: usize) {
        let _ = (x, y, w, h, id);
    }

    /// Update the image with a finished bucket. `data` and `alpha` are
    /// exactly `w * h` long, in row-major order, unprocessed.
    fn image_update(&self, x: u32, y: u32, w: u32, h: u32, data: &[Color], alpha: &[f32]);

    /// Fill a region with a flat color, used by progressive previews.
    fn image_fill(&self, x: u32, y: u32, w: u32, h: u32, c: Color, alpha: f32) {
        let _ = (x, y, w, h, c, alpha);
    }

    /// Called once after the image has been fully rendered.
    fn image_end(&self);
}
