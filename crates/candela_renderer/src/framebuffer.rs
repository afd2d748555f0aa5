use std::path::Path;
use std::sync::Mutex;

use candela_core::{Color, Display};

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear color to 8-bit RGBA.
pub fn color_to_rgba(color: Color, alpha: f32) -> [u8; 4] {
    let r = (255.0 * linear_to_gamma(color.x).clamp(0.0, 1.0)) as u8;
    let g = (255.0 * linear_to_gamma(color.y).clamp(0.0, 1.0)) as u8;
    let b = (255.0 * linear_to_gamma(color.z).clamp(0.0, 1.0)) as u8;
    let a = (255.0 * alpha.clamp(0.0, 1.0)) as u8;
    [r, g, b, a]
}

struct Pixels {
    width: u32,
    height: u32,
    data: Vec<Color>,
    alpha: Vec<f32>,
}

/// In-memory display sink.
///
/// Buckets land here from many workers at once, so the pixel store sits
/// behind a mutex; contention is negligible at bucket granularity.
pub struct FrameBuffer {
    pixels: Mutex<Pixels>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pixels: Mutex::new(Pixels {
                width: 0,
                height: 0,
                data: Vec::new(),
                alpha: Vec::new(),
            }),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let p = self.pixels.lock().unwrap();
        (p.width, p.height)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let p = self.pixels.lock().unwrap();
        p.data[(y * p.width + x) as usize]
    }

    /// Gamma-corrected 8-bit RGBA conversion of the whole image.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let p = self.pixels.lock().unwrap();
        let mut out = Vec::with_capacity(p.data.len() * 4);
        for (c, a) in p.data.iter().zip(&p.alpha) {
            out.extend_from_slice(&color_to_rgba(*c, *a));
        }
        out
    }

    /// Write the image as a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), image::ImageError> {
        let (width, height) = self.dimensions();
        let rgba = self.to_rgba8();
        let img = image::RgbaImage::from_raw(width, height, rgba)
            .expect("framebuffer dimensions match the pixel data");
        img.save(path.as_ref())
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for FrameBuffer {
    fn image_begin(&self, w: u32, h: u32, _bucket_size: u32) {
        let mut p = self.pixels.lock().unwrap();
        p.width = w;
        p.height = h;
        p.data = vec![Color::ZERO; (w * h) as usize];
        p.alpha = vec![0.0; (w * h) as usize];
    }

    fn image_update(&self, x: u32, y: u32, w: u32, h: u32, data: &[Color], alpha: &[f32]) {
        let mut p = self.pixels.lock().unwrap();
        for row in 0..h {
            let src = (row * w) as usize;
            let dst = ((y + row) * p.width + x) as usize;
            p.data[dst..dst + w as usize].copy_from_slice(&data[src..src + w as usize]);
            p.alpha[dst..dst + w as usize].copy_from_slice(&alpha[src..src + w as usize]);
        }
    }

    fn image_fill(&self, x: u32, y: u32, w: u32, h: u32, c: Color, alpha: f32) {
        let mut p = self.pixels.lock().unwrap();
        for row in 0..h {
            let dst = ((y + row) * p.width + x) as usize;
            for px in &mut p.data[dst..dst + w as usize] {
                *px = c;
            }
            for pa in &mut p.alpha[dst..dst + w as usize] {
                *pa = alpha;
            }
        }
    }

    fn image_end(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_update_places_bucket() {
        let fb = FrameBuffer::new();
        fb.image_begin(8, 8, 4);
        let data = vec![Color::ONE; 16];
        let alpha = vec![1.0; 16];
        fb.image_update(4, 4, 4, 4, &data, &alpha);
        assert_eq!(fb.pixel(0, 0), Color::ZERO);
        assert_eq!(fb.pixel(5, 6), Color::ONE);
        assert_eq!(fb.pixel(7, 7), Color::ONE);
        assert_eq!(fb.pixel(3, 4), Color::ZERO);
    }

    #[test]
    fn test_gamma_conversion() {
        assert_eq!(color_to_rgba(Color::ZERO, 0.0), [0, 0, 0, 0]);
        assert_eq!(color_to_rgba(Color::ONE, 1.0), [255, 255, 255, 255]);
        // 0.25 linear -> 0.5 after gamma
        let px = color_to_rgba(Color::splat(0.25), 1.0);
        assert_eq!(px[0], 127);
    }
}
