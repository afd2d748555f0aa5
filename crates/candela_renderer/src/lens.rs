use candela_core::CameraLens;
use candela_math::{Ray, Vec3};

/// Ideal pinhole projection: no depth of field, no distortion.
pub struct PinholeLens {
    fov: f32,
    aspect: f32,
}

impl PinholeLens {
    /// `fov` is the full horizontal field of view in degrees; `aspect`
    /// the width/height ratio of the image.
    pub fn new(fov: f32, aspect: f32) -> Self {
        Self { fov, aspect }
    }
}

impl CameraLens for PinholeLens {
    fn ray(
        &self,
        x: f32,
        y: f32,
        image_width: u32,
        image_height: u32,
        _lens_x: f64,
        _lens_y: f64,
        _time: f32,
    ) -> Option<Ray> {
        let au = (self.fov.to_radians() * 0.5).tan();
        let av = au / self.aspect;
        let du = -au + (2.0 * au * x) / (image_width as f32 - 1.0);
        let dv = -av + (2.0 * av * y) / (image_height as f32 - 1.0);
        Some(Ray::new(Vec3::ZERO, Vec3::new(du, dv, -1.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_ray_points_forward() {
        let lens = PinholeLens::new(90.0, 1.0);
        let r = lens.ray(49.5, 49.5, 100, 100, 0.0, 0.0, 0.0).unwrap();
        assert!(r.dir.z < -0.99, "dir = {}", r.dir);
        assert!(r.dir.x.abs() < 0.02);
        assert!(r.dir.y.abs() < 0.02);
    }

    #[test]
    fn test_corners_are_symmetric() {
        let lens = PinholeLens::new(60.0, 2.0);
        let tl = lens.ray(0.0, 0.0, 200, 100, 0.0, 0.0, 0.0).unwrap();
        let br = lens.ray(199.0, 99.0, 200, 100, 0.0, 0.0, 0.0).unwrap();
        assert!((tl.dir.x + br.dir.x).abs() < 1e-5);
        assert!((tl.dir.y + br.dir.y).abs() < 1e-5);
    }
}
