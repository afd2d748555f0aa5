use candela_math::{Mat4, MovingMat4, Ray, Vec3};

use crate::error::RenderError;

/// Computes the actual projection: a ray through a point on the image
/// plane, in camera space. Lenses may return `None` for pixels that do not
/// project to anything.
pub trait CameraLens: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn ray(
        &self,
        x: f32,
        y: f32,
        image_width: u32,
        image_height: u32,
        lens_x: f64,
        lens_y: f64,
        time: f32,
    ) -> Option<Ray>;
}

/// The viewpoint of a scene: a mounted lens plus the (possibly moving)
/// camera-to-world transform and the shutter interval.
pub struct Camera {
    lens: Box<dyn CameraLens>,
    shutter_open: f32,
    shutter_close: f32,
    c2w: MovingMat4,
    w2c: MovingMat4,
}

impl Camera {
    pub fn new(lens: Box<dyn CameraLens>) -> Self {
        Self {
            lens,
            shutter_open: 0.0,
            shutter_close: 0.0,
            c2w: MovingMat4::default(),
            w2c: MovingMat4::default(),
        }
    }

    pub fn with_transform(mut self, c2w: MovingMat4) -> Result<Self, RenderError> {
        self.w2c = c2w.inverse().ok_or(RenderError::SingularTransform)?;
        self.c2w = c2w;
        Ok(self)
    }

    pub fn with_shutter(mut self, open: f32, close: f32) -> Self {
        self.shutter_open = open;
        self.shutter_close = close;
        self
    }

    /// Map a time sample in [0,1) into the shutter interval, warped by a
    /// tent filter to approximate how a physical shutter weights time.
    pub fn time(&self, mut time: f32) -> f32 {
        if self.shutter_open >= self.shutter_close {
            return self.shutter_open;
        }
        if time < 0.5 {
            time = -1.0 + (2.0 * time).sqrt();
        } else {
            time = 1.0 - (2.0 - 2.0 * time).sqrt();
        }
        time = 0.5 * (time + 1.0);
        (1.0 - time) * self.shutter_open + time * self.shutter_close
    }

    /// Generate the world-space ray through the given image-plane point.
    /// The ray is renormalized to cancel any scale embedded in the
    /// camera transform.
    #[allow(clippy::too_many_arguments)]
    pub fn ray(
        &self,
        x: f32,
        y: f32,
        image_width: u32,
        image_height: u32,
        lens_x: f64,
        lens_y: f64,
        time: f32,
    ) -> Option<Ray> {
        let r = self
            .lens
            .ray(x, y, image_width, image_height, lens_x, lens_y, time)?;
        let mut r = r.transform(&self.c2w.sample(time));
        r.normalize();
        Some(r)
    }

    /// A ray from the camera origin toward the given world-space point,
    /// limited to the segment between them.
    pub(crate) fn point_ray(&self, p: Vec3, time: f32) -> Ray {
        let origin = self.c2w.sample(time).transform_point3(Vec3::ZERO);
        Ray::segment(origin, p)
    }

    pub fn camera_to_world(&self, time: f32) -> Mat4 {
        self.c2w.sample(time)
    }

    pub fn world_to_camera(&self, time: f32) -> Mat4 {
        self.w2c.sample(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLens;

    impl CameraLens for FixedLens {
        fn ray(
            &self,
            _x: f32,
            _y: f32,
            _w: u32,
            _h: u32,
            _lens_x: f64,
            _lens_y: f64,
            _time: f32,
        ) -> Option<Ray> {
            Some(Ray::new(Vec3::ZERO, -Vec3::Z))
        }
    }

    #[test]
    fn test_static_shutter_collapses_time() {
        let camera = Camera::new(Box::new(FixedLens));
        assert_eq!(camera.time(0.0), 0.0);
        assert_eq!(camera.time(0.9), 0.0);
    }

    #[test]
    fn test_tent_warp_stays_in_shutter_interval() {
        let camera = Camera::new(Box::new(FixedLens)).with_shutter(0.25, 0.75);
        for i in 0..32 {
            let t = camera.time(i as f32 / 32.0);
            assert!((0.25..=0.75).contains(&t), "t = {t}");
        }
        // the center of the sample domain maps to the shutter midpoint
        assert!((camera.time(0.5) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_camera_ray_is_normalized() {
        let c2w = MovingMat4::new(Mat4::from_scale(Vec3::splat(3.0)));
        let camera = Camera::new(Box::new(FixedLens))
            .with_transform(c2w)
            .unwrap();
        let r = camera.ray(0.0, 0.0, 16, 16, 0.0, 0.0, 0.0).unwrap();
        assert!((r.dir.length() - 1.0).abs() < 1e-5);
    }
}
