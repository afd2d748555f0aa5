use glam::Mat4;

/// A transformation matrix that changes over time.
///
/// Unlimited motion segments are supported; the samples are assumed to be
/// equidistant within the `[t0, t1]` time range. A single-sample value
/// behaves as a static transform.
#[derive(Debug, Clone)]
pub struct MovingMat4 {
    samples: Vec<Mat4>,
    t0: f32,
    t1: f32,
    inv_scale: f32,
}

impl MovingMat4 {
    /// A static transform, constant over time.
    pub fn new(m: Mat4) -> Self {
        Self {
            samples: vec![m],
            t0: 0.0,
            t1: 0.0,
            inv_scale: 1.0,
        }
    }

    /// A moving transform from equidistant samples over `[t0, t1]`.
    /// With an empty time range no motion is produced, even if multiple
    /// samples were specified.
    pub fn with_segments(samples: Vec<Mat4>, t0: f32, t1: f32) -> Self {
        assert!(!samples.is_empty(), "moving transform needs samples");
        let inv_scale = if t0 < t1 {
            (samples.len() - 1) as f32 / (t1 - t0)
        } else {
            1.0
        };
        Self {
            samples,
            t0,
            t1,
            inv_scale,
        }
    }

    pub fn num_segments(&self) -> usize {
        self.samples.len()
    }

    pub fn data(&self, i: usize) -> &Mat4 {
        &self.samples[i]
    }

    /// Invert every segment. Returns `None` if any segment is singular.
    pub fn inverse(&self) -> Option<MovingMat4> {
        let mut samples = Vec::with_capacity(self.samples.len());
        for m in &self.samples {
            let det = m.determinant();
            if det == 0.0 || !det.is_finite() {
                return None;
            }
            samples.push(m.inverse());
        }
        Some(MovingMat4 {
            samples,
            t0: self.t0,
            t1: self.t1,
            inv_scale: self.inv_scale,
        })
    }

    /// Sample the transform at the given time, blending between the two
    /// nearest segments.
    pub fn sample(&self, time: f32) -> Mat4 {
        if self.samples.len() == 1 || self.t0 >= self.t1 {
            return self.samples[0];
        }
        let nt = (time.clamp(self.t0, self.t1) - self.t0) * self.inv_scale;
        let idx0 = (nt as usize).min(self.samples.len() - 1);
        let idx1 = (idx0 + 1).min(self.samples.len() - 1);
        let t = nt - idx0 as f32;
        self.samples[idx0] * (1.0 - t) + self.samples[idx1] * t
    }
}

impl Default for MovingMat4 {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_static_sample() {
        let m = MovingMat4::new(Mat4::from_translation(Vec3::X));
        assert_eq!(m.sample(0.0), m.sample(0.7));
    }

    #[test]
    fn test_moving_sample_blend() {
        let m = MovingMat4::with_segments(
            vec![
                Mat4::from_translation(Vec3::ZERO),
                Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)),
            ],
            0.0,
            1.0,
        );
        let mid = m.sample(0.5).transform_point3(Vec3::ZERO);
        assert!((mid - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
        // samples outside the range clamp
        let late = m.sample(2.0).transform_point3(Vec3::ZERO);
        assert!((late - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_inverse_round_trip() {
        let m = MovingMat4::with_segments(
            vec![
                Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
                Mat4::from_rotation_y(0.7) * Mat4::from_translation(Vec3::new(-1.0, 0.5, 2.0)),
            ],
            0.0,
            1.0,
        );
        let inv = m.inverse().expect("invertible");
        for &t in &[0.0, 0.25, 1.0] {
            let p = Vec3::new(0.3, -1.2, 4.0);
            // Each sampled segment of the inverse is the inverse of the
            // corresponding segment; at segment boundaries (not blended
            // midpoints) the round trip is exact.
            let fwd = m.sample(t).transform_point3(p);
            let back = inv.sample(t).transform_point3(fwd);
            if t == 0.0 || t == 1.0 {
                assert!((back - p).length() < 1e-4, "t={t}: {back} != {p}");
            }
        }
    }

    #[test]
    fn test_singular_inverse() {
        let m = MovingMat4::new(Mat4::from_scale(Vec3::new(0.0, 1.0, 1.0)));
        assert!(m.inverse().is_none());
    }
}
