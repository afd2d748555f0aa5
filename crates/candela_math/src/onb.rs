use glam::Vec3;

/// Right-handed orthonormal basis around a primary direction `w`.
#[derive(Debug, Copy, Clone)]
pub struct OrthoNormalBasis {
    u: Vec3,
    v: Vec3,
    w: Vec3,
}

impl OrthoNormalBasis {
    /// Build a basis whose w axis is the (normalized) given direction.
    pub fn from_w(w: Vec3) -> Self {
        let w = w.normalize();
        // pick the axis least aligned with w to derive u
        let a = if w.x.abs() < w.y.abs() && w.x.abs() < w.z.abs() {
            Vec3::X
        } else if w.y.abs() < w.z.abs() {
            Vec3::Y
        } else {
            Vec3::Z
        };
        let v = w.cross(a).normalize();
        let u = v.cross(w);
        Self { u, v, w }
    }

    /// Build a basis from a primary direction and an up hint.
    pub fn from_wv(w: Vec3, v: Vec3) -> Self {
        let w = w.normalize();
        let u = v.cross(w).normalize();
        let v = w.cross(u);
        Self { u, v, w }
    }

    /// Map a vector from basis-local coordinates to world space.
    #[inline]
    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.u * local.x + self.v * local.y + self.w * local.z
    }

    /// Map a world-space vector into basis-local coordinates.
    #[inline]
    pub fn to_local(&self, world: Vec3) -> Vec3 {
        Vec3::new(self.u.dot(world), self.v.dot(world), self.w.dot(world))
    }

    pub fn w(&self) -> Vec3 {
        self.w
    }

    /// Flip the primary axis (and u, to keep handedness).
    pub fn flip_w(&mut self) {
        self.w = -self.w;
        self.u = -self.u;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_orthonormal(onb: &OrthoNormalBasis) {
        let u = onb.to_world(Vec3::X);
        let v = onb.to_world(Vec3::Y);
        let w = onb.to_world(Vec3::Z);
        assert!((u.length() - 1.0).abs() < 1e-5);
        assert!((v.length() - 1.0).abs() < 1e-5);
        assert!((w.length() - 1.0).abs() < 1e-5);
        assert!(u.dot(v).abs() < 1e-5);
        assert!(u.dot(w).abs() < 1e-5);
        assert!(v.dot(w).abs() < 1e-5);
        // right-handed
        assert!((u.cross(v) - w).length() < 1e-5);
    }

    #[test]
    fn test_from_w_orthonormal() {
        for dir in [
            Vec3::Z,
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-0.3, 0.01, 0.02),
            -Vec3::Y,
        ] {
            let onb = OrthoNormalBasis::from_w(dir);
            assert_orthonormal(&onb);
            assert!((onb.w() - dir.normalize()).length() < 1e-5);
        }
    }

    #[test]
    fn test_flip_w_keeps_handedness() {
        let mut onb = OrthoNormalBasis::from_w(Vec3::new(0.5, -1.0, 0.25));
        onb.flip_w();
        assert_orthonormal(&onb);
    }

    #[test]
    fn test_local_world_round_trip() {
        let onb = OrthoNormalBasis::from_w(Vec3::new(1.0, 1.0, 0.2));
        let v = Vec3::new(0.3, -0.4, 0.8);
        let back = onb.to_local(onb.to_world(v));
        assert!((back - v).length() < 1e-5);
    }
}
