use std::f32::consts::PI;

use candela_core::{luminance, Color, LightSample, LightSource, PhotonSample, ShadingState};
use candela_math::{Ray, Vec3};

/// Isotropic point light with inverse-square falloff.
pub struct PointLight {
    center: Vec3,
    power: Color,
}

impl PointLight {
    pub fn new(center: Vec3, power: Color) -> Self {
        Self { center, power }
    }
}

impl LightSource for PointLight {
    fn num_samples(&self) -> u32 {
        1
    }

    fn get_samples(&self, state: &mut ShadingState<'_, '_>) {
        let (Some(n), Some(ng)) = (state.normal(), state.geo_normal()) else {
            return;
        };
        let d = self.center - state.point();
        if d.dot(n) > 0.0 && d.dot(ng) > 0.0 {
            let shadow_ray = Ray::segment(state.point(), self.center);
            let scale = 1.0 / (4.0 * PI * self.center.distance_squared(state.point()));
            let radiance = self.power * scale;
            let mut sample = LightSample::new(shadow_ray, radiance, radiance);
            sample.trace_shadow(state);
            state.add_sample(sample);
        }
    }

    fn get_photon(&self, x1: f64, y1: f64, _x2: f64, _y2: f64) -> PhotonSample {
        // uniform direction over the sphere
        let phi = 2.0 * PI * x1 as f32;
        let y1 = y1 as f32;
        let s = 2.0 * (y1 * (1.0 - y1)).sqrt();
        let dir = Vec3::new(phi.cos() * s, phi.sin() * s, 1.0 - 2.0 * y1);
        PhotonSample {
            origin: self.center,
            dir,
            power: self.power,
        }
    }

    fn power(&self) -> f32 {
        luminance(self.power)
    }
}
