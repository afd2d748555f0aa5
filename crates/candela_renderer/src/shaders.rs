//! Stock surface shaders: diffuse, mirror and glass.

use std::f64::consts::PI;

use candela_core::{average, is_black, Color, Shader, ShadingState, BLACK, WHITE};
use candela_math::{OrthoNormalBasis, Ray, Vec3};

#[inline]
fn exp3(c: Color) -> Color {
    Color::new(c.x.exp(), c.y.exp(), c.z.exp())
}

/// Lambertian surface lit by direct light, caustics and the GI engine.
pub struct DiffuseShader {
    diffuse: Color,
}

impl DiffuseShader {
    pub fn new(diffuse: Color) -> Self {
        Self { diffuse }
    }
}

impl Shader for DiffuseShader {
    fn radiance(&self, state: &mut ShadingState<'_, '_>) -> Color {
        state.faceforward();
        state.init_light_samples();
        state.init_caustic_samples();
        state.diffuse(self.diffuse)
    }

    fn scatter_photon(&self, state: &mut ShadingState<'_, '_>, power: Color) {
        // make sure we are on the right side of the material
        if let (Some(n), Some(ng)) = (state.normal(), state.geo_normal()) {
            if n.dot(state.ray().dir) > 0.0 {
                state.set_normal(-n);
                state.set_geo_normal(-ng);
            }
        }
        state.store_photon(state.ray().dir, power, self.diffuse);
        let avg = average(self.diffuse);
        let rnd = state.random_stratified(0, 0, 1);
        if rnd < avg as f64 {
            // photon survives: cosine-sample the bounce direction
            let power = power * self.diffuse * (1.0 / avg);
            let Some(n) = state.normal() else { return };
            let onb = state
                .basis()
                .copied()
                .unwrap_or_else(|| OrthoNormalBasis::from_w(n));
            let u = 2.0 * PI * rnd / avg as f64;
            let v = state.random_stratified(0, 1, 1);
            let s = v.sqrt();
            let s1 = (1.0 - v).sqrt();
            let w = onb.to_world(Vec3::new(
                (u.cos() * s) as f32,
                (u.sin() * s) as f32,
                s1 as f32,
            ));
            state.trace_diffuse_photon(Ray::new(state.point(), w), power);
        }
    }
}

/// Perfect mirror with a Schlick-style fresnel blend toward white at
/// grazing angles.
pub struct MirrorShader {
    color: Color,
}

impl MirrorShader {
    pub fn new(color: Color) -> Self {
        Self { color }
    }
}

impl Shader for MirrorShader {
    fn radiance(&self, state: &mut ShadingState<'_, '_>) -> Color {
        if !state.include_specular() {
            return BLACK;
        }
        state.faceforward();
        let Some(n) = state.normal() else {
            return BLACK;
        };
        let cos = state.cos_nd();
        let dn = 2.0 * cos;
        let ref_dir = dn * n + state.ray().dir;
        let ref_ray = Ray::new(state.point(), ref_dir);
        // fresnel blend
        let cos = 1.0 - cos;
        let cos2 = cos * cos;
        let cos5 = cos2 * cos2 * cos;
        let fresnel = self.color + (WHITE - self.color) * cos5;
        fresnel * state.trace_reflection(ref_ray, 0)
    }

    fn scatter_photon(&self, state: &mut ShadingState<'_, '_>, power: Color) {
        let avg = average(self.color);
        let rnd = state.random_stratified(0, 0, 1);
        if rnd >= avg as f64 {
            return;
        }
        state.faceforward();
        let Some(n) = state.normal() else { return };
        let cos = state.cos_nd();
        let power = power * self.color * (1.0 / avg);
        let dn = 2.0 * cos;
        let dir = dn * n + state.ray().dir;
        state.trace_reflection_photon(Ray::new(state.point(), dir), power);
    }
}

/// Dielectric with fresnel-weighted reflection and refraction, total
/// internal reflection and optional Beer-Lambert absorption.
pub struct GlassShader {
    eta: f32,
    color: Color,
    absorption_distance: f32,
    absorption_color: Color,
    f0: f32,
}

impl GlassShader {
    pub fn new(eta: f32, color: Color) -> Self {
        let f = (1.0 - eta) / (1.0 + eta);
        Self {
            eta,
            color,
            absorption_distance: 0.0,
            absorption_color: Color::splat(0.5),
            f0: f * f,
        }
    }

    pub fn with_absorption(mut self, distance: f32, color: Color) -> Self {
        self.absorption_distance = distance;
        self.absorption_color = color;
        self
    }
}

impl Shader for GlassShader {
    fn radiance(&self, state: &mut ShadingState<'_, '_>) -> Color {
        if !state.include_specular() {
            return BLACK;
        }
        state.faceforward();
        let Some(n) = state.normal() else {
            return BLACK;
        };
        let cos = state.cos_nd();
        let inside = state.behind();
        let neta = if inside { self.eta } else { 1.0 / self.eta };
        let dn = 2.0 * cos;
        let refl_dir = dn * n + state.ray().dir;
        // refracted direction, if any
        let arg = 1.0 - neta * neta * (1.0 - cos * cos);
        let tir = arg < 0.0;
        let refr_dir = if tir {
            Vec3::ZERO
        } else {
            let nk = neta * cos - arg.sqrt();
            neta * state.ray().dir + nk * n
        };
        // fresnel terms
        let cos_theta1 = n.dot(refl_dir);
        let cos_theta2 = -n.dot(refr_dir);
        let p_para = (cos_theta1 - self.eta * cos_theta2) / (cos_theta1 + self.eta * cos_theta2);
        let p_perp = (self.eta * cos_theta1 - cos_theta2) / (self.eta * cos_theta1 + cos_theta2);
        let kr = 0.5 * (p_para * p_para + p_perp * p_perp);
        let kt = 1.0 - kr;
        let absorption = if inside && self.absorption_distance > 0.0 {
            // the ray is leaving the object: attenuate by the distance
            // traveled through it
            let a = exp3(
                (WHITE - self.absorption_color) * (-state.ray().max() / self.absorption_distance),
            );
            if is_black(a) {
                return BLACK;
            }
            Some(a)
        } else {
            None
        };
        let mut ret = BLACK;
        if !tir {
            ret += state.trace_refraction(Ray::new(state.point(), refr_dir), 0) * kt * self.color;
        }
        if !inside || tir {
            ret += state.trace_reflection(Ray::new(state.point(), refl_dir), 0) * kr * self.color;
        }
        match absorption {
            Some(a) => ret * a,
            None => ret,
        }
    }

    fn scatter_photon(&self, state: &mut ShadingState<'_, '_>, power: Color) {
        let refr = self.color * (1.0 - self.f0);
        let refl = self.color * self.f0;
        let avg_r = average(refl) as f64;
        let avg_t = average(refr) as f64;
        let rnd = state.random_stratified(0, 0, 1);
        if rnd < avg_r {
            state.faceforward();
            // don't reflect internally
            if state.behind() {
                return;
            }
            let Some(n) = state.normal() else { return };
            let cos = state.cos_nd();
            let power = power * refl * (1.0 / avg_r as f32);
            let dn = 2.0 * cos;
            let dir = dn * n + state.ray().dir;
            state.trace_reflection_photon(Ray::new(state.point(), dir), power);
        } else if rnd < avg_r + avg_t {
            state.faceforward();
            let Some(n) = state.normal() else { return };
            let cos = state.cos_nd();
            let neta = if state.behind() {
                self.eta
            } else {
                1.0 / self.eta
            };
            let mut power = power * refr * (1.0 / avg_t as f32);
            if state.behind() && self.absorption_distance > 0.0 {
                power *= exp3(
                    (WHITE - self.absorption_color)
                        * (-state.ray().max() / self.absorption_distance),
                );
            }
            let arg = 1.0 - neta * neta * (1.0 - cos * cos);
            if arg < 0.0 {
                // total internal reflection
                let dn = 2.0 * cos;
                let dir = dn * n + state.ray().dir;
                state.trace_reflection_photon(Ray::new(state.point(), dir), power);
            } else {
                let nk = neta * cos - arg.sqrt();
                let dir = neta * state.ray().dir + nk * n;
                state.trace_refraction_photon(Ray::new(state.point(), dir), power);
            }
        }
    }
}
