use std::f32::consts::PI;
use std::sync::Arc;

use candela_math::{qmc, Mat4, Mat4Ext, OrthoNormalBasis, Ray, Vec3};

use crate::color::{is_black, Color, BLACK};
use crate::instance::Instance;
use crate::isect::IntersectionState;
use crate::light::{LightSample, LightServer};
use crate::photon::PhotonStore;
use crate::scene::Scene;
use crate::shader::{Modifier, Shader};

/// Distance covered by one representable step at `x`.
#[inline]
fn ulp(x: f32) -> f32 {
    x.next_up() - x
}

/// Halton lookup that wraps the dimension into the supported range, so
/// deeply nested bounces degrade instead of panicking.
#[inline]
fn halton(d: u32, i: u32) -> f64 {
    qmc::halton(d as usize % qmc::MAX_DIMENSION, i)
}

/// A point to be shaded, together with everything needed to shade it:
/// the hit data, the transform pair of the hit instance, the QMC stream
/// position, the per-path-type recursion depths and the resolved light
/// samples.
///
/// States form an implicit tree: each bounce derives a child state that
/// copies the depth counters (incrementing exactly one of them) and
/// offsets the QMC stream so nested bounces draw from disjoint strata.
/// All states along one path share the worker's [`IntersectionState`];
/// the borrow checker enforces that only the innermost state uses it.
pub struct ShadingState<'a, 'i> {
    scene: &'a Scene,
    server: &'a LightServer,
    map: Option<&'a dyn PhotonStore>,
    istate: &'i mut IntersectionState,
    rx: f32,
    ry: f32,
    time: f32,
    result: Option<Color>,
    point: Vec3,
    normal: Option<Vec3>,
    geo_normal: Option<Vec3>,
    tex: (f32, f32),
    basis: Option<OrthoNormalBasis>,
    cos_nd: f32,
    bias: f32,
    behind: bool,
    hit_u: f32,
    hit_v: f32,
    hit_w: f32,
    instance: Arc<Instance>,
    prim_id: usize,
    o2w: Mat4,
    w2o: Mat4,
    ray: Ray,
    qmc_i: u32,
    qmc_d: u32,
    qmc_d0i: f64,
    qmc_d1i: f64,
    shader: Option<Arc<dyn Shader>>,
    modifier: Option<Arc<dyn Modifier>>,
    diffuse_depth: u32,
    reflection_depth: u32,
    refraction_depth: u32,
    include_lights: bool,
    include_specular: bool,
    samples: Vec<LightSample>,
}

impl<'a, 'i> ShadingState<'a, 'i> {
    #[allow(clippy::too_many_arguments)]
    fn build(
        scene: &'a Scene,
        server: &'a LightServer,
        map: Option<&'a dyn PhotonStore>,
        istate: &'i mut IntersectionState,
        r: Ray,
        qmc_i: u32,
        qmc_d: u32,
        rx: f32,
        ry: f32,
        depths: (u32, u32, u32),
    ) -> ShadingState<'a, 'i> {
        let time = istate.time;
        let instance = istate
            .instance
            .clone()
            .expect("shading state requires a recorded hit");
        let prim_id = istate.prim_id;
        let (hit_u, hit_v, hit_w) = (istate.u, istate.v, istate.w);
        let o2w = instance.object_to_world(time);
        let w2o = instance.world_to_object(time);
        ShadingState {
            scene,
            server,
            map,
            istate,
            rx,
            ry,
            time,
            result: None,
            point: Vec3::ZERO,
            normal: None,
            geo_normal: None,
            tex: (0.0, 0.0),
            basis: None,
            cos_nd: f32::NAN,
            bias: 0.001,
            behind: false,
            hit_u,
            hit_v,
            hit_w,
            instance,
            prim_id,
            o2w,
            w2o,
            ray: r,
            qmc_i,
            qmc_d,
            qmc_d0i: halton(qmc_d, qmc_i),
            qmc_d1i: halton(qmc_d + 1, qmc_i),
            shader: None,
            modifier: None,
            diffuse_depth: depths.0,
            reflection_depth: depths.1,
            refraction_depth: depths.2,
            include_lights: true,
            include_specular: true,
            samples: Vec::new(),
        }
    }

    /// State for a camera ray hit.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn primary(
        scene: &'a Scene,
        server: &'a LightServer,
        istate: &'i mut IntersectionState,
        r: Ray,
        rx: f32,
        ry: f32,
        i: u32,
        d: u32,
    ) -> ShadingState<'a, 'i> {
        Self::build(scene, server, None, istate, r, i, d, rx, ry, (0, 0, 0))
    }

    /// State for a photon hit during the photon pre-pass.
    pub(crate) fn photon(
        scene: &'a Scene,
        server: &'a LightServer,
        map: &'a dyn PhotonStore,
        istate: &'i mut IntersectionState,
        r: Ray,
        i: u32,
    ) -> ShadingState<'a, 'i> {
        Self::build(scene, server, Some(map), istate, r, i, 4, 0.0, 0.0, (0, 0, 0))
    }

    /// Derive a child state from `previous`, taking over its intersection
    /// scratch state for the duration of the child's life.
    fn derive(previous: &'i mut ShadingState<'a, '_>, r: Ray, i: u32, d: u32) -> ShadingState<'a, 'i> {
        let scene = previous.scene;
        let server = previous.server;
        let map = previous.map;
        let rx = previous.rx;
        let ry = previous.ry;
        let qmc_i = i.wrapping_add(previous.qmc_i);
        let qmc_d = d + previous.qmc_d;
        let depths = (
            previous.diffuse_depth,
            previous.reflection_depth,
            previous.refraction_depth,
        );
        let istate: &'i mut IntersectionState = &mut *previous.istate;
        Self::build(scene, server, map, istate, r, qmc_i, qmc_d, rx, ry, depths)
    }

    pub(crate) fn diffuse_bounce(
        previous: &'i mut ShadingState<'a, '_>,
        r: Ray,
        i: u32,
    ) -> ShadingState<'a, 'i> {
        let mut s = Self::derive(previous, r, i, 2);
        s.diffuse_depth += 1;
        s
    }

    pub(crate) fn glossy_bounce(
        previous: &'i mut ShadingState<'a, '_>,
        r: Ray,
        i: u32,
    ) -> ShadingState<'a, 'i> {
        let mut s = Self::derive(previous, r, i, 2);
        s.include_lights = false;
        s.include_specular = false;
        s.reflection_depth += 1;
        s
    }

    pub(crate) fn reflection_bounce(
        previous: &'i mut ShadingState<'a, '_>,
        r: Ray,
        i: u32,
    ) -> ShadingState<'a, 'i> {
        let mut s = Self::derive(previous, r, i, 2);
        s.reflection_depth += 1;
        s
    }

    pub(crate) fn refraction_bounce(
        previous: &'i mut ShadingState<'a, '_>,
        r: Ray,
        i: u32,
    ) -> ShadingState<'a, 'i> {
        let mut s = Self::derive(previous, r, i, 2);
        s.refraction_depth += 1;
        s
    }

    pub(crate) fn final_gather_bounce(
        previous: &'i mut ShadingState<'a, '_>,
        r: Ray,
        i: u32,
    ) -> ShadingState<'a, 'i> {
        let mut s = Self::derive(previous, r, i, 2);
        s.diffuse_depth += 1;
        s.include_lights = false;
        s.include_specular = false;
        s
    }

    // --- hit description, filled in by PrimitiveList::prepare_shading_state ---

    pub fn point(&self) -> Vec3 {
        self.point
    }

    pub fn set_point(&mut self, p: Vec3) {
        self.point = p;
    }

    /// Shading normal, which may differ from the geometric normal.
    pub fn normal(&self) -> Option<Vec3> {
        self.normal
    }

    pub fn set_normal(&mut self, n: Vec3) {
        self.normal = Some(n);
    }

    pub fn geo_normal(&self) -> Option<Vec3> {
        self.geo_normal
    }

    pub fn set_geo_normal(&mut self, n: Vec3) {
        self.geo_normal = Some(n);
    }

    pub fn uv(&self) -> (f32, f32) {
        self.tex
    }

    pub fn set_uv(&mut self, u: f32, v: f32) {
        self.tex = (u, v);
    }

    pub fn basis(&self) -> Option<&OrthoNormalBasis> {
        self.basis.as_ref()
    }

    pub fn set_basis(&mut self, basis: OrthoNormalBasis) {
        self.basis = Some(basis);
    }

    pub fn shader(&self) -> Option<Arc<dyn Shader>> {
        self.shader.clone()
    }

    pub fn set_shader(&mut self, shader: Option<Arc<dyn Shader>>) {
        self.shader = shader;
    }

    pub fn modifier(&self) -> Option<Arc<dyn Modifier>> {
        self.modifier.clone()
    }

    pub fn set_modifier(&mut self, modifier: Option<Arc<dyn Modifier>>) {
        self.modifier = modifier;
    }

    // --- hit provenance ---

    /// Barycentric / parametric hit coordinates.
    pub fn u(&self) -> f32 {
        self.hit_u
    }

    pub fn v(&self) -> f32 {
        self.hit_v
    }

    pub fn w(&self) -> f32 {
        self.hit_w
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    pub fn prim_id(&self) -> usize {
        self.prim_id
    }

    pub fn ray(&self) -> &Ray {
        &self.ray
    }

    pub(crate) fn set_ray(&mut self, r: Ray) {
        self.ray = r;
    }

    pub fn raster_x(&self) -> f32 {
        self.rx
    }

    pub fn raster_y(&self) -> f32 {
        self.ry
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Cosine between the shading normal and the ray, set by
    /// [`ShadingState::faceforward`].
    pub fn cos_nd(&self) -> f32 {
        self.cos_nd
    }

    /// True when the ray hit the surface from behind, set by
    /// [`ShadingState::faceforward`].
    pub fn behind(&self) -> bool {
        self.behind
    }

    pub fn result(&self) -> Option<Color> {
        self.result
    }

    pub(crate) fn set_result(&mut self, c: Color) {
        self.result = Some(c);
    }

    // --- recursion depths ---

    /// Total tracing depth; first generation rays have depth 0.
    pub fn depth(&self) -> u32 {
        self.diffuse_depth + self.reflection_depth + self.refraction_depth
    }

    pub fn diffuse_depth(&self) -> u32 {
        self.diffuse_depth
    }

    pub fn reflection_depth(&self) -> u32 {
        self.reflection_depth
    }

    pub fn refraction_depth(&self) -> u32 {
        self.refraction_depth
    }

    /// Whether the shader should include emitted light.
    pub fn include_lights(&self) -> bool {
        self.include_lights
    }

    /// Whether the shader should include specular terms.
    pub fn include_specular(&self) -> bool {
        self.include_specular
    }

    pub(crate) fn scene(&self) -> &'a Scene {
        self.scene
    }

    pub(crate) fn istate_mut(&mut self) -> &mut IntersectionState {
        &mut *self.istate
    }

    // --- transforms ---

    pub fn transform_object_to_world(&self, p: Vec3) -> Vec3 {
        self.o2w.transform_point3(p)
    }

    pub fn transform_world_to_object(&self, p: Vec3) -> Vec3 {
        self.w2o.transform_point3(p)
    }

    pub fn transform_vector_object_to_world(&self, v: Vec3) -> Vec3 {
        self.o2w.transform_vector3(v)
    }

    pub fn transform_vector_world_to_object(&self, v: Vec3) -> Vec3 {
        self.w2o.transform_vector3(v)
    }

    /// Normals transform by the inverse transpose.
    pub fn transform_normal_object_to_world(&self, n: Vec3) -> Vec3 {
        self.w2o.transform_normal(n)
    }

    pub fn transform_normal_world_to_object(&self, n: Vec3) -> Vec3 {
        self.o2w.transform_normal(n)
    }

    pub fn camera_to_world(&self) -> Mat4 {
        match self.scene.camera() {
            Some(c) => c.camera_to_world(self.time),
            None => Mat4::IDENTITY,
        }
    }

    pub fn world_to_camera(&self) -> Mat4 {
        match self.scene.camera() {
            Some(c) => c.world_to_camera(self.time),
            None => Mat4::IDENTITY,
        }
    }

    // --- orientation ---

    /// Flip the shading normal so it agrees with the geometric normal.
    pub(crate) fn correct_shading_normal(&mut self) {
        if let (Some(n), Some(ng)) = (self.normal, self.geo_normal) {
            if n.dot(ng) < 0.0 {
                self.normal = Some(-n);
                if let Some(basis) = &mut self.basis {
                    basis.flip_w();
                }
            }
        }
    }

    /// Flip the surface normals to face the incoming ray, and offset the
    /// shading point away from the surface so spawned rays do not hit it
    /// again. The offset scales with the ULP of the hit point's dominant
    /// coordinate: a constant epsilon either self-shadows at large
    /// magnitudes or leaks at small ones.
    pub fn faceforward(&mut self) {
        let (Some(mut n), Some(mut ng)) = (self.normal, self.geo_normal) else {
            return;
        };
        if self.ray.dot(ng) >= 0.0 {
            ng = -ng;
            n = -n;
            if let Some(basis) = &mut self.basis {
                basis.flip_w();
            }
            self.behind = true;
        }
        self.cos_nd = (-self.ray.dot(n)).max(0.0);
        let p = self.point;
        let step = if ng.x.abs() > ng.y.abs() && ng.x.abs() > ng.z.abs() {
            ulp(p.x.abs())
        } else if ng.y.abs() > ng.z.abs() {
            ulp(p.y.abs())
        } else {
            ulp(p.z.abs())
        };
        self.bias = self.bias.max(25.0 * step);
        self.point += self.bias * ng;
        self.normal = Some(n);
        self.geo_normal = Some(ng);
    }

    // --- QMC sampling ---

    /// Sample number `j` of an infinite sequence in the given dimension.
    pub fn random(&self, j: u32, dim: u32) -> f64 {
        match dim {
            0 => qmc::mod1(self.qmc_d0i + halton(0, j)),
            1 => qmc::mod1(self.qmc_d1i + halton(1, j)),
            _ => qmc::mod1(halton(self.qmc_d + dim, self.qmc_i) + halton(dim, j)),
        }
    }

    /// Sample number `j` of a finite sequence of `n` elements. Better
    /// stratified than [`ShadingState::random`], but fixed-size.
    pub fn random_stratified(&self, j: u32, dim: u32, n: u32) -> f64 {
        match dim {
            0 => qmc::mod1(self.qmc_d0i + j as f64 / n as f64),
            1 => qmc::mod1(self.qmc_d1i + halton(0, j)),
            _ => qmc::mod1(halton(self.qmc_d + dim, self.qmc_i) + halton(dim - 1, j)),
        }
    }

    // --- light sampling ---

    /// Resolve the visible light samples for this point.
    pub fn init_light_samples(&mut self) {
        let server = self.server;
        server.init_light_samples(self);
    }

    /// Add caustic samples to the light sample set; does nothing when
    /// caustics are disabled.
    pub fn init_caustic_samples(&mut self) {
        let server = self.server;
        server.init_caustic_samples(self);
    }

    /// Append a resolved light sample.
    pub fn add_sample(&mut self, sample: LightSample) {
        self.samples.push(sample);
    }

    pub fn light_samples(&self) -> &[LightSample] {
        &self.samples
    }

    // --- recursive tracing ---

    /// Run this state's shader.
    pub fn shade(&mut self) -> Color {
        let server = self.server;
        server.shade_hit(self)
    }

    /// Radiance seen along a glossy reflection.
    pub fn trace_glossy(&mut self, r: Ray, i: u32) -> Color {
        let server = self.server;
        server.trace_glossy(self, r, i)
    }

    /// Radiance seen along a perfect specular reflection.
    pub fn trace_reflection(&mut self, r: Ray, i: u32) -> Color {
        let server = self.server;
        server.trace_reflection(self, r, i)
    }

    /// Radiance seen along a refracted ray. The ray is assumed to point
    /// away from the normal; its origin is pushed through the surface.
    pub fn trace_refraction(&mut self, mut r: Ray, i: u32) -> Color {
        if let Some(ng) = self.geo_normal {
            r.origin -= 2.0 * self.bias * ng;
        }
        let server = self.server;
        server.trace_refraction(self, r, i)
    }

    /// Radiance seen straight through the surface.
    pub fn trace_transparency(&mut self) -> Color {
        let r = Ray::new(self.point, self.ray.dir);
        self.trace_refraction(r, 0)
    }

    /// Binary occlusion along a shadow ray.
    pub fn trace_shadow(&mut self, r: &Ray) -> Color {
        let mut r = *r;
        self.scene.trace_shadow(&mut r, self.istate)
    }

    /// Trace a final gather ray, returning the hit as a new state.
    pub fn trace_final_gather(&mut self, r: Ray, i: u32) -> Option<ShadingState<'a, '_>> {
        let server = self.server;
        server.trace_final_gather(self, r, i)
    }

    // --- photon tracing ---

    /// Record a photon at this location.
    pub fn store_photon(&self, dir: Vec3, power: Color, diffuse: Color) {
        if let Some(map) = self.map {
            map.store(self, dir, power, diffuse);
        }
    }

    /// Continue a photon path after a diffuse scattering event.
    pub fn trace_diffuse_photon(&mut self, r: Ray, power: Color) {
        if self.map.is_some_and(|m| m.allow_diffuse_bounced()) {
            let server = self.server;
            server.trace_diffuse_photon(self, r, power);
        }
    }

    /// Continue a photon path after a specular reflection.
    pub fn trace_reflection_photon(&mut self, r: Ray, power: Color) {
        if self.map.is_some_and(|m| m.allow_reflection_bounced()) {
            let server = self.server;
            server.trace_reflection_photon(self, r, power);
        }
    }

    /// Continue a photon path after a refraction. The ray is assumed to
    /// point away from the normal.
    pub fn trace_refraction_photon(&mut self, mut r: Ray, power: Color) {
        if self.map.is_some_and(|m| m.allow_refraction_bounced()) {
            if let Some(ng) = self.geo_normal {
                r.origin -= 0.002 * ng;
            }
            let server = self.server;
            server.trace_refraction_photon(self, r, power);
        }
    }

    // --- global illumination ---

    /// Global diffuse radiance estimate from the GI engine, if any.
    pub fn global_radiance(&mut self) -> Color {
        let server = self.server;
        server.global_radiance(self)
    }

    /// Irradiance reaching this point from diffuse surfaces.
    pub fn irradiance(&mut self, diffuse_reflectance: Color) -> Color {
        let server = self.server;
        server.irradiance(self, diffuse_reflectance)
    }

    // --- canned responses ---

    /// Plain diffuse response to the current light samples and global
    /// illumination.
    pub fn diffuse(&mut self, diff: Color) -> Color {
        if is_black(diff) {
            return BLACK;
        }
        let Some(n) = self.normal else {
            return BLACK;
        };
        let mut lr = BLACK;
        for sample in &self.samples {
            lr += sample.diffuse_radiance() * sample.dot(n);
        }
        lr += self.irradiance(diff);
        lr * diff * (1.0 / PI)
    }

    /// Phong specular response to the current light samples, optionally
    /// with glossy indirect rays.
    pub fn specular_phong(&mut self, spec: Color, power: f32, num_rays: u32) -> Color {
        if !self.include_specular || is_black(spec) {
            return BLACK;
        }
        let Some(n) = self.normal else {
            return BLACK;
        };
        let dn = 2.0 * self.cos_nd;
        let ref_dir = dn * n + self.ray.dir;
        let mut lr = BLACK;
        // direct lighting
        for sample in &self.samples {
            let cos_nl = sample.dot(n);
            let cos_lr = sample.dot(ref_dir);
            if cos_lr > 0.0 {
                lr += sample.specular_radiance() * (cos_nl * cos_lr.powf(power));
            }
        }
        // indirect lighting
        if num_rays > 0 {
            let num_samples = if self.depth() == 0 { num_rays } else { 1 };
            let onb = OrthoNormalBasis::from_w(ref_dir);
            let mul = (2.0 * PI / (power + 1.0)) / num_samples as f32;
            for i in 0..num_samples {
                let r1 = self.random_stratified(i, 0, num_samples);
                let r2 = self.random_stratified(i, 1, num_samples);
                let u = 2.0 * std::f64::consts::PI * r1;
                let s = r2.powf(1.0 / (power as f64 + 1.0));
                let s1 = (1.0 - s * s).sqrt();
                let w = onb.to_world(Vec3::new(
                    (u.cos() * s1) as f32,
                    (u.sin() * s1) as f32,
                    s as f32,
                ));
                let wn = w.dot(n);
                if wn > 0.0 {
                    lr += self.trace_glossy(Ray::new(self.point, w), i) * (wn * mul);
                }
            }
        }
        lr * spec * ((power + 2.0) / (2.0 * PI))
    }

    /// Ambient occlusion: black and white.
    pub fn occlusion(&mut self, samples: u32, max_dist: f32) -> Color {
        self.occlusion_shaded(samples, max_dist, crate::color::WHITE, BLACK)
    }

    /// Ambient occlusion between `bright` (unoccluded) and `dark`.
    pub fn occlusion_shaded(
        &mut self,
        samples: u32,
        max_dist: f32,
        bright: Color,
        dark: Color,
    ) -> Color {
        // geometry without orientation cannot be occluded
        if self.normal.is_none() {
            return bright;
        }
        self.faceforward();
        let onb = match self.basis {
            Some(b) => b,
            None => OrthoNormalBasis::from_w(self.normal.unwrap()),
        };
        let mut result = BLACK;
        for i in 0..samples {
            let xi = self.random_stratified(i, 0, samples) as f32;
            let xj = self.random_stratified(i, 1, samples) as f32;
            let phi = 2.0 * PI * xi;
            let sin_theta = xj.sqrt();
            let cos_theta = (1.0 - xj).sqrt();
            let w = onb.to_world(Vec3::new(
                phi.cos() * sin_theta,
                phi.sin() * sin_theta,
                cos_theta,
            ));
            let mut r = Ray::new(self.point, w);
            r.set_max(max_dist);
            let occ = self.trace_shadow(&r);
            result += bright + (dark - bright) * occ;
        }
        result / samples as f32
    }
}
