use std::sync::{Arc, Mutex};

use candela_math::{qmc, Ray, Vec3};
use rayon::prelude::*;

use crate::cache::ShadingCache;
use crate::color::{Color, BLACK};
use crate::error::RenderError;
use crate::instance::Instance;
use crate::isect::IntersectionState;
use crate::options::Options;
use crate::photon::{CausticPhotonMap, GiEngine, PhotonStore};
use crate::scene::Scene;
use crate::shader::Shader;
use crate::shading::ShadingState;

/// A photon emitted from a light source.
pub struct PhotonSample {
    pub origin: Vec3,
    pub dir: Vec3,
    pub power: Color,
}

/// Any light emitting object: supports direct illumination sampling and
/// photon emission.
pub trait LightSource: Send + Sync {
    /// Maximum number of samples taken from this light, for statistics.
    fn num_samples(&self) -> u32;

    /// Sample direct illumination toward the state's point. The light is
    /// responsible for tracing its own shadow rays (which also allows
    /// non-physical lights that cast none) and appends its samples to the
    /// state. Lights should take a single shadow sample once the diffuse
    /// depth is above 0 to avoid an exponential blowup.
    fn get_samples(&self, state: &mut ShadingState<'_, '_>);

    /// Sample a photon emission. The four random parameters are points on
    /// the unit square for position and direction sampling.
    fn get_photon(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> PhotonSample;

    /// Total power emitted; lights with 0 power emit no photons.
    fn power(&self) -> f32;

    /// An instance holding this light's geometry, created just before and
    /// discarded right after each render. `None` for point-like lights.
    fn create_instance(&self) -> Option<Arc<Instance>> {
        None
    }
}

/// A sample taken from a light source facing a point being shaded. The
/// radiance has already been attenuated by shadowing.
pub struct LightSample {
    shadow_ray: Ray,
    diffuse: Color,
    specular: Color,
}

impl LightSample {
    /// Create a sample with unshadowed radiance; call
    /// [`LightSample::trace_shadow`] before adding it to the state.
    pub fn new(shadow_ray: Ray, diffuse: Color, specular: Color) -> Self {
        Self {
            shadow_ray,
            diffuse,
            specular,
        }
    }

    /// Attenuate the radiance by the occlusion along the shadow ray.
    pub fn trace_shadow(&mut self, state: &mut ShadingState<'_, '_>) {
        let opacity = state.trace_shadow(&self.shadow_ray);
        self.diffuse += (BLACK - self.diffuse) * opacity;
        self.specular += (BLACK - self.specular) * opacity;
    }

    pub fn shadow_ray(&self) -> &Ray {
        &self.shadow_ray
    }

    pub fn diffuse_radiance(&self) -> Color {
        self.diffuse
    }

    pub fn specular_radiance(&self) -> Color {
        self.specular
    }

    /// Dot product of the sample direction with an arbitrary vector.
    pub fn dot(&self, v: Vec3) -> f32 {
        self.shadow_ray.dot(v)
    }
}

/// The light transport core.
///
/// Holds the light list, the pluggable caustic/global-illumination
/// engines and the per-bounce-type recursion limits, and provides the
/// radiance entry point plus the family of bounce tracing calls that
/// shaders re-enter through [`ShadingState`].
pub struct LightServer {
    lights: Vec<Arc<dyn LightSource>>,
    shader_override: Option<Arc<dyn Shader>>,
    shader_override_photons: bool,
    max_diffuse_depth: u32,
    max_reflection_depth: u32,
    max_refraction_depth: u32,
    caustic_map: Option<Box<dyn CausticPhotonMap>>,
    gi_engine: Option<Box<dyn GiEngine>>,
}

impl Default for LightServer {
    fn default() -> Self {
        Self {
            lights: Vec::new(),
            shader_override: None,
            shader_override_photons: false,
            max_diffuse_depth: 1,
            max_reflection_depth: 4,
            max_refraction_depth: 4,
            caustic_map: None,
            gi_engine: None,
        }
    }
}

impl LightServer {
    pub fn set_lights(&mut self, lights: Vec<Arc<dyn LightSource>>) {
        self.lights = lights;
    }

    pub fn lights(&self) -> &[Arc<dyn LightSource>] {
        &self.lights
    }

    /// Force every surface to use the given shader; `photon_override`
    /// extends the override to photon scattering.
    pub fn set_shader_override(&mut self, shader: Option<Arc<dyn Shader>>, photon_override: bool) {
        self.shader_override = shader;
        self.shader_override_photons = photon_override;
    }

    pub fn max_diffuse_depth(&self) -> u32 {
        self.max_diffuse_depth
    }

    pub fn max_reflection_depth(&self) -> u32 {
        self.max_reflection_depth
    }

    pub fn max_refraction_depth(&self) -> u32 {
        self.max_refraction_depth
    }

    /// Read options, set up the GI engine and trace the caustic photon
    /// pre-pass. Called by the scene at the start of each render.
    pub(crate) fn build(&mut self, scene: &Scene, options: &Options) -> Result<(), RenderError> {
        self.max_diffuse_depth = options
            .get_int("depths.diffuse", self.max_diffuse_depth as i32)
            .max(0) as u32;
        self.max_reflection_depth = options
            .get_int("depths.reflection", self.max_reflection_depth as i32)
            .max(0) as u32;
        self.max_refraction_depth = options
            .get_int("depths.refraction", self.max_refraction_depth as i32)
            .max(0) as u32;

        let num_light_samples: u32 = self.lights.iter().map(|l| l.num_samples()).sum();

        let gi_name = options.get_str("gi.engine").map(str::to_owned);
        self.gi_engine = gi_name
            .as_deref()
            .and_then(|name| scene.plugins().create_gi_engine(name));
        // engines may trace their own photon passes, so hand them the
        // server alongside the scene
        let mut engine = self.gi_engine.take();
        if let Some(engine) = &mut engine {
            if !engine.init(options, scene, self) {
                return Err(RenderError::GiInitFailed);
            }
        }
        self.gi_engine = engine;

        let caustics_name = options.get_str("caustics").map(str::to_owned);
        self.caustic_map = None;
        if let Some(name) = caustics_name.as_deref() {
            if let Some(mut map) = scene.plugins().create_caustic_map(name) {
                self.calculate_photons(scene, &mut *map, "caustic", 0, options)?;
                self.caustic_map = Some(map);
            }
        }

        log::info!("light server stats:");
        log::info!("  * light sources found: {}", self.lights.len());
        log::info!("  * light samples:       {num_light_samples}");
        log::info!("  * max raytrace depth:");
        log::info!("      - diffuse          {}", self.max_diffuse_depth);
        log::info!("      - reflection       {}", self.max_reflection_depth);
        log::info!("      - refraction       {}", self.max_refraction_depth);
        log::info!(
            "  * gi engine:           {}",
            gi_name.as_deref().unwrap_or("none")
        );
        log::info!(
            "  * caustics:            {}",
            caustics_name.as_deref().unwrap_or("none")
        );
        log::info!("  * shader override:     {}", self.shader_override.is_some());
        log::info!("  * photon override:     {}", self.shader_override_photons);
        Ok(())
    }

    /// Trace a photon map as prescribed by the given store.
    ///
    /// Lights are selected by inverting the cumulative power histogram at
    /// a low-discrepancy sample; the configured photon count is split
    /// into contiguous ranges, one per worker, and every worker owns its
    /// intersection state. Photon data has no shared mutable state; the
    /// only shared values are a progress counter under a mutex and the
    /// cancellation flag, neither of which affects correctness.
    pub fn calculate_photons(
        &self,
        scene: &Scene,
        map: &mut dyn PhotonStore,
        kind: &str,
        seed: u32,
        options: &Options,
    ) -> Result<(), RenderError> {
        if self.lights.is_empty() {
            log::error!("unable to trace {kind} photons, no lights in scene");
            return Err(RenderError::NoLights(kind.to_owned()));
        }
        let mut histogram = Vec::with_capacity(self.lights.len());
        let mut total = 0.0f32;
        for light in &self.lights {
            total += light.power();
            histogram.push(total);
        }
        log::info!("tracing {kind} photons ...");
        map.prepare(options, &scene.bounds());
        let num_emit = map.num_emit();
        if num_emit == 0 || total <= 0.0 {
            log::error!("photon mapping enabled, but no {kind} photons to emit");
            return Err(RenderError::NoPhotons(kind.to_owned()));
        }
        let scale = 1.0 / num_emit as f32;
        let workers = scene.threads();
        let delta = num_emit / workers;
        let counter = Mutex::new(0usize);
        let cancel = scene.cancel_token();
        {
            let shared: &dyn PhotonStore = &*map;
            let histogram = &histogram;
            (0..workers).into_par_iter().for_each(|worker| {
                let start = worker * delta;
                let end = if worker == workers - 1 {
                    num_emit
                } else {
                    (worker + 1) * delta
                };
                let mut istate = IntersectionState::new();
                for i in start..end {
                    {
                        let mut count = counter.lock().unwrap();
                        if *count % 100_000 == 0 {
                            log::debug!("tracing {kind} photons: {count}/{num_emit}");
                        }
                        *count += 1;
                    }
                    if cancel.is_canceled() {
                        return;
                    }
                    let qi = i as u32 + seed;
                    // pick a light by histogram inversion
                    let rand = qmc::halton(0, qi) * total as f64;
                    let mut j = 0;
                    while j < histogram.len() && rand >= histogram[j] as f64 {
                        j += 1;
                    }
                    // don't pick a zero-probability light
                    if j == histogram.len() {
                        continue;
                    }
                    let low = if j == 0 { 0.0 } else { histogram[j - 1] as f64 };
                    let rand_x1 = (rand - low) / (histogram[j] as f64 - low);
                    let rand_y1 = qmc::halton(1, qi);
                    let rand_x2 = qmc::halton(2, qi);
                    let rand_y2 = qmc::halton(3, qi);
                    let sample = self.lights[j].get_photon(rand_x1, rand_y1, rand_x2, rand_y2);
                    let power = sample.power * scale;
                    let mut r = Ray::new(sample.origin, sample.dir);
                    scene.trace(&mut r, &mut istate);
                    if istate.hit() {
                        let mut state = ShadingState::photon(scene, self, shared, &mut istate, r, qi);
                        self.shade_photon(&mut state, power);
                    }
                }
            });
        }
        if cancel.is_canceled() {
            return Err(RenderError::Canceled);
        }
        map.finalize();
        log::info!("done tracing {kind} photons");
        Ok(())
    }

    fn resolve_shader(&self, state: &ShadingState<'_, '_>) -> Option<Arc<dyn Shader>> {
        self.shader_override.clone().or_else(|| state.shader())
    }

    fn resolve_photon_shader(&self, state: &ShadingState<'_, '_>) -> Option<Arc<dyn Shader>> {
        if self.shader_override.is_some() && self.shader_override_photons {
            self.shader_override.clone()
        } else {
            state.shader()
        }
    }

    pub(crate) fn shade_photon(&self, state: &mut ShadingState<'_, '_>, power: Color) {
        let instance = state.instance().clone();
        instance.prepare_shading_state(state);
        if let Some(shader) = self.resolve_photon_shader(state) {
            shader.scatter_photon(state, power);
        }
    }

    pub(crate) fn trace_diffuse_photon(
        &self,
        previous: &mut ShadingState<'_, '_>,
        r: Ray,
        power: Color,
    ) {
        if previous.diffuse_depth() >= self.max_diffuse_depth {
            return;
        }
        let mut r = r;
        let scene = previous.scene();
        scene.trace(&mut r, previous.istate_mut());
        if previous.istate_mut().hit() {
            let mut state = ShadingState::diffuse_bounce(previous, r, 0);
            self.shade_photon(&mut state, power);
        }
    }

    pub(crate) fn trace_reflection_photon(
        &self,
        previous: &mut ShadingState<'_, '_>,
        r: Ray,
        power: Color,
    ) {
        if previous.reflection_depth() >= self.max_reflection_depth {
            return;
        }
        let mut r = r;
        let scene = previous.scene();
        scene.trace(&mut r, previous.istate_mut());
        if previous.istate_mut().hit() {
            let mut state = ShadingState::reflection_bounce(previous, r, 0);
            self.shade_photon(&mut state, power);
        }
    }

    pub(crate) fn trace_refraction_photon(
        &self,
        previous: &mut ShadingState<'_, '_>,
        r: Ray,
        power: Color,
    ) {
        if previous.refraction_depth() >= self.max_refraction_depth {
            return;
        }
        let mut r = r;
        let scene = previous.scene();
        scene.trace(&mut r, previous.istate_mut());
        if previous.istate_mut().hit() {
            let mut state = ShadingState::refraction_bounce(previous, r, 0);
            self.shade_photon(&mut state, power);
        }
    }

    /// Primary ray entry point: trace, build the shading state, run the
    /// shader (through the cache when one is provided).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn get_radiance<'a, 'i>(
        &'a self,
        scene: &'a Scene,
        rx: f32,
        ry: f32,
        time: f32,
        i: u32,
        d: u32,
        mut r: Ray,
        istate: &'i mut IntersectionState,
        mut cache: Option<&mut ShadingCache>,
    ) -> Option<ShadingState<'a, 'i>> {
        // stays constant for the entire ray tree
        istate.time = time;
        scene.trace(&mut r, istate);
        if !istate.hit() {
            return None;
        }
        let mut state = ShadingState::primary(scene, self, istate, r, rx, ry, i, d);
        let instance = state.instance().clone();
        instance.prepare_shading_state(&mut state);
        let Some(shader) = self.resolve_shader(&state) else {
            state.set_result(BLACK);
            return Some(state);
        };
        if let Some(cache) = cache.as_deref_mut() {
            if let Some(c) = cache.lookup(&state, &shader) {
                state.set_result(c);
                return Some(state);
            }
        }
        let c = shader.radiance(&mut state);
        if let Some(cache) = cache {
            cache.add(&state, &shader, c);
        }
        check_nan_inf(c);
        state.set_result(c);
        Some(state)
    }

    pub(crate) fn shade_bake_result(&self, state: &mut ShadingState<'_, '_>) {
        let c = match self.resolve_shader(state) {
            Some(shader) => shader.radiance(state),
            None => BLACK,
        };
        state.set_result(c);
    }

    pub(crate) fn shade_hit(&self, state: &mut ShadingState<'_, '_>) -> Color {
        let instance = state.instance().clone();
        instance.prepare_shading_state(state);
        match self.resolve_shader(state) {
            Some(shader) => shader.radiance(state),
            None => BLACK,
        }
    }

    pub(crate) fn trace_glossy(
        &self,
        previous: &mut ShadingState<'_, '_>,
        r: Ray,
        i: u32,
    ) -> Color {
        // limit path depth and disable caustic side-paths
        if previous.reflection_depth() >= self.max_reflection_depth || previous.diffuse_depth() > 0
        {
            return BLACK;
        }
        let mut r = r;
        let scene = previous.scene();
        previous.istate_mut().counters.glossy_rays += 1;
        scene.trace(&mut r, previous.istate_mut());
        if !previous.istate_mut().hit() {
            return BLACK;
        }
        let mut state = ShadingState::glossy_bounce(previous, r, i);
        self.shade_hit(&mut state)
    }

    pub(crate) fn trace_reflection(
        &self,
        previous: &mut ShadingState<'_, '_>,
        r: Ray,
        i: u32,
    ) -> Color {
        if previous.reflection_depth() >= self.max_reflection_depth || previous.diffuse_depth() > 0
        {
            return BLACK;
        }
        let mut r = r;
        let scene = previous.scene();
        previous.istate_mut().counters.reflection_rays += 1;
        scene.trace(&mut r, previous.istate_mut());
        if !previous.istate_mut().hit() {
            return BLACK;
        }
        let mut state = ShadingState::reflection_bounce(previous, r, i);
        self.shade_hit(&mut state)
    }

    pub(crate) fn trace_refraction(
        &self,
        previous: &mut ShadingState<'_, '_>,
        r: Ray,
        i: u32,
    ) -> Color {
        if previous.refraction_depth() >= self.max_refraction_depth || previous.diffuse_depth() > 0
        {
            return BLACK;
        }
        let mut r = r;
        let scene = previous.scene();
        previous.istate_mut().counters.refraction_rays += 1;
        scene.trace(&mut r, previous.istate_mut());
        if !previous.istate_mut().hit() {
            return BLACK;
        }
        let mut state = ShadingState::refraction_bounce(previous, r, i);
        self.shade_hit(&mut state)
    }

    pub(crate) fn trace_final_gather<'a, 's>(
        &self,
        previous: &'s mut ShadingState<'a, '_>,
        r: Ray,
        i: u32,
    ) -> Option<ShadingState<'a, 's>> {
        if previous.diffuse_depth() >= self.max_diffuse_depth {
            return None;
        }
        let mut r = r;
        let scene = previous.scene();
        scene.trace(&mut r, previous.istate_mut());
        if !previous.istate_mut().hit() {
            return None;
        }
        Some(ShadingState::final_gather_bounce(previous, r, i))
    }

    pub(crate) fn global_radiance(&self, state: &mut ShadingState<'_, '_>) -> Color {
        match &self.gi_engine {
            Some(engine) => engine.global_radiance(state),
            None => BLACK,
        }
    }

    pub(crate) fn irradiance(
        &self,
        state: &mut ShadingState<'_, '_>,
        diffuse_reflectance: Color,
    ) -> Color {
        // no engine, or no diffuse bounces left
        if state.diffuse_depth() >= self.max_diffuse_depth {
            return BLACK;
        }
        match &self.gi_engine {
            Some(engine) => engine.irradiance(state, diffuse_reflectance),
            None => BLACK,
        }
    }

    pub(crate) fn init_light_samples(&self, state: &mut ShadingState<'_, '_>) {
        for light in &self.lights {
            light.get_samples(state);
        }
    }

    pub(crate) fn init_caustic_samples(&self, state: &mut ShadingState<'_, '_>) {
        if let Some(map) = &self.caustic_map {
            map.get_samples(state);
        }
    }
}

fn check_nan_inf(c: Color) {
    if c.is_nan() {
        log::warn!("NaN shading sample!");
    } else if !c.is_finite() {
        log::warn!("Inf shading sample!");
    }
}
