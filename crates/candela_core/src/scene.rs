use std::sync::{Arc, Mutex};

use candela_math::{Aabb, Ray, Vec3};

use crate::accel::{AccelType, AccelerationStructure};
use crate::cache::ShadingCache;
use crate::camera::Camera;
use crate::color::{Color, BLACK, WHITE};
use crate::display::Display;
use crate::error::RenderError;
use crate::instance::{Instance, InstanceList};
use crate::isect::IntersectionState;
use crate::light::{LightServer, LightSource};
use crate::options::Options;
use crate::photon::{PhotonStore, PluginTable};
use crate::primitive::PrimitiveList;
use crate::sampler::ImageSampler;
use crate::shader::Shader;
use crate::shading::ShadingState;
use crate::stats::Statistics;
use crate::CancelToken;

const MAX_RESOLUTION: i32 = 1 << 14;

/// An entire scene: a collection of instances viewed by a camera.
///
/// Owns the top-level acceleration structure over the finite instances
/// and the light server, and orchestrates one render invocation. The
/// scene graph must not be mutated while a render is in progress; all
/// setters are `&mut self` to make that impossible by construction.
pub struct Scene {
    light_server: LightServer,
    instances: Vec<Arc<Instance>>,
    infinite_instances: Vec<Arc<Instance>>,
    instance_list: Arc<InstanceList>,
    infinite_list: Arc<InstanceList>,
    accel: Option<Box<dyn AccelerationStructure>>,
    accel_type: AccelType,
    rebuild_accel: bool,
    camera: Option<Arc<Camera>>,
    // lightmap baking
    baking_view_dependent: bool,
    baking_instance: Option<Arc<Instance>>,
    baking_primitives: Option<Arc<dyn PrimitiveList>>,
    baking_accel: Option<Box<dyn AccelerationStructure>>,
    // image size
    image_width: u32,
    image_height: u32,
    // global options
    threads: usize,
    plugins: PluginTable,
    stats: Mutex<Statistics>,
    cancel: CancelToken,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self {
            light_server: LightServer::default(),
            instances: Vec::new(),
            infinite_instances: Vec::new(),
            instance_list: Arc::new(InstanceList::new(Vec::new(), Vec::new())),
            infinite_list: Arc::new(InstanceList::new(Vec::new(), Vec::new())),
            accel: None,
            accel_type: AccelType::Auto,
            rebuild_accel: true,
            camera: None,
            baking_view_dependent: false,
            baking_instance: None,
            baking_primitives: None,
            baking_accel: None,
            image_width: 640,
            image_height: 480,
            threads: 0,
            plugins: PluginTable::new(),
            stats: Mutex::new(Statistics::default()),
            cancel: CancelToken::new(),
        }
    }

    /// Inject the capability table used to resolve `gi.engine` and
    /// `caustics` option values.
    pub fn with_plugins(mut self, plugins: PluginTable) -> Self {
        self.plugins = plugins;
        self
    }

    pub(crate) fn plugins(&self) -> &PluginTable {
        &self.plugins
    }

    /// Number of worker threads for multi-threaded phases.
    pub fn threads(&self) -> usize {
        if self.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.threads
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Sets the current camera (no support for multiple cameras yet).
    pub fn set_camera(&mut self, camera: Arc<Camera>) {
        self.camera = Some(camera);
    }

    pub(crate) fn camera(&self) -> Option<&Arc<Camera>> {
        self.camera.as_ref()
    }

    /// Update the instance lists for this scene. Instances without a
    /// finite bound go into the second list and are tested exhaustively
    /// before every indexed query.
    pub fn set_instances(&mut self, instances: Vec<Arc<Instance>>, infinite: Vec<Arc<Instance>>) {
        self.instances = instances;
        self.infinite_instances = infinite;
        self.rebuild_accel = true;
    }

    /// Update the light list for this scene.
    pub fn set_lights(&mut self, lights: Vec<Arc<dyn LightSource>>) {
        self.light_server.set_lights(lights);
    }

    /// Force every surface to be shaded with the given shader; pass
    /// `None` to disable overriding.
    pub fn set_shader_override(&mut self, shader: Option<Arc<dyn Shader>>, photon_override: bool) {
        self.light_server
            .set_shader_override(shader, photon_override);
    }

    /// The given instance will be baked into a lightmap instead of
    /// rendering through the camera; `None` restores normal rendering.
    pub fn set_baking_instance(&mut self, instance: Option<Arc<Instance>>) {
        self.baking_instance = instance;
    }

    pub fn lights(&self) -> &LightServer {
        &self.light_server
    }

    /// Scene bounding box over the finite instances.
    pub fn bounds(&self) -> Aabb {
        self.instance_list.world_bounds(None)
    }

    pub fn image_width(&self) -> u32 {
        self.image_width
    }

    pub fn image_height(&self) -> u32 {
        self.image_height
    }

    pub fn accumulate_stats(&self, state: &IntersectionState) {
        self.stats.lock().unwrap().accumulate(&state.counters);
    }

    pub fn accumulate_cache_stats(&self, cache: &ShadingCache) {
        self.stats.lock().unwrap().accumulate_cache(cache);
    }

    /// Find the nearest intersection along the ray: the (typically tiny)
    /// unbounded instance list is scanned exhaustively, then the
    /// top-level index is queried.
    pub fn trace(&self, r: &mut Ray, state: &mut IntersectionState) {
        state.counters.rays += 1;
        // reset the hit
        state.instance = None;
        state.current = None;
        for i in 0..self.infinite_list.num_primitives() {
            self.infinite_list.intersect_primitive(r, i, state);
        }
        // reset for the indexed search
        state.current = None;
        if let Some(accel) = &self.accel {
            accel.intersect(r, state);
        }
    }

    /// Binary occlusion: white when the segment is blocked.
    pub fn trace_shadow(&self, r: &mut Ray, state: &mut IntersectionState) -> Color {
        state.counters.shadow_rays += 1;
        self.trace(r, state);
        if state.hit() {
            WHITE
        } else {
            BLACK
        }
    }

    fn trace_bake(&self, r: &mut Ray, state: &mut IntersectionState) {
        // pretend we are tracing into the instance being baked
        state.current = self.baking_instance.clone();
        state.instance = None;
        if let Some(accel) = &self.baking_accel {
            accel.intersect(r, state);
        }
    }

    /// Radiance seen through one image sample, or `None` when nothing is
    /// visible through it. `lens_u`/`lens_v` drive depth of field, `time`
    /// motion blur; `i`/`d` seed the QMC stream.
    #[allow(clippy::too_many_arguments)]
    pub fn get_radiance<'a, 'i>(
        &'a self,
        istate: &'i mut IntersectionState,
        rx: f32,
        ry: f32,
        lens_u: f64,
        lens_v: f64,
        time: f64,
        i: u32,
        d: u32,
        cache: Option<&mut ShadingCache>,
    ) -> Option<ShadingState<'a, 'i>> {
        istate.counters.eye_rays += 1;
        let camera = self.camera.as_ref()?;
        let scene_time = camera.time(time as f32);
        if self.baking_primitives.is_none() {
            let r = camera.ray(
                rx,
                ry,
                self.image_width,
                self.image_height,
                lens_u,
                lens_v,
                scene_time,
            )?;
            self.light_server
                .get_radiance(self, rx, ry, scene_time, i, d, r, istate, cache)
        } else {
            let mut r = Ray::new(
                Vec3::new(
                    rx / self.image_width as f32,
                    ry / self.image_height as f32,
                    -1.0,
                ),
                Vec3::Z,
            );
            istate.time = scene_time;
            self.trace_bake(&mut r, istate);
            if !istate.hit() {
                return None;
            }
            let mut state =
                ShadingState::primary(self, &self.light_server, istate, r, rx, ry, i, d);
            self.baking_primitives
                .as_ref()
                .unwrap()
                .prepare_shading_state(&mut state);
            if self.baking_view_dependent {
                state.set_ray(camera.point_ray(state.point(), scene_time));
            } else {
                let p = state.point();
                let n = state.normal().unwrap_or(Vec3::Z);
                // a ray coming from directly above the point being shaded
                let mut incoming = Ray::new(p + n, -n);
                incoming.set_max(1.0);
                state.set_ray(incoming);
            }
            self.light_server.shade_bake_result(&mut state);
            Some(state)
        }
    }

    /// Render the scene using the given options, image sampler and
    /// display. Passing no sampler builds everything but renders nothing.
    pub fn render(
        &mut self,
        options: &Options,
        sampler: Option<&mut dyn ImageSampler>,
        display: &dyn Display,
    ) -> Result<(), RenderError> {
        self.stats.lock().unwrap().reset();
        self.cancel.reset();

        if let Some(baking_instance) = &self.baking_instance {
            log::debug!("creating primitives for lightmapping ...");
            let Some(primitives) = baking_instance.baking_primitives() else {
                log::error!("lightmap baking is not supported for the given instance");
                return Err(RenderError::BakingUnsupported);
            };
            let n = primitives.num_primitives();
            log::info!("building acceleration structure for lightmapping ({n} primitives) ...");
            let mut accel = AccelType::Auto.create(n, true);
            accel.build(primitives.clone());
            self.baking_primitives = Some(primitives);
            self.baking_accel = Some(accel);
        } else {
            self.baking_primitives = None;
            self.baking_accel = None;
        }
        self.baking_view_dependent =
            options.get_bool("baking.viewdep", self.baking_view_dependent);

        let camera_required = self.baking_instance.is_none() || self.baking_view_dependent;
        if camera_required && self.camera.is_none() {
            log::error!("no camera found");
            return Err(RenderError::NoCamera);
        }

        // read global options
        self.threads = options.get_int("threads", 0).max(0) as usize;
        if options.get_bool("threads.lowPriority", true) {
            log::debug!("worker thread priority hint ignored on this platform");
        }
        self.image_width = options
            .get_int("resolutionX", self.image_width as i32)
            .clamp(1, MAX_RESOLUTION) as u32;
        self.image_height = options
            .get_int("resolutionY", self.image_height as i32)
            .clamp(1, MAX_RESOLUTION) as u32;

        // materialize area light geometry as temporary instances
        let mut area_lights = Vec::new();
        let mut infinite_area_lights = Vec::new();
        for light in self.light_server.lights() {
            if let Some(instance) = light.create_instance() {
                if instance.bounds().is_some() {
                    area_lights.push(instance);
                } else {
                    infinite_area_lights.push(instance);
                }
            }
        }
        // TODO: incremental insertion of light instances would avoid the
        // top-level rebuild on every frame
        self.instance_list = Arc::new(InstanceList::new(self.instances.clone(), area_lights));
        self.infinite_list = Arc::new(InstanceList::new(
            self.infinite_instances.clone(),
            infinite_area_lights,
        ));
        self.rebuild_accel = true;

        let num_instances = self.instance_list.num_primitives();
        let num_primitives: usize = (0..num_instances)
            .map(|i| self.instance_list.num_primitives_in(i))
            .sum();
        log::info!("scene stats:");
        log::info!(
            "  * infinite instances:  {}",
            self.infinite_list.num_primitives()
        );
        log::info!("  * instances:           {num_instances}");
        log::info!("  * primitives:          {num_primitives}");
        if let Some(name) = options.get_str("accel") {
            let accel_type = AccelType::parse(name);
            if accel_type != self.accel_type {
                self.accel_type = accel_type;
                self.rebuild_accel = true;
            }
        }
        log::info!("  * instance accel:      {:?}", self.accel_type);
        if self.rebuild_accel {
            let mut accel = self.accel_type.create(num_instances, false);
            accel.build(self.instance_list.clone());
            self.accel = Some(accel);
            self.rebuild_accel = false;
        }
        let bounds = self.bounds();
        log::info!(
            "  * scene bounds:        {:?} -> {:?}",
            bounds.min(),
            bounds.max()
        );
        log::info!(
            "  * lightmap bake:       {}",
            if self.baking_instance.is_some() {
                if self.baking_view_dependent {
                    "view"
                } else {
                    "ortho"
                }
            } else {
                "off"
            }
        );

        // the light server needs the built scene for its photon pre-pass,
        // so it is detached for the duration of the build
        let mut server = std::mem::take(&mut self.light_server);
        let built = server.build(self, options);
        self.light_server = server;
        built?;

        if let Some(sampler) = sampler {
            log::info!("rendering ...");
            self.stats
                .lock()
                .unwrap()
                .set_resolution(self.image_width, self.image_height);
            sampler.prepare(options, self.image_width, self.image_height)?;
            sampler.render(self, display);
            self.stats.lock().unwrap().log_stats();
        }

        // discard temporary light instances and baking structures
        self.instance_list = Arc::new(InstanceList::new(self.instances.clone(), Vec::new()));
        self.infinite_list = Arc::new(InstanceList::new(
            self.infinite_instances.clone(),
            Vec::new(),
        ));
        self.baking_primitives = None;
        self.baking_accel = None;
        if self.cancel.is_canceled() {
            return Err(RenderError::Canceled);
        }
        log::info!("done.");
        Ok(())
    }

    /// Create a photon map as prescribed by the given store, outside the
    /// regular caustic pre-pass (e.g. for a GI engine's own maps).
    pub fn calculate_photons(
        &self,
        map: &mut dyn PhotonStore,
        kind: &str,
        seed: u32,
        options: &Options,
    ) -> Result<(), RenderError> {
        self.light_server
            .calculate_photons(self, map, kind, seed, options)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
