use std::collections::HashMap;

use candela_math::{Aabb, Vec3};

use crate::color::Color;
use crate::options::Options;
use crate::scene::Scene;
use crate::shading::ShadingState;

/// Sink for traced photons.
///
/// Lifecycle: `prepare` once, then `store` concurrently from the emission
/// workers, then `finalize` once after all workers joined. Lookups against
/// the store are only legal after `finalize`. `store` takes `&self`, so
/// implementations synchronize internally.
pub trait PhotonStore: Send + Sync {
    /// Number of photons to emit into this store.
    fn num_emit(&self) -> usize;

    /// Initialize for the given scene extents.
    fn prepare(&mut self, options: &Options, scene_bounds: &Aabb);

    /// Store one photon arriving at the state's hit point.
    fn store(&self, state: &ShadingState<'_, '_>, dir: Vec3, power: Color, diffuse: Color);

    /// Called once after emission completes, e.g. to balance a kd-tree.
    fn finalize(&mut self);

    /// Gate for diffusely bounced photons.
    fn allow_diffuse_bounced(&self) -> bool;

    /// Gate for specularly reflected photons.
    fn allow_reflection_bounced(&self) -> bool;

    /// Gate for refracted photons.
    fn allow_refraction_bounced(&self) -> bool;
}

/// A photon store that can also contribute resolved light samples to a
/// shading state, the way a caustic map does.
pub trait CausticPhotonMap: PhotonStore {
    fn get_samples(&self, state: &mut ShadingState<'_, '_>);
}

/// A global illumination strategy, computing indirect diffuse bounces.
pub trait GiEngine: Send + Sync {
    /// Called before rendering begins. The light server is passed
    /// alongside the scene so engines can run their own photon passes.
    fn init(&mut self, options: &Options, scene: &Scene, lights: &crate::light::LightServer)
        -> bool;

    /// Incoming irradiance from indirect diffuse illumination.
    fn irradiance(&self, state: &mut ShadingState<'_, '_>, diffuse_reflectance: Color) -> Color;

    /// Optional approximation of the global radiance in the scene.
    /// Engines without one return black.
    fn global_radiance(&self, state: &mut ShadingState<'_, '_>) -> Color {
        let _ = state;
        crate::color::BLACK
    }
}

type GiFactory = Box<dyn Fn() -> Box<dyn GiEngine> + Send + Sync>;
type CausticFactory = Box<dyn Fn() -> Box<dyn CausticPhotonMap> + Send + Sync>;

/// Capability lookup for the pluggable illumination strategies, injected
/// into the scene at construction. Option values (`gi.engine`,
/// `caustics`) name entries in this table; an unknown name is reported
/// and the feature dropped.
#[derive(Default)]
pub struct PluginTable {
    gi_engines: HashMap<String, GiFactory>,
    caustic_maps: HashMap<String, CausticFactory>,
}

impl PluginTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_gi_engine(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn GiEngine> + Send + Sync + 'static,
    ) {
        self.gi_engines.insert(name.into(), Box::new(factory));
    }

    pub fn register_caustic_map(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn CausticPhotonMap> + Send + Sync + 'static,
    ) {
        self.caustic_maps.insert(name.into(), Box::new(factory));
    }

    pub(crate) fn create_gi_engine(&self, name: &str) -> Option<Box<dyn GiEngine>> {
        match self.gi_engines.get(name) {
            Some(factory) => Some(factory()),
            None => {
                log::error!("unknown gi engine \"{name}\" - global illumination disabled");
                None
            }
        }
    }

    pub(crate) fn create_caustic_map(&self, name: &str) -> Option<Box<dyn CausticPhotonMap>> {
        match self.caustic_maps.get(name) {
            Some(factory) => Some(factory()),
            None => {
                log::error!("unknown caustic map \"{name}\" - caustics disabled");
                None
            }
        }
    }
}
