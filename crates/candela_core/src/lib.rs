//! candela core - the rendering kernel.
//!
//! This crate holds the pieces every render pass is built from:
//!
//! - **Spatial indexing**: the [`accel`] family of acceleration structures
//!   over anything implementing [`PrimitiveList`]
//! - **Two-level scene graph**: [`Geometry`] (object space primitives plus a
//!   lazily built local index) placed into the world by [`Instance`]s
//! - **Light transport**: [`LightServer`] drives direct lighting, bounded
//!   recursive bounces and the photon pre-pass; [`ShadingState`] is the
//!   per-hit context handed to shaders
//! - **Orchestration**: [`Scene`] owns the top-level index and the camera
//!   and runs a render through an [`ImageSampler`] into a [`Display`]
//!
//! Concrete shaders, lights, primitives and samplers live in separate
//! crates; this one only defines their contracts.

pub mod accel;
mod cache;
mod camera;
mod color;
mod display;
mod error;
mod geometry;
mod instance;
mod isect;
mod light;
mod options;
mod photon;
mod primitive;
mod sampler;
mod scene;
mod shader;
mod shading;
mod stats;

pub use accel::{AccelType, AccelerationStructure};
pub use cache::ShadingCache;
pub use camera::{Camera, CameraLens};
pub use color::{average, is_black, luminance, Color, BLACK, WHITE};
pub use display::Display;
pub use error::RenderError;
pub use geometry::Geometry;
pub use instance::{Instance, InstanceList};
pub use isect::{IntersectionState, RayCounters, StackFrame, MAX_STACK_SIZE};
pub use light::{LightSample, LightServer, LightSource, PhotonSample};
pub use options::{Options, Value};
pub use photon::{CausticPhotonMap, GiEngine, PhotonStore, PluginTable};
pub use primitive::{PrimitiveList, Tesselatable};
pub use sampler::ImageSampler;
pub use scene::Scene;
pub use shader::{Modifier, Shader};
pub use shading::ShadingState;
pub use stats::Statistics;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag for cooperative cancellation. Workers poll it between units
/// of work (a bucket, a photon) and unwind without partial writes.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the in-flight work.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clear the flag so the token can be reused for another pass.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}
