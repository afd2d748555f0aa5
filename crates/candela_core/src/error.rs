use thiserror::Error;

/// Errors that can abort a render pass.
///
/// Only conditions that make the whole pass meaningless are reported this
/// way. Per-object configuration problems are logged and the offending
/// object dropped, and violated build invariants inside the spatial indices
/// are logic defects that panic instead.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("no camera found")]
    NoCamera,

    #[error("unable to compute transform inverse")]
    SingularTransform,

    #[error("unable to trace {0} photons, no lights in scene")]
    NoLights(String),

    #[error("photon mapping enabled, but no {0} photons to emit")]
    NoPhotons(String),

    #[error("global illumination engine failed to initialize")]
    GiInitFailed,

    #[error("lightmap baking is not supported for the given instance")]
    BakingUnsupported,

    #[error("render was canceled")]
    Canceled,

    #[error("image sampler failed to prepare: {0}")]
    SamplerPrepare(String),
}
