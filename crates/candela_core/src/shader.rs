use crate::color::Color;
use crate::shading::ShadingState;

/// A particular light-surface interaction.
///
/// `radiance` is invoked at every resolved hit and may request further
/// bounce tracing through the state; `scatter_photon` implements the same
/// surface's behavior during the photon pre-pass.
pub trait Shader: Send + Sync {
    fn radiance(&self, state: &mut ShadingState<'_, '_>) -> Color;
    fn scatter_photon(&self, state: &mut ShadingState<'_, '_>, power: Color);
}

/// Mutates a shading state in place before the shader runs, e.g. bump or
/// normal perturbation.
pub trait Modifier: Send + Sync {
    fn modify(&self, state: &mut ShadingState<'_, '_>);
}
