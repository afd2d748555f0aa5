use crate::display::Display;
use crate::error::RenderError;
use crate::options::Options;
use crate::scene::Scene;

/// An image sampling algorithm capable of rendering the entire image.
/// Implementations are responsible for anti-aliasing and filtering.
pub trait ImageSampler {
    /// Prepare for rendering an image of `w` x `h` pixels.
    fn prepare(&mut self, options: &Options, w: u32, h: u32) -> Result<(), RenderError>;

    /// Render the image to the given display. The display has already
    /// been opened and will be closed after this returns.
    fn render(&mut self, scene: &Scene, display: &dyn Display);
}
