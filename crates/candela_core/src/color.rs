//! Radiance values are plain RGB vectors.

use candela_math::Vec3;

/// Color type alias (linear RGB, unbounded).
pub type Color = Vec3;

pub const BLACK: Color = Vec3::ZERO;
pub const WHITE: Color = Vec3::ONE;

/// Perceptual luminance of a color.
#[inline]
pub fn luminance(c: Color) -> f32 {
    0.2989 * c.x + 0.5866 * c.y + 0.1145 * c.z
}

/// Arithmetic mean of the three channels.
#[inline]
pub fn average(c: Color) -> f32 {
    (c.x + c.y + c.z) / 3.0
}

#[inline]
pub fn is_black(c: Color) -> bool {
    c == BLACK
}
