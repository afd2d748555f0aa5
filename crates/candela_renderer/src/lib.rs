//! candela renderer - drives the core kernel into images.
//!
//! Provides the bucket-based image sampler, display sinks, and a small
//! stock of concrete lenses, shaders, lights and primitives: enough to
//! render complete scenes and to exercise every path of the kernel.

mod bucket;
mod framebuffer;
mod lens;
mod lights;
mod mesh;
mod sampler;
mod shaders;
mod sphere;

pub use bucket::{generate_buckets, Bucket, DEFAULT_BUCKET_SIZE};
pub use framebuffer::FrameBuffer;
pub use lens::PinholeLens;
pub use lights::PointLight;
pub use mesh::TriangleMesh;
pub use sampler::BucketSampler;
pub use shaders::{DiffuseShader, GlassShader, MirrorShader};
pub use sphere::Sphere;

// Re-export the pieces callers wire together most often
pub use candela_core::{Color, Display, Options, Scene};
pub use candela_math::{Vec3, Ray};
