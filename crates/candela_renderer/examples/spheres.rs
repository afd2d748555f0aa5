//! Renders a small field of spheres with diffuse, mirror and glass
//! surfaces lit by a point light, and writes the result to spheres.png.

use std::sync::Arc;

use anyhow::Context;
use candela_core::{Camera, Color, Geometry, Instance, LightSource, Options, Scene, Shader};
use candela_math::{Mat4, MovingMat4, Vec3};
use candela_renderer::{
    BucketSampler, DiffuseShader, FrameBuffer, GlassShader, MirrorShader, PinholeLens, PointLight,
    Sphere,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 360;

fn sphere(at: Vec3, radius: f32, shader: Arc<dyn Shader>) -> Arc<Instance> {
    let transform = Mat4::from_translation(at) * Mat4::from_scale(Vec3::splat(radius));
    Arc::new(
        Instance::new(
            Arc::new(Geometry::from_primitives(Arc::new(Sphere))),
            MovingMat4::new(transform),
            vec![shader],
            Vec::new(),
        )
        .expect("invertible transform"),
    )
}

fn build_scene() -> Scene {
    let mut scene = Scene::new();
    let gray: Arc<dyn Shader> = Arc::new(DiffuseShader::new(Color::splat(0.6)));
    let mirror: Arc<dyn Shader> = Arc::new(MirrorShader::new(Color::splat(0.85)));
    let glass: Arc<dyn Shader> = Arc::new(GlassShader::new(1.5, Color::splat(0.95)));

    let mut instances = vec![
        // ground
        sphere(Vec3::new(0.0, -1000.0, 0.0), 1000.0, gray.clone()),
        // hero spheres
        sphere(Vec3::new(-2.5, 1.0, 0.0), 1.0, mirror),
        sphere(Vec3::new(0.0, 1.0, 0.0), 1.0, glass),
        sphere(
            Vec3::new(2.5, 1.0, 0.0),
            1.0,
            Arc::new(DiffuseShader::new(Color::new(0.7, 0.3, 0.2))),
        ),
    ];
    // scatter some small ones around
    let mut rng = StdRng::seed_from_u64(20260806);
    for _ in 0..40 {
        let x = rng.gen_range(-8.0..8.0);
        let z = rng.gen_range(-6.0..4.0);
        if x * x + z * z < 2.0 {
            continue;
        }
        let r = rng.gen_range(0.15..0.35);
        let albedo = Color::new(
            rng.gen_range(0.2..0.9),
            rng.gen_range(0.2..0.9),
            rng.gen_range(0.2..0.9),
        );
        instances.push(sphere(
            Vec3::new(x, r, z),
            r,
            Arc::new(DiffuseShader::new(albedo)),
        ));
    }
    scene.set_instances(instances, Vec::new());

    let key: Arc<dyn LightSource> = Arc::new(PointLight::new(
        Vec3::new(6.0, 9.0, -4.0),
        Color::splat(12_000.0),
    ));
    let fill: Arc<dyn LightSource> = Arc::new(PointLight::new(
        Vec3::new(-7.0, 5.0, -6.0),
        Color::new(2500.0, 2800.0, 3200.0),
    ));
    scene.set_lights(vec![key, fill]);

    let eye = Vec3::new(0.0, 2.2, -8.0);
    let camera = Camera::new(Box::new(PinholeLens::new(
        55.0,
        WIDTH as f32 / HEIGHT as f32,
    )))
    .with_transform(MovingMat4::new(
        Mat4::look_at_rh(eye, Vec3::new(0.0, 0.8, 0.0), Vec3::Y).inverse(),
    ))
    .expect("camera transform");
    scene.set_camera(Arc::new(camera));
    scene
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let mut scene = build_scene();

    let mut options = Options::new();
    options.set_int("resolutionX", WIDTH as i32);
    options.set_int("resolutionY", HEIGHT as i32);
    options.set_int("aa.samples", 16);
    options.set_int("depths.reflection", 4);
    options.set_int("depths.refraction", 6);

    let mut sampler = BucketSampler::new();
    let framebuffer = FrameBuffer::new();
    let start = std::time::Instant::now();
    scene.render(&options, Some(&mut sampler), &framebuffer)?;
    log::info!("rendered in {:?}", start.elapsed());

    framebuffer
        .save_png("spheres.png")
        .context("writing spheres.png")?;
    println!("wrote spheres.png");
    Ok(())
}
