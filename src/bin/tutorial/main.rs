//! Builds a small scene on the host device and assembles one frame.
//!
//! Ten thousand spheres on a Fibonacci shell, colored through a 1D sampler
//! by their distance from the origin, seen by a perspective camera.

use anyhow::{bail, Context};
use glam::{UVec2, Vec3, Vec4};
use std::sync::Arc;

use scene_gpu::array::Extent;
use scene_gpu::prelude::*;

const NUM_SPHERES: u32 = 10_000;
const RADIUS: f32 = 0.015;

fn generate_world(ctx: &DeviceContext) -> anyhow::Result<Arc<World>> {
    let golden = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
    let mut positions = Vec::with_capacity(NUM_SPHERES as usize);
    let mut distances = Vec::with_capacity(NUM_SPHERES as usize);
    for i in 0..NUM_SPHERES {
        let t = (i as f32 + 0.5) / NUM_SPHERES as f32;
        let y = 1.0 - 2.0 * t;
        let r = (1.0 - y * y).sqrt();
        let theta = golden * i as f32;
        let shell = 0.25 + 0.75 * ((i * 7919) % 101) as f32 / 100.0;
        let p = Vec3::new(r * theta.cos(), y, r * theta.sin()) * shell;
        positions.push(p.to_array());
        distances.push(p.length());
    }
    // Reverse order so primitive.index is exercised
    let indices: Vec<u32> = (0..NUM_SPHERES).rev().collect();

    let n = NUM_SPHERES as usize;
    let geometry = ctx.new_geometry("sphere");
    geometry.set_param("primitive.index", ctx.array_from(DataType::UINT32, Extent::D1(n), &indices)?);
    geometry.set_param("vertex.position", ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(n), &positions)?);
    geometry.set_param("vertex.attribute0", ctx.array_from(DataType::FLOAT32, Extent::D1(n), &distances)?);
    geometry.set_param("radius", RADIUS);
    geometry.commit(ctx)?;

    let texels = [[1.0f32, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let texture = ctx.new_sampler("image1D");
    texture.set_param("image", ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(2), &texels)?);
    texture.set_param("filter", "linear");
    texture.commit(ctx)?;

    let material = ctx.new_material("matte");
    material.set_param("color", &texture);
    material.commit(ctx)?;

    let surface = ctx.new_surface();
    surface.set_param("geometry", &geometry);
    surface.set_param("material", &material);
    surface.commit(ctx)?;

    let light = ctx.new_light("directional");
    light.set_param("direction", Vec3::new(0.0, -1.0, 1.0));
    light.commit(ctx)?;

    let world = ctx.new_world();
    world.set_param("surface", vec![surface]);
    world.set_param("light", vec![light]);
    world.commit(ctx)?;
    if !world.is_valid() {
        bail!("world #{} failed to commit", world.id());
    }
    Ok(world)
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::load();
    let _guard = scene_gpu::logging::init(&settings.log_filter);
    tracing::info!(
        "scene-gpu tutorial (built {} {})",
        env!("SCENE_GPU_BUILD_DATE"),
        env!("SCENE_GPU_BUILD_TIME")
    );

    let ctx = DeviceContext::host(settings);
    let world = generate_world(&ctx).context("building scene")?;

    let image_size = UVec2::new(1200, 800);
    let camera = ctx.new_camera("perspective");
    camera.set_param("position", Vec3::new(0.0, 0.0, -2.0));
    camera.set_param("direction", Vec3::Z);
    camera.set_param("up", Vec3::Y);
    camera.set_param("aspect", image_size.x as f32 / image_size.y as f32);
    camera.commit(&ctx)?;

    let renderer = ctx.new_renderer("raycast");
    renderer.set_param("background", Vec4::new(0.1, 0.1, 0.1, 1.0));
    renderer.commit(&ctx)?;

    let frame = ctx.new_frame();
    frame.set_param("size", image_size);
    frame.set_param("channel.color", "UFIXED8_RGBA_SRGB");
    frame.set_param("world", &world);
    frame.set_param("camera", &camera);
    frame.set_param("renderer", &renderer);
    frame.commit(&ctx)?;
    if !frame.is_valid() {
        bail!("frame #{} failed to commit", frame.id());
    }

    let start = std::time::Instant::now();
    let data = frame.prepare(&ctx).context("preparing frame")?;
    let elapsed = start.elapsed();

    let bounds = world.bounds()?;
    let stats = ctx.stats();
    println!("prepared frame {} in {:.3}ms", data.fb.frame_id, elapsed.as_secs_f64() * 1000.0);
    println!("  size:         {}x{}", data.fb.size[0], data.fb.size[1]);
    println!("  world bounds: {:?} .. {:?}", bounds.min, bounds.max);
    println!("  objects:      {}", ctx.live_objects());
    println!(
        "  device:       {} allocations, {} bytes (peak {}), {} textures, {} accels",
        stats.live_allocations, stats.allocated_bytes, stats.peak_bytes, stats.live_textures, stats.live_accels
    );
    println!(
        "  transfers:    {} uploads ({} bytes), {} downloads",
        stats.uploads, stats.uploaded_bytes, stats.downloads
    );
    Ok(())
}
