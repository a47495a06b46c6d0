//! End-to-end frame assembly on the host device.

use std::sync::Arc;

use glam::UVec2;
use gpu_objects::{InstanceSurfaceGpuData, FrameGpuData, INVALID_INDEX};
use scene_gpu::array::Extent;
use scene_gpu::core::{CollectingSink, Severity};
use scene_gpu::prelude::*;

struct Scene {
    ctx: DeviceContext,
    sink: Arc<CollectingSink>,
    geometry: Arc<Geometry>,
    material: Arc<Material>,
}

fn scene() -> Scene {
    let sink = Arc::new(CollectingSink::new());
    let settings = Settings {
        transfer_function_samples: 8,
        uniform_grid_dims: [1, 1, 1],
        ..Settings::default()
    };
    let ctx = DeviceContext::host(settings).with_sink(sink.clone());

    let positions = ctx
        .array_from(
            DataType::FLOAT32_VEC3,
            Extent::D1(4),
            &[[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
        )
        .unwrap();
    let geometry = ctx.new_geometry("quad");
    geometry.set_param("vertex.position", &positions);
    geometry.commit(&ctx).unwrap();

    let texels = ctx
        .array_from(DataType::FLOAT32_VEC3, Extent::D1(2), &[[1.0f32, 0.0, 0.0], [0.0, 1.0, 0.0]])
        .unwrap();
    let sampler = ctx.new_sampler("image1D");
    sampler.set_param("image", &texels);
    sampler.commit(&ctx).unwrap();

    let material = ctx.new_material("matte");
    material.set_param("color", &sampler);
    material.commit(&ctx).unwrap();

    Scene {
        ctx,
        sink,
        geometry,
        material,
    }
}

impl Scene {
    fn surface(&self, id: Option<u32>) -> Arc<Surface> {
        let s = self.ctx.new_surface();
        s.set_param("geometry", &self.geometry);
        s.set_param("material", &self.material);
        if let Some(id) = id {
            s.set_param("id", id);
        }
        s.commit(&self.ctx).unwrap();
        s
    }

    fn frame(&self, world: &Arc<World>) -> Arc<Frame> {
        let ctx = &self.ctx;
        let camera = ctx.new_camera("perspective");
        camera.set_param("position", Vec3::new(0.5, 0.5, -2.0));
        camera.set_param("direction", Vec3::Z);
        camera.commit(ctx).unwrap();
        let renderer = ctx.new_renderer("raycast");
        renderer.commit(ctx).unwrap();

        let frame = ctx.new_frame();
        frame.set_param("world", world);
        frame.set_param("camera", &camera);
        frame.set_param("renderer", &renderer);
        frame.set_param("size", UVec2::new(8, 8));
        frame.commit(ctx).unwrap();
        assert!(frame.is_valid(), "{:?}", self.sink.for_object(frame.id()));
        frame
    }
}

#[test]
fn test_invalid_surface_is_omitted() {
    let s = scene();
    let good = s.surface(Some(7));
    let broken = s.ctx.new_surface();
    broken.set_param("geometry", &s.geometry);
    broken.commit(&s.ctx).unwrap();
    assert!(!broken.is_valid());
    assert!(s.sink.has(broken.id(), Severity::Warning, "'material'"));

    let world = s.ctx.new_world();
    world.set_param("surface", vec![broken.clone(), good.clone()]);
    world.commit(&s.ctx).unwrap();
    let frame = s.frame(&world);
    let gpu = frame.prepare(&s.ctx).unwrap();

    frame
        .with_registry(|r| {
            assert_eq!(r.surfaces().len(), 1);
            assert_eq!(r.surfaces()[0].id, 7);
            assert_eq!(r.index_of(good.id()), Some(0));
            assert_eq!(r.index_of(broken.id()), None);
            assert_eq!(r.geometries().len(), 1);
            assert_eq!(r.materials().len(), 1);
            assert_eq!(r.samplers().len(), 1);
        })
        .unwrap();

    assert_eq!(gpu.world.num_surface_instances, 1);
    let instances: Vec<InstanceSurfaceGpuData> = s.ctx.download_vec(gpu.world.surface_instances, 1).unwrap();
    assert_eq!(instances[0].num_surfaces, 1);
    let indices: Vec<i32> = s.ctx.download_vec(instances[0].surfaces, 1).unwrap();
    assert_eq!(indices, vec![0]);
    assert_ne!(gpu.world.surfaces_traversable, 0);
}

#[test]
fn test_registry_is_dense_and_deterministic() {
    let s = scene();
    let a = s.surface(Some(1));
    let b = s.surface(Some(2));

    let group = s.ctx.new_group();
    group.set_param("surface", vec![a.clone(), b.clone()]);
    group.commit(&s.ctx).unwrap();
    let instance = s.ctx.new_instance();
    instance.set_param("group", &group);
    instance.set_param("id", 42u32);
    instance.commit(&s.ctx).unwrap();

    let world = s.ctx.new_world();
    world.set_param("instance", vec![instance]);
    // the same surface again through the zero instance
    world.set_param("surface", vec![b.clone()]);
    world.commit(&s.ctx).unwrap();
    let frame = s.frame(&world);

    let first = frame.prepare(&s.ctx).unwrap();
    let snapshot = |f: &Frame| {
        f.with_registry(|r| {
            (
                r.surfaces().to_vec(),
                r.geometries().to_vec(),
                r.materials().to_vec(),
                r.index_of(a.id()),
                r.index_of(b.id()),
            )
        })
        .unwrap()
    };
    let before = snapshot(&frame);
    assert_eq!(before.0.len(), 2);
    assert_eq!(before.1.len(), 1);
    assert_eq!(before.3, Some(0));
    assert_eq!(before.4, Some(1));
    for surface in &before.0 {
        assert_eq!(surface.geometry, 0);
        assert_eq!(surface.material, 0);
        assert_ne!(surface.geometry, INVALID_INDEX);
    }

    let second = frame.prepare(&s.ctx).unwrap();
    assert_eq!(snapshot(&frame), before);
    assert_eq!(second.fb.frame_id, first.fb.frame_id + 1);

    let instances: Vec<InstanceSurfaceGpuData> = s.ctx.download_vec(second.world.surface_instances, 2).unwrap();
    assert_eq!(instances[0].id, 42);
    assert_eq!(instances[0].num_surfaces, 2);
    assert_eq!(instances[1].id, u32::MAX);
    let zero: Vec<i32> = s.ctx.download_vec(instances[1].surfaces, 1).unwrap();
    assert_eq!(zero, vec![1]);
}

#[test]
fn test_volume_and_light_reach_the_registry() {
    let s = scene();
    let ctx = &s.ctx;
    let data = ctx.array_from(DataType::FLOAT32, Extent::D3(2, 2, 2), &[0.5f32; 8]).unwrap();
    let field = ctx.new_spatial_field("structuredRegular");
    field.set_param("data", &data);
    field.commit(ctx).unwrap();

    let color = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(2), &[[0.0f32; 3], [1.0; 3]]).unwrap();
    let opacity = ctx.array_from(DataType::FLOAT32, Extent::D1(2), &[0.0f32, 1.0]).unwrap();
    let volume = ctx.new_volume("transferFunction1D");
    volume.set_param("field", &field);
    volume.set_param("color", &color);
    volume.set_param("opacity", &opacity);
    volume.commit(ctx).unwrap();

    let light = ctx.new_light("directional");
    light.commit(ctx).unwrap();

    let world = ctx.new_world();
    world.set_param("volume", vec![volume.clone()]);
    world.set_param("light", vec![light]);
    world.commit(ctx).unwrap();
    let frame = s.frame(&world);
    let gpu = frame.prepare(ctx).unwrap();

    assert_eq!(gpu.world.num_surface_instances, 0);
    assert_eq!(gpu.world.num_volume_instances, 1);
    assert_eq!(gpu.world.num_light_instances, 1);
    assert_eq!(gpu.world.surfaces_traversable, 0);
    assert_ne!(gpu.world.volumes_traversable, 0);
    frame
        .with_registry(|r| {
            assert_eq!(r.volumes().len(), 1);
            assert_eq!(r.fields().len(), 1);
            assert_eq!(r.lights().len(), 1);
            let tf = r.volumes()[0].as_scivis().expect("transfer function payload");
            assert_eq!(tf.field, 0);
        })
        .unwrap();
}

#[test]
fn test_prepare_picks_up_pending_recommits() {
    let s = scene();
    let surface = s.surface(None);
    let world = s.ctx.new_world();
    world.set_param("surface", vec![surface.clone()]);
    world.commit(&s.ctx).unwrap();
    let frame = s.frame(&world);
    frame.prepare(&s.ctx).unwrap();

    // material change ripples up through surface and world to the frame
    s.material.set_param("opacity", 0.5f32);
    s.material.commit(&s.ctx).unwrap();
    assert!(!s.ctx.commit_buffer().is_empty());

    let gpu = frame.prepare(&s.ctx).unwrap();
    assert!(s.ctx.commit_buffer().is_empty());
    assert!(surface.is_valid() && world.is_valid() && frame.is_valid());
    // the frame recommitted, so numbering restarts
    assert_eq!(gpu.fb.frame_id, 0);
    assert_eq!(s.ctx.stats().pending_ops(), 0);

    let uploaded: Vec<FrameGpuData> = s.ctx.download_vec(frame.gpu_data_ptr().unwrap(), 1).unwrap();
    assert_eq!(uploaded[0], gpu);
}
