//! Integration tests for commit propagation across the object graph.

use std::sync::Arc;

use scene_gpu::array::{Array, Extent};
use scene_gpu::core::{CollectingSink, CommitState, Severity};
use scene_gpu::prelude::*;
use scene_gpu::Error;

fn quad_positions(ctx: &DeviceContext) -> Arc<Array> {
    ctx.array_from(
        DataType::FLOAT32_VEC3,
        Extent::D1(4),
        &[[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
    )
    .expect("positions")
}

fn geometry_on(ctx: &DeviceContext, subtype: &str, positions: &Arc<Array>) -> Arc<Geometry> {
    let g = ctx.new_geometry(subtype);
    g.set_param("vertex.position", positions);
    g.commit(ctx).expect("commit geometry");
    g
}

#[test]
fn test_array_commit_notifies_each_reader_once() {
    let ctx = DeviceContext::host(Settings::default());
    let shared = quad_positions(&ctx);
    let other = quad_positions(&ctx);

    let a = geometry_on(&ctx, "quad", &shared);
    let b = geometry_on(&ctx, "quad", &shared);
    // reads `shared` through two parameters, still one notification
    b.set_param("vertex.normal", &shared);
    b.commit(&ctx).unwrap();
    let bystander = geometry_on(&ctx, "quad", &other);
    assert!(a.is_valid() && b.is_valid() && bystander.is_valid());

    shared.write(&[[0.0f32, 0.0, 1.0]; 4]).unwrap();
    shared.commit(&ctx).unwrap();

    assert_eq!(a.header().notification_count(), 1);
    assert_eq!(b.header().notification_count(), 1);
    assert_eq!(bystander.header().notification_count(), 0);
    assert_eq!(a.state(), CommitState::Uncommitted);
    assert_eq!(b.state(), CommitState::Uncommitted);
    assert_eq!(bystander.state(), CommitState::Committed);
    assert_eq!(ctx.commit_buffer().len(), 2);

    assert_eq!(ctx.flush_commits().unwrap(), 2);
    assert!(a.is_valid() && b.is_valid());
    assert_eq!(a.bounds().unwrap().min.z, 1.0);
    assert!(ctx.commit_buffer().is_empty());
}

#[test]
fn test_recommit_is_idempotent() {
    let ctx = DeviceContext::host(Settings::default());
    let positions = quad_positions(&ctx);
    let index = ctx.array_from(DataType::UINT32_VEC4, Extent::D1(1), &[[0u32, 1, 2, 3]]).unwrap();
    let geometry = ctx.new_geometry("quad");
    geometry.set_param("vertex.position", &positions);
    geometry.set_param("primitive.index", &index);
    geometry.commit(&ctx).unwrap();

    let before = geometry.gpu_data().unwrap();
    let stats = ctx.stats();
    for _ in 0..3 {
        geometry.commit(&ctx).unwrap();
    }
    let after = geometry.gpu_data().unwrap();
    let stats_after = ctx.stats();

    assert_eq!(bytemuck::bytes_of(&before), bytemuck::bytes_of(&after));
    assert_eq!(stats.live_allocations, stats_after.live_allocations);
    assert_eq!(stats.allocated_bytes, stats_after.allocated_bytes);
    assert_eq!(geometry.header().commit_count(), 4);
}

#[test]
fn test_resized_dependency_requires_recommit() {
    let ctx = DeviceContext::host(Settings::default());
    let positions = quad_positions(&ctx);
    let geometry = geometry_on(&ctx, "quad", &positions);
    assert_eq!(geometry.num_primitives().unwrap(), 2);

    positions.resize(&ctx, Extent::D1(8));
    assert_eq!(geometry.state(), CommitState::Uncommitted);
    assert!(matches!(geometry.gpu_data(), Err(Error::ObjectNotCommitted { .. })));
    assert!(matches!(geometry.populate_build_input(), Err(Error::ObjectNotCommitted { .. })));

    let mut ring = Vec::new();
    for z in [0.0f32, 1.0] {
        ring.extend([[0.0f32, 0.0, z], [1.0, 0.0, z], [1.0, 1.0, z], [0.0, 1.0, z]]);
    }
    positions.write(&ring).unwrap();
    ctx.flush_commits().unwrap();
    assert!(geometry.is_valid());
    assert_eq!(geometry.num_primitives().unwrap(), 4);
}

#[test]
fn test_invalid_commit_releases_previous_resources() {
    let sink = Arc::new(CollectingSink::new());
    let ctx = DeviceContext::host(Settings::default()).with_sink(sink.clone());
    let positions = quad_positions(&ctx);
    positions.commit(&ctx).unwrap();
    let baseline = ctx.stats().live_allocations;

    let geometry = geometry_on(&ctx, "quad", &positions);
    assert!(ctx.stats().live_allocations > baseline);

    geometry.unset_param("vertex.position");
    geometry.commit(&ctx).unwrap();
    assert_eq!(geometry.state(), CommitState::Invalid);
    assert!(sink.has(geometry.id(), Severity::Warning, "'vertex.position'"));
    assert_eq!(ctx.stats().live_allocations, baseline);

    // new parameters bring it back
    geometry.set_param("vertex.position", &positions);
    geometry.commit(&ctx).unwrap();
    assert!(geometry.is_valid());
}

#[test]
fn test_allocation_failure_is_fatal_and_clean() {
    let sink = Arc::new(CollectingSink::new());
    let settings = Settings {
        device_memory_budget: Some(96),
        ..Settings::default()
    };
    let ctx = DeviceContext::host(settings).with_sink(sink.clone());
    // 48 bytes of positions fit, the split index buffer pushes past the budget
    let positions = ctx
        .array_from(DataType::FLOAT32_VEC3, Extent::D1(4), &[[0.0f32; 3]; 4])
        .unwrap();
    positions.commit(&ctx).unwrap();
    let index = ctx
        .array_from(DataType::UINT32_VEC4, Extent::D1(4), &[[0u32, 1, 2, 3]; 4])
        .unwrap();
    let baseline = ctx.stats();

    let geometry = ctx.new_geometry("quad");
    geometry.set_param("vertex.position", &positions);
    geometry.set_param("primitive.index", &index);
    let err = geometry.commit(&ctx).unwrap_err();
    assert!(err.is_device_failure(), "unexpected error: {err}");
    assert_eq!(geometry.state(), CommitState::Invalid);
    assert_eq!(sink.count(Severity::FatalError), 1);

    let after = ctx.stats();
    assert_eq!(after.live_allocations, baseline.live_allocations);
    assert_eq!(after.allocated_bytes, baseline.allocated_bytes);
}

#[test]
fn test_dropped_observer_is_forgotten() {
    let ctx = DeviceContext::host(Settings::default());
    let positions = quad_positions(&ctx);
    let geometry = geometry_on(&ctx, "quad", &positions);
    let id = geometry.id();
    assert!(ctx.object(id).is_some());
    drop(geometry);

    positions.commit(&ctx).unwrap();
    assert!(ctx.object(id).is_none());
    assert!(ctx.commit_buffer().is_empty());
}
