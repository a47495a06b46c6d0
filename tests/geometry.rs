//! Integration tests for geometry commits and the build inputs they emit.

use std::sync::Arc;

use gpu_objects::GeometryPayload;
use scene_gpu::accel::{BuildInput, PrimitiveClass, SBT_RECORDS_PER_INPUT};
use scene_gpu::array::Extent;
use scene_gpu::core::{CollectingSink, CommitState, Severity};
use scene_gpu::prelude::*;

fn context() -> (DeviceContext, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::new());
    (DeviceContext::host(Settings::default()).with_sink(sink.clone()), sink)
}

fn grid_vertices(n: usize) -> Vec<[f32; 3]> {
    (0..n).map(|i| [i as f32, (i % 2) as f32, 0.0]).collect()
}

fn quad(ctx: &DeviceContext, num_vertices: usize, index: Option<&[[u32; 4]]>) -> Arc<Geometry> {
    let positions = ctx
        .array_from(DataType::FLOAT32_VEC3, Extent::D1(num_vertices), &grid_vertices(num_vertices))
        .unwrap();
    let g = ctx.new_geometry("quad");
    g.set_param("vertex.position", &positions);
    if let Some(index) = index {
        let index = ctx.array_from(DataType::UINT32_VEC4, Extent::D1(index.len()), index).unwrap();
        g.set_param("primitive.index", &index);
    }
    g.commit(ctx).unwrap();
    g
}

fn derived_triangles(ctx: &DeviceContext, g: &Geometry) -> Vec<[u32; 3]> {
    let data = g.gpu_data().unwrap().as_quad().expect("quad payload");
    let n = g.num_primitives().unwrap() as usize;
    ctx.download_vec::<[u32; 3]>(data.indices, n).unwrap()
}

#[test]
fn test_unindexed_quad_splits_on_fixed_diagonal() {
    let (ctx, _) = context();
    let g = quad(&ctx, 4, None);
    assert!(g.is_valid());
    assert_eq!(derived_triangles(&ctx, &g), vec![[0, 1, 3], [2, 3, 1]]);
}

#[test]
fn test_indexed_quad_splits_on_fixed_diagonal() {
    let (ctx, _) = context();
    let g = quad(&ctx, 6, Some(&[[5, 4, 1, 0], [1, 2, 3, 4]]));
    assert!(g.is_valid());
    assert_eq!(
        derived_triangles(&ctx, &g),
        vec![[5, 4, 0], [1, 0, 4], [1, 2, 4], [3, 4, 2]]
    );

    match g.populate_build_input().unwrap() {
        BuildInput::Triangles(t) => {
            assert_eq!(t.num_vertices, 6);
            assert_eq!(t.num_index_triplets, 4);
            assert_eq!(t.index_stride, 12);
            assert_eq!(t.num_sbt_records, SBT_RECORDS_PER_INPUT);
            assert_ne!(t.index_buffer, 0);
        }
        other => panic!("expected triangles, got {other:?}"),
    }
}

#[test]
fn test_quad_soup_needs_multiple_of_four() {
    let (ctx, sink) = context();
    let bad = quad(&ctx, 6, None);
    assert_eq!(bad.state(), CommitState::Invalid);
    assert!(sink.has(bad.id(), Severity::Error, "multiple of 4"));
    assert!(bad.populate_build_input().is_err());

    let good = quad(&ctx, 8, None);
    assert!(good.is_valid());
    assert_eq!(good.num_primitives().unwrap(), 4);
}

#[test]
fn test_quad_index_out_of_range() {
    let (ctx, sink) = context();
    let g = quad(&ctx, 4, Some(&[[0, 1, 2, 9]]));
    assert!(!g.is_valid());
    assert!(sink.has(g.id(), Severity::Error, "'primitive.index'"));
}

#[test]
fn test_triangle_soup_and_indexed() {
    let (ctx, sink) = context();
    let positions = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(4), &grid_vertices(4)).unwrap();

    let soup = ctx.new_geometry("triangle");
    soup.set_param("vertex.position", &positions);
    soup.commit(&ctx).unwrap();
    assert!(!soup.is_valid());
    assert!(sink.has(soup.id(), Severity::Error, "multiple of 3"));

    let index = ctx.array_from(DataType::UINT32_VEC3, Extent::D1(2), &[[0u32, 1, 2], [2, 1, 3]]).unwrap();
    let indexed = ctx.new_geometry("triangle");
    indexed.set_param("vertex.position", &positions);
    indexed.set_param("primitive.index", &index);
    indexed.commit(&ctx).unwrap();
    assert!(indexed.is_valid());
    assert_eq!(indexed.num_primitives().unwrap(), 2);
    assert_eq!(indexed.primitive_class().unwrap(), PrimitiveClass::Triangles);
}

#[test]
fn test_sphere_bounds_and_custom_input() {
    let (ctx, _) = context();
    let centers = ctx
        .array_from(DataType::FLOAT32_VEC3, Extent::D1(2), &[[0.0f32, 0.0, 0.0], [4.0, 0.0, 0.0]])
        .unwrap();
    let radii = ctx.array_from(DataType::FLOAT32, Extent::D1(2), &[1.0f32, 0.5]).unwrap();
    let g = ctx.new_geometry("sphere");
    g.set_param("vertex.position", &centers);
    g.set_param("vertex.radius", &radii);
    g.commit(&ctx).unwrap();
    assert!(g.is_valid());

    let b = g.bounds().unwrap();
    assert_eq!(b.min, Vec3::new(-1.0, -1.0, -1.0));
    assert_eq!(b.max, Vec3::new(4.5, 1.0, 1.0));
    assert_eq!(g.primitive_class().unwrap(), PrimitiveClass::Custom);
    match g.populate_build_input().unwrap() {
        BuildInput::CustomPrimitives(c) => {
            assert_eq!(c.num_primitives, 2);
            assert_eq!(c.stride, 24);
        }
        other => panic!("expected custom primitives, got {other:?}"),
    }
    assert!(matches!(g.gpu_data().unwrap().payload(), Some(GeometryPayload::Sphere(_))));
}

#[test]
fn test_default_sphere_radius() {
    let (ctx, _) = context();
    let centers = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(1), &[[0.0f32; 3]]).unwrap();
    let g = ctx.new_geometry("sphere");
    g.set_param("vertex.position", &centers);
    g.commit(&ctx).unwrap();
    let b = g.bounds().unwrap();
    assert!((b.max.x - 0.01).abs() < 1e-6);
}

#[test]
fn test_curve_emits_curve_input() {
    let (ctx, _) = context();
    let positions = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(3), &grid_vertices(3)).unwrap();
    let g = ctx.new_geometry("curve");
    g.set_param("vertex.position", &positions);
    g.set_param("radius", 0.25f32);
    g.commit(&ctx).unwrap();
    assert!(g.is_valid());
    assert_eq!(g.primitive_class().unwrap(), PrimitiveClass::Curves);
    assert_eq!(g.num_primitives().unwrap(), 2);
}

#[test]
fn test_cylinder_and_cone_pairs() {
    let (ctx, sink) = context();
    let positions = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(4), &grid_vertices(4)).unwrap();
    let radii = ctx.array_from(DataType::FLOAT32, Extent::D1(4), &[0.1f32, 0.2, 0.1, 0.2]).unwrap();
    for subtype in ["cylinder", "cone"] {
        let g = ctx.new_geometry(subtype);
        g.set_param("vertex.position", &positions);
        g.set_param("vertex.radius", &radii);
        g.commit(&ctx).unwrap();
        assert!(g.is_valid(), "{subtype}: {:?}", sink.for_object(g.id()));
        assert_eq!(g.num_primitives().unwrap(), 2);
        assert_eq!(g.primitive_class().unwrap(), PrimitiveClass::Custom);
    }
}

#[test]
fn test_wrong_index_type_is_error() {
    let (ctx, sink) = context();
    let positions = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(4), &grid_vertices(4)).unwrap();
    let index = ctx.array_from(DataType::UINT32_VEC3, Extent::D1(1), &[[0u32, 1, 2]]).unwrap();
    let g = ctx.new_geometry("quad");
    g.set_param("vertex.position", &positions);
    g.set_param("primitive.index", &index);
    g.commit(&ctx).unwrap();
    assert!(!g.is_valid());
    assert!(sink.has(g.id(), Severity::Error, "'primitive.index' has element type"));
}

#[test]
fn test_quad_channel_index_is_checked_and_split() {
    let (ctx, sink) = context();
    let positions = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(4), &grid_vertices(4)).unwrap();
    let normals = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(4), &[[0.0f32, 0.0, 1.0]; 4]).unwrap();
    let g = ctx.new_geometry("quad");
    g.set_param("vertex.position", &positions);
    g.set_param("vertex.normal", &normals);

    let short = ctx.array_from(DataType::UINT32_VEC4, Extent::D1(2), &[[0u32, 1, 2, 3]; 2]).unwrap();
    g.set_param("vertex.normal.index", &short);
    g.commit(&ctx).unwrap();
    assert!(!g.is_valid());
    assert!(sink.has(g.id(), Severity::Error, "'vertex.normal.index' has 2 elements, expected one per primitive (1)"));

    let outside = ctx.array_from(DataType::UINT32_VEC4, Extent::D1(1), &[[0u32, 1, 2, 9]]).unwrap();
    g.set_param("vertex.normal.index", &outside);
    g.commit(&ctx).unwrap();
    assert!(!g.is_valid());
    assert!(sink.has(g.id(), Severity::Error, "'vertex.normal.index' references element 9 but only 4 exist"));

    let good = ctx.array_from(DataType::UINT32_VEC4, Extent::D1(1), &[[3u32, 2, 1, 0]]).unwrap();
    g.set_param("vertex.normal.index", &good);
    g.commit(&ctx).unwrap();
    assert!(g.is_valid());
    let data = g.gpu_data().unwrap().as_quad().expect("quad payload");
    let split = ctx.download_vec::<[u32; 3]>(data.vertex_normal_indices, 2).unwrap();
    assert_eq!(split, vec![[3, 2, 0], [1, 0, 2]]);
}

#[test]
fn test_triangle_attribute_index_is_checked() {
    let (ctx, sink) = context();
    let positions = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(6), &grid_vertices(6)).unwrap();
    let colors = ctx.array_from(DataType::FLOAT32_VEC4, Extent::D1(2), &[[1.0f32; 4]; 2]).unwrap();
    let g = ctx.new_geometry("triangle");
    g.set_param("vertex.position", &positions);
    g.set_param("vertex.color", &colors);

    let short = ctx.array_from(DataType::UINT32_VEC3, Extent::D1(1), &[[0u32, 1, 0]]).unwrap();
    g.set_param("vertex.color.index", &short);
    g.commit(&ctx).unwrap();
    assert!(!g.is_valid());
    assert!(sink.has(g.id(), Severity::Error, "'vertex.color.index' has 1 elements, expected one per primitive (2)"));

    let outside = ctx.array_from(DataType::UINT32_VEC3, Extent::D1(2), &[[0u32, 1, 0], [1, 2, 1]]).unwrap();
    g.set_param("vertex.color.index", &outside);
    g.commit(&ctx).unwrap();
    assert!(!g.is_valid());
    assert!(sink.has(g.id(), Severity::Error, "'vertex.color.index' references element 2 but only 2 exist"));

    let good = ctx.array_from(DataType::UINT32_VEC3, Extent::D1(2), &[[0u32, 1, 0], [1, 0, 1]]).unwrap();
    g.set_param("vertex.color.index", &good);
    g.commit(&ctx).unwrap();
    assert!(g.is_valid());
    assert_eq!(g.num_primitives().unwrap(), 2);
}
