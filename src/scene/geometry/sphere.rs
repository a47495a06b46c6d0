//! Spheres centered on vertices.

use rayon::prelude::*;
use std::sync::Arc;

use gpu_objects::{GeometryPayload, SphereGeometryData};

use super::{
    check_index_range, check_len, custom_build_input, gather_attributes, optional_ptr, positions, typed_array,
    union_of_boxes, GeometryVariant,
};
use crate::accel::BuildInput;
use crate::array::{Array, HostDeviceBuffer};
use crate::core::CommitScope;
use crate::util::{Box3, DataType, Result, Vec3};

pub const DEFAULT_SPHERE_RADIUS: f32 = 0.01;

struct Sphere {
    data: SphereGeometryData,
    bounds: Box3,
    aabbs: HostDeviceBuffer<[f32; 6]>,
}

impl GeometryVariant for Sphere {
    fn payload(&self) -> GeometryPayload {
        GeometryPayload::Sphere(self.data)
    }

    fn build_input(&self) -> BuildInput {
        custom_build_input(&self.aabbs)
    }

    fn num_primitives(&self) -> u32 {
        self.aabbs.len() as u32
    }

    fn bounds(&self) -> Box3 {
        self.bounds
    }
}

pub(super) fn commit(scope: &mut CommitScope<'_>, inputs: &mut Vec<Arc<Array>>) -> Result<Option<Box<dyn GeometryVariant>>> {
    let Some((vertices, host_vertices)) = positions(scope, inputs)? else {
        return Ok(None);
    };
    let num_vertices = vertices.len();

    let Some(index) = typed_array(scope, "primitive.index", &[DataType::UINT32], inputs) else {
        return Ok(None);
    };
    let centers: Vec<u32> = match &index {
        Some(index) => {
            let centers = index.to_vec::<u32>()?;
            if !check_index_range(scope, "primitive.index", &centers, num_vertices) {
                return Ok(None);
            }
            centers
        }
        None => (0..num_vertices as u32).collect(),
    };

    let Some(radii) = typed_array(scope, "vertex.radius", &[DataType::FLOAT32], inputs) else {
        return Ok(None);
    };
    let radius = scope.params().get_or("radius", DEFAULT_SPHERE_RADIUS);
    let host_radii = match &radii {
        Some(r) if !check_len(scope, "vertex.radius", r, num_vertices, "vertex") => return Ok(None),
        Some(r) => Some(r.to_vec::<f32>()?),
        None => None,
    };

    let boxes: Vec<[f32; 6]> = centers
        .par_iter()
        .map(|&c| {
            let r = host_radii.as_ref().map_or(radius, |r| r[c as usize]);
            Box3::from_sphere(Vec3::from_array(host_vertices[c as usize]), r).to_array6()
        })
        .collect();
    let bounds = union_of_boxes(&boxes);
    let aabbs = HostDeviceBuffer::uploaded(boxes, scope.device())?;

    let data = SphereGeometryData {
        indices: optional_ptr(index.as_ref())?,
        centers: vertices.device_ptr()?,
        radii: optional_ptr(radii.as_ref())?,
        vertex_attr: gather_attributes(scope, "vertex", inputs)?,
        radius,
        _pad: 0,
    };

    Ok(Some(Box::new(Sphere { data, bounds, aabbs })))
}

#[cfg(test)]
mod tests {
    use crate::array::Extent;
    use crate::config::Settings;
    use crate::core::{CollectingSink, DeviceContext, SceneObject, Severity};
    use crate::util::{DataType, Vec3};
    use std::sync::Arc;

    fn context() -> (DeviceContext, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        (DeviceContext::host(Settings::default()).with_sink(sink.clone()), sink)
    }

    #[test]
    fn test_default_radius() {
        let (ctx, _) = context();
        let pos = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(1), &[[1.0f32, 2.0, 3.0]]).unwrap();
        let g = ctx.new_geometry("sphere");
        g.set_param("vertex.position", &pos);
        g.commit(&ctx).unwrap();
        assert!(g.is_valid());
        let b = g.bounds().unwrap();
        assert!((b.max - Vec3::new(1.01, 2.01, 3.01)).abs().max_element() < 1e-6);
    }

    #[test]
    fn test_indexed_subset() {
        let (ctx, _) = context();
        let pos = ctx
            .array_from(DataType::FLOAT32_VEC3, Extent::D1(3), &[[0.0f32; 3], [10.0, 0.0, 0.0], [20.0, 0.0, 0.0]])
            .unwrap();
        let radii = ctx.array_from(DataType::FLOAT32, Extent::D1(3), &[1.0f32, 2.0, 3.0]).unwrap();
        let idx = ctx.array_from(DataType::UINT32, Extent::D1(1), &[1u32]).unwrap();
        let g = ctx.new_geometry("sphere");
        g.set_param("vertex.position", &pos);
        g.set_param("vertex.radius", &radii);
        g.set_param("primitive.index", &idx);
        g.commit(&ctx).unwrap();
        assert_eq!(g.num_primitives().unwrap(), 1);
        let b = g.bounds().unwrap();
        assert_eq!(b.min, Vec3::new(8.0, -2.0, -2.0));
        assert_eq!(b.max, Vec3::new(12.0, 2.0, 2.0));
    }

    #[test]
    fn test_radius_per_vertex_count() {
        let (ctx, sink) = context();
        let pos = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(2), &[[0.0f32; 3], [1.0, 0.0, 0.0]]).unwrap();
        let radii = ctx.array_from(DataType::FLOAT32, Extent::D1(1), &[1.0f32]).unwrap();
        let g = ctx.new_geometry("sphere");
        g.set_param("vertex.position", &pos);
        g.set_param("vertex.radius", &radii);
        g.commit(&ctx).unwrap();
        assert!(!g.is_valid());
        assert!(sink.has(g.id(), Severity::Error, "vertex.radius"));
    }
}
