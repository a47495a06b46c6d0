//! Cylinders between vertex pairs.

use std::sync::Arc;

use gpu_objects::{CylinderGeometryData, GeometryPayload};

use super::{
    check_index_range, check_len, custom_build_input, gather_attributes, positions, segment_boxes, typed_array,
    union_of_boxes, GeometryVariant,
};
use crate::accel::BuildInput;
use crate::array::{Array, HostDeviceBuffer};
use crate::core::CommitScope;
use crate::util::{Box3, DataType, Result};

struct Cylinder {
    data: CylinderGeometryData,
    bounds: Box3,
    /// Generated pairs when no `primitive.index` is set.
    _pairs: Option<HostDeviceBuffer<[u32; 2]>>,
    aabbs: HostDeviceBuffer<[f32; 6]>,
}

impl GeometryVariant for Cylinder {
    fn payload(&self) -> GeometryPayload {
        GeometryPayload::Cylinder(self.data)
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

/// Pairs from `primitive.index`, or consecutive vertex pairs.
///
/// `None` after reporting a validation failure.
pub(super) fn segment_pairs(
    scope: &mut CommitScope<'_>,
    num_vertices: usize,
    inputs: &mut Vec<Arc<Array>>,
) -> Result<Option<(Vec<[u32; 2]>, Option<Arc<Array>>)>> {
    let Some(index) = typed_array(scope, "primitive.index", &[DataType::UINT32_VEC2], inputs) else {
        return Ok(None);
    };
    match index {
        Some(index) => {
            let pairs = index.to_vec::<[u32; 2]>()?;
            if !check_index_range(scope, "primitive.index", pairs.as_flattened(), num_vertices) {
                return Ok(None);
            }
            Ok(Some((pairs, Some(index))))
        }
        None if num_vertices % 2 != 0 => {
            scope.error(format!(
                "'vertex.position' has {num_vertices} vertices, not a multiple of 2, and no 'primitive.index'"
            ));
            Ok(None)
        }
        None => {
            let pairs = (0..(num_vertices / 2) as u32).map(|i| [2 * i, 2 * i + 1]).collect();
            Ok(Some((pairs, None)))
        }
    }
}

/// Caps are on unless `caps` is `"none"`.
pub(super) fn caps_enabled(scope: &CommitScope<'_>) -> bool {
    scope.params().string("caps", "none") != "none"
}

pub(super) fn commit(scope: &mut CommitScope<'_>, inputs: &mut Vec<Arc<Array>>) -> Result<Option<Box<dyn GeometryVariant>>> {
    let Some((vertices, host_vertices)) = positions(scope, inputs)? else {
        return Ok(None);
    };
    let Some((pairs, index)) = segment_pairs(scope, vertices.len(), inputs)? else {
        return Ok(None);
    };

    let Some(radii) = typed_array(scope, "primitive.radius", &[DataType::FLOAT32], inputs) else {
        return Ok(None);
    };
    let radius = scope.params().get_or("radius", 1.0f32);
    let host_radii = match &radii {
        Some(r) if !check_len(scope, "primitive.radius", r, pairs.len(), "cylinder") => return Ok(None),
        Some(r) => Some(r.to_vec::<f32>()?),
        None => None,
    };

    let boxes = segment_boxes(&host_vertices, &pairs, |i, _| host_radii.as_ref().map_or(radius, |r| r[i]));
    let bounds = union_of_boxes(&boxes);
    let aabbs = HostDeviceBuffer::uploaded(boxes, scope.device())?;

    let (indices, generated) = match &index {
        Some(index) => (index.device_ptr()?, None),
        None => {
            let buf = HostDeviceBuffer::uploaded(pairs, scope.device())?;
            (buf.ptr(), Some(buf))
        }
    };

    let data = CylinderGeometryData {
        indices,
        vertices: vertices.device_ptr()?,
        radii: match &radii {
            Some(r) => r.device_ptr()?,
            None => 0,
        },
        vertex_attr: gather_attributes(scope, "vertex", inputs)?,
        radius,
        caps: caps_enabled(scope) as u32,
    };

    Ok(Some(Box::new(Cylinder {
        data,
        bounds,
        _pairs: generated,
        aabbs,
    })))
}

#[cfg(test)]
mod tests {
    use crate::accel::BuildInput;
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
    fn test_consecutive_pairs() {
        let (ctx, _) = context();
        let pos = ctx
            .array_from(
                DataType::FLOAT32_VEC3,
                Extent::D1(4),
                &[[0.0f32, 0.0, 0.0], [0.0, 0.0, 1.0], [5.0, 0.0, 0.0], [5.0, 0.0, 2.0]],
            )
            .unwrap();
        let g = ctx.new_geometry("cylinder");
        g.set_param("vertex.position", &pos);
        g.set_param("radius", 0.5f32);
        g.commit(&ctx).unwrap();
        assert!(g.is_valid());
        assert_eq!(g.num_primitives().unwrap(), 2);

        let b = g.bounds().unwrap();
        assert_eq!(b.min, Vec3::new(-0.5, -0.5, -0.5));
        assert_eq!(b.max, Vec3::new(5.5, 0.5, 2.5));

        let gpu = g.gpu_data().unwrap();
        let Some(gpu_objects::GeometryPayload::Cylinder(cyl)) = gpu.payload() else {
            panic!("expected cylinder payload");
        };
        assert_eq!(ctx.download_vec::<[u32; 2]>(cyl.indices, 2).unwrap(), vec![[0, 1], [2, 3]]);
        assert_eq!(cyl.caps, 0);
        assert_eq!(cyl.radii, 0);

        let BuildInput::CustomPrimitives(c) = g.populate_build_input().unwrap() else {
            panic!("expected custom primitive input");
        };
        assert_eq!(c.num_primitives, 2);
        assert_eq!(c.stride, 24);
    }

    #[test]
    fn test_radius_count_mismatch() {
        let (ctx, sink) = context();
        let pos = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(2), &[[0.0f32; 3], [1.0, 0.0, 0.0]]).unwrap();
        let radii = ctx.array_from(DataType::FLOAT32, Extent::D1(3), &[1.0f32, 2.0, 3.0]).unwrap();
        let g = ctx.new_geometry("cylinder");
        g.set_param("vertex.position", &pos);
        g.set_param("primitive.radius", &radii);
        g.commit(&ctx).unwrap();
        assert!(!g.is_valid());
        assert!(sink.has(g.id(), Severity::Error, "primitive.radius"));
    }
}
