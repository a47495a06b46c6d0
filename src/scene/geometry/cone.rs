//! Cones between vertex pairs, with per-vertex radii.

use std::sync::Arc;

use gpu_objects::{ConeGeometryData, GeometryPayload};

use super::cylinder::{caps_enabled, segment_pairs};
use super::{
    check_len, custom_build_input, gather_attributes, positions, segment_boxes, union_of_boxes, GeometryVariant,
};
use crate::accel::BuildInput;
use crate::array::{Array, HostDeviceBuffer};
use crate::core::CommitScope;
use crate::util::{Box3, DataType, Result};

struct Cone {
    data: ConeGeometryData,
    bounds: Box3,
    _pairs: Option<HostDeviceBuffer<[u32; 2]>>,
    aabbs: HostDeviceBuffer<[f32; 6]>,
}

impl GeometryVariant for Cone {
    fn payload(&self) -> GeometryPayload {
        GeometryPayload::Cone(self.data)
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
    let Some((pairs, index)) = segment_pairs(scope, vertices.len(), inputs)? else {
        return Ok(None);
    };

    let Some(radii) = scope.require_array("vertex.radius") else {
        return Ok(None);
    };
    if !scope.check_type(&radii, "vertex.radius", &[DataType::FLOAT32])
        || !check_len(scope, "vertex.radius", &radii, vertices.len(), "vertex")
    {
        return Ok(None);
    }
    inputs.push(radii.clone());
    let host_radii = radii.to_vec::<f32>()?;

    // a cone never extends past its larger end cap
    let boxes = segment_boxes(&host_vertices, &pairs, |_, [a, b]| {
        host_radii[a as usize].max(host_radii[b as usize])
    });
    let bounds = union_of_boxes(&boxes);
    let aabbs = HostDeviceBuffer::uploaded(boxes, scope.device())?;

    let (indices, generated) = match &index {
        Some(index) => (index.device_ptr()?, None),
        None => {
            let buf = HostDeviceBuffer::uploaded(pairs, scope.device())?;
            (buf.ptr(), Some(buf))
        }
    };

    let data = ConeGeometryData {
        indices,
        vertices: vertices.device_ptr()?,
        radii: radii.device_ptr()?,
        vertex_attr: gather_attributes(scope, "vertex", inputs)?,
        caps: caps_enabled(scope) as u32,
        _pad: 0,
    };

    Ok(Some(Box::new(Cone {
        data,
        bounds,
        _pairs: generated,
        aabbs,
    })))
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
    fn test_box_uses_larger_radius() {
        let (ctx, _) = context();
        let pos = ctx
            .array_from(DataType::FLOAT32_VEC3, Extent::D1(2), &[[0.0f32, 0.0, 0.0], [0.0, 0.0, 4.0]])
            .unwrap();
        let radius = ctx.array_from(DataType::FLOAT32, Extent::D1(2), &[0.25f32, 1.0]).unwrap();
        let g = ctx.new_geometry("cone");
        g.set_param("vertex.position", &pos);
        g.set_param("vertex.radius", &radius);
        g.set_param("caps", "both");
        g.commit(&ctx).unwrap();
        assert!(g.is_valid());

        let b = g.bounds().unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(b.max, Vec3::new(1.0, 1.0, 5.0));

        let Some(gpu_objects::GeometryPayload::Cone(cone)) = g.gpu_data().unwrap().payload() else {
            panic!("expected cone payload");
        };
        assert_eq!(cone.caps, 1);
        assert_eq!(cone.radii, radius.device_ptr().unwrap());
    }

    #[test]
    fn test_radius_required() {
        let (ctx, sink) = context();
        let pos = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(2), &[[0.0f32; 3], [1.0, 0.0, 0.0]]).unwrap();
        let g = ctx.new_geometry("cone");
        g.set_param("vertex.position", &pos);
        g.commit(&ctx).unwrap();
        assert!(!g.is_valid());
        assert!(sink.has(g.id(), Severity::Warning, "vertex.radius"));
    }
}
