//! Round linear curves: one segment per start index, ending at `start + 1`.

use std::sync::Arc;

use gpu_objects::{CurveGeometryData, GeometryPayload};

use super::{check_len, gather_attributes, positions, segment_boxes, typed_array, union_of_boxes, GeometryVariant, VEC3_STRIDE};
use crate::accel::{BuildInput, CurveArrayInput, CurveType, GeometryFlags, SBT_RECORDS_PER_INPUT};
use crate::array::{Array, HostDeviceBuffer};
use crate::core::CommitScope;
use crate::util::{Box3, DataType, Result};

const WIDTH_STRIDE: u32 = 4;
const INDEX_STRIDE: u32 = 4;

struct Curve {
    data: CurveGeometryData,
    num_vertices: u32,
    bounds: Box3,
    indices: HostDeviceBuffer<u32>,
    /// Expanded global radius when no `vertex.radius` is set.
    _widths: Option<HostDeviceBuffer<f32>>,
}

impl GeometryVariant for Curve {
    fn payload(&self) -> GeometryPayload {
        GeometryPayload::Curve(self.data)
    }

    fn build_input(&self) -> BuildInput {
        BuildInput::Curves(CurveArrayInput {
            curve_type: CurveType::RoundLinear,
            num_primitives: self.indices.len() as u32,
            vertex_buffer: self.data.vertices,
            vertex_stride: VEC3_STRIDE,
            num_vertices: self.num_vertices,
            width_buffer: self.data.radii,
            width_stride: WIDTH_STRIDE,
            index_buffer: self.indices.ptr(),
            index_stride: INDEX_STRIDE,
            flags: GeometryFlags::NONE,
            num_sbt_records: SBT_RECORDS_PER_INPUT,
        })
    }

    fn num_primitives(&self) -> u32 {
        self.indices.len() as u32
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
    let starts: Vec<u32> = match &index {
        Some(index) => {
            let starts = index.to_vec::<u32>()?;
            if let Some(&bad) = starts.iter().find(|&&s| s as usize + 1 >= num_vertices) {
                scope.error(format!(
                    "'primitive.index' starts a segment at {bad} but only {num_vertices} vertices exist"
                ));
                return Ok(None);
            }
            starts
        }
        None => (0..num_vertices.saturating_sub(1) as u32).collect(),
    };

    let Some(radii) = typed_array(scope, "vertex.radius", &[DataType::FLOAT32], inputs) else {
        return Ok(None);
    };
    let radius = scope.params().get_or("radius", 1.0f32);
    let (host_radii, widths) = match &radii {
        Some(r) if !check_len(scope, "vertex.radius", r, num_vertices, "vertex") => return Ok(None),
        Some(r) => (r.to_vec::<f32>()?, None),
        None => {
            let host = vec![radius; num_vertices];
            let buf = HostDeviceBuffer::uploaded(host.clone(), scope.device())?;
            (host, Some(buf))
        }
    };
    let radii_ptr = match (&radii, &widths) {
        (Some(r), _) => r.device_ptr()?,
        (None, Some(w)) => w.ptr(),
        (None, None) => 0,
    };

    let segments: Vec<[u32; 2]> = starts.iter().map(|&s| [s, s + 1]).collect();
    let bounds = union_of_boxes(&segment_boxes(&host_vertices, &segments, |_, [a, b]| {
        host_radii[a as usize].max(host_radii[b as usize])
    }));

    let indices = HostDeviceBuffer::uploaded(starts, scope.device())?;

    let data = CurveGeometryData {
        indices: indices.ptr(),
        vertices: vertices.device_ptr()?,
        radii: radii_ptr,
        vertex_attr: gather_attributes(scope, "vertex", inputs)?,
        radius,
        _pad: 0,
    };

    Ok(Some(Box::new(Curve {
        data,
        num_vertices: num_vertices as u32,
        bounds,
        indices,
        _widths: widths,
    })))
}

#[cfg(test)]
mod tests {
    use crate::accel::BuildInput;
    use crate::array::Extent;
    use crate::config::Settings;
    use crate::core::{CollectingSink, DeviceContext, SceneObject, Severity};
    use crate::util::DataType;
    use std::sync::Arc;

    fn context() -> (DeviceContext, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        (DeviceContext::host(Settings::default()).with_sink(sink.clone()), sink)
    }

    const STRAND: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 2.0, 0.0]];

    #[test]
    fn test_consecutive_segments_with_global_radius() {
        let (ctx, _) = context();
        let pos = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(3), &STRAND).unwrap();
        let g = ctx.new_geometry("curve");
        g.set_param("vertex.position", &pos);
        g.set_param("radius", 0.1f32);
        g.commit(&ctx).unwrap();
        assert!(g.is_valid());
        assert_eq!(g.num_primitives().unwrap(), 2);

        let BuildInput::Curves(c) = g.populate_build_input().unwrap() else {
            panic!("expected curve input");
        };
        assert_eq!(c.num_primitives, 2);
        assert_eq!((c.vertex_stride, c.width_stride, c.index_stride), (12, 4, 4));
        assert_eq!(ctx.download_vec::<u32>(c.index_buffer, 2).unwrap(), vec![0, 1]);
        assert_eq!(ctx.download_vec::<f32>(c.width_buffer, 3).unwrap(), vec![0.1; 3]);
    }

    #[test]
    fn test_segment_start_out_of_range() {
        let (ctx, sink) = context();
        let pos = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(3), &STRAND).unwrap();
        let idx = ctx.array_from(DataType::UINT32, Extent::D1(1), &[2u32]).unwrap();
        let g = ctx.new_geometry("curve");
        g.set_param("vertex.position", &pos);
        g.set_param("primitive.index", &idx);
        g.commit(&ctx).unwrap();
        assert!(!g.is_valid());
        assert!(sink.has(g.id(), Severity::Error, "starts a segment at 2"));
    }
}
