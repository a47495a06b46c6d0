//! Quad meshes, split into triangles on commit.

use std::sync::Arc;

use gpu_objects::{GeometryPayload, QuadGeometryData, NUM_ATTRIBUTES};

use super::{
    bounds_of_points, channel_index, check_index_range, gather_attributes, optional_ptr, positions, typed_array,
    GeometryVariant, ATTRIBUTE_NAMES, VEC3_STRIDE,
};
use crate::accel::{BuildInput, GeometryFlags, TriangleArrayInput, SBT_RECORDS_PER_INPUT};
use crate::array::{Array, HostDeviceBuffer};
use crate::core::CommitScope;
use crate::util::{Box3, DataType, Result};

/// Split quads `(v0, v1, v2, v3)` into `(v0, v1, v3)` and `(v2, v3, v1)`.
///
/// The diagonal is fixed: shading interpolates across `v1-v3` for every quad.
pub fn split_quads(quads: &[[u32; 4]]) -> Vec<[u32; 3]> {
    let mut out = Vec::with_capacity(quads.len() * 2);
    for &[v0, v1, v2, v3] in quads {
        out.push([v0, v1, v3]);
        out.push([v2, v3, v1]);
    }
    out
}

/// Implicit quads of an unindexed soup: every four vertices.
fn soup_quads(num_vertices: usize) -> Vec<[u32; 4]> {
    (0..(num_vertices / 4) as u32)
        .map(|q| {
            let b = 4 * q;
            [b, b + 1, b + 2, b + 3]
        })
        .collect()
}

struct Quad {
    data: QuadGeometryData,
    num_vertices: u32,
    bounds: Box3,
    /// Derived triangle indices, two per quad.
    indices: HostDeviceBuffer<[u32; 3]>,
    /// Split per-channel index buffers (normal, then attribute slots).
    _channel_indices: Vec<HostDeviceBuffer<[u32; 3]>>,
}

impl GeometryVariant for Quad {
    fn payload(&self) -> GeometryPayload {
        GeometryPayload::Quad(self.data)
    }

    fn build_input(&self) -> BuildInput {
        BuildInput::Triangles(TriangleArrayInput {
            vertex_buffer: self.data.vertices,
            vertex_stride: VEC3_STRIDE,
            num_vertices: self.num_vertices,
            index_buffer: self.indices.ptr(),
            index_stride: std::mem::size_of::<[u32; 3]>() as u32,
            num_index_triplets: self.indices.len() as u32,
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

/// Optional `UINT32_VEC4` per-channel index array, split like the quads.
fn split_channel_index(
    scope: &mut CommitScope<'_>,
    name: &str,
    channel: &str,
    num_quads: usize,
    inputs: &mut Vec<Arc<Array>>,
    derived: &mut Vec<HostDeviceBuffer<[u32; 3]>>,
) -> Result<Option<u64>> {
    let Some(array) = channel_index(scope, name, &[DataType::UINT32_VEC4], channel, num_quads, inputs)? else {
        return Ok(None);
    };
    let Some(array) = array else {
        return Ok(Some(0));
    };
    let buf = HostDeviceBuffer::uploaded(split_quads(&array.to_vec::<[u32; 4]>()?), scope.device())?;
    let ptr = buf.ptr();
    derived.push(buf);
    Ok(Some(ptr))
}

pub(super) fn commit(scope: &mut CommitScope<'_>, inputs: &mut Vec<Arc<Array>>) -> Result<Option<Box<dyn GeometryVariant>>> {
    let Some((vertices, host_vertices)) = positions(scope, inputs)? else {
        return Ok(None);
    };
    let num_vertices = vertices.len();

    let Some(index) = typed_array(scope, "primitive.index", &[DataType::UINT32_VEC4], inputs) else {
        return Ok(None);
    };
    let quads = match &index {
        Some(index) => {
            let quads = index.to_vec::<[u32; 4]>()?;
            if !check_index_range(scope, "primitive.index", quads.as_flattened(), num_vertices) {
                return Ok(None);
            }
            quads
        }
        None if num_vertices % 4 != 0 => {
            scope.error(format!(
                "'vertex.position' has {num_vertices} vertices, not a multiple of 4, and no 'primitive.index'"
            ));
            return Ok(None);
        }
        None => soup_quads(num_vertices),
    };
    tracing::debug!(quads = quads.len(), indexed = index.is_some(), "splitting quads");

    let Some(normals) = typed_array(scope, "vertex.normal", &[DataType::FLOAT32_VEC3], inputs) else {
        return Ok(None);
    };

    let mut channel_indices = Vec::new();
    let Some(vertex_normal_indices) =
        split_channel_index(scope, "vertex.normal.index", "vertex.normal", quads.len(), inputs, &mut channel_indices)?
    else {
        return Ok(None);
    };
    let mut vertex_attr_indices = [0; NUM_ATTRIBUTES];
    for (slot, name) in ATTRIBUTE_NAMES.iter().enumerate() {
        let param = format!("vertex.{name}.index");
        let channel = format!("vertex.{name}");
        let Some(ptr) = split_channel_index(scope, &param, &channel, quads.len(), inputs, &mut channel_indices)? else {
            return Ok(None);
        };
        vertex_attr_indices[slot] = ptr;
    }
    let vertex_attr = gather_attributes(scope, "vertex", inputs)?;

    // uploaded before any build input can reference it
    let indices = HostDeviceBuffer::uploaded(split_quads(&quads), scope.device())?;

    let data = QuadGeometryData {
        indices: indices.ptr(),
        vertices: vertices.device_ptr()?,
        vertex_normals: optional_ptr(normals.as_ref())?,
        vertex_normal_indices,
        vertex_attr,
        vertex_attr_indices,
    };

    Ok(Some(Box::new(Quad {
        data,
        num_vertices: num_vertices as u32,
        bounds: bounds_of_points(&host_vertices),
        indices,
        _channel_indices: channel_indices,
    })))
}
