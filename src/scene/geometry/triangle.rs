//! Triangle meshes.

use std::sync::Arc;

use gpu_objects::{GeometryPayload, TriangleGeometryData, NUM_ATTRIBUTES};

use super::{
    bounds_of_points, channel_index, check_index_range, gather_attributes, optional_ptr, positions, typed_array,
    GeometryVariant, ATTRIBUTE_NAMES, VEC3_STRIDE,
};
use crate::accel::{BuildInput, GeometryFlags, TriangleArrayInput, SBT_RECORDS_PER_INPUT};
use crate::array::Array;
use crate::core::CommitScope;
use crate::util::{Box3, DataType, Result};

const UVEC3_STRIDE: u32 = 12;

struct Triangle {
    data: TriangleGeometryData,
    num_vertices: u32,
    num_triangles: u32,
    bounds: Box3,
}

impl GeometryVariant for Triangle {
    fn payload(&self) -> GeometryPayload {
        GeometryPayload::Triangle(self.data)
    }

    fn build_input(&self) -> BuildInput {
        let indexed = self.data.indices != 0;
        BuildInput::Triangles(TriangleArrayInput {
            vertex_buffer: self.data.vertices,
            vertex_stride: VEC3_STRIDE,
            num_vertices: self.num_vertices,
            index_buffer: self.data.indices,
            index_stride: if indexed { UVEC3_STRIDE } else { 0 },
            num_index_triplets: if indexed { self.num_triangles } else { 0 },
            flags: GeometryFlags::NONE,
            num_sbt_records: SBT_RECORDS_PER_INPUT,
        })
    }

    fn num_primitives(&self) -> u32 {
        self.num_triangles
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

    let Some(index) = typed_array(scope, "primitive.index", &[DataType::UINT32_VEC3], inputs) else {
        return Ok(None);
    };
    let num_triangles = match &index {
        Some(index) => {
            let flat = index.to_vec::<u32>()?;
            if !check_index_range(scope, "primitive.index", &flat, num_vertices) {
                return Ok(None);
            }
            index.len()
        }
        None if num_vertices % 3 != 0 => {
            scope.error(format!(
                "'vertex.position' has {num_vertices} vertices, not a multiple of 3, and no 'primitive.index'"
            ));
            return Ok(None);
        }
        None => num_vertices / 3,
    };

    let Some(normals) = typed_array(scope, "vertex.normal", &[DataType::FLOAT32_VEC3], inputs) else {
        return Ok(None);
    };
    let Some(normal_index) = channel_index(
        scope,
        "vertex.normal.index",
        &[DataType::UINT32_VEC3],
        "vertex.normal",
        num_triangles,
        inputs,
    )?
    else {
        return Ok(None);
    };

    let mut vertex_attr_indices = [0; NUM_ATTRIBUTES];
    for (slot, name) in ATTRIBUTE_NAMES.iter().enumerate() {
        let param = format!("vertex.{name}.index");
        let channel = format!("vertex.{name}");
        let Some(attr_index) = channel_index(scope, &param, &[DataType::UINT32_VEC3], &channel, num_triangles, inputs)?
        else {
            return Ok(None);
        };
        vertex_attr_indices[slot] = optional_ptr(attr_index.as_ref())?;
    }
    let vertex_attr = gather_attributes(scope, "vertex", inputs)?;

    let data = TriangleGeometryData {
        indices: optional_ptr(index.as_ref())?,
        vertices: vertices.device_ptr()?,
        vertex_normals: optional_ptr(normals.as_ref())?,
        vertex_normal_indices: optional_ptr(normal_index.as_ref())?,
        vertex_attr,
        vertex_attr_indices,
    };

    Ok(Some(Box::new(Triangle {
        data,
        num_vertices: num_vertices as u32,
        num_triangles: num_triangles as u32,
        bounds: bounds_of_points(&host_vertices),
    })))
}
