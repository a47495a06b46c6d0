//! Regular grids sampled through a 3D float texture.

use glam::Vec3;
use std::sync::Arc;

use gpu_objects::StructuredRegularData;

use crate::array::Array;
use crate::core::CommitScope;
use crate::device::{DeviceTexture, TextureDesc, TextureFilter, WrapMode};
use crate::util::{Box3, DataType, Result, ScalarType};

/// Element encodings a field accepts.
pub const SUPPORTED_ENCODINGS: [ScalarType; 9] = [
    ScalarType::Uint8,
    ScalarType::Int16,
    ScalarType::Uint16,
    ScalarType::Ufixed8,
    ScalarType::Fixed16,
    ScalarType::Ufixed16,
    ScalarType::Float16,
    ScalarType::Float32,
    ScalarType::Float64,
];

pub fn is_supported_encoding(dt: DataType) -> bool {
    dt.components == 1 && SUPPORTED_ENCODINGS.contains(&dt.scalar)
}

/// Convert raw field data to the float staging buffer.
///
/// `UINT8` and fixed-point storage divide by the type maximum, 16-bit
/// integers convert directly and floats pass through. `None` for an
/// unsupported encoding.
pub fn stage_values(dt: DataType, bytes: &[u8]) -> Option<Vec<f32>> {
    if !is_supported_encoding(dt) {
        return None;
    }
    let scalar = dt.scalar;
    let scale = match scalar {
        ScalarType::Uint8 | ScalarType::Ufixed8 | ScalarType::Fixed16 | ScalarType::Ufixed16 => scalar.max_value()?,
        _ => 1.0,
    };
    bytes
        .chunks_exact(scalar.num_bytes())
        .map(|c| scalar.decode_f32(c).map(|v| v / scale))
        .collect()
}

pub(super) struct StructuredRegular {
    texture: DeviceTexture,
    origin: Vec3,
    spacing: Vec3,
    dims: [usize; 3],
    /// Staged values, kept for grid rebuilds.
    values: Vec<f32>,
    _data: Arc<Array>,
}

impl StructuredRegular {
    pub(super) fn commit(scope: &mut CommitScope<'_>) -> Result<Option<Self>> {
        let Some(data) = scope.require_array("data") else {
            return Ok(None);
        };
        let dt = data.data_type();
        if !is_supported_encoding(dt) {
            scope.error(format!("unsupported field element type {dt}"));
            return Ok(None);
        }
        let dims = data.extent().dims();
        if data.extent().rank() != 3 || dims.contains(&0) {
            scope.error(format!("'data' must be a non-empty 3D array, got extent {}", data.extent()));
            return Ok(None);
        }

        let Some(values) = stage_values(dt, &data.host_bytes()?) else {
            scope.error(format!("unsupported field element type {dt}"));
            return Ok(None);
        };

        let params = scope.params();
        let desc = TextureDesc {
            dims: dims.map(|d| d as u32),
            channels: 1,
            filter: TextureFilter::from_name(&params.string("filter", "linear")),
            wrap: [WrapMode::Clamp; 3],
            normalized_coords: true,
        };
        let origin = params.get_or("origin", Vec3::ZERO);
        let spacing = params.get_or("spacing", Vec3::ONE);
        let texture = DeviceTexture::new(scope.device(), &desc, &values)?;
        tracing::debug!(?dims, %dt, "uploaded field texture");

        Ok(Some(Self {
            texture,
            origin,
            spacing,
            dims,
            values,
            _data: data,
        }))
    }

    /// `origin .. origin + (dims - 1) * spacing`.
    pub(super) fn bounds(&self) -> Box3 {
        let extent = Vec3::new(
            (self.dims[0] - 1) as f32,
            (self.dims[1] - 1) as f32,
            (self.dims[2] - 1) as f32,
        );
        Box3::new(self.origin, self.origin + extent * self.spacing)
    }

    pub(super) fn step_size(&self) -> f32 {
        self.spacing.min_element() / 2.0
    }

    pub(super) fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub(super) fn values(&self) -> &[f32] {
        &self.values
    }

    pub(super) fn data(&self) -> StructuredRegularData {
        let dims = Vec3::new(self.dims[0] as f32, self.dims[1] as f32, self.dims[2] as f32);
        StructuredRegularData {
            tex_obj: self.texture.handle(),
            origin: self.origin.to_array(),
            spacing: self.spacing.to_array(),
            inv_spacing: (Vec3::ONE / (self.spacing * dims)).to_array(),
            _pad: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint8_normalized() {
        let staged = stage_values(DataType::UINT8, &[0, 51, 255]).unwrap();
        assert_eq!(staged, vec![0.0, 0.2, 1.0]);
    }

    #[test]
    fn test_int16_converts_directly() {
        let bytes: Vec<u8> = [-300i16, 7].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(stage_values(DataType::INT16, &bytes).unwrap(), vec![-300.0, 7.0]);
    }

    #[test]
    fn test_fixed16_divides_by_max() {
        let bytes = i16::MAX.to_ne_bytes();
        assert_eq!(stage_values(DataType::FIXED16, &bytes).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_unsupported_encodings() {
        assert!(stage_values(DataType::UINT32, &[0; 4]).is_none());
        assert!(stage_values(DataType::FLOAT32_VEC2, &[0; 8]).is_none());
        assert!(is_supported_encoding(DataType::FLOAT16));
    }
}
