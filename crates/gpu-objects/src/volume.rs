//! Spatial field and volume snapshots.

use bytemuck::{Pod, Zeroable};

use crate::payload::tagged_payload;
use crate::{DeviceObjectIndex, DevicePtr, GpuBox3, TextureHandle};

/// Regular grid sampled through a 3D float texture.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct StructuredRegularData {
    pub tex_obj: TextureHandle,
    pub origin: [f32; 3],
    pub spacing: [f32; 3],
    /// `1 / (spacing * dims)`, maps object space to normalized texture coords.
    pub inv_spacing: [f32; 3],
    pub _pad: u32,
}

tagged_payload! {
    SpatialFieldPayload, SpatialFieldType, words = 6 {
        StructuredRegular(StructuredRegularData) = 1,
    }
}

/// Coarse empty-space skipping grid.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UniformGridData {
    pub dims: [i32; 3],
    pub world_bounds: GpuBox3,
    pub _pad: u32,
    /// `[min, max]` per cell.
    pub value_ranges: DevicePtr,
    /// One `f32` per cell.
    pub max_opacities: DevicePtr,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SpatialFieldGpuData {
    tag: u32,
    _pad: u32,
    payload: [u64; 6],
    pub grid: UniformGridData,
}

impl SpatialFieldGpuData {
    pub fn new(payload: SpatialFieldPayload, grid: UniformGridData) -> Self {
        Self {
            tag: payload.tag() as u32,
            _pad: 0,
            payload: payload.encode(),
            grid,
        }
    }

    pub fn field_type(&self) -> SpatialFieldType {
        SpatialFieldType::from_u32(self.tag)
    }

    pub fn payload(&self) -> Option<SpatialFieldPayload> {
        SpatialFieldPayload::decode(self.tag, &self.payload)
    }
}

/// Transfer-function volume.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ScivisVolumeGpuData {
    pub field: DeviceObjectIndex,
    pub _pad: u32,
    /// 1D RGBA lookup texture.
    pub tf_tex: TextureHandle,
    pub value_range: [f32; 2],
    pub density_scale: f32,
    pub _pad1: u32,
}

tagged_payload! {
    VolumePayload, VolumeType, words = 4 {
        TransferFunction1D(ScivisVolumeGpuData) = 1,
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct VolumeGpuData {
    tag: u32,
    /// User id, `u32::MAX` when unset.
    pub id: u32,
    payload: [u64; 4],
    pub bounds: GpuBox3,
    pub step_size: f32,
    pub _pad: u32,
}

impl VolumeGpuData {
    pub fn new(id: u32, payload: VolumePayload, bounds: GpuBox3, step_size: f32) -> Self {
        Self {
            tag: payload.tag() as u32,
            id,
            payload: payload.encode(),
            bounds,
            step_size,
            _pad: 0,
        }
    }

    pub fn volume_type(&self) -> VolumeType {
        VolumeType::from_u32(self.tag)
    }

    pub fn payload(&self) -> Option<VolumePayload> {
        VolumePayload::decode(self.tag, &self.payload)
    }

    pub fn as_scivis(&self) -> Option<ScivisVolumeGpuData> {
        match self.payload()? {
            VolumePayload::TransferFunction1D(v) => Some(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_layout() {
        assert_eq!(std::mem::size_of::<StructuredRegularData>(), 48);
        assert_eq!(std::mem::size_of::<UniformGridData>(), 56);
        assert_eq!(std::mem::size_of::<SpatialFieldGpuData>(), 112);
        assert_eq!(std::mem::size_of::<VolumeGpuData>(), 72);
    }

    #[test]
    fn test_scivis_payload() {
        let data = ScivisVolumeGpuData {
            field: 2,
            tf_tex: 9,
            value_range: [0.0, 1.0],
            density_scale: 1.0,
            ..Default::default()
        };
        let v = VolumeGpuData::new(u32::MAX, VolumePayload::TransferFunction1D(data), GpuBox3::default(), 0.5);
        assert_eq!(v.volume_type(), VolumeType::TransferFunction1D);
        assert_eq!(v.as_scivis(), Some(data));
    }
}
