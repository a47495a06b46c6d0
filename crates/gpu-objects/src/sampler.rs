//! Sampler snapshots.

use bytemuck::{Pod, Zeroable};

use crate::payload::{tagged_payload, EmptyPayload};
use crate::{AttributePtr, TextureHandle};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Image1DData {
    pub texobj: TextureHandle,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Image2DData {
    pub texobj: TextureHandle,
}

/// Looks up a per-primitive value by primitive id.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PrimIdSamplerData {
    pub attr: AttributePtr,
    pub offset: u32,
    pub _pad: u32,
}

tagged_payload! {
    SamplerPayload, SamplerType, words = 3 {
        Texture1D(Image1DData) = 1,
        Texture2D(Image2DData) = 2,
        Primitive(PrimIdSamplerData) = 3,
        Transform(EmptyPayload) = 4,
    }
}

/// Sampler snapshot. Transforms are column-major 4x4.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SamplerGpuData {
    tag: u32,
    /// Input attribute channel, `-1` for none.
    pub attribute: i32,
    pub in_transform: [[f32; 4]; 4],
    pub in_offset: [f32; 4],
    pub out_transform: [[f32; 4]; 4],
    pub out_offset: [f32; 4],
    payload: [u64; 3],
}

impl SamplerGpuData {
    pub fn new(
        attribute: i32,
        in_transform: glam::Mat4,
        in_offset: glam::Vec4,
        out_transform: glam::Mat4,
        out_offset: glam::Vec4,
        payload: SamplerPayload,
    ) -> Self {
        Self {
            tag: payload.tag() as u32,
            attribute,
            in_transform: in_transform.to_cols_array_2d(),
            in_offset: in_offset.to_array(),
            out_transform: out_transform.to_cols_array_2d(),
            out_offset: out_offset.to_array(),
            payload: payload.encode(),
        }
    }

    pub fn sampler_type(&self) -> SamplerType {
        SamplerType::from_u32(self.tag)
    }

    pub fn payload(&self) -> Option<SamplerPayload> {
        SamplerPayload::decode(self.tag, &self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec4};

    #[test]
    fn test_sampler_roundtrip() {
        let s = SamplerGpuData::new(
            0,
            Mat4::IDENTITY,
            Vec4::ZERO,
            Mat4::IDENTITY,
            Vec4::ZERO,
            SamplerPayload::Texture1D(Image1DData { texobj: 42 }),
        );
        assert_eq!(s.sampler_type(), SamplerType::Texture1D);
        assert_eq!(s.payload(), Some(SamplerPayload::Texture1D(Image1DData { texobj: 42 })));
        assert_eq!(std::mem::size_of::<SamplerGpuData>(), 192);
    }
}
