//! Light snapshots.

use bytemuck::{Pod, Zeroable};

use crate::payload::tagged_payload;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DirectionalLightGpuData {
    pub direction: [f32; 3],
    pub irradiance: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointLightGpuData {
    pub position: [f32; 3],
    pub intensity: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AmbientLightGpuData {
    pub radiance: f32,
    pub _pad: [u32; 3],
}

tagged_payload! {
    LightPayload, LightType, words = 2 {
        Directional(DirectionalLightGpuData) = 1,
        Point(PointLightGpuData) = 2,
        Ambient(AmbientLightGpuData) = 3,
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LightGpuData {
    tag: u32,
    pub color: [f32; 3],
    payload: [u64; 2],
}

impl LightGpuData {
    pub fn new(color: [f32; 3], payload: LightPayload) -> Self {
        Self {
            tag: payload.tag() as u32,
            color,
            payload: payload.encode(),
        }
    }

    pub fn light_type(&self) -> LightType {
        LightType::from_u32(self.tag)
    }

    pub fn payload(&self) -> Option<LightPayload> {
        LightPayload::decode(self.tag, &self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_payload() {
        let l = LightGpuData::new(
            [1.0; 3],
            LightPayload::Point(PointLightGpuData {
                position: [0.0, 1.0, 0.0],
                intensity: 2.0,
            }),
        );
        assert_eq!(l.light_type(), LightType::Point);
        assert!(matches!(l.payload(), Some(LightPayload::Point(p)) if p.intensity == 2.0));
        assert_eq!(std::mem::size_of::<LightGpuData>(), 32);
    }
}
