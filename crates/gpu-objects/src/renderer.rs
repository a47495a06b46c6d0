//! Renderer parameter blocks and backgrounds.

use bytemuck::{Pod, Zeroable};

use crate::payload::{tagged_payload, EmptyPayload};
use crate::DeviceObjectIndex;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DebugRendererGpuData {
    /// Index into the debug method table.
    pub method: i32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AoRendererGpuData {
    pub ao_samples: i32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DptRendererGpuData {
    pub max_depth: i32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SciVisRendererGpuData {
    pub light_falloff: f32,
    pub ao_samples: i32,
    pub ao_color: [f32; 3],
    pub ao_intensity: f32,
}

tagged_payload! {
    RendererParameters, RendererType, words = 3 {
        Raycast(EmptyPayload) = 1,
        Debug(DebugRendererGpuData) = 2,
        Ao(AoRendererGpuData) = 3,
        Dpt(DptRendererGpuData) = 4,
        SciVis(SciVisRendererGpuData) = 5,
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RendererParametersGpuData {
    tag: u32,
    _pad: u32,
    payload: [u64; 3],
}

impl RendererParametersGpuData {
    pub fn new(params: RendererParameters) -> Self {
        Self {
            tag: params.tag() as u32,
            _pad: 0,
            payload: params.encode(),
        }
    }

    pub fn renderer_type(&self) -> RendererType {
        RendererType::from_u32(self.tag)
    }

    pub fn payload(&self) -> Option<RendererParameters> {
        RendererParameters::decode(self.tag, &self.payload)
    }
}

tagged_payload! {
    BackgroundPayload, BackgroundMode, words = 2 {
        Color([f32; 4]) = 1,
        Image(ImageBackground) = 2,
    }
}

/// Registry index of an `image2D` sampler.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ImageBackground {
    pub sampler: DeviceObjectIndex,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BackgroundGpuData {
    tag: u32,
    _pad: u32,
    payload: [u64; 2],
}

impl BackgroundGpuData {
    pub fn new(background: BackgroundPayload) -> Self {
        Self {
            tag: background.tag() as u32,
            _pad: 0,
            payload: background.encode(),
        }
    }

    pub fn mode(&self) -> BackgroundMode {
        BackgroundMode::from_u32(self.tag)
    }

    pub fn payload(&self) -> Option<BackgroundPayload> {
        BackgroundPayload::decode(self.tag, &self.payload)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RendererGpuData {
    pub params: RendererParametersGpuData,
    pub background: BackgroundGpuData,
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub occlusion_distance: f32,
    pub _pad: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_layout() {
        assert_eq!(std::mem::size_of::<RendererParametersGpuData>(), 32);
        assert_eq!(std::mem::size_of::<BackgroundGpuData>(), 24);
        assert_eq!(std::mem::size_of::<RendererGpuData>(), 80);
    }

    #[test]
    fn test_background_modes() {
        let bg = BackgroundGpuData::new(BackgroundPayload::Color([0.1, 0.1, 0.1, 1.0]));
        assert_eq!(bg.mode(), BackgroundMode::Color);
        let bg = BackgroundGpuData::new(BackgroundPayload::Image(ImageBackground { sampler: 3, _pad: 0 }));
        assert!(matches!(bg.payload(), Some(BackgroundPayload::Image(i)) if i.sampler == 3));
    }

    #[test]
    fn test_ao_params() {
        let p = RendererParametersGpuData::new(RendererParameters::Ao(AoRendererGpuData { ao_samples: 4, _pad: 0 }));
        assert_eq!(p.renderer_type(), RendererType::Ao);
        assert!(matches!(p.payload(), Some(RendererParameters::Ao(a)) if a.ao_samples == 4));
    }
}
