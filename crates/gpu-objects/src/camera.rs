//! Camera snapshots. Ray bases are precomputed on the host.

use bytemuck::{Pod, Zeroable};

use crate::payload::tagged_payload;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PerspectiveCameraGpuData {
    pub dir_du: [f32; 3],
    pub dir_dv: [f32; 3],
    pub dir_00: [f32; 3],
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct OrthographicCameraGpuData {
    pub pos_du: [f32; 3],
    pub pos_dv: [f32; 3],
    pub pos_00: [f32; 3],
    pub _pad: u32,
}

tagged_payload! {
    CameraPayload, CameraType, words = 5 {
        Perspective(PerspectiveCameraGpuData) = 1,
        Orthographic(OrthographicCameraGpuData) = 2,
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CameraGpuData {
    tag: u32,
    /// `[min.x, min.y, max.x, max.y]` of the image region.
    pub region: [f32; 4],
    pub pos: [f32; 3],
    pub dir: [f32; 3],
    pub up: [f32; 3],
    payload: [u64; 5],
}

impl CameraGpuData {
    pub fn new(region: [f32; 4], pos: [f32; 3], dir: [f32; 3], up: [f32; 3], payload: CameraPayload) -> Self {
        Self {
            tag: payload.tag() as u32,
            region,
            pos,
            dir,
            up,
            payload: payload.encode(),
        }
    }

    pub fn camera_type(&self) -> CameraType {
        CameraType::from_u32(self.tag)
    }

    pub fn payload(&self) -> Option<CameraPayload> {
        CameraPayload::decode(self.tag, &self.payload)
    }
}
