//! Frame-level aggregate and the registry/world blocks it points at.

use bytemuck::{Pod, Zeroable};

use crate::renderer::RendererGpuData;
use crate::{DeviceObjectIndex, DevicePtr, TraversableHandle};

/// Per-channel framebuffer storage. Null when the channel is disabled.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FrameBuffers {
    pub accum_color: DevicePtr,
    pub accum_albedo: DevicePtr,
    pub accum_normal: DevicePtr,
    pub out_color: DevicePtr,
    pub out_albedo: DevicePtr,
    pub out_normal: DevicePtr,
    pub depth: DevicePtr,
    pub primitive_id: DevicePtr,
    pub object_id: DevicePtr,
    pub instance_id: DevicePtr,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FrameFormat {
    #[default]
    Float = 0,
    Uint = 1,
    Srgb = 2,
    Unknown = 3,
}

impl FrameFormat {
    pub const fn from_u32(v: u32) -> Self {
        match v {
            0 => Self::Float,
            1 => Self::Uint,
            2 => Self::Srgb,
            _ => Self::Unknown,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FramebufferGpuData {
    pub buffers: FrameBuffers,
    pub frame_id: i32,
    pub checkerboard_id: i32,
    /// `1 / (frame_id + 1)`, the accumulation blend weight.
    pub inv_frame_id: f32,
    /// [`FrameFormat`] as `u32`.
    pub format: u32,
    pub size: [u32; 2],
    pub inv_size: [f32; 2],
}

/// Surface snapshot: references resolved to registry indices.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SurfaceGpuData {
    pub geometry: DeviceObjectIndex,
    pub material: DeviceObjectIndex,
    pub id: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceSurfaceGpuData {
    /// `DeviceObjectIndex` per surface of the instanced group.
    pub surfaces: DevicePtr,
    pub num_surfaces: u32,
    pub id: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceVolumeGpuData {
    pub volumes: DevicePtr,
    pub num_volumes: u32,
    pub id: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceLightGpuData {
    pub indices: DevicePtr,
    pub num_lights: u32,
    pub id: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct WorldGpuData {
    pub surface_instances: DevicePtr,
    pub volume_instances: DevicePtr,
    pub light_instances: DevicePtr,
    pub num_surface_instances: u32,
    pub num_volume_instances: u32,
    pub num_light_instances: u32,
    pub _pad: u32,
    pub surfaces_traversable: TraversableHandle,
    pub volumes_traversable: TraversableHandle,
}

/// One device array per snapshot kind, indexed by `DeviceObjectIndex`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ObjectRegistryGpuData {
    pub samplers: DevicePtr,
    pub geometries: DevicePtr,
    pub materials: DevicePtr,
    pub surfaces: DevicePtr,
    pub lights: DevicePtr,
    pub fields: DevicePtr,
    pub volumes: DevicePtr,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameGpuData {
    pub fb: FramebufferGpuData,
    pub renderer: RendererGpuData,
    pub world: WorldGpuData,
    /// Points at a single `CameraGpuData`.
    pub camera: DevicePtr,
    pub registry: ObjectRegistryGpuData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        assert_eq!(std::mem::size_of::<FramebufferGpuData>(), 112);
        assert_eq!(std::mem::size_of::<WorldGpuData>(), 56);
        assert_eq!(std::mem::size_of::<FrameGpuData>(), 312);
        assert_eq!(std::mem::size_of::<SurfaceGpuData>(), 16);
    }

    #[test]
    fn test_frame_format_decode() {
        assert_eq!(FrameFormat::from_u32(2), FrameFormat::Srgb);
        assert_eq!(FrameFormat::from_u32(17), FrameFormat::Unknown);
    }
}
