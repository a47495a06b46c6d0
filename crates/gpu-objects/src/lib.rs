//! # gpu-objects
//!
//! Flat, trivially copyable snapshot structures read by rendering kernels.
//!
//! Every struct here is `#[repr(C)]` + [`bytemuck::Pod`] so it can be uploaded
//! byte-for-byte. Host ownership never leaks into these types: buffers are
//! referenced through [`DevicePtr`] addresses, textures and acceleration
//! structures through opaque `u64` handles, and other scene objects through a
//! [`DeviceObjectIndex`] into the frame registry.
//!
//! Polymorphic kinds (geometry, sampler, field, volume, light, camera,
//! renderer parameters, background) are tagged unions: a discriminator plus a
//! fixed-size payload that can only be written from, and read back into, the
//! matching Rust enum.
//!
//! ## Layout
//!
//! ```text
//! FrameGpuData
//! ├── fb        FramebufferGpuData   (buffers, size, format, frame id)
//! ├── renderer  RendererGpuData      (tagged params + tagged background)
//! ├── world     WorldGpuData         (instance lists + traversables)
//! ├── camera    DevicePtr -> CameraGpuData
//! └── registry  ObjectRegistryGpuData (DevicePtr per snapshot array)
//! ```

use bytemuck::{Pod, Zeroable};

mod payload;
pub mod camera;
pub mod frame;
pub mod geometry;
pub mod light;
pub mod material;
pub mod renderer;
pub mod sampler;
pub mod volume;

pub use camera::{CameraGpuData, CameraPayload, CameraType, OrthographicCameraGpuData, PerspectiveCameraGpuData};
pub use frame::{
    FrameBuffers, FrameFormat, FrameGpuData, FramebufferGpuData, InstanceLightGpuData,
    InstanceSurfaceGpuData, InstanceVolumeGpuData, ObjectRegistryGpuData, SurfaceGpuData, WorldGpuData,
};
pub use geometry::{
    ConeGeometryData, CurveGeometryData, CylinderGeometryData, GeometryGpuData, GeometryPayload,
    GeometryType, QuadGeometryData, SphereGeometryData, TriangleGeometryData,
};
pub use light::{AmbientLightGpuData, DirectionalLightGpuData, LightGpuData, LightPayload, LightType, PointLightGpuData};
pub use material::{AlphaMode, MaterialGpuData, MaterialParameter, MaterialParameterType};
pub use payload::EmptyPayload;
pub use renderer::{
    AoRendererGpuData, BackgroundGpuData, BackgroundMode, BackgroundPayload, DebugRendererGpuData,
    DptRendererGpuData, ImageBackground, RendererGpuData, RendererParameters, RendererParametersGpuData, RendererType,
    SciVisRendererGpuData,
};
pub use sampler::{Image1DData, Image2DData, PrimIdSamplerData, SamplerGpuData, SamplerPayload, SamplerType};
pub use volume::{
    ScivisVolumeGpuData, SpatialFieldGpuData, SpatialFieldPayload, SpatialFieldType,
    StructuredRegularData, UniformGridData, VolumeGpuData, VolumePayload, VolumeType,
};

/// Device address of a buffer. `0` is null.
pub type DevicePtr = u64;

/// Opaque texture object handle. `0` is none.
pub type TextureHandle = u64;

/// Opaque acceleration structure handle. `0` is none.
pub type TraversableHandle = u64;

/// Index of an object inside the frame registry arrays.
pub type DeviceObjectIndex = i32;

/// Index value meaning "no object".
pub const INVALID_INDEX: DeviceObjectIndex = -1;

/// Vertex/primitive attribute channels: attribute0-3 plus color.
pub const NUM_ATTRIBUTES: usize = 5;

/// Slot of the color channel inside attribute arrays.
pub const COLOR_ATTRIBUTE: usize = 4;

/// Typed pointer to an attribute array.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct AttributePtr {
    pub data: DevicePtr,
    /// Element type code of the source array.
    pub data_type: u32,
    pub num_channels: u32,
}

impl AttributePtr {
    pub const NONE: Self = Self {
        data: 0,
        data_type: 0,
        num_channels: 0,
    };

    #[inline]
    pub fn is_none(&self) -> bool {
        self.data == 0
    }
}

/// Axis-aligned box as stored on the device: `[min.xyz, max.xyz]`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuBox3 {
    pub lower: [f32; 3],
    pub upper: [f32; 3],
}

impl From<(glam::Vec3, glam::Vec3)> for GpuBox3 {
    fn from((lower, upper): (glam::Vec3, glam::Vec3)) -> Self {
        Self {
            lower: lower.to_array(),
            upper: upper.to_array(),
        }
    }
}

/// 1D interval: `[lower, upper]`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuBox1 {
    pub lower: f32,
    pub upper: f32,
}
