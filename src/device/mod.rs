//! Device contract.
//!
//! Everything scene objects do to device memory goes through [`Device`]:
//! linear allocations addressed by [`DevicePtr`], sampled textures, and
//! acceleration structures. All operations are ordered on a single stream;
//! [`Device::synchronize`] waits for everything issued so far.
//!
//! Scoped owners ([`DeviceAllocation`], [`DeviceTexture`], [`DeviceAccel`])
//! release their resource on drop, so dropping derived state is all a commit
//! needs to do before rebuilding it.

use std::fmt;
use std::sync::Arc;

use gpu_objects::{DevicePtr, TextureHandle, TraversableHandle};

use crate::accel::BuildInput;
use crate::util::{Box3, DeviceError};

pub mod bvh;
mod host;

pub use host::HostDevice;

/// Result type for raw device calls.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
}

impl TextureFilter {
    /// `"nearest"` selects point sampling, anything else is linear.
    pub fn from_name(name: &str) -> Self {
        match name {
            "nearest" => Self::Nearest,
            _ => Self::Linear,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WrapMode {
    #[default]
    Clamp,
    Repeat,
    Mirror,
}

impl WrapMode {
    pub fn from_name(name: &str) -> Self {
        match name {
            "repeat" => Self::Repeat,
            "mirrorRepeat" => Self::Mirror,
            _ => Self::Clamp,
        }
    }
}

/// Float texture description. Unused trailing dims are 1.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureDesc {
    pub dims: [u32; 3],
    /// Components per texel (1..=4).
    pub channels: u32,
    pub filter: TextureFilter,
    pub wrap: [WrapMode; 3],
    pub normalized_coords: bool,
}

impl TextureDesc {
    pub fn texel_count(&self) -> usize {
        self.dims.iter().map(|&d| d as usize).product()
    }

    /// Number of `f32` values the texture data must hold.
    pub fn value_count(&self) -> usize {
        self.texel_count() * self.channels as usize
    }
}

/// Summary of a built acceleration structure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AccelInfo {
    pub num_primitives: u32,
    pub num_nodes: u32,
    pub bounds: Box3,
    /// Built over instances rather than primitives.
    pub is_instance: bool,
}

/// Resource counters. Used by tests to check that recommits leak nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub live_allocations: usize,
    pub allocated_bytes: usize,
    pub peak_bytes: usize,
    pub live_textures: usize,
    pub live_accels: usize,
    pub uploads: u64,
    pub uploaded_bytes: u64,
    pub downloads: u64,
    pub submitted_ops: u64,
    pub completed_ops: u64,
}

impl DeviceStats {
    /// Operations issued but not yet synchronized.
    pub fn pending_ops(&self) -> u64 {
        self.submitted_ops - self.completed_ops
    }
}

/// Device backend used by a context.
pub trait Device: Send + Sync {
    fn name(&self) -> &str;

    /// Allocate `bytes` of zeroed device memory.
    fn allocate(&self, bytes: usize) -> DeviceResult<DevicePtr>;
    fn free(&self, ptr: DevicePtr) -> DeviceResult<()>;

    /// Copy host bytes to `dst`, which may point inside an allocation.
    fn upload(&self, dst: DevicePtr, data: &[u8]) -> DeviceResult<()>;
    fn download(&self, src: DevicePtr, out: &mut [u8]) -> DeviceResult<()>;

    fn create_texture(&self, desc: &TextureDesc, data: &[f32]) -> DeviceResult<TextureHandle>;
    fn destroy_texture(&self, handle: TextureHandle) -> DeviceResult<()>;
    /// Texel values of a texture, for inspection.
    fn read_texture(&self, handle: TextureHandle) -> DeviceResult<Vec<f32>>;

    /// Build one acceleration structure over all `inputs`.
    fn build_accel(&self, inputs: &[BuildInput]) -> DeviceResult<TraversableHandle>;
    fn destroy_accel(&self, handle: TraversableHandle) -> DeviceResult<()>;
    fn accel_info(&self, handle: TraversableHandle) -> DeviceResult<AccelInfo>;

    /// Wait for all issued operations.
    fn synchronize(&self) -> DeviceResult<()>;

    fn stats(&self) -> DeviceStats;
}

/// Linear device allocation, freed on drop.
pub struct DeviceAllocation {
    device: Arc<dyn Device>,
    ptr: DevicePtr,
    size: usize,
}

impl DeviceAllocation {
    pub fn new(device: &Arc<dyn Device>, size: usize) -> DeviceResult<Self> {
        let ptr = device.allocate(size)?;
        Ok(Self {
            device: device.clone(),
            ptr,
            size,
        })
    }

    /// Allocate and fill in one step. Nothing stays allocated on failure.
    pub fn with_data(device: &Arc<dyn Device>, data: &[u8]) -> DeviceResult<Self> {
        let alloc = Self::new(device, data.len())?;
        alloc.upload(data)?;
        Ok(alloc)
    }

    #[inline]
    pub fn ptr(&self) -> DevicePtr {
        self.ptr
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn upload(&self, data: &[u8]) -> DeviceResult<()> {
        self.upload_at(0, data)
    }

    pub fn upload_at(&self, offset: usize, data: &[u8]) -> DeviceResult<()> {
        if offset + data.len() > self.size {
            return Err(DeviceError::OutOfBounds {
                ptr: self.ptr,
                offset,
                len: data.len(),
                size: self.size,
            });
        }
        self.device.upload(self.ptr + offset as u64, data)
    }

    pub fn download(&self, out: &mut [u8]) -> DeviceResult<()> {
        if out.len() > self.size {
            return Err(DeviceError::OutOfBounds {
                ptr: self.ptr,
                offset: 0,
                len: out.len(),
                size: self.size,
            });
        }
        self.device.download(self.ptr, out)
    }
}

impl Drop for DeviceAllocation {
    fn drop(&mut self) {
        if let Err(e) = self.device.free(self.ptr) {
            tracing::warn!("failed to free device allocation {:#x}: {e}", self.ptr);
        }
    }
}

impl fmt::Debug for DeviceAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceAllocation({:#x}, {} bytes)", self.ptr, self.size)
    }
}

/// Texture object, destroyed on drop.
pub struct DeviceTexture {
    device: Arc<dyn Device>,
    handle: TextureHandle,
}

impl DeviceTexture {
    pub fn new(device: &Arc<dyn Device>, desc: &TextureDesc, data: &[f32]) -> DeviceResult<Self> {
        let handle = device.create_texture(desc, data)?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    #[inline]
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn read(&self) -> DeviceResult<Vec<f32>> {
        self.device.read_texture(self.handle)
    }
}

impl Drop for DeviceTexture {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_texture(self.handle) {
            tracing::warn!("failed to destroy texture {}: {e}", self.handle);
        }
    }
}

impl fmt::Debug for DeviceTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceTexture({})", self.handle)
    }
}

/// Acceleration structure, destroyed on drop.
pub struct DeviceAccel {
    device: Arc<dyn Device>,
    handle: TraversableHandle,
}

impl DeviceAccel {
    pub fn build(device: &Arc<dyn Device>, inputs: &[BuildInput]) -> DeviceResult<Self> {
        let handle = device.build_accel(inputs)?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    #[inline]
    pub fn handle(&self) -> TraversableHandle {
        self.handle
    }

    pub fn info(&self) -> DeviceResult<AccelInfo> {
        self.device.accel_info(self.handle)
    }
}

impl Drop for DeviceAccel {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_accel(self.handle) {
            tracing::warn!("failed to destroy traversable {}: {e}", self.handle);
        }
    }
}

impl fmt::Debug for DeviceAccel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceAccel({})", self.handle)
    }
}
