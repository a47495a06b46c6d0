//! Dual-residency arrays.
//!
//! An [`Array`] keeps one logical buffer in host memory, device memory or
//! both. Each residency has its own validity flag; a write to one side
//! invalidates the other, and reading a stale side synchronizes first.
//!
//! Arrays are shared through `Arc` between every object that reads them.
//! Committing an array uploads it (if needed) and notifies its readers.

use bytemuck::Pod;
use parking_lot::{RwLock, RwLockWriteGuard};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use gpu_objects::DevicePtr;

use crate::core::{CommitState, DeviceContext, ObjectHeader, SceneObject};
use crate::device::{Device, DeviceAllocation};
use crate::util::{DataType, Error, Result};

mod buffer;

pub use buffer::HostDeviceBuffer;

/// Logical array shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Extent {
    D1(usize),
    D2(usize, usize),
    D3(usize, usize, usize),
}

impl Extent {
    /// Total element count.
    #[inline]
    pub fn len(&self) -> usize {
        let [x, y, z] = self.dims();
        x * y * z
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensions padded with 1.
    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        match *self {
            Self::D1(x) => [x, 1, 1],
            Self::D2(x, y) => [x, y, 1],
            Self::D3(x, y, z) => [x, y, z],
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        match self {
            Self::D1(_) => 1,
            Self::D2(..) => 2,
            Self::D3(..) => 3,
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::D1(x) => write!(f, "[{x}]"),
            Self::D2(x, y) => write!(f, "[{x}x{y}]"),
            Self::D3(x, y, z) => write!(f, "[{x}x{y}x{z}]"),
        }
    }
}

struct ArrayState {
    extent: Extent,
    /// Host copy in 8-byte words so typed views of up to 8-byte alignment work.
    host: Vec<u64>,
    byte_len: usize,
    allocation: Option<DeviceAllocation>,
    host_valid: bool,
    device_valid: bool,
    generation: u64,
}

impl ArrayState {
    fn zeroed(extent: Extent, element_bytes: usize, generation: u64) -> Self {
        let byte_len = extent.len() * element_bytes;
        Self {
            extent,
            host: vec![0; byte_len.div_ceil(8)],
            byte_len,
            allocation: None,
            host_valid: true,
            device_valid: false,
            generation,
        }
    }

    fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.host)[..self.byte_len]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.byte_len;
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.host)[..len]
    }

    fn sync_host(&mut self) -> Result<bool> {
        if self.host_valid {
            return Ok(false);
        }
        let Some(alloc) = self.allocation.as_ref() else {
            // never uploaded: zero host data is the content
            self.host_valid = true;
            return Ok(false);
        };
        let len = self.byte_len;
        let mut bytes = vec![0u8; len];
        alloc.download(&mut bytes)?;
        self.bytes_mut().copy_from_slice(&bytes);
        self.host_valid = true;
        Ok(true)
    }

    fn sync_device(&mut self, device: &Arc<dyn Device>) -> Result<bool> {
        if self.device_valid && self.allocation.is_some() {
            return Ok(false);
        }
        if self.allocation.is_none() {
            self.allocation = Some(DeviceAllocation::new(device, self.byte_len)?);
        }
        let result = match self.allocation.as_ref() {
            Some(alloc) => alloc.upload(self.bytes()),
            None => Ok(()),
        };
        if let Err(e) = result {
            self.allocation = None;
            return Err(e.into());
        }
        self.device_valid = true;
        Ok(true)
    }
}

/// Shared, typed, dual-residency buffer.
pub struct Array {
    header: ObjectHeader,
    data_type: DataType,
    device: Arc<dyn Device>,
    state: RwLock<ArrayState>,
    /// Generation uploaded by the last successful commit.
    committed: RwLock<Option<u64>>,
}

impl Array {
    pub(crate) fn new(header: ObjectHeader, data_type: DataType, extent: Extent, device: Arc<dyn Device>) -> Self {
        Self {
            header,
            data_type,
            device,
            state: RwLock::new(ArrayState::zeroed(extent, data_type.num_bytes(), 0)),
            committed: RwLock::new(None),
        }
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn extent(&self) -> Extent {
        self.state.read().extent
    }

    /// Element count.
    pub fn len(&self) -> usize {
        self.state.read().extent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        self.state.read().byte_len
    }

    /// Bumped by every resize; device pointers from older generations are stale.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    pub fn is_host_valid(&self) -> bool {
        self.state.read().host_valid
    }

    pub fn is_device_valid(&self) -> bool {
        self.state.read().device_valid
    }

    /// Replace the host contents. Invalidates the device copy.
    pub fn write<T: Pod>(&self, data: &[T]) -> Result<()> {
        self.write_bytes(bytemuck::cast_slice(data))
    }

    pub fn write_bytes(&self, data: &[u8]) -> Result<()> {
        let mut s = self.state.write();
        if data.len() != s.byte_len {
            return Err(Error::SizeMismatch {
                expected: s.byte_len,
                actual: data.len(),
            });
        }
        s.bytes_mut().copy_from_slice(data);
        s.host_valid = true;
        s.device_valid = false;
        drop(s);
        self.header.set_state(CommitState::Uncommitted);
        Ok(())
    }

    /// Write straight into device memory. Invalidates the host copy.
    pub fn write_device(&self, data: &[u8]) -> Result<()> {
        let mut s = self.state.write();
        if data.len() != s.byte_len {
            return Err(Error::SizeMismatch {
                expected: s.byte_len,
                actual: data.len(),
            });
        }
        if s.allocation.is_none() {
            s.allocation = Some(DeviceAllocation::new(&self.device, s.byte_len)?);
        }
        if let Some(alloc) = s.allocation.as_ref() {
            alloc.upload(data)?;
        }
        s.device_valid = true;
        s.host_valid = false;
        drop(s);
        self.header.set_state(CommitState::Uncommitted);
        Ok(())
    }

    /// Mutable typed view of the host copy. Dropping the guard invalidates
    /// the device copy.
    pub fn map<T: Pod>(&self) -> Result<ArrayMap<'_, T>> {
        let mut s = self.state.write();
        s.sync_host()?;
        if bytemuck::try_cast_slice::<u8, T>(s.bytes()).is_err() {
            return Err(Error::type_mismatch(
                format!("{} ({} bytes)", self.data_type, self.data_type.num_bytes()),
                format!("{}-byte element view", std::mem::size_of::<T>()),
            ));
        }
        Ok(ArrayMap {
            state: s,
            header: &self.header,
            _marker: PhantomData,
        })
    }

    /// Copy of the host contents, downloading first if stale.
    pub fn host_bytes(&self) -> Result<Vec<u8>> {
        let mut s = self.state.write();
        s.sync_host()?;
        Ok(s.bytes().to_vec())
    }

    /// Typed copy of the host contents.
    pub fn to_vec<T: Pod>(&self) -> Result<Vec<T>> {
        let bytes = self.host_bytes()?;
        let size = std::mem::size_of::<T>();
        if size == 0 || bytes.len() % size != 0 {
            return Err(Error::type_mismatch(self.data_type, format!("{size}-byte elements")));
        }
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Every component widened to `f32`, fixed-point storage normalized.
    pub fn to_f32_components(&self) -> Result<Vec<f32>> {
        let scalar = self.data_type.scalar;
        let width = scalar.num_bytes();
        if width == 0 {
            return Err(Error::type_mismatch("numeric element type", self.data_type));
        }
        let bytes = self.host_bytes()?;
        bytes
            .chunks_exact(width)
            .map(|c| scalar.decode_normalized(c).ok_or_else(|| Error::type_mismatch("numeric element type", scalar)))
            .collect()
    }

    /// Device address of the contents, allocating and uploading if stale.
    pub fn device_ptr(&self) -> Result<DevicePtr> {
        let mut s = self.state.write();
        s.sync_device(&self.device)?;
        Ok(s.allocation.as_ref().map_or(0, DeviceAllocation::ptr))
    }

    /// Make the device copy current. Returns whether a transfer happened.
    pub fn upload(&self) -> Result<bool> {
        self.state.write().sync_device(&self.device)
    }

    /// Make the host copy current. Returns whether a transfer happened.
    pub fn download(&self) -> Result<bool> {
        self.state.write().sync_host()
    }

    /// Change the extent. Both residencies are reallocated (zeroed), the
    /// generation is bumped and every reader is notified.
    pub fn resize(&self, ctx: &DeviceContext, extent: Extent) {
        {
            let mut s = self.state.write();
            let generation = s.generation + 1;
            *s = ArrayState::zeroed(extent, self.data_type.num_bytes(), generation);
        }
        *self.committed.write() = None;
        self.header.set_state(CommitState::Uncommitted);
        tracing::debug!(id = %self.id(), %extent, "resized array");
        ctx.notify_observers(self.id());
    }

    /// Generation uploaded by the last successful commit.
    pub fn committed_generation(&self) -> Option<u64> {
        *self.committed.read()
    }
}

impl SceneObject for Array {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |_| {
            let mut s = self.state.write();
            s.sync_device(&self.device)?;
            Ok(Some(s.generation))
        })
    }

    /// Arrays are usable until a commit fails; readers upload on demand.
    fn is_valid(&self) -> bool {
        self.state() != CommitState::Invalid
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.read();
        f.debug_struct("Array")
            .field("id", &self.header.id())
            .field("data_type", &self.data_type)
            .field("extent", &s.extent)
            .field("host_valid", &s.host_valid)
            .field("device_valid", &s.device_valid)
            .finish()
    }
}

/// Write guard returned by [`Array::map`].
pub struct ArrayMap<'a, T: Pod> {
    state: RwLockWriteGuard<'a, ArrayState>,
    header: &'a ObjectHeader,
    _marker: PhantomData<T>,
}

impl<T: Pod> Deref for ArrayMap<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        bytemuck::cast_slice(self.state.bytes())
    }
}

impl<T: Pod> DerefMut for ArrayMap<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        bytemuck::cast_slice_mut(self.state.bytes_mut())
    }
}

impl<T: Pod> Drop for ArrayMap<'_, T> {
    fn drop(&mut self) {
        self.state.host_valid = true;
        self.state.device_valid = false;
        self.header.set_state(CommitState::Uncommitted);
    }
}
