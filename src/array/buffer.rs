//! Exclusively owned derived buffers.

use bytemuck::Pod;
use std::sync::Arc;

use gpu_objects::DevicePtr;

use crate::device::{Device, DeviceAllocation};
use crate::util::Result;

/// Host vector plus its device copy, owned by exactly one object.
///
/// Used for data a commit derives (split index buffers, primitive bounds,
/// snapshot arrays). It is built from scratch on every commit and released
/// with the state that owns it.
pub struct HostDeviceBuffer<T: Pod> {
    host: Vec<T>,
    device: Option<DeviceAllocation>,
}

impl<T: Pod> HostDeviceBuffer<T> {
    /// Host-only buffer.
    pub fn from_vec(host: Vec<T>) -> Self {
        Self { host, device: None }
    }

    /// Buffer uploaded to `device`. An empty vector allocates nothing.
    pub fn uploaded(host: Vec<T>, device: &Arc<dyn Device>) -> Result<Self> {
        let mut buf = Self::from_vec(host);
        buf.upload(device)?;
        Ok(buf)
    }

    /// Upload the host contents, replacing any previous device copy.
    pub fn upload(&mut self, device: &Arc<dyn Device>) -> Result<DevicePtr> {
        self.device = None;
        if self.host.is_empty() {
            return Ok(0);
        }
        let alloc = DeviceAllocation::with_data(device, bytemuck::cast_slice(&self.host))?;
        let ptr = alloc.ptr();
        self.device = Some(alloc);
        Ok(ptr)
    }

    /// Device address, `0` when not uploaded or empty.
    #[inline]
    pub fn ptr(&self) -> DevicePtr {
        self.device.as_ref().map_or(0, DeviceAllocation::ptr)
    }

    #[inline]
    pub fn host(&self) -> &[T] {
        &self.host
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.host.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        std::mem::size_of_val(self.host.as_slice())
    }
}

impl<T: Pod> Default for HostDeviceBuffer<T> {
    fn default() -> Self {
        Self::from_vec(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HostDevice;

    #[test]
    fn test_upload_and_release() {
        let dev: Arc<dyn Device> = Arc::new(HostDevice::new());
        let buf = HostDeviceBuffer::uploaded(vec![[0u32, 1, 3], [2, 3, 1]], &dev).unwrap();
        assert_ne!(buf.ptr(), 0);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.byte_len(), 24);
        assert_eq!(dev.stats().live_allocations, 1);
        drop(buf);
        assert_eq!(dev.stats().live_allocations, 0);
    }

    #[test]
    fn test_empty_buffer_has_null_ptr() {
        let dev: Arc<dyn Device> = Arc::new(HostDevice::new());
        let buf = HostDeviceBuffer::<f32>::uploaded(Vec::new(), &dev).unwrap();
        assert_eq!(buf.ptr(), 0);
        assert_eq!(dev.stats().live_allocations, 0);
    }

    #[test]
    fn test_failed_upload_holds_nothing() {
        let dev: Arc<dyn Device> = Arc::new(HostDevice::with_budget(8));
        assert!(HostDeviceBuffer::uploaded(vec![0.0f32; 16], &dev).is_err());
        assert_eq!(dev.stats().live_allocations, 0);
    }
}
