//! Host-memory reference device.
//!
//! Emulates a GPU address space in process memory so the whole commit and
//! frame pipeline runs without a GPU. Addresses come from a first-fit free
//! list with coalescing: releasing a set of buffers and allocating the same
//! sizes again in the same order hands back the same addresses, which keeps
//! recommitted snapshots byte-identical.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use gpu_objects::{DevicePtr, TextureHandle, TraversableHandle};

use super::bvh::{build_bvh, Aabb, Bvh, BvhNode};
use super::{AccelInfo, Device, DeviceResult, DeviceStats, TextureDesc};
use crate::accel::{AccelInstance, BuildInput};
use crate::config::Settings;
use crate::util::{Box3, DeviceError, Vec3};

/// First address handed out; keeps null and small integers invalid.
const BASE_ADDRESS: u64 = 0x1_0000_0000;

/// Allocation granularity in bytes.
const ALIGNMENT: u64 = 256;

struct Block {
    data: Vec<u8>,
    /// Address space reserved for the block (aligned size).
    reserved: u64,
}

struct Accel {
    info: AccelInfo,
    bvh: Bvh,
}

/// Handle allocator that reuses the smallest released handle.
#[derive(Default)]
struct HandlePool {
    next: u64,
    released: BTreeSet<u64>,
}

impl HandlePool {
    fn acquire(&mut self) -> u64 {
        if let Some(h) = self.released.pop_first() {
            return h;
        }
        self.next += 1;
        self.next
    }

    fn release(&mut self, handle: u64) {
        self.released.insert(handle);
    }
}

#[derive(Default)]
struct HostState {
    blocks: BTreeMap<DevicePtr, Block>,
    /// Free address ranges below `top`: start -> length.
    free: BTreeMap<u64, u64>,
    top: u64,
    budget: Option<usize>,
    fail_downloads: bool,

    textures: HashMap<TextureHandle, Vec<f32>>,
    texture_handles: HandlePool,
    accels: HashMap<TraversableHandle, Accel>,
    accel_handles: HandlePool,

    allocated_bytes: usize,
    peak_bytes: usize,
    uploads: u64,
    uploaded_bytes: u64,
    downloads: u64,
    submitted_ops: u64,
    completed_ops: u64,
}

impl HostState {
    fn new(budget: Option<usize>) -> Self {
        Self {
            top: BASE_ADDRESS,
            budget,
            ..Default::default()
        }
    }

    fn reserve(&mut self, size: u64) -> u64 {
        let hit = self.free.iter().find(|(_, &len)| len >= size).map(|(&start, &len)| (start, len));
        match hit {
            Some((start, len)) => {
                self.free.remove(&start);
                if len > size {
                    self.free.insert(start + size, len - size);
                }
                start
            }
            None => {
                let start = self.top;
                self.top += size;
                start
            }
        }
    }

    fn unreserve(&mut self, mut start: u64, mut len: u64) {
        // merge with the preceding free range
        if let Some((&prev, &prev_len)) = self.free.range(..start).next_back() {
            if prev + prev_len == start {
                self.free.remove(&prev);
                start = prev;
                len += prev_len;
            }
        }
        // merge with the following free range
        if let Some(&next_len) = self.free.get(&(start + len)) {
            self.free.remove(&(start + len));
            len += next_len;
        }
        if start + len == self.top {
            self.top = start;
        } else {
            self.free.insert(start, len);
        }
    }

    /// Block containing `ptr` plus the offset of `ptr` inside it.
    fn locate(&self, ptr: DevicePtr, len: usize) -> DeviceResult<(DevicePtr, usize)> {
        let (&base, block) = self.blocks.range(..=ptr).next_back().ok_or(DeviceError::InvalidPointer(ptr))?;
        let offset = (ptr - base) as usize;
        if ptr - base >= block.reserved.max(1) {
            return Err(DeviceError::InvalidPointer(ptr));
        }
        if offset + len > block.data.len() {
            return Err(DeviceError::OutOfBounds {
                ptr: base,
                offset,
                len,
                size: block.data.len(),
            });
        }
        Ok((base, offset))
    }

    fn read(&self, ptr: DevicePtr, len: usize) -> DeviceResult<&[u8]> {
        let (base, offset) = self.locate(ptr, len)?;
        Ok(&self.blocks[&base].data[offset..offset + len])
    }

    fn submit(&mut self) {
        self.submitted_ops += 1;
    }

    fn read_vec3(&self, buffer: DevicePtr, stride: u32, index: u32) -> DeviceResult<Vec3> {
        let bytes = self.read(buffer + index as u64 * stride as u64, 12)?;
        let v: [f32; 3] = bytemuck::pod_read_unaligned(bytes);
        Ok(Vec3::from_array(v))
    }

    fn read_f32(&self, buffer: DevicePtr, stride: u32, index: u32) -> DeviceResult<f32> {
        let bytes = self.read(buffer + index as u64 * stride as u64, 4)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn read_u32s<const N: usize>(&self, buffer: DevicePtr, stride: u32, index: u32) -> DeviceResult<[u32; N]>
    where
        [u32; N]: bytemuck::Pod,
    {
        let bytes = self.read(buffer + index as u64 * stride as u64, 4 * N)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn primitive_bounds(&self, input: &BuildInput, out: &mut Vec<Aabb>) -> DeviceResult<()> {
        match input {
            BuildInput::Triangles(t) => {
                let count = if t.index_buffer != 0 { t.num_index_triplets } else { t.num_vertices / 3 };
                for prim in 0..count {
                    let tri = if t.index_buffer != 0 {
                        self.read_u32s::<3>(t.index_buffer, t.index_stride, prim)?
                    } else {
                        [prim * 3, prim * 3 + 1, prim * 3 + 2]
                    };
                    let mut aabb = Aabb::EMPTY;
                    for v in tri {
                        if v >= t.num_vertices {
                            return Err(DeviceError::BuildFailed(format!(
                                "triangle {prim} references vertex {v} of {}",
                                t.num_vertices
                            )));
                        }
                        aabb.grow_point(self.read_vec3(t.vertex_buffer, t.vertex_stride, v)?.to_array());
                    }
                    out.push(aabb);
                }
            }
            BuildInput::Curves(c) => {
                for prim in 0..c.num_primitives {
                    let [start] = self.read_u32s::<1>(c.index_buffer, c.index_stride, prim)?;
                    if start + 1 >= c.num_vertices {
                        return Err(DeviceError::BuildFailed(format!(
                            "curve segment {prim} starts at {start} of {} vertices",
                            c.num_vertices
                        )));
                    }
                    let mut aabb = Aabb::EMPTY;
                    let mut width = 0.0f32;
                    for v in [start, start + 1] {
                        aabb.grow_point(self.read_vec3(c.vertex_buffer, c.vertex_stride, v)?.to_array());
                        width = width.max(self.read_f32(c.width_buffer, c.width_stride, v)?);
                    }
                    for i in 0..3 {
                        aabb.min[i] -= width;
                        aabb.max[i] += width;
                    }
                    out.push(aabb);
                }
            }
            BuildInput::CustomPrimitives(c) => {
                for prim in 0..c.num_primitives {
                    let bytes = self.read(c.aabb_buffer + prim as u64 * c.stride as u64, 24)?;
                    let b: [f32; 6] = bytemuck::pod_read_unaligned(bytes);
                    out.push(Aabb {
                        min: [b[0], b[1], b[2]],
                        max: [b[3], b[4], b[5]],
                    });
                }
            }
            BuildInput::Instances(list) => {
                let size = std::mem::size_of::<AccelInstance>();
                for i in 0..list.num_instances {
                    let bytes = self.read(list.instances + (i as usize * size) as u64, size)?;
                    let inst: AccelInstance = bytemuck::pod_read_unaligned(bytes);
                    let child = self
                        .accels
                        .get(&inst.traversable)
                        .ok_or(DeviceError::InvalidTraversable(inst.traversable))?;
                    let b = child.info.bounds.transformed(&inst.matrix());
                    out.push(if b.is_empty() {
                        Aabb::EMPTY
                    } else {
                        Aabb {
                            min: b.min.to_array(),
                            max: b.max.to_array(),
                        }
                    });
                }
            }
        }
        Ok(())
    }
}

/// In-process [`Device`] implementation.
pub struct HostDevice {
    state: Mutex<HostState>,
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDevice {
    /// Device with unlimited memory.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HostState::new(None)),
        }
    }

    /// Device that refuses allocations beyond `budget` live bytes.
    pub fn with_budget(budget: usize) -> Self {
        Self {
            state: Mutex::new(HostState::new(Some(budget))),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            state: Mutex::new(HostState::new(settings.device_memory_budget)),
        }
    }

    /// Change the memory budget; `None` removes it.
    pub fn set_budget(&self, budget: Option<usize>) {
        self.state.lock().budget = budget;
    }

    /// Make every device-to-host copy fail until switched off again.
    pub fn set_fail_downloads(&self, fail: bool) {
        self.state.lock().fail_downloads = fail;
    }

    /// Node array of a built acceleration structure.
    pub fn bvh_nodes(&self, handle: TraversableHandle) -> Option<Vec<BvhNode>> {
        self.state.lock().accels.get(&handle).map(|a| a.bvh.nodes.clone())
    }
}

impl Device for HostDevice {
    fn name(&self) -> &str {
        "host"
    }

    fn allocate(&self, bytes: usize) -> DeviceResult<DevicePtr> {
        let mut s = self.state.lock();
        if let Some(budget) = s.budget {
            if s.allocated_bytes + bytes > budget {
                return Err(DeviceError::OutOfMemory {
                    requested: bytes,
                    available: budget.saturating_sub(s.allocated_bytes),
                });
            }
        }
        let reserved = (bytes as u64).max(1).div_ceil(ALIGNMENT) * ALIGNMENT;
        let ptr = s.reserve(reserved);
        s.blocks.insert(
            ptr,
            Block {
                data: vec![0; bytes],
                reserved,
            },
        );
        s.allocated_bytes += bytes;
        s.peak_bytes = s.peak_bytes.max(s.allocated_bytes);
        Ok(ptr)
    }

    fn free(&self, ptr: DevicePtr) -> DeviceResult<()> {
        let mut s = self.state.lock();
        let block = s.blocks.remove(&ptr).ok_or(DeviceError::InvalidPointer(ptr))?;
        s.allocated_bytes -= block.data.len();
        s.unreserve(ptr, block.reserved);
        Ok(())
    }

    fn upload(&self, dst: DevicePtr, data: &[u8]) -> DeviceResult<()> {
        let mut s = self.state.lock();
        let (base, offset) = s.locate(dst, data.len())?;
        if let Some(block) = s.blocks.get_mut(&base) {
            block.data[offset..offset + data.len()].copy_from_slice(data);
        }
        s.uploads += 1;
        s.uploaded_bytes += data.len() as u64;
        s.submit();
        Ok(())
    }

    fn download(&self, src: DevicePtr, out: &mut [u8]) -> DeviceResult<()> {
        let mut s = self.state.lock();
        if s.fail_downloads {
            return Err(DeviceError::TransferAborted(format!("download of {} bytes at {src:#x}", out.len())));
        }
        out.copy_from_slice(s.read(src, out.len())?);
        s.downloads += 1;
        // device-to-host copies drain the stream
        s.submit();
        s.completed_ops = s.submitted_ops;
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDesc, data: &[f32]) -> DeviceResult<TextureHandle> {
        if data.len() != desc.value_count() || !(1..=4).contains(&desc.channels) {
            return Err(DeviceError::InvalidTextureData {
                expected: desc.value_count(),
                actual: data.len(),
            });
        }
        let mut s = self.state.lock();
        let handle = s.texture_handles.acquire();
        s.textures.insert(handle, data.to_vec());
        s.submit();
        Ok(handle)
    }

    fn destroy_texture(&self, handle: TextureHandle) -> DeviceResult<()> {
        let mut s = self.state.lock();
        s.textures.remove(&handle).ok_or(DeviceError::InvalidTexture(handle))?;
        s.texture_handles.release(handle);
        Ok(())
    }

    fn read_texture(&self, handle: TextureHandle) -> DeviceResult<Vec<f32>> {
        let s = self.state.lock();
        s.textures
            .get(&handle)
            .cloned()
            .ok_or(DeviceError::InvalidTexture(handle))
    }

    fn build_accel(&self, inputs: &[BuildInput]) -> DeviceResult<TraversableHandle> {
        if inputs.is_empty() {
            return Err(DeviceError::BuildFailed("no build inputs".into()));
        }
        let instance_inputs = inputs.iter().filter(|i| matches!(i, BuildInput::Instances(_))).count();
        if instance_inputs != 0 && instance_inputs != inputs.len() {
            return Err(DeviceError::BuildFailed("instance and geometry inputs cannot be mixed".into()));
        }

        let mut s = self.state.lock();
        let mut aabbs = Vec::new();
        for input in inputs {
            s.primitive_bounds(input, &mut aabbs)?;
        }
        let bvh = build_bvh(&aabbs);
        let root = bvh.bounds();
        let bounds = if root.is_empty() {
            Box3::EMPTY
        } else {
            Box3::new(Vec3::from_array(root.min), Vec3::from_array(root.max))
        };
        let info = AccelInfo {
            num_primitives: aabbs.len() as u32,
            num_nodes: bvh.nodes.len() as u32,
            bounds,
            is_instance: instance_inputs != 0,
        };

        let handle = s.accel_handles.acquire();
        s.accels.insert(handle, Accel { info, bvh });
        s.submit();
        tracing::trace!(handle, prims = info.num_primitives, "built acceleration structure");
        Ok(handle)
    }

    fn destroy_accel(&self, handle: TraversableHandle) -> DeviceResult<()> {
        let mut s = self.state.lock();
        s.accels.remove(&handle).ok_or(DeviceError::InvalidTraversable(handle))?;
        s.accel_handles.release(handle);
        Ok(())
    }

    fn accel_info(&self, handle: TraversableHandle) -> DeviceResult<AccelInfo> {
        let s = self.state.lock();
        s.accels
            .get(&handle)
            .map(|a| a.info)
            .ok_or(DeviceError::InvalidTraversable(handle))
    }

    fn synchronize(&self) -> DeviceResult<()> {
        let mut s = self.state.lock();
        s.completed_ops = s.submitted_ops;
        Ok(())
    }

    fn stats(&self) -> DeviceStats {
        let s = self.state.lock();
        DeviceStats {
            live_allocations: s.blocks.len(),
            allocated_bytes: s.allocated_bytes,
            peak_bytes: s.peak_bytes,
            live_textures: s.textures.len(),
            live_accels: s.accels.len(),
            uploads: s.uploads,
            uploaded_bytes: s.uploaded_bytes,
            downloads: s.downloads,
            submitted_ops: s.submitted_ops,
            completed_ops: s.completed_ops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::{CustomPrimitiveArrayInput, GeometryFlags, InstanceArrayInput, TriangleArrayInput};
    use crate::device::{TextureFilter, WrapMode};
    use crate::util::Mat4;

    #[test]
    fn test_address_reuse_after_free() {
        let dev = HostDevice::new();
        let a = dev.allocate(100).unwrap();
        let b = dev.allocate(300).unwrap();
        assert_eq!(a, BASE_ADDRESS);
        assert_eq!(b, BASE_ADDRESS + 256);

        dev.free(a).unwrap();
        dev.free(b).unwrap();
        assert_eq!(dev.allocate(100).unwrap(), a);
        assert_eq!(dev.allocate(300).unwrap(), b);
    }

    #[test]
    fn test_free_coalesces_neighbors() {
        let dev = HostDevice::new();
        let a = dev.allocate(256).unwrap();
        let b = dev.allocate(256).unwrap();
        let _c = dev.allocate(256).unwrap();
        dev.free(a).unwrap();
        dev.free(b).unwrap();
        // merged hole fits a block twice the size
        assert_eq!(dev.allocate(512).unwrap(), a);
    }

    #[test]
    fn test_budget() {
        let dev = HostDevice::with_budget(1000);
        let a = dev.allocate(800).unwrap();
        let err = dev.allocate(400).unwrap_err();
        assert_eq!(
            err,
            DeviceError::OutOfMemory {
                requested: 400,
                available: 200
            }
        );
        dev.free(a).unwrap();
        assert!(dev.allocate(400).is_ok());
    }

    #[test]
    fn test_failed_downloads() {
        let dev = HostDevice::new();
        let p = dev.allocate(8).unwrap();
        dev.upload(p, &[1; 8]).unwrap();
        dev.set_fail_downloads(true);
        let mut out = [0u8; 8];
        assert!(matches!(dev.download(p, &mut out), Err(DeviceError::TransferAborted(_))));
        assert_eq!(out, [0; 8]);

        dev.set_fail_downloads(false);
        dev.download(p, &mut out).unwrap();
        assert_eq!(out, [1; 8]);
    }

    #[test]
    fn test_upload_inside_allocation() {
        let dev = HostDevice::new();
        let p = dev.allocate(16).unwrap();
        dev.upload(p + 4, &[9, 9]).unwrap();
        let mut out = [0u8; 8];
        dev.download(p, &mut out).unwrap();
        assert_eq!(out, [0, 0, 0, 0, 9, 9, 0, 0]);
        assert!(matches!(dev.upload(p + 15, &[1, 2]), Err(DeviceError::OutOfBounds { .. })));
        assert!(matches!(dev.upload(0x10, &[1]), Err(DeviceError::InvalidPointer(0x10))));
    }

    #[test]
    fn test_synchronize_completes_ops() {
        let dev = HostDevice::new();
        let p = dev.allocate(4).unwrap();
        dev.upload(p, &[1, 2, 3, 4]).unwrap();
        assert_eq!(dev.stats().pending_ops(), 1);
        dev.synchronize().unwrap();
        assert_eq!(dev.stats().pending_ops(), 0);
    }

    #[test]
    fn test_texture_handles() {
        let dev = HostDevice::new();
        let desc = TextureDesc {
            dims: [2, 1, 1],
            channels: 1,
            filter: TextureFilter::Linear,
            wrap: [WrapMode::Clamp; 3],
            normalized_coords: true,
        };
        let t = dev.create_texture(&desc, &[0.25, 0.5]).unwrap();
        assert_eq!(dev.read_texture(t).unwrap(), vec![0.25, 0.5]);
        assert!(matches!(
            dev.create_texture(&desc, &[0.0]),
            Err(DeviceError::InvalidTextureData { expected: 2, actual: 1 })
        ));
        dev.destroy_texture(t).unwrap();
        assert_eq!(dev.create_texture(&desc, &[1.0, 1.0]).unwrap(), t);
    }

    #[test]
    fn test_triangle_and_instance_build() {
        let dev = HostDevice::new();
        let verts: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 2.0, 0.0]];
        let vb = dev.allocate(36).unwrap();
        dev.upload(vb, bytemuck::cast_slice(&verts)).unwrap();

        let blas = dev
            .build_accel(&[BuildInput::Triangles(TriangleArrayInput {
                vertex_buffer: vb,
                vertex_stride: 12,
                num_vertices: 3,
                index_buffer: 0,
                index_stride: 0,
                num_index_triplets: 0,
                flags: GeometryFlags::NONE,
                num_sbt_records: 1,
            })])
            .unwrap();
        let info = dev.accel_info(blas).unwrap();
        assert_eq!(info.num_primitives, 1);
        assert_eq!(dev.bvh_nodes(blas).map(|n| n.len()), Some(1));
        assert_eq!(info.bounds.max, Vec3::new(1.0, 2.0, 0.0));

        let inst = AccelInstance::new(&Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)), 0, 0, blas);
        let ib = dev.allocate(std::mem::size_of::<AccelInstance>()).unwrap();
        dev.upload(ib, bytemuck::bytes_of(&inst)).unwrap();
        let tlas = dev
            .build_accel(&[BuildInput::Instances(InstanceArrayInput {
                instances: ib,
                num_instances: 1,
            })])
            .unwrap();
        let info = dev.accel_info(tlas).unwrap();
        assert!(info.is_instance);
        assert_eq!(info.bounds.min.x, 10.0);
        assert_eq!(info.bounds.max.x, 11.0);
    }

    #[test]
    fn test_build_rejects_bad_inputs() {
        let dev = HostDevice::new();
        assert!(matches!(dev.build_accel(&[]), Err(DeviceError::BuildFailed(_))));

        let ab = dev.allocate(24).unwrap();
        dev.upload(ab, bytemuck::cast_slice(&[0.0f32, 0.0, 0.0, 1.0, 1.0, 1.0])).unwrap();
        let custom = BuildInput::CustomPrimitives(CustomPrimitiveArrayInput {
            aabb_buffer: ab,
            stride: 24,
            num_primitives: 1,
            flags: GeometryFlags::NONE,
            num_sbt_records: 1,
        });
        let instances = BuildInput::Instances(InstanceArrayInput {
            instances: 0,
            num_instances: 0,
        });
        assert!(matches!(dev.build_accel(&[custom.clone(), instances]), Err(DeviceError::BuildFailed(_))));
        assert!(dev.build_accel(&[custom]).is_ok());
    }
}
