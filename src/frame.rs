//! Frames: framebuffers plus per-frame assembly of everything the kernels
//! read.
//!
//! Commit validates the world, camera and renderer references and allocates
//! the requested framebuffer channels. [`Frame::prepare`] then settles
//! pending recommits, walks the world to build the object registry and the
//! per-instance index lists, uploads one [`FrameGpuData`] and waits for the
//! device stream.

use glam::UVec2;
use parking_lot::RwLock;
use std::sync::Arc;

use gpu_objects::{
    DeviceObjectIndex, DevicePtr, FrameBuffers, FrameFormat, FrameGpuData, FramebufferGpuData, InstanceLightGpuData,
    InstanceSurfaceGpuData, InstanceVolumeGpuData, WorldGpuData, INVALID_INDEX,
};

use crate::array::HostDeviceBuffer;
use crate::core::{CommitScope, DeviceContext, ObjectHeader, SceneObject};
use crate::device::{Device, DeviceAllocation};
use crate::registry::{ObjectRegistry, RegistryBuilder};
use crate::scene::{Camera, Renderer, World};
use crate::util::{DataType, Error, Result};

/// Output format selected by a `channel.color` element type.
pub fn color_format(dt: DataType) -> FrameFormat {
    if dt == DataType::FLOAT32_VEC4 {
        FrameFormat::Float
    } else if dt == DataType::UFIXED8_VEC4 {
        FrameFormat::Uint
    } else if dt == DataType::UFIXED8_RGBA_SRGB {
        FrameFormat::Srgb
    } else {
        FrameFormat::Unknown
    }
}

/// Bytes per pixel of the color output buffer.
fn color_pixel_bytes(format: FrameFormat) -> usize {
    match format {
        FrameFormat::Float => 16,
        _ => 4,
    }
}

/// Which optional channels a frame writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Channels {
    pub depth: bool,
    pub primitive_id: bool,
    pub object_id: bool,
    pub instance_id: bool,
    pub albedo: bool,
    pub normal: bool,
}

impl Channels {
    fn from_params(scope: &CommitScope<'_>) -> Self {
        let params = scope.params();
        Self {
            depth: params.get_or("channel.depth", false),
            primitive_id: params.get_or("channel.primitiveId", false),
            object_id: params.get_or("channel.objectId", false),
            instance_id: params.get_or("channel.instanceId", false),
            albedo: params.get_or("channel.albedo", false),
            normal: params.get_or("channel.normal", false),
        }
    }
}

/// Framebuffer allocations; dropping it frees every channel.
struct Framebuffer {
    buffers: FrameBuffers,
    _allocations: Vec<DeviceAllocation>,
}

impl Framebuffer {
    #[tracing::instrument(skip(device), fields(w = size.x, h = size.y))]
    fn allocate(device: &Arc<dyn Device>, size: UVec2, format: FrameFormat, channels: Channels) -> Result<Self> {
        let pixels = size.x as usize * size.y as usize;
        let mut allocations = Vec::new();
        let mut alloc = |enabled: bool, pixel_bytes: usize| -> Result<DevicePtr> {
            if !enabled {
                return Ok(0);
            }
            let a = DeviceAllocation::new(device, pixels * pixel_bytes)?;
            let ptr = a.ptr();
            allocations.push(a);
            Ok(ptr)
        };

        let buffers = FrameBuffers {
            accum_color: alloc(true, 16)?,
            out_color: alloc(true, color_pixel_bytes(format))?,
            accum_albedo: alloc(channels.albedo, 12)?,
            out_albedo: alloc(channels.albedo, 12)?,
            accum_normal: alloc(channels.normal, 12)?,
            out_normal: alloc(channels.normal, 12)?,
            depth: alloc(channels.depth, 4)?,
            primitive_id: alloc(channels.primitive_id, 4)?,
            object_id: alloc(channels.object_id, 4)?,
            instance_id: alloc(channels.instance_id, 4)?,
        };
        Ok(Self {
            buffers,
            _allocations: allocations,
        })
    }
}

/// Everything one `prepare` uploaded.
struct PreparedFrame {
    gpu: FrameGpuData,
    registry: ObjectRegistry,
    _camera: DeviceAllocation,
    _index_lists: Vec<HostDeviceBuffer<DeviceObjectIndex>>,
    _surface_instances: HostDeviceBuffer<InstanceSurfaceGpuData>,
    _volume_instances: HostDeviceBuffer<InstanceVolumeGpuData>,
    _light_instances: HostDeviceBuffer<InstanceLightGpuData>,
    frame_data: DeviceAllocation,
}

struct FrameState {
    world: Arc<World>,
    camera: Arc<Camera>,
    renderer: Arc<Renderer>,
    size: UVec2,
    format: FrameFormat,
    checkerboard: bool,
    framebuffer: Framebuffer,
    /// Frames prepared since the last commit, `-1` before the first.
    frame_id: i32,
    prepared: Option<PreparedFrame>,
}

pub struct Frame {
    header: ObjectHeader,
    committed: RwLock<Option<FrameState>>,
}

/// Index lists of one world entry, invalid members dropped.
struct EntryIndices {
    id: u32,
    surfaces: Vec<DeviceObjectIndex>,
    volumes: Vec<DeviceObjectIndex>,
    lights: Vec<DeviceObjectIndex>,
}

fn valid_indices(
    registry: &mut RegistryBuilder,
    count: usize,
    mut resolve: impl FnMut(&mut RegistryBuilder, usize) -> Result<DeviceObjectIndex>,
) -> Result<Vec<DeviceObjectIndex>> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let index = resolve(registry, i)?;
        if index != INVALID_INDEX {
            out.push(index);
        }
    }
    Ok(out)
}

impl Frame {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            committed: RwLock::new(None),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&FrameState) -> Result<R>) -> Result<R> {
        self.header.ensure_committed()?;
        match self.committed.read().as_ref() {
            Some(s) => f(s),
            None => Err(Error::NotValid {
                kind: self.header.kind(),
                id: self.header.id(),
            }),
        }
    }

    pub fn size(&self) -> Result<UVec2> {
        self.with_state(|s| Ok(s.size))
    }

    pub fn format(&self) -> Result<FrameFormat> {
        self.with_state(|s| Ok(s.format))
    }

    pub fn buffers(&self) -> Result<FrameBuffers> {
        self.with_state(|s| Ok(s.framebuffer.buffers))
    }

    /// `-1` until the first [`prepare`](Self::prepare) after a commit.
    pub fn frame_id(&self) -> Result<i32> {
        self.with_state(|s| Ok(s.frame_id))
    }

    /// Aggregate uploaded by the last `prepare`.
    pub fn gpu_data(&self) -> Result<FrameGpuData> {
        self.with_state(|s| s.prepared.as_ref().map(|p| p.gpu).ok_or_else(|| self.not_prepared()))
    }

    /// Device address of the uploaded aggregate.
    pub fn gpu_data_ptr(&self) -> Result<DevicePtr> {
        self.with_state(|s| {
            s.prepared
                .as_ref()
                .map(|p| p.frame_data.ptr())
                .ok_or_else(|| self.not_prepared())
        })
    }

    /// Run `f` on the registry built by the last `prepare`.
    pub fn with_registry<R>(&self, f: impl FnOnce(&ObjectRegistry) -> R) -> Result<R> {
        self.with_state(|s| s.prepared.as_ref().map(|p| f(&p.registry)).ok_or_else(|| self.not_prepared()))
    }

    fn not_prepared(&self) -> Error {
        Error::other(format!("frame #{} has not been prepared", self.header.id()))
    }

    /// Assemble and upload the data for the next frame.
    ///
    /// Pending recommits are flushed first, so the frame sees every change
    /// made since the last call. Returns the uploaded aggregate.
    #[tracing::instrument(skip_all, fields(id = %self.header.id()))]
    pub fn prepare(&self, ctx: &DeviceContext) -> Result<FrameGpuData> {
        let flushed = ctx.flush_commits()?;
        self.header.ensure_committed()?;
        let device = ctx.device();

        let mut guard = self.committed.write();
        let state = guard.as_mut().ok_or(Error::NotValid {
            kind: self.header.kind(),
            id: self.header.id(),
        })?;
        state.prepared = None;

        let mut registry = RegistryBuilder::new();
        let mut entries = Vec::new();
        state.world.for_each_entry(|entry| {
            let c = entry.contents;
            entries.push(EntryIndices {
                id: entry.id,
                surfaces: valid_indices(&mut registry, c.surfaces().len(), |r, i| r.surface(&c.surfaces()[i]))?,
                volumes: valid_indices(&mut registry, c.volumes().len(), |r, i| r.volume(&c.volumes()[i]))?,
                lights: valid_indices(&mut registry, c.lights().len(), |r, i| r.light(&c.lights()[i]))?,
            });
            Ok(())
        })?;
        let renderer = state.renderer.gpu_data(&mut registry)?;
        let camera = DeviceAllocation::with_data(device, bytemuck::bytes_of(&state.camera.gpu_data()?))?;

        let mut index_lists = Vec::with_capacity(entries.len() * 3);
        let mut surface_instances = Vec::new();
        let mut volume_instances = Vec::new();
        let mut light_instances = Vec::new();
        for e in entries {
            let (num_surfaces, num_volumes, num_lights) = (e.surfaces.len(), e.volumes.len(), e.lights.len());
            let surfaces = HostDeviceBuffer::uploaded(e.surfaces, device)?;
            let volumes = HostDeviceBuffer::uploaded(e.volumes, device)?;
            let lights = HostDeviceBuffer::uploaded(e.lights, device)?;
            if num_surfaces > 0 {
                surface_instances.push(InstanceSurfaceGpuData {
                    surfaces: surfaces.ptr(),
                    num_surfaces: num_surfaces as u32,
                    id: e.id,
                });
            }
            if num_volumes > 0 {
                volume_instances.push(InstanceVolumeGpuData {
                    volumes: volumes.ptr(),
                    num_volumes: num_volumes as u32,
                    id: e.id,
                });
            }
            if num_lights > 0 {
                light_instances.push(InstanceLightGpuData {
                    indices: lights.ptr(),
                    num_lights: num_lights as u32,
                    id: e.id,
                });
            }
            index_lists.extend([surfaces, volumes, lights]);
        }
        let surface_instances = HostDeviceBuffer::uploaded(surface_instances, device)?;
        let volume_instances = HostDeviceBuffer::uploaded(volume_instances, device)?;
        let light_instances = HostDeviceBuffer::uploaded(light_instances, device)?;

        let world = WorldGpuData {
            surface_instances: surface_instances.ptr(),
            volume_instances: volume_instances.ptr(),
            light_instances: light_instances.ptr(),
            num_surface_instances: surface_instances.len() as u32,
            num_volume_instances: volume_instances.len() as u32,
            num_light_instances: light_instances.len() as u32,
            _pad: 0,
            surfaces_traversable: state.world.surfaces_traversable()?,
            volumes_traversable: state.world.volumes_traversable()?,
        };
        let registry = registry.upload(device)?;

        state.frame_id += 1;
        let frame_id = state.frame_id;
        let size = state.size;
        let fb = FramebufferGpuData {
            buffers: state.framebuffer.buffers,
            frame_id,
            checkerboard_id: if state.checkerboard { frame_id % 4 } else { -1 },
            inv_frame_id: 1.0 / (frame_id + 1) as f32,
            format: state.format as u32,
            size: size.to_array(),
            inv_size: [1.0 / size.x as f32, 1.0 / size.y as f32],
        };
        let gpu = FrameGpuData {
            fb,
            renderer,
            world,
            camera: camera.ptr(),
            registry: registry.gpu_data(),
        };
        let frame_data = DeviceAllocation::with_data(device, bytemuck::bytes_of(&gpu))?;
        // kernels may only launch once every upload above has landed
        device.synchronize()?;
        tracing::debug!(frame_id, flushed, instances = world.num_surface_instances, "frame prepared");

        state.prepared = Some(PreparedFrame {
            gpu,
            registry,
            _camera: camera,
            _index_lists: index_lists,
            _surface_instances: surface_instances,
            _volume_instances: volume_instances,
            _light_instances: light_instances,
            frame_data,
        });
        Ok(gpu)
    }
}

impl SceneObject for Frame {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |scope| {
            let world = scope.require_object::<World>("world");
            let camera = scope.require_object::<Camera>("camera");
            let renderer = scope.require_object::<Renderer>("renderer");
            let (Some(world), Some(camera), Some(renderer)) = (world, camera, renderer) else {
                return Ok(None);
            };

            let size = scope.params().get_or("size", UVec2::ZERO);
            if size.x == 0 || size.y == 0 {
                scope.error(format!("'size' must be non-zero, got {size}"));
                return Ok(None);
            }
            let color_type = scope.params().string("channel.color", "FLOAT32_VEC4");
            let format = color_format(DataType::from_name(&color_type));
            if format == FrameFormat::Unknown {
                scope.error(format!("unsupported 'channel.color' type {color_type}"));
                return Ok(None);
            }
            let channels = Channels::from_params(scope);
            let framebuffer = Framebuffer::allocate(scope.device(), size, format, channels)?;

            Ok(Some(FrameState {
                world,
                camera,
                renderer,
                size,
                format,
                checkerboard: scope.params().get_or("checkerboarding", false),
                framebuffer,
                frame_id: -1,
                prepared: None,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::core::{CollectingSink, Severity};

    fn context() -> (DeviceContext, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        (DeviceContext::host(Settings::default()).with_sink(sink.clone()), sink)
    }

    fn frame(ctx: &DeviceContext) -> Arc<Frame> {
        let world = ctx.new_world();
        world.commit(ctx).unwrap();
        let camera = ctx.new_camera("perspective");
        camera.commit(ctx).unwrap();
        let renderer = ctx.new_renderer("default");
        renderer.commit(ctx).unwrap();
        let f = ctx.new_frame();
        f.set_param("world", &world);
        f.set_param("camera", &camera);
        f.set_param("renderer", &renderer);
        f.set_param("size", UVec2::new(4, 2));
        f
    }

    #[test]
    fn test_color_formats() {
        assert_eq!(color_format(DataType::FLOAT32_VEC4), FrameFormat::Float);
        assert_eq!(color_format(DataType::UFIXED8_VEC4), FrameFormat::Uint);
        assert_eq!(color_format(DataType::UFIXED8_RGBA_SRGB), FrameFormat::Srgb);
        assert_eq!(color_format(DataType::FLOAT32), FrameFormat::Unknown);
    }

    #[test]
    fn test_channels_allocated_on_commit() {
        let (ctx, _) = context();
        let f = frame(&ctx);
        f.set_param("channel.color", "UFIXED8_RGBA_SRGB");
        f.set_param("channel.depth", true);
        f.commit(&ctx).unwrap();
        assert!(f.is_valid());
        assert_eq!(f.format().unwrap(), FrameFormat::Srgb);

        let b = f.buffers().unwrap();
        assert_ne!(b.out_color, 0);
        assert_ne!(b.depth, 0);
        assert_eq!(b.primitive_id, 0);
        assert_eq!(b.accum_albedo, 0);
        assert_eq!(ctx.stats().live_allocations, 3);

        f.commit(&ctx).unwrap();
        assert_eq!(ctx.stats().live_allocations, 3);
    }

    #[test]
    fn test_frame_id_advances_and_resets() {
        let (ctx, _) = context();
        let f = frame(&ctx);
        f.commit(&ctx).unwrap();
        assert_eq!(f.frame_id().unwrap(), -1);
        assert!(f.gpu_data().is_err());

        let first = f.prepare(&ctx).unwrap();
        assert_eq!(first.fb.frame_id, 0);
        assert_eq!(first.fb.inv_frame_id, 1.0);
        assert_eq!(first.fb.checkerboard_id, -1);
        assert_eq!(first.fb.size, [4, 2]);
        assert_eq!(first.fb.inv_size, [0.25, 0.5]);

        let second = f.prepare(&ctx).unwrap();
        assert_eq!(second.fb.frame_id, 1);
        assert_eq!(second.fb.inv_frame_id, 0.5);
        assert_eq!(ctx.stats().pending_ops(), 0);

        let uploaded: Vec<FrameGpuData> = ctx.download_vec(f.gpu_data_ptr().unwrap(), 1).unwrap();
        assert_eq!(uploaded[0], second);

        f.commit(&ctx).unwrap();
        assert_eq!(f.frame_id().unwrap(), -1);
    }

    #[test]
    fn test_missing_references_and_bad_size() {
        let (ctx, sink) = context();
        let f = ctx.new_frame();
        f.commit(&ctx).unwrap();
        assert!(!f.is_valid());
        assert!(sink.has(f.id(), Severity::Warning, "'world'"));
        assert!(sink.has(f.id(), Severity::Warning, "'camera'"));
        assert!(sink.has(f.id(), Severity::Warning, "'renderer'"));

        let f = frame(&ctx);
        f.set_param("size", UVec2::new(0, 8));
        f.commit(&ctx).unwrap();
        assert!(sink.has(f.id(), Severity::Error, "'size'"));
        assert!(matches!(f.prepare(&ctx), Err(Error::NotValid { .. })));
    }

    #[test]
    fn test_unknown_color_type() {
        let (ctx, sink) = context();
        let f = frame(&ctx);
        f.set_param("channel.color", "FLOAT32");
        f.commit(&ctx).unwrap();
        assert!(!f.is_valid());
        assert!(sink.has(f.id(), Severity::Error, "channel.color"));
        assert_eq!(ctx.stats().live_allocations, 0);
    }
}
