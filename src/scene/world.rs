//! Worlds: instances plus the implicit zero instance.
//!
//! Surfaces, volumes and lights set directly on a world form an unnamed
//! group placed with the identity transform. It is iterated after every
//! explicit instance, and only when it has members. Instance-level
//! structures are built over the same order, so an instance record's
//! `instance_id` is the position of its entry in that iteration.

use glam::Mat4;
use parking_lot::RwLock;
use std::sync::Arc;

use gpu_objects::TraversableHandle;

use super::{GroupContents, Instance};
use crate::accel::{AccelInstance, BuildInput, InstanceArrayInput};
use crate::array::HostDeviceBuffer;
use crate::core::{DeviceContext, ObjectHeader, SceneObject};
use crate::device::{Device, DeviceAccel};
use crate::util::{Box3, Error, Result};

/// One placed group as seen while iterating a world.
pub struct WorldEntry<'a> {
    /// Position in iteration order.
    pub index: u32,
    /// User id, `u32::MAX` when unset.
    pub id: u32,
    pub transform: Mat4,
    pub contents: &'a GroupContents,
}

/// Instance records and the structure built over them.
struct InstanceLevel {
    _records: HostDeviceBuffer<AccelInstance>,
    accel: Option<DeviceAccel>,
}

impl InstanceLevel {
    fn build(device: &Arc<dyn Device>, records: Vec<AccelInstance>) -> Result<Self> {
        let records = HostDeviceBuffer::uploaded(records, device)?;
        let accel = if records.is_empty() {
            None
        } else {
            let input = BuildInput::Instances(InstanceArrayInput {
                instances: records.ptr(),
                num_instances: records.len() as u32,
            });
            Some(DeviceAccel::build(device, &[input])?)
        };
        Ok(Self {
            _records: records,
            accel,
        })
    }

    fn traversable(&self) -> TraversableHandle {
        self.accel.as_ref().map_or(0, DeviceAccel::handle)
    }
}

struct WorldState {
    instances: Vec<Arc<Instance>>,
    zero: GroupContents,
    surfaces: InstanceLevel,
    volumes: InstanceLevel,
    bounds: Box3,
}

impl WorldState {
    fn visit(&self, f: &mut dyn FnMut(WorldEntry<'_>) -> Result<()>) -> Result<()> {
        visit_entries(&self.instances, &self.zero, f)
    }
}

/// Iterate `instances` in order, then `zero` when it has members.
fn visit_entries(
    instances: &[Arc<Instance>],
    zero: &GroupContents,
    f: &mut dyn FnMut(WorldEntry<'_>) -> Result<()>,
) -> Result<()> {
    for (index, inst) in instances.iter().enumerate() {
        let transform = inst.transform()?;
        let id = inst.user_id()?;
        inst.group()?.with_contents(|contents| {
            f(WorldEntry {
                index: index as u32,
                id,
                transform,
                contents,
            })
        })??;
    }
    if !zero.is_empty() {
        f(WorldEntry {
            index: instances.len() as u32,
            id: u32::MAX,
            transform: Mat4::IDENTITY,
            contents: zero,
        })?;
    }
    Ok(())
}

pub struct World {
    header: ObjectHeader,
    committed: RwLock<Option<WorldState>>,
}

impl World {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            committed: RwLock::new(None),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&WorldState) -> Result<R>) -> Result<R> {
        self.header.ensure_committed()?;
        match self.committed.read().as_ref() {
            Some(s) => f(s),
            None => Err(Error::NotValid {
                kind: self.header.kind(),
                id: self.header.id(),
            }),
        }
    }

    /// Call `f` for every placed group, explicit instances first.
    pub fn for_each_entry(&self, mut f: impl FnMut(WorldEntry<'_>) -> Result<()>) -> Result<()> {
        self.with_state(|s| s.visit(&mut f))
    }

    /// Number of entries [`for_each_entry`](Self::for_each_entry) visits.
    pub fn num_entries(&self) -> Result<usize> {
        self.with_state(|s| Ok(s.instances.len() + usize::from(!s.zero.is_empty())))
    }

    pub fn surfaces_traversable(&self) -> Result<TraversableHandle> {
        self.with_state(|s| Ok(s.surfaces.traversable()))
    }

    pub fn volumes_traversable(&self) -> Result<TraversableHandle> {
        self.with_state(|s| Ok(s.volumes.traversable()))
    }

    pub fn bounds(&self) -> Result<Box3> {
        self.with_state(|s| Ok(s.bounds))
    }
}

impl SceneObject for World {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |scope| {
            let instances = scope.valid_objects::<Instance>("instance");
            let zero = GroupContents::from_params(scope)?;

            let mut surface_records = Vec::new();
            let mut volume_records = Vec::new();
            let mut bounds = Box3::EMPTY;
            visit_entries(&instances, &zero, &mut |entry| {
                let c = entry.contents;
                for class in c.surface_accels() {
                    surface_records.push(AccelInstance::new(
                        &entry.transform,
                        entry.index,
                        class.sbt_offset,
                        class.traversable(),
                    ));
                }
                if c.volume_traversable() != 0 {
                    volume_records.push(AccelInstance::new(&entry.transform, entry.index, 0, c.volume_traversable()));
                }
                bounds.expand_by_box(&c.bounds().transformed(&entry.transform));
                Ok(())
            })?;

            let device = scope.device();
            tracing::debug!(
                instances = instances.len(),
                surface_records = surface_records.len(),
                volume_records = volume_records.len(),
                "building world"
            );
            Ok(Some(WorldState {
                surfaces: InstanceLevel::build(device, surface_records)?,
                volumes: InstanceLevel::build(device, volume_records)?,
                instances,
                zero,
                bounds,
            }))
        })
    }
}
