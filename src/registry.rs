//! Frame object registry.
//!
//! Snapshots reference other objects by [`DeviceObjectIndex`]. A
//! [`RegistryBuilder`] hands out those indices per kind in first-seen order
//! while a frame walks its world, collects the snapshots in the same order,
//! and finally uploads one flat array per kind. Walking the same scene twice
//! yields the same indices.
//!
//! Invalid objects never enter the registry; references to them resolve to
//! [`INVALID_INDEX`].

use bytemuck::Pod;
use std::collections::HashMap;
use std::sync::Arc;

use gpu_objects::{
    DeviceObjectIndex, GeometryGpuData, LightGpuData, MaterialGpuData, ObjectRegistryGpuData, SamplerGpuData,
    SpatialFieldGpuData, SurfaceGpuData, VolumeGpuData, INVALID_INDEX,
};

use crate::array::HostDeviceBuffer;
use crate::core::{ObjectId, SceneObject};
use crate::device::Device;
use crate::scene::{Geometry, Light, Material, Sampler, SpatialField, Surface, Volume};
use crate::util::Result;

/// Snapshots of one kind plus the index of every object already added.
struct Table<T> {
    index: HashMap<ObjectId, DeviceObjectIndex>,
    data: Vec<T>,
}

impl<T: Pod> Table<T> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            data: Vec::new(),
        }
    }

    #[inline]
    fn get(&self, id: ObjectId) -> Option<DeviceObjectIndex> {
        self.index.get(&id).copied()
    }

    fn push(&mut self, id: ObjectId, snapshot: T) -> DeviceObjectIndex {
        let i = self.data.len() as DeviceObjectIndex;
        self.data.push(snapshot);
        self.index.insert(id, i);
        i
    }

    fn upload(self, device: &Arc<dyn Device>) -> Result<HostDeviceBuffer<T>> {
        HostDeviceBuffer::uploaded(self.data, device)
    }
}

/// Looks up `obj` in `table`, or snapshots and appends it.
macro_rules! resolve {
    ($self:ident . $table:ident, $obj:expr, $snapshot:expr) => {{
        let obj = $obj;
        if !obj.is_valid() {
            tracing::trace!(id = %obj.id(), kind = %obj.kind(), "invalid object left out of registry");
            return Ok(INVALID_INDEX);
        }
        if let Some(i) = $self.$table.get(obj.id()) {
            return Ok(i);
        }
        let snapshot = $snapshot;
        Ok($self.$table.push(obj.id(), snapshot))
    }};
}

/// Collects snapshots and assigns indices during frame assembly.
pub struct RegistryBuilder {
    samplers: Table<SamplerGpuData>,
    geometries: Table<GeometryGpuData>,
    materials: Table<MaterialGpuData>,
    surfaces: Table<SurfaceGpuData>,
    lights: Table<LightGpuData>,
    fields: Table<SpatialFieldGpuData>,
    volumes: Table<VolumeGpuData>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            samplers: Table::new(),
            geometries: Table::new(),
            materials: Table::new(),
            surfaces: Table::new(),
            lights: Table::new(),
            fields: Table::new(),
            volumes: Table::new(),
        }
    }

    pub fn sampler(&mut self, sampler: &Arc<Sampler>) -> Result<DeviceObjectIndex> {
        resolve!(self.samplers, sampler, sampler.gpu_data()?)
    }

    pub fn geometry(&mut self, geometry: &Arc<Geometry>) -> Result<DeviceObjectIndex> {
        resolve!(self.geometries, geometry, geometry.gpu_data()?)
    }

    /// Samplers referenced by the material are added first.
    pub fn material(&mut self, material: &Arc<Material>) -> Result<DeviceObjectIndex> {
        resolve!(self.materials, material, material.gpu_data(self)?)
    }

    /// Adds the surface's geometry and material before the surface itself.
    pub fn surface(&mut self, surface: &Arc<Surface>) -> Result<DeviceObjectIndex> {
        resolve!(self.surfaces, surface, surface.gpu_data(self)?)
    }

    pub fn light(&mut self, light: &Arc<Light>) -> Result<DeviceObjectIndex> {
        resolve!(self.lights, light, light.gpu_data()?)
    }

    pub fn field(&mut self, field: &Arc<SpatialField>) -> Result<DeviceObjectIndex> {
        resolve!(self.fields, field, field.gpu_data()?)
    }

    pub fn volume(&mut self, volume: &Arc<Volume>) -> Result<DeviceObjectIndex> {
        resolve!(self.volumes, volume, volume.gpu_data(self)?)
    }

    /// Upload every table. The returned registry owns the device arrays.
    #[tracing::instrument(skip_all)]
    pub fn upload(self, device: &Arc<dyn Device>) -> Result<ObjectRegistry> {
        let mut index = HashMap::new();
        for table in [
            &self.samplers.index,
            &self.geometries.index,
            &self.materials.index,
            &self.surfaces.index,
            &self.lights.index,
            &self.fields.index,
            &self.volumes.index,
        ] {
            index.extend(table.iter().map(|(&id, &i)| (id, i)));
        }

        let registry = ObjectRegistry {
            samplers: self.samplers.upload(device)?,
            geometries: self.geometries.upload(device)?,
            materials: self.materials.upload(device)?,
            surfaces: self.surfaces.upload(device)?,
            lights: self.lights.upload(device)?,
            fields: self.fields.upload(device)?,
            volumes: self.volumes.upload(device)?,
            index,
        };
        tracing::debug!(
            samplers = registry.samplers.len(),
            geometries = registry.geometries.len(),
            materials = registry.materials.len(),
            surfaces = registry.surfaces.len(),
            lights = registry.lights.len(),
            fields = registry.fields.len(),
            volumes = registry.volumes.len(),
            "uploaded object registry"
        );
        Ok(registry)
    }
}

/// Uploaded snapshot arrays of one frame.
pub struct ObjectRegistry {
    samplers: HostDeviceBuffer<SamplerGpuData>,
    geometries: HostDeviceBuffer<GeometryGpuData>,
    materials: HostDeviceBuffer<MaterialGpuData>,
    surfaces: HostDeviceBuffer<SurfaceGpuData>,
    lights: HostDeviceBuffer<LightGpuData>,
    fields: HostDeviceBuffer<SpatialFieldGpuData>,
    volumes: HostDeviceBuffer<VolumeGpuData>,
    index: HashMap<ObjectId, DeviceObjectIndex>,
}

impl ObjectRegistry {
    pub fn gpu_data(&self) -> ObjectRegistryGpuData {
        ObjectRegistryGpuData {
            samplers: self.samplers.ptr(),
            geometries: self.geometries.ptr(),
            materials: self.materials.ptr(),
            surfaces: self.surfaces.ptr(),
            lights: self.lights.ptr(),
            fields: self.fields.ptr(),
            volumes: self.volumes.ptr(),
        }
    }

    /// Registry index of an object, `None` when the frame does not use it.
    pub fn index_of(&self, id: ObjectId) -> Option<DeviceObjectIndex> {
        self.index.get(&id).copied()
    }

    pub fn samplers(&self) -> &[SamplerGpuData] {
        self.samplers.host()
    }

    pub fn geometries(&self) -> &[GeometryGpuData] {
        self.geometries.host()
    }

    pub fn materials(&self) -> &[MaterialGpuData] {
        self.materials.host()
    }

    pub fn surfaces(&self) -> &[SurfaceGpuData] {
        self.surfaces.host()
    }

    pub fn lights(&self) -> &[LightGpuData] {
        self.lights.host()
    }

    pub fn fields(&self) -> &[SpatialFieldGpuData] {
        self.fields.host()
    }

    pub fn volumes(&self) -> &[VolumeGpuData] {
        self.volumes.host()
    }
}
