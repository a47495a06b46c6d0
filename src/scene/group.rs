//! Groups: surfaces, volumes and lights sharing one set of bottom-level
//! acceleration structures.

use parking_lot::RwLock;
use smallvec::SmallVec;
use std::sync::Arc;

use gpu_objects::TraversableHandle;

use super::{Light, Surface, Volume};
use crate::accel::{BuildInput, CustomPrimitiveArrayInput, GeometryFlags, PrimitiveClass, SBT_RECORDS_PER_INPUT};
use crate::array::HostDeviceBuffer;
use crate::core::{CommitScope, DeviceContext, ObjectHeader, SceneObject};
use crate::device::{Device, DeviceAccel};
use crate::util::{Box3, Error, Result};

/// Bottom-level structure over the surfaces of one primitive class.
pub struct ClassAccel {
    pub class: PrimitiveClass,
    /// Index of the first surface of this class in [`GroupContents::surfaces`].
    pub sbt_offset: u32,
    accel: DeviceAccel,
}

impl ClassAccel {
    #[inline]
    pub fn traversable(&self) -> TraversableHandle {
        self.accel.handle()
    }
}

/// Valid members of a group plus the structures built over them.
///
/// Surfaces are ordered by primitive class, keeping list order within a
/// class, so each class occupies one contiguous range.
pub struct GroupContents {
    surfaces: Vec<Arc<Surface>>,
    volumes: Vec<Arc<Volume>>,
    lights: Vec<Arc<Light>>,
    surface_accels: SmallVec<[ClassAccel; 3]>,
    _volume_aabbs: HostDeviceBuffer<[f32; 6]>,
    volume_accel: Option<DeviceAccel>,
    bounds: Box3,
}

impl GroupContents {
    /// Read `surface`, `volume` and `light` lists and build their structures.
    pub(crate) fn from_params(scope: &mut CommitScope<'_>) -> Result<Self> {
        let surfaces = scope.valid_objects::<Surface>("surface");
        let volumes = scope.valid_objects::<Volume>("volume");
        let lights = scope.valid_objects::<Light>("light");
        Self::build(scope.device(), surfaces, volumes, lights)
    }

    #[tracing::instrument(skip_all, fields(surfaces = surfaces.len(), volumes = volumes.len(), lights = lights.len()))]
    pub fn build(
        device: &Arc<dyn Device>,
        surfaces: Vec<Arc<Surface>>,
        volumes: Vec<Arc<Volume>>,
        lights: Vec<Arc<Light>>,
    ) -> Result<Self> {
        let mut bounds = Box3::EMPTY;
        let mut classified = Vec::with_capacity(surfaces.len());
        for s in surfaces {
            let geometry = s.geometry()?;
            bounds.expand_by_box(&geometry.bounds()?);
            classified.push((s.primitive_class()?, s));
        }
        classified.sort_by_key(|(class, _)| *class);
        let surfaces: Vec<Arc<Surface>> = classified.iter().map(|(_, s)| s.clone()).collect();

        let mut surface_accels = SmallVec::new();
        for class in PrimitiveClass::ALL {
            let Some(first) = classified.iter().position(|(c, _)| *c == class) else {
                continue;
            };
            let inputs = classified
                .iter()
                .filter(|(c, _)| *c == class)
                .map(|(_, s)| s.populate_build_input())
                .collect::<Result<Vec<_>>>()?;
            surface_accels.push(ClassAccel {
                class,
                sbt_offset: first as u32,
                accel: DeviceAccel::build(device, &inputs)?,
            });
        }

        let mut aabbs = Vec::with_capacity(volumes.len());
        for v in &volumes {
            let b = v.bounds()?;
            bounds.expand_by_box(&b);
            aabbs.push(b.to_array6());
        }
        let volume_aabbs = HostDeviceBuffer::uploaded(aabbs, device)?;
        let volume_accel = if volume_aabbs.is_empty() {
            None
        } else {
            let input = BuildInput::CustomPrimitives(CustomPrimitiveArrayInput {
                aabb_buffer: volume_aabbs.ptr(),
                stride: 24,
                num_primitives: volume_aabbs.len() as u32,
                flags: GeometryFlags::NONE,
                num_sbt_records: SBT_RECORDS_PER_INPUT,
            });
            Some(DeviceAccel::build(device, &[input])?)
        };

        Ok(Self {
            surfaces,
            volumes,
            lights,
            surface_accels,
            _volume_aabbs: volume_aabbs,
            volume_accel,
            bounds,
        })
    }

    pub fn surfaces(&self) -> &[Arc<Surface>] {
        &self.surfaces
    }

    pub fn volumes(&self) -> &[Arc<Volume>] {
        &self.volumes
    }

    pub fn lights(&self) -> &[Arc<Light>] {
        &self.lights
    }

    pub fn surface_accels(&self) -> &[ClassAccel] {
        &self.surface_accels
    }

    /// `0` without volumes.
    pub fn volume_traversable(&self) -> TraversableHandle {
        self.volume_accel.as_ref().map_or(0, DeviceAccel::handle)
    }

    pub fn bounds(&self) -> Box3 {
        self.bounds
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty() && self.volumes.is_empty() && self.lights.is_empty()
    }
}

pub struct Group {
    header: ObjectHeader,
    committed: RwLock<Option<GroupContents>>,
}

impl Group {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            committed: RwLock::new(None),
        }
    }

    /// Run `f` on the committed contents.
    pub fn with_contents<R>(&self, f: impl FnOnce(&GroupContents) -> R) -> Result<R> {
        self.header.ensure_committed()?;
        match self.committed.read().as_ref() {
            Some(c) => Ok(f(c)),
            None => Err(Error::NotValid {
                kind: self.header.kind(),
                id: self.header.id(),
            }),
        }
    }

    pub fn bounds(&self) -> Result<Box3> {
        self.with_contents(GroupContents::bounds)
    }
}

impl SceneObject for Group {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |scope| {
            GroupContents::from_params(scope).map(Some)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Extent;
    use crate::config::Settings;
    use crate::scene::{Geometry, Material};
    use crate::util::{DataType, Vec3};

    fn surface(ctx: &DeviceContext, geometry: &Arc<Geometry>, material: &Arc<Material>) -> Arc<Surface> {
        let s = ctx.new_surface();
        s.set_param("geometry", geometry);
        s.set_param("material", material);
        s.commit(ctx).unwrap();
        s
    }

    #[test]
    fn test_surfaces_grouped_by_class() {
        let ctx = DeviceContext::host(Settings::default());
        let material = ctx.new_material("matte");
        material.commit(&ctx).unwrap();

        let centers = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(1), &[[5.0f32, 0.0, 0.0]]).unwrap();
        let sphere = ctx.new_geometry("sphere");
        sphere.set_param("vertex.position", &centers);
        sphere.set_param("radius", 1.0f32);
        sphere.commit(&ctx).unwrap();

        let pos = ctx
            .array_from(DataType::FLOAT32_VEC3, Extent::D1(3), &[[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
            .unwrap();
        let tri = ctx.new_geometry("triangle");
        tri.set_param("vertex.position", &pos);
        tri.commit(&ctx).unwrap();

        let s_sphere = surface(&ctx, &sphere, &material);
        let s_tri = surface(&ctx, &tri, &material);
        let broken = ctx.new_surface();
        broken.commit(&ctx).unwrap();

        let group = ctx.new_group();
        group.set_param("surface", vec![s_sphere.clone(), broken, s_tri.clone()]);
        group.commit(&ctx).unwrap();
        assert!(group.is_valid());

        group
            .with_contents(|c| {
                let ids: Vec<_> = c.surfaces().iter().map(|s| s.id()).collect();
                assert_eq!(ids, vec![s_tri.id(), s_sphere.id()]);
                let classes: Vec<_> = c.surface_accels().iter().map(|a| (a.class, a.sbt_offset)).collect();
                assert_eq!(classes, vec![(PrimitiveClass::Triangles, 0), (PrimitiveClass::Custom, 1)]);
                assert_eq!(c.volume_traversable(), 0);
            })
            .unwrap();
        let b = group.bounds().unwrap();
        assert_eq!(b.min, Vec3::new(0.0, -1.0, -1.0));
        assert_eq!(b.max, Vec3::new(6.0, 1.0, 1.0));
        assert_eq!(ctx.stats().live_accels, 2);

        group.commit(&ctx).unwrap();
        assert_eq!(ctx.stats().live_accels, 2);
    }

    #[test]
    fn test_empty_group_is_valid() {
        let ctx = DeviceContext::host(Settings::default());
        let group = ctx.new_group();
        group.commit(&ctx).unwrap();
        assert!(group.with_contents(GroupContents::is_empty).unwrap());
        assert_eq!(ctx.stats().live_accels, 0);
    }
}
