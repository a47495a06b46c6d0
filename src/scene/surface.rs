//! Surfaces: a geometry paired with a material.

use parking_lot::RwLock;
use std::sync::Arc;

use gpu_objects::SurfaceGpuData;

use super::{Geometry, Material};
use crate::accel::{BuildInput, PrimitiveClass};
use crate::core::{DeviceContext, ObjectHeader, SceneObject};
use crate::registry::RegistryBuilder;
use crate::util::{Error, Result};

struct SurfaceState {
    geometry: Arc<Geometry>,
    material: Arc<Material>,
    id: u32,
}

pub struct Surface {
    header: ObjectHeader,
    committed: RwLock<Option<SurfaceState>>,
}

impl Surface {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            committed: RwLock::new(None),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&SurfaceState) -> Result<R>) -> Result<R> {
        self.header.ensure_committed()?;
        match self.committed.read().as_ref() {
            Some(s) => f(s),
            None => Err(Error::NotValid {
                kind: self.header.kind(),
                id: self.header.id(),
            }),
        }
    }

    pub fn geometry(&self) -> Result<Arc<Geometry>> {
        self.with_state(|s| Ok(s.geometry.clone()))
    }

    pub fn material(&self) -> Result<Arc<Material>> {
        self.with_state(|s| Ok(s.material.clone()))
    }

    /// User id, `u32::MAX` when unset.
    pub fn user_id(&self) -> Result<u32> {
        self.with_state(|s| Ok(s.id))
    }

    pub fn primitive_class(&self) -> Result<PrimitiveClass> {
        self.with_state(|s| s.geometry.primitive_class())
    }

    pub fn populate_build_input(&self) -> Result<BuildInput> {
        self.with_state(|s| s.geometry.populate_build_input())
    }

    /// Snapshot with geometry and material translated to registry indices.
    pub fn gpu_data(&self, registry: &mut RegistryBuilder) -> Result<SurfaceGpuData> {
        self.with_state(|s| {
            Ok(SurfaceGpuData {
                geometry: registry.geometry(&s.geometry)?,
                material: registry.material(&s.material)?,
                id: s.id,
                _pad: 0,
            })
        })
    }
}

impl SceneObject for Surface {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |scope| {
            let geometry = scope.require_object::<Geometry>("geometry");
            let material = scope.require_object::<Material>("material");
            let (Some(geometry), Some(material)) = (geometry, material) else {
                return Ok(None);
            };
            Ok(Some(SurfaceState {
                geometry,
                material,
                id: scope.params().get_or("id", u32::MAX),
            }))
        })
    }
}
