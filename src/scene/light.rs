//! Lights: `directional`, `point` and `ambient`.

use glam::Vec3;
use parking_lot::RwLock;

use gpu_objects::{AmbientLightGpuData, DirectionalLightGpuData, LightGpuData, LightPayload, PointLightGpuData};

use crate::core::{DeviceContext, ObjectHeader, SceneObject};
use crate::util::{Error, Result};

pub struct Light {
    header: ObjectHeader,
    committed: RwLock<Option<LightGpuData>>,
}

impl Light {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            committed: RwLock::new(None),
        }
    }

    pub fn gpu_data(&self) -> Result<LightGpuData> {
        self.header.ensure_committed()?;
        self.committed.read().ok_or(Error::NotValid {
            kind: self.header.kind(),
            id: self.header.id(),
        })
    }
}

impl SceneObject for Light {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |scope| {
            let params = scope.params();
            let payload = match scope.header().subtype() {
                "directional" => LightPayload::Directional(DirectionalLightGpuData {
                    direction: params
                        .get_or("direction", Vec3::NEG_Z)
                        .try_normalize()
                        .unwrap_or(Vec3::NEG_Z)
                        .to_array(),
                    irradiance: params.get_or("irradiance", 1.0f32),
                }),
                "point" => LightPayload::Point(PointLightGpuData {
                    position: params.get_or("position", Vec3::ZERO).to_array(),
                    intensity: params.get_or("intensity", 1.0f32),
                }),
                "ambient" => LightPayload::Ambient(AmbientLightGpuData {
                    radiance: params.get_or("radiance", 1.0f32),
                    _pad: [0; 3],
                }),
                other => {
                    scope.warn(format!("unknown light subtype '{other}'"));
                    return Ok(None);
                }
            };
            let color = params.get_or("color", Vec3::ONE);
            Ok(Some(LightGpuData::new(color.to_array(), payload)))
        })
    }
}
