//! Cameras: `perspective` and `orthographic`.
//!
//! The ray basis is precomputed on commit. For a normalized image position
//! `(u, v)` a perspective ray leaves `pos` along `dir_00 + u * dir_du + v *
//! dir_dv`; an orthographic ray starts at `pos_00 + u * pos_du + v * pos_dv`
//! and travels along `dir`.

use glam::{Vec3, Vec4};
use parking_lot::RwLock;
use std::f32::consts::FRAC_PI_3;

use gpu_objects::{CameraGpuData, CameraPayload, OrthographicCameraGpuData, PerspectiveCameraGpuData};

use crate::core::{DeviceContext, ObjectHeader, SceneObject};
use crate::util::{Error, Result};

/// Image-plane axes `(du, dv)` of `width` by `height`, orthogonal to `dir`.
fn image_axes(dir: Vec3, up: Vec3, width: f32, height: f32) -> Option<(Vec3, Vec3)> {
    let du = dir.cross(up).try_normalize()?;
    let dv = du.cross(dir).try_normalize()?;
    Some((du * width, dv * height))
}

pub struct Camera {
    header: ObjectHeader,
    committed: RwLock<Option<CameraGpuData>>,
}

impl Camera {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            committed: RwLock::new(None),
        }
    }

    pub fn gpu_data(&self) -> Result<CameraGpuData> {
        self.header.ensure_committed()?;
        self.committed.read().ok_or(Error::NotValid {
            kind: self.header.kind(),
            id: self.header.id(),
        })
    }
}

impl SceneObject for Camera {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |scope| {
            let params = scope.params();
            let pos = params.get_or("position", Vec3::ZERO);
            let Some(dir) = params.get_or("direction", Vec3::NEG_Z).try_normalize() else {
                scope.error("'direction' must be non-zero");
                return Ok(None);
            };
            let up = params.get_or("up", Vec3::Y);
            let region = params.get_or("imageRegion", Vec4::new(0.0, 0.0, 1.0, 1.0));
            let aspect = params.get_or("aspect", 1.0f32);

            let (width, height) = match scope.header().subtype() {
                "perspective" => {
                    let fovy = params.get_or("fovy", FRAC_PI_3);
                    let h = 2.0 * (fovy * 0.5).tan();
                    (h * aspect, h)
                }
                "orthographic" => {
                    let h = params.get_or("height", 1.0f32);
                    (h * aspect, h)
                }
                other => {
                    scope.warn(format!("unknown camera subtype '{other}'"));
                    return Ok(None);
                }
            };
            let Some((du, dv)) = image_axes(dir, up, width, height) else {
                scope.error("'up' must not be parallel to 'direction'");
                return Ok(None);
            };

            let payload = if scope.header().subtype() == "perspective" {
                CameraPayload::Perspective(PerspectiveCameraGpuData {
                    dir_du: du.to_array(),
                    dir_dv: dv.to_array(),
                    dir_00: (dir - 0.5 * du - 0.5 * dv).to_array(),
                    _pad: 0,
                })
            } else {
                CameraPayload::Orthographic(OrthographicCameraGpuData {
                    pos_du: du.to_array(),
                    pos_dv: dv.to_array(),
                    pos_00: (pos - 0.5 * du - 0.5 * dv).to_array(),
                    _pad: 0,
                })
            };
            Ok(Some(CameraGpuData::new(
                region.to_array(),
                pos.to_array(),
                dir.to_array(),
                up.to_array(),
                payload,
            )))
        })
    }
}
