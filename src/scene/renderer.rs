//! Renderers: shared frame parameters plus a per-subtype block.

use glam::Vec3;
use parking_lot::RwLock;
use std::sync::Arc;

use gpu_objects::{
    AoRendererGpuData, BackgroundGpuData, BackgroundPayload, DebugRendererGpuData, DptRendererGpuData, EmptyPayload,
    ImageBackground, RendererGpuData, RendererParameters, RendererParametersGpuData, SciVisRendererGpuData,
};

use super::Sampler;
use crate::core::{CommitScope, DeviceContext, ObjectHeader, ObjectRef, ParamValue, SceneObject};
use crate::registry::RegistryBuilder;
use crate::util::{Error, Result};

const DEFAULT_BACKGROUND: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Debug visualizations, by `method` name.
pub const DEBUG_METHODS: [&str; 13] = [
    "primitiveId",
    "geometryId",
    "instanceId",
    "ray_uvw",
    "isFrontFace",
    "isBackFace",
    "hasMaterial",
    "geometry.attribute0",
    "geometry.attribute1",
    "geometry.attribute2",
    "geometry.attribute3",
    "geometry.color",
    "normal",
];

pub fn debug_method(name: &str) -> Option<i32> {
    DEBUG_METHODS.iter().position(|m| *m == name).map(|i| i as i32)
}

enum Background {
    Color([f32; 4]),
    Image(Arc<Sampler>),
}

struct RendererState {
    params: RendererParameters,
    background: Background,
    ambient_color: [f32; 3],
    ambient_intensity: f32,
    occlusion_distance: f32,
}

pub struct Renderer {
    header: ObjectHeader,
    committed: RwLock<Option<RendererState>>,
}

impl Renderer {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            committed: RwLock::new(None),
        }
    }

    /// Snapshot with an image background resolved through `registry`.
    pub fn gpu_data(&self, registry: &mut RegistryBuilder) -> Result<RendererGpuData> {
        self.header.ensure_committed()?;
        let guard = self.committed.read();
        let s = guard.as_ref().ok_or(Error::NotValid {
            kind: self.header.kind(),
            id: self.header.id(),
        })?;
        let background = match &s.background {
            Background::Color(c) => BackgroundPayload::Color(*c),
            Background::Image(sampler) => BackgroundPayload::Image(ImageBackground {
                sampler: registry.sampler(sampler)?,
                _pad: 0,
            }),
        };
        Ok(RendererGpuData {
            params: RendererParametersGpuData::new(s.params),
            background: BackgroundGpuData::new(background),
            ambient_color: s.ambient_color,
            ambient_intensity: s.ambient_intensity,
            occlusion_distance: s.occlusion_distance,
            _pad: 0,
        })
    }
}

fn background(scope: &mut CommitScope<'_>) -> Background {
    match scope.params().raw("background").cloned() {
        Some(ParamValue::Object(ObjectRef::Sampler(_))) => match scope.optional_object::<Sampler>("background") {
            Some(s) if s.is_image2d() => Background::Image(s),
            Some(_) => {
                scope.warn("'background' sampler must be image2D, using the default color");
                Background::Color(DEFAULT_BACKGROUND)
            }
            None => Background::Color(DEFAULT_BACKGROUND),
        },
        Some(ParamValue::Vec4(c)) => Background::Color(c.to_array()),
        Some(ParamValue::Vec3(c)) => Background::Color(c.extend(1.0).to_array()),
        Some(other) => {
            scope.warn(format!("ignoring 'background' of type {}", other.type_name()));
            Background::Color(DEFAULT_BACKGROUND)
        }
        None => Background::Color(DEFAULT_BACKGROUND),
    }
}

impl SceneObject for Renderer {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |scope| {
            let params = scope.params();
            let block = match scope.header().subtype() {
                "default" | "raycast" => RendererParameters::Raycast(EmptyPayload::default()),
                "debug" => {
                    let name = params.string("method", "primitiveId");
                    let method = debug_method(&name).unwrap_or_else(|| {
                        scope.warn(format!("unknown debug method '{name}', using primitiveId"));
                        0
                    });
                    RendererParameters::Debug(DebugRendererGpuData { method, _pad: 0 })
                }
                "ao" => RendererParameters::Ao(AoRendererGpuData {
                    ao_samples: params.get_or("aoSamples", 1i32).clamp(0, 256),
                    _pad: 0,
                }),
                "dpt" => RendererParameters::Dpt(DptRendererGpuData {
                    max_depth: params.get_or("maxDepth", 5i32).max(1),
                    _pad: 0,
                }),
                "scivis" => RendererParameters::SciVis(SciVisRendererGpuData {
                    light_falloff: params.get_or("lightFalloff", 0.25f32).clamp(0.0, 1.0),
                    ao_samples: params.get_or("aoSamples", 1i32).clamp(0, 256),
                    ao_color: params.get_or("aoColor", Vec3::ONE).to_array(),
                    ao_intensity: params.get_or("aoIntensity", 1.0f32),
                }),
                other => {
                    scope.warn(format!("unknown renderer subtype '{other}'"));
                    return Ok(None);
                }
            };
            let ambient_color = params.get_or("ambientColor", Vec3::ONE).to_array();
            let ambient_intensity = params.get_or("ambientRadiance", 0.0f32);
            let occlusion_distance = params.get_or("occlusionDistance", 1e20f32);
            Ok(Some(RendererState {
                params: block,
                background: background(scope),
                ambient_color,
                ambient_intensity,
                occlusion_distance,
            }))
        })
    }
}
