//! Materials: `matte` and `physicallyBased`.
//!
//! Each input is a constant, a sampler, or an attribute name; the registry
//! turns sampler references into indices when the snapshot is built.

use glam::{Vec3, Vec4};
use parking_lot::RwLock;
use std::sync::Arc;

use gpu_objects::{AlphaMode, MaterialGpuData, MaterialParameter, MaterialParameterType};

use super::Sampler;
use crate::core::{CommitScope, DeviceContext, ObjectHeader, ObjectRef, ParamValue, SceneObject};
use crate::registry::RegistryBuilder;
use crate::util::{Error, Result};

/// Source of one material input.
#[derive(Clone)]
pub enum MaterialInput {
    Value([f32; 4]),
    Sampler(Arc<Sampler>),
    Attribute(MaterialParameterType),
}

impl MaterialInput {
    fn resolve(&self, registry: &mut RegistryBuilder) -> Result<MaterialParameter> {
        Ok(match self {
            Self::Value(v) => MaterialParameter::value_vec4(*v),
            Self::Sampler(s) => MaterialParameter::sampler(registry.sampler(s)?),
            Self::Attribute(a) => MaterialParameter::attribute(*a).unwrap_or(MaterialParameter::value_vec4([1.0; 4])),
        })
    }
}

impl std::fmt::Debug for MaterialInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => write!(f, "Value({v:?})"),
            Self::Sampler(s) => write!(f, "Sampler(#{})", s.id()),
            Self::Attribute(a) => write!(f, "Attribute({a:?})"),
        }
    }
}

/// Read `name` as a value, a sampler or an attribute name.
fn material_input(scope: &mut CommitScope<'_>, name: &str, default: [f32; 4]) -> MaterialInput {
    match scope.params().raw(name).cloned() {
        Some(ParamValue::Object(ObjectRef::Sampler(_))) => match scope.optional_object::<Sampler>(name) {
            Some(s) => MaterialInput::Sampler(s),
            None => MaterialInput::Value(default),
        },
        Some(ParamValue::String(attr)) => match MaterialParameterType::from_attribute_name(&attr) {
            Some(a) => MaterialInput::Attribute(a),
            None => {
                scope.warn(format!("unknown attribute '{attr}' for '{name}'"));
                MaterialInput::Value(default)
            }
        },
        Some(ParamValue::Vec4(v)) => MaterialInput::Value(v.to_array()),
        Some(ParamValue::Vec3(v)) => MaterialInput::Value(v.extend(default[3]).to_array()),
        Some(ParamValue::Float(f)) => MaterialInput::Value([f, f, f, f]),
        Some(other) => {
            scope.warn(format!("ignoring '{name}' of type {}", other.type_name()));
            MaterialInput::Value(default)
        }
        None => MaterialInput::Value(default),
    }
}

#[derive(Debug)]
struct MaterialState {
    base_color: MaterialInput,
    opacity: MaterialInput,
    cutoff: f32,
    mode: AlphaMode,
}

pub struct Material {
    header: ObjectHeader,
    committed: RwLock<Option<MaterialState>>,
}

impl Material {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            committed: RwLock::new(None),
        }
    }

    pub fn base_color(&self) -> Option<MaterialInput> {
        self.committed.read().as_ref().map(|s| s.base_color.clone())
    }

    /// Snapshot with sampler references resolved through `registry`.
    pub fn gpu_data(&self, registry: &mut RegistryBuilder) -> Result<MaterialGpuData> {
        self.header.ensure_committed()?;
        let guard = self.committed.read();
        let s = guard.as_ref().ok_or(Error::NotValid {
            kind: self.header.kind(),
            id: self.header.id(),
        })?;
        Ok(MaterialGpuData {
            base_color: s.base_color.resolve(registry)?,
            opacity: s.opacity.resolve(registry)?,
            cutoff: s.cutoff,
            mode: s.mode as u32,
        })
    }
}

impl SceneObject for Material {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |scope| {
            let color_param = match scope.header().subtype() {
                "matte" => "color",
                "physicallyBased" => "baseColor",
                other => {
                    scope.warn(format!("unknown material subtype '{other}'"));
                    return Ok(None);
                }
            };
            let base_color = material_input(scope, color_param, Vec3::splat(0.8).extend(1.0).to_array());
            let opacity = material_input(scope, "opacity", Vec4::ONE.to_array());
            let params = scope.params();
            Ok(Some(MaterialState {
                base_color,
                opacity,
                cutoff: params.get_or("alphaCutoff", 0.5f32),
                mode: AlphaMode::from_name(&params.string("alphaMode", "opaque")),
            }))
        })
    }
}
