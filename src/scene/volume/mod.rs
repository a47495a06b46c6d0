//! Volumes: a spatial field mapped to color and opacity by a 1D transfer
//! function.

use glam::Vec2;
use parking_lot::RwLock;
use std::sync::Arc;

use gpu_objects::{ScivisVolumeGpuData, VolumeGpuData, VolumePayload};

use super::SpatialField;
use crate::array::Array;
use crate::core::{CommitScope, DeviceContext, ObjectHeader, SceneObject};
use crate::device::{DeviceTexture, TextureDesc, TextureFilter, WrapMode};
use crate::registry::RegistryBuilder;
use crate::util::{Box1, Box3, DataType, Error, Result};

mod transfer_function;

pub use transfer_function::{discretize, evenly_spaced, normalize_positions};

struct VolumeState {
    field: Arc<SpatialField>,
    table: Vec<[f32; 4]>,
    texture: DeviceTexture,
    value_range: Box1,
    density_scale: f32,
    id: u32,
    bounds: Box3,
    step_size: f32,
    _inputs: Vec<Arc<Array>>,
}

pub struct Volume {
    header: ObjectHeader,
    committed: RwLock<Option<VolumeState>>,
}

impl Volume {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            committed: RwLock::new(None),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&VolumeState) -> Result<R>) -> Result<R> {
        self.header.ensure_committed()?;
        match self.committed.read().as_ref() {
            Some(s) => f(s),
            None => Err(Error::NotValid {
                kind: self.header.kind(),
                id: self.header.id(),
            }),
        }
    }

    /// Discretized RGBA lookup table of the last commit.
    pub fn table(&self) -> Result<Vec<[f32; 4]>> {
        self.with_state(|s| Ok(s.table.clone()))
    }

    pub fn bounds(&self) -> Result<Box3> {
        self.with_state(|s| Ok(s.bounds))
    }

    pub fn field(&self) -> Result<Arc<SpatialField>> {
        self.with_state(|s| Ok(s.field.clone()))
    }

    /// Snapshot with the field translated to a registry index.
    pub fn gpu_data(&self, registry: &mut RegistryBuilder) -> Result<VolumeGpuData> {
        self.with_state(|s| {
            let data = ScivisVolumeGpuData {
                field: registry.field(&s.field)?,
                _pad: 0,
                tf_tex: s.texture.handle(),
                value_range: s.value_range.to_array(),
                density_scale: s.density_scale,
                _pad1: 0,
            };
            Ok(VolumeGpuData::new(
                s.id,
                VolumePayload::TransferFunction1D(data),
                s.bounds.to_gpu(),
                s.step_size,
            ))
        })
    }
}

/// Normalized positions for `values` control points: explicit positions
/// mapped over `range`, or evenly spaced. `None` on a length mismatch
/// (reported). Device failures propagate.
fn positions_for(
    scope: &mut CommitScope<'_>,
    name: &str,
    count: usize,
    range: Box1,
    inputs: &mut Vec<Arc<Array>>,
) -> Result<Option<Vec<f32>>> {
    let position_param = format!("{name}.position");
    let Some(positions) = scope.optional_array(&position_param) else {
        return Ok(Some(evenly_spaced(count)));
    };
    if !scope.check_type(&positions, &position_param, &[DataType::FLOAT32]) {
        return Ok(None);
    }
    if positions.len() != count {
        scope.error(format!(
            "'{name}' has {count} entries but '{position_param}' has {}",
            positions.len()
        ));
        return Ok(None);
    }
    let values = positions.to_vec::<f32>()?;
    inputs.push(positions);
    Ok(Some(normalize_positions(&values, range)))
}

impl SceneObject for Volume {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |scope| {
            let subtype = scope.header().subtype();
            if !matches!(subtype, "transferFunction1D" | "scivis") {
                scope.warn(format!("unknown volume subtype '{subtype}'"));
                return Ok(None);
            }

            // missing inputs are reported in this order before any size check
            let field = scope.require_object::<SpatialField>("field");
            let color = scope.require_array("color");
            let opacity = scope.require_array("opacity");
            let (Some(field), Some(color), Some(opacity)) = (field, color, opacity) else {
                return Ok(None);
            };
            if !scope.check_type(&color, "color", &[DataType::FLOAT32_VEC3, DataType::FLOAT32_VEC4])
                || !scope.check_type(&opacity, "opacity", &[DataType::FLOAT32])
            {
                return Ok(None);
            }

            let value_range = scope.params().get::<Vec2>("valueRange").map_or(Box1::UNIT, Box1::from);
            if value_range.is_empty() {
                scope.error(format!(
                    "'valueRange' is inverted ({} > {})",
                    value_range.lower, value_range.upper
                ));
                return Ok(None);
            }
            let mut inputs = vec![color.clone(), opacity.clone()];
            let color_positions = positions_for(scope, "color", color.len(), value_range, &mut inputs)?;
            let opacity_positions = positions_for(scope, "opacity", opacity.len(), value_range, &mut inputs)?;
            let (Some(color_positions), Some(opacity_positions)) = (color_positions, opacity_positions) else {
                return Ok(None);
            };

            let colors: Vec<[f32; 3]> = if color.data_type() == DataType::FLOAT32_VEC4 {
                color.to_vec::<[f32; 4]>()?.into_iter().map(|[r, g, b, _]| [r, g, b]).collect()
            } else {
                color.to_vec::<[f32; 3]>()?
            };
            let opacities = opacity.to_vec::<f32>()?;

            let samples = scope.settings().transfer_function_samples;
            let table = discretize(&colors, &color_positions, &opacities, &opacity_positions, samples);

            let desc = TextureDesc {
                dims: [samples as u32, 1, 1],
                channels: 4,
                filter: TextureFilter::Linear,
                wrap: [WrapMode::Clamp; 3],
                normalized_coords: true,
            };
            let texture = DeviceTexture::new(scope.device(), &desc, bytemuck::cast_slice(&table))?;
            field.update_max_opacities(scope.device(), &table, value_range)?;

            let params = scope.params();
            Ok(Some(VolumeState {
                bounds: field.bounds()?,
                step_size: field.step_size()?,
                field,
                table,
                texture,
                value_range,
                density_scale: params.get_or("densityScale", 1.0f32),
                id: params.get_or("id", u32::MAX),
                _inputs: inputs,
            }))
        })
    }
}
