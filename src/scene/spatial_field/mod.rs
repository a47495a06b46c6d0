//! Spatial fields: continuous scalar fields sampled by volumes.

use parking_lot::RwLock;
use std::sync::Arc;

use gpu_objects::{SpatialFieldGpuData, SpatialFieldPayload};

use crate::core::{DeviceContext, ObjectHeader, SceneObject};
use crate::device::Device;
use crate::util::{Box1, Box3, Error, Result};

mod structured_regular;
mod uniform_grid;

pub use structured_regular::{is_supported_encoding, stage_values, SUPPORTED_ENCODINGS};
pub use uniform_grid::UniformGrid;

use structured_regular::StructuredRegular;

struct FieldState {
    field: StructuredRegular,
    grid: UniformGrid,
}

pub struct SpatialField {
    header: ObjectHeader,
    committed: RwLock<Option<FieldState>>,
}

impl SpatialField {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            committed: RwLock::new(None),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&FieldState) -> R) -> Result<R> {
        self.header.ensure_committed()?;
        match self.committed.read().as_ref() {
            Some(s) => Ok(f(s)),
            None => Err(Error::NotValid {
                kind: self.header.kind(),
                id: self.header.id(),
            }),
        }
    }

    pub fn gpu_data(&self) -> Result<SpatialFieldGpuData> {
        self.with_state(|s| SpatialFieldGpuData::new(SpatialFieldPayload::StructuredRegular(s.field.data()), s.grid.gpu_data()))
    }

    pub fn bounds(&self) -> Result<Box3> {
        self.with_state(|s| s.field.bounds())
    }

    /// Ray-marching step: half the smallest voxel spacing.
    pub fn step_size(&self) -> Result<f32> {
        self.with_state(|s| s.field.step_size())
    }

    /// Per-cell `[min, max]` of the empty-space grid.
    pub fn cell_value_ranges(&self) -> Result<Vec<[f32; 2]>> {
        self.with_state(|s| s.grid.value_ranges().to_vec())
    }

    pub fn cell_max_opacities(&self) -> Result<Vec<f32>> {
        self.with_state(|s| s.grid.max_opacities().to_vec())
    }

    /// Recompute the grid's max opacities from a volume's lookup table.
    pub fn update_max_opacities(&self, device: &Arc<dyn Device>, table: &[[f32; 4]], value_range: Box1) -> Result<()> {
        self.header.ensure_committed()?;
        match self.committed.write().as_mut() {
            Some(s) => s.grid.update_max_opacities(device, table, value_range),
            None => Err(Error::NotValid {
                kind: self.header.kind(),
                id: self.header.id(),
            }),
        }
    }
}

impl SceneObject for SpatialField {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |scope| {
            let subtype = scope.header().subtype();
            if subtype != "structuredRegular" {
                scope.warn(format!("unknown spatial field subtype '{subtype}'"));
                return Ok(None);
            }
            let Some(field) = StructuredRegular::commit(scope)? else {
                return Ok(None);
            };
            let grid = UniformGrid::build(
                scope.device(),
                scope.settings().uniform_grid_dims,
                field.dims(),
                field.values(),
                field.bounds(),
            )?;
            Ok(Some(FieldState { field, grid }))
        })
    }
}
