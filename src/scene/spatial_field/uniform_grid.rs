//! Coarse empty-space skipping grid.
//!
//! Each cell stores the value range of the voxels it overlaps and the
//! highest opacity the current transfer function assigns to that range.
//! Ranges are computed once per field commit; opacities whenever a volume
//! recommits with a new lookup table.

use rayon::prelude::*;
use std::sync::Arc;

use gpu_objects::UniformGridData;

use crate::array::HostDeviceBuffer;
use crate::device::Device;
use crate::util::{Box1, Box3, Result};

pub struct UniformGrid {
    dims: [u32; 3],
    bounds: Box3,
    value_ranges: HostDeviceBuffer<[f32; 2]>,
    max_opacities: HostDeviceBuffer<f32>,
}

/// Voxel indices overlapped by `cell` along one axis with `voxels` samples
/// and `cells` cells, inclusive.
fn voxel_span(cell: usize, cells: usize, voxels: usize) -> (usize, usize) {
    let last = voxels.saturating_sub(1);
    let lo = (cell * last) / cells;
    let hi = ((cell + 1) * last).div_ceil(cells);
    (lo.min(last), hi.min(last))
}

impl UniformGrid {
    /// Build cell value ranges over `values`, laid out x-fastest with
    /// `voxel_dims` samples.
    #[tracing::instrument(skip_all, fields(cells = ?dims))]
    pub fn build(
        device: &Arc<dyn Device>,
        dims: [u32; 3],
        voxel_dims: [usize; 3],
        values: &[f32],
        bounds: Box3,
    ) -> Result<Self> {
        let [gx, gy, gz] = dims.map(|d| d.max(1) as usize);
        let [vx, vy, _] = voxel_dims;
        let num_cells = gx * gy * gz;

        let ranges: Vec<[f32; 2]> = (0..num_cells)
            .into_par_iter()
            .map(|i| {
                let (cx, cy, cz) = (i % gx, (i / gx) % gy, i / (gx * gy));
                let (x0, x1) = voxel_span(cx, gx, voxel_dims[0]);
                let (y0, y1) = voxel_span(cy, gy, voxel_dims[1]);
                let (z0, z1) = voxel_span(cz, gz, voxel_dims[2]);
                let mut range = Box1::EMPTY;
                for z in z0..=z1 {
                    for y in y0..=y1 {
                        let row = (z * vy + y) * vx;
                        for &v in &values[row + x0..=row + x1] {
                            range.extend(v);
                        }
                    }
                }
                range.to_array()
            })
            .collect();

        Ok(Self {
            dims: [gx as u32, gy as u32, gz as u32],
            bounds,
            value_ranges: HostDeviceBuffer::uploaded(ranges, device)?,
            max_opacities: HostDeviceBuffer::uploaded(vec![1.0; num_cells], device)?,
        })
    }

    /// Recompute per-cell max opacity from an RGBA lookup table spanning
    /// `value_range`.
    #[tracing::instrument(skip_all, fields(samples = table.len()))]
    pub fn update_max_opacities(
        &mut self,
        device: &Arc<dyn Device>,
        table: &[[f32; 4]],
        value_range: Box1,
    ) -> Result<()> {
        let last = table.len().saturating_sub(1) as f32;
        let opacities: Vec<f32> = self
            .value_ranges
            .host()
            .par_iter()
            .map(|&[lo, hi]| {
                if lo > hi || table.is_empty() {
                    return 0.0;
                }
                let i0 = (value_range.normalize(lo) * last).floor() as usize;
                let i1 = (value_range.normalize(hi) * last).ceil() as usize;
                let top = table.len() - 1;
                let (a, b) = (i0.min(i1).min(top), i0.max(i1).min(top));
                table[a..=b].iter().map(|s| s[3]).fold(0.0, f32::max)
            })
            .collect();
        self.max_opacities = HostDeviceBuffer::uploaded(opacities, device)?;
        Ok(())
    }

    pub fn dims(&self) -> [u32; 3] {
        self.dims
    }

    pub fn value_ranges(&self) -> &[[f32; 2]] {
        self.value_ranges.host()
    }

    pub fn max_opacities(&self) -> &[f32] {
        self.max_opacities.host()
    }

    pub fn gpu_data(&self) -> UniformGridData {
        UniformGridData {
            dims: self.dims.map(|d| d as i32),
            world_bounds: self.bounds.to_gpu(),
            _pad: 0,
            value_ranges: self.value_ranges.ptr(),
            max_opacities: self.max_opacities.ptr(),
        }
    }
}
