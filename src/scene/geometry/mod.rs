//! Geometry objects.
//!
//! A [`Geometry`] is created with a subtype name; its commit dispatches to
//! the matching variant, which validates the variant's arrays, derives any
//! exclusively owned buffers (split quads, primitive bounds, widths) and
//! uploads them. The committed variant then answers for the GPU snapshot
//! and the acceleration-structure build input.
//!
//! | subtype    | primitives            | build input        |
//! |------------|-----------------------|--------------------|
//! | `triangle` | indexed or soup       | triangles          |
//! | `quad`     | split into 2 triangles| triangles          |
//! | `cylinder` | vertex pairs          | custom (bounds)    |
//! | `cone`     | vertex pairs          | custom (bounds)    |
//! | `curve`    | linear segments       | curves             |
//! | `sphere`   | centers               | custom (bounds)    |

use parking_lot::RwLock;
use rayon::prelude::*;
use std::sync::Arc;

use gpu_objects::{AttributePtr, DevicePtr, GeometryGpuData, GeometryPayload, NUM_ATTRIBUTES};

use crate::accel::{BuildInput, CustomPrimitiveArrayInput, GeometryFlags, PrimitiveClass, SBT_RECORDS_PER_INPUT};
use crate::array::{Array, HostDeviceBuffer};
use crate::core::{CommitScope, DeviceContext, ObjectHeader, SceneObject};
use crate::util::{Box3, DataType, Error, Result, Vec3};

mod cone;
mod curve;
mod cylinder;
mod quad;
mod sphere;
mod triangle;

pub use quad::split_quads;

/// Attribute channel names in slot order.
pub const ATTRIBUTE_NAMES: [&str; NUM_ATTRIBUTES] = ["attribute0", "attribute1", "attribute2", "attribute3", "color"];

/// Byte stride of `vec3` vertex data.
const VEC3_STRIDE: u32 = 12;

/// Byte stride of a `[min.xyz, max.xyz]` box.
const AABB_STRIDE: u32 = 24;

/// Behavior of one committed geometry variant.
pub(crate) trait GeometryVariant: Send + Sync {
    fn payload(&self) -> GeometryPayload;
    fn build_input(&self) -> BuildInput;
    fn num_primitives(&self) -> u32;
    fn bounds(&self) -> Box3;
}

type VariantCommit = fn(&mut CommitScope<'_>, &mut Vec<Arc<Array>>) -> Result<Option<Box<dyn GeometryVariant>>>;

/// Known subtypes and their commit functions.
const SUBTYPES: &[(&str, VariantCommit)] = &[
    ("triangle", triangle::commit),
    ("quad", quad::commit),
    ("cylinder", cylinder::commit),
    ("cone", cone::commit),
    ("curve", curve::commit),
    ("sphere", sphere::commit),
];

pub fn is_supported_subtype(subtype: &str) -> bool {
    SUBTYPES.iter().any(|(name, _)| *name == subtype)
}

struct GeometryState {
    variant: Box<dyn GeometryVariant>,
    primitive_attr: [AttributePtr; NUM_ATTRIBUTES],
    /// Arrays referenced by device pointers in the snapshot.
    _inputs: Vec<Arc<Array>>,
}

pub struct Geometry {
    header: ObjectHeader,
    committed: RwLock<Option<GeometryState>>,
}

impl Geometry {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            committed: RwLock::new(None),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&GeometryState) -> R) -> Result<R> {
        self.header.ensure_committed()?;
        match self.committed.read().as_ref() {
            Some(state) => Ok(f(state)),
            None => Err(Error::NotValid {
                kind: self.header.kind(),
                id: self.header.id(),
            }),
        }
    }

    /// Snapshot of the last successful commit.
    pub fn gpu_data(&self) -> Result<GeometryGpuData> {
        self.with_state(|s| GeometryGpuData::new(s.primitive_attr, s.variant.payload()))
    }

    /// Build input over the committed device buffers. Fails on an invalid or
    /// uncommitted geometry.
    pub fn populate_build_input(&self) -> Result<BuildInput> {
        self.with_state(|s| s.variant.build_input())
    }

    pub fn num_primitives(&self) -> Result<u32> {
        self.with_state(|s| s.variant.num_primitives())
    }

    pub fn bounds(&self) -> Result<Box3> {
        self.with_state(|s| s.variant.bounds())
    }

    pub fn primitive_class(&self) -> Result<PrimitiveClass> {
        self.with_state(|s| s.variant.build_input().class().unwrap_or(PrimitiveClass::Custom))
    }
}

impl SceneObject for Geometry {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |scope| {
            let subtype = scope.header().subtype();
            let Some((_, commit_variant)) = SUBTYPES.iter().find(|(name, _)| *name == subtype) else {
                scope.warn(format!("unknown geometry subtype '{subtype}'"));
                return Ok(None);
            };

            let mut inputs = Vec::new();
            let Some(variant) = commit_variant(scope, &mut inputs)? else {
                return Ok(None);
            };
            let primitive_attr = gather_attributes(scope, "primitive", &mut inputs)?;
            tracing::debug!(prims = variant.num_primitives(), "geometry derived");

            Ok(Some(GeometryState {
                variant,
                primitive_attr,
                _inputs: inputs,
            }))
        })
    }
}

// ----------------------------------------------------------------------
// Shared validation helpers
// ----------------------------------------------------------------------

/// `vertex.position`: required `FLOAT32_VEC3`. Returns the array and a host copy.
fn positions(scope: &mut CommitScope<'_>, inputs: &mut Vec<Arc<Array>>) -> Result<Option<(Arc<Array>, Vec<[f32; 3]>)>> {
    let Some(array) = scope.require_array("vertex.position") else {
        return Ok(None);
    };
    if !scope.check_type(&array, "vertex.position", &[DataType::FLOAT32_VEC3]) {
        return Ok(None);
    }
    let host = array.to_vec::<[f32; 3]>()?;
    inputs.push(array.clone());
    Ok(Some((array, host)))
}

/// Optional array restricted to `allowed` types.
///
/// `None`: present with a wrong type (reported). `Some(None)`: absent.
fn typed_array(
    scope: &mut CommitScope<'_>,
    name: &str,
    allowed: &[DataType],
    inputs: &mut Vec<Arc<Array>>,
) -> Option<Option<Arc<Array>>> {
    let Some(array) = scope.optional_array(name) else {
        return Some(None);
    };
    if !scope.check_type(&array, name, allowed) {
        return None;
    }
    inputs.push(array.clone());
    Some(Some(array))
}

/// Reports an error when any index is outside `0..count`.
fn check_index_range(scope: &CommitScope<'_>, name: &str, indices: &[u32], count: usize) -> bool {
    match indices.iter().copied().max() {
        Some(max) if max as usize >= count => {
            scope.error(format!("'{name}' references element {max} but only {count} exist"));
            false
        }
        _ => true,
    }
}

/// Reports an error unless `array` holds exactly `expected` elements.
fn check_len(scope: &CommitScope<'_>, name: &str, array: &Array, expected: usize, what: &str) -> bool {
    if array.len() == expected {
        return true;
    }
    scope.error(format!("'{name}' has {} elements, expected one per {what} ({expected})", array.len()));
    false
}

/// Optional per-channel index array (`vertex.normal.index`, ...).
///
/// Needs one entry per primitive, and every index inside `channel` when that
/// array is set. `None` when a check failed (reported).
fn channel_index(
    scope: &mut CommitScope<'_>,
    name: &str,
    allowed: &[DataType],
    channel: &str,
    num_primitives: usize,
    inputs: &mut Vec<Arc<Array>>,
) -> Result<Option<Option<Arc<Array>>>> {
    let Some(array) = typed_array(scope, name, allowed, inputs) else {
        return Ok(None);
    };
    let Some(array) = array else {
        return Ok(Some(None));
    };
    if !check_len(scope, name, &array, num_primitives, "primitive") {
        return Ok(None);
    }
    let channel_len = scope.params().array(channel).filter(|a| a.is_valid()).map(|a| a.len());
    if let Some(count) = channel_len {
        if !check_index_range(scope, name, &array.to_vec::<u32>()?, count) {
            return Ok(None);
        }
    }
    Ok(Some(Some(array)))
}

pub(crate) fn attribute_ptr(array: &Array) -> Result<AttributePtr> {
    let dt = array.data_type();
    Ok(AttributePtr {
        data: array.device_ptr()?,
        data_type: dt.code(),
        num_channels: dt.components as u32,
    })
}

/// `<prefix>.attribute0..3` and `<prefix>.color`, in slot order.
fn gather_attributes(
    scope: &mut CommitScope<'_>,
    prefix: &str,
    inputs: &mut Vec<Arc<Array>>,
) -> Result<[AttributePtr; NUM_ATTRIBUTES]> {
    let mut out = [AttributePtr::NONE; NUM_ATTRIBUTES];
    for (slot, name) in ATTRIBUTE_NAMES.iter().enumerate() {
        let param = format!("{prefix}.{name}");
        let Some(array) = scope.optional_array(&param) else {
            continue;
        };
        if !array.data_type().is_valid() {
            scope.warn(format!("ignoring '{param}' with element type {}", array.data_type()));
            continue;
        }
        out[slot] = attribute_ptr(&array)?;
        inputs.push(array);
    }
    Ok(out)
}

/// Device pointer of an optional array, `0` when absent.
fn optional_ptr(array: Option<&Arc<Array>>) -> Result<DevicePtr> {
    match array {
        Some(a) => a.device_ptr(),
        None => Ok(0),
    }
}

/// Bounds of a point set.
pub fn bounds_of_points(points: &[[f32; 3]]) -> Box3 {
    points
        .par_iter()
        .fold(
            || Box3::EMPTY,
            |mut b, p| {
                b.expand_by_point(Vec3::from_array(*p));
                b
            },
        )
        .reduce(
            || Box3::EMPTY,
            |mut a, b| {
                a.expand_by_box(&b);
                a
            },
        )
}

/// Per-primitive boxes for segment-like primitives: each box covers both
/// endpoints grown by the primitive's radius.
fn segment_boxes(points: &[[f32; 3]], segments: &[[u32; 2]], radius: impl Fn(usize, [u32; 2]) -> f32 + Sync) -> Vec<[f32; 6]> {
    segments
        .par_iter()
        .enumerate()
        .map(|(i, &[a, b])| {
            let r = Vec3::splat(radius(i, [a, b]));
            let pa = Vec3::from_array(points[a as usize]);
            let pb = Vec3::from_array(points[b as usize]);
            Box3::new(pa.min(pb) - r, pa.max(pb) + r).to_array6()
        })
        .collect()
}

fn union_of_boxes(boxes: &[[f32; 6]]) -> Box3 {
    boxes.iter().fold(Box3::EMPTY, |mut acc, b| {
        acc.expand_by_box(&Box3::from_array6(*b));
        acc
    })
}

fn custom_build_input(aabbs: &HostDeviceBuffer<[f32; 6]>) -> BuildInput {
    BuildInput::CustomPrimitives(CustomPrimitiveArrayInput {
        aabb_buffer: aabbs.ptr(),
        stride: AABB_STRIDE,
        num_primitives: aabbs.len() as u32,
        flags: GeometryFlags::NONE,
        num_sbt_records: SBT_RECORDS_PER_INPUT,
    })
}
